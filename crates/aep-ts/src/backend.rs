//! Capability interface for building the operating table.
//!
//! The table builder only needs three things from its storage: loading a
//! plant, bucketing a series into analysis periods, and attaching reanalysis
//! period averages to the operating records. [`InMemoryBackend`] is the one
//! implementation in this crate; other storage engines implement the same
//! trait instead of subclassing it.

use anyhow::Result;

use aep_core::TimeResolution;

use crate::io::{load_plant, PlantFiles};
use crate::plant::PlantData;
use crate::reanalysis::ReanalysisInputs;
use crate::resample::{bucket_series, PeriodMap, PeriodStats};
use crate::series::TimeSeries;
use crate::table::OperatingRecord;

pub trait TableBackend: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Load raw plant inputs from disk.
    fn load(&self, files: &PlantFiles) -> Result<PlantData> {
        load_plant(files)
    }

    /// Bucket a raw series into consecutive analysis periods.
    fn resample(&self, series: &TimeSeries, resolution: TimeResolution)
        -> PeriodMap<PeriodStats>;

    /// Attach one product's period averages to the records sharing a period.
    ///
    /// Records whose period has no reanalysis value are left without an entry
    /// for `product`.
    fn join(
        &self,
        records: &mut [OperatingRecord],
        product: &str,
        inputs: &PeriodMap<ReanalysisInputs>,
    );
}

/// Table backend over in-memory `BTreeMap` buckets.
#[derive(Debug, Clone, Copy, Default)]
pub struct InMemoryBackend;

impl TableBackend for InMemoryBackend {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    fn resample(
        &self,
        series: &TimeSeries,
        resolution: TimeResolution,
    ) -> PeriodMap<PeriodStats> {
        bucket_series(series, resolution)
    }

    fn join(
        &self,
        records: &mut [OperatingRecord],
        product: &str,
        inputs: &PeriodMap<ReanalysisInputs>,
    ) {
        for record in records.iter_mut() {
            if let Some(values) = inputs.get(&record.period) {
                record.reanalysis.insert(product.to_string(), *values);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn join_only_matches_shared_periods() {
        let jan = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap();
        let feb = NaiveDate::from_ymd_opt(2019, 2, 1).unwrap();
        let mut records = vec![OperatingRecord::empty(jan), OperatingRecord::empty(feb)];
        let mut inputs = PeriodMap::new();
        inputs.insert(jan, ReanalysisInputs::from_components(7.0, None, None, None));

        InMemoryBackend.join(&mut records, "merra2", &inputs);

        assert_eq!(records[0].inputs("merra2").map(|i| i.windspeed), Some(7.0));
        assert!(records[1].inputs("merra2").is_none());
    }
}
