use std::collections::BTreeMap;

use aep_core::TimeResolution;
use chrono::NaiveDate;

use crate::series::TimeSeries;

/// Values keyed by period start.
pub type PeriodMap<T> = BTreeMap<NaiveDate, T>;

/// Per-period bucket statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PeriodStats {
    /// Samples stamped inside the period, missing or not
    pub samples: usize,
    /// Samples with a finite value
    pub valid: usize,
    pub sum: f64,
}

impl PeriodStats {
    fn push(&mut self, value: Option<f64>) {
        self.samples += 1;
        if let Some(value) = value {
            self.valid += 1;
            self.sum += value;
        }
    }

    pub fn mean(&self) -> Option<f64> {
        (self.valid > 0).then(|| self.sum / self.valid as f64)
    }

    /// Fraction of samples that were missing; an empty period is fully missing.
    pub fn missing_fraction(&self) -> f64 {
        if self.samples == 0 {
            1.0
        } else {
            (self.samples - self.valid) as f64 / self.samples as f64
        }
    }
}

/// Bucket a series into consecutive periods from its first to its last sample.
///
/// Periods without any sample are present with empty statistics.
pub fn bucket_series(series: &TimeSeries, resolution: TimeResolution) -> PeriodMap<PeriodStats> {
    let mut buckets: PeriodMap<PeriodStats> = BTreeMap::new();
    for (ts, value) in series.iter() {
        buckets
            .entry(resolution.period_start(ts))
            .or_default()
            .push(value);
    }

    let (Some(&first), Some(&last)) = (buckets.keys().next(), buckets.keys().next_back()) else {
        return buckets;
    };
    let mut period = first;
    while period < last {
        buckets.entry(period).or_default();
        period = resolution.next_period(period);
    }
    buckets
}
