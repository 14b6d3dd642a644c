//! The operating table: one record per analysis period of the plant's
//! period of record.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use tracing::{debug, info};

use aep_core::units::{gross_energy, GigawattHours, KilowattHours};
use aep_core::{AepError, AepResult, CalendarKey, RegressionChannel, TimeResolution};

use crate::backend::TableBackend;
use crate::plant::PlantData;
use crate::reanalysis::{aggregate_product, ReanalysisInputs};
use crate::resample::{PeriodMap, PeriodStats};
use crate::series::Cadence;

/// One analysis period of operating data.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatingRecord {
    /// Period start
    pub period: NaiveDate,
    pub energy_gwh: f64,
    pub energy_nan_fraction: f64,
    pub availability_gwh: f64,
    pub curtailment_gwh: f64,
    pub availability_nan_fraction: f64,
    pub curtailment_nan_fraction: f64,
    pub gross_energy_gwh: f64,
    /// Availability loss as a fraction of gross energy
    pub availability_pct: f64,
    /// Curtailment loss as a fraction of gross energy
    pub curtailment_pct: f64,
    /// Calendar days in the period (monthly resolution only)
    pub days_expected: Option<f64>,
    /// Days covered by raw meter samples (monthly resolution only)
    pub days_actual: Option<f64>,
    /// Too much raw data was missing in this period
    pub nan_flag: bool,
    pub availability_typical: bool,
    pub curtailment_typical: bool,
    /// Period averages keyed by reanalysis product
    pub reanalysis: BTreeMap<String, ReanalysisInputs>,
}

impl OperatingRecord {
    /// A record with no data attached.
    pub fn empty(period: NaiveDate) -> Self {
        Self {
            period,
            energy_gwh: 0.0,
            energy_nan_fraction: 0.0,
            availability_gwh: 0.0,
            curtailment_gwh: 0.0,
            availability_nan_fraction: 0.0,
            curtailment_nan_fraction: 0.0,
            gross_energy_gwh: 0.0,
            availability_pct: 0.0,
            curtailment_pct: 0.0,
            days_expected: None,
            days_actual: None,
            nan_flag: false,
            availability_typical: true,
            curtailment_typical: true,
            reanalysis: BTreeMap::new(),
        }
    }

    /// Availability plus curtailment loss fraction.
    pub fn combined_loss_pct(&self) -> f64 {
        self.availability_pct + self.curtailment_pct
    }

    pub fn inputs(&self, product: &str) -> Option<&ReanalysisInputs> {
        self.reanalysis.get(product)
    }
}

/// Which reported loss a typicality flag refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossKind {
    Availability,
    Curtailment,
}

/// Inputs to [`OperatingTable::build`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableSettings {
    pub resolution: TimeResolution,
    /// Missing-data fraction above which a period is flagged
    pub nan_threshold: f64,
    pub temperature: bool,
    pub wind_direction: bool,
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            resolution: TimeResolution::Monthly,
            nan_threshold: 0.01,
            temperature: false,
            wind_direction: false,
        }
    }
}

impl TableSettings {
    pub fn channels(&self) -> Vec<RegressionChannel> {
        RegressionChannel::active(self.temperature, self.wind_direction)
    }
}

/// Cleaned period-of-record table plus the full-span reanalysis averages
/// used for long-term projection.
#[derive(Debug, Clone)]
pub struct OperatingTable {
    resolution: TimeResolution,
    channels: Vec<RegressionChannel>,
    records: Vec<OperatingRecord>,
    reanalysis: BTreeMap<String, PeriodMap<ReanalysisInputs>>,
}

impl OperatingTable {
    /// Aggregate raw plant data into the operating table.
    ///
    /// Monthly tables lose their first and last month when the raw meter data
    /// does not cover every day of it. Periods without finite gross energy or
    /// without every enabled input of every product are dropped.
    pub fn build<B: TableBackend + ?Sized>(
        plant: &PlantData,
        settings: &TableSettings,
        backend: &B,
    ) -> AepResult<Self> {
        plant.validate(settings.temperature, settings.wind_direction)?;
        let resolution = settings.resolution;
        let channels = settings.channels();
        debug!(backend = backend.name(), %resolution, "building operating table");

        let energy = backend.resample(&plant.meter.energy_kwh, resolution);
        let availability = backend.resample(&plant.curtailment.availability_kwh, resolution);
        let curtailment = backend.resample(&plant.curtailment.curtailment_kwh, resolution);
        let cadence = plant.meter.energy_kwh.cadence();

        let mut records: Vec<OperatingRecord> = energy
            .iter()
            .map(|(period, stats)| {
                let mut record = OperatingRecord::empty(*period);
                record.energy_gwh = to_gwh(stats.sum);
                record.energy_nan_fraction = stats.missing_fraction();

                if resolution == TimeResolution::Monthly {
                    let expected = resolution.days_in_period(*period);
                    let actual = match cadence {
                        Cadence::MonthStart => expected,
                        other => other.days_covered(stats.samples).unwrap_or(expected),
                    };
                    record.days_expected = Some(expected);
                    record.days_actual = Some(actual);
                }

                let (avail_gwh, avail_nan) = loss_at(&availability, period);
                let (curt_gwh, curt_nan) = loss_at(&curtailment, period);
                record.availability_gwh = avail_gwh;
                record.curtailment_gwh = curt_gwh;
                record.availability_nan_fraction = avail_nan;
                record.curtailment_nan_fraction = curt_nan;

                let gross = gross_energy(
                    GigawattHours(record.energy_gwh),
                    GigawattHours(avail_gwh),
                    GigawattHours(curt_gwh),
                )
                .value();
                record.gross_energy_gwh = gross;
                record.availability_pct = loss_fraction(avail_gwh, gross);
                record.curtailment_pct = loss_fraction(curt_gwh, gross);

                record.nan_flag = record.energy_nan_fraction > settings.nan_threshold
                    || avail_nan > settings.nan_threshold
                    || curt_nan > settings.nan_threshold;
                record
            })
            .collect();

        if resolution == TimeResolution::Monthly {
            trim_incomplete_months(&mut records);
        }

        let mut reanalysis = BTreeMap::new();
        for (name, product) in &plant.reanalysis {
            let inputs = aggregate_product(
                backend,
                product,
                resolution,
                settings.temperature,
                settings.wind_direction,
            );
            backend.join(&mut records, name, &inputs);
            reanalysis.insert(name.clone(), inputs);
        }

        let before = records.len();
        records.retain(|record| {
            record.gross_energy_gwh.is_finite()
                && reanalysis
                    .keys()
                    .all(|name| matches!(record.inputs(name), Some(i) if i.features(&channels).is_some()))
        });
        if records.is_empty() {
            return Err(AepError::Data(
                "no period has finite gross energy and complete reanalysis inputs".into(),
            ));
        }

        info!(
            periods = records.len(),
            dropped = before - records.len(),
            products = reanalysis.len(),
            "operating table ready"
        );
        Ok(Self {
            resolution,
            channels,
            records,
            reanalysis,
        })
    }

    pub fn resolution(&self) -> TimeResolution {
        self.resolution
    }

    /// Enabled regression inputs, wind speed first.
    pub fn channels(&self) -> &[RegressionChannel] {
        &self.channels
    }

    pub fn records(&self) -> &[OperatingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn products(&self) -> Vec<String> {
        self.reanalysis.keys().cloned().collect()
    }

    pub fn has_product(&self, product: &str) -> bool {
        self.reanalysis.contains_key(product)
    }

    /// Full-span period averages of one product, beyond the period of record.
    pub fn reanalysis(&self, product: &str) -> Option<&PeriodMap<ReanalysisInputs>> {
        self.reanalysis.get(product)
    }

    /// Flag periods whose reported loss is not representative of long-term
    /// operation. Returns the number of records updated.
    pub fn mark_atypical(&mut self, periods: &[NaiveDate], kind: LossKind) -> usize {
        let mut marked = 0;
        for record in self
            .records
            .iter_mut()
            .filter(|r| periods.contains(&r.period))
        {
            match kind {
                LossKind::Availability => record.availability_typical = false,
                LossKind::Curtailment => record.curtailment_typical = false,
            }
            marked += 1;
        }
        marked
    }

    /// Calendar-period averages of one product over the period of record.
    ///
    /// Direction is rebuilt from the averaged wind components.
    pub fn por_average(&self, product: &str) -> AepResult<BTreeMap<CalendarKey, ReanalysisInputs>> {
        if !self.has_product(product) {
            return Err(AepError::Config(format!(
                "reanalysis product '{product}' is not in the operating table"
            )));
        }

        let mut groups: BTreeMap<CalendarKey, Vec<&ReanalysisInputs>> = BTreeMap::new();
        for record in &self.records {
            if let Some(inputs) = record.inputs(product) {
                groups
                    .entry(self.resolution.calendar_key(record.period))
                    .or_default()
                    .push(inputs);
            }
        }

        Ok(groups
            .into_iter()
            .map(|(key, group)| {
                let windspeed = group.iter().map(|i| i.windspeed).sum::<f64>() / group.len() as f64;
                let temperature = mean_of(group.iter().map(|i| i.temperature));
                let u = mean_of(group.iter().map(|i| i.u));
                let v = mean_of(group.iter().map(|i| i.v));
                (key, ReanalysisInputs::from_components(windspeed, temperature, u, v))
            })
            .collect())
    }

    /// Export the table with one column set per reanalysis product.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let col_f64 = |name: &str, f: &dyn Fn(&OperatingRecord) -> f64| {
            Series::new(name, self.records.iter().map(f).collect::<Vec<f64>>())
        };
        let col_opt = |name: &str, f: &dyn Fn(&OperatingRecord) -> Option<f64>| {
            Series::new(name, self.records.iter().map(f).collect::<Vec<Option<f64>>>())
        };
        let col_bool = |name: &str, f: &dyn Fn(&OperatingRecord) -> bool| {
            Series::new(name, self.records.iter().map(f).collect::<Vec<bool>>())
        };

        let periods: Vec<String> = self
            .records
            .iter()
            .map(|r| r.period.format("%Y-%m-%d").to_string())
            .collect();

        let mut columns = vec![
            Series::new("period", periods),
            col_f64("energy_gwh", &|r| r.energy_gwh),
            col_f64("energy_nan_perc", &|r| r.energy_nan_fraction),
            col_opt("num_days_expected", &|r| r.days_expected),
            col_opt("num_days_actual", &|r| r.days_actual),
            col_f64("availability_gwh", &|r| r.availability_gwh),
            col_f64("curtailment_gwh", &|r| r.curtailment_gwh),
            col_f64("gross_energy_gwh", &|r| r.gross_energy_gwh),
            col_f64("availability_pct", &|r| r.availability_pct),
            col_f64("curtailment_pct", &|r| r.curtailment_pct),
            col_f64("avail_nan_perc", &|r| r.availability_nan_fraction),
            col_f64("curt_nan_perc", &|r| r.curtailment_nan_fraction),
            col_bool("nan_flag", &|r| r.nan_flag),
            col_bool("availability_typical", &|r| r.availability_typical),
            col_bool("curtailment_typical", &|r| r.curtailment_typical),
        ];

        for product in self.reanalysis.keys() {
            let field = |f: fn(&ReanalysisInputs) -> Option<f64>| {
                move |r: &OperatingRecord| r.inputs(product).and_then(f)
            };
            columns.push(col_opt(product.as_str(), &field(|i| Some(i.windspeed))));
            if self.channels.contains(&RegressionChannel::Temperature) {
                columns.push(col_opt(&format!("{product}_temp"), &field(|i| i.temperature)));
            }
            if self.channels.contains(&RegressionChannel::WindDirectionSin) {
                columns.push(col_opt(&format!("{product}_u"), &field(|i| i.u)));
                columns.push(col_opt(&format!("{product}_v"), &field(|i| i.v)));
                columns.push(col_opt(&format!("{product}_wd"), &field(|i| i.direction)));
            }
        }

        DataFrame::new(columns).context("assembling operating table frame")
    }
}

fn to_gwh(kwh: f64) -> f64 {
    GigawattHours::from(KilowattHours(kwh)).value()
}

fn loss_at(buckets: &PeriodMap<PeriodStats>, period: &NaiveDate) -> (f64, f64) {
    match buckets.get(period) {
        Some(stats) => (to_gwh(stats.sum), stats.missing_fraction()),
        None => (f64::NAN, 1.0),
    }
}

fn loss_fraction(loss: f64, gross: f64) -> f64 {
    if gross == 0.0 {
        0.0
    } else {
        loss / gross
    }
}

fn mean_of(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, count) = values
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

fn trim_incomplete_months(records: &mut Vec<OperatingRecord>) {
    let incomplete = |r: &OperatingRecord| match (r.days_expected, r.days_actual) {
        (Some(expected), Some(actual)) => (expected - actual).abs() > 1e-9,
        _ => false,
    };
    if records.last().is_some_and(incomplete) {
        if let Some(dropped) = records.pop() {
            debug!(period = %dropped.period, "trimmed incomplete last month");
        }
    }
    if records.first().is_some_and(incomplete) {
        let dropped = records.remove(0);
        debug!(period = %dropped.period, "trimmed incomplete first month");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::test_utils::{monthly_plant, ten_minute_plant};

    #[test]
    fn monthly_table_from_monthly_meter() {
        let plant = monthly_plant(24, 10.0, 0.0, 0.0);
        let table =
            OperatingTable::build(&plant, &TableSettings::default(), &InMemoryBackend).unwrap();
        assert_eq!(table.len(), 24);
        for record in table.records() {
            assert!((record.energy_gwh - 10.0).abs() < 1e-12);
            assert_eq!(record.days_expected, record.days_actual);
            assert!(record.days_expected.is_some());
            assert_eq!(record.availability_pct, 0.0);
            assert!(!record.nan_flag);
        }
    }

    #[test]
    fn losses_are_fractions_of_gross() {
        let plant = monthly_plant(12, 9.0, 0.5, 0.5);
        let table =
            OperatingTable::build(&plant, &TableSettings::default(), &InMemoryBackend).unwrap();
        let record = &table.records()[0];
        assert!((record.gross_energy_gwh - 10.0).abs() < 1e-12);
        assert!((record.availability_pct - 0.05).abs() < 1e-12);
        assert!((record.combined_loss_pct() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn partial_boundary_months_are_trimmed() {
        // starts on Jan 15th, ends mid-March
        let plant = ten_minute_plant("2019-01-15", 60);
        let table =
            OperatingTable::build(&plant, &TableSettings::default(), &InMemoryBackend).unwrap();
        assert_eq!(table.len(), 1);
        let feb = &table.records()[0];
        assert_eq!(feb.period, NaiveDate::from_ymd_opt(2019, 2, 1).unwrap());
        assert_eq!(feb.days_actual, Some(28.0));
    }

    #[test]
    fn daily_table_has_no_day_counts() {
        let plant = ten_minute_plant("2019-01-01", 3);
        let settings = TableSettings {
            resolution: TimeResolution::Daily,
            ..TableSettings::default()
        };
        let table = OperatingTable::build(&plant, &settings, &InMemoryBackend).unwrap();
        assert_eq!(table.len(), 3);
        assert!(table.records().iter().all(|r| r.days_expected.is_none()));
    }

    #[test]
    fn atypical_periods_only_touch_requested_loss() {
        let plant = monthly_plant(12, 10.0, 0.1, 0.0);
        let mut table =
            OperatingTable::build(&plant, &TableSettings::default(), &InMemoryBackend).unwrap();
        let first = table.records()[0].period;
        assert_eq!(table.mark_atypical(&[first], LossKind::Availability), 1);
        assert!(!table.records()[0].availability_typical);
        assert!(table.records()[0].curtailment_typical);
    }

    #[test]
    fn por_average_groups_by_calendar_month() {
        let plant = monthly_plant(24, 10.0, 0.0, 0.0);
        let table =
            OperatingTable::build(&plant, &TableSettings::default(), &InMemoryBackend).unwrap();
        let por = table.por_average("merra2").unwrap();
        assert_eq!(por.len(), 12);
        let jan = por[&CalendarKey { month: 1, day: None }];
        let jan_speeds: Vec<f64> = table
            .records()
            .iter()
            .filter(|r| chrono::Datelike::month(&r.period) == 1)
            .map(|r| r.inputs("merra2").unwrap().windspeed)
            .collect();
        let expected = jan_speeds.iter().sum::<f64>() / jan_speeds.len() as f64;
        assert!((jan.windspeed - expected).abs() < 1e-12);
        assert!(table.por_average("era5").unwrap_err().is_config());
    }

    #[test]
    fn dataframe_has_product_columns() {
        let plant = monthly_plant(12, 10.0, 0.0, 0.0);
        let table =
            OperatingTable::build(&plant, &TableSettings::default(), &InMemoryBackend).unwrap();
        let df = table.to_dataframe().unwrap();
        assert_eq!(df.height(), 12);
        assert!(df.column("merra2").is_ok());
        assert!(df.column("merra2_temp").is_err());
    }
}
