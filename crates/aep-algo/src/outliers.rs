//! Quality filtering of the operating table for one simulation key.

use std::sync::Arc;

use tracing::debug;

use aep_core::{AepError, AepResult, RegressionChannel, TimeResolution};
use aep_ts::OperatingTable;

use crate::cache::FilterCache;
use crate::filters::{range_flag, unresponsive_flag, window_range_flag};

/// Reanalysis wind speeds outside this range are discarded, m/s
pub const WIND_SPEED_RANGE: (f64, f64) = (0.0, 40.0);
/// Identical consecutive wind speeds that mark a stuck series
pub const FROZEN_RUN_LENGTH: usize = 3;
/// Wind speeds over which the power-curve window applies, m/s
pub const POWER_CURVE_WINDOW: (f64, f64) = (5.0, 40.0);
/// Lower bound of the power-curve window, fraction of nameplate energy
pub const POWER_CURVE_FLOOR: f64 = 0.02;

/// The three sampled inputs that decide which periods pass filtering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilterKey {
    pub product: String,
    pub max_power_filter_pct: u32,
    pub loss_threshold_pct: u32,
}

/// One period that passed filtering, pruned to what the regression needs.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredRow {
    /// Regression inputs in channel order
    pub features: Vec<f64>,
    /// Net energy with negatives clamped to zero, GWh
    pub energy_gwh: f64,
    pub availability_gwh: f64,
    pub curtailment_gwh: f64,
    /// Calendar days (monthly resolution only)
    pub days_expected: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilteredSample {
    pub rows: Vec<FilteredRow>,
}

impl FilteredSample {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Filter options fixed for a run.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOptions {
    pub channels: Vec<RegressionChannel>,
    /// Nameplate capacity when the power-curve window is enabled
    pub power_curve_capacity_mw: Option<f64>,
}

pub type OutlierFilterCache = FilterCache<FilterKey, FilteredSample, AepError>;

/// Cache of filtered samples over a shared operating table.
pub fn outlier_filter_cache(table: Arc<OperatingTable>, options: FilterOptions) -> OutlierFilterCache {
    FilterCache::new(move |key: &FilterKey| filter_table(&table, key, &options))
}

/// Periods usable for the regression of one simulation.
///
/// Keeps periods whose combined loss is below the threshold and that are not
/// NaN-flagged, then drops out-of-range and frozen wind speeds and, when
/// enabled, energy outside the power-curve window.
pub fn filter_table(
    table: &OperatingTable,
    key: &FilterKey,
    options: &FilterOptions,
) -> AepResult<FilteredSample> {
    if !table.has_product(&key.product) {
        return Err(AepError::Config(format!(
            "reanalysis product '{}' is not in the operating table",
            key.product
        )));
    }
    let threshold = f64::from(key.loss_threshold_pct) / 100.0;

    let candidates: Vec<_> = table
        .records()
        .iter()
        .filter(|r| r.combined_loss_pct() < threshold && !r.nan_flag)
        .filter_map(|r| {
            let inputs = r.inputs(&key.product)?;
            let features = inputs.features(&options.channels)?;
            Some((r, inputs.windspeed, features))
        })
        .collect();

    let windspeed: Vec<f64> = candidates.iter().map(|(_, ws, _)| *ws).collect();
    let energy: Vec<f64> = candidates
        .iter()
        .map(|(r, _, _)| r.energy_gwh.max(0.0))
        .collect();

    let out_of_range = range_flag(&windspeed, WIND_SPEED_RANGE.0, WIND_SPEED_RANGE.1);
    let frozen = unresponsive_flag(&windspeed, FROZEN_RUN_LENGTH);
    let window = match options.power_curve_capacity_mw {
        Some(capacity_mw) => {
            let fraction = f64::from(key.max_power_filter_pct) / 100.0;
            let nameplate: Vec<f64> = candidates
                .iter()
                .map(|(r, _, _)| nameplate_energy_gwh(capacity_mw, table.resolution(), r.period))
                .collect();
            let lo: Vec<f64> = nameplate.iter().map(|c| POWER_CURVE_FLOOR * c).collect();
            let hi: Vec<f64> = nameplate.iter().map(|c| fraction * c).collect();
            window_range_flag(
                &windspeed,
                POWER_CURVE_WINDOW.0,
                POWER_CURVE_WINDOW.1,
                &energy,
                &lo,
                &hi,
            )
        }
        None => vec![false; candidates.len()],
    };

    let rows: Vec<FilteredRow> = candidates
        .into_iter()
        .zip(energy)
        .enumerate()
        .filter(|(i, _)| !(out_of_range[*i] || frozen[*i] || window[*i]))
        .map(|(_, ((record, _, features), energy_gwh))| FilteredRow {
            features,
            energy_gwh,
            availability_gwh: record.availability_gwh,
            curtailment_gwh: record.curtailment_gwh,
            days_expected: record.days_expected,
        })
        .collect();

    debug!(
        product = %key.product,
        max_power_filter_pct = key.max_power_filter_pct,
        loss_threshold_pct = key.loss_threshold_pct,
        rows = rows.len(),
        "filtered regression sample"
    );
    Ok(FilteredSample { rows })
}

/// Energy the plant would produce at nameplate for a whole period, GWh.
pub fn nameplate_energy_gwh(
    capacity_mw: f64,
    resolution: TimeResolution,
    period: chrono::NaiveDate,
) -> f64 {
    capacity_mw / 1000.0 * 24.0 * resolution.days_in_period(period)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aep_ts::test_utils::{monthly_plant, monthly_plant_with, PRODUCT};
    use aep_ts::{InMemoryBackend, TableSettings};

    fn key(loss_threshold_pct: u32) -> FilterKey {
        FilterKey {
            product: PRODUCT.to_string(),
            max_power_filter_pct: 90,
            loss_threshold_pct,
        }
    }

    fn options() -> FilterOptions {
        FilterOptions {
            channels: vec![RegressionChannel::WindSpeed],
            power_curve_capacity_mw: None,
        }
    }

    fn table(plant: &aep_ts::PlantData) -> OperatingTable {
        OperatingTable::build(plant, &TableSettings::default(), &InMemoryBackend).unwrap()
    }

    #[test]
    fn loss_threshold_is_strict() {
        // 10% combined loss
        let plant = monthly_plant(12, 9.0, 0.5, 0.5);
        let table = table(&plant);
        assert!(filter_table(&table, &key(10), &options()).unwrap().is_empty());
        assert_eq!(filter_table(&table, &key(11), &options()).unwrap().len(), 12);
    }

    #[test]
    fn frozen_wind_speeds_are_removed() {
        let mut plant = monthly_plant(12, 10.0, 0.0, 0.0);
        let product = plant.reanalysis.get_mut(PRODUCT).unwrap();
        let n = product.windspeed_ms.values.len();
        for v in &mut product.windspeed_ms.values[n - 4..n - 1] {
            *v = Some(9.0);
        }
        let table = table(&plant);
        let sample = filter_table(&table, &key(15), &options()).unwrap();
        assert_eq!(sample.len(), 9);
    }

    #[test]
    fn negative_energy_is_clamped() {
        let plant = monthly_plant_with(12, |ws| if ws == 5.0 { (-0.5, 0.0, 0.0) } else { (10.0, 0.0, 0.0) });
        let table = table(&plant);
        let sample = filter_table(&table, &key(15), &options()).unwrap();
        assert_eq!(sample.rows[0].energy_gwh, 0.0);
        assert_eq!(sample.rows[0].days_expected, Some(31.0));
    }

    #[test]
    fn power_curve_window_drops_implausible_energy() {
        // 50 MW plant: a 31-day month at 90% is about 33.5 GWh
        let plant = monthly_plant_with(12, |ws| if ws > 14.0 { (40.0, 0.0, 0.0) } else { (10.0, 0.0, 0.0) });
        let table = table(&plant);
        let with_window = FilterOptions {
            power_curve_capacity_mw: Some(50.0),
            ..options()
        };
        assert_eq!(filter_table(&table, &key(15), &options()).unwrap().len(), 12);
        assert_eq!(filter_table(&table, &key(15), &with_window).unwrap().len(), 11);
    }

    #[test]
    fn unknown_product_is_a_config_error() {
        let table = table(&monthly_plant(12, 10.0, 0.0, 0.0));
        let key = FilterKey {
            product: "era5".into(),
            ..key(15)
        };
        assert!(filter_table(&table, &key, &options()).unwrap_err().is_config());
    }

    #[test]
    fn cache_computes_each_key_once() {
        let table = Arc::new(table(&monthly_plant(12, 10.0, 0.0, 0.0)));
        let cache = outlier_filter_cache(table, options());
        let first = cache.get(&key(15)).unwrap();
        let second = cache.get(&key(15)).unwrap();
        assert_eq!(*first, *second);
        assert_eq!(cache.computations(), 1);
        cache.get(&key(16)).unwrap();
        assert_eq!(cache.computations(), 2);
    }
}
