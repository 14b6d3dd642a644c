//! Monte Carlo AEP engine.
//!
//! [`MonteCarloAep`] owns the validated settings and the operating table.
//! Each [`MonteCarloAep::run`] draws every simulation's parameters up front,
//! then evaluates the simulations independently: filter (memoised per key),
//! fit, project onto the long-term and period-of-record wind, apply losses.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use tracing::{debug, info, warn};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use aep_core::{
    AepError, AepResult, CalendarKey, RegressionChannel, TimeResolution, NORMALIZED_MONTH_DAYS,
};
use aep_ts::{InMemoryBackend, OperatingTable, PlantData, TableBackend};

use crate::config::{AepConfig, AepSettings};
use crate::long_term::sample_long_term;
use crate::losses::LongTermLosses;
use crate::outliers::{outlier_filter_cache, FilterKey, FilterOptions, OutlierFilterCache};
use crate::regression::{fit_with_report, regressor_for, Predictor, Regressor};
use crate::results::{SimulationOutcome, SimulationResults};
use crate::sampler::{seeded_rng, SimulationDraw, SimulationParameters};

/// Monte Carlo AEP analysis of one plant.
#[derive(Debug, Clone)]
pub struct MonteCarloAep {
    config: AepConfig,
    settings: AepSettings,
    capacity_mw: Option<f64>,
    table: Arc<OperatingTable>,
}

impl MonteCarloAep {
    /// Validate `config` and build the operating table in memory.
    pub fn new(plant: &PlantData, config: AepConfig) -> AepResult<Self> {
        Self::with_backend(plant, config, &InMemoryBackend)
    }

    pub fn with_backend<B: TableBackend + ?Sized>(
        plant: &PlantData,
        config: AepConfig,
        backend: &B,
    ) -> AepResult<Self> {
        let settings = config.validate()?;
        if settings.power_curve_filter && plant.capacity_mw.is_none() {
            return Err(AepError::Config(
                "power_curve_filter requires the plant capacity".into(),
            ));
        }
        let table = OperatingTable::build(plant, &settings.table_settings(), backend)?;
        debug!(backend = backend.name(), periods = table.len(), "engine constructed");
        Ok(Self {
            config,
            settings,
            capacity_mw: plant.capacity_mw,
            table: Arc::new(table),
        })
    }

    /// Wrap an already built table; its resolution and inputs must match `config`.
    pub fn from_table(
        table: OperatingTable,
        config: AepConfig,
        capacity_mw: Option<f64>,
    ) -> AepResult<Self> {
        let settings = config.validate()?;
        if table.resolution() != settings.resolution {
            return Err(AepError::Config(format!(
                "operating table has resolution {} but time_resolution is {}",
                table.resolution(),
                settings.resolution
            )));
        }
        if table.channels() != settings.channels().as_slice() {
            return Err(AepError::Config(
                "operating table regression inputs do not match reg_temperature/reg_winddirection"
                    .into(),
            ));
        }
        if settings.power_curve_filter && capacity_mw.is_none() {
            return Err(AepError::Config(
                "power_curve_filter requires the plant capacity".into(),
            ));
        }
        Ok(Self {
            config,
            settings,
            capacity_mw,
            table: Arc::new(table),
        })
    }

    pub fn config(&self) -> &AepConfig {
        &self.config
    }

    pub fn settings(&self) -> &AepSettings {
        &self.settings
    }

    pub fn table(&self) -> &OperatingTable {
        &self.table
    }

    /// Mutable table access, e.g. to mark atypical loss periods before a run.
    pub fn table_mut(&mut self) -> &mut OperatingTable {
        Arc::make_mut(&mut self.table)
    }

    /// Long-term loss baseline of the current table.
    pub fn long_term_losses(&self) -> AepResult<LongTermLosses> {
        LongTermLosses::estimate(&self.table)
    }

    /// Filter cache over the current table with this engine's options.
    pub fn filter_cache(&self) -> OutlierFilterCache {
        let options = FilterOptions {
            channels: self.settings.channels(),
            power_curve_capacity_mw: self
                .capacity_mw
                .filter(|_| self.settings.power_curve_filter),
        };
        outlier_filter_cache(Arc::clone(&self.table), options)
    }

    /// Run `num_sim` simulations, sampling reanalysis products from `products`.
    pub fn run(&self, num_sim: usize, products: &[String]) -> AepResult<SimulationResults> {
        if num_sim == 0 {
            return Err(AepError::Config(
                "number of simulations must be at least 1".into(),
            ));
        }
        if products.is_empty() {
            return Err(AepError::Config(
                "at least one reanalysis product is required".into(),
            ));
        }
        if let Some(missing) = products.iter().find(|p| !self.table.has_product(p)) {
            return Err(AepError::Config(format!(
                "reanalysis product '{missing}' is not in the plant data (available: {})",
                self.table.products().join(", ")
            )));
        }

        let s = &self.settings;
        info!(
            num_sim,
            products = %products.join(","),
            resolution = %s.resolution,
            model = %s.model,
            uncertainty_meter = s.uncertainty_meter,
            uncertainty_losses = s.uncertainty_losses,
            windiness_years = ?s.windiness_years,
            loss_max_pct = ?s.loss_max_pct,
            max_power_filter_pct = ?s.max_power_filter_pct,
            seed = ?s.seed,
            "starting Monte Carlo AEP"
        );
        let started = Instant::now();

        let losses = self.long_term_losses()?;
        let mut rng = seeded_rng(s.seed);
        let parameters = SimulationParameters::draw(s, num_sim, products, &mut rng)?;

        let channels = s.channels();
        let mut por = BTreeMap::new();
        for product in products {
            if !por.contains_key(product) {
                por.insert(product.clone(), self.por_features(product, &channels)?);
            }
        }

        let cache = self.filter_cache();
        let regressor = regressor_for(s.model, s.ml_search_iterations, s.ml_cv_folds);
        let context = Simulation {
            settings: s,
            table: &self.table,
            channels: &channels,
            cache: &cache,
            regressor: regressor.as_ref(),
            losses,
            por: &por,
        };

        let outcomes = self.evaluate(&context, &parameters)?;
        let results = SimulationResults::from_outcomes(
            outcomes,
            parameters,
            losses,
            channels,
            cache.computations(),
        );

        let summary = results.summary();
        info!(
            aep_mean_gwh = summary.aep_mean_gwh,
            aep_uncertainty = summary.aep_uncertainty,
            filter_computations = cache.computations(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Monte Carlo AEP complete"
        );
        Ok(results)
    }

    fn evaluate(
        &self,
        context: &Simulation<'_>,
        parameters: &SimulationParameters,
    ) -> AepResult<Vec<SimulationOutcome>> {
        let draws: Vec<SimulationDraw> = (0..parameters.len())
            .map(|n| {
                parameters
                    .get(n)
                    .ok_or_else(|| AepError::Other(format!("missing parameters for simulation {n}")))
            })
            .collect::<AepResult<_>>()?;

        if self.settings.parallel {
            #[cfg(feature = "rayon")]
            {
                return draws.par_iter().map(|draw| context.simulate(draw)).collect();
            }
            #[cfg(not(feature = "rayon"))]
            warn!("parallel requested but built without rayon; running sequentially");
        }
        draws.iter().map(|draw| context.simulate(draw)).collect()
    }

    /// Period-of-record calendar averages as regression features.
    fn por_features(
        &self,
        product: &str,
        channels: &[RegressionChannel],
    ) -> AepResult<Vec<(CalendarKey, Vec<f64>)>> {
        self.table
            .por_average(product)?
            .into_iter()
            .map(|(key, inputs)| {
                inputs
                    .features(channels)
                    .map(|features| (key, features))
                    .ok_or_else(|| {
                        AepError::Data(format!(
                            "period-of-record average of '{product}' lacks an enabled regression input"
                        ))
                    })
            })
            .collect()
    }
}

/// Read-only state shared by every simulation of a run.
struct Simulation<'a> {
    settings: &'a AepSettings,
    table: &'a OperatingTable,
    channels: &'a [RegressionChannel],
    cache: &'a OutlierFilterCache,
    regressor: &'a dyn Regressor,
    losses: LongTermLosses,
    por: &'a BTreeMap<String, Vec<(CalendarKey, Vec<f64>)>>,
}

impl Simulation<'_> {
    fn simulate(&self, draw: &SimulationDraw) -> AepResult<SimulationOutcome> {
        let mut rng = StdRng::seed_from_u64(draw.seed);
        let resolution = self.settings.resolution;

        let key = FilterKey {
            product: draw.product.clone(),
            max_power_filter_pct: draw.max_power_filter_pct,
            loss_threshold_pct: draw.loss_threshold_pct,
        };
        let sample = self.cache.get(&key)?;
        if sample.is_empty() {
            return Err(AepError::Regression(format!(
                "no period passed filtering for product '{}' at {}% loss threshold",
                key.product, key.loss_threshold_pct
            )));
        }

        let mut x = Vec::with_capacity(sample.len());
        let mut y = Vec::with_capacity(sample.len());
        for row in &sample.rows {
            let gross = row.energy_gwh * draw.meter_bias
                + (row.availability_gwh + row.curtailment_gwh) * draw.loss_bias;
            let target = match (resolution, row.days_expected) {
                (TimeResolution::Monthly, Some(days)) => gross * NORMALIZED_MONTH_DAYS / days,
                (TimeResolution::Monthly, None) => {
                    return Err(AepError::Data(
                        "monthly period without an expected day count".into(),
                    ))
                }
                (TimeResolution::Daily, _) => gross,
            };
            x.push(row.features.clone());
            y.push(target);
        }

        let keep = (self.settings.subsample_fraction * y.len() as f64).round() as usize;
        if keep == 0 {
            return Err(AepError::Regression(format!(
                "subsampling {} filtered periods at {} leaves nothing to fit",
                y.len(),
                self.settings.subsample_fraction
            )));
        }
        let picked = index::sample(&mut rng, y.len(), keep);
        let x_fit: Vec<Vec<f64>> = picked.iter().map(|i| x[i].clone()).collect();
        let y_fit: Vec<f64> = picked.iter().map(|i| y[i]).collect();

        let (predictor, fit) = fit_with_report(self.regressor, &x_fit, &y_fit, &mut rng)?;

        let long_term = sample_long_term(
            self.table,
            &draw.product,
            draw.windiness_years,
            self.channels,
            &mut rng,
        )?;
        let gross_lt = annual_gross(
            predictor.as_ref(),
            resolution,
            long_term.keys.iter().copied().zip(long_term.features.iter()),
        );
        let por = self.por.get(&draw.product).ok_or_else(|| {
            AepError::Other(format!("no period-of-record average for '{}'", draw.product))
        })?;
        let gross_por = annual_gross(
            predictor.as_ref(),
            resolution,
            por.iter().map(|(key, features)| (*key, features)),
        );

        let losses = self.losses.sampled(draw.loss_bias);
        Ok(SimulationOutcome {
            aep_gwh: gross_lt * (1.0 - losses.availability),
            avail_pct: losses.availability,
            curt_pct: losses.curtailment,
            lt_por_ratio: gross_lt / gross_por,
            fit,
        })
    }
}

/// Sum of predicted gross energy over calendar periods, GWh. Monthly
/// predictions are on a 30-day basis and are scaled back to long-term days.
fn annual_gross<'f>(
    predictor: &dyn Predictor,
    resolution: TimeResolution,
    periods: impl Iterator<Item = (CalendarKey, &'f Vec<f64>)>,
) -> f64 {
    periods
        .map(|(key, features)| {
            let predicted = predictor.predict(features);
            match resolution {
                TimeResolution::Monthly => predicted * key.long_term_days() / NORMALIZED_MONTH_DAYS,
                TimeResolution::Daily => predicted,
            }
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aep_ts::test_utils::{monthly_plant, PRODUCT};

    fn products() -> Vec<String> {
        vec![PRODUCT.to_string()]
    }

    fn seeded() -> AepConfig {
        AepConfig {
            seed: Some(42),
            ..AepConfig::default()
        }
    }

    #[test]
    fn rejects_bad_run_inputs() {
        let engine = MonteCarloAep::new(&monthly_plant(24, 10.0, 0.0, 0.0), seeded()).unwrap();
        assert!(engine.run(0, &products()).unwrap_err().is_config());
        assert!(engine.run(5, &[]).unwrap_err().is_config());
        assert!(engine.run(5, &["era5".to_string()]).unwrap_err().is_config());
    }

    #[test]
    fn power_curve_filter_needs_capacity() {
        let mut plant = monthly_plant(24, 10.0, 0.0, 0.0);
        plant.capacity_mw = None;
        let config = AepConfig {
            power_curve_filter: true,
            ..seeded()
        };
        assert!(MonteCarloAep::new(&plant, config).unwrap_err().is_config());
    }

    #[test]
    fn from_table_checks_resolution() {
        let engine = MonteCarloAep::new(&monthly_plant(24, 10.0, 0.0, 0.0), seeded()).unwrap();
        let daily = AepConfig {
            time_resolution: "D".into(),
            ..seeded()
        };
        let err = MonteCarloAep::from_table(engine.table().clone(), daily, None).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn table_edits_do_not_leak_into_clones() {
        let mut engine = MonteCarloAep::new(&monthly_plant(24, 10.0, 0.0, 0.0), seeded()).unwrap();
        let snapshot = engine.clone();
        let first = engine.table().records()[0].period;
        engine
            .table_mut()
            .mark_atypical(&[first], aep_ts::LossKind::Availability);
        assert!(!engine.table().records()[0].availability_typical);
        assert!(snapshot.table().records()[0].availability_typical);
    }

    #[test]
    fn monthly_scaling_uses_long_term_days() {
        #[derive(Debug)]
        struct Constant;
        impl Predictor for Constant {
            fn predict(&self, _: &[f64]) -> f64 {
                30.0
            }
        }
        let features = vec![1.0];
        let keys = TimeResolution::Monthly.calendar_keys();
        let total = annual_gross(&Constant, TimeResolution::Monthly, keys.iter().map(|k| (*k, &features)));
        assert!((total - 365.25).abs() < 1e-9);
    }
}
