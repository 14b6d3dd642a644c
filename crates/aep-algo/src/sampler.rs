//! Per-simulation random inputs, drawn once per run.

use anyhow::{Context, Result};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::Serialize;

use aep_core::{AepError, AepResult};

use crate::config::AepSettings;

/// RNG for a run: seeded when a seed is configured, from OS entropy otherwise.
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    seed.map(StdRng::seed_from_u64)
        .unwrap_or_else(StdRng::from_entropy)
}

/// Column-oriented parameter draws; index `n` belongs to simulation `n`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SimulationParameters {
    pub meter_bias: Vec<f64>,
    pub loss_bias: Vec<f64>,
    /// Whole percent of nameplate
    pub max_power_filter_pct: Vec<u32>,
    /// Hundredths of m/s
    pub wind_bin_thresh_centi: Vec<u32>,
    /// Whole percent of gross energy
    pub loss_threshold_pct: Vec<u32>,
    pub windiness_years: Vec<u32>,
    pub product: Vec<String>,
    /// Seed of each simulation's own RNG stream
    pub seed: Vec<u64>,
}

/// One simulation's row of [`SimulationParameters`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationDraw {
    pub meter_bias: f64,
    pub loss_bias: f64,
    pub max_power_filter_pct: u32,
    pub wind_bin_thresh_centi: u32,
    pub loss_threshold_pct: u32,
    pub windiness_years: u32,
    pub product: String,
    pub seed: u64,
}

impl SimulationDraw {
    pub fn max_power_filter(&self) -> f64 {
        f64::from(self.max_power_filter_pct) / 100.0
    }

    pub fn loss_threshold(&self) -> f64 {
        f64::from(self.loss_threshold_pct) / 100.0
    }

    pub fn wind_bin_thresh(&self) -> f64 {
        f64::from(self.wind_bin_thresh_centi) / 100.0
    }
}

impl SimulationParameters {
    /// Draw `num_sim` parameter sets.
    ///
    /// Products are sampled without replacement from the product list with
    /// every entry repeated `num_sim` times.
    pub fn draw(
        settings: &AepSettings,
        num_sim: usize,
        products: &[String],
        rng: &mut StdRng,
    ) -> AepResult<Self> {
        if products.is_empty() {
            return Err(AepError::Config(
                "at least one reanalysis product is required".into(),
            ));
        }

        let meter = normal(settings.uncertainty_meter, "uncertainty_meter")?;
        let losses = normal(settings.uncertainty_losses, "uncertainty_losses")?;
        let uniform = |rng: &mut StdRng, (lo, hi): (u32, u32)| -> Vec<u32> {
            (0..num_sim).map(|_| rng.gen_range(lo..=hi)).collect()
        };

        let max_power_filter_pct = uniform(rng, settings.max_power_filter_pct);
        let wind_bin_thresh_centi = uniform(rng, settings.wind_bin_thresh_centi);
        let meter_bias = (0..num_sim).map(|_| meter.sample(rng)).collect();
        let loss_bias = (0..num_sim).map(|_| losses.sample(rng)).collect();
        let windiness_years = uniform(rng, settings.windiness_years);
        let loss_threshold_pct = uniform(rng, settings.loss_max_pct);

        let pool: Vec<&String> = products
            .iter()
            .flat_map(|p| std::iter::repeat(p).take(num_sim))
            .collect();
        let product = index::sample(rng, pool.len(), num_sim)
            .into_iter()
            .map(|i| pool[i].clone())
            .collect();
        let seed = (0..num_sim).map(|_| rng.gen::<u64>()).collect();

        Ok(Self {
            meter_bias,
            loss_bias,
            max_power_filter_pct,
            wind_bin_thresh_centi,
            loss_threshold_pct,
            windiness_years,
            product,
            seed,
        })
    }

    pub fn len(&self) -> usize {
        self.seed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seed.is_empty()
    }

    /// Parameters of simulation `n`.
    pub fn get(&self, n: usize) -> Option<SimulationDraw> {
        Some(SimulationDraw {
            meter_bias: *self.meter_bias.get(n)?,
            loss_bias: *self.loss_bias.get(n)?,
            max_power_filter_pct: *self.max_power_filter_pct.get(n)?,
            wind_bin_thresh_centi: *self.wind_bin_thresh_centi.get(n)?,
            loss_threshold_pct: *self.loss_threshold_pct.get(n)?,
            windiness_years: *self.windiness_years.get(n)?,
            product: self.product.get(n)?.clone(),
            seed: *self.seed.get(n)?,
        })
    }

    /// One row per simulation, for slicing results by input.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let fraction = |values: &[u32]| -> Vec<f64> {
            values.iter().map(|v| f64::from(*v) / 100.0).collect()
        };
        DataFrame::new(vec![
            Series::new("metered_energy_fraction", self.meter_bias.clone()),
            Series::new("loss_fraction", self.loss_bias.clone()),
            Series::new("max_power_filter", fraction(&self.max_power_filter_pct)),
            Series::new("wind_bin_thresh", fraction(&self.wind_bin_thresh_centi)),
            Series::new("loss_threshold", fraction(&self.loss_threshold_pct)),
            Series::new("num_years_windiness", self.windiness_years.clone()),
            Series::new("reanalysis_product", self.product.clone()),
        ])
        .context("assembling simulation parameter frame")
    }
}

fn normal(sd: f64, name: &str) -> AepResult<Normal<f64>> {
    Normal::new(1.0, sd).map_err(|err| AepError::Config(format!("{name}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AepConfig;

    fn settings() -> AepSettings {
        AepConfig::default().validate().unwrap()
    }

    #[test]
    fn draws_respect_bounds() {
        let mut rng = seeded_rng(Some(11));
        let products = vec!["merra2".to_string(), "era5".to_string()];
        let params = SimulationParameters::draw(&settings(), 500, &products, &mut rng).unwrap();
        assert_eq!(params.len(), 500);
        assert!(params.max_power_filter_pct.iter().all(|p| (80..=90).contains(p)));
        assert!(params.windiness_years.iter().all(|y| (10..=20).contains(y)));
        assert!(params.loss_threshold_pct.iter().all(|p| (10..=20).contains(p)));
        assert!(params.wind_bin_thresh_centi.iter().all(|p| (100..=300).contains(p)));
        assert!(params.product.iter().any(|p| p == "era5"));
        assert!(params.product.iter().any(|p| p == "merra2"));
        let draw = params.get(0).unwrap();
        assert!((0.8..=0.9).contains(&draw.max_power_filter()));
        assert!(params.get(500).is_none());
    }

    #[test]
    fn same_seed_same_draws() {
        let products = vec!["merra2".to_string()];
        let a = SimulationParameters::draw(&settings(), 50, &products, &mut seeded_rng(Some(3)))
            .unwrap();
        let b = SimulationParameters::draw(&settings(), 50, &products, &mut seeded_rng(Some(3)))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn zero_uncertainty_gives_unit_bias() {
        let config = AepConfig {
            uncertainty_meter: 0.0,
            ..AepConfig::default()
        };
        let params = SimulationParameters::draw(
            &config.validate().unwrap(),
            10,
            &["merra2".to_string()],
            &mut seeded_rng(Some(1)),
        )
        .unwrap();
        assert!(params.meter_bias.iter().all(|b| *b == 1.0));
    }

    #[test]
    fn empty_product_list_rejected() {
        let err = SimulationParameters::draw(&settings(), 5, &[], &mut seeded_rng(Some(1)))
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn parameter_frame_has_one_row_per_simulation() {
        let params = SimulationParameters::draw(
            &settings(),
            7,
            &["merra2".to_string()],
            &mut seeded_rng(Some(5)),
        )
        .unwrap();
        let df = params.to_dataframe().unwrap();
        assert_eq!(df.height(), 7);
        assert_eq!(df.width(), 7);
    }
}
