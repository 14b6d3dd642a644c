//! Simulated AEP distribution and its summaries.

use anyhow::{Context, Result};
use polars::prelude::*;
use serde::Serialize;

use aep_core::RegressionChannel;

use crate::losses::LongTermLosses;
use crate::regression::FitReport;
use crate::sampler::SimulationParameters;

/// Output of one Monte Carlo iteration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationOutcome {
    /// Long-term annual energy net of availability loss, GWh/yr
    pub aep_gwh: f64,
    /// Long-term availability loss, fraction
    pub avail_pct: f64,
    /// Long-term curtailment loss, fraction
    pub curt_pct: f64,
    /// Long-term gross energy over period-of-record gross energy
    pub lt_por_ratio: f64,
    pub fit: FitReport,
}

/// Result table of a run, one entry per simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResults {
    pub aep_gwh: Vec<f64>,
    pub avail_pct: Vec<f64>,
    pub curt_pct: Vec<f64>,
    pub lt_por_ratio: Vec<f64>,
    pub fits: Vec<FitReport>,
    pub parameters: SimulationParameters,
    pub long_term_losses: LongTermLosses,
    pub channels: Vec<RegressionChannel>,
    /// Distinct filter keys computed during the run
    pub filter_computations: usize,
}

/// Headline statistics of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AepSummary {
    pub simulations: usize,
    pub aep_mean_gwh: f64,
    pub aep_std_gwh: f64,
    /// Standard deviation over mean
    pub aep_uncertainty: f64,
    pub avail_mean_pct: f64,
    pub curt_mean_pct: f64,
    pub lt_por_ratio_mean: f64,
    pub r2_mean: f64,
    pub long_term_losses: LongTermLosses,
    pub filter_computations: usize,
}

impl SimulationResults {
    pub fn from_outcomes(
        outcomes: Vec<SimulationOutcome>,
        parameters: SimulationParameters,
        long_term_losses: LongTermLosses,
        channels: Vec<RegressionChannel>,
        filter_computations: usize,
    ) -> Self {
        let n = outcomes.len();
        let mut results = Self {
            aep_gwh: Vec::with_capacity(n),
            avail_pct: Vec::with_capacity(n),
            curt_pct: Vec::with_capacity(n),
            lt_por_ratio: Vec::with_capacity(n),
            fits: Vec::with_capacity(n),
            parameters,
            long_term_losses,
            channels,
            filter_computations,
        };
        for outcome in outcomes {
            results.aep_gwh.push(outcome.aep_gwh);
            results.avail_pct.push(outcome.avail_pct);
            results.curt_pct.push(outcome.curt_pct);
            results.lt_por_ratio.push(outcome.lt_por_ratio);
            results.fits.push(outcome.fit);
        }
        results
    }

    pub fn len(&self) -> usize {
        self.aep_gwh.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aep_gwh.is_empty()
    }

    pub fn summary(&self) -> AepSummary {
        let aep_mean_gwh = mean(&self.aep_gwh);
        let aep_std_gwh = sample_std(&self.aep_gwh);
        let r2: Vec<f64> = self.fits.iter().map(|f| f.r2).collect();
        AepSummary {
            simulations: self.len(),
            aep_mean_gwh,
            aep_std_gwh,
            aep_uncertainty: aep_std_gwh / aep_mean_gwh,
            avail_mean_pct: mean(&self.avail_pct),
            curt_mean_pct: mean(&self.curt_pct),
            lt_por_ratio_mean: mean(&self.lt_por_ratio),
            r2_mean: mean(&r2),
            long_term_losses: self.long_term_losses,
            filter_computations: self.filter_computations,
        }
    }

    /// The four-column result table.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        DataFrame::new(vec![
            Series::new("aep_GWh", self.aep_gwh.clone()),
            Series::new("avail_pct", self.avail_pct.clone()),
            Series::new("curt_pct", self.curt_pct.clone()),
            Series::new("lt_por_ratio", self.lt_por_ratio.clone()),
        ])
        .context("assembling simulation results frame")
    }

    /// Per-simulation regression diagnostics; slope columns only for linear fits.
    pub fn diagnostics_frame(&self) -> Result<DataFrame> {
        let mut columns = vec![
            Series::new("r2", self.fits.iter().map(|f| f.r2).collect::<Vec<f64>>()),
            Series::new("mse", self.fits.iter().map(|f| f.mse).collect::<Vec<f64>>()),
            Series::new(
                "samples",
                self.fits.iter().map(|f| f.samples as u64).collect::<Vec<u64>>(),
            ),
        ];
        if self.fits.iter().any(|f| f.coefficients.is_some()) {
            for (j, channel) in self.channels.iter().enumerate() {
                let slopes: Vec<Option<f64>> = self
                    .fits
                    .iter()
                    .map(|f| f.coefficients.as_ref().and_then(|c| c.get(j).copied()))
                    .collect();
                columns.push(Series::new(&format!("slope_{}", channel.name()), slopes));
            }
            columns.push(Series::new(
                "intercept",
                self.fits.iter().map(|f| f.intercept).collect::<Vec<Option<f64>>>(),
            ));
        }
        DataFrame::new(columns).context("assembling regression diagnostics frame")
    }

    /// Parameters, results and diagnostics side by side.
    pub fn combined_frame(&self) -> Result<DataFrame> {
        let mut frame = self.parameters.to_dataframe()?;
        frame
            .hstack_mut(self.to_dataframe()?.get_columns())
            .context("joining results to parameters")?;
        frame
            .hstack_mut(self.diagnostics_frame()?.get_columns())
            .context("joining diagnostics to results")?;
        Ok(frame)
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation; zero for a single value.
fn sample_std(values: &[f64]) -> f64 {
    match values.len() {
        0 => f64::NAN,
        1 => 0.0,
        n => {
            let m = mean(values);
            (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(aep: f64) -> SimulationOutcome {
        SimulationOutcome {
            aep_gwh: aep,
            avail_pct: 0.02,
            curt_pct: 0.01,
            lt_por_ratio: 1.0,
            fit: FitReport {
                coefficients: Some(vec![1.5]),
                intercept: Some(-2.0),
                r2: 0.9,
                mse: 0.1,
                samples: 10,
            },
        }
    }

    fn results(aeps: &[f64]) -> SimulationResults {
        let parameters = SimulationParameters {
            meter_bias: vec![1.0; aeps.len()],
            loss_bias: vec![1.0; aeps.len()],
            max_power_filter_pct: vec![85; aeps.len()],
            wind_bin_thresh_centi: vec![200; aeps.len()],
            loss_threshold_pct: vec![15; aeps.len()],
            windiness_years: vec![10; aeps.len()],
            product: vec!["merra2".into(); aeps.len()],
            seed: vec![0; aeps.len()],
        };
        SimulationResults::from_outcomes(
            aeps.iter().map(|a| outcome(*a)).collect(),
            parameters,
            LongTermLosses::default(),
            vec![RegressionChannel::WindSpeed],
            1,
        )
    }

    #[test]
    fn summary_statistics() {
        let summary = results(&[100.0, 110.0, 120.0]).summary();
        assert_eq!(summary.simulations, 3);
        assert!((summary.aep_mean_gwh - 110.0).abs() < 1e-12);
        assert!((summary.aep_std_gwh - 10.0).abs() < 1e-12);
        assert!((summary.aep_uncertainty - 10.0 / 110.0).abs() < 1e-12);
        assert!((summary.r2_mean - 0.9).abs() < 1e-12);
    }

    #[test]
    fn single_simulation_has_zero_spread() {
        assert_eq!(results(&[100.0]).summary().aep_std_gwh, 0.0);
    }

    #[test]
    fn frames_have_one_row_per_simulation() {
        let results = results(&[100.0, 101.0]);
        let df = results.to_dataframe().unwrap();
        assert_eq!(df.shape(), (2, 4));
        let diag = results.diagnostics_frame().unwrap();
        assert!(diag.column("slope_windspeed").is_ok());
        assert!(diag.column("intercept").is_ok());
        let combined = results.combined_frame().unwrap();
        assert_eq!(combined.height(), 2);
        assert_eq!(combined.width(), 7 + 4 + 5);
    }
}
