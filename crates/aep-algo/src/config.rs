//! Construction inputs of the Monte Carlo engine.
//!
//! [`AepConfig`] is the serialisable form (TOML on disk, defaults for every
//! field). [`AepConfig::validate`] turns it into [`AepSettings`], the checked
//! and parsed form the engine actually runs on. Every configuration error is
//! raised there, before any data is touched.

use serde::{Deserialize, Serialize};

use aep_core::{parse_flag, AepError, AepResult, RegressionChannel, RegressionModel, TimeResolution};
use aep_ts::TableSettings;

/// Boolean-like regression flag: `true`/`false` or the legacy `"Y"`/`"N"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Text(String),
}

impl Flag {
    pub fn resolve(&self, name: &str) -> AepResult<bool> {
        match self {
            Flag::Bool(value) => Ok(*value),
            Flag::Text(text) => parse_flag(name, text),
        }
    }
}

impl Default for Flag {
    fn default() -> Self {
        Flag::Bool(false)
    }
}

impl From<bool> for Flag {
    fn from(value: bool) -> Self {
        Flag::Bool(value)
    }
}

/// Monte Carlo AEP configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AepConfig {
    /// Standard deviation of the revenue meter bias
    #[serde(default = "default_uncertainty_meter")]
    pub uncertainty_meter: f64,
    /// Standard deviation of the reported loss bias
    #[serde(default = "default_uncertainty_losses")]
    pub uncertainty_losses: f64,
    /// Years of reanalysis used for the windiness correction, inclusive
    #[serde(default = "default_uncertainty_windiness")]
    pub uncertainty_windiness: (u32, u32),
    /// Wind-bin filter threshold range, m/s
    #[serde(default = "default_uncertainty_wind_bin_thresh")]
    pub uncertainty_wind_bin_thresh: (f64, f64),
    /// Combined availability + curtailment loss threshold range, percent
    #[serde(default = "default_uncertainty_loss_max")]
    pub uncertainty_loss_max: (u32, u32),
    /// Maximum power filter range, fraction of nameplate
    #[serde(default = "default_uncertainty_max_power_filter")]
    pub uncertainty_max_power_filter: (f64, f64),
    /// Missing-data fraction above which a period is flagged
    #[serde(default = "default_uncertainty_nan_energy")]
    pub uncertainty_nan_energy: f64,
    #[serde(default = "default_time_resolution")]
    pub time_resolution: String,
    #[serde(default = "default_reg_model")]
    pub reg_model: String,
    #[serde(default)]
    pub reg_temperature: Flag,
    #[serde(default)]
    pub reg_winddirection: Flag,
    /// RNG seed; `None` draws from OS entropy
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_subsample_fraction")]
    pub subsample_fraction: f64,
    #[serde(default = "default_ml_search_iterations")]
    pub ml_search_iterations: usize,
    #[serde(default = "default_ml_cv_folds")]
    pub ml_cv_folds: usize,
    /// Also drop periods whose energy falls outside the power-curve window
    #[serde(default)]
    pub power_curve_filter: bool,
    /// Run simulations on the rayon thread pool
    #[serde(default)]
    pub parallel: bool,
}

impl Default for AepConfig {
    fn default() -> Self {
        Self {
            uncertainty_meter: default_uncertainty_meter(),
            uncertainty_losses: default_uncertainty_losses(),
            uncertainty_windiness: default_uncertainty_windiness(),
            uncertainty_wind_bin_thresh: default_uncertainty_wind_bin_thresh(),
            uncertainty_loss_max: default_uncertainty_loss_max(),
            uncertainty_max_power_filter: default_uncertainty_max_power_filter(),
            uncertainty_nan_energy: default_uncertainty_nan_energy(),
            time_resolution: default_time_resolution(),
            reg_model: default_reg_model(),
            reg_temperature: Flag::default(),
            reg_winddirection: Flag::default(),
            seed: None,
            subsample_fraction: default_subsample_fraction(),
            ml_search_iterations: default_ml_search_iterations(),
            ml_cv_folds: default_ml_cv_folds(),
            power_curve_filter: false,
            parallel: false,
        }
    }
}

fn default_uncertainty_meter() -> f64 {
    0.005
}

fn default_uncertainty_losses() -> f64 {
    0.05
}

fn default_uncertainty_windiness() -> (u32, u32) {
    (10, 20)
}

fn default_uncertainty_wind_bin_thresh() -> (f64, f64) {
    (1.0, 3.0)
}

fn default_uncertainty_loss_max() -> (u32, u32) {
    (10, 20)
}

fn default_uncertainty_max_power_filter() -> (f64, f64) {
    (0.8, 0.9)
}

fn default_uncertainty_nan_energy() -> f64 {
    0.01
}

fn default_time_resolution() -> String {
    "M".to_string()
}

fn default_reg_model() -> String {
    "lin".to_string()
}

fn default_subsample_fraction() -> f64 {
    0.8
}

fn default_ml_search_iterations() -> usize {
    5
}

fn default_ml_cv_folds() -> usize {
    2
}

/// Validated engine settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AepSettings {
    pub uncertainty_meter: f64,
    pub uncertainty_losses: f64,
    pub windiness_years: (u32, u32),
    /// Whole hundredths of m/s
    pub wind_bin_thresh_centi: (u32, u32),
    /// Whole percent
    pub loss_max_pct: (u32, u32),
    /// Whole percent
    pub max_power_filter_pct: (u32, u32),
    pub nan_threshold: f64,
    pub resolution: TimeResolution,
    pub model: RegressionModel,
    pub temperature: bool,
    pub wind_direction: bool,
    pub seed: Option<u64>,
    pub subsample_fraction: f64,
    pub ml_search_iterations: usize,
    pub ml_cv_folds: usize,
    pub power_curve_filter: bool,
    pub parallel: bool,
}

impl AepSettings {
    pub fn table_settings(&self) -> TableSettings {
        TableSettings {
            resolution: self.resolution,
            nan_threshold: self.nan_threshold,
            temperature: self.temperature,
            wind_direction: self.wind_direction,
        }
    }

    pub fn channels(&self) -> Vec<RegressionChannel> {
        RegressionChannel::active(self.temperature, self.wind_direction)
    }
}

impl AepConfig {
    /// Check every field and parse the textual ones.
    pub fn validate(&self) -> AepResult<AepSettings> {
        let resolution: TimeResolution = self.time_resolution.parse()?;
        let model: RegressionModel = self.reg_model.parse()?;
        let temperature = self.reg_temperature.resolve("reg_temperature")?;
        let wind_direction = self.reg_winddirection.resolve("reg_winddirection")?;

        if model.is_machine_learning() && resolution == TimeResolution::Monthly {
            return Err(AepError::Config(format!(
                "monthly time resolution only supports linear regression, got reg_model '{model}'"
            )));
        }

        non_negative("uncertainty_meter", self.uncertainty_meter)?;
        non_negative("uncertainty_losses", self.uncertainty_losses)?;
        within("uncertainty_nan_energy", self.uncertainty_nan_energy, 0.0, 1.0)?;

        let (years_lo, years_hi) = self.uncertainty_windiness;
        ordered("uncertainty_windiness", f64::from(years_lo), f64::from(years_hi))?;
        if years_lo < 1 {
            return Err(AepError::Config(
                "uncertainty_windiness lower bound must be at least one year".into(),
            ));
        }

        let (bin_lo, bin_hi) = self.uncertainty_wind_bin_thresh;
        non_negative("uncertainty_wind_bin_thresh", bin_lo)?;
        ordered("uncertainty_wind_bin_thresh", bin_lo, bin_hi)?;

        let (loss_lo, loss_hi) = self.uncertainty_loss_max;
        ordered("uncertainty_loss_max", f64::from(loss_lo), f64::from(loss_hi))?;

        let (mpf_lo, mpf_hi) = self.uncertainty_max_power_filter;
        ordered("uncertainty_max_power_filter", mpf_lo, mpf_hi)?;
        if !(mpf_lo > 0.0 && mpf_hi <= 1.0) {
            return Err(AepError::Config(format!(
                "uncertainty_max_power_filter must lie in (0, 1], got ({mpf_lo}, {mpf_hi})"
            )));
        }

        if !(self.subsample_fraction > 0.0 && self.subsample_fraction <= 1.0) {
            return Err(AepError::Config(format!(
                "subsample_fraction must lie in (0, 1], got {}",
                self.subsample_fraction
            )));
        }
        if self.ml_search_iterations == 0 {
            return Err(AepError::Config(
                "ml_search_iterations must be at least 1".into(),
            ));
        }
        if self.ml_cv_folds < 2 {
            return Err(AepError::Config(format!(
                "ml_cv_folds must be at least 2, got {}",
                self.ml_cv_folds
            )));
        }

        Ok(AepSettings {
            uncertainty_meter: self.uncertainty_meter,
            uncertainty_losses: self.uncertainty_losses,
            windiness_years: self.uncertainty_windiness,
            wind_bin_thresh_centi: (to_hundredths(bin_lo), to_hundredths(bin_hi)),
            loss_max_pct: self.uncertainty_loss_max,
            max_power_filter_pct: (to_hundredths(mpf_lo), to_hundredths(mpf_hi)),
            nan_threshold: self.uncertainty_nan_energy,
            resolution,
            model,
            temperature,
            wind_direction,
            seed: self.seed,
            subsample_fraction: self.subsample_fraction,
            ml_search_iterations: self.ml_search_iterations,
            ml_cv_folds: self.ml_cv_folds,
            power_curve_filter: self.power_curve_filter,
            parallel: self.parallel,
        })
    }
}

fn to_hundredths(value: f64) -> u32 {
    (value * 100.0).round() as u32
}

fn non_negative(name: &str, value: f64) -> AepResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(AepError::Config(format!(
            "{name} must be a finite, non-negative number, got {value}"
        )))
    }
}

fn within(name: &str, value: f64, lo: f64, hi: f64) -> AepResult<()> {
    if value.is_finite() && (lo..=hi).contains(&value) {
        Ok(())
    } else {
        Err(AepError::Config(format!(
            "{name} must lie in [{lo}, {hi}], got {value}"
        )))
    }
}

fn ordered(name: &str, lo: f64, hi: f64) -> AepResult<()> {
    if lo.is_finite() && hi.is_finite() && lo <= hi {
        Ok(())
    } else {
        Err(AepError::Config(format!(
            "{name} must be an ordered (low, high) pair, got ({lo}, {hi})"
        )))
    }
}
