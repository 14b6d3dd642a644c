//! Energy-vs-wind regression models.
//!
//! Every model implements [`Regressor`]: fit on a feature matrix (rows in
//! regression-channel order) and return a boxed [`Predictor`]. The linear
//! model is fitted directly; the machine-learning models are wrapped in a
//! [`RandomSearch`] that picks hyperparameters by k-fold cross-validation.

use std::fmt::Debug;

use rand::rngs::StdRng;
use serde::Serialize;

use aep_core::{AepError, AepResult, RegressionModel};

mod ensemble;
mod gam;
mod linear;
mod search;
mod tree;

pub use ensemble::{ExtraTrees, GradientBoosting};
pub use gam::AdditiveSplines;
pub use linear::{LinearFit, OrdinaryLeastSquares};
pub use search::RandomSearch;
pub use tree::{RegressionTree, Splitter, TreeParams};

/// A fitted model.
pub trait Predictor: Debug + Send + Sync {
    fn predict(&self, features: &[f64]) -> f64;

    fn predict_many(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|row| self.predict(row)).collect()
    }

    /// Slopes (channel order) and intercept, for linear models.
    fn linear_terms(&self) -> Option<(&[f64], f64)> {
        None
    }
}

/// Fitting strategy for one model family.
pub trait Regressor: Send + Sync {
    fn name(&self) -> &'static str;

    fn fit(&self, x: &[Vec<f64>], y: &[f64], rng: &mut StdRng) -> AepResult<Box<dyn Predictor>>;
}

/// Regressor for the configured model.
pub fn regressor_for(model: RegressionModel, iterations: usize, folds: usize) -> Box<dyn Regressor> {
    match model {
        RegressionModel::Linear => Box::new(OrdinaryLeastSquares),
        other => Box::new(RandomSearch::new(other, iterations, folds)),
    }
}

/// Fit quality of one simulation's regression.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FitReport {
    /// Slopes in channel order (linear model only)
    pub coefficients: Option<Vec<f64>>,
    pub intercept: Option<f64>,
    pub r2: f64,
    pub mse: f64,
    pub samples: usize,
}

/// Fit `regressor` and score it on its own training data.
pub fn fit_with_report(
    regressor: &dyn Regressor,
    x: &[Vec<f64>],
    y: &[f64],
    rng: &mut StdRng,
) -> AepResult<(Box<dyn Predictor>, FitReport)> {
    check_shape(x, y)?;
    let predictor = regressor.fit(x, y, rng)?;
    let predicted = predictor.predict_many(x);
    let (coefficients, intercept) = match predictor.linear_terms() {
        Some((slopes, intercept)) => (Some(slopes.to_vec()), Some(intercept)),
        None => (None, None),
    };
    let report = FitReport {
        coefficients,
        intercept,
        r2: r2_score(y, &predicted),
        mse: mean_squared_error(y, &predicted),
        samples: y.len(),
    };
    Ok((predictor, report))
}

pub(crate) fn check_shape(x: &[Vec<f64>], y: &[f64]) -> AepResult<usize> {
    if x.len() != y.len() {
        return Err(AepError::Regression(format!(
            "{} feature rows but {} targets",
            x.len(),
            y.len()
        )));
    }
    if y.is_empty() {
        return Err(AepError::Regression("no samples to fit".into()));
    }
    let width = x[0].len();
    if width == 0 || x.iter().any(|row| row.len() != width) {
        return Err(AepError::Regression(
            "feature rows must share a non-zero width".into(),
        ));
    }
    Ok(width)
}

pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return f64::NAN;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / actual.len() as f64
}

/// Coefficient of determination. A constant target scores 1 when predicted
/// exactly and 0 otherwise.
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return f64::NAN;
    }
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    if ss_tot == 0.0 {
        if ss_res == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - ss_res / ss_tot
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
