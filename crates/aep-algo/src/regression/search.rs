use rand::rngs::StdRng;
use rand::Rng;
use tracing::trace;

use aep_core::{AepError, AepResult, RegressionModel};

use super::ensemble::{ExtraTrees, GradientBoosting};
use super::gam::AdditiveSplines;
use super::tree::{Splitter, TreeParams};
use super::{check_shape, mean_squared_error, Predictor, Regressor};

/// Randomised hyperparameter search scored by contiguous k-fold
/// cross-validation; the winning candidate is refitted on every row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandomSearch {
    pub model: RegressionModel,
    pub iterations: usize,
    pub folds: usize,
}

impl RandomSearch {
    pub fn new(model: RegressionModel, iterations: usize, folds: usize) -> Self {
        Self {
            model,
            iterations,
            folds,
        }
    }

    /// One candidate drawn from the model's hyperparameter space.
    fn candidate(&self, width: usize, rng: &mut StdRng) -> AepResult<Box<dyn Regressor>> {
        Ok(match self.model {
            RegressionModel::ExtraTrees => Box::new(ExtraTrees {
                n_estimators: rng.gen_range(10..=60),
                tree: TreeParams {
                    max_depth: Some(rng.gen_range(4..=20)),
                    min_samples_split: rng.gen_range(2..=10),
                    min_samples_leaf: rng.gen_range(1..=5),
                    max_features: Some(rng.gen_range(1..=width)),
                    splitter: Splitter::Random,
                },
            }),
            RegressionModel::GradientBoosting => Box::new(GradientBoosting {
                n_estimators: rng.gen_range(20..=100),
                learning_rate: rng.gen_range(0.1..=0.3),
                subsample: rng.gen_range(0.5..=1.0),
                tree: TreeParams {
                    max_depth: Some(rng.gen_range(2..=6)),
                    min_samples_leaf: rng.gen_range(1..=5),
                    ..TreeParams::default()
                },
            }),
            RegressionModel::Gam => Box::new(AdditiveSplines {
                n_knots: rng.gen_range(3..=10),
                lambda: 10f64.powf(rng.gen_range(-4.0..=-1.0)),
            }),
            RegressionModel::Linear => {
                return Err(AepError::Regression(
                    "linear regression has no hyperparameters to search".into(),
                ))
            }
        })
    }

    /// Mean squared error over contiguous folds, negated so larger is better.
    fn cross_validate(
        &self,
        candidate: &dyn Regressor,
        x: &[Vec<f64>],
        y: &[f64],
        rng: &mut StdRng,
    ) -> AepResult<f64> {
        let n = y.len();
        let mut total = 0.0;
        for fold in 0..self.folds {
            let (start, end) = (fold * n / self.folds, (fold + 1) * n / self.folds);
            let train_x: Vec<Vec<f64>> = x[..start].iter().chain(&x[end..]).cloned().collect();
            let train_y: Vec<f64> = y[..start].iter().chain(&y[end..]).copied().collect();
            let model = candidate.fit(&train_x, &train_y, rng)?;
            total += mean_squared_error(&y[start..end], &model.predict_many(&x[start..end]));
        }
        Ok(-total / self.folds as f64)
    }
}

impl Regressor for RandomSearch {
    fn name(&self) -> &'static str {
        match self.model {
            RegressionModel::Linear => "lin",
            RegressionModel::GradientBoosting => "gbm",
            RegressionModel::ExtraTrees => "etr",
            RegressionModel::Gam => "gam",
        }
    }

    fn fit(&self, x: &[Vec<f64>], y: &[f64], rng: &mut StdRng) -> AepResult<Box<dyn Predictor>> {
        let width = check_shape(x, y)?;
        if y.len() < self.folds.max(2) {
            return Err(AepError::Regression(format!(
                "{}-fold cross-validation needs at least {} samples, got {}",
                self.folds,
                self.folds.max(2),
                y.len()
            )));
        }

        let mut best: Option<(f64, Box<dyn Regressor>)> = None;
        for iteration in 0..self.iterations.max(1) {
            let candidate = self.candidate(width, rng)?;
            let score = self.cross_validate(candidate.as_ref(), x, y, rng)?;
            trace!(model = self.name(), iteration, score, "search candidate");
            if best.as_ref().map_or(true, |(s, _)| score > *s) {
                best = Some((score, candidate));
            }
        }
        match best {
            Some((_, winner)) => winner.fit(x, y, rng),
            None => Err(AepError::Regression("hyperparameter search found no candidate".into())),
        }
    }
}
