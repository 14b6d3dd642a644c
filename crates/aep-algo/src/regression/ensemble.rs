use rand::rngs::StdRng;
use rand::seq::index;

use aep_core::{AepError, AepResult};

use super::tree::{RegressionTree, Splitter, TreeParams};
use super::{check_shape, mean, Predictor, Regressor};

/// Extremely randomized trees: every tree sees all rows and splits on random
/// thresholds; predictions are the tree average.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtraTrees {
    pub n_estimators: usize,
    pub tree: TreeParams,
}

impl Default for ExtraTrees {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            tree: TreeParams {
                splitter: Splitter::Random,
                ..TreeParams::default()
            },
        }
    }
}

#[derive(Debug, Clone)]
struct Forest {
    trees: Vec<RegressionTree>,
}

impl Predictor for Forest {
    fn predict(&self, features: &[f64]) -> f64 {
        self.trees.iter().map(|t| t.predict(features)).sum::<f64>() / self.trees.len() as f64
    }
}

impl Regressor for ExtraTrees {
    fn name(&self) -> &'static str {
        "etr"
    }

    fn fit(&self, x: &[Vec<f64>], y: &[f64], rng: &mut StdRng) -> AepResult<Box<dyn Predictor>> {
        check_shape(x, y)?;
        if self.n_estimators == 0 {
            return Err(AepError::Regression("n_estimators must be at least 1".into()));
        }
        let params = TreeParams {
            splitter: Splitter::Random,
            ..self.tree
        };
        let trees = (0..self.n_estimators)
            .map(|_| RegressionTree::fit(x, y, &params, rng))
            .collect::<AepResult<Vec<_>>>()?;
        Ok(Box::new(Forest { trees }))
    }
}

/// Least-squares gradient boosting from the target mean.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientBoosting {
    pub n_estimators: usize,
    pub learning_rate: f64,
    /// Row fraction drawn without replacement for each stage
    pub subsample: f64,
    pub tree: TreeParams,
}

impl Default for GradientBoosting {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            subsample: 1.0,
            tree: TreeParams {
                max_depth: Some(3),
                ..TreeParams::default()
            },
        }
    }
}

#[derive(Debug, Clone)]
struct Boosted {
    init: f64,
    learning_rate: f64,
    stages: Vec<RegressionTree>,
}

impl Predictor for Boosted {
    fn predict(&self, features: &[f64]) -> f64 {
        self.init
            + self.learning_rate
                * self
                    .stages
                    .iter()
                    .map(|t| t.predict(features))
                    .sum::<f64>()
    }
}

impl Regressor for GradientBoosting {
    fn name(&self) -> &'static str {
        "gbm"
    }

    fn fit(&self, x: &[Vec<f64>], y: &[f64], rng: &mut StdRng) -> AepResult<Box<dyn Predictor>> {
        check_shape(x, y)?;
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(AepError::Regression(format!(
                "subsample must lie in (0, 1], got {}",
                self.subsample
            )));
        }

        let n = y.len();
        let init = mean(y);
        let mut fitted = vec![init; n];
        let stage_rows = ((self.subsample * n as f64).round() as usize).clamp(1, n);
        let mut stages = Vec::with_capacity(self.n_estimators);
        for _ in 0..self.n_estimators {
            let residuals: Vec<f64> = y.iter().zip(&fitted).map(|(t, f)| t - f).collect();
            let rows = if stage_rows < n {
                index::sample(rng, n, stage_rows).into_vec()
            } else {
                (0..n).collect()
            };
            let tree = RegressionTree::fit_rows(x, &residuals, rows, &self.tree, rng)?;
            for (f, row) in fitted.iter_mut().zip(x) {
                *f += self.learning_rate * tree.predict(row);
            }
            stages.push(tree);
        }
        Ok(Box::new(Boosted {
            init,
            learning_rate: self.learning_rate,
            stages,
        }))
    }
}
