use faer::{prelude::*, Mat};
use rand::rngs::StdRng;

use aep_core::{AepError, AepResult};

use super::{check_shape, mean, Predictor, Regressor};

/// Ordinary least squares with an intercept.
///
/// Solves the normal equations of the mean-centred data with faer's
/// partial-pivot LU.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrdinaryLeastSquares;

#[derive(Debug, Clone, PartialEq)]
pub struct LinearFit {
    pub slopes: Vec<f64>,
    pub intercept: f64,
}

impl Predictor for LinearFit {
    fn predict(&self, features: &[f64]) -> f64 {
        self.intercept
            + self
                .slopes
                .iter()
                .zip(features)
                .map(|(b, x)| b * x)
                .sum::<f64>()
    }

    fn linear_terms(&self) -> Option<(&[f64], f64)> {
        Some((&self.slopes, self.intercept))
    }
}

impl OrdinaryLeastSquares {
    pub fn fit_linear(&self, x: &[Vec<f64>], y: &[f64]) -> AepResult<LinearFit> {
        let p = check_shape(x, y)?;
        let n = y.len();
        if n < p + 1 {
            return Err(AepError::Regression(format!(
                "linear regression on {p} input(s) needs at least {} samples, got {n}",
                p + 1
            )));
        }

        let x_mean: Vec<f64> = (0..p)
            .map(|j| x.iter().map(|row| row[j]).sum::<f64>() / n as f64)
            .collect();
        let y_mean = mean(y);

        let mut gram = Mat::<f64>::zeros(p, p);
        let mut rhs = Mat::<f64>::zeros(p, 1);
        for (row, target) in x.iter().zip(y) {
            let dy = target - y_mean;
            for i in 0..p {
                let di = row[i] - x_mean[i];
                rhs.write(i, 0, rhs.read(i, 0) + di * dy);
                for j in 0..p {
                    gram.write(i, j, gram.read(i, j) + di * (row[j] - x_mean[j]));
                }
            }
        }

        if let Some(j) = (0..p).find(|&j| gram.read(j, j).abs() < f64::EPSILON) {
            return Err(AepError::Regression(format!(
                "input {j} is constant across the regression sample"
            )));
        }

        let lu = gram.partial_piv_lu();
        let solution = lu.solve(&rhs);
        let slopes: Vec<f64> = (0..p).map(|i| solution.read(i, 0)).collect();
        if slopes.iter().any(|b| !b.is_finite()) {
            return Err(AepError::Regression(
                "singular regression matrix".into(),
            ));
        }

        let intercept = y_mean
            - slopes
                .iter()
                .zip(&x_mean)
                .map(|(b, m)| b * m)
                .sum::<f64>();
        Ok(LinearFit { slopes, intercept })
    }
}

impl Regressor for OrdinaryLeastSquares {
    fn name(&self) -> &'static str {
        "lin"
    }

    fn fit(&self, x: &[Vec<f64>], y: &[f64], _rng: &mut StdRng) -> AepResult<Box<dyn Predictor>> {
        Ok(Box::new(self.fit_linear(x, y)?))
    }
}
