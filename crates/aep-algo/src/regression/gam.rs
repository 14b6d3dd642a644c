use faer::{prelude::*, Mat};
use rand::rngs::StdRng;

use aep_core::{AepError, AepResult};

use super::{check_shape, mean, Predictor, Regressor};

/// Additive model of penalised cubic regression splines, one smooth term per
/// input.
///
/// Each input is standardised and expanded into a linear term plus truncated
/// cubic powers at quantile knots; the spline terms carry a ridge penalty of
/// `lambda` per sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdditiveSplines {
    pub n_knots: usize,
    pub lambda: f64,
}

impl Default for AdditiveSplines {
    fn default() -> Self {
        Self {
            n_knots: 5,
            lambda: 1e-3,
        }
    }
}

/// Basis of one input.
#[derive(Debug, Clone)]
struct Term {
    centre: f64,
    scale: f64,
    knots: Vec<f64>,
}

impl Term {
    fn width(&self) -> usize {
        1 + self.knots.len()
    }

    fn expand(&self, value: f64, out: &mut Vec<f64>) {
        let z = (value - self.centre) / self.scale;
        out.push(z);
        out.extend(self.knots.iter().map(|k| (z - k).max(0.0).powi(3)));
    }
}

#[derive(Debug, Clone)]
struct SplineFit {
    /// `None` for inputs that were constant in training
    terms: Vec<Option<Term>>,
    weights: Vec<f64>,
    intercept: f64,
}

impl SplineFit {
    fn basis(&self, features: &[f64]) -> Vec<f64> {
        let mut row = Vec::with_capacity(self.weights.len());
        for (term, value) in self.terms.iter().zip(features) {
            if let Some(term) = term {
                term.expand(*value, &mut row);
            }
        }
        row
    }
}

impl Predictor for SplineFit {
    fn predict(&self, features: &[f64]) -> f64 {
        self.intercept
            + self
                .basis(features)
                .iter()
                .zip(&self.weights)
                .map(|(b, w)| b * w)
                .sum::<f64>()
    }
}

impl Regressor for AdditiveSplines {
    fn name(&self) -> &'static str {
        "gam"
    }

    fn fit(&self, x: &[Vec<f64>], y: &[f64], _rng: &mut StdRng) -> AepResult<Box<dyn Predictor>> {
        let width = check_shape(x, y)?;
        let n = y.len();
        let terms: Vec<Option<Term>> = (0..width)
            .map(|j| {
                let column: Vec<f64> = x.iter().map(|row| row[j]).collect();
                self.term(&column)
            })
            .collect();
        if terms.iter().all(Option::is_none) {
            return Err(AepError::Regression(
                "every input is constant across the regression sample".into(),
            ));
        }

        let mut fit = SplineFit {
            terms,
            weights: Vec::new(),
            intercept: 0.0,
        };
        let rows: Vec<Vec<f64>> = x.iter().map(|row| fit.basis(row)).collect();
        let p = rows[0].len();
        let penalised: Vec<bool> = fit
            .terms
            .iter()
            .flatten()
            .flat_map(|t| std::iter::once(false).chain(std::iter::repeat(true).take(t.width() - 1)))
            .collect();

        let col_mean: Vec<f64> = (0..p)
            .map(|j| rows.iter().map(|r| r[j]).sum::<f64>() / n as f64)
            .collect();
        let y_mean = mean(y);

        let mut lhs = Mat::<f64>::zeros(p, p);
        let mut rhs = Mat::<f64>::zeros(p, 1);
        for (row, target) in rows.iter().zip(y) {
            let dy = target - y_mean;
            for i in 0..p {
                let di = row[i] - col_mean[i];
                rhs.write(i, 0, rhs.read(i, 0) + di * dy);
                for j in 0..p {
                    lhs.write(i, j, lhs.read(i, j) + di * (row[j] - col_mean[j]));
                }
            }
        }
        for (i, spline) in penalised.iter().enumerate() {
            let ridge = if *spline { self.lambda * n as f64 } else { 1e-10 };
            lhs.write(i, i, lhs.read(i, i) + ridge);
        }

        let solution = lhs.partial_piv_lu().solve(&rhs);
        let weights: Vec<f64> = (0..p).map(|i| solution.read(i, 0)).collect();
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(AepError::Regression("singular spline system".into()));
        }
        fit.intercept = y_mean
            - weights
                .iter()
                .zip(&col_mean)
                .map(|(w, m)| w * m)
                .sum::<f64>();
        fit.weights = weights;
        Ok(Box::new(fit))
    }
}

impl AdditiveSplines {
    fn term(&self, column: &[f64]) -> Option<Term> {
        let centre = mean(column);
        let scale = (column.iter().map(|v| (v - centre).powi(2)).sum::<f64>()
            / column.len() as f64)
            .sqrt();
        if !(scale > 0.0) {
            return None;
        }
        let mut z: Vec<f64> = column.iter().map(|v| (v - centre) / scale).collect();
        z.sort_by(f64::total_cmp);
        let mut knots: Vec<f64> = (1..=self.n_knots)
            .map(|k| {
                let at = k as f64 / (self.n_knots + 1) as f64 * (z.len() - 1) as f64;
                z[at.round() as usize]
            })
            .collect();
        knots.dedup();
        Some(Term {
            centre,
            scale,
            knots,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regression::r2_score;
    use rand::SeedableRng;

    #[test]
    fn smooth_curve_is_tracked() {
        let x: Vec<Vec<f64>> = (0..80).map(|i| vec![f64::from(i) * 0.2]).collect();
        let y: Vec<f64> = x.iter().map(|r| (r[0] / 3.0).sin() * 10.0 + r[0]).collect();
        let fit = AdditiveSplines::default()
            .fit(&x, &y, &mut StdRng::seed_from_u64(0))
            .unwrap();
        assert!(r2_score(&y, &fit.predict_many(&x)) > 0.95);
    }

    #[test]
    fn constant_input_is_ignored() {
        let x: Vec<Vec<f64>> = (0..30).map(|i| vec![f64::from(i), 4.0]).collect();
        let y: Vec<f64> = (0..30).map(|i| 2.0 * f64::from(i)).collect();
        let fit = AdditiveSplines::default()
            .fit(&x, &y, &mut StdRng::seed_from_u64(0))
            .unwrap();
        assert!((fit.predict(&[10.0, 4.0]) - 20.0).abs() < 0.5);
    }

    #[test]
    fn all_constant_inputs_rejected() {
        let x = vec![vec![1.0]; 5];
        let err = AdditiveSplines::default()
            .fit(&x, &[1.0, 2.0, 3.0, 4.0, 5.0], &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(err, AepError::Regression(_)));
    }
}
