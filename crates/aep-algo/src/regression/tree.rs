use rand::rngs::StdRng;
use rand::seq::index;
use rand::Rng;

use aep_core::AepResult;

use super::{check_shape, mean, Predictor};

/// How a node picks its split threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Splitter {
    /// Exhaustive search over midpoints between sorted values
    Best,
    /// One uniform threshold per candidate feature
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split; `None` considers all
    pub max_features: Option<usize>,
    pub splitter: Splitter,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            splitter: Splitter::Best,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// CART regression tree with squared-error splits.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct Candidate {
    feature: usize,
    threshold: f64,
    score: f64,
}

impl RegressionTree {
    pub fn fit(
        x: &[Vec<f64>],
        y: &[f64],
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> AepResult<Self> {
        let indices: Vec<usize> = (0..y.len()).collect();
        Self::fit_rows(x, y, indices, params, rng)
    }

    /// Fit on the subset of rows named by `indices`.
    pub fn fit_rows(
        x: &[Vec<f64>],
        y: &[f64],
        indices: Vec<usize>,
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> AepResult<Self> {
        let width = check_shape(x, y)?;
        let mut tree = Self { nodes: Vec::new() };
        let mut builder = Builder {
            x,
            y,
            width,
            params,
            rng,
        };
        builder.grow(&mut tree.nodes, indices, 0);
        Ok(tree)
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], at: usize) -> usize {
            match nodes[at] {
                Node::Leaf(_) => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, left).max(walk(nodes, right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }
}

impl Predictor for RegressionTree {
    fn predict(&self, features: &[f64]) -> f64 {
        let mut at = 0;
        loop {
            match self.nodes.get(at) {
                Some(Node::Leaf(value)) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    at = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                None => return f64::NAN,
            }
        }
    }
}

struct Builder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [f64],
    width: usize,
    params: &'a TreeParams,
    rng: &'a mut StdRng,
}

impl Builder<'_> {
    /// Append the subtree for `rows` and return its root index.
    fn grow(&mut self, nodes: &mut Vec<Node>, rows: Vec<usize>, depth: usize) -> usize {
        let targets: Vec<f64> = rows.iter().map(|&i| self.y[i]).collect();
        let value = mean(&targets);
        let at = nodes.len();
        nodes.push(Node::Leaf(value));

        let depth_reached = self.params.max_depth.is_some_and(|max| depth >= max);
        let pure = targets.iter().all(|t| *t == targets[0]);
        if depth_reached || pure || rows.len() < self.params.min_samples_split.max(2) {
            return at;
        }

        let Some(best) = self.best_split(&rows) else {
            return at;
        };
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&i| self.x[i][best.feature] <= best.threshold);

        let left = self.grow(nodes, left_rows, depth + 1);
        let right = self.grow(nodes, right_rows, depth + 1);
        nodes[at] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        at
    }

    fn best_split(&mut self, rows: &[usize]) -> Option<Candidate> {
        let k = self
            .params
            .max_features
            .map_or(self.width, |m| m.clamp(1, self.width));
        let features = if k < self.width {
            index::sample(&mut *self.rng, self.width, k).into_vec()
        } else {
            (0..self.width).collect()
        };

        let mut best: Option<Candidate> = None;
        for feature in features {
            let found = match self.params.splitter {
                Splitter::Best => self.exhaustive(rows, feature),
                Splitter::Random => self.random(rows, feature),
            };
            if let Some(candidate) = found {
                if best.as_ref().map_or(true, |b| candidate.score > b.score) {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    fn exhaustive(&self, rows: &[usize], feature: usize) -> Option<Candidate> {
        let mut sorted: Vec<(f64, f64)> = rows
            .iter()
            .map(|&i| (self.x[i][feature], self.y[i]))
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let n = sorted.len();
        let total: f64 = sorted.iter().map(|(_, t)| t).sum();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let mut left_sum = 0.0;
        let mut best: Option<Candidate> = None;
        for split in 1..n {
            left_sum += sorted[split - 1].1;
            if sorted[split - 1].0 == sorted[split].0 || split < min_leaf || n - split < min_leaf {
                continue;
            }
            let score = proxy(left_sum, split, total - left_sum, n - split);
            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(Candidate {
                    feature,
                    threshold: (sorted[split - 1].0 + sorted[split].0) / 2.0,
                    score,
                });
            }
        }
        best
    }

    fn random(&mut self, rows: &[usize], feature: usize) -> Option<Candidate> {
        let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
            let v = self.x[i][feature];
            (lo.min(v), hi.max(v))
        });
        if !(lo < hi) {
            return None;
        }
        let threshold = self.rng.gen_range(lo..hi);

        let (mut left_sum, mut left_n, mut right_sum, mut right_n) = (0.0, 0, 0.0, 0);
        for &i in rows {
            if self.x[i][feature] <= threshold {
                left_sum += self.y[i];
                left_n += 1;
            } else {
                right_sum += self.y[i];
                right_n += 1;
            }
        }
        let min_leaf = self.params.min_samples_leaf.max(1);
        if left_n < min_leaf || right_n < min_leaf {
            return None;
        }
        Some(Candidate {
            feature,
            threshold,
            score: proxy(left_sum, left_n, right_sum, right_n),
        })
    }
}

/// Squared-error reduction up to a constant of the parent node.
fn proxy(left_sum: f64, left_n: usize, right_sum: f64, right_n: usize) -> f64 {
    left_sum * left_sum / left_n as f64 + right_sum * right_sum / right_n as f64
}
