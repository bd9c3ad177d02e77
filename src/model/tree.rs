//! Histogram-based regression tree fitted to pseudo-residuals.

use crate::model::binning::{BinnedMatrix, FeatureBins};

#[derive(Debug, Clone)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// L2 regularisation on leaf values
    pub lambda: f64,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        bin: u8,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

/// Rows that ended up in each leaf, keyed by node index.
pub type LeafRows = Vec<(usize, Vec<usize>)>;

struct SplitCandidate {
    feature: usize,
    bin: u8,
    gain: f64,
}

struct Builder<'a> {
    binned: &'a BinnedMatrix,
    bins: &'a FeatureBins,
    targets: &'a [f64],
    params: &'a TreeParams,
    importance: &'a mut [f64],
    nodes: Vec<Node>,
    leaves: LeafRows,
}

impl RegressionTree {
    /// Fit a tree on `rows` of the binned matrix against `targets` (indexed by
    /// row). Split gains are added to `importance`.
    pub fn fit(
        binned: &BinnedMatrix,
        bins: &FeatureBins,
        rows: Vec<usize>,
        targets: &[f64],
        params: &TreeParams,
        importance: &mut [f64],
    ) -> (Self, LeafRows) {
        let mut builder = Builder {
            binned,
            bins,
            targets,
            params,
            importance,
            nodes: Vec::new(),
            leaves: Vec::new(),
        };
        builder.build(rows, 0);
        (
            RegressionTree {
                nodes: builder.nodes,
            },
            builder.leaves,
        )
    }

    pub fn set_leaf_value(&mut self, node: usize, new_value: f64) {
        if let Some(Node::Leaf { value }) = self.nodes.get_mut(node) {
            *value = new_value;
        }
    }

    /// Missing values (NaN) go left.
    pub fn predict(&self, x: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    let v = x[*feature];
                    idx = if v.is_nan() || v <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn predict_binned(&self, binned: &BinnedMatrix, row: usize) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    bin,
                    left,
                    right,
                    ..
                } => {
                    idx = if binned[*feature][row] <= *bin {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

impl Builder<'_> {
    fn build(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let n = rows.len();
        let sum: f64 = rows.iter().map(|&i| self.targets[i]).sum();

        if depth >= self.params.max_depth || n < self.params.min_samples_split {
            return self.push_leaf(sum, rows);
        }

        let split = match self.best_split(&rows, sum) {
            Some(s) => s,
            None => return self.push_leaf(sum, rows),
        };

        self.importance[split.feature] += split.gain;

        let codes = &self.binned[split.feature];
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            rows.into_iter().partition(|&i| codes[i] <= split.bin);

        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf { value: 0.0 });
        let left = self.build(left_rows, depth + 1);
        let right = self.build(right_rows, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            bin: split.bin,
            threshold: self.bins.threshold(split.feature, split.bin),
            left,
            right,
        };
        idx
    }

    fn push_leaf(&mut self, sum: f64, rows: Vec<usize>) -> usize {
        let value = sum / (rows.len() as f64 + self.params.lambda);
        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf { value });
        self.leaves.push((idx, rows));
        idx
    }

    fn score(&self, sum: f64, count: usize) -> f64 {
        sum * sum / (count as f64 + self.params.lambda)
    }

    fn best_split(&self, rows: &[usize], total: f64) -> Option<SplitCandidate> {
        let n = rows.len();
        let parent = self.score(total, n);
        let min_leaf = self.params.min_samples_leaf.max(1);
        let mut best: Option<SplitCandidate> = None;

        for feature in 0..self.bins.n_features() {
            let n_bins = self.bins.n_bins(feature);
            if n_bins < 2 {
                continue;
            }

            let codes = &self.binned[feature];
            let mut hist_sum = vec![0.0; n_bins];
            let mut hist_cnt = vec![0usize; n_bins];
            for &i in rows {
                let b = codes[i] as usize;
                hist_sum[b] += self.targets[i];
                hist_cnt[b] += 1;
            }

            let mut left_sum = 0.0;
            let mut left_cnt = 0;
            for b in 0..n_bins - 1 {
                left_sum += hist_sum[b];
                left_cnt += hist_cnt[b];
                let right_cnt = n - left_cnt;
                if left_cnt < min_leaf {
                    continue;
                }
                if right_cnt < min_leaf {
                    break;
                }
                let gain = self.score(left_sum, left_cnt)
                    + self.score(total - left_sum, right_cnt)
                    - parent;
                if gain > 1e-12 && best.as_ref().map_or(true, |s| gain > s.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        bin: b as u8,
                        gain,
                    });
                }
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(depth: usize) -> TreeParams {
        TreeParams {
            max_depth: depth,
            min_samples_split: 2,
            min_samples_leaf: 1,
            lambda: 0.0,
        }
    }

    #[test]
    fn finds_the_step() {
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64, 0.0]).collect();
        let y: Vec<f64> = (0..20).map(|i| if i < 10 { 1.0 } else { 5.0 }).collect();
        let bins = FeatureBins::fit(&x, 2, 64);
        let binned = bins.transform(&x);
        let mut importance = vec![0.0; 2];

        let (tree, leaves) =
            RegressionTree::fit(&binned, &bins, (0..20).collect(), &y, &params(1), &mut importance);

        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(leaves.len(), 2);
        assert!((tree.predict(&[3.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!((tree.predict(&[12.0, 0.0]) - 5.0).abs() < 1e-9);
        assert!((tree.predict_binned(&binned, 15) - 5.0).abs() < 1e-9);
        assert!(importance[0] > 0.0);
        assert_eq!(importance[1], 0.0);
    }

    #[test]
    fn missing_values_route_left() {
        let mut x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        x.push(vec![f64::NAN]);
        let y: Vec<f64> = (0..11).map(|i| if i < 5 || i == 10 { 0.0 } else { 10.0 }).collect();
        let bins = FeatureBins::fit(&x, 1, 64);
        let binned = bins.transform(&x);
        let mut importance = vec![0.0];

        let (tree, _) =
            RegressionTree::fit(&binned, &bins, (0..11).collect(), &y, &params(3), &mut importance);

        assert!(tree.predict(&[f64::NAN]).abs() < 1e-9);
        assert!((tree.predict(&[8.0]) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn leaf_values_can_be_overwritten() {
        let x: Vec<Vec<f64>> = (0..4).map(|i| vec![i as f64]).collect();
        let y = vec![1.0, 1.0, 1.0, 1.0];
        let bins = FeatureBins::fit(&x, 1, 8);
        let binned = bins.transform(&x);
        let mut importance = vec![0.0];
        let (mut tree, leaves) =
            RegressionTree::fit(&binned, &bins, (0..4).collect(), &y, &params(2), &mut importance);

        assert_eq!(leaves.len(), 1);
        tree.set_leaf_value(leaves[0].0, 7.0);
        assert_eq!(tree.predict(&[2.0]), 7.0);
    }
}
