//! Quantile binning of feature columns.
//!
//! Bin 0 holds missing values (NaN). A present value `v` lands in bin
//! `1 + #{edges < v}`, so `bin(v) <= b` exactly when `v <= edges[b - 1]`.

/// Per-feature strictly increasing upper edges.
#[derive(Debug, Clone)]
pub struct FeatureBins {
    edges: Vec<Vec<f64>>,
}

/// Column-major bin codes: `codes[feature][row]`.
pub type BinnedMatrix = Vec<Vec<u8>>;

impl FeatureBins {
    /// `max_bins` counts value bins and must be in `2..=255`.
    pub fn fit(features: &[Vec<f64>], n_features: usize, max_bins: usize) -> Self {
        let max_edges = max_bins.clamp(2, 255) - 1;
        let edges = (0..n_features)
            .map(|f| {
                let mut values: Vec<f64> = features
                    .iter()
                    .map(|row| row[f])
                    .filter(|v| !v.is_nan())
                    .collect();
                values.sort_by(|a, b| a.total_cmp(b));
                column_edges(&values, max_edges)
            })
            .collect();
        Self { edges }
    }

    pub fn n_features(&self) -> usize {
        self.edges.len()
    }

    pub fn n_bins(&self, feature: usize) -> usize {
        self.edges[feature].len() + 2
    }

    pub fn bin_value(&self, feature: usize, value: f64) -> u8 {
        if value.is_nan() {
            return 0;
        }
        let edges = &self.edges[feature];
        (1 + edges.partition_point(|e| *e < value)) as u8
    }

    /// Raw-value threshold equivalent to "bin <= `bin`".
    pub fn threshold(&self, feature: usize, bin: u8) -> f64 {
        match bin {
            0 => f64::NEG_INFINITY,
            b => self.edges[feature]
                .get(b as usize - 1)
                .copied()
                .unwrap_or(f64::INFINITY),
        }
    }

    pub fn transform(&self, features: &[Vec<f64>]) -> BinnedMatrix {
        (0..self.n_features())
            .map(|f| features.iter().map(|row| self.bin_value(f, row[f])).collect())
            .collect()
    }
}

fn column_edges(sorted: &[f64], max_edges: usize) -> Vec<f64> {
    let mut distinct = sorted.to_vec();
    distinct.dedup();

    if distinct.len() <= 1 {
        return Vec::new();
    }

    // Few distinct values: one bin each, split halfway between neighbours
    if distinct.len() <= max_edges + 1 {
        return distinct.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
    }

    let n = sorted.len();
    let mut edges: Vec<f64> = (1..=max_edges)
        .map(|q| sorted[(q * n / (max_edges + 1)).min(n - 1)])
        .collect();
    edges.dedup();
    // The largest value must stay in a bin above the last edge
    if edges.last() == sorted.last() {
        edges.pop();
    }
    edges
}
