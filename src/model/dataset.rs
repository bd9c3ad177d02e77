/// Row-major feature matrix with one target per row.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    pub features: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

impl Dataset {
    pub fn new(feature_names: Vec<String>) -> Self {
        Self {
            feature_names,
            features: Vec::new(),
            targets: Vec::new(),
        }
    }

    pub fn add_sample(&mut self, features: Vec<f64>, target: f64) {
        self.features.push(features);
        self.targets.push(target);
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn num_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|n| n == name)
    }

    /// Same rows, targets replaced by `f(target)`.
    pub fn map_targets(&self, f: impl Fn(f64) -> f64) -> Dataset {
        Dataset {
            feature_names: self.feature_names.clone(),
            features: self.features.clone(),
            targets: self.targets.iter().map(|t| f(*t)).collect(),
        }
    }
}
