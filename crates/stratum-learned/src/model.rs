//! Regression models used as RMI nodes.

/// A fitted function from key feature to estimated position.
///
/// Implementations are built from `(key, position)` pairs in one shot and
/// never updated afterwards. Fitting an empty training set must produce a
/// model that predicts `0.0` everywhere.
pub trait RegressionModel: Clone + std::fmt::Debug + Send + Sync {
    /// Fits a model to parallel slices of key features and positions.
    fn fit(keys: &[f64], positions: &[f64]) -> Self;

    /// Estimates the position of a key.
    fn predict(&self, key: f64) -> f64;
}

/// Ordinary least-squares line: `position = slope * key + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LinearModel {
    slope: f64,
    intercept: f64,
}

impl LinearModel {
    pub fn new(slope: f64, intercept: f64) -> Self {
        Self { slope, intercept }
    }

    pub fn slope(&self) -> f64 {
        self.slope
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

impl RegressionModel for LinearModel {
    fn fit(keys: &[f64], positions: &[f64]) -> Self {
        let n = keys.len().min(positions.len());
        if n == 0 {
            return Self::default();
        }

        let inv_n = 1.0 / n as f64;
        let mean_x = keys[..n].iter().sum::<f64>() * inv_n;
        let mean_y = positions[..n].iter().sum::<f64>() * inv_n;

        // Centered sums keep precision for large key magnitudes.
        let mut sxx = 0.0;
        let mut sxy = 0.0;
        for (x, y) in keys[..n].iter().zip(&positions[..n]) {
            let dx = x - mean_x;
            sxx += dx * dx;
            sxy += dx * (y - mean_y);
        }

        if sxx == 0.0 || !sxx.is_finite() || !sxy.is_finite() {
            // Single distinct key: predict the mean position.
            return Self::new(0.0, mean_y);
        }
        let slope = sxy / sxx;
        Self::new(slope, mean_y - slope * mean_x)
    }

    #[inline]
    fn predict(&self, key: f64) -> f64 {
        self.slope.mul_add(key, self.intercept)
    }
}
