//! Trend estimation
//!
//! Exponentially smoothed moving average in the style of The Hacker's Diet:
//!
//! ```text
//! trend[0] = actual[0]
//! trend[i] = trend[i-1] + α · (actual[i] - trend[i-1])
//! ```
//!
//! Weight and fat percent are smoothed independently with the same factor.

use tracing::debug;

use crate::error::ComputeError;
use crate::types::DailyPoint;

/// Smoothing factor from The Hacker's Diet (roughly a 20-day moving average)
pub const SMOOTHING_FACTOR: f64 = 0.1;

/// Trend estimator applied to a gap-filled daily series
#[derive(Debug, Clone, Copy)]
pub struct TrendEstimator {
    smoothing: f64,
}

impl Default for TrendEstimator {
    fn default() -> Self {
        Self {
            smoothing: SMOOTHING_FACTOR,
        }
    }
}

impl TrendEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an estimator with a custom smoothing factor in (0, 1)
    pub fn with_smoothing(smoothing: f64) -> Result<Self, ComputeError> {
        if !(smoothing > 0.0 && smoothing < 1.0) {
            return Err(ComputeError::InvalidParameter(format!(
                "smoothing factor must be in (0, 1), got {smoothing}"
            )));
        }
        Ok(Self { smoothing })
    }

    pub fn smoothing(&self) -> f64 {
        self.smoothing
    }

    /// Populate `trend_weight` and `trend_fat_percent` for every day with an actual value
    pub fn apply(&self, mut points: Vec<DailyPoint>) -> Vec<DailyPoint> {
        let mut weight = Smoother::new(self.smoothing);
        let mut fat = Smoother::new(self.smoothing);

        for point in &mut points {
            point.trend_weight = point.actual_weight.map(|v| weight.next(v));
            point.trend_fat_percent = point.actual_fat_percent.map(|v| fat.next(v));
        }

        debug!(
            days = points.len(),
            smoothing = self.smoothing,
            last_trend_weight = ?points.last().and_then(|p| p.trend_weight),
            "computed trend series"
        );

        points
    }
}

/// Running state of one exponentially smoothed series
#[derive(Debug, Clone, Copy)]
struct Smoother {
    smoothing: f64,
    trend: Option<f64>,
}

impl Smoother {
    fn new(smoothing: f64) -> Self {
        Self {
            smoothing,
            trend: None,
        }
    }

    fn next(&mut self, actual: f64) -> f64 {
        let trend = match self.trend {
            None => actual,
            Some(prev) => prev + self.smoothing * (actual - prev),
        };
        self.trend = Some(trend);
        trend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn series(weights: &[f64]) -> Vec<DailyPoint> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        weights
            .iter()
            .enumerate()
            .map(|(i, w)| {
                let mut p = DailyPoint::empty(start + chrono::Days::new(i as u64));
                p.actual_weight = Some(*w);
                p
            })
            .collect()
    }

    #[test]
    fn test_first_value_identity() {
        let mut input = series(&[72.3, 71.0]);
        input[0].actual_fat_percent = Some(24.0);
        let points = TrendEstimator::new().apply(input);
        assert_eq!(points[0].trend_weight, Some(72.3));
        assert_eq!(points[0].trend_fat_percent, Some(24.0));
    }

    #[test]
    fn test_recurrence() {
        let points = TrendEstimator::new().apply(series(&[70.0, 70.5, 71.0]));
        let trend: Vec<f64> = points.iter().map(|p| p.trend_weight.unwrap()).collect();
        assert!((trend[0] - 70.0).abs() < 1e-9);
        assert!((trend[1] - 70.05).abs() < 1e-9);
        assert!((trend[2] - 70.145).abs() < 1e-9);
    }

    #[test]
    fn test_constant_series_stays_constant() {
        let points = TrendEstimator::new().apply(series(&[68.0; 30]));
        assert!(points.iter().all(|p| p.trend_weight == Some(68.0)));
    }

    #[test]
    fn test_converges_toward_new_level() {
        let mut weights = vec![80.0];
        weights.extend(std::iter::repeat(75.0).take(200));
        let points = TrendEstimator::new().apply(series(&weights));

        let trends: Vec<f64> = points.iter().map(|p| p.trend_weight.unwrap()).collect();
        for pair in trends.windows(2) {
            assert!(pair[1] <= pair[0]);
            assert!(pair[1] >= 75.0);
        }
        assert!((trends.last().unwrap() - 75.0).abs() < 1e-6);
    }

    #[test]
    fn test_fat_trend_starts_at_first_fat_reading() {
        let mut input = series(&[70.0, 70.0, 70.0, 70.0]);
        input[1].actual_fat_percent = Some(22.0);
        input[2].actual_fat_percent = Some(21.0);
        let points = TrendEstimator::new().apply(input);

        assert_eq!(points[0].trend_fat_percent, None);
        assert_eq!(points[1].trend_fat_percent, Some(22.0));
        assert!((points[2].trend_fat_percent.unwrap() - 21.9).abs() < 1e-9);
        assert_eq!(points[3].trend_fat_percent, None);
    }

    #[test]
    fn test_custom_smoothing() {
        assert!(TrendEstimator::with_smoothing(0.0).is_err());
        assert!(TrendEstimator::with_smoothing(1.0).is_err());
        assert!(TrendEstimator::with_smoothing(f64::NAN).is_err());

        let estimator = TrendEstimator::with_smoothing(0.5).unwrap();
        let points = estimator.apply(series(&[70.0, 72.0]));
        assert_eq!(points[1].trend_weight, Some(71.0));
    }
}
