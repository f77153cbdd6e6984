//! Pipeline orchestration
//!
//! This module provides the public API for Trendline.
//! It runs the full pipeline from provider bundles to a computed daily series.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::debug;

use crate::encoder::ResponseEncoder;
use crate::error::ComputeError;
use crate::interpolate::Interpolator;
use crate::merger::SourceMerger;
use crate::normalizer::{DayBoundary, Normalizer};
use crate::stats::StatsCalculator;
use crate::trend::TrendEstimator;
use crate::types::{
    DailyPoint, DerivedStats, MeasurementsResponse, Mode, ProfileParameters, SourceBundle,
    SourceSnapshot,
};

/// Compute the daily series for a set of provider bundles.
///
/// Pipeline stages:
/// 1. Normalizer - Validate bundles and apply the day boundary
/// 2. SourceMerger - Resolve one value per day and metric
/// 3. Interpolator - Fill internal gaps
/// 4. TrendEstimator - Smooth weight and fat percent
///
/// # Example
/// ```ignore
/// let points = compute_measurements(&bundles, &ProfileParameters::default())?;
/// let today = points.last().and_then(|p| p.trend_weight);
/// ```
pub fn compute_measurements(
    bundles: &[SourceBundle],
    profile: &ProfileParameters,
) -> Result<Vec<DailyPoint>, ComputeError> {
    run_pipeline(bundles, profile, &TrendEstimator::default())
}

/// Compute the series and wrap it with the snapshot's provider status.
pub fn compute_response(
    snapshot: &SourceSnapshot,
    profile: &ProfileParameters,
    is_me: bool,
) -> Result<MeasurementsResponse, ComputeError> {
    let points = compute_measurements(&snapshot.sources, profile)?;
    Ok(ResponseEncoder::new().encode(points, snapshot.provider_status.clone(), is_me))
}

fn run_pipeline(
    bundles: &[SourceBundle],
    profile: &ProfileParameters,
    estimator: &TrendEstimator,
) -> Result<Vec<DailyPoint>, ComputeError> {
    // Stage 1: Validate and assign calendar days
    let boundary = DayBoundary::new(profile.day_start_offset)?;
    let normalized = Normalizer::normalize(bundles, &boundary)?;

    // Stage 2: Merge providers into one daily series
    let merged = SourceMerger::merge_with_boundary(&normalized, &boundary)?;

    // Stage 3: Fill internal gaps
    let filled = Interpolator::fill(merged);

    // Stage 4: Smooth
    Ok(estimator.apply(filled))
}

/// Stateful processor that memoizes the last computation.
///
/// Output is a pure function of the bundles and profile, so a repeated request
/// with the same inputs is answered from the cached series.
pub struct TrendProcessor {
    profile: ProfileParameters,
    estimator: TrendEstimator,
    encoder: ResponseEncoder,
    cache: Option<(u64, Vec<DailyPoint>)>,
    cache_hits: u64,
}

impl Default for TrendProcessor {
    fn default() -> Self {
        Self::new(ProfileParameters::default())
    }
}

impl TrendProcessor {
    /// Create a processor for a profile with the standard smoothing factor
    pub fn new(profile: ProfileParameters) -> Self {
        Self {
            profile,
            estimator: TrendEstimator::default(),
            encoder: ResponseEncoder::new(),
            cache: None,
            cache_hits: 0,
        }
    }

    /// Create a processor with a custom smoothing factor
    pub fn with_smoothing(profile: ProfileParameters, smoothing: f64) -> Result<Self, ComputeError> {
        Ok(Self {
            estimator: TrendEstimator::with_smoothing(smoothing)?,
            ..Self::new(profile)
        })
    }

    pub fn profile(&self) -> &ProfileParameters {
        &self.profile
    }

    /// Replace the profile. The cached series is keyed by profile too, so it stays valid.
    pub fn set_profile(&mut self, profile: ProfileParameters) {
        self.profile = profile;
    }

    /// Number of requests answered from the cache
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits
    }

    /// Compute the daily series, reusing the previous result for identical input
    pub fn compute(&mut self, bundles: &[SourceBundle]) -> Result<Vec<DailyPoint>, ComputeError> {
        let key = fingerprint(bundles, &self.profile, self.estimator.smoothing())?;

        if let Some((cached_key, points)) = &self.cache {
            if *cached_key == key {
                self.cache_hits += 1;
                debug!(fingerprint = key, "serving cached trend series");
                return Ok(points.clone());
            }
        }

        let points = run_pipeline(bundles, &self.profile, &self.estimator)?;
        self.cache = Some((key, points.clone()));
        Ok(points)
    }

    /// Compute and wrap into a response
    pub fn respond(
        &mut self,
        snapshot: &SourceSnapshot,
        is_me: bool,
    ) -> Result<MeasurementsResponse, ComputeError> {
        let points = self.compute(&snapshot.sources)?;
        Ok(self
            .encoder
            .encode(points, snapshot.provider_status.clone(), is_me))
    }

    /// Compute derived statistics for a mode
    pub fn stats(
        &mut self,
        bundles: &[SourceBundle],
        mode: Mode,
    ) -> Result<Option<DerivedStats>, ComputeError> {
        let points = self.compute(bundles)?;
        Ok(StatsCalculator::compute(&points, &self.profile, mode))
    }
}

/// Order-independent fingerprint of a computation's inputs
pub fn fingerprint(
    bundles: &[SourceBundle],
    profile: &ProfileParameters,
    smoothing: f64,
) -> Result<u64, ComputeError> {
    let mut encoded = bundles
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()?;
    encoded.sort();

    let mut hasher = DefaultHasher::new();
    encoded.hash(&mut hasher);
    serde_json::to_string(profile)?.hash(&mut hasher);
    smoothing.to_bits().hash(&mut hasher);
    Ok(hasher.finish())
}
