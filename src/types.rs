//! Core types for the Trendline pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: provider bundles, the per-day series, profile parameters, and the
//! response handed back to callers.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::error::ComputeError;

/// Measurement provider, used for provenance and conflict resolution
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Withings,
    Fitbit,
    /// Any other source (manual entry, legacy import, ...)
    #[serde(untagged)]
    Other(String),
}

impl Provider {
    pub fn as_str(&self) -> &str {
        match self {
            Provider::Withings => "withings",
            Provider::Fitbit => "fitbit",
            Provider::Other(name) => name.as_str(),
        }
    }

    /// Fixed priority used when two bundles share the same `last_update`.
    /// Lower wins.
    pub fn priority(&self) -> u8 {
        match self {
            Provider::Withings => 0,
            Provider::Fitbit => 1,
            Provider::Other(_) => 2,
        }
    }
}

impl PartialOrd for Provider {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Provider {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority()
            .cmp(&other.priority())
            .then_with(|| self.as_str().cmp(other.as_str()))
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One provider-reported reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMeasurement {
    /// Calendar day the reading belongs to
    pub date: NaiveDate,
    /// Local time of day as reported by the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<NaiveTime>,
    /// Body weight in kilograms
    pub weight: f64,
    /// Body fat as a fraction (0-1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fat_ratio: Option<f64>,
}

impl RawMeasurement {
    pub fn new(date: NaiveDate, weight: f64) -> Self {
        Self {
            date,
            time: None,
            weight,
            fat_ratio: None,
        }
    }

    pub fn with_time(mut self, time: NaiveTime) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_fat_ratio(mut self, fat_ratio: f64) -> Self {
        self.fat_ratio = Some(fat_ratio);
        self
    }
}

/// Inclusive calendar-day range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Create a range, rejecting inverted bounds
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ComputeError> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    /// Ranges can arrive through deserialization, so bounds are re-checked here
    pub fn validate(&self) -> Result<(), ComputeError> {
        if self.start > self.end {
            return Err(ComputeError::InvalidDateRange(format!(
                "start {} is after end {}",
                self.start, self.end
            )));
        }
        Ok(())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of calendar days covered, inclusive of both ends
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// One provider's full measurement set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceBundle {
    pub source: Provider,
    /// When the provider last synced; the freshest bundle wins same-day conflicts
    pub last_update: DateTime<Utc>,
    #[serde(default)]
    pub measurements: Vec<RawMeasurement>,
    /// Sync window declared by the provider, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub covered: Option<DateRange>,
}

impl SourceBundle {
    pub fn new(source: Provider, last_update: DateTime<Utc>) -> Self {
        Self {
            source,
            last_update,
            measurements: Vec::new(),
            covered: None,
        }
    }

    pub fn with_measurements(mut self, measurements: Vec<RawMeasurement>) -> Self {
        self.measurements = measurements;
        self
    }

    pub fn with_covered(mut self, covered: DateRange) -> Self {
        self.covered = Some(covered);
        self
    }
}

/// One calendar day's resolved record
///
/// Created by the merger with only observed values, filled in by the
/// interpolator and completed by the trend estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPoint {
    pub date: NaiveDate,
    /// Weight in kilograms
    pub actual_weight: Option<f64>,
    pub weight_is_interpolated: bool,
    pub trend_weight: Option<f64>,
    /// Body fat in percent (0-100)
    pub actual_fat_percent: Option<f64>,
    pub fat_is_interpolated: bool,
    pub trend_fat_percent: Option<f64>,
}

impl DailyPoint {
    /// A day with no observations yet
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            actual_weight: None,
            weight_is_interpolated: false,
            trend_weight: None,
            actual_fat_percent: None,
            fat_is_interpolated: false,
            trend_fat_percent: None,
        }
    }
}

/// Caller-supplied profile configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileParameters {
    /// Display unit flag; never affects the trend math
    pub use_metric: bool,
    /// Goal weight in kilograms
    pub goal_weight: Option<f64>,
    /// Planned rate of change, signed (negative = losing)
    pub planned_pounds_per_week: Option<f64>,
    pub goal_start: Option<NaiveDate>,
    /// Hours after local midnight that still count as the previous day
    pub day_start_offset: u32,
}

impl Default for ProfileParameters {
    fn default() -> Self {
        Self {
            use_metric: true,
            goal_weight: None,
            planned_pounds_per_week: None,
            goal_start: None,
            day_start_offset: 0,
        }
    }
}

/// Provider sync outcome, passed through to the caller untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSyncStatus {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<DateTime<Utc>>,
}

/// Input document accepted by the CLI and FFI surfaces
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSnapshot {
    #[serde(default)]
    pub sources: Vec<SourceBundle>,
    #[serde(default)]
    pub provider_status: BTreeMap<String, ProviderSyncStatus>,
}

/// Computed series plus pass-through metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementsResponse {
    pub computed_measurements: Vec<DailyPoint>,
    pub provider_status: BTreeMap<String, ProviderSyncStatus>,
    /// Ownership flag set by the caller
    pub is_me: bool,
    pub producer: ResponseProducer,
}

/// Producer metadata stamped on every response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseProducer {
    pub name: String,
    pub version: String,
    pub computed_at_utc: String,
}

/// Which series a statistic is computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Weight,
    FatPercent,
    FatMass,
    LeanMass,
}

impl Mode {
    /// Modes measured in mass units (and therefore converted for display)
    pub fn is_mass(&self) -> bool {
        !matches!(self, Mode::FatPercent)
    }
}

/// Change over a trailing window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub period_days: u32,
    pub change: f64,
    /// `None` when there is no intended direction
    pub in_intended_direction: Option<bool>,
}

/// Output of the derived statistics step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedStats {
    pub mode: Mode,
    pub current_date: NaiveDate,
    pub current_value: f64,
    pub start_date: NaiveDate,
    pub start_value: f64,
    /// `current_value - start_value`, sign preserved
    pub change: f64,
    /// -1, 0 or +1
    pub intended_direction: i8,
    pub deltas: Vec<Delta>,
    /// Average change per week over the most recent weeks of data
    pub weekly_rate: Option<f64>,
    /// `current_value - goal_weight` (weight mode only)
    pub distance_from_goal: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_priority_order() {
        let mut providers = vec![
            Provider::Other("manual".to_string()),
            Provider::Fitbit,
            Provider::Withings,
        ];
        providers.sort();
        assert_eq!(
            providers,
            vec![
                Provider::Withings,
                Provider::Fitbit,
                Provider::Other("manual".to_string())
            ]
        );
    }

    #[test]
    fn test_provider_serde() {
        let json = r#"["fitbit","withings","manual"]"#;
        let providers: Vec<Provider> = serde_json::from_str(json).unwrap();
        assert_eq!(providers[0], Provider::Fitbit);
        assert_eq!(providers[1], Provider::Withings);
        assert_eq!(providers[2], Provider::Other("manual".to_string()));
        assert_eq!(serde_json::to_string(&providers).unwrap(), json);
    }

    #[test]
    fn test_date_range_rejects_inverted_bounds() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(matches!(
            DateRange::new(start, end),
            Err(ComputeError::InvalidDateRange(_))
        ));

        let range = DateRange::new(end, start).unwrap();
        assert_eq!(range.days(), 5);
        assert!(range.contains(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2024, 1, 6).unwrap()));
    }

    #[test]
    fn test_bundle_deserialize() {
        let json = r#"{
            "source": "withings",
            "lastUpdate": "2024-01-10T08:00:00Z",
            "measurements": [
                { "date": "2024-01-01", "time": "07:15:00", "weight": 70.0, "fatRatio": 0.21 },
                { "date": "2024-01-02", "weight": 69.8 }
            ]
        }"#;
        let bundle: SourceBundle = serde_json::from_str(json).unwrap();
        assert_eq!(bundle.source, Provider::Withings);
        assert_eq!(bundle.measurements.len(), 2);
        assert_eq!(bundle.measurements[0].fat_ratio, Some(0.21));
        assert!(bundle.measurements[1].time.is_none());
        assert!(bundle.covered.is_none());
    }

    #[test]
    fn test_profile_defaults() {
        let profile: ProfileParameters = serde_json::from_str(r#"{"goalWeight": 65.0}"#).unwrap();
        assert!(profile.use_metric);
        assert_eq!(profile.goal_weight, Some(65.0));
        assert_eq!(profile.day_start_offset, 0);
        assert!(profile.goal_start.is_none());
    }
}
