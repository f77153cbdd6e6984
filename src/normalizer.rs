//! Ingestion normalization
//!
//! This module prepares provider bundles before they reach the merger:
//! - Validates readings (finite positive weight, fat ratio within 0-1)
//! - Rejects malformed or inverted declared date ranges
//! - Applies the custom day boundary exactly once
//!
//! Everything downstream treats `RawMeasurement::date` as final.

use chrono::{NaiveDate, NaiveTime, Timelike};
use tracing::debug;

use crate::error::ComputeError;
use crate::types::{RawMeasurement, SourceBundle};

/// Maps a local reading time to the calendar day it counts toward.
///
/// A reading stamped earlier than `offset_hours` after midnight belongs to
/// the previous calendar day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayBoundary {
    offset_hours: u32,
}

const SECONDS_PER_DAY: u32 = 86_400;

impl DayBoundary {
    pub fn new(offset_hours: u32) -> Result<Self, ComputeError> {
        if offset_hours >= 24 {
            return Err(ComputeError::InvalidParameter(format!(
                "day start offset must be between 0 and 23 hours, got {offset_hours}"
            )));
        }
        Ok(Self { offset_hours })
    }

    pub fn offset_hours(&self) -> u32 {
        self.offset_hours
    }

    /// Calendar day for a reading. Readings without a time keep their date.
    pub fn assign(&self, date: NaiveDate, time: Option<NaiveTime>) -> NaiveDate {
        let Some(time) = time else {
            return date;
        };
        if self.offset_hours == 0 {
            return date;
        }
        let cutover = NaiveTime::from_hms_opt(self.offset_hours, 0, 0).unwrap_or(NaiveTime::MIN);
        if time < cutover {
            date.pred_opt().unwrap_or(date)
        } else {
            date
        }
    }

    /// Seconds elapsed since the start of the reading's assigned day.
    /// Untimed readings count as the start of the day.
    pub fn seconds_into_day(&self, time: Option<NaiveTime>) -> u32 {
        let Some(time) = time else {
            return 0;
        };
        let offset = self.offset_hours * 3600;
        (time.num_seconds_from_midnight() + SECONDS_PER_DAY - offset) % SECONDS_PER_DAY
    }
}

/// Normalizer for validating bundles and assigning calendar days
pub struct Normalizer;

impl Normalizer {
    /// Validate every bundle, then re-date each reading through the day boundary
    pub fn normalize(
        bundles: &[SourceBundle],
        boundary: &DayBoundary,
    ) -> Result<Vec<SourceBundle>, ComputeError> {
        let mut normalized = Vec::with_capacity(bundles.len());

        for bundle in bundles {
            validate_bundle(bundle)?;

            let mut shifted = 0usize;
            let measurements: Vec<RawMeasurement> = bundle
                .measurements
                .iter()
                .map(|m| {
                    let date = boundary.assign(m.date, m.time);
                    if date != m.date {
                        shifted += 1;
                    }
                    RawMeasurement { date, ..m.clone() }
                })
                .collect();

            debug!(
                provider = %bundle.source,
                readings = measurements.len(),
                shifted,
                "normalized source bundle"
            );

            normalized.push(SourceBundle {
                measurements,
                ..bundle.clone()
            });
        }

        Ok(normalized)
    }
}

fn validate_bundle(bundle: &SourceBundle) -> Result<(), ComputeError> {
    if let Some(range) = &bundle.covered {
        range.validate().map_err(|e| {
            ComputeError::InvalidDateRange(format!("{} bundle: {e}", bundle.source))
        })?;
    }

    for m in &bundle.measurements {
        if !m.weight.is_finite() || m.weight <= 0.0 {
            return Err(ComputeError::InvalidMeasurement(format!(
                "{} reading on {} has weight {}",
                bundle.source, m.date, m.weight
            )));
        }

        if let Some(ratio) = m.fat_ratio {
            if !ratio.is_finite() || !(0.0..=1.0).contains(&ratio) {
                return Err(ComputeError::InvalidMeasurement(format!(
                    "{} reading on {} has fat ratio {} outside 0-1",
                    bundle.source, m.date, ratio
                )));
            }
        }

        if let Some(range) = &bundle.covered {
            if !range.contains(m.date) {
                return Err(ComputeError::InvalidDateRange(format!(
                    "{} reading on {} falls outside declared range {}..{}",
                    bundle.source, m.date, range.start, range.end
                )));
            }
        }
    }

    Ok(())
}

/// Convert a fat value reported in percent (0-100) to a ratio
pub fn fat_percent_to_ratio(percent: f64) -> f64 {
    percent / 100.0
}
