//! Source merging
//!
//! Combines measurement bundles from several providers into one calendar-indexed
//! series. Every day between the earliest and latest reading gets exactly one
//! `DailyPoint`; days nobody reported stay empty for the interpolator.
//!
//! Conflicts are resolved per day and per metric: the provider whose bundle was
//! synced most recently wins, equal sync times fall back to the fixed provider
//! priority, and within a provider the earliest reading of the day is used.

use chrono::{DateTime, NaiveDate, Utc};
use std::cmp::{Ordering, Reverse};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::ComputeError;
use crate::normalizer::DayBoundary;
use crate::types::{DailyPoint, Provider, RawMeasurement, SourceBundle};

/// Merger for combining provider bundles into a daily series
pub struct SourceMerger;

impl SourceMerger {
    /// Merge bundles into an ordered, gap-free sequence of days.
    ///
    /// The result does not depend on the order of `bundles`.
    pub fn merge(bundles: &[SourceBundle]) -> Result<Vec<DailyPoint>, ComputeError> {
        Self::merge_with_boundary(bundles, &DayBoundary::default())
    }

    /// Merge bundles whose dates were already assigned through `boundary`.
    /// Readings within a day are ordered by time elapsed since that day's start.
    pub fn merge_with_boundary(
        bundles: &[SourceBundle],
        boundary: &DayBoundary,
    ) -> Result<Vec<DailyPoint>, ComputeError> {
        let total: usize = bundles.iter().map(|b| b.measurements.len()).sum();
        if total == 0 {
            return Err(ComputeError::EmptyInput);
        }

        // Bundles sharing a provider and sync time are one rank; readings pool together.
        let mut ranks: BTreeMap<(Reverse<DateTime<Utc>>, Provider), Vec<&RawMeasurement>> =
            BTreeMap::new();
        for bundle in bundles {
            ranks
                .entry((Reverse(bundle.last_update), bundle.source.clone()))
                .or_default()
                .extend(bundle.measurements.iter());
        }

        let mut days: BTreeMap<NaiveDate, DayAccumulator> = BTreeMap::new();

        // Freshest rank first; a slot, once filled, is never overwritten.
        for ((_, provider), readings) in &ranks {
            let picks = pick_daily_readings(readings, boundary);
            for (date, pick) in picks {
                let day = days.entry(date).or_default();
                if day.weight.is_none() {
                    day.weight = pick.weight;
                }
                if day.fat_ratio.is_none() {
                    day.fat_ratio = pick.fat_ratio;
                }
            }
            debug!(provider = %provider, readings = readings.len(), "merged provider readings");
        }

        let (Some(first), Some(last)) = (
            days.keys().next().copied(),
            days.keys().next_back().copied(),
        ) else {
            return Err(ComputeError::EmptyInput);
        };

        let mut points = Vec::with_capacity(((last - first).num_days() + 1) as usize);
        for date in first.iter_days().take_while(|d| *d <= last) {
            let mut point = DailyPoint::empty(date);
            if let Some(day) = days.get(&date) {
                point.actual_weight = day.weight;
                point.actual_fat_percent = day.fat_ratio.map(|r| r * 100.0);
            }
            points.push(point);
        }

        debug!(
            first = %first,
            last = %last,
            days = points.len(),
            observed = days.len(),
            "merged daily series"
        );

        Ok(points)
    }
}

/// Values chosen for one day from one rank
#[derive(Debug, Default, Clone, Copy)]
struct DayAccumulator {
    weight: Option<f64>,
    fat_ratio: Option<f64>,
}

/// Earliest reading per day, chosen independently for weight and fat
fn pick_daily_readings(
    readings: &[&RawMeasurement],
    boundary: &DayBoundary,
) -> BTreeMap<NaiveDate, DayAccumulator> {
    let mut sorted: Vec<&RawMeasurement> = readings.to_vec();
    sorted.sort_by(|a, b| reading_order(a, b, boundary));

    let mut picks: BTreeMap<NaiveDate, DayAccumulator> = BTreeMap::new();
    for reading in sorted {
        let pick = picks.entry(reading.date).or_default();
        if pick.weight.is_none() {
            pick.weight = Some(reading.weight);
        }
        if pick.fat_ratio.is_none() {
            pick.fat_ratio = reading.fat_ratio;
        }
    }
    picks
}

/// Total order over readings: date, time into the day (untimed first), then values
fn reading_order(a: &RawMeasurement, b: &RawMeasurement, boundary: &DayBoundary) -> Ordering {
    a.date
        .cmp(&b.date)
        .then_with(|| {
            boundary
                .seconds_into_day(a.time)
                .cmp(&boundary.seconds_into_day(b.time))
        })
        .then_with(|| a.weight.total_cmp(&b.weight))
        .then_with(|| {
            a.fat_ratio
                .unwrap_or(-1.0)
                .total_cmp(&b.fat_ratio.unwrap_or(-1.0))
        })
}
