//! Derived statistics
//!
//! This module derives dashboard figures from a trend series:
//! - Current value and change since the goal start anchor
//! - Intended direction from the planned rate or goal weight
//! - Deltas over trailing windows and the recent weekly rate
//! - Fat mass and lean mass views of the trend

use chrono::{Days, NaiveDate};

use crate::types::{DailyPoint, Delta, DerivedStats, Mode, ProfileParameters};

/// Trailing windows reported as deltas, in days
pub const DELTA_WINDOWS: [u32; 4] = [7, 14, 30, 90];

/// Window used for the weekly rate, in days
pub const WEEKLY_RATE_WINDOW_DAYS: u32 = 28;

/// Minimum span of data before a weekly rate is reported
const MIN_RATE_SPAN_DAYS: u32 = 7;

/// Calculator for derived statistics over a computed series
pub struct StatsCalculator;

impl StatsCalculator {
    /// Compute statistics for `mode`. Returns `None` when the series has no value for the mode.
    pub fn compute(
        points: &[DailyPoint],
        profile: &ProfileParameters,
        mode: Mode,
    ) -> Option<DerivedStats> {
        let (current_date, current_value) = points
            .iter()
            .rev()
            .find_map(|p| trend_value(p, mode).map(|v| (p.date, v)))?;
        let (first_date, first_value) = points
            .iter()
            .find_map(|p| trend_value(p, mode).map(|v| (p.date, v)))?;

        let (start_date, start_value) = profile
            .goal_start
            .and_then(|goal_start| {
                points
                    .iter()
                    .filter(|p| p.date >= goal_start)
                    .find_map(|p| trend_value(p, mode).map(|v| (p.date, v)))
            })
            .unwrap_or((first_date, first_value));

        let direction = match mode {
            Mode::Weight => {
                let reference = if profile.goal_start.is_some() {
                    start_value
                } else {
                    current_value
                };
                intended_direction(profile, reference)
            }
            Mode::FatPercent | Mode::FatMass => planned_direction(profile).unwrap_or(0),
            Mode::LeanMass => 0,
        };

        let deltas = DELTA_WINDOWS
            .iter()
            .filter_map(|&period_days| {
                let past_date = current_date.checked_sub_days(Days::new(period_days.into()))?;
                let past = value_on(points, past_date, mode)?;
                let change = current_value - past;
                Some(Delta {
                    period_days,
                    change,
                    in_intended_direction: (direction != 0).then(|| sign(change) == direction),
                })
            })
            .collect();

        let weekly_rate = weekly_rate(points, mode, current_date, current_value, first_date);

        let distance_from_goal = match mode {
            Mode::Weight => profile.goal_weight.map(|goal| current_value - goal),
            _ => None,
        };

        Some(DerivedStats {
            mode,
            current_date,
            current_value,
            start_date,
            start_value,
            change: current_value - start_value,
            intended_direction: direction,
            deltas,
            weekly_rate,
            distance_from_goal,
        })
    }
}

/// Intended direction of weight change: the planned rate's sign, else the
/// sign of `goal_weight - reference`, else 0.
pub fn intended_direction(profile: &ProfileParameters, reference: f64) -> i8 {
    if let Some(direction) = planned_direction(profile) {
        return direction;
    }
    match profile.goal_weight {
        Some(goal) => sign(goal - reference),
        None => 0,
    }
}

fn planned_direction(profile: &ProfileParameters) -> Option<i8> {
    profile
        .planned_pounds_per_week
        .map(sign)
        .filter(|direction| *direction != 0)
}

/// Trend value of a point viewed through `mode`
pub fn trend_value(point: &DailyPoint, mode: Mode) -> Option<f64> {
    match mode {
        Mode::Weight => point.trend_weight,
        Mode::FatPercent => point.trend_fat_percent,
        Mode::FatMass => Some(point.trend_weight? * point.trend_fat_percent? / 100.0),
        Mode::LeanMass => Some(point.trend_weight? * (1.0 - point.trend_fat_percent? / 100.0)),
    }
}

fn value_on(points: &[DailyPoint], date: NaiveDate, mode: Mode) -> Option<f64> {
    let idx = points.binary_search_by_key(&date, |p| p.date).ok()?;
    trend_value(&points[idx], mode)
}

fn weekly_rate(
    points: &[DailyPoint],
    mode: Mode,
    current_date: NaiveDate,
    current_value: f64,
    first_date: NaiveDate,
) -> Option<f64> {
    let available = (current_date - first_date).num_days();
    let span = available.min(WEEKLY_RATE_WINDOW_DAYS as i64);
    if span < MIN_RATE_SPAN_DAYS as i64 {
        return None;
    }
    let past_date = current_date.checked_sub_days(Days::new(span as u64))?;
    let past = value_on(points, past_date, mode)?;
    Some((current_value - past) / span as f64 * 7.0)
}

fn sign(value: f64) -> i8 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}
