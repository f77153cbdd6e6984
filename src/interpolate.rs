//! Gap filling
//!
//! Synthesizes values for days that fall strictly between two observed days,
//! using linear interpolation over elapsed calendar days. Weight and fat are
//! filled independently since providers report them on different cadences.
//! Leading and trailing gaps are left empty.

use tracing::debug;

use crate::types::DailyPoint;

/// Interpolator for filling internal gaps in a merged series
pub struct Interpolator;

impl Interpolator {
    /// Fill internal gaps for both metrics, in canonical units
    pub fn fill(mut points: Vec<DailyPoint>) -> Vec<DailyPoint> {
        let weight_filled = fill_metric(
            &mut points,
            |p| p.actual_weight,
            |p, v| {
                p.actual_weight = Some(v);
                p.weight_is_interpolated = true;
            },
        );
        let fat_filled = fill_metric(
            &mut points,
            |p| p.actual_fat_percent,
            |p, v| {
                p.actual_fat_percent = Some(v);
                p.fat_is_interpolated = true;
            },
        );

        debug!(
            days = points.len(),
            weight_filled, fat_filled, "interpolated missing days"
        );

        points
    }
}

/// Linear interpolation between two known values
pub fn interpolate(v0: f64, v1: f64, days_since_0: i64, days_between: i64) -> f64 {
    v0 + (v1 - v0) * (days_since_0 as f64 / days_between as f64)
}

fn fill_metric<G, S>(points: &mut [DailyPoint], get: G, mut set: S) -> usize
where
    G: Fn(&DailyPoint) -> Option<f64>,
    S: FnMut(&mut DailyPoint, f64),
{
    let known: Vec<usize> = points
        .iter()
        .enumerate()
        .filter(|(_, p)| get(p).is_some())
        .map(|(i, _)| i)
        .collect();

    let mut filled = 0;
    for pair in known.windows(2) {
        let (i0, i1) = (pair[0], pair[1]);
        if i1 - i0 < 2 {
            continue;
        }
        let (Some(v0), Some(v1)) = (get(&points[i0]), get(&points[i1])) else {
            continue;
        };
        let d0 = points[i0].date;
        let days_between = (points[i1].date - d0).num_days();

        for point in &mut points[i0 + 1..i1] {
            let days_since = (point.date - d0).num_days();
            set(point, interpolate(v0, v1, days_since, days_between));
            filled += 1;
        }
    }
    filled
}
