//! Withings provider adapter
//!
//! Parses Withings `measure?action=getmeas` payloads and maps them to a
//! canonical source bundle. Measure groups carry epoch timestamps, which are
//! resolved to local date and time with the payload's time zone.

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{AdapterContext, ProviderPayloadAdapter};
use crate::error::ComputeError;
use crate::normalizer::fat_percent_to_ratio;
use crate::types::{Provider, RawMeasurement, SourceBundle};

/// Withings measure type for body weight (kg)
const MEASURE_WEIGHT: i32 = 1;
/// Withings measure type for fat ratio (%)
const MEASURE_FAT_RATIO: i32 = 6;
/// Group category for real measurements; 2 is user objectives
const CATEGORY_REAL: i32 = 1;

/// Withings payload adapter
pub struct WithingsAdapter;

impl ProviderPayloadAdapter for WithingsAdapter {
    fn provider(&self) -> Provider {
        Provider::Withings
    }

    fn parse(&self, raw_json: &str, ctx: &AdapterContext) -> Result<SourceBundle, ComputeError> {
        let payload: WithingsPayload = serde_json::from_str(raw_json)?;
        if payload.status != 0 {
            return Err(ComputeError::ParseError(format!(
                "withings responded with status {}",
                payload.status
            )));
        }
        let body = payload
            .body
            .ok_or_else(|| ComputeError::ParseError("withings payload has no body".to_string()))?;

        let tz_name = body
            .timezone
            .as_deref()
            .or(ctx.timezone.as_deref())
            .unwrap_or("UTC");
        let tz: Tz = tz_name
            .parse()
            .map_err(|_| ComputeError::InvalidTimezone(tz_name.to_string()))?;

        let mut measurements = Vec::new();
        let mut skipped = 0usize;

        for group in body.measuregrps {
            if group.category != CATEGORY_REAL {
                continue;
            }

            let weight = group.value_of(MEASURE_WEIGHT);
            let Some(weight) = weight else {
                skipped += 1;
                continue;
            };

            let local = utc_from_epoch(group.date)?.with_timezone(&tz).naive_local();
            let mut measurement = RawMeasurement::new(local.date(), weight).with_time(local.time());
            measurement.fat_ratio = group.value_of(MEASURE_FAT_RATIO).map(fat_percent_to_ratio);
            measurements.push(measurement);
        }

        if skipped > 0 {
            warn!(skipped, "dropping withings measure groups without a weight");
        }

        let last_update = match (ctx.last_update, body.updatetime) {
            (Some(at), _) => at,
            (None, Some(epoch)) => utc_from_epoch(epoch)?,
            (None, None) => Utc::now(),
        };

        debug!(readings = measurements.len(), timezone = %tz, "parsed withings payload");

        Ok(SourceBundle {
            source: Provider::Withings,
            last_update,
            measurements,
            covered: None,
        })
    }
}

fn utc_from_epoch(seconds: i64) -> Result<DateTime<Utc>, ComputeError> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| ComputeError::DateParseError(format!("invalid epoch timestamp {seconds}")))
}

// Withings API response structures

#[derive(Debug, Deserialize)]
struct WithingsPayload {
    status: i32,
    body: Option<WithingsBody>,
}

#[derive(Debug, Deserialize)]
struct WithingsBody {
    updatetime: Option<i64>,
    timezone: Option<String>,
    #[serde(default)]
    measuregrps: Vec<WithingsMeasureGroup>,
}

#[derive(Debug, Deserialize)]
struct WithingsMeasureGroup {
    date: i64,
    #[serde(default = "default_category")]
    category: i32,
    #[serde(default)]
    measures: Vec<WithingsMeasure>,
}

impl WithingsMeasureGroup {
    /// Real value of the first measure of the given type
    fn value_of(&self, measure_type: i32) -> Option<f64> {
        self.measures
            .iter()
            .find(|m| m.measure_type == measure_type)
            .map(WithingsMeasure::real_value)
    }
}

fn default_category() -> i32 {
    CATEGORY_REAL
}

#[derive(Debug, Deserialize)]
struct WithingsMeasure {
    value: i64,
    #[serde(rename = "type")]
    measure_type: i32,
    /// Power of ten applied to `value`
    unit: i32,
}

impl WithingsMeasure {
    fn real_value(&self) -> f64 {
        self.value as f64 * 10f64.powi(self.unit)
    }
}
