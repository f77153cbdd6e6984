//! Fitbit provider adapter
//!
//! Parses Fitbit body log payloads (`body/log/weight` and `body/log/fat`)
//! and maps them to a canonical source bundle.

use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use super::{AdapterContext, ProviderPayloadAdapter};
use crate::error::ComputeError;
use crate::normalizer::fat_percent_to_ratio;
use crate::types::{Provider, RawMeasurement, SourceBundle};

/// Fitbit payload adapter
pub struct FitbitAdapter;

impl ProviderPayloadAdapter for FitbitAdapter {
    fn provider(&self) -> Provider {
        Provider::Fitbit
    }

    fn parse(&self, raw_json: &str, ctx: &AdapterContext) -> Result<SourceBundle, ComputeError> {
        let payload: FitbitPayload = serde_json::from_str(raw_json)?;

        // Fat logs join their weight log by log id, then by date and time
        let mut fat_by_id: HashMap<i64, f64> = HashMap::new();
        let mut fat_by_stamp: HashMap<(NaiveDate, Option<NaiveTime>), f64> = HashMap::new();
        for log in payload.fat.unwrap_or_default() {
            if let Some(id) = log.log_id {
                fat_by_id.insert(id, log.fat);
            }
            let stamp = (parse_date(&log.date)?, log.time.as_deref().map(parse_time).transpose()?);
            fat_by_stamp.insert(stamp, log.fat);
        }

        let weight_logs = payload.weight.unwrap_or_default();
        let mut measurements = Vec::with_capacity(weight_logs.len());
        let mut matched_stamps: HashSet<(NaiveDate, Option<NaiveTime>)> = HashSet::new();

        for log in weight_logs {
            let date = parse_date(&log.date)?;
            let time = log.time.as_deref().map(parse_time).transpose()?;

            let stamped_fat = fat_by_stamp.get(&(date, time)).copied();
            if stamped_fat.is_some() {
                matched_stamps.insert((date, time));
            }

            let fat = log
                .fat
                .or_else(|| log.log_id.and_then(|id| fat_by_id.get(&id).copied()))
                .or(stamped_fat);

            let mut measurement =
                RawMeasurement::new(date, ctx.weight_unit.to_kg(log.weight));
            measurement.time = time;
            measurement.fat_ratio = fat.map(fat_percent_to_ratio);
            measurements.push(measurement);
        }

        let orphaned = fat_by_stamp.len() - matched_stamps.len();
        if orphaned > 0 {
            warn!(orphaned, "dropping fitbit fat logs without a weight log");
        }

        debug!(readings = measurements.len(), "parsed fitbit payload");

        Ok(SourceBundle {
            source: Provider::Fitbit,
            last_update: ctx.last_update.unwrap_or_else(Utc::now),
            measurements,
            covered: None,
        })
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, ComputeError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| ComputeError::DateParseError(format!("{value}: {e}")))
}

fn parse_time(value: &str) -> Result<NaiveTime, ComputeError> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|e| ComputeError::DateParseError(format!("{value}: {e}")))
}

// Fitbit API response structures

#[derive(Debug, Deserialize)]
struct FitbitPayload {
    weight: Option<Vec<FitbitWeightLog>>,
    fat: Option<Vec<FitbitFatLog>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FitbitWeightLog {
    date: String,
    time: Option<String>,
    log_id: Option<i64>,
    /// In the user's locale unit
    weight: f64,
    /// Percent
    fat: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FitbitFatLog {
    date: String,
    time: Option<String>,
    log_id: Option<i64>,
    fat: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::WeightUnit;
    use chrono::TimeZone;

    #[test]
    fn test_parse_fitbit_payload() {
        let json = r#"{
            "weight": [
                { "bmi": 23.1, "date": "2024-01-15", "logId": 101, "source": "Aria",
                  "time": "07:30:00", "weight": 70.2, "fat": 21.5 },
                { "bmi": 23.0, "date": "2024-01-16", "logId": 102, "source": "API",
                  "time": "06:45:10", "weight": 70.0 },
                { "date": "2024-01-17", "logId": 103, "time": "07:00:00", "weight": 69.9 }
            ],
            "fat": [
                { "date": "2024-01-16", "fat": 21.2, "logId": 102, "time": "06:45:10" },
                { "date": "2024-01-17", "fat": 21.0, "logId": 999, "time": "07:00:00" }
            ]
        }"#;

        let ctx = AdapterContext {
            last_update: Some(Utc.with_ymd_and_hms(2024, 1, 18, 9, 0, 0).unwrap()),
            ..Default::default()
        };
        let bundle = FitbitAdapter.parse(json, &ctx).unwrap();

        assert_eq!(bundle.source, Provider::Fitbit);
        assert_eq!(bundle.last_update, ctx.last_update.unwrap());
        assert_eq!(bundle.measurements.len(), 3);

        let first = &bundle.measurements[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(first.time, NaiveTime::from_hms_opt(7, 30, 0));
        assert_eq!(first.weight, 70.2);
        assert!((first.fat_ratio.unwrap() - 0.215).abs() < 1e-9);

        // Joined by log id
        assert!((bundle.measurements[1].fat_ratio.unwrap() - 0.212).abs() < 1e-9);
        // Joined by date and time
        assert!((bundle.measurements[2].fat_ratio.unwrap() - 0.21).abs() < 1e-9);
    }

    #[test]
    fn test_fat_joins_on_parsed_time() {
        let json = r#"{
            "weight": [
                { "date": "2024-01-20", "time": "07:00:00", "weight": 70.3 },
                { "date": "2024-01-20", "time": "07:00:00", "weight": 70.4 }
            ],
            "fat": [ { "date": "2024-01-20", "time": "07:00", "fat": 20.5 } ]
        }"#;
        let bundle = FitbitAdapter.parse(json, &AdapterContext::default()).unwrap();
        assert_eq!(bundle.measurements.len(), 2);
        for m in &bundle.measurements {
            assert!((m.fat_ratio.unwrap() - 0.205).abs() < 1e-9);
        }
    }

    #[test]
    fn test_pounds_are_converted() {
        let json = r#"{ "weight": [ { "date": "2024-01-15", "weight": 154.3236 } ] }"#;
        let ctx = AdapterContext {
            weight_unit: WeightUnit::Pounds,
            ..Default::default()
        };
        let bundle = FitbitAdapter.parse(json, &ctx).unwrap();
        assert!((bundle.measurements[0].weight - 70.0).abs() < 1e-4);
        assert!(bundle.measurements[0].time.is_none());
    }

    #[test]
    fn test_bad_date() {
        let json = r#"{ "weight": [ { "date": "15/01/2024", "weight": 70.0 } ] }"#;
        assert!(matches!(
            FitbitAdapter.parse(json, &AdapterContext::default()),
            Err(ComputeError::DateParseError(_))
        ));
    }

    #[test]
    fn test_invalid_json() {
        assert!(FitbitAdapter
            .parse("not json", &AdapterContext::default())
            .is_err());
    }
}
