//! Response encoding
//!
//! This module wraps a computed series into the `MeasurementsResponse` shape
//! consumed by callers, passing provider sync status and the ownership flag
//! through untouched.

use chrono::Utc;
use std::collections::BTreeMap;

use crate::error::ComputeError;
use crate::types::{DailyPoint, MeasurementsResponse, ProviderSyncStatus, ResponseProducer};
use crate::{PRODUCER_NAME, TRENDLINE_VERSION};

/// Encoder for producing measurement responses
#[derive(Debug, Clone, Default)]
pub struct ResponseEncoder;

impl ResponseEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Build a response from a computed series
    pub fn encode(
        &self,
        computed_measurements: Vec<DailyPoint>,
        provider_status: BTreeMap<String, ProviderSyncStatus>,
        is_me: bool,
    ) -> MeasurementsResponse {
        MeasurementsResponse {
            computed_measurements,
            provider_status,
            is_me,
            producer: ResponseProducer {
                name: PRODUCER_NAME.to_string(),
                version: TRENDLINE_VERSION.to_string(),
                computed_at_utc: Utc::now().to_rfc3339(),
            },
        }
    }

    /// Encode to JSON string
    pub fn encode_to_json(&self, response: &MeasurementsResponse) -> Result<String, ComputeError> {
        serde_json::to_string_pretty(response).map_err(ComputeError::JsonError)
    }
}
