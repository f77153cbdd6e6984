//! Provider payload adapters
//!
//! This module provides adapters that parse already-fetched provider payloads
//! and map them to a `SourceBundle` in canonical units (kilograms, fat ratio).
//! Readings keep the local date and time the provider reported; the day
//! boundary is applied later by the normalizer.

mod fitbit;
mod withings;

pub use fitbit::FitbitAdapter;
pub use withings::WithingsAdapter;

use chrono::{DateTime, Utc};

use crate::error::ComputeError;
use crate::types::{Provider, SourceBundle};
use crate::units::WeightUnit;

/// Caller-side context for interpreting a payload
#[derive(Debug, Clone)]
pub struct AdapterContext {
    /// Sync time to stamp on the bundle; falls back to the payload's own value
    pub last_update: Option<DateTime<Utc>>,
    /// Unit the payload reports weights in, for providers that follow the user's locale
    pub weight_unit: WeightUnit,
    /// IANA time zone for providers that report epoch timestamps
    pub timezone: Option<String>,
}

impl Default for AdapterContext {
    fn default() -> Self {
        Self {
            last_update: None,
            weight_unit: WeightUnit::Kilograms,
            timezone: None,
        }
    }
}

/// Trait for provider payload adapters
pub trait ProviderPayloadAdapter {
    /// Provider this adapter produces bundles for
    fn provider(&self) -> Provider;

    /// Parse raw JSON and convert to a source bundle
    fn parse(&self, raw_json: &str, ctx: &AdapterContext) -> Result<SourceBundle, ComputeError>;
}

/// Adapter for a provider name as found in CLI flags and sync-status maps
pub fn adapter_for(name: &str) -> Result<Box<dyn ProviderPayloadAdapter>, ComputeError> {
    match name.to_ascii_lowercase().as_str() {
        "fitbit" => Ok(Box::new(FitbitAdapter)),
        "withings" => Ok(Box::new(WithingsAdapter)),
        other => Err(ComputeError::UnsupportedProvider(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_lookup() {
        assert_eq!(adapter_for("Fitbit").unwrap().provider(), Provider::Fitbit);
        assert_eq!(adapter_for("withings").unwrap().provider(), Provider::Withings);
        assert!(matches!(
            adapter_for("garmin"),
            Err(ComputeError::UnsupportedProvider(_))
        ));
    }
}
