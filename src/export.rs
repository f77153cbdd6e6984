//! CSV export
//!
//! Two projections are supported: the raw readings of one provider and the
//! computed daily series. Missing values are written as empty fields and
//! interpolation flags as `Yes`/`No`. Mass values are converted to the display
//! unit here and nowhere else.

use std::io::Write;
use std::str::FromStr;

use crate::error::ComputeError;
use crate::types::{DailyPoint, Provider, SourceBundle, SourceSnapshot};
use crate::units::WeightUnit;

/// Header of the raw readings export
pub const RAW_HEADER: [&str; 4] = ["Date", "Time", "Weight", "Body Fat %"];

/// Header of the computed series export
pub const COMPUTED_HEADER: [&str; 7] = [
    "Date",
    "Actual Weight",
    "Weight Is Interpolated",
    "Trend Weight",
    "Actual Fat %",
    "Fat Is Interpolated",
    "Trend Fat %",
];

/// Which projection to export
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportKind {
    /// The merged, interpolated and smoothed daily series
    Computed,
    /// One provider's readings as reported
    Raw(Provider),
}

impl FromStr for ExportKind {
    type Err = ComputeError;

    /// `computed`, or `raw:<provider>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            None if s.eq_ignore_ascii_case("computed") => Ok(ExportKind::Computed),
            Some((kind, provider)) if kind.eq_ignore_ascii_case("raw") && !provider.is_empty() => {
                Ok(ExportKind::Raw(provider_from_name(provider)))
            }
            _ => Err(ComputeError::InvalidParameter(format!(
                "unknown export kind '{s}', expected 'computed' or 'raw:<provider>'"
            ))),
        }
    }
}

/// Provider for a lowercase or mixed-case name
pub fn provider_from_name(name: &str) -> Provider {
    match name.to_ascii_lowercase().as_str() {
        "withings" => Provider::Withings,
        "fitbit" => Provider::Fitbit,
        other => Provider::Other(other.to_string()),
    }
}

/// Pool every bundle the snapshot holds for `provider` into one.
/// Provider names match case-insensitively.
pub fn raw_bundle(snapshot: &SourceSnapshot, provider: &Provider) -> Result<SourceBundle, ComputeError> {
    let mut matching = snapshot
        .sources
        .iter()
        .filter(|b| b.source.as_str().eq_ignore_ascii_case(provider.as_str()));
    let first = matching.next().ok_or_else(|| {
        ComputeError::InvalidParameter(format!("snapshot has no bundle for provider '{provider}'"))
    })?;

    let mut pooled = first.clone();
    for bundle in matching {
        pooled.last_update = pooled.last_update.max(bundle.last_update);
        pooled.measurements.extend(bundle.measurements.iter().cloned());
    }
    pooled.covered = None;
    Ok(pooled)
}

/// Writes raw and computed series as CSV
pub struct CsvExporter {
    unit: WeightUnit,
}

impl CsvExporter {
    pub fn new(unit: WeightUnit) -> Self {
        Self { unit }
    }

    /// Write one provider's readings, sorted by date and time
    pub fn write_raw<W: Write>(&self, bundle: &SourceBundle, out: W) -> Result<(), ComputeError> {
        let mut writer = csv::Writer::from_writer(out);
        writer.write_record(RAW_HEADER)?;

        let mut readings: Vec<_> = bundle.measurements.iter().collect();
        readings.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.time.cmp(&b.time)));

        for m in readings {
            writer.write_record([
                m.date.format("%Y-%m-%d").to_string(),
                m.time
                    .map(|t| t.format("%H:%M:%S").to_string())
                    .unwrap_or_default(),
                self.mass(Some(m.weight)),
                percent(m.fat_ratio.map(|r| r * 100.0)),
            ])?;
        }

        writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    /// Write the computed daily series
    pub fn write_computed<W: Write>(
        &self,
        points: &[DailyPoint],
        out: W,
    ) -> Result<(), ComputeError> {
        let mut writer = csv::Writer::from_writer(out);
        writer.write_record(COMPUTED_HEADER)?;

        for p in points {
            writer.write_record([
                p.date.format("%Y-%m-%d").to_string(),
                self.mass(p.actual_weight),
                yes_no(p.weight_is_interpolated),
                self.mass(p.trend_weight),
                percent(p.actual_fat_percent),
                yes_no(p.fat_is_interpolated),
                percent(p.trend_fat_percent),
            ])?;
        }

        writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    pub fn raw_to_string(&self, bundle: &SourceBundle) -> Result<String, ComputeError> {
        let mut buf = Vec::new();
        self.write_raw(bundle, &mut buf)?;
        into_string(buf)
    }

    pub fn computed_to_string(&self, points: &[DailyPoint]) -> Result<String, ComputeError> {
        let mut buf = Vec::new();
        self.write_computed(points, &mut buf)?;
        into_string(buf)
    }

    /// Export a snapshot. `points` is the computed series and is only read for `Computed`.
    pub fn export(
        &self,
        kind: &ExportKind,
        snapshot: &SourceSnapshot,
        points: &[DailyPoint],
    ) -> Result<String, ComputeError> {
        match kind {
            ExportKind::Computed => self.computed_to_string(points),
            ExportKind::Raw(provider) => self.raw_to_string(&raw_bundle(snapshot, provider)?),
        }
    }

    fn mass(&self, kg: Option<f64>) -> String {
        kg.map(|v| format!("{:.2}", self.unit.from_kg(v)))
            .unwrap_or_default()
    }
}

fn percent(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_default()
}

fn yes_no(flag: bool) -> String {
    let text = if flag { "Yes" } else { "No" };
    text.to_string()
}

fn into_string(buf: Vec<u8>) -> Result<String, ComputeError> {
    String::from_utf8(buf).map_err(|e| ComputeError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Provider, RawMeasurement};
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_raw_export() {
        let bundle = SourceBundle::new(
            Provider::Fitbit,
            Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap(),
        )
        .with_measurements(vec![
            RawMeasurement::new(date(2), 70.25),
            RawMeasurement::new(date(1), 70.0)
                .with_time(NaiveTime::from_hms_opt(7, 30, 0).unwrap())
                .with_fat_ratio(0.215),
        ]);

        let csv = CsvExporter::new(WeightUnit::Kilograms)
            .raw_to_string(&bundle)
            .unwrap();
        assert_eq!(
            csv,
            "Date,Time,Weight,Body Fat %\n\
             2024-01-01,07:30:00,70.00,21.50\n\
             2024-01-02,,70.25,\n"
        );
    }

    #[test]
    fn test_computed_export() {
        let mut first = DailyPoint::empty(date(1));
        first.actual_weight = Some(70.0);
        first.trend_weight = Some(70.0);
        first.actual_fat_percent = Some(20.0);
        first.trend_fat_percent = Some(20.0);

        let mut second = DailyPoint::empty(date(2));
        second.actual_weight = Some(70.5);
        second.weight_is_interpolated = true;
        second.trend_weight = Some(70.05);

        let csv = CsvExporter::new(WeightUnit::Kilograms)
            .computed_to_string(&[first, second])
            .unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "Date,Actual Weight,Weight Is Interpolated,Trend Weight,Actual Fat %,Fat Is Interpolated,Trend Fat %"
        );
        assert_eq!(lines[1], "2024-01-01,70.00,No,70.00,20.00,No,20.00");
        assert_eq!(lines[2], "2024-01-02,70.50,Yes,70.05,,No,");
    }

    #[test]
    fn test_export_kind_parsing() {
        assert_eq!("computed".parse::<ExportKind>().unwrap(), ExportKind::Computed);
        assert_eq!(
            "raw:Withings".parse::<ExportKind>().unwrap(),
            ExportKind::Raw(Provider::Withings)
        );
        assert_eq!(
            "raw:manual".parse::<ExportKind>().unwrap(),
            ExportKind::Raw(Provider::Other("manual".to_string()))
        );
        assert!("raw:".parse::<ExportKind>().is_err());
        assert!("trend".parse::<ExportKind>().is_err());
    }

    #[test]
    fn test_raw_export_pools_bundles() {
        let at = |d| Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap();
        let snapshot = SourceSnapshot {
            sources: vec![
                SourceBundle::new(Provider::Fitbit, at(3))
                    .with_measurements(vec![RawMeasurement::new(date(2), 71.0)]),
                SourceBundle::new(Provider::Withings, at(9))
                    .with_measurements(vec![RawMeasurement::new(date(5), 69.0)]),
                SourceBundle::new(Provider::Fitbit, at(4))
                    .with_measurements(vec![RawMeasurement::new(date(1), 70.0)]),
            ],
            ..Default::default()
        };

        let exporter = CsvExporter::new(WeightUnit::Kilograms);
        let csv = exporter
            .export(&ExportKind::Raw(Provider::Fitbit), &snapshot, &[])
            .unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "2024-01-01,,70.00,");
        assert_eq!(lines[2], "2024-01-02,,71.00,");

        let mixed_case = SourceSnapshot {
            sources: vec![SourceBundle::new(Provider::Other("Manual".to_string()), at(2))
                .with_measurements(vec![RawMeasurement::new(date(1), 68.5)])],
            ..Default::default()
        };
        let kind: ExportKind = "raw:Manual".parse().unwrap();
        let csv = exporter.export(&kind, &mixed_case, &[]).unwrap();
        assert_eq!(csv.lines().nth(1), Some("2024-01-01,,68.50,"));

        let missing = exporter.export(
            &ExportKind::Raw(Provider::Other("manual".to_string())),
            &snapshot,
            &[],
        );
        assert!(matches!(missing, Err(ComputeError::InvalidParameter(_))));
    }

    #[test]
    fn test_imperial_export() {
        let mut point = DailyPoint::empty(date(1));
        point.actual_weight = Some(100.0);
        point.trend_weight = Some(100.0);

        let csv = CsvExporter::new(WeightUnit::Pounds)
            .computed_to_string(&[point])
            .unwrap();
        assert!(csv.lines().nth(1).unwrap().starts_with("2024-01-01,220.46,No,220.46"));
    }
}
