//! Trend CLI - Command-line interface for Trendline
//!
//! Commands:
//! - ingest: Convert a provider payload into a source bundle
//! - compute: Compute the daily series for a snapshot
//! - export: Write raw or computed CSV
//! - stats: Print goal-aware statistics
//! - doctor: Diagnose inputs and configuration

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use trendline::adapters::{adapter_for, AdapterContext};
use trendline::encoder::ResponseEncoder;
use trendline::export::{provider_from_name, CsvExporter, ExportKind};
use trendline::pipeline::{compute_measurements, compute_response};
use trendline::stats::StatsCalculator;
use trendline::types::{DerivedStats, Mode, ProfileParameters, SourceSnapshot};
use trendline::units::{format_change, format_percent, format_weight, WeightUnit};
use trendline::{ComputeError, PRODUCER_NAME, TRENDLINE_VERSION};

/// Trend - Weight trend engine for multi-provider scale data
#[derive(Parser)]
#[command(name = "trend")]
#[command(version = TRENDLINE_VERSION)]
#[command(about = "Merge scale readings and compute weight trends", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a provider payload into a source bundle (JSON)
    Ingest {
        /// Provider name (fitbit, withings)
        #[arg(short, long)]
        provider: String,

        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Sync time to stamp on the bundle (RFC 3339)
        #[arg(long)]
        last_update: Option<String>,

        /// Unit the payload reports weights in
        #[arg(long, default_value = "kg")]
        unit: UnitArg,

        /// Fallback IANA time zone for epoch timestamps
        #[arg(long)]
        timezone: Option<String>,
    },

    /// Compute the daily series for a snapshot and print the response
    Compute {
        /// Snapshot file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Mark the response as the requesting user's own data
        #[arg(long)]
        is_me: bool,

        #[command(flatten)]
        profile: ProfileArgs,
    },

    /// Export raw or computed readings as CSV
    Export {
        /// Snapshot file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Which projection to export
        #[arg(long, default_value = "computed")]
        kind: KindArg,

        /// Provider whose readings to export (raw only)
        #[arg(long, required_if_eq("kind", "raw"))]
        provider: Option<String>,

        #[command(flatten)]
        profile: ProfileArgs,
    },

    /// Print derived statistics
    Stats {
        /// Snapshot file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Series to compute statistics over
        #[arg(long, default_value = "weight")]
        mode: ModeArg,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        profile: ProfileArgs,
    },

    /// Diagnose inputs and configuration
    Doctor {
        /// Profile file to check
        #[arg(long)]
        profile: Option<PathBuf>,

        /// Snapshot file to check
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Profile file plus per-field overrides
#[derive(Args)]
struct ProfileArgs {
    /// Profile JSON file
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Hours after midnight that still count as the previous day
    #[arg(long)]
    day_start_offset: Option<u32>,

    /// Display in kilograms
    #[arg(long, conflicts_with = "imperial")]
    metric: bool,

    /// Display in pounds
    #[arg(long)]
    imperial: bool,

    /// Goal weight in the display unit
    #[arg(long)]
    goal_weight: Option<f64>,

    /// Planned change per week in pounds (negative to lose)
    #[arg(long, allow_hyphen_values = true)]
    planned_per_week: Option<f64>,

    /// First day of the current goal (YYYY-MM-DD)
    #[arg(long)]
    goal_start: Option<NaiveDate>,
}

impl ProfileArgs {
    fn resolve(&self) -> Result<ProfileParameters, TrendCliError> {
        let mut profile = match &self.profile {
            Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
            None => ProfileParameters::default(),
        };

        if self.metric {
            profile.use_metric = true;
        }
        if self.imperial {
            profile.use_metric = false;
        }
        if let Some(offset) = self.day_start_offset {
            profile.day_start_offset = offset;
        }
        if let Some(goal) = self.goal_weight {
            profile.goal_weight = Some(WeightUnit::for_profile(&profile).to_kg(goal));
        }
        if let Some(rate) = self.planned_per_week {
            profile.planned_pounds_per_week = Some(rate);
        }
        if let Some(start) = self.goal_start {
            profile.goal_start = Some(start);
        }

        Ok(profile)
    }
}

#[derive(Clone, ValueEnum)]
enum UnitArg {
    Kg,
    Lb,
}

#[derive(Clone, ValueEnum)]
enum KindArg {
    Computed,
    Raw,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Weight,
    FatPercent,
    FatMass,
    LeanMass,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Weight => Mode::Weight,
            ModeArg::FatPercent => Mode::FatPercent,
            ModeArg::FatMass => Mode::FatMass,
            ModeArg::LeanMass => Mode::LeanMass,
        }
    }
}

fn main() -> ExitCode {
    // Logs go to stderr so stdout stays machine-readable
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), TrendCliError> {
    match cli.command {
        Commands::Ingest {
            provider,
            input,
            output,
            last_update,
            unit,
            timezone,
        } => cmd_ingest(&provider, &input, &output, last_update.as_deref(), unit, timezone),

        Commands::Compute {
            input,
            output,
            is_me,
            profile,
        } => cmd_compute(&input, &output, is_me, &profile.resolve()?),

        Commands::Export {
            input,
            output,
            kind,
            provider,
            profile,
        } => cmd_export(&input, &output, kind, provider.as_deref(), &profile.resolve()?),

        Commands::Stats {
            input,
            mode,
            json,
            profile,
        } => cmd_stats(&input, mode.into(), json, &profile.resolve()?),

        Commands::Doctor {
            profile,
            snapshot,
            json,
        } => cmd_doctor(profile.as_deref(), snapshot.as_deref(), json),
    }
}

fn cmd_ingest(
    provider: &str,
    input: &Path,
    output: &Path,
    last_update: Option<&str>,
    unit: UnitArg,
    timezone: Option<String>,
) -> Result<(), TrendCliError> {
    let adapter = adapter_for(provider)?;

    let last_update = last_update
        .map(|s| {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| TrendCliError::InvalidArgs(format!("--last-update '{s}': {e}")))
        })
        .transpose()?;

    let ctx = AdapterContext {
        last_update,
        weight_unit: match unit {
            UnitArg::Kg => WeightUnit::Kilograms,
            UnitArg::Lb => WeightUnit::Pounds,
        },
        timezone,
    };

    let bundle = adapter.parse(&read_input(input)?, &ctx)?;
    info!(
        provider = %bundle.source,
        readings = bundle.measurements.len(),
        "ingested provider payload"
    );

    write_output(output, &serde_json::to_string_pretty(&bundle)?)
}

fn cmd_compute(
    input: &Path,
    output: &Path,
    is_me: bool,
    profile: &ProfileParameters,
) -> Result<(), TrendCliError> {
    let snapshot = read_snapshot(input)?;
    let response = compute_response(&snapshot, profile, is_me)?;
    debug!(days = response.computed_measurements.len(), "computed series");

    write_output(output, &ResponseEncoder::new().encode_to_json(&response)?)
}

fn cmd_export(
    input: &Path,
    output: &Path,
    kind: KindArg,
    provider: Option<&str>,
    profile: &ProfileParameters,
) -> Result<(), TrendCliError> {
    let snapshot = read_snapshot(input)?;

    let (kind, points) = match kind {
        KindArg::Computed => (
            ExportKind::Computed,
            compute_measurements(&snapshot.sources, profile)?,
        ),
        KindArg::Raw => {
            let name = provider.ok_or_else(|| {
                TrendCliError::InvalidArgs("--provider is required for raw export".to_string())
            })?;
            (ExportKind::Raw(provider_from_name(name)), Vec::new())
        }
    };

    let csv = CsvExporter::new(WeightUnit::for_profile(profile)).export(&kind, &snapshot, &points)?;
    write_output(output, &csv)
}

fn cmd_stats(
    input: &Path,
    mode: Mode,
    json: bool,
    profile: &ProfileParameters,
) -> Result<(), TrendCliError> {
    let snapshot = read_snapshot(input)?;
    let points = compute_measurements(&snapshot.sources, profile)?;
    let stats = StatsCalculator::compute(&points, profile, mode).ok_or(TrendCliError::NoSeries(mode))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_stats(&stats, WeightUnit::for_profile(profile));
    }
    Ok(())
}

fn print_stats(stats: &DerivedStats, unit: WeightUnit) {
    let value = |v: f64| {
        if stats.mode.is_mass() {
            format_weight(v, unit)
        } else {
            format_percent(v)
        }
    };
    let change = |v: f64| {
        if stats.mode.is_mass() {
            format_change(v, unit)
        } else {
            format!("{v:+.1}%")
        }
    };

    println!("Trend Stats ({:?})", stats.mode);
    println!("==================");
    println!("Current:  {} on {}", value(stats.current_value), stats.current_date);
    println!("Start:    {} on {}", value(stats.start_value), stats.start_date);
    println!("Change:   {}", change(stats.change));
    if let Some(rate) = stats.weekly_rate {
        println!("Weekly:   {}", change(rate));
    }
    if let Some(distance) = stats.distance_from_goal {
        println!("To goal:  {}", change(-distance));
    }

    if !stats.deltas.is_empty() {
        println!("\nDeltas:");
        for delta in &stats.deltas {
            let marker = match delta.in_intended_direction {
                Some(true) => "[ON TRACK]",
                Some(false) => "[OFF TRACK]",
                None => "",
            };
            println!("  {:>3}d {} {}", delta.period_days, change(delta.change), marker);
        }
    }
}

fn cmd_doctor(
    profile: Option<&Path>,
    snapshot: Option<&Path>,
    json: bool,
) -> Result<(), TrendCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "trendline_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Trendline version {}", TRENDLINE_VERSION),
    });

    let mut resolved = ProfileParameters::default();
    if let Some(path) = profile {
        let check = match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<ProfileParameters>(&content) {
                Ok(parsed) if parsed.day_start_offset >= 24 => DoctorCheck {
                    name: "profile".to_string(),
                    status: CheckStatus::Error,
                    message: format!("dayStartOffset {} is not below 24", parsed.day_start_offset),
                },
                Ok(parsed) => {
                    resolved = parsed;
                    DoctorCheck {
                        name: "profile".to_string(),
                        status: CheckStatus::Ok,
                        message: format!(
                            "Profile valid ({}, day starts at {:02}:00)",
                            WeightUnit::for_profile(&resolved).abbreviation(),
                            resolved.day_start_offset
                        ),
                    }
                }
                Err(e) => DoctorCheck {
                    name: "profile".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Invalid profile JSON: {}", e),
                },
            },
            Err(e) => DoctorCheck {
                name: "profile".to_string(),
                status: CheckStatus::Error,
                message: format!("Cannot read profile file: {}", e),
            },
        };
        checks.push(check);
    }

    if let Some(path) = snapshot {
        let check = match read_snapshot(path) {
            Ok(parsed) => match compute_measurements(&parsed.sources, &resolved) {
                Ok(points) => DoctorCheck {
                    name: "snapshot".to_string(),
                    status: CheckStatus::Ok,
                    message: format!(
                        "{} sources produce {} days",
                        parsed.sources.len(),
                        points.len()
                    ),
                },
                Err(ComputeError::EmptyInput) => DoctorCheck {
                    name: "snapshot".to_string(),
                    status: CheckStatus::Warning,
                    message: "Snapshot has no measurements yet".to_string(),
                },
                Err(e) => DoctorCheck {
                    name: "snapshot".to_string(),
                    status: CheckStatus::Error,
                    message: e.to_string(),
                },
            },
            Err(e) => DoctorCheck {
                name: "snapshot".to_string(),
                status: CheckStatus::Error,
                message: CliError::from(e).message,
            },
        };
        checks.push(check);
    }

    // Check stdin is available for piped input
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (pass files with --input)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (ready for --input -)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: TRENDLINE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Trend Doctor Report");
        println!("===================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(TrendCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn read_input(path: &Path) -> Result<String, TrendCliError> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn read_snapshot(path: &Path) -> Result<SourceSnapshot, TrendCliError> {
    Ok(serde_json::from_str(&read_input(path)?)?)
}

fn write_output(path: &Path, content: &str) -> Result<(), TrendCliError> {
    if path.as_os_str() == "-" {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle.write_all(content.as_bytes())?;
        if !content.ends_with('\n') {
            handle.write_all(b"\n")?;
        }
        handle.flush()?;
    } else {
        fs::write(path, content)?;
    }
    Ok(())
}

// Error types

#[derive(Debug)]
enum TrendCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    NoSeries(Mode),
    DoctorFailed,
    InvalidArgs(String),
}

impl From<io::Error> for TrendCliError {
    fn from(e: io::Error) -> Self {
        TrendCliError::Io(e)
    }
}

impl From<ComputeError> for TrendCliError {
    fn from(e: ComputeError) -> Self {
        TrendCliError::Compute(e)
    }
}

impl From<serde_json::Error> for TrendCliError {
    fn from(e: serde_json::Error) -> Self {
        TrendCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<TrendCliError> for CliError {
    fn from(e: TrendCliError) -> Self {
        match e {
            TrendCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            TrendCliError::Compute(ComputeError::EmptyInput) => CliError {
                code: "NO_DATA".to_string(),
                message: ComputeError::EmptyInput.to_string(),
                hint: Some("Sync at least one provider before computing".to_string()),
            },
            TrendCliError::Compute(e @ ComputeError::UnsupportedProvider(_)) => CliError {
                code: "UNSUPPORTED_PROVIDER".to_string(),
                message: e.to_string(),
                hint: Some("Supported providers: fitbit, withings".to_string()),
            },
            TrendCliError::Compute(e) => CliError {
                code: "COMPUTE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check the snapshot and profile values".to_string()),
            },
            TrendCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            TrendCliError::NoSeries(mode) => CliError {
                code: "NO_SERIES".to_string(),
                message: format!("No trend values for mode {:?}", mode),
                hint: Some("Fat-based modes need body fat readings".to_string()),
            },
            TrendCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            TrendCliError::InvalidArgs(msg) => CliError {
                code: "INVALID_ARGS".to_string(),
                message: msg,
                hint: Some("Run 'trend --help' for usage".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
