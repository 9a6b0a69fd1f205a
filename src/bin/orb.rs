//! Orb CLI - Command-line interface for the Smart Orb engine
//!
//! Commands:
//! - run: Drive a session from NDJSON readings on stdin (streaming mode)
//! - replay: Drive a session from a recorded file (batch mode)
//! - validate: Validate sensor reading schema
//! - catalog: Print the exercise catalog
//! - doctor: Diagnose profile, configuration and input health

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use smartorb_engine::catalog::CATALOG;
use smartorb_engine::schema::{ReadingParser, SensorReading, SCHEMA_VERSION};
use smartorb_engine::{
    ComputeError, EngineConfig, ExerciseCategory, IntensityTier, ProcessedSample,
    SessionError, SessionManager, SessionRequest, SessionSummary, UserProfile, ENGINE_VERSION,
    PRODUCER_NAME,
};

/// Orb - Adaptive stimulation control for wearable exercise sessions
#[derive(Parser)]
#[command(name = "orb")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Drive Smart Orb stimulation sessions from sensor readings", long_about = None)]
struct Cli {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process streaming readings from stdin (streaming mode)
    Run {
        #[command(flatten)]
        session: SessionArgs,

        /// Flush output after each snapshot
        #[arg(long, default_value = "true")]
        flush: bool,
    },

    /// Replay a recorded reading file through a session (batch mode)
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Validate sensor reading schema
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the exercise catalog
    Catalog {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose profile, configuration and input health
    Doctor {
        /// Check a profile file
        #[arg(long)]
        profile: Option<PathBuf>,

        /// Check an engine configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Options shared by every command that drives a session
#[derive(Args)]
struct SessionArgs {
    /// User profile JSON file
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Engine configuration JSON file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Exercise name; classified from motion when omitted
    #[arg(long)]
    exercise: Option<String>,

    /// Intensity tier (low, moderate, high, very_high); resolved from signals when omitted
    #[arg(long)]
    intensity: Option<IntensityTier>,

    /// Enable stimulation as soon as exercise and intensity resolve
    #[arg(long)]
    stimulation: bool,
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    Ndjson,
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Ndjson,
    Json,
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli.log_level, &cli.log_format) {
        let error = CliError::from(e);
        eprintln!("{}", serde_json::to_string(&error).unwrap_or_default());
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let error = CliError::from(e);
            eprintln!("{}", serde_json::to_string(&error).unwrap_or_default());
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: &str, format: &LogFormat) -> Result<(), OrbCliError> {
    let level = tracing::Level::from_str(level)
        .map_err(|_| OrbCliError::ParseError(format!("Unknown log level: {level}")))?;

    let builder = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(level);

    // A subscriber may already be installed when embedded; keep the existing one.
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    Ok(())
}

fn run(cli: Cli) -> Result<(), OrbCliError> {
    match cli.command {
        Commands::Run { session, flush } => cmd_run(&session, flush),

        Commands::Replay {
            input,
            output,
            input_format,
            output_format,
            session,
        } => cmd_replay(&input, &output, input_format, output_format, &session),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Catalog { json } => cmd_catalog(json),

        Commands::Doctor {
            profile,
            config,
            json,
        } => cmd_doctor(profile.as_deref(), config.as_deref(), json),
    }
}

/// Build a manager from the shared options and start its session.
fn start_session(args: &SessionArgs) -> Result<SessionManager, OrbCliError> {
    let config = match &args.config {
        Some(path) => EngineConfig::from_json(&fs::read_to_string(path)?)?,
        None => EngineConfig::default(),
    };
    let config = if args.stimulation {
        config.with_auto_enable_stimulation(true)
    } else {
        config
    };

    let mut manager = SessionManager::new(config);
    if let Some(path) = &args.profile {
        let profile: UserProfile = serde_json::from_str(&fs::read_to_string(path)?)?;
        manager.set_profile(profile);
    }

    let mut request = SessionRequest::new();
    if let Some(name) = &args.exercise {
        request = request.with_exercise(name.as_str());
    }
    if let Some(tier) = args.intensity {
        request = request.with_intensity(tier);
    }

    let descriptor = manager.start(request)?;
    tracing::info!(session_id = %descriptor.session_id, "cli session started");

    Ok(manager)
}

fn read_input(input: &Path) -> Result<String, OrbCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn parse_readings(data: &str, format: &InputFormat) -> Result<Vec<SensorReading>, OrbCliError> {
    let readings = match format {
        InputFormat::Ndjson => ReadingParser::parse_ndjson(data)?,
        InputFormat::Json => ReadingParser::parse_array(data)?,
    };
    Ok(readings)
}

fn cmd_run(args: &SessionArgs, flush: bool) -> Result<(), OrbCliError> {
    let mut manager = start_session(args)?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for (index, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        // A malformed line is skipped so the session and its summary survive.
        let reading = match ReadingParser::parse_line(&line, index + 1) {
            Ok(Some(reading)) => reading,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(line = index + 1, error = %e, "skipping unparseable reading");
                continue;
            }
        };

        let snapshot = manager.process_sample(reading.to_sample())?;
        writeln!(stdout, "{}", serde_json::to_string(&snapshot)?)?;
        if flush {
            stdout.flush()?;
        }
    }

    let summary = manager.end()?;
    writeln!(stdout, "{}", serde_json::to_string(&summary)?)?;
    stdout.flush()?;

    Ok(())
}

fn cmd_replay(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    args: &SessionArgs,
) -> Result<(), OrbCliError> {
    let data = read_input(input)?;
    let readings = parse_readings(&data, &input_format)?;

    if readings.is_empty() {
        return Err(OrbCliError::NoReadings);
    }

    let mut manager = start_session(args)?;
    let mut samples: Vec<ProcessedSample> = Vec::with_capacity(readings.len());

    for reading in &readings {
        samples.push(manager.process_sample(reading.to_sample())?);
    }

    let report = ReplayReport {
        samples,
        summary: manager.end()?,
    };

    let output_data = format_output(&report, &output_format)?;

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), OrbCliError> {
    let data = read_input(input)?;
    let readings = parse_readings(&data, &input_format)?;

    let results = ReadingParser::validate_readings(&readings);

    let report = ValidationReport {
        total_readings: readings.len(),
        valid_readings: readings.len() - results.len(),
        invalid_readings: results.len(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                timestamp: readings
                    .get(r.index)
                    .and_then(|reading| reading.timestamp)
                    .map(|ts| ts.to_rfc3339()),
                error: r.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total readings:   {}", report.total_readings);
        println!("Valid readings:   {}", report.valid_readings);
        println!("Invalid readings: {}", report.invalid_readings);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!(
                    "  - Reading {} ({}): {}",
                    err.index,
                    err.timestamp.as_deref().unwrap_or("no timestamp"),
                    err.error
                );
            }
        }
    }

    if report.invalid_readings > 0 {
        Err(OrbCliError::ValidationFailed(report.invalid_readings))
    } else {
        Ok(())
    }
}

fn cmd_catalog(json: bool) -> Result<(), OrbCliError> {
    let rows: Vec<CatalogRow> = CATALOG
        .iter()
        .map(|entry| CatalogRow {
            name: entry.name,
            category: entry.category,
            muscles: entry.muscles.to_vec(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("Exercise Catalog");
    println!("================");
    for row in &rows {
        println!(
            "{:<20} {:<12} {}",
            row.name,
            row.category.as_str(),
            row.muscles.join(", ")
        );
    }
    Ok(())
}

fn cmd_doctor(
    profile: Option<&Path>,
    config: Option<&Path>,
    json: bool,
) -> Result<(), OrbCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "engine_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Engine version {}", ENGINE_VERSION),
    });

    checks.push(DoctorCheck {
        name: "schema_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Input schema: {}", SCHEMA_VERSION),
    });

    match profile {
        Some(path) => checks.push(check_profile(path)),
        None => checks.push(DoctorCheck {
            name: "profile".to_string(),
            status: CheckStatus::Warning,
            message: "No profile given; sessions cannot start without one".to_string(),
        }),
    }

    if let Some(path) = config {
        checks.push(check_config(path));
    }

    // Streaming mode reads stdin; a terminal means nothing is piped in.
    let stdin_tty = atty::is(atty::Stream::Stdin);
    checks.push(DoctorCheck {
        name: "stdin".to_string(),
        status: if stdin_tty {
            CheckStatus::Warning
        } else {
            CheckStatus::Ok
        },
        message: if stdin_tty {
            "stdin is a terminal; 'orb run' expects piped NDJSON".to_string()
        } else {
            "stdin is piped".to_string()
        },
    });

    let has_errors = checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: ENGINE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Orb Doctor Report");
        println!("=================");
        println!("Producer: {} v{}", report.producer, report.version);
        println!();

        for check in &report.checks {
            let status = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("{} {}: {}", status, check.name, check.message);
        }
    }

    if has_errors {
        Err(OrbCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn check_profile(path: &Path) -> DoctorCheck {
    let name = "profile".to_string();
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            return DoctorCheck {
                name,
                status: CheckStatus::Error,
                message: format!("Cannot read profile file: {}", e),
            }
        }
    };

    match serde_json::from_str::<UserProfile>(&content) {
        Ok(profile) if profile.max_hr <= profile.resting_hr => DoctorCheck {
            name,
            status: CheckStatus::Error,
            message: format!(
                "max_hr ({}) must exceed resting_hr ({})",
                profile.max_hr, profile.resting_hr
            ),
        },
        Ok(profile) => DoctorCheck {
            name,
            status: CheckStatus::Ok,
            message: format!(
                "Profile valid (resting {} bpm, max {} bpm)",
                profile.resting_hr, profile.max_hr
            ),
        },
        Err(e) => DoctorCheck {
            name,
            status: CheckStatus::Error,
            message: format!("Invalid profile JSON: {}", e),
        },
    }
}

fn check_config(path: &Path) -> DoctorCheck {
    let name = "config".to_string();
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            return DoctorCheck {
                name,
                status: CheckStatus::Error,
                message: format!("Cannot read config file: {}", e),
            }
        }
    };

    match EngineConfig::from_json(&content) {
        Ok(config) => DoctorCheck {
            name,
            status: CheckStatus::Ok,
            message: format!(
                "Config valid (strategy {}, window {})",
                config.strategy.as_str(),
                config.window_capacity
            ),
        },
        Err(e) => DoctorCheck {
            name,
            status: CheckStatus::Error,
            message: format!("Invalid config: {}", e),
        },
    }
}

fn format_output(report: &ReplayReport, format: &OutputFormat) -> Result<String, OrbCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut output = String::new();
            for sample in &report.samples {
                output.push_str(&serde_json::to_string(sample)?);
                output.push('\n');
            }
            output.push_str(&serde_json::to_string(&report.summary)?);
            output.push('\n');
            Ok(output)
        }
        OutputFormat::Json => Ok(serde_json::to_string(report)? + "\n"),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(report)? + "\n"),
    }
}

// Error handling

#[derive(Debug)]
enum OrbCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    Session(SessionError),
    NoReadings,
    ValidationFailed(usize),
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for OrbCliError {
    fn from(e: io::Error) -> Self {
        OrbCliError::Io(e)
    }
}

impl From<ComputeError> for OrbCliError {
    fn from(e: ComputeError) -> Self {
        match e {
            ComputeError::Session(e) => OrbCliError::Session(e),
            other => OrbCliError::Compute(other),
        }
    }
}

impl From<serde_json::Error> for OrbCliError {
    fn from(e: serde_json::Error) -> Self {
        OrbCliError::Json(e)
    }
}

impl From<SessionError> for OrbCliError {
    fn from(e: SessionError) -> Self {
        OrbCliError::Session(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<OrbCliError> for CliError {
    fn from(e: OrbCliError) -> Self {
        match e {
            OrbCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            OrbCliError::Compute(e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some(format!("Ensure input matches {} schema", SCHEMA_VERSION)),
            },
            OrbCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            OrbCliError::Session(e) => CliError {
                code: e.code().to_string(),
                message: e.to_string(),
                hint: match e {
                    SessionError::ProfileMissing => {
                        Some("Pass a profile with --profile <file>".to_string())
                    }
                    _ => None,
                },
            },
            OrbCliError::NoReadings => CliError {
                code: "NO_READINGS".to_string(),
                message: "No readings found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            OrbCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} readings failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            OrbCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            OrbCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check command-line arguments".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ReplayReport {
    samples: Vec<ProcessedSample>,
    summary: SessionSummary,
}

#[derive(serde::Serialize)]
struct CatalogRow {
    name: &'static str,
    category: ExerciseCategory,
    muscles: Vec<&'static str>,
}

#[derive(serde::Serialize)]
struct ValidationReport {
    total_readings: usize,
    valid_readings: usize,
    invalid_readings: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    timestamp: Option<String>,
    error: String,
}

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
