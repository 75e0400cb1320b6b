//! Focus CLI - Command-line interface for Synheart Focus
//!
//! Commands:
//! - run: Drive a session from NDJSON tick samples on stdin (streaming mode)
//! - prompt: Render the summarization prompt for a session report
//! - parse-analysis: Parse a summarization model response
//! - config: Print or validate engine configuration
//! - doctor: Diagnose configuration and environment
//! - schema: Describe input and output formats

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use synheart_focus::config::EngineConfig;
use synheart_focus::encoder::{ReportEncoder, SessionMeta, SessionReport, REPORT_VERSION};
use synheart_focus::engine::SessionEngine;
use synheart_focus::report::{build_prompt, parse_analysis, ReportOutcome};
use synheart_focus::types::TickSample;
use synheart_focus::{FOCUS_VERSION, PRODUCER_NAME};

/// Focus - Real-time focus signal fusion and session aggregation
#[derive(Parser)]
#[command(name = "focus")]
#[command(author = "Synheart AI Inc")]
#[command(version = FOCUS_VERSION)]
#[command(about = "Turn landmark and audio samples into focus session metrics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a session from NDJSON tick samples on stdin
    Run {
        /// Engine configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the final session report to this file instead of stdout
        #[arg(long)]
        report: Option<PathBuf>,

        /// Report format
        #[arg(long, default_value = "json-pretty")]
        report_format: ReportFormat,

        /// Flush output after each tick
        #[arg(long, default_value = "true")]
        flush: bool,
    },

    /// Print the summarization prompt for a session report read from stdin
    Prompt,

    /// Parse a summarization model response read from stdin
    ParseAnalysis,

    /// Print the default configuration, or validate a configuration file
    Config {
        /// Configuration file to validate and print
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Configuration file to check
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (input or output)
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum ReportFormat {
    /// Single-line JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (one tick sample per line)
    Input,
    /// Output schema (session events and the session report)
    Output,
}

fn main() -> ExitCode {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .init();

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

fn run(cli: Cli) -> Result<(), FocusCliError> {
    match cli.command {
        Commands::Run {
            config,
            report,
            report_format,
            flush,
        } => cmd_run(config.as_deref(), report.as_deref(), report_format, flush),
        Commands::Prompt => cmd_prompt(),
        Commands::ParseAnalysis => cmd_parse_analysis(),
        Commands::Config { config } => cmd_config(config.as_deref()),
        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
        Commands::Schema {
            schema_type,
            json_schema,
        } => cmd_schema(schema_type, json_schema),
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, FocusCliError> {
    match path {
        Some(path) => {
            let json = fs::read_to_string(path)?;
            Ok(EngineConfig::from_json(&json)?)
        }
        None => Ok(EngineConfig::default()),
    }
}

fn cmd_run(
    config: Option<&Path>,
    report_path: Option<&Path>,
    report_format: ReportFormat,
    flush: bool,
) -> Result<(), FocusCliError> {
    let mut engine = SessionEngine::new(load_config(config)?)?;
    let meta = SessionMeta::new_now();
    log::info!("session {} started", meta.session_id);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut ticks = 0usize;

    for (index, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let sample: TickSample = serde_json::from_str(trimmed).map_err(|e| {
            FocusCliError::ParseError(format!("Failed to parse tick on line {}: {}", index + 1, e))
        })?;
        ticks += 1;

        for event in engine.tick(sample) {
            writeln!(stdout, "{}", serde_json::to_string(&event)?)?;
        }
        if flush {
            stdout.flush()?;
        }
    }

    if ticks == 0 {
        return Err(FocusCliError::NoTicks);
    }

    let now = engine.last_tick().unwrap_or(0);
    let report = ReportEncoder::new().encode(&meta, &engine, now);
    let rendered = match report_format {
        ReportFormat::Json => serde_json::to_string(&report)?,
        ReportFormat::JsonPretty => serde_json::to_string_pretty(&report)?,
    };

    match report_path {
        Some(path) => fs::write(path, rendered + "\n")?,
        None => {
            writeln!(stdout, "{rendered}")?;
            stdout.flush()?;
        }
    }

    if engine.dropped_ticks() > 0 {
        log::warn!("{} stale ticks were dropped", engine.dropped_ticks());
    }
    Ok(())
}

fn read_stdin() -> Result<String, FocusCliError> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;
    Ok(input)
}

fn cmd_prompt() -> Result<(), FocusCliError> {
    let report = SessionReport::from_json(&read_stdin()?)?;
    print!("{}", build_prompt(&report.stats));
    Ok(())
}

fn cmd_parse_analysis() -> Result<(), FocusCliError> {
    let outcome = match parse_analysis(&read_stdin()?) {
        Ok(analysis) => ReportOutcome::success(analysis),
        Err(e) => {
            log::error!("model response could not be parsed: {e}");
            ReportOutcome::failed()
        }
    };
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn cmd_config(config: Option<&Path>) -> Result<(), FocusCliError> {
    println!("{}", load_config(config)?.to_json()?);
    Ok(())
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), FocusCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "focus_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Focus version {}", FOCUS_VERSION),
    });

    checks.push(DoctorCheck {
        name: "report_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Session report schema: {}", REPORT_VERSION),
    });

    let config_check = match config {
        Some(path) if !path.exists() => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Warning,
            message: "Config file does not exist; defaults will be used".to_string(),
        },
        Some(path) => match load_config(Some(path)) {
            Ok(_) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!("Config file {} is valid", path.display()),
            },
            Err(e) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: CliError::from(e).message,
            },
        },
        None => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "Using default configuration".to_string(),
        },
    };
    checks.push(config_check);

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: FOCUS_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Focus Doctor Report");
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

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(FocusCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), FocusCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", get_input_json_schema());
            } else {
                println!("Input: one tick sample per line (NDJSON)");
                println!();
                println!("- timestamp_ms: Milliseconds since session start (strictly increasing)");
                println!("- detection: {{ faces: [{{ landmarks, blendshapes? }}], hands: [{{ landmarks }}] }}");
                println!("  - landmarks used: 1 (nose tip), 33 and 263 (outer eye corners)");
                println!("  - blendshapes used: eyeBlinkLeft/Right, browDownLeft/Right");
                println!("- audio: Time-domain samples in [-1, 1] from one pull");
                println!("- frame: {{ width, height, pixels }} packed RGB, read at most once per second");
                println!("- heap: {{ used_bytes, limit_bytes }} host heap telemetry");
                println!();
                println!("Every field except timestamp_ms is optional.");
            }
        }
        SchemaType::Output => {
            if json_schema {
                println!("{}", get_output_json_schema());
            } else {
                println!("Output: session events (NDJSON), then the session report");
                println!();
                println!("Events are tagged by \"event\":");
                println!("- look_started, blink_completed, brow_furrowed, hand_entered,");
                println!("  impact, voice_second: {{ at, total }}");
                println!("- snapshot: {{ snapshot }} every 2 seconds of session time");
                println!();
                println!("Session report ({}):", REPORT_VERSION);
                println!("- producer: {{ name, version, instance_id }}");
                println!("- session_id, started_at_utc, ended_at_utc, duration_ms");
                println!("- stats: {{ total_looks, engagement_score, total_blinks, thump_count, ... }}");
                println!("- snapshots: Full snapshot history");
                println!("- timeline: Chart points with per-interval blink/fidget/impact markers");
            }
        }
    }

    Ok(())
}

fn get_input_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "https://synheart.ai/schemas/focus.tick_sample.v1.json",
        "title": "focus.tick_sample.v1",
        "description": "Synheart Focus per-tick input sample",
        "type": "object",
        "required": ["timestamp_ms"],
        "properties": {
            "timestamp_ms": { "type": "integer", "minimum": 0 },
            "detection": {
                "type": "object",
                "properties": {
                    "faces": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["landmarks"],
                            "properties": {
                                "landmarks": { "type": "array", "items": { "$ref": "#/$defs/landmark" } },
                                "blendshapes": {
                                    "type": "array",
                                    "items": {
                                        "type": "object",
                                        "properties": {
                                            "categoryName": { "type": "string" },
                                            "score": { "type": "number" }
                                        }
                                    }
                                }
                            }
                        }
                    },
                    "hands": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "landmarks": { "type": "array", "items": { "$ref": "#/$defs/landmark" } }
                            }
                        }
                    }
                }
            },
            "audio": { "type": "array", "items": { "type": "number", "minimum": -1, "maximum": 1 } },
            "frame": {
                "type": "object",
                "required": ["width", "height", "pixels"],
                "properties": {
                    "width": { "type": "integer" },
                    "height": { "type": "integer" },
                    "pixels": { "type": "array", "items": { "type": "integer", "minimum": 0, "maximum": 255 } }
                }
            },
            "heap": {
                "type": "object",
                "properties": {
                    "used_bytes": { "type": "integer" },
                    "limit_bytes": { "type": "integer" }
                }
            }
        },
        "$defs": {
            "landmark": {
                "type": "object",
                "required": ["x", "y"],
                "properties": {
                    "x": { "type": "number" },
                    "y": { "type": "number" },
                    "z": { "type": "number" }
                }
            }
        }
    })
    .to_string()
}

fn get_output_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "https://synheart.ai/schemas/focus.session_report.v1.json",
        "title": "focus.session_report.v1",
        "description": "Synheart Focus session report",
        "type": "object",
        "required": ["report_version", "producer", "session_id", "stats", "snapshots", "timeline"],
        "properties": {
            "report_version": { "type": "string" },
            "producer": {
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "version": { "type": "string" },
                    "instance_id": { "type": "string" }
                }
            },
            "session_id": { "type": "string", "format": "uuid" },
            "started_at_utc": { "type": "string", "format": "date-time" },
            "ended_at_utc": { "type": "string", "format": "date-time" },
            "computed_at_utc": { "type": "string", "format": "date-time" },
            "duration_ms": { "type": "integer" },
            "stats": { "type": "object" },
            "snapshots": { "type": "array", "items": { "type": "object" } },
            "timeline": {
                "type": "object",
                "properties": {
                    "points": { "type": "array", "items": { "type": "object" } }
                }
            },
            "dropped_ticks": { "type": "integer" },
            "analysis": {
                "type": "object",
                "properties": {
                    "analysis": { "type": "object" },
                    "fallback": { "type": "boolean" },
                    "banner": { "type": "string" }
                }
            }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum FocusCliError {
    Io(io::Error),
    Compute(synheart_focus::ComputeError),
    Json(serde_json::Error),
    NoTicks,
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for FocusCliError {
    fn from(e: io::Error) -> Self {
        FocusCliError::Io(e)
    }
}

impl From<synheart_focus::ComputeError> for FocusCliError {
    fn from(e: synheart_focus::ComputeError) -> Self {
        FocusCliError::Compute(e)
    }
}

impl From<serde_json::Error> for FocusCliError {
    fn from(e: serde_json::Error) -> Self {
        FocusCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<FocusCliError> for CliError {
    fn from(e: FocusCliError) -> Self {
        match e {
            FocusCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            FocusCliError::Compute(synheart_focus::ComputeError::InvalidConfig(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'focus config' to see valid defaults".to_string()),
            },
            FocusCliError::Compute(e) => CliError {
                code: "COMPUTE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Ensure input matches 'focus schema input'".to_string()),
            },
            FocusCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            FocusCliError::NoTicks => CliError {
                code: "NO_TICKS".to_string(),
                message: "No tick samples found in input".to_string(),
                hint: Some("Pipe one JSON tick sample per line into 'focus run'".to_string()),
            },
            FocusCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            FocusCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
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
