//! Kinetic CLI - Command-line interface for the kinetic blueprint engine
//!
//! Commands:
//! - assess: Assess a recorded pose sequence
//! - verify: Recompute an assessment's proof hash
//! - verify-chain: Check an athlete's hash-linked assessment history
//! - config: Print or validate engine configuration

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use kinetic_blueprint::proof::{find_chain_break, ChainBreak};
use kinetic_blueprint::types::Assessment;
use kinetic_blueprint::{
    assess, AssessmentError, AssessmentInput, AssessmentRequest, EngineConfig, EngineStores,
    InMemorySignatureIndex, KineticEngine, SubmissionReport, ENGINE_VERSION, PRODUCER_NAME,
};

/// Kinetic - validate recorded fitness tests from pose keypoints
#[derive(Parser)]
#[command(name = "kinetic")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Assess recorded fitness tests and verify proof-of-performance chains", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assess a recorded pose sequence
    Assess {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Athlete the recording belongs to
        #[arg(long)]
        athlete_id: String,

        /// Assessment id (a UUID is generated when omitted)
        #[arg(long)]
        assessment_id: Option<String>,

        /// Hash of the athlete's previous assessment
        #[arg(long)]
        previous_hash: Option<String>,

        /// Engine configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Signature index and hash ledger file; created if missing and
        /// updated after a successful submission
        #[arg(long)]
        state: Option<PathBuf>,

        /// Emit the submission report instead of the full assessment
        #[arg(long)]
        report: bool,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Recompute an assessment's proof hash and compare
    Verify {
        /// Assessment JSON file (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Check an athlete's chronologically ordered assessments (JSON array)
    VerifyChain {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Print the effective engine configuration
    Config {
        /// Configuration file to validate and print with defaults filled in
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Single-line JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), KineticCliError> {
    match cli.command {
        Commands::Assess {
            input,
            output,
            athlete_id,
            assessment_id,
            previous_hash,
            config,
            state,
            report,
            output_format,
        } => {
            let request = AssessmentRequest {
                athlete_id,
                assessment_id,
                created_at: None,
                previous_hash,
            };
            cmd_assess(
                &input,
                &output,
                request,
                config.as_deref(),
                state.as_deref(),
                report,
                output_format,
            )
        }
        Commands::Verify { input } => cmd_verify(&input),
        Commands::VerifyChain { input } => cmd_verify_chain(&input),
        Commands::Config { config } => cmd_config(config.as_deref()),
    }
}

fn read_input(path: &Path) -> Result<String, KineticCliError> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, KineticCliError> {
    match path {
        Some(path) => Ok(EngineConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(EngineConfig::default()),
    }
}

fn cmd_assess(
    input: &Path,
    output: &Path,
    request: AssessmentRequest,
    config: Option<&Path>,
    state: Option<&Path>,
    report: bool,
    output_format: OutputFormat,
) -> Result<(), KineticCliError> {
    let config = load_config(config)?;
    let recording: AssessmentInput = serde_json::from_str(&read_input(input)?)?;

    let assessment = match state {
        Some(state_path) => {
            let stores = if state_path.exists() {
                EngineStores::from_json(&fs::read_to_string(state_path)?)?
            } else {
                EngineStores::new()
            };
            let engine = KineticEngine::with_stores(config, &stores)?;
            let assessment = engine.submit_request(recording, &request)?;
            fs::write(state_path, stores.to_json()?)?;
            assessment
        }
        None => assess(recording, &request, &InMemorySignatureIndex::new(), &config)?.with_ranking(),
    };

    let output_data = if report {
        format_output(&SubmissionReport::from_assessment(&assessment), &output_format)?
    } else {
        format_output(&assessment, &output_format)?
    };

    if output.to_string_lossy() == "-" {
        println!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_verify(input: &Path) -> Result<(), KineticCliError> {
    let assessment: Assessment = serde_json::from_str(&read_input(input)?)?;
    let valid = kinetic_blueprint::verify(&assessment);

    let report = VerifyReport {
        assessment_id: assessment.id.clone(),
        hash: assessment.proof_chain.hash.clone(),
        valid,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    if valid {
        Ok(())
    } else {
        Err(KineticCliError::VerificationFailed(assessment.id))
    }
}

fn cmd_verify_chain(input: &Path) -> Result<(), KineticCliError> {
    let records: Vec<Assessment> = serde_json::from_str(&read_input(input)?)?;
    let chain_break = find_chain_break(&records);

    let report = ChainReport {
        records: records.len(),
        valid: chain_break.is_none(),
        chain_break: chain_break.clone(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    match chain_break {
        None => Ok(()),
        Some(b) => Err(KineticCliError::ChainBroken(b)),
    }
}

fn cmd_config(config: Option<&Path>) -> Result<(), KineticCliError> {
    let config = load_config(config)?;
    println!("{}", config.to_json()?);
    Ok(())
}

fn format_output<T: serde::Serialize>(
    value: &T,
    format: &OutputFormat,
) -> Result<String, KineticCliError> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string(value)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(value)?,
    })
}

// Report types

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyReport {
    assessment_id: String,
    hash: String,
    valid: bool,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct ChainReport {
    records: usize,
    valid: bool,
    #[serde(rename = "break", skip_serializing_if = "Option::is_none")]
    chain_break: Option<ChainBreak>,
}

// Error types

#[derive(Debug)]
enum KineticCliError {
    Io(io::Error),
    Assessment(AssessmentError),
    Json(serde_json::Error),
    VerificationFailed(String),
    ChainBroken(ChainBreak),
}

impl From<io::Error> for KineticCliError {
    fn from(e: io::Error) -> Self {
        KineticCliError::Io(e)
    }
}

impl From<AssessmentError> for KineticCliError {
    fn from(e: AssessmentError) -> Self {
        KineticCliError::Assessment(e)
    }
}

impl From<serde_json::Error> for KineticCliError {
    fn from(e: serde_json::Error) -> Self {
        KineticCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<KineticCliError> for CliError {
    fn from(e: KineticCliError) -> Self {
        match e {
            KineticCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            KineticCliError::Assessment(e) => {
                let (code, hint) = match &e {
                    AssessmentError::InvalidSequence(_) => (
                        "INVALID_SEQUENCE",
                        "The recording is malformed or too short; record the test again",
                    ),
                    AssessmentError::InsufficientPoseData(_) => (
                        "INSUFFICIENT_POSE_DATA",
                        "Analysis failed; record again with the whole body in frame",
                    ),
                    AssessmentError::InvalidProofInput(_) => (
                        "INVALID_PROOF_INPUT",
                        "Check --athlete-id, --assessment-id and --previous-hash",
                    ),
                    AssessmentError::InvalidConfig(_) => (
                        "INVALID_CONFIG",
                        "Run 'kinetic config' to see the expected configuration",
                    ),
                    AssessmentError::JsonError(_) => ("JSON_ERROR", "Check JSON syntax"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            KineticCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some(format!(
                    "Ensure input matches the {} {} record format",
                    PRODUCER_NAME, ENGINE_VERSION
                )),
            },
            KineticCliError::VerificationFailed(id) => CliError {
                code: "VERIFICATION_FAILED".to_string(),
                message: format!("Proof hash of assessment {} does not match its fields", id),
                hint: Some("The record was altered after creation".to_string()),
            },
            KineticCliError::ChainBroken(b) => CliError {
                code: "CHAIN_BROKEN".to_string(),
                message: match b {
                    ChainBreak::HashMismatch { position, assessment_id } => format!(
                        "Record {} ({}) does not match its proof hash",
                        position, assessment_id
                    ),
                    ChainBreak::BrokenLink { position, assessment_id } => format!(
                        "Record {} ({}) does not link to the record before it",
                        position, assessment_id
                    ),
                    ChainBreak::ForeignRecord { position, assessment_id } => format!(
                        "Record {} ({}) belongs to a different athlete",
                        position, assessment_id
                    ),
                },
                hint: Some("Records must be one athlete's history in creation order".to_string()),
            },
        }
    }
}
