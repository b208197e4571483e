//! Certify CLI - Bridge interface for the presentation layer
//!
//! Commands: init, events, templates, participants, generate, all-in-one
//! Outputs JSON to stdout, logs to stderr
//! Exit code 2 on validation failure, 1 on any other failure

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use certify_core::{
    CertError, CertResult, CertificationPipeline, CollisionPolicy, EventMetadata, EventStore, MetadataUpdate,
    Signatory, SignatorySet, WorkspaceConfig,
};

#[derive(Parser)]
#[command(name = "certify-cli")]
#[command(about = "Certify CLI - Certificate batch generator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Workspace root holding events/, templates/, backups/ and fonts/
    #[arg(short, long, env = "CERTIFY_ROOT", default_value = ".")]
    root: PathBuf,

    /// Log filter, e.g. `info` or `certify_core=debug`
    #[arg(long, env = "CERTIFY_LOG", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the workspace folders
    Init,

    /// Create an event folder with its metadata
    CreateEvent {
        #[arg(short, long)]
        title: String,

        #[arg(short, long, default_value = "")]
        organization: String,

        /// YYYY-MM-DD
        #[arg(long, default_value = "")]
        start_date: String,

        /// YYYY-MM-DD
        #[arg(long, default_value = "")]
        end_date: String,
    },

    /// List event folders
    ListEvents,

    /// Show an event's stored metadata, participant count and batches
    ShowEvent { name: String },

    /// Delete an event folder and everything in it
    DeleteEvent { name: String },

    /// List available templates
    Templates,

    /// Copy an image into the template store
    AddTemplate { path: PathBuf },

    /// Import a participants CSV (column `name`) into an event
    ImportParticipants {
        #[arg(short, long)]
        event: String,

        #[arg(short, long)]
        file: PathBuf,
    },

    /// Generate certificates for an event
    Generate {
        #[arg(short, long)]
        event: String,

        /// Template file name in the store, or a path
        #[arg(short, long)]
        template: Option<String>,

        /// "Name|Position" or "Name|Position|signature.png", 1 to 3 times
        #[arg(short, long = "signatory", value_parser = parse_signatory, required = true)]
        signatories: Vec<Signatory>,

        /// Replace the stored organization before generating
        #[arg(short, long)]
        organization: Option<String>,

        /// Replace the stored start date (YYYY-MM-DD) before generating
        #[arg(long)]
        start_date: Option<String>,

        /// Replace the stored end date (YYYY-MM-DD) before generating
        #[arg(long)]
        end_date: Option<String>,
    },

    /// Create an event from one CSV and generate its certificates
    AllInOne {
        #[arg(short, long)]
        file: PathBuf,

        /// Overrides the CSV's template_file column
        #[arg(short, long)]
        template: Option<String>,

        /// What to do when the event folder already exists
        #[arg(long, value_enum)]
        on_collision: Option<Collision>,

        /// "Name=signature.png" for a signatory listed in the CSV
        #[arg(short, long = "signature", value_parser = parse_signature)]
        signatures: Vec<(String, PathBuf)>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Collision {
    Overwrite,
    Timestamped,
}

fn collision_policy(value: Option<Collision>) -> CollisionPolicy {
    match value {
        None => CollisionPolicy::Fail,
        Some(Collision::Overwrite) => CollisionPolicy::Overwrite,
        Some(Collision::Timestamped) => CollisionPolicy::Timestamped,
    }
}

fn parse_signatory(raw: &str) -> Result<Signatory, String> {
    let mut parts = raw.splitn(3, '|').map(str::trim);
    let name = parts.next().unwrap_or_default();
    let position = parts.next().unwrap_or_default();
    let signatory = Signatory::new(name, position);
    if !signatory.is_valid() {
        return Err(format!("expected \"Name|Position[|signature]\", got \"{raw}\""));
    }
    Ok(match parts.next().filter(|p| !p.is_empty()) {
        Some(path) => signatory.with_signature(path),
        None => signatory,
    })
}

fn parse_signature(raw: &str) -> Result<(String, PathBuf), String> {
    match raw.split_once('=') {
        Some((name, path)) if !name.trim().is_empty() && !path.trim().is_empty() => {
            Ok((name.trim().to_string(), PathBuf::from(path.trim())))
        }
        _ => Err(format!("expected \"Name=path\", got \"{raw}\"")),
    }
}

fn init_tracing(filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("failed to serialize output: {e}");
            ExitCode::FAILURE
        }
    }
}

fn report(result: CertResult<serde_json::Value>) -> ExitCode {
    match result {
        Ok(value) => print_json(&value),
        Err(e) => {
            let code = if e.is_validation() { ExitCode::from(2) } else { ExitCode::FAILURE };
            let mut output = serde_json::json!({
                "success": false,
                "error": e.to_string(),
            });
            if let CertError::Validation(v) = &e {
                output["violations"] = serde_json::to_value(&v.violations).unwrap_or_default();
            }
            print_json(&output);
            code
        }
    }
}

fn run(command: Commands, config: WorkspaceConfig) -> CertResult<serde_json::Value> {
    // Loading fonts is the expensive part; `init` never needs them.
    let pipeline = || CertificationPipeline::open(config.clone());

    let value = match command {
        Commands::Init => {
            let dirs = config.ensure_dirs()?;
            serde_json::json!({ "success": true, "created": dirs })
        }

        Commands::CreateEvent {
            title,
            organization,
            start_date,
            end_date,
        } => {
            let metadata = EventMetadata::new(title)
                .with_organization(organization)
                .with_dates(start_date, end_date);
            let event = pipeline().create_event(&metadata, CollisionPolicy::Fail)?;
            serde_json::json!({ "success": true, "event": event, "metadata": metadata })
        }

        Commands::ListEvents => {
            let events = pipeline().store().list()?;
            serde_json::json!({ "success": true, "events": events })
        }

        Commands::ShowEvent { name } => {
            let details = pipeline().show_event(&name)?;
            serde_json::json!({ "success": true, "details": details })
        }

        Commands::DeleteEvent { name } => {
            pipeline().store().delete(&name)?;
            serde_json::json!({ "success": true, "deleted": name })
        }

        Commands::Templates => {
            let templates = pipeline().templates().list()?;
            serde_json::json!({ "success": true, "templates": templates })
        }

        Commands::AddTemplate { path } => {
            let stored = pipeline().templates().add(&path)?;
            serde_json::json!({ "success": true, "template": stored })
        }

        Commands::ImportParticipants { event, file } => {
            let count = pipeline().import_participants(&event, &file)?;
            serde_json::json!({ "success": true, "event": event, "participants": count })
        }

        Commands::Generate {
            event,
            template,
            signatories,
            organization,
            start_date,
            end_date,
        } => {
            let signatories = SignatorySet::new(signatories)?;
            let update = MetadataUpdate {
                organization,
                start_date,
                end_date,
            };
            let pipeline = pipeline();
            let metadata = pipeline.update_event(&event, &update)?;
            let summary = pipeline.generate(&event, &signatories, template.as_deref())?;
            serde_json::json!({ "success": true, "metadata": metadata, "summary": summary })
        }

        Commands::AllInOne {
            file,
            template,
            on_collision,
            signatures,
        } => {
            let outcome =
                pipeline().all_in_one(&file, collision_policy(on_collision), template.as_deref(), &signatures)?;
            serde_json::json!({ "success": true, "result": outcome })
        }
    };
    Ok(value)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let config = match WorkspaceConfig::load(&cli.root) {
        Ok(config) => config,
        Err(e) => return report(Err(e)),
    };

    report(run(cli.command, config))
}
