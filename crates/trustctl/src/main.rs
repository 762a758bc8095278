//! trustctl - device-trust checks and signed URLs for imaging media
//!
//! Thin front end over `imaging-trust`: loads a signed-URL configuration,
//! applies flag overrides and runs a single gate operation.

#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod error;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use imaging_trust::prelude::*;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::CliError;

#[derive(Parser)]
#[command(name = "trustctl")]
#[command(about = "Check device trust and obtain signed URLs for imaging resources")]
#[command(version)]
#[command(long_about = "
trustctl drives the imaging trust gate from the command line. It decides
whether signed URLs are required, obtains a verified signed URL for a
resource, and exposes the content hash and volume resolution steps on
their own for troubleshooting.

Use --json flag for machine-readable output suitable for scripting.
")]
struct Cli {
    /// Configuration file (JSON)
    #[arg(long, global = true, env = "TRUSTCTL_CONFIG")]
    config: Option<PathBuf>,

    /// Persistent state file holding the trust decision
    #[arg(
        long,
        global = true,
        env = "TRUSTCTL_STATE",
        default_value = "trustctl-state.json"
    )]
    state: PathBuf,

    /// Output format (human-readable or JSON)
    #[arg(
        long,
        global = true,
        help = "Output in JSON format for machine parsing"
    )]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Require signed URLs regardless of the config file
    #[arg(long, global = true)]
    use_signed_url: bool,

    /// Signing service URL
    #[arg(long, global = true, env = "TRUSTCTL_SIGN_ENDPOINT")]
    sign_endpoint: Option<String>,

    /// Seed file path
    #[arg(long, global = true)]
    seed_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decide whether signed URLs are required and persist the decision
    Check,

    /// Obtain a verified signed URL for a resource
    Sign {
        /// Resource path, e.g. unstable/test.yaml
        resource: String,
    },

    /// Print the base64 SHA-256 content hash of a file
    Hash {
        /// File to hash
        file: PathBuf,
    },

    /// Resolve the provisioning volume and boot image path
    Volume {
        /// Volume label (defaults to the configured label)
        #[arg(long)]
        label: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("trustctl={log_level},imaging_trust={log_level}").into()
            }),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match execute_command(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                output::print_error_json(&e);
            } else {
                output::print_error_human(&e);
            }

            let exit_code = e.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
            ExitCode::from(exit_code)
        }
    }
}

fn execute_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Check => {
            let gate = build_gate(cli)?;
            let required = gate.is_required().map_err(CliError::from)?;
            output::print_decision(required, cli.json);
        }
        Commands::Sign { resource } => {
            let gate = build_gate(cli)?;
            let signed_url = gate.get_signed_url(resource).map_err(CliError::from)?;
            output::print_signed_url(resource, &signed_url, cli.json);
        }
        Commands::Hash { file } => {
            let hasher = ContentHasher::new(Arc::new(OsFileSystem));
            let hash = hasher.hash(file).map_err(CliError::from)?;
            output::print_hash(&file.display().to_string(), &hash, cli.json);
        }
        Commands::Volume { label } => {
            let config = load_config(cli)?;
            let label = label.as_deref().unwrap_or(&config.volume_label);
            let device = DeviceIdentity::new(Arc::new(SystemDeviceProbe))
                .with_media_relative_path(config.media_relative_path.clone());
            let drive = device.resolve_volume(label).map_err(CliError::from)?;
            let media_path = device.media_path(&drive);
            output::print_volume(label, &drive, &media_path.display().to_string(), cli.json);
        }
    }
    Ok(())
}

/// Config file (or defaults) with command-line overrides applied
fn load_config(cli: &Cli) -> Result<SignedUrlConfig, CliError> {
    let mut config = match &cli.config {
        Some(path) => SignedUrlConfig::load_from_path(path)?,
        None => SignedUrlConfig::default(),
    };

    if cli.use_signed_url {
        config = config.with_use_signed_url(true);
    }
    if let Some(endpoint) = &cli.sign_endpoint {
        config = config.with_sign_endpoint(endpoint.clone());
    }
    if let Some(seed_path) = &cli.seed_path {
        config = config.with_seed_path(seed_path.clone());
    }

    config.validate()?;
    debug!(?config, "Effective configuration");
    Ok(config)
}

fn build_gate(cli: &Cli) -> Result<TrustGate, CliError> {
    let config = load_config(cli)?;
    let state = Arc::new(FileStateStore::new(cli.state.clone()));
    Ok(TrustGate::with_system_defaults(config, state)?)
}
