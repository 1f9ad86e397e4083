//! s6cmd - command-line access to S3-compatible object storage
//!
//! Parses global options, resolves the session configuration, builds one
//! S3 session per invocation and dispatches to the subcommand.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Args, Parser};
use s6_core::{ConfigManager, Credentials, Session, SessionConfig, Storage};
use s6_s3::S3Client;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_code;
mod output;

use commands::{Commands, Context};
use exit_code::ExitCode;
use output::{Formatter, OutputConfig};

/// s6cmd - S3-compatible object storage CLI
#[derive(Parser, Debug)]
#[command(name = "s6cmd", version, about, long_about = None, propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Region for requests and new buckets
    #[arg(long, global = true, env = "AWS_REGION")]
    region: Option<String>,

    /// Custom endpoint for S3-compatible services
    #[arg(long, global = true, env = "S6CMD_ENDPOINT_URL")]
    endpoint_url: Option<String>,

    /// Address buckets as endpoint/bucket instead of bucket.endpoint
    #[arg(long, global = true)]
    path_style: bool,

    /// Shared-config profile to load credentials from
    #[arg(long, global = true, env = "AWS_PROFILE")]
    profile: Option<String>,

    /// Show what would change without changing anything
    #[arg(long, global = true)]
    dry_run: bool,

    /// Keys or buckets per listing request (max 1000)
    #[arg(long, global = true, env = "S6CMD_PAGE_SIZE")]
    page_size: Option<i32>,

    /// Config file (default: <config dir>/s6cmd/config.toml)
    #[arg(long, global = true, env = "S6CMD_CONFIG")]
    config: Option<PathBuf>,

    /// Output JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Enable debug logging on stderr
    #[arg(long, global = true)]
    debug: bool,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.global.debug);

    let output_config = OutputConfig {
        json: cli.global.json,
        no_color: cli.global.no_color,
        quiet: cli.global.quiet,
    };

    if let Commands::Completions(args) = cli.command {
        return commands::completions::execute(args).into();
    }

    let ctx = match build_context(&cli.global).await {
        Ok(ctx) => ctx,
        Err(e) => {
            Formatter::new(output_config).error(&format!("{e:#}"));
            return setup_exit_code(&e).into();
        }
    };

    let session = ctx.storage.session().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling in-flight requests");
            session.cancel();
        }
    });

    commands::execute(cli.command, &ctx, output_config).await.into()
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("s6cmd=debug,s6_core=debug,s6_s3=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Resolve configuration: flag > env > config file > default
fn load_config(global: &GlobalArgs) -> anyhow::Result<SessionConfig> {
    let manager = match &global.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };
    let mut config = manager
        .load()
        .with_context(|| format!("Failed to load config from {}", manager.path().display()))?;

    if let Some(region) = &global.region {
        config.region = Some(region.clone());
    }
    if let Some(endpoint) = &global.endpoint_url {
        config.endpoint = Some(endpoint.clone());
    }
    if global.path_style {
        config.path_style = true;
    }
    if let Some(profile) = &global.profile {
        config.profile = Some(profile.clone());
    }
    if let Some(page_size) = global.page_size {
        config.page_size = page_size;
    }
    config.credentials = Credentials::from_env();

    config.validate().context("Invalid configuration")?;
    tracing::debug!(?config, "Resolved configuration");
    Ok(config)
}

async fn build_context(global: &GlobalArgs) -> anyhow::Result<Context> {
    let config = load_config(global)?;
    let client = S3Client::new(&config)
        .await
        .context("Failed to create S3 client")?;
    let session = Session::new(Arc::new(client), config);
    Ok(Context {
        storage: Storage::new(session),
        dry_run: global.dry_run,
    })
}

fn setup_exit_code(error: &anyhow::Error) -> ExitCode {
    match error.downcast_ref::<s6_core::Error>() {
        Some(e) => ExitCode::from_error(e),
        None => ExitCode::GeneralError,
    }
}
