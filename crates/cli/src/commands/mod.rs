//! CLI command definitions and execution
//!
//! Each subcommand lives in its own module with an `Args` struct and an
//! `execute` function returning an [`ExitCode`].

use clap::Subcommand;
use s6_core::{Error, Storage, StorageUri};

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

pub mod completions;
mod cp;
mod du;
mod get;
mod ls;
mod mb;
mod put;
mod rm;
mod stat;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List buckets, or objects under a bucket or prefix
    Ls(ls::LsArgs),

    /// Create a bucket
    Mb(mb::MbArgs),

    /// Remove objects, a prefix, or an empty bucket
    Rm(rm::RmArgs),

    /// Download an object to a local file or stdout
    Get(get::GetArgs),

    /// Upload a local file or stdin to an object
    Put(put::PutArgs),

    /// Show object metadata
    Stat(stat::StatArgs),

    /// Summarize space used under a prefix
    Du(du::DuArgs),

    /// Copy an object server-side
    Cp(cp::CpArgs),

    /// Generate shell completion scripts
    Completions(completions::CompletionsArgs),
}

/// Everything a remote command needs besides its own arguments
#[derive(Debug, Clone)]
pub struct Context {
    pub storage: Storage,
    /// Print mutations instead of performing them
    pub dry_run: bool,
}

/// Run a remote command
///
/// `completions` needs no session and is handled before the context exists.
pub async fn execute(command: Commands, ctx: &Context, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    match command {
        Commands::Ls(args) => ls::execute(args, ctx, &formatter).await,
        Commands::Mb(args) => mb::execute(args, ctx, &formatter).await,
        Commands::Rm(args) => rm::execute(args, ctx, &formatter).await,
        Commands::Get(args) => get::execute(args, ctx, &formatter).await,
        Commands::Put(args) => put::execute(args, ctx, &formatter).await,
        Commands::Stat(args) => stat::execute(args, ctx, &formatter).await,
        Commands::Du(args) => du::execute(args, ctx, &formatter).await,
        Commands::Cp(args) => cp::execute(args, ctx, &formatter).await,
        Commands::Completions(args) => completions::execute(args),
    }
}

/// Parse a locator argument, reporting a usage error on failure
pub(crate) fn parse_uri(formatter: &Formatter, raw: &str) -> Result<StorageUri, ExitCode> {
    match s6_core::parse(raw) {
        Ok(uri) => Ok(uri),
        Err(e) => Err(fail(formatter, &e)),
    }
}

/// Like [`parse_uri`] but also requires a bucket name
pub(crate) fn parse_bucket_uri(formatter: &Formatter, raw: &str) -> Result<StorageUri, ExitCode> {
    let uri = parse_uri(formatter, raw)?;
    if uri.bucket().is_empty() {
        return Err(fail(
            formatter,
            &Error::InvalidUri(format!("'{raw}' does not name a bucket")),
        ));
    }
    Ok(uri)
}

/// Report `error` and pick the matching exit code
pub(crate) fn fail(formatter: &Formatter, error: &Error) -> ExitCode {
    formatter.error(&error.to_string());
    ExitCode::from_error(error)
}

/// Final path component of a key, used when the target names a prefix
pub(crate) fn base_name(key: &str) -> &str {
    key.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(key)
}
