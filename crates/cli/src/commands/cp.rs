//! cp command - Server-side copy
//!
//! Both ends must be remote. Data never passes through this machine.

use clap::Args;
use s6_core::{Error, MetadataDirective};
use serde::Serialize;

use super::put::MetadataArgs;
use super::{Context, base_name, fail, parse_bucket_uri};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Copy an object server-side
#[derive(Args, Debug)]
pub struct CpArgs {
    /// Source object (s3://bucket/key)
    pub source: String,

    /// Destination (s3://bucket/key); a trailing `/` keeps the source name
    pub dest: String,

    /// COPY keeps the source metadata, REPLACE applies the flags below
    #[arg(long, default_value = "COPY")]
    pub metadata_directive: MetadataDirective,

    #[command(flatten)]
    pub metadata: MetadataArgs,
}

#[derive(Debug, Serialize)]
struct CpOutput {
    source: String,
    target: String,
    directive: MetadataDirective,
}

pub async fn execute(args: CpArgs, ctx: &Context, formatter: &Formatter) -> ExitCode {
    let source = match parse_bucket_uri(formatter, &args.source) {
        Ok(uri) => uri,
        Err(code) => return code,
    };
    if source.is_prefix() {
        return fail(
            formatter,
            &Error::InvalidUri(format!("'{}' does not name an object", args.source)),
        );
    }
    let mut dest = match parse_bucket_uri(formatter, &args.dest) {
        Ok(uri) => uri,
        Err(code) => return code,
    };
    if dest.is_prefix() {
        dest = dest.join(base_name(source.key()));
    }

    if ctx.dry_run {
        formatter.dry_run("copy", &format!("{source} -> {dest}"));
        return ExitCode::Success;
    }

    let metadata = args.metadata.to_metadata(args.metadata_directive);
    if let Err(e) = ctx
        .storage
        .session()
        .copy_object(&source, &dest, &metadata)
        .await
    {
        return fail(formatter, &e);
    }

    if formatter.is_json() {
        formatter.json(&CpOutput {
            source: source.to_string(),
            target: dest.to_string(),
            directive: args.metadata_directive,
        });
    } else {
        formatter.success(&format!("{source} -> {dest}"));
    }
    ExitCode::Success
}
