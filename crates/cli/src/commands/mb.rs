//! mb command - Make bucket
//!
//! The bucket is created in `--region` (or the configured region) and the
//! command returns once the bucket is visible.

use clap::Args;
use s6_core::Error;
use serde::Serialize;

use super::{Context, fail, parse_bucket_uri};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Create a bucket
#[derive(Args, Debug)]
pub struct MbArgs {
    /// Bucket to create (s3://bucket)
    pub uri: String,
}

#[derive(Debug, Serialize)]
struct MbOutput<'a> {
    bucket: &'a str,
    created: bool,
}

pub async fn execute(args: MbArgs, ctx: &Context, formatter: &Formatter) -> ExitCode {
    let uri = match parse_bucket_uri(formatter, &args.uri) {
        Ok(uri) => uri,
        Err(code) => return code,
    };
    if !uri.key().is_empty() {
        return fail(
            formatter,
            &Error::InvalidUri(format!("'{}' names an object, not a bucket", args.uri)),
        );
    }
    let bucket = uri.bucket();

    if ctx.dry_run {
        formatter.dry_run("mb", &uri.to_string());
        return ExitCode::Success;
    }

    let created = match ctx.storage.session().create_bucket(bucket, None).await {
        Ok(()) => true,
        Err(Error::AlreadyExists {
            owned_by_you: true, ..
        }) => false,
        Err(e) => return fail(formatter, &e),
    };

    if formatter.is_json() {
        formatter.json(&MbOutput { bucket, created });
    } else if created {
        formatter.success(&format!(
            "Bucket '{}' created",
            formatter.style_name(bucket)
        ));
    } else {
        formatter.warning(&format!("Bucket '{bucket}' already exists and is yours"));
    }
    ExitCode::Success
}
