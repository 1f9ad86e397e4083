//! du command - Summarize space used under a prefix

use clap::Args;
use s6_core::ListOptions;
use serde::Serialize;

use super::{Context, fail, parse_bucket_uri};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, format_size};

/// Summarize space used
#[derive(Args, Debug)]
pub struct DuArgs {
    /// Bucket or prefix to measure (s3://bucket[/prefix])
    pub uri: String,

    /// Show the total in human-readable units
    #[arg(short = 'H', long)]
    pub human_readable: bool,
}

#[derive(Debug, Serialize)]
struct DuOutput {
    uri: String,
    objects: usize,
    size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_human: Option<String>,
}

pub async fn execute(args: DuArgs, ctx: &Context, formatter: &Formatter) -> ExitCode {
    let uri = match parse_bucket_uri(formatter, &args.uri) {
        Ok(uri) => uri,
        Err(code) => return code,
    };

    let listing = match ctx
        .storage
        .session()
        .list_objects_with(uri.bucket(), uri.key(), &ListOptions::recursive())
        .await
    {
        Ok(listing) => listing,
        Err(e) => return fail(formatter, &e),
    };

    let total = listing.total_size().max(0) as u64;
    if formatter.is_json() {
        formatter.json(&DuOutput {
            uri: uri.to_string(),
            objects: listing.objects.len(),
            size_bytes: total,
            size_human: args.human_readable.then(|| format_size(total, true)),
        });
    } else {
        formatter.println(&format!(
            "{} in {} objects: {uri}",
            formatter.style_size(&size_label(total, args.human_readable)),
            listing.objects.len()
        ));
    }
    ExitCode::Success
}

fn size_label(total: u64, human: bool) -> String {
    if human {
        format_size(total, true)
    } else {
        format!("{total} bytes")
    }
}
