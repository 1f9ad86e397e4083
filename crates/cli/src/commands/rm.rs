//! rm command - Remove objects or buckets
//!
//! `rm s3://b/key` deletes one object, `rm -r s3://b/prefix` every object
//! under the prefix, and `rm s3://b` the (empty) bucket itself. Adding `-r`
//! to a bucket URI empties it first.

use std::collections::BTreeSet;

use clap::Args;
use s6_core::{DeleteOutcome, ListOptions, StorageUri};
use serde::Serialize;

use super::{Context, fail, parse_bucket_uri};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Remove objects, a prefix, or a bucket
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Object, prefix or bucket to remove
    pub uri: String,

    /// Remove every object under the prefix
    #[arg(short, long)]
    pub recursive: bool,
}

#[derive(Debug, Serialize)]
struct RmEntry {
    uri: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub async fn execute(args: RmArgs, ctx: &Context, formatter: &Formatter) -> ExitCode {
    let uri = match parse_bucket_uri(formatter, &args.uri) {
        Ok(uri) => uri,
        Err(code) => return code,
    };
    let session = ctx.storage.session();
    let remove_bucket = uri.key().is_empty();

    if ctx.dry_run {
        return plan(&uri, args.recursive, ctx, formatter).await;
    }

    let mut code = ExitCode::Success;
    if args.recursive {
        let outcome = match session.delete_prefix(uri.bucket(), uri.key()).await {
            Ok(outcome) => outcome,
            Err(e) => return fail(formatter, &e),
        };
        if outcome.is_empty() && !remove_bucket {
            formatter.warning(&format!("No objects under {uri}"));
        }
        code = report(&uri, outcome, formatter);
    } else if !remove_bucket {
        let keys = BTreeSet::from([uri.key().to_string()]);
        let outcome = match session.delete_objects(uri.bucket(), &keys).await {
            Ok(outcome) => outcome,
            Err(e) => return fail(formatter, &e),
        };
        code = report(&uri, outcome, formatter);
    }

    if remove_bucket && code.is_success() {
        if let Err(e) = session.delete_bucket(uri.bucket()).await {
            return fail(formatter, &e);
        }
        if formatter.is_json() {
            formatter.json_line(&RmEntry {
                uri: uri.to_string(),
                status: "deleted",
                error: None,
            });
        } else {
            formatter.success(&format!(
                "Bucket '{}' removed",
                formatter.style_name(uri.bucket())
            ));
        }
    }
    code
}

/// Print one line per key; the exit code follows the first failure
fn report(uri: &StorageUri, outcome: DeleteOutcome, formatter: &Formatter) -> ExitCode {
    let mut code = ExitCode::Success;
    for (key, result) in outcome {
        let target = uri.with_key(key).to_string();
        match result {
            Ok(()) => {
                if formatter.is_json() {
                    formatter.json_line(&RmEntry {
                        uri: target,
                        status: "deleted",
                        error: None,
                    });
                } else {
                    formatter.println(&format!("delete {target}"));
                }
            }
            Err(e) => {
                if formatter.is_json() {
                    formatter.json_line(&RmEntry {
                        uri: target,
                        status: "failed",
                        error: Some(e.to_string()),
                    });
                } else {
                    formatter.error(&format!("{target}: {e}"));
                }
                if code.is_success() {
                    code = ExitCode::from_error(&e);
                }
            }
        }
    }
    code
}

async fn plan(uri: &StorageUri, recursive: bool, ctx: &Context, formatter: &Formatter) -> ExitCode {
    if recursive {
        let listing = match ctx
            .storage
            .session()
            .list_objects_with(uri.bucket(), uri.key(), &ListOptions::recursive())
            .await
        {
            Ok(listing) => listing,
            Err(e) => return fail(formatter, &e),
        };
        for object in &listing.objects {
            formatter.dry_run("delete", &object.uri.to_string());
        }
    } else if !uri.key().is_empty() {
        formatter.dry_run("delete", &uri.to_string());
    }
    if uri.key().is_empty() {
        formatter.dry_run("rb", &uri.to_string());
    }
    ExitCode::Success
}
