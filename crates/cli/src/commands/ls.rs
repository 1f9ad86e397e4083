//! ls command - List buckets or objects
//!
//! Without a bucket, lists every bucket the credentials can see. With a
//! bucket, streams objects and common prefixes page by page.

use std::pin::pin;

use clap::Args;
use futures::TryStreamExt;
use s6_core::{BucketInfo, Error, ListOptions, ObjectInfo};
use serde::Serialize;

use super::{Context, fail, parse_uri};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, format_size, format_timestamp};

/// List buckets or objects
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Location to list (s3://bucket[/prefix]); omit to list buckets
    pub uri: Option<String>,

    /// List every key under the prefix instead of rolling up at `/`
    #[arg(short, long)]
    pub recursive: bool,

    /// Show sizes in human-readable units
    #[arg(short = 'H', long)]
    pub human_readable: bool,
}

#[derive(Debug, Serialize)]
struct BucketListing<'a> {
    buckets: &'a [BucketInfo],
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub async fn execute(args: LsArgs, ctx: &Context, formatter: &Formatter) -> ExitCode {
    let uri = match args.uri.as_deref() {
        None => return list_buckets(ctx, formatter).await,
        Some(raw) => match parse_uri(formatter, raw) {
            Ok(uri) => uri,
            Err(code) => return code,
        },
    };
    if uri.bucket().is_empty() {
        return list_buckets(ctx, formatter).await;
    }

    let options = if args.recursive {
        ListOptions::recursive()
    } else {
        ListOptions::default()
    };

    let session = ctx.storage.session();
    let mut pages = pin!(session.list_pages(uri.bucket(), uri.key(), &options));
    let mut shown = 0usize;
    loop {
        let page = match pages.try_next().await {
            Ok(Some(page)) => page,
            Ok(None) => break,
            Err(e) => return fail(formatter, &e),
        };
        for entry in page.entries(uri.bucket()) {
            print_entry(formatter, &entry, args.human_readable);
            shown += 1;
        }
    }

    // An exact key that matched nothing is a lookup miss, an empty prefix is not
    if shown == 0 && !uri.is_prefix() {
        return fail(formatter, &Error::NotFound(uri.to_string()));
    }
    ExitCode::Success
}

async fn list_buckets(ctx: &Context, formatter: &Formatter) -> ExitCode {
    let listing = ctx.storage.session().list_buckets().await;

    if formatter.is_json() {
        formatter.json(&BucketListing {
            buckets: &listing.buckets,
            error: listing.error.as_ref().map(ToString::to_string),
        });
    } else {
        for bucket in &listing.buckets {
            formatter.println(&format!(
                "{}  {}",
                formatter.style_date(&format_timestamp(bucket.creation_date)),
                formatter.style_name(&format!("s3://{}", bucket.name))
            ));
        }
    }

    match listing.error {
        None => ExitCode::Success,
        Some(e) => {
            formatter.warning(&format!(
                "Bucket listing incomplete after {} buckets",
                listing.buckets.len()
            ));
            fail(formatter, &e)
        }
    }
}

fn print_entry(formatter: &Formatter, entry: &ObjectInfo, human: bool) {
    if formatter.is_json() {
        formatter.json_line(entry);
        return;
    }

    if entry.is_dir() {
        formatter.println(&format!(
            "{:>19}  {:>10}  {}",
            "",
            "DIR",
            formatter.style_dir(entry.key())
        ));
    } else {
        let size = format_size(entry.size.max(0) as u64, human);
        formatter.println(&format!(
            "{:>19}  {:>10}  {}",
            formatter.style_date(&format_timestamp(entry.last_modified)),
            formatter.style_size(&size),
            formatter.style_file(entry.key())
        ));
    }
}
