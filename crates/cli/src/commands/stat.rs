//! stat command - Show object metadata

use clap::Args;
use comfy_table::{ContentArrangement, Table, presets::UTF8_BORDERS_ONLY};
use s6_core::ObjectInfo;

use super::{Context, fail, parse_bucket_uri};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, format_size, format_timestamp};

/// Show object metadata
#[derive(Args, Debug)]
pub struct StatArgs {
    /// Object to inspect (s3://bucket/key)
    pub uri: String,
}

pub async fn execute(args: StatArgs, ctx: &Context, formatter: &Formatter) -> ExitCode {
    let uri = match parse_bucket_uri(formatter, &args.uri) {
        Ok(uri) => uri,
        Err(code) => return code,
    };

    let info = match ctx
        .storage
        .session()
        .head_object(uri.bucket(), uri.key())
        .await
    {
        Ok(info) => info,
        Err(e) => return fail(formatter, &e),
    };

    if formatter.is_json() {
        formatter.json(&info);
    } else {
        formatter.println(&render(formatter, &info));
    }
    ExitCode::Success
}

fn render(formatter: &Formatter, info: &ObjectInfo) -> String {
    let size = info.size.max(0) as u64;
    let rows = [
        ("Name", info.uri.to_string()),
        (
            "Size",
            format!("{} ({} bytes)", format_size(size, true), size),
        ),
        ("Type", info.kind.to_string()),
        (
            "Content-Type",
            info.content_type.clone().unwrap_or_else(|| "-".into()),
        ),
        ("ETag", info.etag.clone().unwrap_or_else(|| "-".into())),
        ("Last Modified", format_timestamp(info.last_modified)),
        (
            "Storage Class",
            info.storage_class.clone().unwrap_or_else(|| "STANDARD".into()),
        ),
    ];

    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .set_content_arrangement(ContentArrangement::Dynamic);
    for (key, value) in rows {
        table.add_row(vec![formatter.style_key(key), value]);
    }
    table.to_string()
}
