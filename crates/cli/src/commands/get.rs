//! get command - Download an object

use std::path::PathBuf;

use clap::Args;
use s6_core::Error;
use serde::Serialize;

use super::{Context, base_name, fail, parse_bucket_uri};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, format_size};

/// Download an object
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Object to download (s3://bucket/key)
    pub uri: String,

    /// Local destination; `-` writes to stdout, a directory keeps the key's name
    #[arg(default_value = ".")]
    pub dest: String,
}

#[derive(Debug, Serialize)]
struct GetOutput {
    source: String,
    target: String,
    size_bytes: u64,
}

pub async fn execute(args: GetArgs, ctx: &Context, formatter: &Formatter) -> ExitCode {
    let uri = match parse_bucket_uri(formatter, &args.uri) {
        Ok(uri) => uri,
        Err(code) => return code,
    };
    if uri.is_prefix() {
        return fail(
            formatter,
            &Error::InvalidUri(format!("'{}' does not name an object", args.uri)),
        );
    }

    if args.dest == "-" {
        if ctx.dry_run {
            formatter.dry_run("download", &format!("{uri} -> stdout"));
            return ExitCode::Success;
        }
        return match ctx.storage.download_stdout(&uri).await {
            Ok(_) => ExitCode::Success,
            Err(e) => fail(formatter, &e),
        };
    }

    let mut target = PathBuf::from(&args.dest);
    if args.dest.ends_with(std::path::MAIN_SEPARATOR) || target.is_dir() {
        target.push(base_name(uri.key()));
    }

    if ctx.dry_run {
        formatter.dry_run("download", &format!("{uri} -> {}", target.display()));
        return ExitCode::Success;
    }

    let spinner = formatter.spinner(format!("Downloading {uri}"));
    let result = ctx.storage.download_file(&uri, &target).await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    match result {
        Ok(size) => {
            if formatter.is_json() {
                formatter.json(&GetOutput {
                    source: uri.to_string(),
                    target: target.display().to_string(),
                    size_bytes: size,
                });
            } else {
                formatter.success(&format!(
                    "{uri} -> {} ({})",
                    target.display(),
                    formatter.style_size(&format_size(size, true))
                ));
            }
            ExitCode::Success
        }
        Err(e) => fail(formatter, &e),
    }
}
