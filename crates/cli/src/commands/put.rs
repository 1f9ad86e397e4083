//! put command - Upload a file or stdin
//!
//! Sizes at or above the multipart threshold go up in parts. Reading from
//! stdin probes up to the threshold before choosing.

use std::path::Path;

use clap::Args;
use jiff::Timestamp;
use s6_core::{Error, MetadataDirective, PutReceipt, StorageUri, TransferMetadata};

use super::{Context, base_name, fail, parse_bucket_uri};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, format_size};

/// Upload a local file or stdin
#[derive(Args, Debug)]
pub struct PutArgs {
    /// Local file, or `-` for stdin
    pub source: String,

    /// Destination (s3://bucket/key); a trailing `/` keeps the file name
    pub uri: String,

    #[command(flatten)]
    pub metadata: MetadataArgs,
}

/// Object metadata flags shared by `put` and `cp`
#[derive(Args, Debug, Default)]
pub struct MetadataArgs {
    /// Content-Type; guessed from the file name when omitted
    #[arg(long)]
    pub content_type: Option<String>,

    #[arg(long)]
    pub content_encoding: Option<String>,

    #[arg(long)]
    pub content_disposition: Option<String>,

    #[arg(long)]
    pub cache_control: Option<String>,

    /// Canned ACL (private, public-read, ...)
    #[arg(long)]
    pub acl: Option<String>,

    /// Storage class (STANDARD, GLACIER, ...)
    #[arg(long)]
    pub storage_class: Option<String>,

    /// Server-side encryption (AES256 or aws:kms)
    #[arg(long)]
    pub sse: Option<String>,

    /// KMS key for `--sse aws:kms`
    #[arg(long, requires = "sse")]
    pub sse_kms_key_id: Option<String>,

    /// Expires header as an RFC 3339 timestamp
    #[arg(long)]
    pub expires: Option<Timestamp>,

    /// User metadata, repeatable
    #[arg(long = "metadata", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub user_defined: Vec<(String, String)>,
}

impl MetadataArgs {
    pub fn to_metadata(&self, directive: MetadataDirective) -> TransferMetadata {
        TransferMetadata {
            acl: self.acl.clone(),
            cache_control: self.cache_control.clone(),
            content_type: self.content_type.clone(),
            content_encoding: self.content_encoding.clone(),
            content_disposition: self.content_disposition.clone(),
            encryption_method: self.sse.clone(),
            encryption_key_id: self.sse_kms_key_id.clone(),
            storage_class: self.storage_class.clone(),
            expires: self.expires,
            user_defined: self.user_defined.iter().cloned().collect(),
            directive,
        }
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

pub async fn execute(args: PutArgs, ctx: &Context, formatter: &Formatter) -> ExitCode {
    let mut uri = match parse_bucket_uri(formatter, &args.uri) {
        Ok(uri) => uri,
        Err(code) => return code,
    };
    let from_stdin = args.source == "-";
    if uri.is_prefix() {
        if from_stdin {
            return fail(
                formatter,
                &Error::InvalidUri(format!(
                    "'{}' needs a key when uploading from stdin",
                    args.uri
                )),
            );
        }
        let name = Path::new(&args.source)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        uri = uri.join(base_name(&name));
    }

    let mut metadata = args.metadata.to_metadata(MetadataDirective::Replace);
    if metadata.content_type.is_none() {
        let guess_from = if from_stdin { uri.key() } else { args.source.as_str() };
        metadata.content_type = mime_guess::from_path(guess_from)
            .first()
            .map(|mime| mime.to_string());
    }

    if ctx.dry_run {
        formatter.dry_run("upload", &format!("{} -> {uri}", args.source));
        return ExitCode::Success;
    }

    let spinner = formatter.spinner(format!("Uploading {uri}"));
    let result = if from_stdin {
        ctx.storage.upload_stdin(&uri, &metadata).await
    } else {
        ctx.storage
            .upload_file(Path::new(&args.source), &uri, &metadata)
            .await
    };
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    match result {
        Ok(receipt) => {
            print_receipt(formatter, &args.source, &uri, &receipt);
            ExitCode::Success
        }
        Err(e) => fail(formatter, &e),
    }
}

fn print_receipt(formatter: &Formatter, source: &str, uri: &StorageUri, receipt: &PutReceipt) {
    if formatter.is_json() {
        formatter.json(receipt);
        return;
    }
    let parts = if receipt.parts > 1 {
        format!(", {} parts", receipt.parts)
    } else {
        String::new()
    };
    formatter.success(&format!(
        "{source} -> {uri} ({}{parts})",
        formatter.style_size(&format_size(receipt.size, true))
    ));
}
