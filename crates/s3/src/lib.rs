//! s6-s3: aws-sdk-s3 adapter for s6cmd
//!
//! This crate implements the `ObjectStore` trait from s6-core on top of
//! aws-sdk-s3. It is the only crate that sees SDK types; every SDK error is
//! classified into `s6_core::Error` here.

pub mod classify;
mod client;

pub use classify::classify_code;
pub use client::S3Client;
