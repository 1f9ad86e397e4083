//! SDK error classification
//!
//! The one place provider error shapes are looked at. Every `SdkError`
//! returned by the client goes through [`classify`] exactly once.

use aws_sdk_s3::error::SdkError;
use aws_smithy_types::error::display::DisplayErrorContext;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use s6_core::Error;

/// Map a provider error code and HTTP status to an [`Error`]
///
/// `resource` names what the request was about (`bucket` or `bucket/key`).
/// Known codes win over the status; unrecognised codes keep the code in
/// [`Error::Unknown`].
pub fn classify_code(
    code: Option<&str>,
    status: Option<u16>,
    message: &str,
    resource: &str,
) -> Error {
    match code {
        Some("NoSuchBucket" | "NoSuchKey" | "NotFound" | "NoSuchUpload") => {
            return Error::NotFound(resource.to_string());
        }
        Some("BucketAlreadyOwnedByYou") => {
            return Error::AlreadyExists {
                resource: resource.to_string(),
                owned_by_you: true,
            };
        }
        Some("BucketAlreadyExists") => {
            return Error::AlreadyExists {
                resource: resource.to_string(),
                owned_by_you: false,
            };
        }
        Some(
            "AccessDenied" | "AllAccessDisabled" | "InvalidAccessKeyId" | "SignatureDoesNotMatch"
            | "Forbidden",
        ) => return Error::AccessDenied(resource.to_string()),
        Some("EntityTooLarge") => return Error::ObjectTooLarge(resource.to_string()),
        Some("ObjectNotInActiveTierError" | "InvalidObjectState") => {
            return Error::ObjectNotActive(resource.to_string());
        }
        _ => {}
    }

    match status {
        Some(404) => Error::NotFound(resource.to_string()),
        Some(403) => Error::AccessDenied(resource.to_string()),
        _ => Error::Unknown {
            code: code.map(str::to_string),
            message: if message.is_empty() {
                resource.to_string()
            } else {
                format!("{resource}: {message}")
            },
        },
    }
}

/// Classify an SDK failure for `resource`
pub(crate) fn classify<E>(error: SdkError<E>, resource: &str) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match &error {
        SdkError::ServiceError(service) => {
            let err = service.err();
            let status = service.raw().status().as_u16();
            let classified = classify_code(
                err.code(),
                Some(status),
                err.message().unwrap_or_default(),
                resource,
            );
            tracing::debug!(
                resource,
                status,
                code = err.code().unwrap_or("-"),
                kind = %classified.kind(),
                "Service error"
            );
            classified
        }
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) | SdkError::ResponseError(_) => {
            Error::TransferFailed {
                message: format!("{resource}: {}", DisplayErrorContext(&error)),
                source: None,
            }
        }
        _ => Error::Unknown {
            code: None,
            message: format!("{resource}: {}", DisplayErrorContext(&error)),
        },
    }
}
