//! Job submission: the one-shot upload that precedes streaming.

use crate::error::SubmitError;
use crate::types::{ImageFile, JobOptions};
use crate::wire::UploadResponse;

/// Uploads an image with its options and returns the acknowledgement.
///
/// Implementations send exactly one request per call and never retry;
/// retrying is a user action.
#[allow(async_fn_in_trait)] // single-threaded WASM; futures need not be Send
pub trait JobSubmitter {
    /// Upload `image` for processing.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::NetworkFailure`] when no response arrives,
    /// [`SubmitError::ServerRejected`] for a non-success status, and
    /// [`SubmitError::MalformedResponse`] for an unexpected body.
    async fn submit(
        &self,
        image: &ImageFile,
        options: JobOptions,
    ) -> Result<UploadResponse, SubmitError>;
}

/// Precondition for any submission.
///
/// # Errors
///
/// Returns [`SubmitError::NoFileSelected`] when `file` is `None` or has no
/// bytes.
pub fn require_file(file: Option<ImageFile>) -> Result<ImageFile, SubmitError> {
    match file {
        Some(file) if !file.bytes.is_empty() => Ok(file),
        _ => Err(SubmitError::NoFileSelected),
    }
}
