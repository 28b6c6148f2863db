//! Multipart image upload over `fetch`.

use morphoscope_session::wire::{
    self, BAND_IMAGE_FIELD, UPLOAD_IMAGE_FIELD, UPLOAD_OVERLAP_FIELD, UploadResponse,
};
use morphoscope_session::{
    BandSubmitter, BandUploadResponse, ImageFile, JobOptions, JobSubmitter, SubmitError,
};
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{BlobPropertyBag, FormData, RequestInit, RequestMode, Response};

use crate::error::BrowserError;

/// [`JobSubmitter`] that posts the image as `multipart/form-data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSubmitter {
    upload_url: String,
}

impl HttpSubmitter {
    /// Create a submitter for the full upload endpoint URL.
    #[must_use]
    pub fn new(upload_url: impl Into<String>) -> Self {
        Self {
            upload_url: upload_url.into(),
        }
    }

    /// The endpoint this submitter posts to.
    #[must_use]
    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }
}

/// [`BandSubmitter`] that posts a multispectral image for band splitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpBandSubmitter {
    band_url: String,
}

impl HttpBandSubmitter {
    /// Create a submitter for the full band endpoint URL.
    #[must_use]
    pub fn new(band_url: impl Into<String>) -> Self {
        Self {
            band_url: band_url.into(),
        }
    }
}

/// A multipart body holding `image` under `field`, with its file name.
fn image_form(field: &str, image: &ImageFile) -> Result<FormData, BrowserError> {
    let bytes = js_sys::Uint8Array::from(image.bytes.as_slice());
    let parts = js_sys::Array::new();
    parts.push(&bytes);

    let opts = BlobPropertyBag::new();
    opts.set_type(image.mime_type());
    let blob = web_sys::Blob::new_with_u8_array_sequence_and_options(&parts, &opts)?;

    let form = FormData::new()?;
    form.append_with_blob_and_filename(field, &blob, &image.name)?;
    Ok(form)
}

/// Build the upload body: the image under `imagen` with its file
/// name, and the overlap flag under `con_traslape`.
fn form_data(image: &ImageFile, options: JobOptions) -> Result<FormData, BrowserError> {
    let form = image_form(UPLOAD_IMAGE_FIELD, image)?;
    form.append_with_str(
        UPLOAD_OVERLAP_FIELD,
        if options.overlap { "true" } else { "false" },
    )?;
    Ok(form)
}

/// Send the request and return the status with the raw body.
#[allow(clippy::future_not_send)] // WASM is single-threaded; Send is not needed
async fn post(url: &str, form: &FormData) -> Result<(u16, String), BrowserError> {
    let window = web_sys::window().ok_or(BrowserError::Unavailable("window"))?;

    let init = RequestInit::new();
    init.set_method("POST");
    init.set_mode(RequestMode::Cors);
    init.set_body(form);

    let response: Response = JsFuture::from(window.fetch_with_str_and_init(url, &init))
        .await?
        .dyn_into()?;
    let body = JsFuture::from(response.text()?)
        .await?
        .as_string()
        .unwrap_or_default();
    Ok((response.status(), body))
}

impl JobSubmitter for HttpSubmitter {
    #[allow(clippy::future_not_send)]
    async fn submit(
        &self,
        image: &ImageFile,
        options: JobOptions,
    ) -> Result<UploadResponse, SubmitError> {
        let form = form_data(image, options)?;
        tracing::debug!(url = %self.upload_url, file = %image.name, bytes = image.bytes.len(), "uploading");

        let (status, body) = post(&self.upload_url, &form).await?;
        let outcome = wire::classify_response(status, &body);
        match &outcome {
            Ok(resp) => tracing::info!(
                status,
                file_path = %resp.file_path,
                operations = resp.morphological_operations.len(),
                "upload acknowledged"
            ),
            Err(e) => tracing::warn!(status, error = %e, "upload rejected"),
        }
        outcome
    }
}

impl BandSubmitter for HttpBandSubmitter {
    #[allow(clippy::future_not_send)]
    async fn split_bands(&self, image: &ImageFile) -> Result<BandUploadResponse, SubmitError> {
        let form = image_form(BAND_IMAGE_FIELD, image)?;
        tracing::debug!(url = %self.band_url, file = %image.name, "uploading for band split");

        let (status, body) = post(&self.band_url, &form).await?;
        let outcome = wire::classify_band_response(status, &body);
        match &outcome {
            Ok(resp) => tracing::info!(status, bands = resp.band_images.len(), "bands returned"),
            Err(e) => tracing::warn!(status, error = %e, "band split rejected"),
        }
        outcome
    }
}
