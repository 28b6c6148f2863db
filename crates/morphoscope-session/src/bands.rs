//! Multispectral band splitting.
//!
//! A single request with no stream: the service splits the uploaded
//! image into its spectral bands and answers with one rendered image per
//! band. [`BandScreen`] holds what the band view shows.

use crate::config::ServiceOrigin;
use crate::error::SubmitError;
use crate::gallery::{self, ArtifactRef, GalleryEntry};
use crate::submit::require_file;
use crate::types::ImageFile;
use crate::wire::BandUploadResponse;

/// Uploads a multispectral image and returns its band images.
#[allow(async_fn_in_trait)] // single-threaded WASM; futures need not be Send
pub trait BandSubmitter {
    /// Upload `image` for band splitting.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`JobSubmitter::submit`](crate::JobSubmitter::submit).
    async fn split_bands(&self, image: &ImageFile) -> Result<BandUploadResponse, SubmitError>;
}

/// One accepted band request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandTicket {
    pub generation: u64,
    pub image: ImageFile,
}

/// State of the band view: busy flag, band tiles, last error.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BandScreen {
    generation: u64,
    busy: bool,
    bands: Vec<GalleryEntry>,
    error: Option<SubmitError>,
}

impl BandScreen {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request for `file`.
    ///
    /// Clears the previous bands and error. Without a file nothing is
    /// sent and the error is recorded instead.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::NoFileSelected`] when no usable file is
    /// given.
    pub fn begin(&mut self, file: Option<ImageFile>) -> Result<BandTicket, SubmitError> {
        let image = require_file(file).inspect_err(|e| self.error = Some(e.clone()))?;
        self.generation += 1;
        self.busy = true;
        self.bands.clear();
        self.error = None;
        tracing::info!(generation = self.generation, file = %image.name, "band split requested");
        Ok(BandTicket {
            generation: self.generation,
            image,
        })
    }

    /// Apply the outcome of the request issued as `generation`.
    ///
    /// Returns `false`, changing nothing, for an outcome of any other
    /// request.
    pub fn complete(
        &mut self,
        generation: u64,
        result: Result<BandUploadResponse, SubmitError>,
        origin: &ServiceOrigin,
    ) -> bool {
        if generation != self.generation || !self.busy {
            tracing::debug!(generation, current = self.generation, "discarding band result");
            return false;
        }
        self.busy = false;
        match result {
            Ok(response) => {
                self.bands = band_entries(&response, origin);
                tracing::info!(bands = self.bands.len(), "bands received");
            }
            Err(e) => {
                tracing::warn!(error = %e, "band split failed");
                self.error = Some(e);
            }
        }
        true
    }

    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.busy
    }

    /// Band tiles in band order.
    #[must_use]
    pub fn bands(&self) -> &[GalleryEntry] {
        &self.bands
    }

    #[must_use]
    pub const fn error(&self) -> Option<&SubmitError> {
        self.error.as_ref()
    }
}

fn band_entries(response: &BandUploadResponse, origin: &ServiceOrigin) -> Vec<GalleryEntry> {
    response
        .band_images
        .iter()
        .enumerate()
        .map(|(i, band)| GalleryEntry {
            key: format!("band-{}", i + 1),
            label: if band.name.is_empty() {
                format!("Band {}", i + 1)
            } else {
                band.name.clone()
            },
            media: gallery::image_media(&ArtifactRef::resolve(origin, band.image_url.as_deref())),
        })
        .collect()
}
