//! Dioxus UI components for morphoscope.
//!
//! Provides the upload form with drag-and-drop, the streamed series
//! chart, the artifact gallery and the band uploader.

mod bands;
mod chart;
mod gallery;
mod upload;

pub use bands::BandUploader;
pub use chart::SeriesChart;
pub use gallery::ArtifactGallery;
pub use upload::UploadForm;
