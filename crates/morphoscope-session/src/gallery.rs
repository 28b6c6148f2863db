//! Derived artifacts and the gallery rendering model.
//!
//! [`render`] is a pure function from the job's [`ArtifactSet`] and the
//! readiness flag to a [`GalleryView`]; the Dioxus component in
//! `morphoscope-io` only turns that view into elements.

use std::collections::HashSet;

use crate::config::ServiceOrigin;
use crate::wire::UploadResponse;

/// A resolved media URL, or `None` when the service gave no usable path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArtifactRef(Option<String>);

impl ArtifactRef {
    /// Resolve a service-relative reference against `origin`.
    #[must_use]
    pub fn resolve(origin: &ServiceOrigin, reference: Option<&str>) -> Self {
        Self(reference.and_then(|r| origin.resolve(r)))
    }

    /// The absolute URL, if any.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

/// A morphological operation output, in the order the service listed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedArtifact {
    pub name: String,
    pub reference: ArtifactRef,
}

/// Everything the service derived for one job.
///
/// Built once from the upload acknowledgement and never modified; a
/// resubmission replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSet {
    /// Server-side upload path used to start the stream.
    pub source_file: String,
    pub histogram: ArtifactRef,
    pub binary: ArtifactRef,
    pub morphology: Vec<NamedArtifact>,
    pub compound: Option<ArtifactRef>,
    pub object_count: u64,
}

impl ArtifactSet {
    /// Build the set from an upload acknowledgement, resolving every
    /// reference against the service origin.
    #[must_use]
    pub fn from_response(response: &UploadResponse, origin: &ServiceOrigin) -> Self {
        Self {
            source_file: response.file_path.clone(),
            histogram: ArtifactRef::resolve(origin, response.histogram_path.as_deref()),
            binary: ArtifactRef::resolve(
                origin,
                response
                    .binary_image
                    .as_ref()
                    .and_then(|b| b.image_url.as_deref()),
            ),
            morphology: response
                .morphological_operations
                .iter()
                .map(|op| NamedArtifact {
                    name: op.name.clone(),
                    reference: ArtifactRef::resolve(origin, op.image_url.as_deref()),
                })
                .collect(),
            compound: response
                .compound_image_path
                .as_deref()
                .map(|path| ArtifactRef::resolve(origin, Some(path))),
            object_count: response.object_count,
        }
    }
}

/// What a gallery entry displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Media {
    /// An image at an absolute URL.
    Image(String),
    /// The service gave no usable reference.
    Broken,
    /// A scalar count.
    Count(u64),
}

/// One rendered gallery item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryEntry {
    /// Unique within a view.
    pub key: String,
    pub label: String,
    pub media: Media,
}

/// The gallery as displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GalleryView {
    /// The job is not ready; nothing but a placeholder is shown.
    Processing,
    /// Artifacts in declared order.
    Artifacts(Vec<GalleryEntry>),
}

/// Render the gallery for the current job.
///
/// While `ready` is `false` the result is always
/// [`GalleryView::Processing`], whatever `artifacts` holds. Once ready,
/// entries follow a fixed order: histogram, binary, each morphological
/// operation as received, compound (if any), object count last. A key
/// that repeats is shown once.
#[must_use]
pub fn render(artifacts: Option<&ArtifactSet>, ready: bool) -> GalleryView {
    if !ready {
        return GalleryView::Processing;
    }
    let Some(set) = artifacts else {
        return GalleryView::Artifacts(Vec::new());
    };

    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(set.morphology.len() + 4);
    let mut push = |key: &str, label: &str, media: Media| {
        if seen.insert(key.to_owned()) {
            entries.push(GalleryEntry {
                key: key.to_owned(),
                label: label.to_owned(),
                media,
            });
        }
    };

    push("histogram", "Histogram", image_media(&set.histogram));
    push("binary", "Binary image", image_media(&set.binary));
    for op in &set.morphology {
        push(&op.name, &op.name, image_media(&op.reference));
    }
    if let Some(compound) = &set.compound {
        push("compound", "Compound (quadbits)", image_media(compound));
    }
    push("object_count", "Object count", Media::Count(set.object_count));

    GalleryView::Artifacts(entries)
}

pub(crate) fn image_media(reference: &ArtifactRef) -> Media {
    reference
        .url()
        .map_or(Media::Broken, |url| Media::Image(url.to_owned()))
}
