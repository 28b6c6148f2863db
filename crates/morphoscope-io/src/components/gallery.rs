//! Artifact gallery: turns a [`GalleryView`] into elements.

use dioxus::prelude::*;
use morphoscope_session::{GalleryEntry, GalleryView, Media};

/// Props for the [`ArtifactGallery`] component.
#[derive(Props, Clone, PartialEq)]
pub struct ArtifactGalleryProps {
    /// The rendered gallery for the current job.
    view: GalleryView,
}

/// Derived imagery of a job, revealed once the job is ready.
///
/// Before that only a processing placeholder is shown. An entry whose
/// reference could not be resolved shows a broken-media placeholder in
/// its slot.
#[component]
pub fn ArtifactGallery(props: ArtifactGalleryProps) -> Element {
    match props.view {
        GalleryView::Processing => rsx! {
            div { class: "flex items-center justify-center p-6 bg-[var(--surface)] rounded",
                p { class: "text-[var(--text-secondary)] animate-pulse",
                    "Processing..."
                }
            }
        },
        GalleryView::Artifacts(entries) => rsx! {
            div { class: "grid grid-cols-1 sm:grid-cols-2 lg:grid-cols-3 gap-4",
                for entry in entries {
                    {render_entry(entry)}
                }
            }
        },
    }
}

/// Render a single gallery tile.
pub(crate) fn render_entry(entry: GalleryEntry) -> Element {
    let GalleryEntry { key, label, media } = entry;
    let body = match media {
        Media::Image(url) => rsx! {
            img {
                src: "{url}",
                alt: "{label}",
                class: "w-full h-auto rounded bg-[var(--preview-bg)]",
            }
        },
        Media::Broken => rsx! {
            div { class: "w-full aspect-square flex items-center justify-center rounded bg-[var(--preview-bg)] text-[var(--text-disabled)] text-sm",
                "Image unavailable"
            }
        },
        Media::Count(count) => rsx! {
            p { class: "text-4xl font-semibold text-[var(--text-heading)] text-center py-6",
                "{count}"
            }
        },
    };

    rsx! {
        figure { key: "{key}",
            class: "flex flex-col gap-2 p-2 bg-[var(--surface)] rounded",
            {body}
            figcaption { class: "text-sm text-[var(--text-secondary)] text-center",
                "{label}"
            }
        }
    }
}
