//! Multispectral band view: file picker, busy button, band tiles.

use dioxus::prelude::*;
use morphoscope_session::{GalleryEntry, ImageFile};

use super::gallery::render_entry;

/// Band splitting reads multi-channel TIFFs.
fn is_multispectral(name: &str) -> bool {
    name.rsplit_once('.')
        .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case("tif") || ext.eq_ignore_ascii_case("tiff"))
}

/// Props for the [`BandUploader`] component.
#[derive(Props, Clone, PartialEq)]
pub struct BandUploaderProps {
    /// Fired with the picked file, or `None` when nothing was picked.
    on_submit: EventHandler<Option<ImageFile>>,
    /// A request is in flight; the button is disabled meanwhile.
    busy: bool,
    /// Band tiles of the last successful request.
    bands: Vec<GalleryEntry>,
    /// Error of the last request, if any.
    error: Option<String>,
}

/// Upload a multispectral image and show one tile per band.
#[component]
pub fn BandUploader(props: BandUploaderProps) -> Element {
    let mut file = use_signal(|| Option::<ImageFile>::None);
    let mut pick_error = use_signal(|| Option::<String>::None);

    let handle_files = move |evt: FormEvent| async move {
        let Some(picked) = evt.files().into_iter().next() else {
            return;
        };
        let name = picked.name();
        if !is_multispectral(&name) {
            pick_error.set(Some(format!("Expected a TIFF image: {name}")));
            return;
        }
        match picked.read_bytes().await {
            Ok(bytes) => {
                pick_error.set(None);
                file.set(Some(ImageFile::new(name, bytes.to_vec())));
            }
            Err(e) => pick_error.set(Some(format!("Failed to read file: {e}"))),
        }
    };

    let button_label = if props.busy { "Processing..." } else { "Upload and split bands" };
    let error = pick_error().or_else(|| props.error.clone());
    let picked_label = file().map_or_else(|| String::from("Choose TIFF"), |f| f.name);

    rsx! {
        div { class: "flex flex-col gap-4",
            h2 { class: "text-xl text-[var(--text-heading)]", "Multispectral bands" }

            div { class: "flex flex-wrap items-center gap-3",
                label {
                    class: "inline-block px-4 py-2 bg-[var(--surface)] border border-[var(--border-muted)] rounded cursor-pointer",
                    input {
                        r#type: "file",
                        accept: ".tif,.tiff",
                        class: "hidden",
                        onchange: handle_files,
                    }
                    "{picked_label}"
                }
                button {
                    r#type: "button",
                    disabled: props.busy,
                    class: "px-4 py-2 bg-[var(--btn-primary)] hover:bg-[var(--btn-primary-hover)] disabled:opacity-50 rounded text-white font-medium transition-colors",
                    onclick: move |_| props.on_submit.call(file()),
                    "{button_label}"
                }
            }

            if let Some(ref err) = error {
                p { class: "text-[var(--text-error)] text-sm", "{err}" }
            }

            if !props.bands.is_empty() {
                div { class: "grid grid-cols-2 sm:grid-cols-3 lg:grid-cols-4 gap-4",
                    for band in props.bands.clone() {
                        {render_entry(band)}
                    }
                }
            }
        }
    }
}
