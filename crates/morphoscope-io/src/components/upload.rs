//! Upload form: file picker with drag-and-drop, overlap option, submit.

use dioxus::html::{FileData, HasFileData};
use dioxus::prelude::*;
use morphoscope_session::{ImageFile, JobOptions};

/// Image types the processing service accepts.
const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// Check whether a filename has an allowed image extension.
fn has_allowed_extension(name: &str) -> bool {
    name.rsplit_once('.').is_some_and(|(_, ext)| {
        ALLOWED_EXTENSIONS
            .iter()
            .any(|a| a.eq_ignore_ascii_case(ext))
    })
}

/// Props for the [`UploadForm`] component.
#[derive(Props, Clone, PartialEq)]
pub struct UploadFormProps {
    /// Fired on submit with the picked file (if any) and the options.
    on_submit: EventHandler<(Option<ImageFile>, JobOptions)>,
    /// A job is in flight; the button label reflects it.
    busy: bool,
}

/// A drag-and-drop zone with a file picker, the "con traslape" option,
/// and a submit button.
///
/// Submitting without a file is allowed and forwarded as `None`, so the
/// caller reports it like any other submission error.
#[component]
pub fn UploadForm(props: UploadFormProps) -> Element {
    let mut dragging = use_signal(|| false);
    let mut file = use_signal(|| Option::<ImageFile>::None);
    let mut overlap = use_signal(|| false);
    let mut error = use_signal(|| Option::<String>::None);

    // Validate and read the first file from a list. Shared by the
    // picker and the drop zone.
    let pick_files = move |files: Vec<FileData>| async move {
        if let Some(picked) = files.first() {
            let name = picked.name();
            if !has_allowed_extension(&name) {
                error.set(Some(format!("Unsupported file type: {name}")));
                return;
            }
            match picked.read_bytes().await {
                Ok(bytes) => {
                    error.set(None);
                    file.set(Some(ImageFile::new(name, bytes.to_vec())));
                }
                Err(e) => {
                    error.set(Some(format!("Failed to read file: {e}")));
                }
            }
        }
    };

    let handle_files = move |evt: FormEvent| async move {
        pick_files(evt.files()).await;
    };

    let handle_drop = move |evt: DragEvent| async move {
        evt.prevent_default();
        dragging.set(false);
        pick_files(evt.files()).await;
    };

    let handle_submit = move |evt: FormEvent| {
        evt.prevent_default();
        props.on_submit.call((
            file(),
            JobOptions {
                overlap: overlap(),
            },
        ));
    };

    let border_class = if dragging() {
        "border-[var(--border-accent)] bg-[var(--surface-active)]"
    } else {
        "border-[var(--border-muted)] bg-[var(--surface)]"
    };
    let button_label = if props.busy { "Resubmit" } else { "Process image" };

    rsx! {
        form {
            class: "flex flex-col gap-3",
            onsubmit: handle_submit,

            div {
                class: "border-2 border-dashed rounded-lg p-6 text-center transition-colors {border_class}",
                ondragover: move |evt| {
                    evt.prevent_default();
                    dragging.set(true);
                },
                ondragleave: move |_| {
                    dragging.set(false);
                },
                ondrop: handle_drop,

                if let Some(ref picked) = file() {
                    p { class: "text-[var(--text-success)] mb-2",
                        "Selected: {picked.name}"
                    }
                }

                if let Some(ref err) = error() {
                    p { class: "text-[var(--text-error)] mb-2",
                        "{err}"
                    }
                }

                p { class: "text-[var(--text-secondary)] mb-3",
                    "Drop an image here or "
                }

                label {
                    class: "inline-block px-4 py-2 bg-[var(--btn-primary)] hover:bg-[var(--btn-primary-hover)] rounded cursor-pointer text-white font-medium transition-colors",
                    input {
                        r#type: "file",
                        accept: ".png,.jpg,.jpeg,.bmp,.tif,.tiff",
                        class: "hidden",
                        onchange: handle_files,
                    }
                    "Choose File"
                }

                p { class: "text-[var(--muted)] text-sm mt-2",
                    "PNG, JPEG, BMP, TIFF"
                }
            }

            label { class: "flex items-center gap-2 text-sm",
                input {
                    r#type: "checkbox",
                    checked: overlap(),
                    onchange: move |evt: FormEvent| overlap.set(evt.checked()),
                }
                "Con traslape (overlapping bands)"
            }

            button {
                r#type: "submit",
                class: "px-4 py-2 bg-[var(--btn-primary)] hover:bg-[var(--btn-primary-hover)] rounded text-white font-medium transition-colors",
                "{button_label}"
            }
        }
    }
}
