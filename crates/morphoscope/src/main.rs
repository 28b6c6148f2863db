use dioxus::prelude::*;
use futures::StreamExt;
use morphoscope_io::timeout::{sleep, with_timeout};
use morphoscope_io::{
    ArtifactGallery, BandUploader, HttpBandSubmitter, HttpSubmitter, SeriesChart, SocketChannel,
    UploadForm,
};
use morphoscope_session::{
    BandScreen, BandSubmitter, ChannelError, ClientConfig, GalleryView, SubmitError, ImageFile, JobOptions, JobStatus, JobSubmitter, TimeoutKind,
    ViewController,
};

type Controller = ViewController<SocketChannel>;

fn main() {
    dioxus::logger::initialize_default();
    dioxus::launch(app);
}

/// Build-time configuration, or the defaults with a note explaining why.
fn load_config() -> (ClientConfig, Option<String>) {
    let Some(json) = option_env!("MORPHOSCOPE_CONFIG") else {
        return (ClientConfig::default(), None);
    };
    match ClientConfig::from_json(json) {
        Ok(config) => (config, None),
        Err(e) => {
            tracing::warn!(error = %e, "invalid MORPHOSCOPE_CONFIG; using defaults");
            (
                ClientConfig::default(),
                Some(format!("Invalid configuration, using defaults: {e}")),
            )
        }
    }
}

/// Mount a controller into `view` and pump its deliveries from a task.
///
/// Deliveries are applied strictly in arrival order by that one task.
/// On failure the error panel says so and `false` is returned.
fn attach(
    config: &ClientConfig,
    mut view: Signal<Option<Controller>>,
    mut mount_error: Signal<Option<String>>,
) -> bool {
    let channel = SocketChannel::new(config.socket_url());
    match ViewController::mount(channel, config) {
        Ok((controller, mut deliveries)) => {
            mount_error.set(None);
            view.set(Some(controller));
            spawn(async move {
                while let Some(delivery) = deliveries.next().await {
                    if let Some(controller) = view.write().as_mut() {
                        controller.deliver(delivery);
                    }
                }
            });
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not open the event stream");
            mount_error.set(Some(mount_failure_note(&e)));
            false
        }
    }
}

fn mount_failure_note(e: &ChannelError) -> String {
    format!("Could not connect to the service: {e}. Submit again to retry.")
}

/// Which screen the page shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Morphology,
    Bands,
}

/// What the view shows, copied out of the controller for one render.
#[derive(Clone, PartialEq)]
struct Snapshot {
    status: JobStatus,
    job_label: Option<String>,
    points: Vec<(String, f64)>,
    expected: usize,
    gallery: GalleryView,
    notice: Option<String>,
    dropped: usize,
    stale: usize,
}

impl Snapshot {
    fn of(controller: &Controller) -> Self {
        Self {
            status: controller.status(),
            job_label: controller
                .job()
                .map(|job| format!("{} ({})", job.id, job.file_name)),
            points: controller.series().chart_pairs(),
            expected: controller.expected_frame_count(),
            gallery: controller.gallery(),
            notice: controller.notice().map(ToString::to_string),
            dropped: controller.dropped_events(),
            stale: controller.stale_discarded(),
        }
    }
}

/// Root application component.
///
/// Owns the [`ViewController`] for the page: connects the stream on
/// mount, pumps stream deliveries into it in order, runs uploads with
/// their bounded waits, and releases the connection on unmount.
#[allow(clippy::too_many_lines)]
fn app() -> Element {
    let (config, config_note) = use_hook(load_config);
    let submitter = use_hook(|| HttpSubmitter::new(config.upload_url()));
    let mut view = use_signal(|| Option::<Controller>::None);
    let mut mount_error = use_signal(|| Option::<String>::None);
    let mut screen = use_signal(|| Screen::Morphology);
    let band_submitter = use_hook(|| HttpBandSubmitter::new(config.band_url()));
    let mut bands = use_signal(BandScreen::new);

    // --- Mount: connect and pump deliveries ---
    let mount_config = config.clone();
    use_future(move || {
        let config = mount_config.clone();
        async move {
            attach(&config, view, mount_error);
        }
    });

    // --- Unmount: drop the controller, which disconnects ---
    use_drop(move || {
        if let Ok(mut slot) = view.try_write() {
            slot.take();
        }
    });

    // --- Submit handler ---
    let submit_timeout_ms = config.submit_timeout_ms;
    let first_event_timeout_ms = config.first_event_timeout_ms;
    let submit_config = config.clone();
    let on_submit = move |(file, options): (Option<ImageFile>, JobOptions)| {
        // A failed mount is retried by the next submission.
        let detached = view.read().is_none();
        if detached && !attach(&submit_config, view, mount_error) {
            return;
        }
        let ticket = {
            let mut slot = view.write();
            let Some(controller) = slot.as_mut() else {
                return;
            };
            // A missing file is recorded as the controller's notice.
            let Ok(ticket) = controller.begin_submit(file, options) else {
                return;
            };
            ticket
        };
        let submitter = submitter.clone();

        spawn(async move {
            let upload = submitter.submit(&ticket.image, ticket.options);
            let outcome = with_timeout(submit_timeout_ms, upload).await;

            let streaming = {
                let mut slot = view.write();
                let Some(controller) = slot.as_mut() else {
                    return;
                };
                match outcome {
                    Some(result) => {
                        controller.complete_submit(ticket.job, result);
                    }
                    None => {
                        controller.on_timeout(ticket.job, TimeoutKind::Submit);
                    }
                }
                controller.job().is_some_and(|job| job.id == ticket.job)
                    && controller.status() == JobStatus::Submitted
            };

            // First-frame watchdog; a no-op once frames have arrived.
            if streaming {
                sleep(first_event_timeout_ms).await;
                if let Some(controller) = view.write().as_mut() {
                    controller.on_timeout(ticket.job, TimeoutKind::FirstEvent);
                }
            }
        });
    };

    // --- Band split handler ---
    let band_origin = config.service_origin.clone();
    let on_band_submit = move |file: Option<ImageFile>| {
        // A missing file is recorded as the screen's error.
        let Ok(ticket) = bands.write().begin(file) else {
            return;
        };
        let submitter = band_submitter.clone();
        let origin = band_origin.clone();
        spawn(async move {
            let outcome = with_timeout(submit_timeout_ms, submitter.split_bands(&ticket.image))
                .await
                .unwrap_or(Err(SubmitError::Timeout));
            bands.write().complete(ticket.generation, outcome, &origin);
        });
    };

    let snapshot = view.read().as_ref().map(Snapshot::of);
    let busy = snapshot.as_ref().is_some_and(|s| s.status.is_in_flight());

    rsx! {
        div { class: "min-h-screen bg-(--bg) text-(--text) flex flex-col",
            header { class: "px-6 py-4 border-b border-(--border)",
                h1 { class: "text-2xl title-brand", "morphoscope" }
                p { class: "text-(--muted) text-sm",
                    "Binarization, morphology and region labeling, streamed frame by frame"
                }
            }

            nav { class: "px-6 pt-4 flex gap-2",
                {tab(screen, Screen::Morphology, "Morphology")}
                {tab(screen, Screen::Bands, "Multispectral bands")}
            }

            if screen() == Screen::Bands {
                div { class: "p-6",
                    BandUploader {
                        on_submit: on_band_submit,
                        busy: bands.read().is_busy(),
                        bands: bands.read().bands().to_vec(),
                        error: bands.read().error().map(ToString::to_string),
                    }
                }
            } else {
                div { class: "flex-1 flex flex-col lg:flex-row gap-6 p-6",
                    // Left column: upload form and status
                    div { class: "w-full lg:w-80 flex flex-col gap-4",
                        UploadForm { on_submit: on_submit, busy: busy }

                        if let Some(ref note) = config_note {
                            div { class: "bg-(--error-bg) border border-(--error-border) rounded p-3",
                                p { class: "text-(--text-error) text-sm", "{note}" }
                            }
                        }
                        if let Some(ref err) = mount_error() {
                            div { class: "bg-(--error-bg) border border-(--error-border) rounded p-3",
                                p { class: "text-(--text-error) text-sm", "{err}" }
                            }
                        }

                        if let Some(ref s) = snapshot {
                            {status_line(s)}
                        }
                    }

                    // Right column: chart and gallery
                    div { class: "flex-1 flex flex-col gap-4",
                        match snapshot.clone() {
                            Some(s) if s.job_label.is_some() => rsx! {
                                SeriesChart { points: s.points, expected: s.expected }
                                ArtifactGallery { view: s.gallery }
                            },
                            _ => rsx! {
                                div { class: "flex-1 flex items-center justify-center",
                                    p { class: "text-(--text-placeholder) text-lg",
                                        "Upload an image to get started"
                                    }
                                }
                            },
                        }
                    }
                }
            }
        }
    }
}

/// A screen switch button.
fn tab(mut screen: Signal<Screen>, target: Screen, label: &str) -> Element {
    let class = if screen() == target {
        "px-3 py-1 rounded bg-[var(--btn-primary)] text-white"
    } else {
        "px-3 py-1 rounded bg-[var(--surface)] text-[var(--text-secondary)]"
    };
    rsx! {
        button {
            r#type: "button",
            class: "{class}",
            onclick: move |_| screen.set(target),
            "{label}"
        }
    }
}

/// Job status with diagnostics, and the current notice if any.
fn status_line(s: &Snapshot) -> Element {
    let job = s.job_label.clone().unwrap_or_else(|| String::from("No job yet"));
    let status = s.status.label();
    let received = s.points.len();
    let expected = s.expected;

    rsx! {
        div { class: "bg-[var(--surface)] rounded p-3 flex flex-col gap-1 text-sm",
            p { class: "font-semibold text-[var(--text-heading)]", "{job}" }
            p { class: "text-[var(--text-secondary)]",
                "{status} · {received}/{expected} frames"
            }
            if s.dropped > 0 || s.stale > 0 {
                p { class: "text-[var(--muted)] text-xs",
                    "{s.dropped} malformed events dropped · {s.stale} stale results discarded"
                }
            }
            if let Some(ref notice) = s.notice {
                p { class: "text-(--text-error)", "{notice}" }
            }
        }
    }
}
