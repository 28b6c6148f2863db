//! End-to-end job scenarios against the loopback channel and a scripted
//! submitter.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use futures::executor::block_on;
use morphoscope_session::wire::{MediaEntry, event};
use morphoscope_session::{
    ChannelError, ClientConfig, ConnectionHandle, DeliveryReceiver, Disposition, EventChannel,
    GalleryView, Handler, ImageFile, JobOptions, JobStatus, JobSubmitter, LoopbackChannel, Media,
    Notice, StreamError, SubmitError, SubscriptionId, UploadResponse, ViewController,
};
use serde_json::{Value, json};

/// Replays queued outcomes and counts requests.
struct ScriptedSubmitter {
    outcomes: RefCell<VecDeque<Result<UploadResponse, SubmitError>>>,
    calls: Cell<usize>,
}

impl ScriptedSubmitter {
    fn new(outcomes: impl IntoIterator<Item = Result<UploadResponse, SubmitError>>) -> Self {
        Self {
            outcomes: RefCell::new(outcomes.into_iter().collect()),
            calls: Cell::new(0),
        }
    }
}

impl JobSubmitter for ScriptedSubmitter {
    async fn submit(
        &self,
        _image: &ImageFile,
        _options: JobOptions,
    ) -> Result<UploadResponse, SubmitError> {
        self.calls.set(self.calls.get() + 1);
        self.outcomes
            .borrow_mut()
            .pop_front()
            .expect("unexpected submission")
    }
}

fn media(name: &str, url: &str) -> MediaEntry {
    MediaEntry {
        name: name.into(),
        image_url: Some(url.into()),
    }
}

fn acknowledgement(file_path: &str) -> UploadResponse {
    UploadResponse {
        file_path: file_path.into(),
        histogram_path: Some("h.png".into()),
        binary_image: Some(media("binary", "b.png")),
        morphological_operations: vec![media("opened", "o.png"), media("closed", "c.png")],
        object_count: 7,
        compound_image_path: None,
    }
}

fn image() -> ImageFile {
    ImageFile::new("cells.png", vec![0x89, b'P', b'N', b'G'])
}

fn frame(index: i64) -> Value {
    json!({"frame": index, "regiones": [[{"x": 1}], [{"x": 2}]]})
}

fn mount(config: &ClientConfig) -> (ViewController<LoopbackChannel>, DeliveryReceiver, LoopbackChannel) {
    let server = LoopbackChannel::new();
    let (controller, receiver) = ViewController::mount(server.clone(), config).unwrap();
    (controller, receiver, server)
}

fn pump(receiver: &mut DeliveryReceiver, controller: &mut ViewController<LoopbackChannel>) {
    while let Ok(Some(delivery)) = receiver.try_next() {
        controller.deliver(delivery);
    }
}

/// Run one submission through `submitter` like the view does.
fn submit(
    controller: &mut ViewController<LoopbackChannel>,
    submitter: &ScriptedSubmitter,
    options: JobOptions,
) -> Disposition {
    let ticket = controller.begin_submit(Some(image()), options).unwrap();
    let result = block_on(submitter.submit(&ticket.image, ticket.options));
    controller.complete_submit(ticket.job, result)
}

#[test]
fn full_job_reveals_gallery_after_expected_frames() {
    let config = ClientConfig::default();
    let (mut controller, mut receiver, server) = mount(&config);
    let submitter = ScriptedSubmitter::new([Ok(acknowledgement("uploads/cells.png"))]);

    assert_eq!(
        submit(&mut controller, &submitter, JobOptions { overlap: false }),
        Disposition::Applied
    );
    assert_eq!(
        server.emitted(),
        vec![(
            event::START_STREAMING.to_owned(),
            json!({"file_path": "uploads/cells.png", "con_traslape": false})
        )]
    );

    for index in 0..9 {
        server.server_emit(event::NEW_DATA, &frame(index));
        pump(&mut receiver, &mut controller);
        assert_eq!(controller.gallery(), GalleryView::Processing, "frame {index}");
    }
    server.server_emit(event::NEW_DATA, &frame(9));
    pump(&mut receiver, &mut controller);

    assert_eq!(controller.status(), JobStatus::Ready);
    assert_eq!(controller.series().len(), 10);
    assert_eq!(controller.series().points()[0].value, 2.0);

    let GalleryView::Artifacts(entries) = controller.gallery() else {
        panic!("gallery should be revealed");
    };
    let shown: Vec<(&str, &Media)> = entries.iter().map(|e| (e.key.as_str(), &e.media)).collect();
    assert_eq!(
        shown,
        vec![
            ("histogram", &Media::Image("http://localhost:5000/h.png".into())),
            ("binary", &Media::Image("http://localhost:5000/b.png".into())),
            ("opened", &Media::Image("http://localhost:5000/o.png".into())),
            ("closed", &Media::Image("http://localhost:5000/c.png".into())),
            ("object_count", &Media::Count(7)),
        ]
    );
    assert_eq!(submitter.calls.get(), 1);
}

#[test]
fn six_artifacts_and_count_yield_seven_distinct_entries() {
    let config = ClientConfig {
        expected_frame_count: 1,
        ..ClientConfig::default()
    };
    let (mut controller, mut receiver, server) = mount(&config);
    let mut ack = acknowledgement("uploads/cells.png");
    ack.morphological_operations.push(media("labeled", "l.png"));
    ack.compound_image_path = Some("/processed-m/compound_quadbits.png".into());
    let submitter = ScriptedSubmitter::new([Ok(ack)]);

    submit(&mut controller, &submitter, JobOptions { overlap: true });
    server.server_emit(event::NEW_DATA, &frame(0));
    pump(&mut receiver, &mut controller);

    let GalleryView::Artifacts(entries) = controller.gallery() else {
        panic!("gallery should be revealed");
    };
    let shown: Vec<(&str, &Media)> = entries.iter().map(|e| (e.key.as_str(), &e.media)).collect();
    assert_eq!(
        shown,
        vec![
            ("histogram", &Media::Image("http://localhost:5000/h.png".into())),
            ("binary", &Media::Image("http://localhost:5000/b.png".into())),
            ("opened", &Media::Image("http://localhost:5000/o.png".into())),
            ("closed", &Media::Image("http://localhost:5000/c.png".into())),
            ("labeled", &Media::Image("http://localhost:5000/l.png".into())),
            (
                "compound",
                &Media::Image("http://localhost:5000/processed-m/compound_quadbits.png".into())
            ),
            ("object_count", &Media::Count(7)),
        ]
    );

    let mut keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
    keys.sort_unstable();
    keys.dedup();
    assert_eq!(keys.len(), 7);
    let mut urls: Vec<&str> = entries
        .iter()
        .filter_map(|e| match &e.media {
            Media::Image(url) => Some(url.as_str()),
            _ => None,
        })
        .collect();
    urls.sort_unstable();
    urls.dedup();
    assert_eq!(urls.len(), 6);
}

#[test]
fn disconnect_mid_stream_keeps_partial_series_hidden() {
    let (mut controller, mut receiver, server) = mount(&ClientConfig::default());
    let submitter = ScriptedSubmitter::new([Ok(acknowledgement("uploads/cells.png"))]);
    submit(&mut controller, &submitter, JobOptions::default());

    for index in 0..3 {
        server.server_emit(event::NEW_DATA, &frame(index));
    }
    server.drop_connections();
    pump(&mut receiver, &mut controller);

    assert_eq!(controller.series().len(), 3);
    assert_eq!(controller.gallery(), GalleryView::Processing);
    assert_eq!(
        controller.notice(),
        Some(&Notice::Stream(StreamError::StreamDisconnected))
    );
    assert!(controller.stream_ended());
}

#[test]
fn resubmission_discards_events_for_the_superseded_job() {
    let config = ClientConfig {
        expected_frame_count: 3,
        ..ClientConfig::default()
    };
    let (mut controller, mut receiver, server) = mount(&config);
    let submitter = ScriptedSubmitter::new([
        Ok(acknowledgement("uploads/first.png")),
        Ok(acknowledgement("uploads/second.png")),
    ]);

    submit(&mut controller, &submitter, JobOptions::default());
    server.server_emit(event::NEW_DATA, &frame(0));
    server.server_emit(event::NEW_DATA, &frame(1));

    // Both events are still queued when the user resubmits.
    submit(&mut controller, &submitter, JobOptions::default());
    pump(&mut receiver, &mut controller);
    assert!(controller.series().is_empty());
    assert_eq!(controller.stale_discarded(), 2);
    assert_eq!(controller.status(), JobStatus::Submitted);

    for index in 0..3 {
        server.server_emit(event::NEW_DATA, &frame(index));
    }
    pump(&mut receiver, &mut controller);
    assert_eq!(controller.series().len(), 3);
    assert!(controller.is_ready());
    assert_eq!(
        controller.artifacts().map(|a| a.source_file.as_str()),
        Some("uploads/second.png")
    );
    assert_eq!(server.peak_open_connections(), 1);
    assert_eq!(server.handler_count(event::NEW_DATA), 1);
}

#[test]
fn resubmitting_after_ready_resets_reveal() {
    let config = ClientConfig {
        expected_frame_count: 2,
        ..ClientConfig::default()
    };
    let (mut controller, mut receiver, server) = mount(&config);
    let submitter = ScriptedSubmitter::new([
        Ok(acknowledgement("uploads/a.png")),
        Ok(acknowledgement("uploads/b.png")),
    ]);

    submit(&mut controller, &submitter, JobOptions::default());
    server.server_emit(event::NEW_DATA, &frame(0));
    server.server_emit(event::NEW_DATA, &frame(1));
    pump(&mut receiver, &mut controller);
    assert!(controller.is_ready());

    let ticket = controller
        .begin_submit(Some(image()), JobOptions::default())
        .unwrap();
    assert!(!controller.is_ready());
    assert_eq!(controller.gallery(), GalleryView::Processing);
    assert!(controller.artifacts().is_none());

    let result = block_on(submitter.submit(&ticket.image, ticket.options));
    controller.complete_submit(ticket.job, result);
    assert_eq!(controller.status(), JobStatus::Submitted);
}

#[test]
fn repeated_submissions_never_duplicate_handlers() {
    let (mut controller, mut receiver, server) = mount(&ClientConfig::default());
    let submitter = ScriptedSubmitter::new(
        (0..5).map(|n| Ok(acknowledgement(&format!("uploads/{n}.png")))),
    );

    for _ in 0..5 {
        submit(&mut controller, &submitter, JobOptions::default());
        assert_eq!(server.open_connections(), 1);
        for name in [event::NEW_DATA, event::STOP, event::ERROR, event::DISCONNECT] {
            assert_eq!(server.handler_count(name), 1, "{name}");
        }
    }
    assert_eq!(server.peak_open_connections(), 1);
    assert_eq!(server.connect_count(), 5);

    assert_eq!(server.server_emit(event::NEW_DATA, &frame(0)), 1);
    pump(&mut receiver, &mut controller);
    assert_eq!(controller.series().len(), 1);
}

#[test]
fn rejected_upload_never_starts_the_stream() {
    let (mut controller, _receiver, server) = mount(&ClientConfig::default());
    let submitter = ScriptedSubmitter::new([Err(SubmitError::ServerRejected {
        status: 400,
        message: "No se encontró la imagen".into(),
    })]);

    submit(&mut controller, &submitter, JobOptions::default());
    assert_eq!(controller.status(), JobStatus::Failed);
    assert!(server.emitted().is_empty());
    assert_eq!(
        controller.notice().map(ToString::to_string).as_deref(),
        Some("No se encontró la imagen (HTTP 400)")
    );
}

#[test]
fn missing_file_sends_nothing() {
    let (mut controller, _receiver, server) = mount(&ClientConfig::default());
    let nothing: [Result<UploadResponse, SubmitError>; 0] = [];
    let submitter = ScriptedSubmitter::new(nothing);

    assert_eq!(
        controller.begin_submit(None, JobOptions::default()),
        Err(SubmitError::NoFileSelected)
    );
    assert_eq!(submitter.calls.get(), 0);
    assert!(server.emitted().is_empty());
    assert_eq!(controller.status(), JobStatus::Idle);
}

#[test]
fn unmount_closes_the_connection() {
    let (controller, _receiver, server) = mount(&ClientConfig::default());
    assert_eq!(server.open_connections(), 1);
    drop(controller);
    assert_eq!(server.open_connections(), 0);
}

/// A service that refuses every connection.
struct Unreachable;

impl EventChannel for Unreachable {
    fn connect(&mut self) -> Result<ConnectionHandle, ChannelError> {
        Err(ChannelError::Transport("connection refused".into()))
    }

    fn subscribe(
        &mut self,
        _handle: ConnectionHandle,
        _event: &str,
        _handler: Handler,
    ) -> Result<SubscriptionId, ChannelError> {
        Err(ChannelError::NotConnected)
    }

    fn emit(&mut self, _handle: ConnectionHandle, _event: &str, _payload: Value) -> Result<(), ChannelError> {
        Err(ChannelError::NotConnected)
    }

    fn disconnect(&mut self, _handle: ConnectionHandle) {}
}

#[test]
fn failed_mount_can_be_retried_with_a_new_channel() {
    let config = ClientConfig {
        expected_frame_count: 1,
        ..ClientConfig::default()
    };
    let Err(err) = ViewController::mount(Unreachable, &config) else {
        panic!("mount should fail");
    };
    assert_eq!(err, ChannelError::Transport("connection refused".into()));

    let (mut controller, mut receiver, server) = mount(&config);
    let submitter = ScriptedSubmitter::new([Ok(acknowledgement("uploads/cells.png"))]);
    submit(&mut controller, &submitter, JobOptions::default());
    server.server_emit(event::NEW_DATA, &frame(0));
    pump(&mut receiver, &mut controller);

    assert_eq!(controller.status(), JobStatus::Ready);
    assert_eq!(server.open_connections(), 1);
}
