//! morphoscope-session: Job orchestration for the morphoscope client (sans-IO).
//!
//! Tracks one image-processing job at a time against a remote service:
//! upload -> acknowledgement -> streamed `nueva_data` frames -> reveal.
//! A separate one-shot exchange splits a multispectral image into its
//! band images.
//!
//! This crate has **no I/O dependencies** -- the event channel and the
//! upload are abstracted behind the [`EventChannel`] and [`JobSubmitter`]
//! traits. Browser implementations live in `morphoscope-io`.

pub mod aggregator;
pub mod bands;
pub mod channel;
pub mod config;
pub mod controller;
pub mod error;
pub mod gallery;
pub mod socketio;
pub mod submit;
pub mod types;
pub mod wire;

pub use aggregator::StreamAggregator;
pub use bands::{BandScreen, BandSubmitter, BandTicket};
pub use channel::{
    ConnectionHandle, Delivery, DeliveryReceiver, EventChannel, Handler, HandlerTable,
    LoopbackChannel, StreamEvent, SubscriptionId,
};
pub use config::{ClientConfig, ServiceOrigin};
pub use controller::{Disposition, SubmitTicket, TimeoutKind, ViewController};
pub use error::{ChannelError, ConfigError, FrameError, Notice, StreamError, SubmitError};
pub use gallery::{ArtifactRef, ArtifactSet, GalleryEntry, GalleryView, Media, NamedArtifact};
pub use submit::{JobSubmitter, require_file};
pub use types::{ImageFile, Job, JobId, JobOptions, JobStatus, Series, SeriesPoint};
pub use wire::{BandUploadResponse, StartStreaming, UploadResponse};
