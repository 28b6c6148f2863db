//! Per-view orchestration of one job at a time.
//!
//! [`ViewController`] owns the job identity, the stream aggregator, the
//! artifact set, and the single event-channel connection of a mounted
//! view. It never performs I/O itself beyond calling the injected
//! [`EventChannel`]; the upload runs outside (see [`SubmitTicket`]) and
//! its result is handed back tagged with the job id.
//!
//! # Connection lifecycle
//!
//! - [`mount`](ViewController::mount) connects.
//! - The first job is bound to that connection: its handlers are
//!   registered once, each capturing the job id, and the stream is
//!   started.
//! - A later submission releases the bound connection and opens a fresh
//!   one, so at most one connection is open at any time and events from
//!   a superseded job can only arrive tagged with its old id.
//! - Dropping the controller disconnects.

use futures::channel::mpsc;
use serde_json::Value;

use crate::aggregator::StreamAggregator;
use crate::channel::{
    ConnectionHandle, Delivery, DeliveryReceiver, EventChannel, Handler, StreamEvent,
};
use crate::config::{ClientConfig, ServiceOrigin};
use crate::error::{ChannelError, Notice, StreamError, SubmitError};
use crate::gallery::{self, ArtifactSet, GalleryView};
use crate::submit;
use crate::types::{ImageFile, Job, JobId, JobOptions, JobStatus, Series};
use crate::wire::{self, StartStreaming, UploadResponse, event};

/// Everything the caller needs to perform the upload for a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitTicket {
    pub job: JobId,
    pub image: ImageFile,
    pub options: JobOptions,
}

/// Which bounded wait expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// The upload acknowledgement.
    Submit,
    /// The first stream frame after the acknowledgement.
    FirstEvent,
}

/// What happened to an input handed to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The input changed the job's state.
    Applied,
    /// The input belonged to a superseded job and was discarded.
    Stale,
    /// The input belonged to the active job but was malformed or
    /// arrived in a state where it has no effect.
    Ignored,
}

#[derive(Debug, Clone, Copy)]
struct Connection {
    handle: ConnectionHandle,
    bound: Option<JobId>,
}

/// State machine for one mounted view.
pub struct ViewController<C: EventChannel> {
    channel: C,
    connection: Option<Connection>,
    sender: mpsc::UnboundedSender<Delivery>,
    origin: ServiceOrigin,
    next_job: u64,
    job: Option<Job>,
    aggregator: StreamAggregator,
    artifacts: Option<ArtifactSet>,
    notice: Option<Notice>,
    stream_ended: bool,
    stale_discarded: usize,
}

impl<C: EventChannel> ViewController<C> {
    /// Take ownership of `channel` and connect it.
    ///
    /// Returns the controller and the receiving end of its delivery
    /// queue. The caller drains the queue in order and feeds every item
    /// to [`deliver`](Self::deliver).
    ///
    /// # Errors
    ///
    /// Returns the channel's error if the initial connection fails.
    pub fn mount(
        mut channel: C,
        config: &ClientConfig,
    ) -> Result<(Self, DeliveryReceiver), ChannelError> {
        let handle = channel.connect()?;
        let (sender, receiver) = mpsc::unbounded();
        tracing::debug!(?handle, "view mounted");
        let controller = Self {
            channel,
            connection: Some(Connection {
                handle,
                bound: None,
            }),
            sender,
            origin: config.service_origin.clone(),
            next_job: 0,
            job: None,
            aggregator: StreamAggregator::new(config.expected_frame_count),
            artifacts: None,
            notice: None,
            stream_ended: false,
            stale_discarded: 0,
        };
        Ok((controller, receiver))
    }

    /// Release the channel. Equivalent to dropping the controller.
    pub fn unmount(self) {
        drop(self);
    }

    /// Start a new job, superseding any previous one.
    ///
    /// On success the previous job's events become stale, the series and
    /// artifacts are cleared, and the new job is `Submitting`. The caller
    /// performs the upload and reports back with
    /// [`complete_submit`](Self::complete_submit).
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::NoFileSelected`] without touching the
    /// current job when no file is selected.
    pub fn begin_submit(
        &mut self,
        file: Option<ImageFile>,
        options: JobOptions,
    ) -> Result<SubmitTicket, SubmitError> {
        let image = match submit::require_file(file) {
            Ok(image) => image,
            Err(e) => {
                self.notice = Some(e.clone().into());
                return Err(e);
            }
        };

        self.next_job += 1;
        let id = JobId::new(self.next_job);
        if let Some(previous) = &self.job {
            tracing::info!(previous = %previous.id, next = %id, "superseding job");
        }

        self.release_bound_connection();
        self.aggregator.reset();
        self.artifacts = None;
        self.notice = None;
        self.stream_ended = false;
        self.job = Some(Job {
            id,
            file_name: image.name.clone(),
            options,
            status: JobStatus::Submitting,
        });
        tracing::info!(job = %id, file = %image.name, overlap = options.overlap, "submitting");

        Ok(SubmitTicket {
            job: id,
            image,
            options,
        })
    }

    /// Apply the upload outcome for `job`.
    ///
    /// A result for any job other than the active one is discarded. On
    /// success the artifact set is populated, the channel is bound to the
    /// job, and `procesar_y_graficar` is emitted.
    pub fn complete_submit(
        &mut self,
        job: JobId,
        result: Result<UploadResponse, SubmitError>,
    ) -> Disposition {
        if !self.is_active(job) {
            self.discard_stale(job);
            return Disposition::Stale;
        }
        if self.status() != JobStatus::Submitting {
            tracing::debug!(%job, status = %self.status(), "late upload result ignored");
            return Disposition::Ignored;
        }

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(%job, error = %e, "upload failed");
                self.set_status(JobStatus::Failed);
                self.notice = Some(e.into());
                return Disposition::Applied;
            }
        };

        self.artifacts = Some(ArtifactSet::from_response(&response, &self.origin));
        self.set_status(JobStatus::Submitted);
        let options = self.job.as_ref().map(|j| j.options).unwrap_or_default();
        let start = StartStreaming {
            file_path: response.file_path,
            overlap: options.overlap,
        };
        if let Err(e) = self.bind_stream(job, &start) {
            tracing::warn!(%job, error = %e, "could not start stream");
            self.stream_ended = true;
            self.notice = Some(StreamError::StreamDisconnected.into());
        }
        Disposition::Applied
    }

    /// Apply one stream delivery, in the order the queue yields them.
    pub fn deliver(&mut self, delivery: Delivery) -> Disposition {
        if !self.is_active(delivery.job) {
            self.discard_stale(delivery.job);
            return Disposition::Stale;
        }
        let status = self.status();
        if !matches!(
            status,
            JobStatus::Submitted | JobStatus::Streaming | JobStatus::Ready
        ) {
            tracing::debug!(job = %delivery.job, %status, "stream event ignored");
            return Disposition::Ignored;
        }

        match delivery.event {
            StreamEvent::NewData(payload) => {
                if self.aggregator.on_payload(&payload).is_err() {
                    return Disposition::Ignored;
                }
                if status == JobStatus::Submitted {
                    self.set_status(JobStatus::Streaming);
                }
                if self.aggregator.is_ready() && status != JobStatus::Ready {
                    tracing::info!(
                        job = %delivery.job,
                        frames = self.aggregator.series().len(),
                        "job ready"
                    );
                    self.set_status(JobStatus::Ready);
                }
            }
            StreamEvent::Stop => {
                tracing::debug!(job = %delivery.job, "service signalled end of stream");
                self.stream_ended = true;
            }
            StreamEvent::ServerError(message) => {
                tracing::warn!(job = %delivery.job, %message, "service reported an error");
                self.stream_ended = true;
                if status != JobStatus::Ready {
                    self.notice = Some(StreamError::ServerReported(message).into());
                }
            }
            StreamEvent::Disconnected => {
                tracing::warn!(
                    job = %delivery.job,
                    frames = self.aggregator.series().len(),
                    "stream disconnected"
                );
                self.stream_ended = true;
                if let Some(conn) = self.connection.take() {
                    self.channel.disconnect(conn.handle);
                }
                if status != JobStatus::Ready {
                    self.notice = Some(StreamError::StreamDisconnected.into());
                }
            }
        }
        Disposition::Applied
    }

    /// Apply an expired bounded wait for `job`.
    ///
    /// Only takes effect while the job is still waiting for what timed
    /// out; a timer that fires after the awaited input arrived is ignored.
    pub fn on_timeout(&mut self, job: JobId, kind: TimeoutKind) -> Disposition {
        if !self.is_active(job) {
            return Disposition::Stale;
        }
        let notice: Notice = match (kind, self.status()) {
            (TimeoutKind::Submit, JobStatus::Submitting) => SubmitError::Timeout.into(),
            (TimeoutKind::FirstEvent, JobStatus::Submitted) => StreamError::Timeout.into(),
            _ => return Disposition::Ignored,
        };
        tracing::warn!(%job, ?kind, "timed out");
        self.set_status(JobStatus::Failed);
        self.stream_ended = true;
        self.notice = Some(notice);
        Disposition::Applied
    }

    /// The current job, if any.
    #[must_use]
    pub const fn job(&self) -> Option<&Job> {
        self.job.as_ref()
    }

    /// Status of the current job, `Idle` when there is none.
    #[must_use]
    pub fn status(&self) -> JobStatus {
        self.job.as_ref().map_or(JobStatus::Idle, |j| j.status)
    }

    /// Points received for the current job.
    #[must_use]
    pub const fn series(&self) -> &Series {
        self.aggregator.series()
    }

    /// Whether the current job has received the expected frame count.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.aggregator.is_ready()
    }

    /// Readiness threshold from the configuration.
    #[must_use]
    pub const fn expected_frame_count(&self) -> usize {
        self.aggregator.expected_frame_count()
    }

    /// Artifacts of the current job, once acknowledged.
    #[must_use]
    pub const fn artifacts(&self) -> Option<&ArtifactSet> {
        self.artifacts.as_ref()
    }

    /// The gallery for the current job.
    #[must_use]
    pub fn gallery(&self) -> GalleryView {
        gallery::render(self.artifacts.as_ref(), self.is_ready())
    }

    /// The latest user-visible problem, if any.
    #[must_use]
    pub const fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// Whether no further stream events are expected for this job.
    #[must_use]
    pub const fn stream_ended(&self) -> bool {
        self.stream_ended
    }

    /// Malformed events dropped for the current job.
    #[must_use]
    pub const fn dropped_events(&self) -> usize {
        self.aggregator.dropped()
    }

    /// Stale results and deliveries discarded since mount.
    #[must_use]
    pub const fn stale_discarded(&self) -> usize {
        self.stale_discarded
    }

    fn is_active(&self, job: JobId) -> bool {
        self.job.as_ref().is_some_and(|j| j.id == job)
    }

    fn set_status(&mut self, status: JobStatus) {
        if let Some(job) = &mut self.job {
            job.status = status;
        }
    }

    fn discard_stale(&mut self, job: JobId) {
        self.stale_discarded += 1;
        let err = StreamError::StaleJobEvent {
            event: job,
            active: self.job.as_ref().map(|j| j.id),
        };
        tracing::debug!(error = %err, "discarding");
    }

    /// Replace a connection that already carried a job with a fresh one.
    fn release_bound_connection(&mut self) {
        if let Some(conn) = self.connection
            && conn.bound.is_some()
        {
            self.channel.disconnect(conn.handle);
            self.connection = None;
            match self.channel.connect() {
                Ok(handle) => self.connection = Some(Connection { handle, bound: None }),
                Err(e) => tracing::warn!(error = %e, "reconnect failed; retrying on next stream"),
            }
        }
    }

    /// An open connection with no job bound to it yet.
    fn fresh_connection(&mut self) -> Result<ConnectionHandle, ChannelError> {
        self.release_bound_connection();
        if let Some(conn) = self.connection {
            return Ok(conn.handle);
        }
        let handle = self.channel.connect()?;
        self.connection = Some(Connection { handle, bound: None });
        Ok(handle)
    }

    fn bind_stream(&mut self, job: JobId, start: &StartStreaming) -> Result<(), ChannelError> {
        let mut handle = self.fresh_connection()?;
        match self.subscribe_job(handle, job) {
            Ok(()) => {}
            Err(ChannelError::NotConnected) => {
                // The idle connection dropped before it was used.
                tracing::debug!(%job, "idle connection lost; reconnecting");
                if let Some(dead) = self.connection.take() {
                    self.channel.disconnect(dead.handle);
                }
                handle = self.fresh_connection()?;
                self.subscribe_job(handle, job)?;
            }
            Err(e) => return Err(e),
        }
        self.connection = Some(Connection {
            handle,
            bound: Some(job),
        });

        let payload =
            serde_json::to_value(start).map_err(|e| ChannelError::Encode(e.to_string()))?;
        self.channel.emit(handle, event::START_STREAMING, payload)?;
        tracing::info!(%job, file = %start.file_path, "stream started");
        Ok(())
    }

    /// Register this job's handlers on `handle`. Called once per
    /// connection, since a connection is bound to at most one job.
    fn subscribe_job(&mut self, handle: ConnectionHandle, job: JobId) -> Result<(), ChannelError> {
        let routes: [(&str, fn(Value) -> StreamEvent); 4] = [
            (event::NEW_DATA, StreamEvent::NewData),
            (event::STOP, |_| StreamEvent::Stop),
            (event::ERROR, |payload| {
                StreamEvent::ServerError(wire::error_message(&payload))
            }),
            (event::DISCONNECT, |_| StreamEvent::Disconnected),
        ];
        for (name, map) in routes {
            self.channel
                .subscribe(handle, name, forwarder(&self.sender, job, map))?;
        }
        Ok(())
    }
}

/// A handler that tags each event with `job` and queues it.
fn forwarder(
    sender: &mpsc::UnboundedSender<Delivery>,
    job: JobId,
    map: fn(Value) -> StreamEvent,
) -> Handler {
    let sender = sender.clone();
    Box::new(move |payload| {
        // Fails only once the receiver is gone with the view.
        let _ = sender.unbounded_send(Delivery {
            job,
            event: map(payload),
        });
    })
}

impl<C: EventChannel> Drop for ViewController<C> {
    fn drop(&mut self) {
        if let Some(conn) = self.connection.take() {
            tracing::debug!(handle = ?conn.handle, "view unmounted");
            self.channel.disconnect(conn.handle);
        }
    }
}
