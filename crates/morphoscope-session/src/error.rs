//! Error taxonomy. Every variant is scoped to the current job; none is
//! fatal to the view.

use crate::types::JobId;

/// Errors from submitting a job.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    /// Submit was requested with no file picked. Checked before any
    /// network call.
    #[error("select an image before submitting")]
    NoFileSelected,

    /// The request never produced an HTTP response.
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// The service answered with a non-success status.
    #[error("{message} (HTTP {status})")]
    ServerRejected { status: u16, message: String },

    /// The service accepted the upload but the body did not match the
    /// upload schema.
    #[error("unexpected upload response: {0}")]
    MalformedResponse(String),

    /// No acknowledgement within the configured bound.
    #[error("the service did not answer in time")]
    Timeout,
}

/// Errors on the live event stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// The connection dropped before the job became ready.
    #[error("stream disconnected; showing the frames received so far")]
    StreamDisconnected,

    /// A `nueva_data` payload was missing a field it needs.
    #[error("malformed stream event: {0}")]
    MalformedEvent(String),

    /// An event or response tagged with a superseded job.
    #[error("stale event for {event} while {active:?} is active")]
    StaleJobEvent { event: JobId, active: Option<JobId> },

    /// The service reported an error on the stream.
    #[error("service error: {0}")]
    ServerReported(String),

    /// No frame arrived within the configured bound.
    #[error("no stream frames arrived in time")]
    Timeout,
}

/// Errors from an [`EventChannel`](crate::EventChannel) implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// The handle does not refer to an open connection.
    #[error("event channel is not connected")]
    NotConnected,

    /// The underlying transport refused an operation.
    #[error("transport error: {0}")]
    Transport(String),

    /// An outgoing payload could not be encoded.
    #[error("failed to encode event: {0}")]
    Encode(String),
}

/// Errors decoding a Socket.IO text frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,

    #[error("unknown packet type {0:?}")]
    UnknownPacket(char),

    #[error("invalid packet payload: {0}")]
    InvalidPayload(String),
}

/// Errors loading a [`ClientConfig`](crate::ClientConfig).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid client configuration: {0}")]
    Invalid(String),

    #[error("failed to parse client configuration: {0}")]
    Parse(String),
}

/// A user-visible problem with the current job.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Notice {
    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Stream(#[from] StreamError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_rejected_shows_message_verbatim() {
        let err = SubmitError::ServerRejected {
            status: 400,
            message: "No se encontró la imagen en la solicitud".into(),
        };
        assert_eq!(
            err.to_string(),
            "No se encontró la imagen en la solicitud (HTTP 400)"
        );
    }

    #[test]
    fn notice_is_transparent() {
        let notice = Notice::from(StreamError::StreamDisconnected);
        assert_eq!(
            notice.to_string(),
            StreamError::StreamDisconnected.to_string()
        );
    }

    #[test]
    fn stale_event_names_both_jobs() {
        let err = StreamError::StaleJobEvent {
            event: JobId::new(1),
            active: Some(JobId::new(2)),
        };
        let msg = err.to_string();
        assert!(msg.contains("job #1"), "got {msg}");
    }
}
