//! morphoscope-io: Browser I/O and Dioxus component library.
//!
//! Implements the session traits on top of the Web API (a Socket.IO
//! client over `WebSocket`, multipart uploads over `fetch`), bounded
//! waits on browser timers, and the UI components of the morphoscope
//! web application.

pub mod components;
pub mod error;
pub mod http;
pub mod socket;
pub mod timeout;

pub use components::{ArtifactGallery, BandUploader, SeriesChart, UploadForm};
pub use error::BrowserError;
pub use http::{HttpBandSubmitter, HttpSubmitter};
pub use socket::SocketChannel;
pub use timeout::with_timeout;
