//! Wire contract with the processing service.
//!
//! The service grew several response shapes across endpoints. This
//! module fixes one canonical schema, the one served by
//! `POST /procesar_imagen`:
//!
//! ```json
//! {
//!   "file_path": "uploads/cells.png",
//!   "histogram_path": "processed/histogram_cells.png",
//!   "binary_image": { "name": "...", "image_url": "processed/binary_cells.png" },
//!   "morphological_operations": [ { "name": "...", "image_url": "..." } ],
//!   "regiones": 7,
//!   "compound_image_path": "processed/compound.png"
//! }
//! ```
//!
//! `regiones` is accepted either as a count or as a sequence (its
//! length is the count), and `num_objects` is accepted as an alias.
//! Only `file_path` and the count are required: `histogram_path`,
//! `binary_image` and `compound_image_path` may be absent or `null`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{StreamError, SubmitError};
use crate::types::SeriesPoint;

/// Multipart field carrying the image file.
pub const UPLOAD_IMAGE_FIELD: &str = "imagen";

/// Multipart field carrying the overlap flag as `"true"`/`"false"`.
pub const UPLOAD_OVERLAP_FIELD: &str = "con_traslape";

/// Multipart field carrying the multispectral image for band splitting.
pub const BAND_IMAGE_FIELD: &str = "image";

/// Socket.IO event names.
pub mod event {
    /// Server -> client: one processed frame.
    pub const NEW_DATA: &str = "nueva_data";
    /// Client -> server: start streaming frames for an uploaded file.
    pub const START_STREAMING: &str = "procesar_y_graficar";
    /// Server -> client: optional end-of-pipeline marker.
    pub const STOP: &str = "stop_procesamiento";
    /// Server -> client: the service could not process the request.
    pub const ERROR: &str = "error";
    /// Reserved: dispatched locally when the transport drops.
    pub const DISCONNECT: &str = "disconnect";
}

/// A named media reference inside the upload response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaEntry {
    #[serde(default)]
    pub name: String,
    /// Relative path on the service. Missing values render as broken media.
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Synchronous acknowledgement of an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Server-side path of the stored upload; correlates the stream start.
    pub file_path: String,
    /// Missing or `null` renders as broken media.
    #[serde(default)]
    pub histogram_path: Option<String>,
    #[serde(default)]
    pub binary_image: Option<MediaEntry>,
    /// Morphological operations in pipeline order.
    #[serde(default)]
    pub morphological_operations: Vec<MediaEntry>,
    /// Number of detected regions/objects.
    #[serde(
        rename = "regiones",
        alias = "num_objects",
        deserialize_with = "count_or_len"
    )]
    pub object_count: u64,
    #[serde(default)]
    pub compound_image_path: Option<String>,
}

/// Response of `POST /espectro`: one rendered image per spectral band.
///
/// ```json
/// {
///   "message": "...",
///   "num_bands": 3,
///   "band_images": [ { "name": "Banda 1", "image_url": "/processed/band_1_x.tif.png" } ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandUploadResponse {
    #[serde(default)]
    pub message: Option<String>,
    /// Band count as reported; may disagree with `band_images`.
    #[serde(default)]
    pub num_bands: Option<u64>,
    /// Band images in band order.
    pub band_images: Vec<MediaEntry>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CountRepr {
    Count(u64),
    List(Vec<Value>),
}

fn count_or_len<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    Ok(match CountRepr::deserialize(deserializer)? {
        CountRepr::Count(n) => n,
        CountRepr::List(items) => u64::try_from(items.len()).unwrap_or(u64::MAX),
    })
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Map an HTTP status and body to the upload outcome.
///
/// # Errors
///
/// - [`SubmitError::MalformedResponse`] for a 2xx body that does not
///   match [`UploadResponse`].
/// - [`SubmitError::ServerRejected`] for any other status, carrying the
///   body's `error` field, or the raw body when that field is absent.
pub fn classify_response(status: u16, body: &str) -> Result<UploadResponse, SubmitError> {
    classify(status, body)
}

/// Map an HTTP status and body to the band-split outcome.
///
/// # Errors
///
/// As [`classify_response`], against [`BandUploadResponse`].
pub fn classify_band_response(status: u16, body: &str) -> Result<BandUploadResponse, SubmitError> {
    classify(status, body)
}

fn classify<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, SubmitError> {
    if (200..300).contains(&status) {
        return serde_json::from_str(body)
            .map_err(|e| SubmitError::MalformedResponse(e.to_string()));
    }
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|b| b.error)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.trim().to_owned());
    Err(SubmitError::ServerRejected { status, message })
}

/// Payload of the `procesar_y_graficar` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartStreaming {
    pub file_path: String,
    #[serde(rename = "con_traslape")]
    pub overlap: bool,
}

/// Extract a series point from a `nueva_data` payload.
///
/// The value is `valor` when it is numeric, otherwise the count of
/// `regiones` (sequence length, or the number itself).
///
/// # Errors
///
/// Returns [`StreamError::MalformedEvent`] when `frame` is missing or not
/// an integer, or when no value can be derived.
#[allow(clippy::cast_precision_loss)] // region counts are far below 2^52
pub fn parse_new_data(payload: &Value) -> Result<SeriesPoint, StreamError> {
    let frame_index = payload
        .get("frame")
        .and_then(Value::as_i64)
        .ok_or_else(|| StreamError::MalformedEvent("missing integer `frame`".into()))?;

    let value = payload
        .get("valor")
        .and_then(Value::as_f64)
        .or_else(|| match payload.get("regiones") {
            Some(Value::Array(items)) => Some(items.len() as f64),
            Some(other) => other.as_f64(),
            None => None,
        })
        .ok_or_else(|| {
            StreamError::MalformedEvent(format!("frame {frame_index} has no `regiones` or `valor`"))
        })?;

    Ok(SeriesPoint::new(frame_index, value))
}

/// Extract the message of a server `error` event.
#[must_use]
pub fn error_message(payload: &Value) -> String {
    payload
        .get("message")
        .and_then(Value::as_str)
        .map_or_else(|| payload.to_string(), str::to_owned)
}
