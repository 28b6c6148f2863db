//! Shared types for the morphoscope job lifecycle.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of one submit-and-process cycle.
///
/// Issued by the [`ViewController`](crate::ViewController) in increasing
/// order. Every upload result and every stream delivery carries the id of
/// the job it belongs to; anything tagged with an id other than the
/// active one is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(u64);

impl JobId {
    /// Wrap a raw job number.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw job number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job #{}", self.0)
    }
}

/// Processing options sent with the upload and the stream start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobOptions {
    /// Process quadrants with overlapping margins ("con traslape").
    pub overlap: bool,
}

/// An image picked by the user, held in memory until upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    /// Original file name, sent as the multipart file name.
    pub name: String,
    /// Raw file bytes.
    pub bytes: Vec<u8>,
}

impl ImageFile {
    /// Create a new in-memory image file.
    #[must_use]
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// MIME type guessed from the file extension.
    #[must_use]
    pub fn mime_type(&self) -> &'static str {
        let ext = self
            .name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase());
        match ext.as_deref() {
            Some("png") => "image/png",
            Some("jpg" | "jpeg") => "image/jpeg",
            Some("bmp") => "image/bmp",
            Some("tif" | "tiff") => "image/tiff",
            _ => "application/octet-stream",
        }
    }
}

/// Lifecycle of a job, as seen by the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobStatus {
    /// Nothing submitted yet.
    #[default]
    Idle,
    /// Upload in flight.
    Submitting,
    /// Upload acknowledged; waiting for the first stream frame.
    Submitted,
    /// At least one frame received, fewer than expected.
    Streaming,
    /// Expected frame count reached; artifacts may be revealed.
    Ready,
    /// Upload failed or timed out. The user may resubmit.
    Failed,
}

impl JobStatus {
    /// Short display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Submitting => "Uploading",
            Self::Submitted => "Waiting for stream",
            Self::Streaming => "Streaming",
            Self::Ready => "Ready",
            Self::Failed => "Failed",
        }
    }

    /// Whether the job still expects work from the service.
    #[must_use]
    pub const fn is_in_flight(self) -> bool {
        matches!(self, Self::Submitting | Self::Submitted | Self::Streaming)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The job currently owned by the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pub file_name: String,
    pub options: JobOptions,
    pub status: JobStatus,
}

/// One data point derived from a `nueva_data` stream event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Frame number reported by the service. Not guaranteed monotonic.
    pub frame_index: i64,
    /// Charted value (region count or explicit `valor`).
    pub value: f64,
}

impl SeriesPoint {
    /// Create a new point.
    #[must_use]
    pub const fn new(frame_index: i64, value: f64) -> Self {
        Self { frame_index, value }
    }

    /// Chart label for this point.
    #[must_use]
    pub fn label(&self) -> String {
        format!("Frame {}", self.frame_index)
    }
}

/// Append-only sequence of points in arrival order.
///
/// Only the aggregator can append or clear; readers get a slice.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Series(Vec<SeriesPoint>);

impl Series {
    /// Create an empty series.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Number of points.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no point has been accepted.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All points in arrival order.
    #[must_use]
    pub fn points(&self) -> &[SeriesPoint] {
        &self.0
    }

    /// The most recently accepted point.
    #[must_use]
    pub fn last(&self) -> Option<&SeriesPoint> {
        self.0.last()
    }

    /// `(label, value)` pairs for the chart sink, in display order.
    #[must_use]
    pub fn chart_pairs(&self) -> Vec<(String, f64)> {
        self.0.iter().map(|p| (p.label(), p.value)).collect()
    }

    pub(crate) fn push(&mut self, point: SeriesPoint) {
        self.0.push(point);
    }

    pub(crate) fn clear(&mut self) {
        self.0.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn job_id_display() {
        assert_eq!(JobId::new(3).to_string(), "job #3");
    }

    #[test]
    fn job_ids_order_by_issue() {
        assert!(JobId::new(1) < JobId::new(2));
    }

    #[test]
    fn mime_type_from_extension() {
        assert_eq!(ImageFile::new("a.PNG", vec![]).mime_type(), "image/png");
        assert_eq!(ImageFile::new("a.jpeg", vec![]).mime_type(), "image/jpeg");
        assert_eq!(ImageFile::new("scan.tif", vec![]).mime_type(), "image/tiff");
        assert_eq!(
            ImageFile::new("noext", vec![]).mime_type(),
            "application/octet-stream"
        );
    }

    #[test]
    fn series_keeps_arrival_order() {
        let mut series = Series::new();
        series.push(SeriesPoint::new(5, 1.0));
        series.push(SeriesPoint::new(2, 3.0));
        let frames: Vec<i64> = series.points().iter().map(|p| p.frame_index).collect();
        assert_eq!(frames, vec![5, 2]);
        assert_eq!(series.last().unwrap().frame_index, 2);
    }

    #[test]
    fn chart_pairs_are_labelled_by_frame() {
        let mut series = Series::new();
        series.push(SeriesPoint::new(0, 4.0));
        assert_eq!(series.chart_pairs(), vec![("Frame 0".to_owned(), 4.0)]);
    }

    #[test]
    fn in_flight_statuses() {
        assert!(JobStatus::Submitting.is_in_flight());
        assert!(JobStatus::Streaming.is_in_flight());
        assert!(!JobStatus::Ready.is_in_flight());
        assert!(!JobStatus::Failed.is_in_flight());
        assert!(!JobStatus::Idle.is_in_flight());
    }
}
