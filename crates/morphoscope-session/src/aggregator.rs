//! Stream aggregation: turns `nueva_data` events into the chart series
//! and derives readiness from its length.

use serde_json::Value;

use crate::error::StreamError;
use crate::types::{Series, SeriesPoint};
use crate::wire;

/// Accumulates stream points for one job.
///
/// `ready` latches: it becomes `true` the first time the series reaches
/// `expected_frame_count` points and only [`reset`](Self::reset) clears it.
#[derive(Debug, Clone)]
pub struct StreamAggregator {
    expected_frame_count: usize,
    series: Series,
    ready: bool,
    dropped: usize,
}

impl StreamAggregator {
    /// Create an aggregator that becomes ready after
    /// `expected_frame_count` points.
    #[must_use]
    pub const fn new(expected_frame_count: usize) -> Self {
        Self {
            expected_frame_count,
            series: Series::new(),
            ready: false,
            dropped: 0,
        }
    }

    /// Forget everything from the previous job.
    pub fn reset(&mut self) {
        self.series.clear();
        self.ready = false;
        self.dropped = 0;
    }

    /// Append a point in arrival order.
    pub fn on_event(&mut self, point: SeriesPoint) {
        self.series.push(point);
        if !self.ready && self.series.len() >= self.expected_frame_count {
            self.ready = true;
        }
    }

    /// Parse a raw `nueva_data` payload and append it.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::MalformedEvent`] if the payload cannot be
    /// parsed. The event is dropped and counted; the series is unchanged.
    pub fn on_payload(&mut self, payload: &Value) -> Result<SeriesPoint, StreamError> {
        match wire::parse_new_data(payload) {
            Ok(point) => {
                self.on_event(point);
                Ok(point)
            }
            Err(e) => {
                self.dropped += 1;
                tracing::debug!(error = %e, dropped = self.dropped, "dropping stream event");
                Err(e)
            }
        }
    }

    /// Whether the expected number of frames has arrived.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.ready
    }

    /// Points accepted so far.
    #[must_use]
    pub const fn series(&self) -> &Series {
        &self.series
    }

    /// Malformed events dropped since the last reset.
    #[must_use]
    pub const fn dropped(&self) -> usize {
        self.dropped
    }

    /// The readiness threshold.
    #[must_use]
    pub const fn expected_frame_count(&self) -> usize {
        self.expected_frame_count
    }
}
