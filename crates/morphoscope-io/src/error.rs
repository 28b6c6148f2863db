//! Browser API failures and their mapping onto the session errors.

use morphoscope_session::{ChannelError, SubmitError};
use wasm_bindgen::{JsCast, JsValue};

/// A Web API call failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrowserError {
    /// A browser API call returned an error.
    #[error("browser API error: {0}")]
    Js(String),

    /// The API is not available in this environment.
    #[error("{0} is not available")]
    Unavailable(&'static str),
}

impl From<JsValue> for BrowserError {
    fn from(value: JsValue) -> Self {
        let message = value
            .dyn_ref::<js_sys::Error>()
            .map_or_else(|| format!("{value:?}"), |e| String::from(e.message()));
        Self::Js(message)
    }
}

impl From<BrowserError> for ChannelError {
    fn from(err: BrowserError) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<BrowserError> for SubmitError {
    fn from(err: BrowserError) -> Self {
        Self::NetworkFailure(err.to_string())
    }
}
