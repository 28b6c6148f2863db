//! Client configuration and service origin handling.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Base origin of the processing service, e.g. `http://localhost:5000`.
///
/// Stored without a trailing slash. All artifact references returned
/// by the service are relative and must be resolved against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceOrigin(String);

impl ServiceOrigin {
    /// Parse an `http://` or `https://` origin.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for any other scheme or an empty
    /// host.
    pub fn parse(origin: &str) -> Result<Self, ConfigError> {
        let trimmed = origin.trim().trim_end_matches('/');
        let host = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"))
            .ok_or_else(|| {
                ConfigError::Invalid(format!("service origin must be http(s): {origin:?}"))
            })?;
        if host.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "service origin has no host: {origin:?}"
            )));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// The origin as a string, without trailing slash.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve a media reference returned by the service.
    ///
    /// Absolute `http(s)` references pass through unchanged. Relative
    /// ones are joined with exactly one `/`. Empty references resolve
    /// to `None`.
    #[must_use]
    pub fn resolve(&self, reference: &str) -> Option<String> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }
        if reference.starts_with("http://") || reference.starts_with("https://") {
            return Some(reference.to_owned());
        }
        let path = reference.trim_start_matches("./").trim_start_matches('/');
        Some(format!("{}/{path}", self.0))
    }

    /// The matching WebSocket origin (`http` -> `ws`, `https` -> `wss`).
    #[must_use]
    pub fn websocket_origin(&self) -> String {
        self.0.strip_prefix("https://").map_or_else(
            || format!("ws://{}", self.0.trim_start_matches("http://")),
            |host| format!("wss://{host}"),
        )
    }
}

impl TryFrom<String> for ServiceOrigin {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ServiceOrigin> for String {
    fn from(origin: ServiceOrigin) -> Self {
        origin.0
    }
}

/// Configuration for the client.
///
/// All fields have defaults matching a locally running service, so a
/// partial JSON document only needs the fields it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Where the processing service lives.
    pub service_origin: ServiceOrigin,

    /// Path of the upload endpoint.
    pub upload_path: String,

    /// Path of the multispectral band-split endpoint.
    pub band_path: String,

    /// Path of the Socket.IO endpoint.
    pub socket_path: String,

    /// Number of stream frames after which a job is considered complete.
    pub expected_frame_count: usize,

    /// Bound on waiting for the upload acknowledgement.
    pub submit_timeout_ms: u32,

    /// Bound on waiting for the first stream frame after the upload
    /// was acknowledged.
    pub first_event_timeout_ms: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            service_origin: ServiceOrigin(String::from("http://localhost:5000")),
            upload_path: String::from("/procesar_imagen"),
            band_path: String::from("/espectro"),
            socket_path: String::from("/socket.io/"),
            expected_frame_count: 10,
            submit_timeout_ms: 30_000,
            first_event_timeout_ms: 15_000,
        }
    }
}

impl ClientConfig {
    /// Parse and validate a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON or a bad origin,
    /// and [`ConfigError::Invalid`] for values that fail [`validate`](Self::validate).
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.expected_frame_count == 0 {
            return Err(ConfigError::Invalid(
                "expected_frame_count must be at least 1".into(),
            ));
        }
        if self.submit_timeout_ms == 0 || self.first_event_timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeouts must be non-zero".into()));
        }
        for (field, path) in [
            ("upload_path", &self.upload_path),
            ("band_path", &self.band_path),
            ("socket_path", &self.socket_path),
        ] {
            if !path.starts_with('/') {
                return Err(ConfigError::Invalid(format!(
                    "{field} must start with '/': {path:?}"
                )));
            }
        }
        Ok(())
    }

    /// Full URL of the upload endpoint.
    #[must_use]
    pub fn upload_url(&self) -> String {
        format!("{}{}", self.service_origin.as_str(), self.upload_path)
    }

    /// Full URL of the band-split endpoint.
    #[must_use]
    pub fn band_url(&self) -> String {
        format!("{}{}", self.service_origin.as_str(), self.band_path)
    }

    /// Full URL of the Socket.IO WebSocket transport.
    #[must_use]
    pub fn socket_url(&self) -> String {
        let path = if self.socket_path.ends_with('/') {
            self.socket_path.clone()
        } else {
            format!("{}/", self.socket_path)
        };
        format!(
            "{}{path}?EIO=4&transport=websocket",
            self.service_origin.websocket_origin()
        )
    }
}
