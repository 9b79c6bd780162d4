//! Service configuration.

use crate::event::Location;

/// Default limit for attached documents (5 MiB).
pub const DEFAULT_MAX_DOCUMENT_BYTES: u64 = 5 * 1024 * 1024;

/// Tunables for a [`TrackingService`](crate::service::TrackingService).
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    /// Largest accepted attachment, in bytes.
    pub max_document_bytes: u64,

    /// Accepted attachment extensions, lowercase, without the dot.
    pub document_extensions: Vec<String>,

    /// Terminal location used for local events submitted without a location.
    pub home_port: Option<Location>,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            document_extensions: ["pdf", "jpg", "jpeg", "png"]
                .into_iter()
                .map(String::from)
                .collect(),
            home_port: None,
        }
    }
}

impl TrackingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the attachment size limit.
    pub fn with_max_document_bytes(mut self, bytes: u64) -> Self {
        self.max_document_bytes = bytes;
        self
    }

    /// Replace the accepted attachment extensions.
    pub fn with_document_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.document_extensions = extensions
            .into_iter()
            .map(|ext| ext.into().to_ascii_lowercase())
            .collect();
        self
    }

    /// Set the terminal that local events default to.
    pub fn with_home_port(mut self, location: Location) -> Self {
        self.home_port = Some(location);
        self
    }
}
