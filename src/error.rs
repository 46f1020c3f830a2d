use thiserror::Error;

/// Result type for eISCP operations
pub type Result<T> = std::result::Result<T, EiscpError>;

/// Errors that can occur when talking to a receiver or running an announcement
#[derive(Error, Debug)]
pub enum EiscpError {
    /// Socket-level failure: refused, reset, unresolvable host
    #[error("Cannot reach receiver at {addr}: {source}")]
    Connectivity {
        /// The `host:port` the client tried to reach
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// No frame at all arrived within the read window
    #[error("No response within read window")]
    Timeout,

    /// Malformed frame on the wire
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Unknown zone name or unusable configuration value
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A frame arrived but it belongs to another command family
    #[error("Unexpected response: expected {expected}, got {received}")]
    UnexpectedResponse {
        /// Family token the caller was waiting for
        expected: String,
        /// Payload actually received
        received: String,
    },

    /// The playback collaborator failed
    #[error("Playback error: {0}")]
    Playback(String),

    /// The caller cancelled a running announcement
    #[error("Announcement cancelled")]
    Cancelled,

    /// JSON deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EiscpError {
    /// Whether the receiver simply never answered with the wanted family.
    ///
    /// `UnexpectedResponse` counts as a timeout: the answer we asked for did
    /// not arrive in the window, something else did.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout | Self::UnexpectedResponse { .. })
    }

    pub(crate) fn connectivity(addr: impl Into<String>, source: std::io::Error) -> Self {
        Self::Connectivity {
            addr: addr.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_classification() {
        assert!(EiscpError::Timeout.is_timeout());
        assert!(EiscpError::UnexpectedResponse {
            expected: "MVL".into(),
            received: "!1NLSC-P".into(),
        }
        .is_timeout());
        assert!(!EiscpError::Protocol("bad magic".into()).is_timeout());
        assert!(!EiscpError::connectivity(
            "192.0.2.10:60128",
            std::io::Error::from(std::io::ErrorKind::ConnectionRefused)
        )
        .is_timeout());
    }
}
