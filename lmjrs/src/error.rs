//! Error types for the JRS feed client and the update cycle

/// Result type alias for LiveMonitor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while fetching the feed or running an update cycle
///
/// Markup parsing and payload decoding never fail loudly: malformed rows,
/// channels or base64 candidates are skipped where they are found.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// DNS, connection or timeout failure
    #[error("Transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// Upstream answered with something other than 200
    #[error("HTTP status {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The feed was fetched but no usable event could be extracted
    #[error("No events extracted from the feed")]
    NoEvents,

    /// Configuration error (from lmconfig/anyhow)
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a generic error from a string
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// True for DNS, connect and timeout failures
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// The HTTP status carried by an `HttpStatus` failure
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}
