use reqwest::StatusCode;

/// Why a position could not be obtained.
#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location service unavailable")]
    Unavailable,
    #[error("Location request timed out")]
    Timeout,
    #[error("Location error: {0}")]
    Other(String),
}

/// Why the host refused or never received a message.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Host rejected message: {0}")]
    Rejected(String),
    #[error("Host transport closed")]
    Closed,
    #[error("Host transport I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Everything that can end a fetch cycle early.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Error requesting location: {0}")]
    Location(#[from] LocationError),
    #[error("Weather request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Weather API returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("Unexpected weather response: {0}")]
    Schema(String),
    #[error("Error sending weather info to host: {0}")]
    Transport(#[from] TransportError),
}

/// Failure classes a fetch cycle can end with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Location,
    Network,
    Schema,
    Delivery,
}

impl BridgeError {
    pub fn kind(&self) -> FailureKind {
        match self {
            BridgeError::Location(_) => FailureKind::Location,
            BridgeError::Network(_) | BridgeError::Status { .. } => FailureKind::Network,
            BridgeError::Schema(_) => FailureKind::Schema,
            BridgeError::Transport(_) => FailureKind::Delivery,
        }
    }
}
