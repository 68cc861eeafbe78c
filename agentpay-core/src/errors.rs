/// Error types for agentpay core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A request or value is missing required fields or has the wrong shape.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// A transport header could not be decoded into the expected payload.
    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    /// JSON serialization errors.
    #[error("Serde JSON error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
}

/// A specialized `Result` type for agentpay core operations.
pub type Result<T> = std::result::Result<T, Error>;
