use thiserror::Error;

/// Typed error hierarchy for kazebot.
///
/// Use at module boundaries (config validation, webhook intake, outbound delivery).
/// Leaf functions and collaborator clients return `anyhow::Result`; the `Internal`
/// variant lets those errors flow through `?` unchanged.
#[derive(Debug, Error)]
pub enum KazeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed webhook batch: {0}")]
    MalformedBatch(String),

    /// The platform refused a reply token (already used, expired or unknown).
    #[error("Reply token rejected: {0}")]
    ReplyTokenRejected(String),

    #[error("Delivery failed ({status}): {message}")]
    Delivery { status: u16, message: String },

    #[error("Provider error: {message}")]
    Provider { message: String, retryable: bool },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type KazeResult<T> = Result<T, KazeError>;

impl KazeError {
    /// Whether this error is transient and the operation could succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider { retryable, .. } => *retryable,
            Self::Delivery { status, .. } => *status == 429 || *status >= 500,
            Self::Internal(_) => true,
            Self::Config(_) | Self::MalformedBatch(_) | Self::ReplyTokenRejected(_) => false,
        }
    }

    /// Whether the reply channel is gone for good and push is the only option left.
    pub fn is_token_rejection(&self) -> bool {
        matches!(self, Self::ReplyTokenRejected(_))
    }
}
