use thiserror::Error;

/// Top-level error type for the HintForge allocator.
///
/// Pool exhaustion is not an error: a claim that cannot be fully served
/// returns fewer labels.
#[derive(Debug, Error)]
pub enum HintError {
    #[error("coordinator channel closed: {0}")]
    ChannelClosed(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("corrupt pool state: {0}")]
    CorruptState(String),

    #[error("invalid label alphabet: {0}")]
    InvalidAlphabet(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HintError {
    /// True when the counterpart of a request is gone for good.
    pub fn is_teardown(&self) -> bool {
        matches!(self, HintError::ChannelClosed(_))
    }
}
