use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatchError {
    /// A single order is illegal; only that order is rejected
    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The engine broke one of its own invariants; the match is unusable
    #[error("Internal invariant violation: {0}")]
    InternalInvariantViolation(String),

    #[error("Match already concluded")]
    MatchConcluded,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl MatchError {
    /// Whether the error ends the match (as opposed to rejecting one order)
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::InvalidOrder(_))
    }

    pub(crate) fn invalid_order(message: impl Into<String>) -> Self {
        Self::InvalidOrder(message.into())
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::ConfigurationError(message.into())
    }
}

pub type Result<T> = std::result::Result<T, MatchError>;
