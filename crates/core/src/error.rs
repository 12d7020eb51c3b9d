/// Result alias that carries the custom [`RaceError`] type.
pub type Result<T> = std::result::Result<T, RaceError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum RaceError {
    /// Free-form failure surfaced to the application layer.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Clip manifest, config or packet payload could not be (de)serialised.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// A clip the race cannot run without is absent from every language.
    #[error("mandatory audio asset `{0}` is missing")]
    MissingMandatoryAsset(String),
    /// Caller supplied a value outside the accepted domain.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// A mutex shared with the audio thread was poisoned.
    #[error("{0} has been poisoned")]
    Poisoned(&'static str),
}

impl RaceError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for RaceError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for RaceError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
