#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Invalid or missing configuration, including unknown action types.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CoreError {
    /// Shorthand for building a [`CoreError::Configuration`].
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
