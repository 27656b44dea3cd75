//! Errors raised while tokenizing, building, running or training the model.

/// Errors that can occur in the opinion model.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Text has more words than the configured maximum sequence length
    #[error("sequence of {length} tokens exceeds maximum length {max}")]
    SequenceTooLong { length: usize, max: usize },

    /// A word was not seen when the vocabulary was built
    #[error("word '{word}' in \"{text}\" is not in the vocabulary")]
    MissingWord { word: String, text: String },

    /// Input tensor or vector has the wrong shape for this model
    #[error("shape mismatch for {what}: expected {expected}, found {found}")]
    ShapeMismatch {
        what: &'static str,
        expected: String,
        found: String,
    },

    /// Model or trainer configuration cannot be used
    #[error("invalid model configuration: {0}")]
    InvalidConfig(String),

    /// Error from the tensor backend
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),
}

/// Convenience alias used throughout the crate.
pub type ModelResult<T> = Result<T, ModelError>;
