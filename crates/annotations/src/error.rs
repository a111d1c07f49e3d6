use thiserror::Error;

/// Result type for annotation-mapping operations
pub type Result<T> = std::result::Result<T, AnnotationError>;

/// Errors that can occur while building or resolving annotations
#[derive(Error, Debug)]
pub enum AnnotationError {
    /// A flat-mapping key carries a non-numeric or incomplete range suffix,
    /// or a range suffix on a non-final path segment. Indicates a contract
    /// violation by the annotation producer, so it surfaces loudly instead
    /// of degrading.
    #[error("malformed range suffix in annotation key {key:?}")]
    MalformedKey { key: String },

    /// The document text is not valid JSON. Callers are expected to recover
    /// by rendering the document without annotations.
    #[error("invalid JSON document: {0}")]
    InvalidDocument(#[from] serde_json::Error),

    /// The source-map scanner could not interpret the document at the given
    /// byte offset.
    #[error("unexpected JSON syntax at byte {offset}")]
    InvalidSyntax { offset: usize },
}

impl AnnotationError {
    /// Create a malformed-key error for the fully-prefixed mapping key
    pub fn malformed_key(key: impl Into<String>) -> Self {
        Self::MalformedKey { key: key.into() }
    }
}
