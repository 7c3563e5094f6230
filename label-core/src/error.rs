//! Error types for the label pipeline.
//!
//! Element-local failures (a logo that does not decode, a template that does
//! not parse) are recovered where they happen and only surface as `tracing`
//! warnings. The enums here are for failures a caller has to act on.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    #[error("invalid color format: {input:?} (expected #RGB or #RRGGBB)")]
    InvalidColorFormat { input: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("layout {0:?} not found")]
pub struct LayoutNotFound(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetError {
    #[error("unknown image handle {0}")]
    UnknownImage(u64),
    #[error("image is still decoding")]
    Pending,
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("failed to parse template: {0}")]
    Template(String),
    #[error("failed to allocate a {width}x{height} raster")]
    Raster { width: u32, height: u32 },
    #[error("failed to encode png: {0}")]
    Png(String),
    #[error("failed to load font: {0}")]
    Font(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportError {
    #[error("no faces requested for export")]
    NoFaces,
    #[error("an export is already in progress")]
    Busy,
    #[error("failed to write document: {0}")]
    Document(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("missing required contact field `{0}`")]
    MissingField(&'static str),
    #[error("invalid email address {0:?}")]
    InvalidEmail(String),
    #[error("transport failed: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport error: {message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        TransportError {
            message: message.into(),
        }
    }
}

impl From<TransportError> for SubmissionError {
    fn from(e: TransportError) -> Self {
        SubmissionError::Transport(e.message)
    }
}
