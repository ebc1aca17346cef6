//! Error types shared by sources, sinks, the playback controller and export.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MediaError>;

/// Errors raised while decoding, annotating or encoding media.
///
/// End of stream is not represented here: readers return `Ok(None)`.
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Frame index {index} out of range (0..{len})")]
    OutOfRange { index: usize, len: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Annotation failed: {0}")]
    Annotate(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("OpenCV error: {0}")]
    OpenCv(String),

    #[error("No media session is open")]
    NoSession,

    #[error("Export cancelled")]
    Cancelled,
}

impl MediaError {
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    pub fn encode<S: Into<String>>(msg: S) -> Self {
        Self::Encode(msg.into())
    }

    pub fn annotate<S: Into<String>>(msg: S) -> Self {
        Self::Annotate(msg.into())
    }

    pub fn opencv<S: Into<String>>(msg: S) -> Self {
        Self::OpenCv(msg.into())
    }
}

impl From<opencv::Error> for MediaError {
    fn from(err: opencv::Error) -> Self {
        Self::OpenCv(err.to_string())
    }
}
