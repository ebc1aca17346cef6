//! Factory for decode and encode resources, so playback and export never
//! construct codecs themselves.

use crate::error::Result;
use crate::frame::Frame;
use crate::session::MediaKind;
use crate::sink::{self, FrameSink, VideoSink, VideoSpec};
use crate::source::{FrameSource, ImageSource, VideoSource};
use std::path::Path;

pub trait MediaBackend: Send + Sync {
    /// Opens a fresh decode handle. Every call yields an independent cursor.
    fn open_source(&self, path: &Path, kind: MediaKind) -> Result<Box<dyn FrameSource>>;

    /// Creates an encoder for `path` using the four character codec `fourcc`.
    fn create_video_sink(
        &self,
        path: &Path,
        spec: VideoSpec,
        fourcc: &str,
    ) -> Result<Box<dyn FrameSink>>;

    fn write_image(&self, path: &Path, frame: &Frame) -> Result<()>;
}

/// OpenCV for video, the `image` crate for stills.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenCvBackend;

impl MediaBackend for OpenCvBackend {
    fn open_source(&self, path: &Path, kind: MediaKind) -> Result<Box<dyn FrameSource>> {
        Ok(match kind {
            MediaKind::Image => Box::new(ImageSource::open(path)?),
            MediaKind::Video => Box::new(VideoSource::open(path)?),
        })
    }

    fn create_video_sink(
        &self,
        path: &Path,
        spec: VideoSpec,
        fourcc: &str,
    ) -> Result<Box<dyn FrameSink>> {
        Ok(Box::new(VideoSink::create(path, fourcc, spec)?))
    }

    fn write_image(&self, path: &Path, frame: &Frame) -> Result<()> {
        sink::write_image(path, frame)
    }
}
