//! Frame sources: random-access readers over a still image or a decoded video.

use crate::error::{MediaError, Result};
use crate::frame::{self, Frame};
use opencv::{
    core,
    prelude::*,
    videoio::{self, VideoCapture},
};
use std::path::Path;
use tracing::debug;

/// Indexed access to the frames of one medium.
///
/// `seek(i)` followed by `read_next()` yields frame `i`. `read_next` returns
/// `Ok(None)` at end of stream. `release` may be called any number of times.
pub trait FrameSource: Send {
    /// Number of frames, 1 for still images.
    fn frame_count(&self) -> usize;

    /// Nominal frames per second. Meaningless for still images.
    fn frame_rate(&self) -> f64;

    /// Width and height of every frame.
    fn dimensions(&self) -> (u32, u32);

    fn seek(&mut self, index: usize) -> Result<()>;

    fn read_next(&mut self) -> Result<Option<Frame>>;

    /// Frees the decode handle. Idempotent.
    fn release(&mut self);

    fn is_released(&self) -> bool;
}

fn ensure_exists(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(MediaError::NotFound(path.to_path_buf()))
    }
}

/// A single decoded still image exposed as a one-frame source.
pub struct ImageSource {
    frame: Option<Frame>,
    consumed: bool,
    dimensions: (u32, u32),
}

impl ImageSource {
    pub fn open(path: &Path) -> Result<Self> {
        ensure_exists(path)?;
        let decoded = image::open(path).map_err(|e| match e {
            image::ImageError::IoError(io) => match io.kind() {
                std::io::ErrorKind::NotFound => MediaError::NotFound(path.to_path_buf()),
                // Truncated or garbage content surfaces as an IO error from some decoders.
                std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::InvalidData => {
                    MediaError::unsupported(format!("{}: {}", path.display(), io))
                }
                _ => MediaError::Io(io),
            },
            image::ImageError::Unsupported(_) | image::ImageError::Decoding(_) => {
                MediaError::unsupported(format!("{}: {}", path.display(), e))
            }
            other => MediaError::Image(other),
        })?;
        Ok(Self::from_frame(decoded.to_rgb8()))
    }

    pub fn from_frame(frame: Frame) -> Self {
        let dimensions = frame.dimensions();
        Self {
            frame: Some(frame),
            consumed: false,
            dimensions,
        }
    }
}

impl FrameSource for ImageSource {
    fn frame_count(&self) -> usize {
        1
    }

    fn frame_rate(&self) -> f64 {
        0.0
    }

    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    fn seek(&mut self, index: usize) -> Result<()> {
        if index != 0 {
            return Err(MediaError::OutOfRange { index, len: 1 });
        }
        self.consumed = false;
        Ok(())
    }

    fn read_next(&mut self) -> Result<Option<Frame>> {
        if self.consumed {
            return Ok(None);
        }
        self.consumed = true;
        Ok(self.frame.clone())
    }

    fn release(&mut self) {
        self.frame = None;
    }

    fn is_released(&self) -> bool {
        self.frame.is_none()
    }
}

/// An OpenCV-backed video decoder with frame-index seeking.
pub struct VideoSource {
    cap: VideoCapture,
    frame_count: usize,
    frame_rate: f64,
    width: u32,
    height: u32,
    released: bool,
}

impl VideoSource {
    /// Opens the specified video file and reads its stream properties.
    pub fn open(path: &Path) -> Result<Self> {
        ensure_exists(path)?;
        let path_str = path
            .to_str()
            .ok_or_else(|| MediaError::unsupported(format!("Non UTF-8 path: {}", path.display())))?;
        let cap = VideoCapture::from_file(path_str, videoio::CAP_ANY).map_err(|e| {
            MediaError::unsupported(format!("Failed to open video file {}: {}", path_str, e))
        })?;

        // Check if the video capture was actually opened successfully.
        if !cap.is_opened().unwrap_or(false) {
            return Err(MediaError::unsupported(format!(
                "Failed to open video file: {}",
                path_str
            )));
        }

        let frame_count = cap.get(videoio::CAP_PROP_FRAME_COUNT).unwrap_or(0.0).max(0.0) as usize;
        if frame_count == 0 {
            return Err(MediaError::unsupported(format!(
                "Video has no decodable frames: {}",
                path_str
            )));
        }
        let frame_rate = cap.get(videoio::CAP_PROP_FPS).unwrap_or(30.0);
        let width = cap.get(videoio::CAP_PROP_FRAME_WIDTH).unwrap_or(0.0) as u32;
        let height = cap.get(videoio::CAP_PROP_FRAME_HEIGHT).unwrap_or(0.0) as u32;
        debug!(path = %path.display(), frame_count, frame_rate, width, height, "video opened");

        Ok(Self {
            cap,
            frame_count,
            frame_rate,
            width,
            height,
            released: false,
        })
    }
}

impl FrameSource for VideoSource {
    fn frame_count(&self) -> usize {
        self.frame_count
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn seek(&mut self, index: usize) -> Result<()> {
        if index >= self.frame_count {
            return Err(MediaError::OutOfRange {
                index,
                len: self.frame_count,
            });
        }
        if !self.cap.set(videoio::CAP_PROP_POS_FRAMES, index as f64)? {
            return Err(MediaError::opencv(format!("Seek to frame {} rejected", index)));
        }
        Ok(())
    }

    fn read_next(&mut self) -> Result<Option<Frame>> {
        if self.released {
            return Ok(None);
        }
        let mut mat = core::Mat::default();
        match self.cap.read(&mut mat) {
            Ok(true) if !mat.empty() => frame::frame_from_bgr_mat(&mat).map(Some),
            // End of video or read error
            _ => Ok(None),
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.cap.release() {
            debug!("VideoCapture release failed: {}", e);
        }
    }

    fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for VideoSource {
    fn drop(&mut self) {
        self.release();
    }
}
