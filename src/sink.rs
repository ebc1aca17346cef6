//! Destination encoders for exported media.

use crate::error::{MediaError, Result};
use crate::frame::{self, Frame};
use opencv::{
    core,
    prelude::*,
    videoio::{self, VideoWriter},
};
use std::path::Path;
use tracing::debug;

/// Stream properties a destination encoder is sized and paced to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoSpec {
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
}

/// A frame-by-frame writer. `finish` flushes and closes; it is idempotent.
pub trait FrameSink: Send {
    fn write(&mut self, frame: &Frame) -> Result<()>;

    fn finish(&mut self) -> Result<()>;
}

/// Parses a four character codec code such as `mp4v`.
pub fn parse_fourcc(code: &str) -> Result<[char; 4]> {
    let chars: Vec<char> = code.chars().collect();
    match chars.as_slice() {
        [a, b, c, d] => Ok([*a, *b, *c, *d]),
        _ => Err(MediaError::unsupported(format!(
            "Codec code must be four characters: {:?}",
            code
        ))),
    }
}

/// OpenCV `VideoWriter` destination.
pub struct VideoSink {
    writer: VideoWriter,
    spec: VideoSpec,
    finished: bool,
}

impl VideoSink {
    pub fn create(path: &Path, fourcc: &str, spec: VideoSpec) -> Result<Self> {
        let path_str = path
            .to_str()
            .ok_or_else(|| MediaError::unsupported(format!("Non UTF-8 path: {}", path.display())))?;
        let [a, b, c, d] = parse_fourcc(fourcc)?;
        let code = VideoWriter::fourcc(a, b, c, d)?;
        let size = core::Size::new(spec.width as i32, spec.height as i32);
        let writer = VideoWriter::new(path_str, code, spec.frame_rate, size, true)
            .map_err(|e| MediaError::encode(format!("Failed to create {}: {}", path_str, e)))?;

        if !writer.is_opened().unwrap_or(false) {
            return Err(MediaError::encode(format!(
                "Encoder rejected destination {} ({})",
                path_str, fourcc
            )));
        }
        debug!(path = path_str, ?spec, fourcc, "video writer opened");

        Ok(Self {
            writer,
            spec,
            finished: false,
        })
    }
}

impl FrameSink for VideoSink {
    fn write(&mut self, frame: &Frame) -> Result<()> {
        if self.finished {
            return Err(MediaError::encode("Write after finish"));
        }
        if frame.dimensions() != (self.spec.width, self.spec.height) {
            return Err(MediaError::encode(format!(
                "Frame is {}x{}, encoder expects {}x{}",
                frame.width(),
                frame.height(),
                self.spec.width,
                self.spec.height
            )));
        }
        let mat = frame::bgr_mat_from_frame(frame)?;
        self.writer
            .write(&mat)
            .map_err(|e| MediaError::encode(format!("Failed to write frame: {}", e)))
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.writer
            .release()
            .map_err(|e| MediaError::encode(format!("Failed to finalise video: {}", e)))
    }
}

impl Drop for VideoSink {
    fn drop(&mut self) {
        let _ = self.finish();
    }
}

/// Writes a single frame as an image, format chosen by the path's extension.
pub fn write_image(path: &Path, frame: &Frame) -> Result<()> {
    frame.save(path).map_err(|e| match e {
        image::ImageError::IoError(io) => MediaError::Io(io),
        image::ImageError::Unsupported(_) => {
            MediaError::unsupported(format!("{}: {}", path.display(), e))
        }
        other => MediaError::encode(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_parse_fourcc() {
        assert_eq!(parse_fourcc("mp4v").unwrap(), ['m', 'p', '4', 'v']);
        assert!(matches!(
            parse_fourcc("h264x"),
            Err(MediaError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_write_image_roundtrips_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotated.png");
        let frame = RgbImage::from_pixel(3, 2, Rgb([200, 0, 50]));

        write_image(&path, &frame).unwrap();

        let loaded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(loaded, frame);
    }

    #[test]
    fn test_write_image_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotated.unknownext");
        let frame = RgbImage::new(2, 2);
        assert!(matches!(
            write_image(&path, &frame),
            Err(MediaError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_write_image_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no_such_dir").join("out.png");
        assert!(write_image(&path, &RgbImage::new(2, 2)).is_err());
    }
}
