//! Frame representation and conversions between OpenCV matrices and RGB rasters.

use crate::error::{MediaError, Result};
use image::RgbImage;
use opencv::{core, imgproc, prelude::*};

/// A decoded frame, always 8-bit RGB regardless of where it came from.
pub type Frame = RgbImage;

/// Converts a BGR `Mat` as produced by `VideoCapture::read` into an RGB frame.
pub fn frame_from_bgr_mat(mat: &core::Mat) -> Result<Frame> {
    let mut rgb = core::Mat::default();
    imgproc::cvt_color(
        mat,
        &mut rgb,
        imgproc::COLOR_BGR2RGB,
        0,
        core::AlgorithmHint::ALGO_HINT_DEFAULT,
    )
    .map_err(|e| MediaError::opencv(format!("Failed to convert frame to RGB: {}", e)))?;

    let size = rgb.size()?;
    let bytes = rgb.data_bytes()?;
    RgbImage::from_raw(size.width as u32, size.height as u32, bytes.to_vec())
        .ok_or_else(|| MediaError::opencv("Frame buffer does not match its dimensions"))
}

/// Converts an RGB frame into a BGR `Mat` suitable for `VideoWriter::write`.
pub fn bgr_mat_from_frame(frame: &Frame) -> Result<core::Mat> {
    let flat = core::Mat::from_slice(frame.as_raw())?;
    let shaped = flat.reshape(3, frame.height() as i32)?;
    let rgb = shaped.try_clone()?;

    let mut bgr = core::Mat::default();
    imgproc::cvt_color(
        &rgb,
        &mut bgr,
        imgproc::COLOR_RGB2BGR,
        0,
        core::AlgorithmHint::ALGO_HINT_DEFAULT,
    )
    .map_err(|e| MediaError::opencv(format!("Failed to convert frame to BGR: {}", e)))?;
    Ok(bgr)
}

/// Size that fits `width` x `height` inside a `max_edge` square, keeping aspect ratio.
pub fn fit_within(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (0, 0);
    }
    let scale = f64::min(
        max_edge as f64 / width as f64,
        max_edge as f64 / height as f64,
    );
    (
        ((width as f64 * scale) as u32).max(1),
        ((height as f64 * scale) as u32).max(1),
    )
}
