//! The annotation seam: an opaque detector plus the box painter that turns
//! its detections into an annotated frame and a label list.

use crate::error::{MediaError, Result};
use crate::frame::Frame;
use image::Rgb;
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};
use std::sync::Mutex;
use tracing::warn;

/// An annotated copy of a frame together with the labels found in it.
#[derive(Debug, Clone)]
pub struct Annotated {
    pub frame: Frame,
    pub labels: Vec<String>,
}

/// Produces an annotated frame and detected labels for one input frame.
///
/// Implementations are shared between playback and export, so they must not
/// carry state from one call to the next.
pub trait Annotator: Send + Sync {
    fn annotate(&self, frame: &Frame) -> Result<Annotated>;
}

/// Bounding box in coordinates normalized to the frame size (0-1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Pixel rectangle on a `frame_width` x `frame_height` frame, clipped to it.
    fn to_rect(self, frame_width: u32, frame_height: u32) -> Option<Rect> {
        let fw = frame_width as f32;
        let fh = frame_height as f32;
        let left = (self.x * fw).clamp(0.0, fw);
        let top = (self.y * fh).clamp(0.0, fh);
        let right = ((self.x + self.width) * fw).clamp(0.0, fw);
        let bottom = ((self.y + self.height) * fh).clamp(0.0, fh);
        let width = (right - left) as u32;
        let height = (bottom - top) as u32;
        if width == 0 || height == 0 {
            return None;
        }
        Some(Rect::at(left as i32, top as i32).of_size(width, height))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new<S: Into<String>>(label: S, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
        }
    }
}

/// Common interface for object detection models.
pub trait Detector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>>;

    /// Detector name (for logging)
    fn name(&self) -> &str;
}

/// Detector that finds nothing; used when no model is configured.
#[derive(Debug, Default)]
pub struct NullDetector;

impl Detector for NullDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "none"
    }
}

const PALETTE: [Rgb<u8>; 6] = [
    Rgb([255, 56, 56]),
    Rgb([255, 157, 151]),
    Rgb([255, 112, 31]),
    Rgb([72, 249, 10]),
    Rgb([0, 194, 255]),
    Rgb([132, 56, 255]),
];

fn label_color(label: &str) -> Rgb<u8> {
    let hash = label.bytes().fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
    PALETTE[hash % PALETTE.len()]
}

/// Runs a detector and paints a hollow box per detection.
pub struct BoxAnnotator {
    detector: Mutex<Box<dyn Detector>>,
    thickness: i32,
}

impl BoxAnnotator {
    pub fn new(detector: Box<dyn Detector>) -> Self {
        Self {
            detector: Mutex::new(detector),
            thickness: 2,
        }
    }

    pub fn with_thickness(mut self, thickness: i32) -> Self {
        self.thickness = thickness.max(1);
        self
    }

    fn draw(&self, frame: &mut Frame, detection: &Detection) {
        let Some(rect) = detection.bbox.to_rect(frame.width(), frame.height()) else {
            return;
        };
        let color = label_color(&detection.label);
        // Thick border by drawing nested rectangles inwards
        for offset in 0..self.thickness {
            let width = rect.width() as i32 - offset * 2;
            let height = rect.height() as i32 - offset * 2;
            if width <= 0 || height <= 0 {
                break;
            }
            let inner = Rect::at(rect.left() + offset, rect.top() + offset)
                .of_size(width as u32, height as u32);
            draw_hollow_rect_mut(frame, inner, color);
        }
    }
}

impl Annotator for BoxAnnotator {
    fn annotate(&self, frame: &Frame) -> Result<Annotated> {
        let detections = {
            let mut detector = self
                .detector
                .lock()
                .map_err(|_| MediaError::annotate("Detector lock poisoned"))?;
            detector.detect(frame).inspect_err(|e| {
                warn!(detector = detector.name(), "detection failed: {}", e);
            })?
        };

        let mut annotated = frame.clone();
        for detection in &detections {
            self.draw(&mut annotated, detection);
        }
        Ok(Annotated {
            frame: annotated,
            labels: detections.into_iter().map(|d| d.label).collect(),
        })
    }
}
