//! In-memory media used by the unit tests: sources that encode their frame
//! index into pixel (0, 0), a recording backend and a labelling annotator.

use crate::annotator::{Annotated, Annotator};
use crate::backend::MediaBackend;
use crate::error::{MediaError, Result};
use crate::frame::Frame;
use crate::session::{MediaKind, Session};
use crate::sink::{FrameSink, VideoSpec};
use crate::source::FrameSource;
use image::{Rgb, RgbImage};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub(crate) const WIDTH: u32 = 4;
pub(crate) const HEIGHT: u32 = 2;
const MARKER: Rgb<u8> = Rgb([255, 255, 255]);

pub(crate) fn indexed_frame(index: usize) -> Frame {
    let mut frame = RgbImage::new(WIDTH, HEIGHT);
    frame.put_pixel(0, 0, Rgb([(index % 256) as u8, (index / 256 % 256) as u8, 0]));
    frame
}

pub(crate) fn frame_index_of(frame: &Frame) -> usize {
    let pixel = frame.get_pixel(0, 0);
    pixel[0] as usize + pixel[1] as usize * 256
}

pub(crate) fn is_annotated(frame: &Frame) -> bool {
    *frame.get_pixel(1, 0) == MARKER
}

/// Ordered record of resource lifecycle events, shared between fakes.
#[derive(Debug, Clone, Default)]
pub(crate) struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub(crate) fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

pub(crate) struct FakeSource {
    frames: usize,
    frame_rate: f64,
    cursor: usize,
    released: bool,
    fail_at: Option<usize>,
    releases: Arc<AtomicUsize>,
    journal: Journal,
}

impl FakeSource {
    pub(crate) fn new(frames: usize, frame_rate: f64) -> Self {
        Self {
            frames,
            frame_rate,
            cursor: 0,
            released: false,
            fail_at: None,
            releases: Arc::new(AtomicUsize::new(0)),
            journal: Journal::default(),
        }
    }

    pub(crate) fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Counter of effective releases (repeated calls are not counted).
    pub(crate) fn release_counter(&self) -> Arc<AtomicUsize> {
        self.releases.clone()
    }

    fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }
}

impl FrameSource for FakeSource {
    fn frame_count(&self) -> usize {
        self.frames
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn dimensions(&self) -> (u32, u32) {
        (WIDTH, HEIGHT)
    }

    fn seek(&mut self, index: usize) -> Result<()> {
        if index >= self.frames {
            return Err(MediaError::OutOfRange {
                index,
                len: self.frames,
            });
        }
        self.cursor = index;
        Ok(())
    }

    fn read_next(&mut self) -> Result<Option<Frame>> {
        if self.released || self.cursor >= self.frames {
            return Ok(None);
        }
        if self.fail_at == Some(self.cursor) {
            return Err(MediaError::opencv(format!("corrupt frame {}", self.cursor)));
        }
        let frame = indexed_frame(self.cursor);
        self.cursor += 1;
        Ok(Some(frame))
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.journal.push("source released");
    }

    fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for FakeSource {
    fn drop(&mut self) {
        self.release();
    }
}

pub(crate) fn video_session(path: &str, frames: usize) -> Session {
    Session::from_source(
        Path::new(path),
        MediaKind::Video,
        Box::new(FakeSource::new(frames, 30.0)),
    )
}

pub(crate) fn image_session(path: &str) -> Session {
    Session::from_source(
        Path::new(path),
        MediaKind::Image,
        Box::new(FakeSource::new(1, 0.0)),
    )
}

/// Marks every frame it annotates and labels frame `i` with `i % 3 + 1`
/// persons plus a car on even frames.
#[derive(Default)]
pub(crate) struct LabelAnnotator {
    calls: AtomicUsize,
    fail_on: Option<usize>,
}

impl LabelAnnotator {
    pub(crate) fn failing_on(index: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on: Some(index),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub(crate) fn labels_for(index: usize) -> Vec<String> {
    let mut labels = vec!["person".to_string(); index % 3 + 1];
    if index % 2 == 0 {
        labels.push("car".to_string());
    }
    labels
}

impl Annotator for LabelAnnotator {
    fn annotate(&self, frame: &Frame) -> Result<Annotated> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let index = frame_index_of(frame);
        if self.fail_on == Some(index) {
            return Err(MediaError::annotate(format!("cannot annotate frame {}", index)));
        }
        let mut annotated = frame.clone();
        annotated.put_pixel(1, 0, MARKER);
        Ok(Annotated {
            frame: annotated,
            labels: labels_for(index),
        })
    }
}

struct FakeSink {
    path: PathBuf,
    written: Arc<Mutex<HashMap<PathBuf, Vec<Frame>>>>,
    fail_after: Option<usize>,
    count: usize,
    finished: bool,
    journal: Journal,
}

impl FrameSink for FakeSink {
    fn write(&mut self, frame: &Frame) -> Result<()> {
        if self.fail_after == Some(self.count) {
            return Err(MediaError::encode("disk full"));
        }
        self.count += 1;
        self.written
            .lock()
            .unwrap()
            .entry(self.path.clone())
            .or_default()
            .push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if !self.finished {
            self.finished = true;
            self.journal.push("sink finished");
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeBackend {
    media: HashMap<PathBuf, (MediaKind, usize, f64)>,
    opened: Mutex<HashMap<PathBuf, usize>>,
    written: Arc<Mutex<HashMap<PathBuf, Vec<Frame>>>>,
    images: Mutex<HashMap<PathBuf, Frame>>,
    specs: Mutex<Vec<(VideoSpec, String)>>,
    fail_sink_after: Option<usize>,
    reject_sinks: bool,
    fail_image_writes: bool,
    journal: Journal,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_video(mut self, path: impl Into<PathBuf>, frames: usize, fps: f64) -> Self {
        self.media.insert(path.into(), (MediaKind::Video, frames, fps));
        self
    }

    pub(crate) fn with_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.media.insert(path.into(), (MediaKind::Image, 1, 0.0));
        self
    }

    pub(crate) fn failing_sink_after(mut self, frames: usize) -> Self {
        self.fail_sink_after = Some(frames);
        self
    }

    /// Encoder creation fails before anything touches the destination.
    pub(crate) fn rejecting_sinks(mut self) -> Self {
        self.reject_sinks = true;
        self
    }

    pub(crate) fn failing_image_writes(mut self) -> Self {
        self.fail_image_writes = true;
        self
    }

    pub(crate) fn open_count(&self, path: &Path) -> usize {
        self.opened.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    pub(crate) fn written_frames(&self, path: &Path) -> Vec<Frame> {
        self.written.lock().unwrap().get(path).cloned().unwrap_or_default()
    }

    pub(crate) fn written_image(&self, path: &Path) -> Option<Frame> {
        self.images.lock().unwrap().get(path).cloned()
    }

    /// Stream parameters and codec of every sink created, in order.
    pub(crate) fn specs(&self) -> Vec<(VideoSpec, String)> {
        self.specs.lock().unwrap().clone()
    }

    pub(crate) fn journal(&self) -> Vec<String> {
        self.journal.entries()
    }
}

impl MediaBackend for FakeBackend {
    fn open_source(&self, path: &Path, kind: MediaKind) -> Result<Box<dyn FrameSource>> {
        let Some(&(media_kind, frames, fps)) = self.media.get(path) else {
            return Err(MediaError::NotFound(path.to_path_buf()));
        };
        if media_kind != kind {
            return Err(MediaError::unsupported(path.display().to_string()));
        }
        *self.opened.lock().unwrap().entry(path.to_path_buf()).or_default() += 1;
        self.journal.push("source opened");
        Ok(Box::new(
            FakeSource::new(frames, fps).with_journal(self.journal.clone()),
        ))
    }

    fn create_video_sink(
        &self,
        path: &Path,
        spec: VideoSpec,
        fourcc: &str,
    ) -> Result<Box<dyn FrameSink>> {
        if self.reject_sinks {
            return Err(MediaError::encode(format!("no encoder for {}", fourcc)));
        }
        std::fs::write(path, b"")?;
        self.specs.lock().unwrap().push((spec, fourcc.to_string()));
        self.journal.push("sink created");
        Ok(Box::new(FakeSink {
            path: path.to_path_buf(),
            written: self.written.clone(),
            fail_after: self.fail_sink_after,
            count: 0,
            finished: false,
            journal: self.journal.clone(),
        }))
    }

    fn write_image(&self, path: &Path, frame: &Frame) -> Result<()> {
        if self.fail_image_writes {
            return Err(MediaError::unsupported(path.display().to_string()));
        }
        self.images
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), frame.clone());
        Ok(())
    }
}
