//! One-shot annotate-and-write passes over a whole medium.
//!
//! A video export always opens its own decode handle through the backend,
//! so it never moves the cursor of a live playback session, even when both
//! read the same file.

use crate::annotator::Annotator;
use crate::backend::MediaBackend;
use crate::error::{MediaError, Result};
use crate::frame::Frame;
use crate::session::MediaKind;
use crate::sink::{FrameSink, VideoSpec};
use crate::source::FrameSource;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Image,
    Video,
}

impl ExportKind {
    /// Default file extension for the save dialog.
    pub fn default_extension(self) -> &'static str {
        match self {
            Self::Image => "png",
            Self::Video => "mp4",
        }
    }
}

#[derive(Debug, Clone)]
enum ExportSource {
    /// An already annotated still, written as is.
    Image(Frame),
    /// A video re-read from disk and annotated frame by frame.
    Video(PathBuf),
}

#[derive(Debug, Clone)]
pub struct ExportJob {
    source: ExportSource,
    destination: PathBuf,
}

impl ExportJob {
    pub fn image(annotated: Frame, destination: &Path) -> Self {
        Self {
            source: ExportSource::Image(annotated),
            destination: destination.to_path_buf(),
        }
    }

    pub fn video(source_path: &Path, destination: &Path) -> Self {
        Self {
            source: ExportSource::Video(source_path.to_path_buf()),
            destination: destination.to_path_buf(),
        }
    }

    pub fn kind(&self) -> ExportKind {
        match self.source {
            ExportSource::Image(_) => ExportKind::Image,
            ExportSource::Video(_) => ExportKind::Video,
        }
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    /// Four character codec code for video destinations, e.g. `mp4v`.
    pub fourcc: String,
    /// Delete output this export produced when it fails or is cancelled.
    pub remove_partial_on_failure: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            fourcc: "mp4v".to_string(),
            remove_partial_on_failure: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub destination: PathBuf,
    pub frames_written: usize,
}

/// Cooperative cancellation flag, checked between frames.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportEvent {
    Progress { written: usize, total: usize },
    Finished(ExportReport),
    Failed(String),
}

#[derive(Clone)]
pub struct ExportPipeline {
    annotator: Arc<dyn Annotator>,
    backend: Arc<dyn MediaBackend>,
    options: ExportOptions,
}

impl ExportPipeline {
    pub fn new(
        annotator: Arc<dyn Annotator>,
        backend: Arc<dyn MediaBackend>,
        options: ExportOptions,
    ) -> Self {
        Self {
            annotator,
            backend,
            options,
        }
    }

    pub fn run(&self, job: &ExportJob) -> Result<ExportReport> {
        self.run_with(job, &CancelToken::new(), |_, _| {})
    }

    /// Runs `job` to completion, calling `progress(written, total)` after
    /// every frame.
    pub fn run_with<F>(&self, job: &ExportJob, cancel: &CancelToken, progress: F) -> Result<ExportReport>
    where
        F: FnMut(usize, usize),
    {
        info!(destination = %job.destination.display(), kind = ?job.kind(), "export started");
        let existed_before = job.destination.exists();
        let attempt = match &job.source {
            ExportSource::Image(frame) => Attempt {
                result: self.backend.write_image(&job.destination, frame).map(|()| 1),
                sink_opened: false,
            },
            ExportSource::Video(path) => self.export_video(path, &job.destination, cancel, progress),
        };

        match attempt.result {
            Ok(frames_written) => {
                info!(destination = %job.destination.display(), frames_written, "export finished");
                Ok(ExportReport {
                    destination: job.destination.clone(),
                    frames_written,
                })
            }
            Err(e) => {
                warn!(destination = %job.destination.display(), "export failed: {}", e);
                // A file that was there before and never reached an encoder is the user's.
                let produced_here = attempt.sink_opened || !existed_before;
                if self.options.remove_partial_on_failure && produced_here {
                    remove_partial(&job.destination);
                }
                Err(e)
            }
        }
    }

    /// Runs `job` on a worker thread, reporting over a channel.
    pub fn spawn(&self, job: ExportJob) -> ExportHandle {
        let (sender, events) = mpsc::channel();
        let cancel = CancelToken::new();
        let pipeline = self.clone();
        let token = cancel.clone();

        let thread = thread::spawn(move || {
            let progress_sender = sender.clone();
            let result = pipeline.run_with(&job, &token, |written, total| {
                let _ = progress_sender.send(ExportEvent::Progress { written, total });
            });
            let event = match result {
                Ok(report) => ExportEvent::Finished(report),
                Err(e) => ExportEvent::Failed(e.to_string()),
            };
            // The UI may have gone away; nothing left to report to.
            let _ = sender.send(event);
        });

        ExportHandle {
            events,
            cancel,
            thread: Some(thread),
        }
    }

    fn export_video<F>(
        &self,
        path: &Path,
        destination: &Path,
        cancel: &CancelToken,
        progress: F,
    ) -> Attempt
    where
        F: FnMut(usize, usize),
    {
        let mut source = match self.backend.open_source(path, MediaKind::Video) {
            Ok(source) => source,
            Err(e) => return Attempt::before_output(e),
        };
        let (width, height) = source.dimensions();
        let spec = VideoSpec {
            width,
            height,
            frame_rate: source.frame_rate(),
        };
        let mut sink = match self
            .backend
            .create_video_sink(destination, spec, &self.options.fourcc)
        {
            Ok(sink) => sink,
            Err(e) => {
                source.release();
                return Attempt::before_output(e);
            }
        };

        let pumped = self.pump(source.as_mut(), sink.as_mut(), cancel, progress);

        source.release();
        let finished = sink.finish();
        Attempt {
            result: pumped.and_then(|written| finished.map(|()| written)),
            sink_opened: true,
        }
    }

    fn pump<F>(
        &self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        cancel: &CancelToken,
        mut progress: F,
    ) -> Result<usize>
    where
        F: FnMut(usize, usize),
    {
        let total = source.frame_count();
        let mut written = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(MediaError::Cancelled);
            }
            let Some(frame) = source.read_next()? else {
                break;
            };
            let annotated = self.annotator.annotate(&frame)?;
            sink.write(&annotated.frame)?;
            written += 1;
            progress(written, total);
        }
        debug!(written, total, "end of source reached");
        Ok(written)
    }
}

/// Result of one export pass and whether it got as far as opening an encoder
/// on the destination.
struct Attempt {
    result: Result<usize>,
    sink_opened: bool,
}

impl Attempt {
    fn before_output(error: MediaError) -> Self {
        Self {
            result: Err(error),
            sink_opened: false,
        }
    }
}

fn remove_partial(destination: &Path) {
    if !destination.exists() {
        return;
    }
    match std::fs::remove_file(destination) {
        Ok(()) => debug!(path = %destination.display(), "removed partial export"),
        Err(e) => warn!(path = %destination.display(), "could not remove partial export: {}", e),
    }
}

/// A running background export.
pub struct ExportHandle {
    events: mpsc::Receiver<ExportEvent>,
    cancel: CancelToken,
    thread: Option<thread::JoinHandle<()>>,
}

impl ExportHandle {
    /// Next event if one is ready, without blocking.
    pub fn try_next(&self) -> Option<ExportEvent> {
        self.events.try_recv().ok()
    }

    /// Blocks until the export finishes and returns its final event.
    pub fn wait(mut self) -> Option<ExportEvent> {
        let last = self
            .events
            .iter()
            .filter(|event| !matches!(event, ExportEvent::Progress { .. }))
            .last();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("export worker panicked");
            }
        }
        last
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(|t| t.is_finished())
    }
}
