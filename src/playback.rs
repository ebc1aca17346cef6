//! The media session controller: play/pause/stop, the self-rescheduling
//! tick, and the press/drag/release seek protocol.

use crate::annotator::Annotator;
use crate::error::{MediaError, Result};
use crate::export::{ExportJob, ExportKind};
use crate::frame::Frame;
use crate::session::{MediaKind, Session};
use crate::summary::DetectionSummary;
use std::path::Path;
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Display cadence, independent of the source frame rate.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(33);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackConfig {
    pub tick_interval: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
    /// Pointer is down on the position control.
    Seeking { resume_on_release: bool },
}

/// Everything the display needs for one rendered frame.
#[derive(Debug, Clone)]
pub struct Presentation {
    pub frame: Frame,
    pub summary: DetectionSummary,
    pub fraction: f64,
    pub frame_index: usize,
    pub total_frames: usize,
}

/// Receives every successfully rendered frame. Scaling is the sink's job.
pub trait DisplaySink {
    fn present(&mut self, presentation: Presentation);
}

impl DisplaySink for mpsc::Sender<Presentation> {
    fn present(&mut self, presentation: Presentation) {
        if self.send(presentation).is_err() {
            debug!("display receiver dropped, frame discarded");
        }
    }
}

pub struct PlaybackController {
    annotator: Arc<dyn Annotator>,
    display: Box<dyn DisplaySink>,
    config: PlaybackConfig,
    session: Option<Session>,
    state: PlaybackState,
    current_frame_index: usize,
    summary: DetectionSummary,
    last_annotated: Option<Frame>,
    // At most one tick may be pending; the deadline is its only handle.
    pending_tick: Option<Instant>,
    // Latest drag target, rendered on the next poll.
    pending_preview: Option<usize>,
}

impl PlaybackController {
    pub fn new(
        annotator: Arc<dyn Annotator>,
        display: Box<dyn DisplaySink>,
        config: PlaybackConfig,
    ) -> Self {
        Self {
            annotator,
            display,
            config,
            session: None,
            state: PlaybackState::Stopped,
            current_frame_index: 0,
            summary: DetectionSummary::new(),
            last_annotated: None,
            pending_tick: None,
            pending_preview: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current_frame_index(&self) -> usize {
        self.current_frame_index
    }

    pub fn total_frames(&self) -> usize {
        self.session.as_ref().map_or(0, Session::total_frames)
    }

    /// Position as a fraction of the medium, 0 when there is nothing to play.
    pub fn fraction(&self) -> f64 {
        fraction_of(self.current_frame_index, self.total_frames())
    }

    pub fn summary(&self) -> &DetectionSummary {
        &self.summary
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn last_annotated(&self) -> Option<&Frame> {
        self.last_annotated.as_ref()
    }

    pub fn is_seeking(&self) -> bool {
        matches!(self.state, PlaybackState::Seeking { .. })
    }

    pub fn has_pending_tick(&self) -> bool {
        self.pending_tick.is_some()
    }

    /// Replaces the active session. The previous decode handle is released
    /// before the new one is installed; frame 0 is rendered once.
    pub fn open(&mut self, session: Session) -> Result<()> {
        self.close();
        info!(path = %session.path().display(), kind = ?session.kind(), "session loaded");
        self.session = Some(session);
        self.render_at(0)
    }

    /// Releases the active session, if any, and resets to `Stopped`.
    pub fn close(&mut self) {
        if let Some(mut previous) = self.session.take() {
            debug!(path = %previous.path().display(), "releasing previous session");
            previous.release();
        }
        self.state = PlaybackState::Stopped;
        self.current_frame_index = 0;
        self.pending_tick = None;
        self.pending_preview = None;
        self.summary.clear();
        self.last_annotated = None;
    }

    pub fn play(&mut self) -> Result<()> {
        let Some(session) = &self.session else {
            warn!("play requested with no open session");
            return Err(MediaError::NoSession);
        };
        if session.total_frames() <= 1 {
            debug!("play ignored for single-frame session");
            return Ok(());
        }
        match self.state {
            PlaybackState::Stopped | PlaybackState::Paused => {
                debug!(from = ?self.state, index = self.current_frame_index, "play");
                self.state = PlaybackState::Playing;
                self.schedule_tick();
            }
            PlaybackState::Seeking { .. } => {
                self.state = PlaybackState::Seeking {
                    resume_on_release: true,
                };
            }
            PlaybackState::Playing => {}
        }
        Ok(())
    }

    pub fn pause(&mut self) {
        match self.state {
            PlaybackState::Playing => {
                debug!(index = self.current_frame_index, "pause");
                self.state = PlaybackState::Paused;
                self.pending_tick = None;
            }
            PlaybackState::Seeking { .. } => {
                self.state = PlaybackState::Seeking {
                    resume_on_release: false,
                };
            }
            PlaybackState::Stopped | PlaybackState::Paused => {}
        }
    }

    pub fn toggle_play(&mut self) -> Result<()> {
        if self.state == PlaybackState::Playing {
            self.pause();
            Ok(())
        } else {
            self.play()
        }
    }

    /// Valid from any state: rewinds to frame 0 and renders it.
    pub fn stop(&mut self) -> Result<()> {
        debug!(from = ?self.state, "stop");
        self.state = PlaybackState::Stopped;
        self.pending_tick = None;
        self.pending_preview = None;
        self.current_frame_index = 0;
        if self.session.is_none() {
            return Ok(());
        }
        self.render_at(0)
    }

    /// Runs the pending tick, if there is one and playback is still active.
    ///
    /// Returns whether a frame was advanced. Failures never escape a tick:
    /// a read or annotation error ends playback like end of stream does.
    pub fn tick(&mut self) -> bool {
        if self.pending_tick.take().is_none() || self.state != PlaybackState::Playing {
            return false;
        }
        let Some(session) = self.session.as_mut() else {
            self.state = PlaybackState::Stopped;
            return false;
        };

        let frame = match session.source_mut().read_next() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!(index = self.current_frame_index, "end of stream");
                self.stop_after_tick();
                return false;
            }
            Err(e) => {
                warn!(index = self.current_frame_index, "frame read failed, stopping: {}", e);
                self.stop_after_tick();
                return false;
            }
        };

        let total = session.total_frames();
        let next = (self.current_frame_index + 1).min(total.saturating_sub(1));
        if let Err(e) = self.present(&frame, next) {
            warn!(index = next, "annotation failed, stopping: {}", e);
            self.stop_after_tick();
            return false;
        }
        self.current_frame_index = next;

        if self.state == PlaybackState::Playing {
            self.schedule_tick();
        }
        true
    }

    /// Drives the controller from the UI loop: renders a coalesced drag
    /// preview and fires the pending tick once its deadline has passed.
    /// Returns the time left until the next tick, if one is pending.
    pub fn poll(&mut self, now: Instant) -> Option<Duration> {
        self.flush_preview();
        if self.pending_tick.is_some_and(|due| due <= now) {
            self.tick();
        }
        self.pending_tick
            .map(|due| due.saturating_duration_since(now))
    }

    /// Pointer down on the position control.
    pub fn begin_seek(&mut self) {
        if self.session.is_none() || self.is_seeking() {
            return;
        }
        let resume_on_release = self.state == PlaybackState::Playing;
        self.pending_tick = None;
        self.state = PlaybackState::Seeking { resume_on_release };
        debug!(resume_on_release, "seek started");
    }

    /// Drag over the position control. Only the latest position is kept;
    /// it is rendered on the next `poll` without moving the play cursor.
    pub fn seek_preview(&mut self, fraction: f64) {
        if !self.is_seeking() {
            return;
        }
        self.pending_preview = Some(self.index_for(fraction));
    }

    /// Pointer up: commits the position and resumes if playback was active
    /// when the seek began.
    pub fn end_seek(&mut self, fraction: f64) -> Result<()> {
        if self.session.is_none() {
            return Err(MediaError::NoSession);
        }
        if !self.is_seeking() {
            self.begin_seek();
        }
        let resume_on_release = matches!(
            self.state,
            PlaybackState::Seeking {
                resume_on_release: true
            }
        );
        self.pending_preview = None;

        let index = self.index_for(fraction);
        if let Err(e) = self.render_at(index) {
            warn!(index, kept = self.current_frame_index, "seek failed: {}", e);
            self.restore_cursor();
            if self.is_seeking() {
                self.state = if self.total_frames() <= 1 {
                    PlaybackState::Stopped
                } else {
                    PlaybackState::Paused
                };
            }
            return Err(e);
        }
        self.current_frame_index = index;

        if self.total_frames() <= 1 {
            self.state = PlaybackState::Stopped;
            return Ok(());
        }
        self.state = PlaybackState::Paused;
        debug!(index, resume_on_release, "seek committed");
        if resume_on_release {
            self.play()?;
        }
        Ok(())
    }

    /// Frame index for a position fraction, clamped into the medium.
    pub fn index_for(&self, fraction: f64) -> usize {
        index_for(fraction, self.total_frames())
    }

    /// Export job for the active session, writing to `destination`.
    pub fn export_job(&self, destination: &Path) -> Option<ExportJob> {
        let session = self.session.as_ref()?;
        match session.kind() {
            MediaKind::Image => self
                .last_annotated
                .clone()
                .map(|frame| ExportJob::image(frame, destination)),
            MediaKind::Video => Some(ExportJob::video(session.path(), destination)),
        }
    }

    /// What an export of the active session would produce.
    pub fn export_kind(&self) -> Option<ExportKind> {
        let session = self.session.as_ref()?;
        match session.kind() {
            MediaKind::Image if self.last_annotated.is_none() => None,
            MediaKind::Image => Some(ExportKind::Image),
            MediaKind::Video => Some(ExportKind::Video),
        }
    }

    fn schedule_tick(&mut self) {
        self.pending_tick = Some(Instant::now() + self.config.tick_interval);
    }

    fn stop_after_tick(&mut self) {
        if let Err(e) = self.stop() {
            warn!("could not render first frame after stopping: {}", e);
        }
    }

    fn flush_preview(&mut self) {
        let Some(index) = self.pending_preview.take() else {
            return;
        };
        if let Err(e) = self.render_at(index) {
            warn!(index, "seek preview failed: {}", e);
            self.restore_cursor();
        }
    }

    /// Puts the source back behind the displayed frame so the next read
    /// yields `current_frame_index + 1`. Stops playback if that fails.
    fn restore_cursor(&mut self) {
        let index = self.current_frame_index;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.kind() == MediaKind::Image {
            return;
        }
        let source = session.source_mut();
        let restored = source
            .seek(index)
            .and_then(|()| source.read_next())
            .map(drop);
        if let Err(e) = restored {
            warn!(index, "could not restore read position: {}", e);
            self.stop_after_tick();
        }
    }

    /// Seeks the source and renders the frame at `index`. Still images
    /// re-publish their cached annotation rather than re-running the model.
    fn render_at(&mut self, index: usize) -> Result<()> {
        let kind = self.session.as_ref().ok_or(MediaError::NoSession)?.kind();
        if kind == MediaKind::Image {
            if let Some(frame) = self.last_annotated.clone() {
                self.publish(frame, index);
                return Ok(());
            }
        }

        let frame = {
            let source = self
                .session
                .as_mut()
                .ok_or(MediaError::NoSession)?
                .source_mut();
            source.seek(index)?;
            let len = source.frame_count();
            source
                .read_next()?
                .ok_or(MediaError::OutOfRange { index, len })?
        };
        self.present(&frame, index)
    }

    fn present(&mut self, frame: &Frame, index: usize) -> Result<()> {
        let annotated = self.annotator.annotate(frame)?;
        self.summary.update(&annotated.labels);
        self.last_annotated = Some(annotated.frame.clone());
        self.publish(annotated.frame, index);
        Ok(())
    }

    fn publish(&mut self, frame: Frame, index: usize) {
        let total_frames = self.total_frames();
        self.display.present(Presentation {
            frame,
            summary: self.summary.clone(),
            fraction: fraction_of(index, total_frames),
            frame_index: index,
            total_frames,
        });
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.release();
        }
    }
}

fn fraction_of(index: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        index as f64 / total as f64
    }
}

fn index_for(fraction: f64, total: usize) -> usize {
    if total <= 1 || !fraction.is_finite() {
        return 0;
    }
    let index = (fraction.clamp(0.0, 1.0) * total as f64).round() as usize;
    index.min(total - 1)
}
