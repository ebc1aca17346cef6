//! The currently loaded medium and its decode handle.

use crate::backend::MediaBackend;
use crate::error::{MediaError, Result};
use crate::source::FrameSource;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classifies a path by its extension, case-insensitively.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Ok(Self::Image)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Ok(Self::Video)
        } else {
            Err(MediaError::unsupported(format!(
                "Unrecognised media extension: {}",
                path.display()
            )))
        }
    }
}

/// An opened medium. Opening is all-or-nothing: a `Session` only exists once
/// its source has been decoded successfully.
pub struct Session {
    path: PathBuf,
    kind: MediaKind,
    source: Box<dyn FrameSource>,
}

impl Session {
    /// Opens `path`, picking the kind from its extension.
    pub fn open(backend: &dyn MediaBackend, path: &Path) -> Result<Self> {
        let kind = MediaKind::from_path(path)?;
        Self::open_as(backend, path, kind)
    }

    pub fn open_as(backend: &dyn MediaBackend, path: &Path, kind: MediaKind) -> Result<Self> {
        let source = backend.open_source(path, kind)?;
        info!(
            path = %path.display(),
            ?kind,
            frames = source.frame_count(),
            "session opened"
        );
        Ok(Self::from_source(path, kind, source))
    }

    pub fn from_source(path: &Path, kind: MediaKind, source: Box<dyn FrameSource>) -> Self {
        Self {
            path: path.to_path_buf(),
            kind,
            source,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn total_frames(&self) -> usize {
        self.source.frame_count()
    }

    pub fn frame_rate(&self) -> f64 {
        self.source.frame_rate()
    }

    pub(crate) fn source_mut(&mut self) -> &mut dyn FrameSource {
        self.source.as_mut()
    }

    /// Releases the decode handle. Safe to call more than once.
    pub fn release(&mut self) {
        self.source.release();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("total_frames", &self.total_frames())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(MediaKind::from_path(Path::new("a/b.JPG")).unwrap(), MediaKind::Image);
        assert_eq!(MediaKind::from_path(Path::new("clip.mkv")).unwrap(), MediaKind::Video);
        assert!(matches!(
            MediaKind::from_path(Path::new("notes.txt")),
            Err(MediaError::UnsupportedFormat(_))
        ));
        assert!(MediaKind::from_path(Path::new("no_extension")).is_err());
    }

    #[test]
    fn test_open_video_session() {
        let backend = FakeBackend::new().with_video("clip.mp4", 300, 30.0);
        let session = Session::open(&backend, Path::new("clip.mp4")).unwrap();
        assert_eq!(session.kind(), MediaKind::Video);
        assert_eq!(session.total_frames(), 300);
        assert_eq!(session.frame_rate(), 30.0);
    }

    #[test]
    fn test_open_image_session() {
        let backend = FakeBackend::new().with_image("photo.png");
        let mut session = Session::open(&backend, Path::new("photo.png")).unwrap();
        assert_eq!(session.kind(), MediaKind::Image);
        assert_eq!(session.total_frames(), 1);
        assert_eq!(backend.open_count(Path::new("photo.png")), 1);

        session.release();
        assert_eq!(backend.journal(), vec!["source opened", "source released"]);
    }

    #[test]
    fn test_open_with_mismatched_extension() {
        let backend = FakeBackend::new().with_image("photo.png");
        assert!(matches!(
            Session::open_as(&backend, Path::new("photo.png"), MediaKind::Video),
            Err(MediaError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_open_missing_file() {
        let backend = FakeBackend::new();
        assert!(matches!(
            Session::open(&backend, Path::new("missing.mp4")),
            Err(MediaError::NotFound(_))
        ));
    }
}
