//! Detection viewer core: frame sources, the playback controller and the
//! export pipeline, independent of any windowing toolkit.

pub mod annotator;
pub mod backend;
pub mod command;
pub mod config;
pub mod error;
pub mod export;
pub mod frame;
pub mod logging;
pub mod playback;
pub mod session;
pub mod sink;
pub mod source;
pub mod summary;

#[cfg(test)]
mod testing;

pub use annotator::{Annotated, Annotator, BoxAnnotator, Detection, Detector, NullDetector};
pub use backend::{MediaBackend, OpenCvBackend};
pub use command::ControlCommand;
pub use error::{MediaError, Result};
pub use export::{ExportEvent, ExportHandle, ExportJob, ExportKind, ExportOptions, ExportPipeline};
pub use playback::{DisplaySink, PlaybackConfig, PlaybackController, PlaybackState, Presentation};
pub use session::{MediaKind, Session};
pub use summary::DetectionSummary;
