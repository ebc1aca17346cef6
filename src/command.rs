use crate::error::Result;
use crate::playback::PlaybackController;

/// Control commands the UI adapter translates widget events into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlCommand {
    Play,
    Pause,
    TogglePlay,
    Stop,
    /// Pointer down on the position slider.
    BeginSeek,
    /// Slider dragged to a fraction in `0.0..=1.0`.
    SeekPreview(f64),
    /// Pointer released at a fraction in `0.0..=1.0`.
    EndSeek(f64),
}

impl PlaybackController {
    pub fn apply(&mut self, command: ControlCommand) -> Result<()> {
        match command {
            ControlCommand::Play => self.play(),
            ControlCommand::Pause => {
                self.pause();
                Ok(())
            }
            ControlCommand::TogglePlay => self.toggle_play(),
            ControlCommand::Stop => self.stop(),
            ControlCommand::BeginSeek => {
                self.begin_seek();
                Ok(())
            }
            ControlCommand::SeekPreview(fraction) => {
                self.seek_preview(fraction);
                Ok(())
            }
            ControlCommand::EndSeek(fraction) => self.end_seek(fraction),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::{PlaybackConfig, PlaybackState};
    use crate::testing::{LabelAnnotator, video_session};
    use std::sync::{Arc, mpsc};

    #[test]
    fn test_apply_drives_state_machine() {
        let (sender, _receiver) = mpsc::channel();
        let mut controller = PlaybackController::new(
            Arc::new(LabelAnnotator::default()),
            Box::new(sender),
            PlaybackConfig::default(),
        );
        controller.open(video_session("clip.mp4", 200)).unwrap();

        controller.apply(ControlCommand::TogglePlay).unwrap();
        assert_eq!(controller.state(), PlaybackState::Playing);

        controller.apply(ControlCommand::BeginSeek).unwrap();
        controller.apply(ControlCommand::SeekPreview(0.3)).unwrap();
        controller.apply(ControlCommand::EndSeek(0.5)).unwrap();
        assert_eq!(controller.current_frame_index(), 100);
        assert_eq!(controller.state(), PlaybackState::Playing);

        controller.apply(ControlCommand::Pause).unwrap();
        assert_eq!(controller.state(), PlaybackState::Paused);

        controller.apply(ControlCommand::Stop).unwrap();
        assert_eq!(controller.state(), PlaybackState::Stopped);
        assert_eq!(controller.current_frame_index(), 0);

        controller.apply(ControlCommand::Play).unwrap();
        assert_eq!(controller.state(), PlaybackState::Playing);
    }
}
