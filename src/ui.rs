use detection_app::{
    Annotator, ControlCommand, DetectionSummary, ExportEvent, ExportHandle, ExportPipeline,
    MediaBackend, MediaKind, PlaybackController, PlaybackState, Presentation, Session,
    config::AppConfig,
    frame::fit_within,
    session::{IMAGE_EXTENSIONS, VIDEO_EXTENSIONS},
};
use eframe::egui;
use std::path::Path;
use std::sync::{Arc, mpsc};
use std::time::Instant;
use tracing::{error, info};

// Status line under the controls.
enum Status {
    Idle,
    Info(String),
    Error(String),
}

// Widget events gathered while drawing, applied once the frame is laid out.
enum Action {
    Control(ControlCommand),
    Open(MediaKind),
    Export,
    CancelExport,
}

pub struct MyApp {
    controller: PlaybackController,
    // Receiver for rendered frames published by the controller.
    frames: mpsc::Receiver<Presentation>,
    backend: Arc<dyn MediaBackend>,
    exporter: ExportPipeline,
    export: Option<ExportHandle>,
    export_progress: Option<(usize, usize)>,
    // Texture to display on the screen.
    texture: Option<egui::TextureHandle>,
    summary: DetectionSummary,
    slider: f64,
    display_size: u32,
    status: Status,
}

impl MyApp {
    pub fn new(
        config: &AppConfig,
        annotator: Arc<dyn Annotator>,
        backend: Arc<dyn MediaBackend>,
        exporter: ExportPipeline,
    ) -> Self {
        let (sender, frames) = mpsc::channel();
        Self {
            controller: PlaybackController::new(annotator, Box::new(sender), config.playback()),
            frames,
            backend,
            exporter,
            export: None,
            export_progress: None,
            texture: None,
            summary: DetectionSummary::new(),
            slider: 0.0,
            display_size: config.display_size,
            status: Status::Idle,
        }
    }

    pub fn open_path(&mut self, path: &Path) {
        match Session::open(self.backend.as_ref(), path) {
            Ok(session) => self.install(session),
            Err(e) => self.report(format!("Failed to open {}: {}", path.display(), e)),
        }
    }

    fn open_dialog(&mut self, kind: MediaKind) {
        let dialog = match kind {
            MediaKind::Image => rfd::FileDialog::new().add_filter("Images", IMAGE_EXTENSIONS),
            MediaKind::Video => rfd::FileDialog::new().add_filter("Videos", VIDEO_EXTENSIONS),
        };
        let Some(path) = dialog.pick_file() else {
            return;
        };
        // A failed open leaves the current session untouched.
        match Session::open_as(self.backend.as_ref(), &path, kind) {
            Ok(session) => self.install(session),
            Err(e) => self.report(format!("Failed to open {}: {}", path.display(), e)),
        }
    }

    fn install(&mut self, session: Session) {
        self.texture = None;
        self.slider = 0.0;
        self.status = Status::Idle;
        if let Err(e) = self.controller.open(session) {
            self.report(format!("Could not render first frame: {}", e));
        }
    }

    fn start_export(&mut self) {
        if self.export.is_some() {
            return;
        }
        let Some(kind) = self.controller.export_kind() else {
            return;
        };
        let extension = kind.default_extension();
        let Some(destination) = rfd::FileDialog::new()
            .add_filter("MP4 Video", &["mp4"])
            .add_filter("PNG Image", &["png"])
            .set_file_name(format!("annotated.{}", extension))
            .save_file()
        else {
            return;
        };
        if let Some(job) = self.controller.export_job(&destination) {
            info!(destination = %destination.display(), "export requested");
            self.export_progress = Some((0, self.controller.total_frames()));
            self.export = Some(self.exporter.spawn(job));
        }
    }

    fn report(&mut self, message: String) {
        error!("{}", message);
        self.status = Status::Error(message);
    }

    fn receive_frames(&mut self, ctx: &egui::Context) {
        // Only the newest frame matters for display.
        let Some(latest) = self.frames.try_iter().last() else {
            return;
        };
        let size = [latest.frame.width() as usize, latest.frame.height() as usize];
        let color_image = egui::ColorImage::from_rgb(size, latest.frame.as_raw());
        self.texture = Some(ctx.load_texture(
            "video_frame",
            color_image,
            egui::TextureOptions::LINEAR,
        ));
        self.summary = latest.summary;
        if !self.controller.is_seeking() {
            self.slider = latest.fraction;
        }
    }

    fn receive_export_events(&mut self) {
        let Some(handle) = &self.export else {
            return;
        };
        while let Some(event) = handle.try_next() {
            match event {
                ExportEvent::Progress { written, total } => {
                    self.export_progress = Some((written, total));
                }
                ExportEvent::Finished(report) => {
                    self.status = Status::Info(format!(
                        "Exported {} frame(s) to {}",
                        report.frames_written,
                        report.destination.display()
                    ));
                    self.export_progress = None;
                }
                ExportEvent::Failed(msg) => {
                    self.status = Status::Error(format!("Export failed: {}", msg));
                    self.export_progress = None;
                }
            }
        }
        if handle.is_finished() && self.export_progress.is_none() {
            self.export = None;
        }
    }

    fn apply(&mut self, action: Action) {
        match action {
            Action::Control(command) => {
                if let Err(e) = self.controller.apply(command) {
                    self.report(format!("{:?} failed: {}", command, e));
                }
            }
            Action::Open(kind) => self.open_dialog(kind),
            Action::Export => self.start_export(),
            Action::CancelExport => {
                if let Some(handle) = &self.export {
                    handle.cancel();
                }
            }
        }
    }
}

impl eframe::App for MyApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let next_tick = self.controller.poll(Instant::now());
        self.receive_frames(ctx);
        self.receive_export_events();

        let mut actions = Vec::new();

        // Left column - detected objects info
        egui::SidePanel::left("detections")
            .exact_width(200.0)
            .show(ctx, |ui| {
                ui.heading("Detected Objects");
                ui.separator();
                if self.summary.is_empty() {
                    ui.label("Nothing detected.");
                }
                for (name, count) in self.summary.iter() {
                    ui.label(format!("{}: {}", name, count));
                }
            });

        // Right column - import and export buttons
        egui::SidePanel::right("actions")
            .exact_width(250.0)
            .show(ctx, |ui| {
                ui.heading("Actions");
                ui.separator();
                if ui.button("Import Image").clicked() {
                    actions.push(Action::Open(MediaKind::Image));
                }
                if ui.button("Import Video").clicked() {
                    actions.push(Action::Open(MediaKind::Video));
                }
                if self.controller.session().is_some() {
                    ui.separator();
                    match self.export_progress {
                        Some((written, total)) => {
                            let progress = if total > 0 {
                                written as f32 / total as f32
                            } else {
                                0.0
                            };
                            ui.add(egui::ProgressBar::new(progress).show_percentage());
                            if ui.button("Cancel export").clicked() {
                                actions.push(Action::CancelExport);
                            }
                        }
                        None => {
                            if ui.button("Export").clicked() {
                                actions.push(Action::Export);
                            }
                        }
                    }
                }
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Object Detection Evaluator");

            // Media controls
            ui.horizontal(|ui| {
                let label = match self.controller.state() {
                    PlaybackState::Playing => "⏸",
                    _ => "▶",
                };
                if ui.button(label).clicked() {
                    actions.push(Action::Control(ControlCommand::TogglePlay));
                }
                if ui.button("◼").clicked() {
                    actions.push(Action::Control(ControlCommand::Stop));
                }

                let response = ui.add(
                    egui::Slider::new(&mut self.slider, 0.0..=1.0).show_value(false),
                );
                if response.drag_started() {
                    actions.push(Action::Control(ControlCommand::BeginSeek));
                }
                if response.dragged() && response.changed() {
                    actions.push(Action::Control(ControlCommand::SeekPreview(self.slider)));
                }
                if response.drag_stopped() {
                    actions.push(Action::Control(ControlCommand::EndSeek(self.slider)));
                } else if response.changed() && !response.dragged() {
                    // A click on the track without dragging.
                    actions.push(Action::Control(ControlCommand::EndSeek(self.slider)));
                }

                let total = self.controller.total_frames();
                if total > 1 {
                    ui.label(format!("{} / {}", self.controller.current_frame_index() + 1, total));
                }
            });

            match &self.status {
                Status::Idle => {}
                Status::Info(msg) => {
                    ui.label(msg.as_str());
                }
                Status::Error(msg) => {
                    ui.colored_label(egui::Color32::RED, msg.as_str());
                }
            }

            ui.separator();

            match &self.texture {
                Some(texture) => {
                    let [w, h] = texture.size();
                    let (w, h) = fit_within(w as u32, h as u32, self.display_size);
                    ui.centered_and_justified(|ui| {
                        ui.image((texture.id(), egui::vec2(w as f32, h as f32)));
                    });
                }
                None => {
                    ui.label("Please load an image or a video file.");
                }
            }
        });

        for action in actions {
            self.apply(action);
        }

        // Repaint when the next tick is due, or keep polling while exporting.
        match next_tick {
            Some(delay) => ctx.request_repaint_after(delay),
            None if self.export.is_some() || self.controller.is_seeking() => ctx.request_repaint(),
            None => {}
        }
    }
}
