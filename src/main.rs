mod ui;

use anyhow::Context;
use clap::Parser;
use detection_app::{
    BoxAnnotator, ExportPipeline, NullDetector, OpenCvBackend, config::AppConfig, logging,
    sink::parse_fourcc,
};
use eframe::egui;
use std::sync::Arc;
use ui::MyApp;

fn main() -> anyhow::Result<()> {
    let config = AppConfig::parse();
    logging::init(&config.log_level);
    parse_fourcc(&config.export_codec).context("invalid --export-codec")?;

    // One detector for the whole process, shared by playback and export.
    let annotator = Arc::new(BoxAnnotator::new(Box::new(NullDetector)));
    let backend = Arc::new(OpenCvBackend);
    let exporter = ExportPipeline::new(annotator.clone(), backend.clone(), config.export());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 750.0])
            .with_min_inner_size([1050.0, 700.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Detection app",
        options,
        Box::new(move |_cc| {
            let mut app = MyApp::new(&config, annotator, backend, exporter);
            if let Some(path) = &config.path {
                app.open_path(path);
            }
            Ok(Box::new(app))
        }),
    )
    .map_err(|e| anyhow::anyhow!("UI terminated with an error: {}", e))
}
