use chromakey::cli::Args;
use chromakey::dialogs;
use chromakey::entities::ColorKeyRange;
use chromakey::export::{ExportJob, StepOutcome};
use chromakey::media;
use chromakey::preview;
use chromakey::session::SessionState;
use chromakey::status_bar::StatusBar;
use chromakey::ui::{self, UiAction};
use chromakey::utils;

use clap::Parser;
use eframe::egui;
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Export work budget between redraws; keeps the progress bar live while
/// the pass runs on the GUI thread.
const EXPORT_TICK_BUDGET: Duration = Duration::from_millis(33);

/// Main application state
struct ChromaKeyApp {
    session: SessionState,
    keyer: ColorKeyRange,
    preview_tex: Option<egui::TextureHandle>,
    export: Option<ExportJob>,
    status_bar: StatusBar,
    error_msg: Option<String>,
    warning_msg: Option<String>,
}

impl ChromaKeyApp {
    fn new() -> Self {
        Self {
            session: SessionState::new(),
            keyer: ColorKeyRange::default(),
            preview_tex: None,
            export: None,
            status_bar: StatusBar::new(),
            error_msg: None,
            warning_msg: None,
        }
    }

    fn upload_video(&mut self, ctx: &egui::Context) {
        let Some(path) = dialogs::pick_video() else {
            return;
        };
        match media::load_video(&path) {
            Ok(meta) => {
                let audio = media::load_audio(&path);
                if audio.is_none() {
                    warn!("No usable audio track in {}", path.display());
                    self.warning_msg = Some("Could not load audio from video file.".to_string());
                } else {
                    self.warning_msg = None;
                }
                self.status_bar
                    .set(format!("Video loaded: {}", utils::basename(&path)));
                self.session.set_video(path, meta, audio);
                self.refresh_preview(ctx);
            }
            Err(e) => {
                error!("{}", e);
                self.error_msg = Some(e.to_string());
            }
        }
    }

    fn upload_background(&mut self, ctx: &egui::Context) {
        let Some(path) = dialogs::pick_background() else {
            return;
        };
        match media::load_image(&path) {
            Ok(image) => {
                self.status_bar
                    .set(format!("Background loaded: {}", utils::basename(&path)));
                self.session.set_background(path, image);
                self.refresh_preview(ctx);
            }
            Err(e) => {
                error!("{}", e);
                self.error_msg = Some(e.to_string());
            }
        }
    }

    fn start_export(&mut self) {
        if !self.session.ready() {
            self.error_msg = Some("Please upload both video and background!".to_string());
            return;
        }

        // Declining the save dialog aborts with no side effects
        let Some(dest) = dialogs::pick_export_destination() else {
            return;
        };

        match ExportJob::start(&self.session, self.keyer, dest) {
            Ok(job) => {
                self.status_bar.set("Processing video...");
                self.export = Some(job);
            }
            Err(e) => {
                error!("Export failed to start: {}", e);
                self.error_msg = Some(e.to_string());
            }
        }
    }

    /// Advance the running export for up to one tick budget, then yield
    /// back to the event loop so progress and status repaint.
    fn step_export(&mut self, ctx: &egui::Context) {
        let Some(job) = &mut self.export else {
            return;
        };

        let tick_start = Instant::now();
        let mut clear_job = false;
        loop {
            match job.step() {
                Ok(StepOutcome::Wrote) => {
                    let (done, total) = job.progress();
                    self.status_bar
                        .set(format!("Processing frame {}/{}", done, total));
                    if tick_start.elapsed() >= EXPORT_TICK_BUDGET {
                        break;
                    }
                }
                Ok(StepOutcome::Finished) => {
                    let dest = job.dest().display().to_string();
                    info!("Video saved to {}", dest);
                    self.status_bar.set(format!("Video saved to {}", dest));
                    clear_job = true;
                    break;
                }
                Err(e) => {
                    error!("Export failed: {}", e);
                    self.status_bar.set("Export failed");
                    self.error_msg = Some(format!("Export failed: {}", e));
                    clear_job = true;
                    break;
                }
            }
        }
        if clear_job {
            // Dropping the job closes decoder and encoder; a failed pass
            // leaves the partial file on disk
            self.export = None;
        }
        ctx.request_repaint();
    }

    fn refresh_preview(&mut self, ctx: &egui::Context) {
        let (Some(video_path), Some(background)) =
            (&self.session.video_path, &self.session.background)
        else {
            return;
        };
        if let Some(frame) =
            preview::render_preview(video_path, background, &self.keyer, self.session.playhead)
        {
            let size = [frame.width() as usize, frame.height() as usize];
            let image = egui::ColorImage::from_rgb(size, frame.data());
            self.preview_tex =
                Some(ctx.load_texture("preview", image, egui::TextureOptions::LINEAR));
        }
    }
}

impl eframe::App for ChromaKeyApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.step_export(ctx);

        self.status_bar.render(ctx, &self.session);

        let progress = self.export.as_ref().map(|j| j.fraction()).unwrap_or(0.0);
        let exporting = self.export.is_some();

        let mut actions = Vec::new();
        egui::CentralPanel::default().show(ctx, |ui| {
            actions = ui::render_main(
                ui,
                &self.session,
                self.preview_tex.as_ref(),
                progress,
                exporting,
                self.warning_msg.as_deref(),
            );
        });

        for action in actions {
            match action {
                UiAction::UploadVideo => self.upload_video(ctx),
                UiAction::UploadBackground => self.upload_background(ctx),
                UiAction::Export => self.start_export(),
            }
        }

        dialogs::render_error_window(ctx, &mut self.error_msg);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize FFmpeg
    ffmpeg_next::init()?;

    let args = Args::parse();

    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .as_ref()
            .cloned()
            .unwrap_or_else(|| PathBuf::from("chromakey.log"));

        let file = std::fs::File::create(&log_path)?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .filter_module("egui", log::LevelFilter::Info) // Suppress egui DEBUG spam
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!(
            "Logging to file: {} (level: {:?})",
            log_path.display(),
            log_level
        );
    } else {
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };

        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .filter_module("egui", log::LevelFilter::Info) // Suppress egui DEBUG spam
            .format_timestamp_millis()
            .init();
    }

    info!("ChromaKey green screen remover starting...");
    debug!("Command-line args: {:?}", args);

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(format!("ChromaKey v{}", env!("CARGO_PKG_VERSION")))
            .with_inner_size(egui::vec2(1000.0, 700.0))
            .with_resizable(true),
        ..Default::default()
    };

    eframe::run_native(
        "ChromaKey",
        native_options,
        Box::new(|_cc| Ok(Box::new(ChromaKeyApp::new()))),
    )?;

    info!("Application exiting");
    Ok(())
}
