//! Bottom status bar: one message line plus loaded-media facts.

use eframe::egui;

use crate::session::SessionState;
use crate::utils;

/// Status bar component
pub struct StatusBar {
    pub current_message: String,
}

impl StatusBar {
    pub fn new() -> Self {
        Self {
            current_message: "Ready".to_string(),
        }
    }

    pub fn set(&mut self, message: impl Into<String>) {
        self.current_message = message.into();
    }

    /// Render status bar at bottom of screen
    pub fn render(&self, ctx: &egui::Context, session: &SessionState) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.monospace(&self.current_message);

                if let Some(meta) = &session.video {
                    ui.separator();
                    ui.monospace(format!("{:>4}x{:<4}", meta.width, meta.height));
                    ui.separator();
                    ui.monospace(format!("{:.2} fps", meta.fps));
                    ui.separator();
                    ui.monospace(format!("{} frames", meta.frame_count));
                }

                if let Some(path) = &session.background_path {
                    ui.separator();
                    ui.monospace(utils::basename(path));
                }
            });
        });
    }
}

impl Default for StatusBar {
    fn default() -> Self {
        Self::new()
    }
}
