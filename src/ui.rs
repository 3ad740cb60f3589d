//! Main window layout
//!
//! Renders the upload rows, preview region, progress bar and export
//! button; interactions come back as [`UiAction`] values for the app to
//! dispatch.

use eframe::egui;

use crate::session::SessionState;
use crate::utils;

/// Actions emitted by the main panel this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAction {
    UploadVideo,
    UploadBackground,
    Export,
}

/// Placeholder canvas size shown before the first composite
const EMPTY_PREVIEW: egui::Vec2 = egui::Vec2::new(400.0, 300.0);

pub fn render_main(
    ui: &mut egui::Ui,
    session: &SessionState,
    preview: Option<&egui::TextureHandle>,
    progress: f32,
    exporting: bool,
    warning: Option<&str>,
) -> Vec<UiAction> {
    let mut actions = Vec::new();

    ui.vertical_centered(|ui| {
        ui.add_space(10.0);
        ui.heading("Video Green Screen Remover");
        ui.add_space(10.0);

        ui.horizontal(|ui| {
            ui.label("Video:");
            if ui
                .add_enabled(!exporting, egui::Button::new("Upload Video"))
                .clicked()
            {
                actions.push(UiAction::UploadVideo);
            }
            if let Some(path) = &session.video_path {
                ui.label(utils::basename(path));
            }
        });
        ui.add_space(6.0);

        ui.horizontal(|ui| {
            ui.label("Background:");
            if ui
                .add_enabled(!exporting, egui::Button::new("Upload Picture"))
                .clicked()
            {
                actions.push(UiAction::UploadBackground);
            }
            if let Some(path) = &session.background_path {
                ui.label(utils::basename(path));
            }
        });
        ui.add_space(10.0);

        match preview {
            Some(tex) => {
                ui.image((tex.id(), tex.size_vec2()));
            }
            None => {
                let (rect, _) = ui.allocate_exact_size(EMPTY_PREVIEW, egui::Sense::hover());
                ui.painter()
                    .rect_filled(rect, egui::CornerRadius::ZERO, egui::Color32::BLACK);
            }
        }
        ui.add_space(10.0);

        ui.add(
            egui::ProgressBar::new(progress)
                .desired_width(800.0)
                .show_percentage(),
        );
        ui.add_space(10.0);

        if ui
            .add_enabled(!exporting, egui::Button::new("Process and Save"))
            .clicked()
        {
            actions.push(UiAction::Export);
        }

        if let Some(warning) = warning {
            ui.add_space(6.0);
            ui.colored_label(egui::Color32::YELLOW, warning);
        }
    });

    actions
}
