//! File pickers and the modal error dialog.

use std::path::PathBuf;

use eframe::egui;

use crate::utils::media::{IMAGE_EXTS, VIDEO_EXTS};

/// Pick a source video file.
pub fn pick_video() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .add_filter("Video Files", VIDEO_EXTS)
        .set_title("Upload Video")
        .pick_file()
}

/// Pick a still background image.
pub fn pick_background() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .add_filter("Image Files", IMAGE_EXTS)
        .set_title("Upload Picture")
        .pick_file()
}

/// Ask where to write the exported video. `None` aborts the export.
pub fn pick_export_destination() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .add_filter("MP4 files", &["mp4"])
        .set_file_name("output.mp4")
        .set_title("Save Video")
        .save_file()
}

/// Modal error popup. Keeps showing until the user clicks OK, then the
/// message is cleared.
pub fn render_error_window(ctx: &egui::Context, error_msg: &mut Option<String>) {
    let Some(msg) = error_msg.clone() else {
        return;
    };
    let mut dismissed = false;
    egui::Window::new("Error")
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
        .show(ctx, |ui| {
            ui.label(msg);
            ui.add_space(8.0);
            if ui.button("OK").clicked() {
                dismissed = true;
            }
        });
    if dismissed {
        *error_msg = None;
    }
}
