//! Utility functions and constants
//!
//! **Why**: Centralized helpers used across multiple modules
//!
//! **Used by**: media, dialogs, ui modules

/// Media file type detection
pub mod media {
    use std::path::Path;

    /// Supported video file extensions
    pub const VIDEO_EXTS: &[&str] = &["mp4", "avi", "mov"];

    /// Supported background image file extensions
    pub const IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png"];

    /// Check if file is a video format
    pub fn is_video(path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .map(|s| VIDEO_EXTS.contains(&s.to_lowercase().as_str()))
            .unwrap_or(false)
    }

    /// Check if file is an image format
    pub fn is_image(path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .map(|s| IMAGE_EXTS.contains(&s.to_lowercase().as_str()))
            .unwrap_or(false)
    }
}

/// Short display name for a path (file name, or the full path when it has none)
pub fn basename(path: &std::path::Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_video_extensions() {
        assert!(media::is_video(Path::new("clip.mp4")));
        assert!(media::is_video(Path::new("clip.MOV")));
        assert!(media::is_video(Path::new("clip.avi")));
        assert!(!media::is_video(Path::new("clip.mkv")));
        assert!(!media::is_video(Path::new("clip")));
    }

    #[test]
    fn test_image_extensions() {
        assert!(media::is_image(Path::new("bg.jpg")));
        assert!(media::is_image(Path::new("bg.JPEG")));
        assert!(media::is_image(Path::new("bg.png")));
        assert!(!media::is_image(Path::new("bg.tiff")));
        assert!(!media::is_image(Path::new("clip.mp4")));
    }

    #[test]
    fn test_basename() {
        assert_eq!(basename(Path::new("/tmp/videos/clip.mp4")), "clip.mp4");
        assert_eq!(basename(Path::new("clip.mp4")), "clip.mp4");
    }
}
