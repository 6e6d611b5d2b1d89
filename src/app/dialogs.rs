// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 原生对话框 (rfd)

use std::path::{Path, PathBuf};

use rfd::{FileDialog, MessageButtons, MessageDialog, MessageDialogResult, MessageLevel};

use crate::error::{DetectorError, Severity};
use crate::media::{IMAGE_EXTENSIONS, VIDEO_EXTENSIONS};

fn file_dialog(title: &str, start_dir: Option<&Path>) -> FileDialog {
    let dialog = FileDialog::new().set_title(title);
    match start_dir.filter(|d| d.is_dir()) {
        Some(dir) => dialog.set_directory(dir),
        None => dialog,
    }
}

pub fn pick_model(start_dir: Option<&Path>) -> Option<PathBuf> {
    let start = start_dir
        .map(Path::to_path_buf)
        .or_else(|| Some(PathBuf::from("models")));
    file_dialog("Select YOLO Model File", start.as_deref())
        .add_filter("ONNX Models", &["onnx"])
        .add_filter("All files", &["*"])
        .pick_file()
}

/// 没有上次目录时从系统图片/视频目录开始
pub fn pick_image(start_dir: Option<&Path>) -> Option<PathBuf> {
    let fallback = dirs::picture_dir();
    file_dialog("Select Image", start_dir.or(fallback.as_deref()))
        .add_filter("Image files", &IMAGE_EXTENSIONS)
        .add_filter("All files", &["*"])
        .pick_file()
}

pub fn pick_video(start_dir: Option<&Path>) -> Option<PathBuf> {
    let fallback = dirs::video_dir();
    file_dialog("Select Video", start_dir.or(fallback.as_deref()))
        .add_filter("Video files", &VIDEO_EXTENSIONS)
        .add_filter("All files", &["*"])
        .pick_file()
}

pub fn pick_save_path(start_dir: Option<&Path>, default_name: &str) -> Option<PathBuf> {
    file_dialog("Save Result", start_dir)
        .set_file_name(default_name)
        .add_filter("JPEG", &["jpg"])
        .add_filter("PNG", &["png"])
        .save_file()
}

fn show(level: MessageLevel, title: &str, body: &str) {
    MessageDialog::new()
        .set_level(level)
        .set_title(title)
        .set_description(body)
        .set_buttons(MessageButtons::Ok)
        .show();
}

pub fn show_error(err: &DetectorError) {
    let level = match err.severity() {
        Severity::Error => MessageLevel::Error,
        Severity::Warning => MessageLevel::Warning,
        Severity::Info => MessageLevel::Info,
    };
    show(level, err.title(), &err.to_string());
}

pub fn show_info(title: &str, body: &str) {
    show(MessageLevel::Info, title, body);
}

pub fn ask_yes_no(title: &str, body: &str) -> bool {
    matches!(
        MessageDialog::new()
            .set_level(MessageLevel::Info)
            .set_title(title)
            .set_description(body)
            .set_buttons(MessageButtons::YesNo)
            .show(),
        MessageDialogResult::Yes
    )
}
