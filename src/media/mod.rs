// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 输入源: 图片、视频文件、摄像头
//!
//! - `image_io`: 静态图片读写
//! - `decoder`: ez-ffmpeg 视频/摄像头解码
//! - `decode_filter`: 解码帧 → 通道
//! - `devices`: 摄像头枚举

pub mod decode_filter;
pub mod decoder;
pub mod devices;
pub mod image_io;

use std::path::{Path, PathBuf};

use phf::phf_map;

pub use decode_filter::FrameTap;
pub use decoder::VideoDecoder;
pub use devices::{get_video_devices, VideoDevice};
pub use image_io::{fit_within, load_image, save_image};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

/// 扩展名 → 类型 (小写)
static EXTENSIONS: phf::Map<&'static str, MediaKind> = phf_map! {
    "jpg" => MediaKind::Image,
    "jpeg" => MediaKind::Image,
    "png" => MediaKind::Image,
    "bmp" => MediaKind::Image,
    "mp4" => MediaKind::Video,
    "avi" => MediaKind::Video,
    "mov" => MediaKind::Video,
    "mkv" => MediaKind::Video,
};

pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];
pub const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "avi", "mov", "mkv"];

impl MediaKind {
    /// 按扩展名分类 (不区分大小写); 未知扩展名返回 None
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        EXTENSIONS.get(ext.as_str()).copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MediaSource {
    Image(PathBuf),
    Video(PathBuf),
    Webcam { index: usize, name: String },
}

impl MediaSource {
    /// 文件对话框选出的路径; 未知扩展名按对话框类型处理
    pub fn from_picked(path: PathBuf, dialog_kind: MediaKind) -> Self {
        match MediaKind::from_path(&path).unwrap_or(dialog_kind) {
            MediaKind::Image => Self::Image(path),
            MediaKind::Video => Self::Video(path),
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            Self::Image(p) | Self::Video(p) => p
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| p.display().to_string()),
            Self::Webcam { index, name } => format!("Webcam {} ({})", index, name),
        }
    }

    /// 视频或摄像头 (交给工作线程)
    pub fn is_stream(&self) -> bool {
        !matches!(self, Self::Image(_))
    }
}

/// 解码出的一帧 RGBA
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
    pub index: u64, // 从1开始
}

impl DecodedFrame {
    pub fn into_image(self) -> Option<image::DynamicImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.rgba)
            .map(image::DynamicImage::ImageRgba8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_by_extension() {
        assert_eq!(MediaKind::from_path(Path::new("a/b.MP4")), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_path(Path::new("x.mkv")), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_path(Path::new("x.JPeG")), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_path(Path::new("x.bmp")), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_path(Path::new("x.gif")), None);
        assert_eq!(MediaKind::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_picked_source_falls_back_to_dialog_kind() {
        let src = MediaSource::from_picked(PathBuf::from("clip.webm"), MediaKind::Video);
        assert_eq!(src, MediaSource::Video(PathBuf::from("clip.webm")));
        assert!(src.is_stream());

        let src = MediaSource::from_picked(PathBuf::from("dir/cat.png"), MediaKind::Video);
        assert_eq!(src, MediaSource::Image(PathBuf::from("dir/cat.png")));
        assert!(!src.is_stream());
        assert_eq!(src.display_name(), "cat.png");
    }

    #[test]
    fn test_webcam_display_name() {
        let src = MediaSource::Webcam {
            index: 0,
            name: "Default camera".into(),
        };
        assert!(src.is_stream());
        assert_eq!(src.display_name(), "Webcam 0 (Default camera)");
    }

    #[test]
    fn test_decoded_frame_into_image() {
        let frame = DecodedFrame {
            width: 2,
            height: 1,
            rgba: vec![0; 8],
            index: 1,
        };
        assert_eq!(frame.into_image().map(|i| (i.width(), i.height())), Some((2, 1)));

        let bad = DecodedFrame {
            width: 2,
            height: 2,
            rgba: vec![0; 8],
            index: 1,
        };
        assert!(bad.into_image().is_none());
    }
}
