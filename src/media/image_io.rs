// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 静态图片读写

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{DynamicImage, RgbaImage};

pub fn load_image(path: &Path) -> Result<DynamicImage> {
    image::ImageReader::open(path)
        .with_context(|| format!("cannot open {}", path.display()))?
        .with_guessed_format()?
        .decode()
        .with_context(|| format!("cannot decode {}", path.display()))
}

/// 按扩展名选择格式,无扩展名时补 `.jpg`; JPEG 不支持 alpha,先转 RGB
pub fn save_image(path: &Path, image: &RgbaImage) -> Result<PathBuf> {
    let path = if path.extension().is_none() {
        path.with_extension("jpg")
    } else {
        path.to_path_buf()
    };

    let is_jpeg = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "jpg" | "jpeg"))
        .unwrap_or(false);

    let written = if is_jpeg {
        DynamicImage::ImageRgba8(image.clone()).to_rgb8().save(&path)
    } else {
        image.save(&path)
    };
    written.with_context(|| format!("cannot write {}", path.display()))?;

    tracing::info!("💾 结果已保存: {}", path.display());
    Ok(path)
}

/// 缩略图尺寸: 等比缩小到 max 内,不放大,最小 1px
pub fn fit_within(w: u32, h: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    if w == 0 || h == 0 {
        return (1, 1);
    }
    let scale = (max_w as f32 / w as f32)
        .min(max_h as f32 / h as f32)
        .min(1.0);
    (
        ((w as f32 * scale).round() as u32).max(1),
        ((h as f32 * scale).round() as u32).max(1),
    )
}
