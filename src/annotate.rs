// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 检测框绘制: 原图 + 检测结果 → 标注图

use std::path::{Path, PathBuf};

use ab_glyph::{FontArc, PxScale};
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::DetectionResult;

/// 按类别循环使用的颜色表
const PALETTE: [(u8, u8, u8); 10] = [
    (255, 64, 64),   // 红色
    (64, 255, 64),   // 绿色
    (64, 64, 255),   // 蓝色
    (255, 255, 64),  // 黄色
    (255, 64, 255),  // 品红
    (64, 255, 255),  // 青色
    (255, 128, 0),   // 橙色
    (128, 0, 255),   // 紫色
    (255, 128, 192), // 粉色
    (128, 255, 128), // 浅绿
];

/// 常见系统字体位置
const FONT_CANDIDATES: [&str; 5] = [
    "assets/font/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
];

pub struct Annotator {
    font: Option<FontArc>,
}

impl Annotator {
    pub fn new(font: Option<FontArc>) -> Self {
        Self { font }
    }

    /// 依次尝试指定字体与系统字体; 都失败时只画框
    pub fn load(font_path: Option<&Path>) -> Self {
        let candidates = font_path
            .map(Path::to_path_buf)
            .into_iter()
            .chain(FONT_CANDIDATES.iter().map(PathBuf::from));

        for path in candidates {
            let Ok(bytes) = std::fs::read(&path) else {
                continue;
            };
            match FontArc::try_from_vec(bytes) {
                Ok(font) => {
                    tracing::info!("🔤 标签字体: {}", path.display());
                    return Self::new(Some(font));
                }
                Err(e) => tracing::warn!("⚠️ 字体无效 {}: {}", path.display(), e),
            }
        }

        tracing::warn!("⚠️ 未找到可用字体,标注图将不显示标签文字");
        Self::new(None)
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn annotate(
        &self,
        image: &DynamicImage,
        result: &DetectionResult,
        names: &[String],
    ) -> RgbaImage {
        let mut canvas = image.to_rgba8();
        let (img_w, img_h) = canvas.dimensions();
        if img_w == 0 || img_h == 0 {
            return canvas;
        }

        let thickness = line_width(img_w, img_h);
        let font_scale = PxScale::from((thickness as f32 * 7.0).max(14.0));

        for bbox in result.bboxes() {
            let x1 = bbox.xmin().max(0.0).round() as i32;
            let y1 = bbox.ymin().max(0.0).round() as i32;
            let x2 = bbox.xmax().min(img_w as f32).round() as i32;
            let y2 = bbox.ymax().min(img_h as f32).round() as i32;
            if x2 <= x1 || y2 <= y1 {
                continue;
            }

            let color = class_color(bbox.id());

            // 线宽 = 多个内缩矩形
            for t in 0..thickness as i32 {
                let (w, h) = (x2 - x1 - 2 * t, y2 - y1 - 2 * t);
                if w <= 0 || h <= 0 {
                    break;
                }
                draw_hollow_rect_mut(
                    &mut canvas,
                    Rect::at(x1 + t, y1 + t).of_size(w as u32, h as u32),
                    color,
                );
            }

            let Some(font) = &self.font else {
                continue;
            };
            let name = names
                .get(bbox.id())
                .cloned()
                .unwrap_or_else(|| format!("class_{}", bbox.id()));
            let label = format!("{} {:.2}", name, bbox.confidence());
            let (tw, th) = text_size(font_scale, font, &label);
            let (strip_w, strip_h) = (tw + 6, th + 6);

            // 标签放在框上方,贴顶时放进框内
            let strip_y = if y1 >= strip_h as i32 {
                y1 - strip_h as i32
            } else {
                y1
            };
            draw_filled_rect_mut(
                &mut canvas,
                Rect::at(x1, strip_y).of_size(strip_w.max(1), strip_h.max(1)),
                color,
            );
            draw_text_mut(
                &mut canvas,
                text_color(color),
                x1 + 3,
                strip_y + 2,
                font_scale,
                font,
                &label,
            );
        }

        canvas
    }
}

fn line_width(w: u32, h: u32) -> u32 {
    (((w + h) as f32 / 2.0 * 0.003).round() as u32).max(2)
}

fn class_color(id: usize) -> Rgba<u8> {
    let (r, g, b) = PALETTE[id % PALETTE.len()];
    Rgba([r, g, b, 255])
}

/// 亮底黑字, 暗底白字
fn text_color(bg: Rgba<u8>) -> Rgba<u8> {
    let [r, g, b, _] = bg.0;
    let luminance = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
    if luminance > 150.0 {
        Rgba([0, 0, 0, 255])
    } else {
        Rgba([255, 255, 255, 255])
    }
}
