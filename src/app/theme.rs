// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 深色主题

use egui_macroquad::egui::{self, Color32};

use super::state::StatusTone;
use crate::report::ConfidenceLevel;

pub const BG: Color32 = Color32::from_rgb(0x1e, 0x1e, 0x1e);
pub const BG_LIGHT: Color32 = Color32::from_rgb(0x2d, 0x2d, 0x2d);
pub const BG_LIGHTER: Color32 = Color32::from_rgb(0x3d, 0x3d, 0x3d);
pub const FG: Color32 = Color32::from_rgb(0xff, 0xff, 0xff);
pub const FG_DIM: Color32 = Color32::from_rgb(0xb0, 0xb0, 0xb0);
pub const ACCENT: Color32 = Color32::from_rgb(0x00, 0x7a, 0xcc);
pub const SUCCESS: Color32 = Color32::from_rgb(0x4e, 0xc9, 0xb0);
pub const WARNING: Color32 = Color32::from_rgb(0xce, 0x91, 0x78);
pub const ERROR: Color32 = Color32::from_rgb(0xf4, 0x87, 0x71);
pub const BORDER: Color32 = Color32::from_rgb(0x40, 0x40, 0x40);

/// macroquad 清屏色 (与 BG 相同)
pub const CLEAR_COLOR: macroquad::color::Color = macroquad::color::Color {
    r: 0x1e as f32 / 255.0,
    g: 0x1e as f32 / 255.0,
    b: 0x1e as f32 / 255.0,
    a: 1.0,
};

pub fn tone_color(tone: StatusTone) -> Color32 {
    match tone {
        StatusTone::Normal => FG,
        StatusTone::Dim => FG_DIM,
        StatusTone::Success => SUCCESS,
        StatusTone::Warning => WARNING,
        StatusTone::Error => ERROR,
    }
}

pub fn level_color(level: ConfidenceLevel) -> Color32 {
    match level {
        ConfidenceLevel::High => SUCCESS,
        ConfidenceLevel::Medium => WARNING,
        ConfidenceLevel::Low => ERROR,
    }
}

pub fn label_color(ok: bool) -> Color32 {
    if ok {
        SUCCESS
    } else {
        ERROR
    }
}

/// 面板框
pub fn card_frame(fill: Color32) -> egui::Frame {
    egui::Frame::NONE
        .fill(fill)
        .stroke(egui::Stroke::new(1.0, BORDER))
        .inner_margin(egui::Margin::same(8))
        .corner_radius(4.0)
}

pub fn set_style(ctx: &egui::Context) {
    let mut visuals = egui::Visuals::dark();

    // 窗口和面板
    visuals.window_fill = BG_LIGHT;
    visuals.window_stroke = egui::Stroke::new(1.0, BORDER);
    visuals.panel_fill = BG;
    visuals.extreme_bg_color = BG_LIGHT;
    visuals.faint_bg_color = BG_LIGHTER;

    // 非交互控件
    visuals.widgets.noninteractive.bg_fill = BG;
    visuals.widgets.noninteractive.weak_bg_fill = BG;
    visuals.widgets.noninteractive.bg_stroke = egui::Stroke::new(1.0, BORDER);
    visuals.widgets.noninteractive.fg_stroke = egui::Stroke::new(1.0, FG);
    visuals.widgets.noninteractive.corner_radius = 3.0.into();

    // 按钮、滑块
    visuals.widgets.inactive.bg_fill = BG_LIGHTER;
    visuals.widgets.inactive.weak_bg_fill = BG_LIGHTER;
    visuals.widgets.inactive.bg_stroke = egui::Stroke::NONE;
    visuals.widgets.inactive.fg_stroke = egui::Stroke::new(1.0, FG);
    visuals.widgets.inactive.corner_radius = 3.0.into();

    // 悬停
    visuals.widgets.hovered.bg_fill = ACCENT;
    visuals.widgets.hovered.weak_bg_fill = ACCENT;
    visuals.widgets.hovered.bg_stroke = egui::Stroke::new(1.0, ACCENT);
    visuals.widgets.hovered.fg_stroke = egui::Stroke::new(1.5, FG);
    visuals.widgets.hovered.corner_radius = 3.0.into();

    // 点击
    visuals.widgets.active.bg_fill = ACCENT;
    visuals.widgets.active.weak_bg_fill = ACCENT;
    visuals.widgets.active.bg_stroke = egui::Stroke::new(2.0, FG_DIM);
    visuals.widgets.active.fg_stroke = egui::Stroke::new(2.0, FG);
    visuals.widgets.active.corner_radius = 3.0.into();

    visuals.selection.bg_fill = ACCENT;
    visuals.selection.stroke = egui::Stroke::new(1.0, FG);

    ctx.set_visuals(visuals);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_and_level_colors() {
        assert_eq!(tone_color(StatusTone::Success), SUCCESS);
        assert_eq!(tone_color(StatusTone::Dim), FG_DIM);
        assert_eq!(level_color(ConfidenceLevel::High), SUCCESS);
        assert_eq!(level_color(ConfidenceLevel::Medium), WARNING);
        assert_eq!(level_color(ConfidenceLevel::Low), ERROR);
    }
}
