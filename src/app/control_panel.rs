// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
use egui_macroquad::egui;

use super::state::AppState;
use super::theme;
use crate::config::{Thresholds, MAX_THRESHOLD, MIN_THRESHOLD};
use crate::media::{get_video_devices, VideoDevice};

/// 控制面板状态
pub struct ControlPanel {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,

    // 设备列表
    pub video_devices: Vec<VideoDevice>,
    pub selected_device_index: usize,
    devices_loaded: bool,
}

/// 控制面板操作返回值
#[derive(Default, Debug, Clone, PartialEq)]
pub struct ControlPanelActions {
    pub load_model: bool,
    pub reload_model: bool,
    pub pick_image: bool,
    pub pick_video: bool,
    pub pick_webcam: Option<VideoDevice>,
    pub detect: bool,
    pub stop: bool,
    pub clear: bool,
    pub save: bool,
    pub thresholds_changed: Option<Thresholds>,
}

impl ControlPanel {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            confidence_threshold: thresholds.conf,
            iou_threshold: thresholds.iou,
            video_devices: Vec::new(),
            selected_device_index: 0,
            devices_loaded: false,
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds::new(self.confidence_threshold, self.iou_threshold)
    }

    fn ensure_devices(&mut self) {
        if !self.devices_loaded {
            self.video_devices = get_video_devices();
            self.devices_loaded = true;
            self.selected_device_index = 0;
        }
    }

    fn selected_device(&self) -> Option<VideoDevice> {
        self.video_devices.get(self.selected_device_index).cloned()
    }

    /// 绘制控制面板UI
    pub fn ui(&mut self, ui: &mut egui::Ui, state: &AppState) -> ControlPanelActions {
        let mut actions = ControlPanelActions::default();

        ui.horizontal(|ui| {
            // --- 模型 ---
            theme::card_frame(theme::BG_LIGHT).show(ui, |ui| {
                ui.vertical(|ui| {
                    ui.strong("🤖 Model");
                    ui.horizontal(|ui| {
                        ui.label("Current Model:");
                        let (text, ok) = state.model_label();
                        ui.colored_label(theme::label_color(ok), text);
                    });
                    ui.horizontal(|ui| {
                        if ui
                            .add_enabled(state.can_load_model(), egui::Button::new("📂 Change Model"))
                            .clicked()
                        {
                            actions.load_model = true;
                        }
                        if ui
                            .add_enabled(state.can_reload(), egui::Button::new("🔄 Reload"))
                            .clicked()
                        {
                            actions.reload_model = true;
                        }
                    });
                });
            });

            // --- 输入源 ---
            theme::card_frame(theme::BG_LIGHT).show(ui, |ui| {
                ui.vertical(|ui| {
                    ui.strong("📁 Quick Actions");
                    ui.horizontal(|ui| {
                        let enabled = state.can_select_source();
                        if ui.add_enabled(enabled, egui::Button::new("🖼 Image")).clicked() {
                            actions.pick_image = true;
                        }
                        if ui.add_enabled(enabled, egui::Button::new("🎬 Video")).clicked() {
                            actions.pick_video = true;
                        }
                        if ui.add_enabled(enabled, egui::Button::new("📹 Webcam")).clicked() {
                            self.ensure_devices();
                            actions.pick_webcam = self.selected_device();
                        }
                    });

                    if self.devices_loaded && self.video_devices.len() > 1 {
                        let before = self.selected_device_index;
                        egui::ComboBox::from_id_salt("webcam_device")
                            .selected_text(
                                self.video_devices
                                    .get(self.selected_device_index)
                                    .map(|d| d.name.as_str())
                                    .unwrap_or("Unknown"),
                            )
                            .show_ui(ui, |ui| {
                                for (idx, device) in self.video_devices.iter().enumerate() {
                                    ui.selectable_value(
                                        &mut self.selected_device_index,
                                        idx,
                                        &device.name,
                                    );
                                }
                            });
                        // 切换设备后立即作为输入源
                        if before != self.selected_device_index && state.can_select_source() {
                            actions.pick_webcam = self.selected_device();
                        }
                    }
                });
            });
        });

        ui.add_space(4.0);

        // --- 检测设置 ---
        theme::card_frame(theme::BG_LIGHT).show(ui, |ui| {
            ui.set_width(ui.available_width());
            ui.strong("⚙️ Detection Settings");
            ui.horizontal(|ui| {
                ui.label("📄 Selected File:");
                let (text, ok) = state.source_label();
                ui.colored_label(theme::label_color(ok), text);
            });

            ui.horizontal(|ui| {
                let mut params_changed = false;
                ui.vertical(|ui| {
                    ui.label("Confidence Threshold:");
                    ui.horizontal(|ui| {
                        params_changed |= ui
                            .add(
                                egui::Slider::new(
                                    &mut self.confidence_threshold,
                                    MIN_THRESHOLD..=MAX_THRESHOLD,
                                )
                                .show_value(false),
                            )
                            .changed();
                        ui.colored_label(
                            theme::ACCENT,
                            format!("{:.2}", self.confidence_threshold),
                        );
                    });
                });
                ui.add_space(16.0);
                ui.vertical(|ui| {
                    ui.label("IoU Threshold:");
                    ui.horizontal(|ui| {
                        params_changed |= ui
                            .add(
                                egui::Slider::new(
                                    &mut self.iou_threshold,
                                    MIN_THRESHOLD..=MAX_THRESHOLD,
                                )
                                .show_value(false),
                            )
                            .changed();
                        ui.colored_label(theme::ACCENT, format!("{:.2}", self.iou_threshold));
                    });
                });
                if params_changed {
                    actions.thresholds_changed = Some(self.thresholds());
                }
            });

            ui.add_space(4.0);
            ui.horizontal(|ui| {
                if ui
                    .add_enabled(state.can_detect(), egui::Button::new("🔍 Detect Objects"))
                    .clicked()
                {
                    actions.detect = true;
                }
                if ui
                    .add_enabled(state.can_stop(), egui::Button::new("⏹ Stop"))
                    .clicked()
                {
                    actions.stop = true;
                }
                if ui
                    .add_enabled(state.can_clear(), egui::Button::new("🗑 Clear"))
                    .clicked()
                {
                    actions.clear = true;
                }
                if ui
                    .add_enabled(state.can_save(), egui::Button::new("💾 Save Result"))
                    .clicked()
                {
                    actions.save = true;
                }
            });
        });

        actions
    }
}
