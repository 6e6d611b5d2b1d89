// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 检测结果列表

use egui_macroquad::egui::{self, RichText};

use super::theme;
use crate::report::{capitalize, Detection, DetectionReport};

pub const PLACEHOLDER: &str =
    "No detections yet\n\nUpload an image or video\nand click 'Detect Objects'";

pub struct ResultsPanel;

impl ResultsPanel {
    pub fn ui(ui: &mut egui::Ui, report: Option<&DetectionReport>) {
        ui.heading("📊 Detection Results");
        ui.separator();

        let Some(report) = report else {
            ui.add_space(40.0);
            ui.vertical_centered(|ui| {
                ui.label(RichText::new(PLACEHOLDER).color(theme::FG_DIM));
            });
            return;
        };

        egui::ScrollArea::vertical()
            .auto_shrink([false; 2])
            .show(ui, |ui| {
                if let Some(frame) = report.frame {
                    ui.label(
                        RichText::new(format!("FRAME {}", frame))
                            .color(theme::WARNING)
                            .strong(),
                    );
                }

                // 总数
                theme::card_frame(theme::BG_LIGHTER).show(ui, |ui| {
                    ui.set_width(ui.available_width());
                    ui.vertical_centered(|ui| {
                        ui.label(
                            RichText::new(report.total().to_string())
                                .size(36.0)
                                .color(theme::ACCENT)
                                .strong(),
                        );
                        ui.label(RichText::new("Objects Detected").color(theme::FG_DIM));
                    });
                });

                if report.is_empty() {
                    ui.add_space(20.0);
                    ui.vertical_centered(|ui| {
                        ui.label(RichText::new("No objects detected").color(theme::FG_DIM));
                    });
                    return;
                }

                ui.add_space(8.0);
                ui.label(RichText::new("📈 Summary by Class").strong());
                for (name, count) in report.summary() {
                    summary_card(ui, name, *count);
                }

                ui.add_space(8.0);
                ui.label(RichText::new("🔍 Detailed Detections").strong());
                for detection in &report.detections {
                    detection_card(ui, detection);
                }
            });
    }
}

fn summary_card(ui: &mut egui::Ui, name: &str, count: usize) {
    theme::card_frame(theme::BG_LIGHT).show(ui, |ui| {
        ui.set_width(ui.available_width());
        ui.horizontal(|ui| {
            ui.label(capitalize(name));
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                egui::Frame::NONE
                    .fill(theme::ACCENT)
                    .inner_margin(egui::Margin::symmetric(8, 2))
                    .corner_radius(8.0)
                    .show(ui, |ui| {
                        ui.label(RichText::new(count.to_string()).color(theme::FG).strong());
                    });
            });
        });
    });
}

fn detection_card(ui: &mut egui::Ui, d: &Detection) {
    theme::card_frame(theme::BG_LIGHT).show(ui, |ui| {
        ui.set_width(ui.available_width());
        ui.horizontal(|ui| {
            ui.label(RichText::new(format!("#{}", d.index)).color(theme::FG_DIM));
            ui.label(RichText::new(d.display_name()).strong());
        });
        ui.horizontal(|ui| {
            ui.label(RichText::new("Confidence:").color(theme::FG_DIM));
            let color = theme::level_color(d.level());
            ui.add(
                egui::ProgressBar::new(d.confidence.clamp(0.0, 1.0))
                    .desired_width(120.0)
                    .fill(color),
            );
            ui.label(RichText::new(d.percent_text()).color(color));
        });
        ui.label(RichText::new(d.box_text()).small().color(theme::FG_DIM));
    });
}
