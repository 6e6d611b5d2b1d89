// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 主界面 (App)
///
/// 每帧顺序: 收取工作线程事件 → 绘制 egui → 处理按钮/快捷键 → 执行延迟任务
///
/// 图片检测和模型加载都推迟到下一帧执行,先让 "Processing..." 状态画出来。
use std::path::PathBuf;
use std::sync::Arc;

use crossbeam_channel::TryRecvError;
use egui_macroquad::egui::{self, RichText};
use image::RgbaImage;
use macroquad::input::{is_key_pressed, KeyCode};

use super::control_panel::{ControlPanel, ControlPanelActions};
use super::dialogs;
use super::results_panel::ResultsPanel;
use super::state::AppState;
use super::theme;
use crate::annotate::Annotator;
use crate::config::{AppSettings, Args};
use crate::error::DetectorError;
use crate::media::{fit_within, load_image, save_image, MediaKind, MediaSource, VideoDevice};
use crate::gen_time_string;
use crate::models::{load_model, ModelConfig, SharedModel};
use crate::report::DetectionReport;
use crate::worker::{VideoWorker, WorkerEvent};

/// 视频时结果列表每隔多少帧刷新一次
const RESULTS_REFRESH_FRAMES: u64 = 10;

/// 画布四周留白
const CANVAS_MARGIN: f32 = 20.0;

pub const CANVAS_PLACEHOLDER: &str =
    "No image loaded\n\nClick 'Image', 'Video', or 'Webcam' to start";

/// 推迟到下一帧的任务
#[derive(Debug, Clone, PartialEq)]
enum Job {
    LoadModel(PathBuf),
    AskForModel(PathBuf),
    DetectImage(PathBuf),
}

#[derive(Debug)]
struct Deferred {
    job: Job,
    ready: bool,
}

pub struct App {
    args: Args,
    settings: AppSettings,
    state: AppState,
    control_panel: ControlPanel,

    model: Option<SharedModel>,
    annotator: Arc<Annotator>,
    worker: Option<VideoWorker>,

    // 画布
    display: Option<RgbaImage>,
    texture: Option<egui::TextureHandle>,
    texture_dirty: bool,

    // 结果
    report: Option<DetectionReport>,
    latest_report: Option<DetectionReport>,
    last_result: Option<RgbaImage>,

    deferred: Option<Deferred>,
}

impl App {
    pub fn new(args: Args, settings: AppSettings) -> Self {
        let thresholds = args.startup_thresholds(&settings);
        let font_path = args.font.clone().or_else(|| settings.font_path.clone());
        let annotator = Arc::new(Annotator::load(font_path.as_deref()));
        if !annotator.has_font() {
            tracing::warn!("⚠️ 未找到标签字体,只绘制检测框");
        }

        egui_macroquad::cfg(theme::set_style);

        let mut state = AppState::new();
        let model_path = args.startup_model(&settings);
        let job = if model_path.exists() {
            state.model_loading();
            Job::LoadModel(model_path)
        } else {
            tracing::warn!("⚠️ 模型文件不存在: {}", model_path.display());
            state.model_missing(&model_path);
            Job::AskForModel(model_path)
        };

        Self {
            args,
            settings,
            state,
            control_panel: ControlPanel::new(thresholds),
            model: None,
            annotator,
            worker: None,
            display: None,
            texture: None,
            texture_dirty: false,
            report: None,
            latest_report: None,
            last_result: None,
            deferred: Some(Deferred { job, ready: false }),
        }
    }

    /// 一帧
    pub fn frame(&mut self) {
        self.poll_worker();

        let (actions, wants_keyboard) = self.draw_egui();
        self.handle_actions(actions);
        if !wants_keyboard {
            self.handle_input();
        }

        self.run_deferred();
    }

    fn schedule(&mut self, job: Job) {
        self.deferred = Some(Deferred { job, ready: false });
    }

    fn run_deferred(&mut self) {
        let Some(deferred) = self.deferred.as_mut() else {
            return;
        };
        if !deferred.ready {
            deferred.ready = true;
            return;
        }
        let Some(Deferred { job, .. }) = self.deferred.take() else {
            return;
        };
        match job {
            Job::LoadModel(path) => self.load(path),
            Job::AskForModel(path) => self.ask_for_model(path),
            Job::DetectImage(path) => self.detect_image(path),
        }
    }

    // ---- 模型 ----

    fn ask_for_model(&mut self, missing: PathBuf) {
        let body = format!(
            "Model file '{}' not found.\n\nWould you like to select a model file now?",
            missing.display()
        );
        if dialogs::ask_yes_no("Model Not Found", &body) {
            self.pick_model();
        }
    }

    fn pick_model(&mut self) {
        if let Some(path) = dialogs::pick_model(self.settings.last_dir.as_deref()) {
            self.settings.remember_dir(&path);
            self.state.model_loading();
            self.schedule(Job::LoadModel(path));
        }
    }

    /// 加载成功才替换当前模型
    fn load(&mut self, path: PathBuf) {
        let config = ModelConfig::from_args(&self.args, &path, self.control_panel.thresholds());
        match load_model(config) {
            Ok(model) => {
                tracing::info!("✅ 模型加载成功: {}", path.display());
                self.model = Some(model);
                self.state.model_loaded(&path);
                self.settings.last_model = Some(path);
            }
            Err(e) => {
                self.state.model_failed();
                dialogs::show_error(&e);
            }
        }
    }

    fn reload_model(&mut self) {
        match self.state.reload_target() {
            Ok(path) => {
                tracing::info!("🔄 重新加载模型: {}", path.display());
                self.state.model_loading();
                self.schedule(Job::LoadModel(path));
            }
            Err(e) => dialogs::show_error(&e),
        }
    }

    // ---- 输入源 ----

    fn pick_file(&mut self, kind: MediaKind) {
        if !self.state.has_model() {
            dialogs::show_error(&DetectorError::NoModel);
            return;
        }
        let start = self.settings.last_dir.clone();
        let picked = match kind {
            MediaKind::Image => dialogs::pick_image(start.as_deref()),
            MediaKind::Video => dialogs::pick_video(start.as_deref()),
        };
        let Some(path) = picked else {
            return;
        };
        self.settings.remember_dir(&path);
        self.select_source(MediaSource::from_picked(path, kind));
    }

    fn pick_webcam(&mut self, device: VideoDevice) {
        self.select_source(MediaSource::Webcam {
            index: device.index,
            name: device.name,
        });
    }

    fn select_source(&mut self, source: MediaSource) {
        let preview = match &source {
            MediaSource::Image(path) => Some(path.clone()),
            _ => None,
        };
        if let Err(e) = self.state.select_source(source) {
            dialogs::show_error(&e);
            return;
        }
        tracing::info!("📂 输入源: {}", self.state.source_label().0);

        match preview {
            Some(path) => match load_image(&path) {
                Ok(image) => self.show_image(image.to_rgba8()),
                Err(e) => {
                    tracing::error!("❌ 图片读取失败: {:#}", e);
                    dialogs::show_error(&DetectorError::Display(format!("{:#}", e)));
                }
            },
            None => self.clear_canvas(),
        }
    }

    // ---- 检测 ----

    fn detect(&mut self) {
        let source = match self.state.begin_detection() {
            Ok(source) => source,
            Err(e) => {
                dialogs::show_error(&e);
                return;
            }
        };
        match source {
            MediaSource::Image(path) => self.schedule(Job::DetectImage(path)),
            stream => self.start_worker(stream),
        }
    }

    fn detect_image(&mut self, path: PathBuf) {
        let outcome = self.run_image(&path);
        match outcome {
            Ok((annotated, report)) => {
                tracing::info!("🔍 检测完成: {} 个目标", report.total());
                self.state.image_finished(&report);
                self.report = Some(report);
                self.last_result = Some(annotated.clone());
                self.show_image(annotated);
            }
            Err(e) => {
                tracing::error!("❌ {}", e);
                self.state.detection_failed();
                dialogs::show_error(&e);
            }
        }
    }

    fn run_image(
        &self,
        path: &std::path::Path,
    ) -> Result<(RgbaImage, DetectionReport), DetectorError> {
        let model = self.model.as_ref().ok_or(DetectorError::NoModel)?;
        let image = load_image(path).map_err(DetectorError::detection)?;
        let mut model = model
            .lock()
            .map_err(|_| DetectorError::Detection("model lock poisoned".to_string()))?;
        let result = model
            .predict(&image, self.control_panel.thresholds())
            .map_err(DetectorError::detection)?;
        let annotated = self.annotator.annotate(&image, &result, model.names());
        let report = DetectionReport::from_result(&result, model.names(), None);
        Ok((annotated, report))
    }

    fn start_worker(&mut self, source: MediaSource) {
        let Some(model) = self.model.clone() else {
            self.state.detection_failed();
            dialogs::show_error(&DetectorError::NoModel);
            return;
        };
        self.report = None;
        self.latest_report = None;
        match VideoWorker::spawn(
            source,
            model,
            self.annotator.clone(),
            self.control_panel.thresholds(),
        ) {
            Ok(worker) => self.worker = Some(worker),
            Err(e) => {
                tracing::error!("❌ {}", e);
                self.state.detection_failed();
                dialogs::show_error(&e);
            }
        }
    }

    fn stop(&mut self) {
        if self.state.request_stop() {
            if let Some(worker) = &self.worker {
                tracing::info!("⏹ 请求停止视频处理");
                worker.stop();
            }
        }
    }

    /// 收取工作线程事件 (不阻塞)
    fn poll_worker(&mut self) {
        let mut events = Vec::new();
        let mut disconnected = false;
        if let Some(worker) = &self.worker {
            loop {
                match worker.events().try_recv() {
                    Ok(event) => events.push(event),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        disconnected = true;
                        break;
                    }
                }
            }
        }

        let mut finished = false;
        for event in events {
            match event {
                WorkerEvent::Frame(update) => {
                    self.state.frame_processed(&update.report);
                    if update.frame_num % RESULTS_REFRESH_FRAMES == 0 || self.report.is_none() {
                        self.report = Some(update.report.clone());
                    }
                    self.latest_report = Some(update.report);
                    self.last_result = Some(update.image.clone());
                    self.show_image(update.image);
                }
                WorkerEvent::Finished {
                    frames,
                    total_detections,
                    stopped,
                } => {
                    finished = true;
                    self.state.video_finished(frames, total_detections, stopped);
                    if let Some(report) = self.latest_report.take() {
                        self.report = Some(report);
                    }
                    if !stopped {
                        dialogs::show_info(
                            "Complete",
                            &format!(
                                "Video processing complete!\nFrames: {}\nTotal detections: {}",
                                frames, total_detections
                            ),
                        );
                    }
                }
                WorkerEvent::Failed(e) => {
                    finished = true;
                    self.state.detection_failed();
                    dialogs::show_error(&e);
                }
            }
        }

        if !finished && disconnected {
            // 线程没发出结束事件就退出了
            finished = true;
            self.state.detection_failed();
            dialogs::show_error(&DetectorError::Detection(
                "video worker exited unexpectedly".to_string(),
            ));
        }

        if finished {
            if let Some(mut worker) = self.worker.take() {
                worker.join();
            }
        }
    }

    fn update_thresholds(&mut self) {
        let thresholds = self.control_panel.thresholds();
        self.settings.set_thresholds(thresholds);
        if let Some(worker) = &self.worker {
            worker.update_thresholds(thresholds);
        }
        if let Some(model) = &self.model {
            // 视频运行时模型由工作线程持有锁,下一帧再生效
            if self.worker.is_none() {
                if let Ok(mut model) = model.try_lock() {
                    model.set_conf(thresholds.conf);
                    model.set_iou(thresholds.iou);
                }
            }
        }
        tracing::debug!("⚙️ 阈值: conf={:.2} iou={:.2}", thresholds.conf, thresholds.iou);
    }

    // ---- 保存 / 清空 ----

    fn save(&mut self) {
        let Some(result) = &self.last_result else {
            dialogs::show_error(&DetectorError::NoResult);
            return;
        };
        let default_name = format!("detection_{}.jpg", gen_time_string(""));
        let Some(path) = dialogs::pick_save_path(self.settings.last_dir.as_deref(), &default_name)
        else {
            return;
        };
        match save_image(&path, result) {
            Ok(written) => {
                self.settings.remember_dir(&written);
                self.state.result_saved(&written);
                dialogs::show_info(
                    "Success",
                    &format!("Result saved to:\n{}", written.display()),
                );
            }
            Err(e) => {
                let err = DetectorError::save(&path, e);
                tracing::error!("❌ {}", err);
                dialogs::show_error(&err);
            }
        }
    }

    fn clear(&mut self) {
        match self.state.clear() {
            Ok(()) => {
                self.clear_canvas();
                self.report = None;
                self.latest_report = None;
                self.last_result = None;
            }
            Err(e) => dialogs::show_error(&e),
        }
    }

    // ---- 画布 ----

    fn show_image(&mut self, image: RgbaImage) {
        self.display = Some(image);
        self.texture_dirty = true;
    }

    fn clear_canvas(&mut self) {
        self.display = None;
        self.texture = None;
        self.texture_dirty = false;
    }

    fn handle_actions(&mut self, actions: ControlPanelActions) {
        if actions.thresholds_changed.is_some() {
            self.update_thresholds();
        }
        if actions.load_model {
            self.pick_model();
        }
        if actions.reload_model {
            self.reload_model();
        }
        if actions.pick_image {
            self.pick_file(MediaKind::Image);
        }
        if actions.pick_video {
            self.pick_file(MediaKind::Video);
        }
        if let Some(device) = actions.pick_webcam {
            self.pick_webcam(device);
        }
        if actions.detect {
            self.detect();
        }
        if actions.stop {
            self.stop();
        }
        if actions.clear {
            self.clear();
        }
        if actions.save {
            self.save();
        }
    }

    /// 快捷键: 空格检测, Esc 停止
    pub fn handle_input(&mut self) {
        if is_key_pressed(KeyCode::Space) && self.state.can_detect() {
            self.detect();
        }
        if is_key_pressed(KeyCode::Escape) {
            self.stop();
        }
    }

    /// 绘制界面,返回 (按钮操作, egui 是否占用键盘)
    fn draw_egui(&mut self) -> (ControlPanelActions, bool) {
        let mut actions = ControlPanelActions::default();
        let mut wants_keyboard = false;

        let Self {
            state,
            control_panel,
            display,
            texture,
            texture_dirty,
            report,
            ..
        } = self;

        egui_macroquad::ui(|ctx| {
            wants_keyboard = ctx.wants_keyboard_input();

            if *texture_dirty {
                if let Some(image) = display.as_ref() {
                    let color_image = egui::ColorImage::from_rgba_unmultiplied(
                        [image.width() as usize, image.height() as usize],
                        image.as_raw(),
                    );
                    match texture {
                        Some(handle) => handle.set(color_image, egui::TextureOptions::LINEAR),
                        None => {
                            *texture = Some(ctx.load_texture(
                                "canvas",
                                color_image,
                                egui::TextureOptions::LINEAR,
                            ))
                        }
                    }
                }
                *texture_dirty = false;
            }

            egui::TopBottomPanel::bottom("status_bar")
                .frame(
                    egui::Frame::NONE
                        .fill(theme::BG_LIGHT)
                        .inner_margin(egui::Margin::symmetric(10, 4)),
                )
                .show(ctx, |ui| {
                    ui.horizontal(|ui| {
                        let (message, tone) = state.status();
                        ui.colored_label(theme::tone_color(tone), message);
                        if state.is_processing() {
                            ui.with_layout(
                                egui::Layout::right_to_left(egui::Align::Center),
                                |ui| {
                                    ui.add(egui::Spinner::new().color(theme::ACCENT));
                                },
                            );
                        }
                    });
                });

            egui::SidePanel::right("results_panel")
                .resizable(true)
                .default_width(360.0)
                .min_width(280.0)
                .frame(
                    egui::Frame::NONE
                        .fill(theme::BG)
                        .inner_margin(egui::Margin::same(10)),
                )
                .show(ctx, |ui| {
                    ResultsPanel::ui(ui, report.as_ref());
                });

            egui::CentralPanel::default()
                .frame(
                    egui::Frame::NONE
                        .fill(theme::BG)
                        .inner_margin(egui::Margin::same(10)),
                )
                .show(ctx, |ui| {
                    actions = control_panel.ui(ui, state);
                    ui.add_space(6.0);

                    theme::card_frame(theme::BG_LIGHT).show(ui, |ui| {
                        ui.strong("📺 Display");
                        let avail = ui.available_size();
                        ui.set_min_size(avail);
                        draw_canvas(ui, texture.as_ref(), avail);
                    });
                });
        });

        egui_macroquad::draw();
        (actions, wants_keyboard)
    }

    /// 退出前停止工作线程并保存设置
    pub fn shutdown(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.stop();
            worker.join();
        }
        self.settings.set_thresholds(self.control_panel.thresholds());
        if let Err(e) = self.settings.save(&self.args.settings) {
            tracing::warn!("⚠️ {:#}", e);
        }
        tracing::info!("👋 退出");
    }
}

/// 图片等比缩放到画布内 (四周留白)
fn draw_canvas(ui: &mut egui::Ui, texture: Option<&egui::TextureHandle>, avail: egui::Vec2) {
    let max_w = (avail.x - CANVAS_MARGIN).max(1.0) as u32;
    let max_h = (avail.y - CANVAS_MARGIN).max(1.0) as u32;

    ui.centered_and_justified(|ui| match texture {
        Some(texture) => {
            let [w, h] = texture.size();
            let (fw, fh) = fit_within(w as u32, h as u32, max_w, max_h);
            ui.add(
                egui::Image::from_texture(egui::load::SizedTexture::new(
                    texture.id(),
                    egui::vec2(fw as f32, fh as f32),
                ))
                .fit_to_exact_size(egui::vec2(fw as f32, fh as f32)),
            );
        }
        None => {
            ui.label(RichText::new(CANVAS_PLACEHOLDER).color(theme::FG_DIM));
        }
    });
}

impl Drop for App {
    fn drop(&mut self) {
        if let Some(worker) = &self.worker {
            worker.stop();
        }
    }
}
