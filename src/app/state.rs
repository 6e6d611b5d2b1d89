// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 界面状态机: 按钮可用性与状态栏文字

use std::path::{Path, PathBuf};

use crate::error::DetectorError;
use crate::media::MediaSource;
use crate::report::DetectionReport;

/// 状态栏颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    Normal,
    Dim,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ModelStatus {
    Loading,
    Missing,
    Loaded { name: String, path: PathBuf },
    Failed,
}

#[derive(Debug, Clone)]
pub struct AppState {
    model: ModelStatus,
    load_failed: bool, // 最近一次加载失败, 旧模型仍可用
    source: Option<MediaSource>,
    processing: bool,
    stopping: bool,
    has_result: bool,
    status: String,
    tone: StatusTone,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            model: ModelStatus::Loading,
            load_failed: false,
            source: None,
            processing: false,
            stopping: false,
            has_result: false,
            status: "Ready".to_string(),
            tone: StatusTone::Normal,
        }
    }

    pub fn set_status(&mut self, message: impl Into<String>, tone: StatusTone) {
        self.status = message.into();
        self.tone = tone;
    }

    pub fn status(&self) -> (&str, StatusTone) {
        (&self.status, self.tone)
    }

    // ---- 模型 ----

    pub fn model_loading(&mut self) {
        self.set_status("Loading model...", StatusTone::Warning);
    }

    pub fn model_missing(&mut self, path: &Path) {
        self.model = ModelStatus::Missing;
        self.set_status(
            format!(
                "No model found at '{}'. Please select a model.",
                path.display()
            ),
            StatusTone::Error,
        );
    }

    pub fn model_loaded(&mut self, path: &Path) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.set_status(
            format!("Model loaded successfully: {}", name),
            StatusTone::Success,
        );
        self.model = ModelStatus::Loaded {
            name,
            path: path.to_path_buf(),
        };
        self.load_failed = false;
    }

    /// 加载失败: 之前加载成功的模型继续使用
    pub fn model_failed(&mut self) {
        self.load_failed = true;
        if !self.has_model() {
            self.model = ModelStatus::Failed;
        }
        self.set_status("Error loading model", StatusTone::Error);
    }

    pub fn has_model(&self) -> bool {
        matches!(self.model, ModelStatus::Loaded { .. })
    }

    pub fn model_path(&self) -> Option<&Path> {
        match &self.model {
            ModelStatus::Loaded { path, .. } => Some(path),
            _ => None,
        }
    }

    /// (文字, 是否正常)
    pub fn model_label(&self) -> (String, bool) {
        if self.load_failed {
            return ("❌ Failed to load".to_string(), false);
        }
        match &self.model {
            ModelStatus::Loading => ("Loading...".to_string(), false),
            ModelStatus::Missing => ("No model loaded".to_string(), false),
            ModelStatus::Loaded { name, .. } => (format!("✓ {}", name), true),
            ModelStatus::Failed => ("❌ Failed to load".to_string(), false),
        }
    }

    /// 重新加载当前模型
    pub fn reload_target(&self) -> Result<PathBuf, DetectorError> {
        if self.processing {
            return Err(DetectorError::Busy);
        }
        self.model_path()
            .map(Path::to_path_buf)
            .ok_or(DetectorError::NothingToReload)
    }

    // ---- 输入源 ----

    pub fn select_source(&mut self, source: MediaSource) -> Result<(), DetectorError> {
        if !self.has_model() {
            return Err(DetectorError::NoModel);
        }
        if self.processing {
            return Err(DetectorError::Busy);
        }
        let message = match &source {
            MediaSource::Image(_) => format!("Image loaded: {}", source.display_name()),
            MediaSource::Video(_) => format!("Video loaded: {}", source.display_name()),
            MediaSource::Webcam { .. } => "Webcam selected".to_string(),
        };
        self.set_status(message, StatusTone::Success);
        self.source = Some(source);
        Ok(())
    }

    pub fn source(&self) -> Option<&MediaSource> {
        self.source.as_ref()
    }

    pub fn source_label(&self) -> (String, bool) {
        match &self.source {
            None => ("No file selected".to_string(), false),
            Some(MediaSource::Webcam { name, .. }) => (format!("📹 Webcam ({})", name), true),
            Some(src) => (src.display_name(), true),
        }
    }

    // ---- 检测 ----

    pub fn begin_detection(&mut self) -> Result<MediaSource, DetectorError> {
        if !self.has_model() {
            return Err(DetectorError::NoModel);
        }
        let Some(source) = self.source.clone() else {
            return Err(DetectorError::NoSource);
        };
        if self.processing {
            return Err(DetectorError::Busy);
        }
        self.processing = true;
        self.stopping = false;
        let message = if source.is_stream() {
            "Processing video..."
        } else {
            "Processing image..."
        };
        self.set_status(message, StatusTone::Warning);
        Ok(source)
    }

    /// 只对视频/摄像头有效
    pub fn request_stop(&mut self) -> bool {
        if !self.can_stop() {
            return false;
        }
        self.stopping = true;
        self.set_status("Stopping...", StatusTone::Warning);
        true
    }

    pub fn frame_processed(&mut self, report: &DetectionReport) {
        self.has_result = true;
        if !self.stopping {
            self.set_status(report.status_text(), StatusTone::Warning);
        }
    }

    pub fn image_finished(&mut self, report: &DetectionReport) {
        self.processing = false;
        self.has_result = true;
        self.set_status(report.status_text(), StatusTone::Success);
    }

    pub fn video_finished(&mut self, frames: u64, total_detections: usize, stopped: bool) {
        self.processing = false;
        self.stopping = false;
        if stopped {
            self.set_status("Video processing stopped", StatusTone::Warning);
        } else {
            self.set_status(
                format!(
                    "✓ Video complete: {} frames, {} total detections",
                    frames, total_detections
                ),
                StatusTone::Success,
            );
        }
    }

    pub fn detection_failed(&mut self) {
        let message = match &self.source {
            Some(src) if src.is_stream() => "Video processing failed",
            _ => "Detection failed",
        };
        self.processing = false;
        self.stopping = false;
        self.set_status(message, StatusTone::Error);
    }

    pub fn result_saved(&mut self, path: &Path) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.set_status(format!("✓ Result saved: {}", name), StatusTone::Success);
    }

    pub fn clear(&mut self) -> Result<(), DetectorError> {
        if self.processing {
            return Err(DetectorError::Busy);
        }
        self.source = None;
        self.has_result = false;
        self.set_status("Display cleared", StatusTone::Dim);
        Ok(())
    }

    // ---- 按钮可用性 ----

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn has_result(&self) -> bool {
        self.has_result
    }

    pub fn can_detect(&self) -> bool {
        self.has_model() && self.source.is_some() && !self.processing
    }

    pub fn can_stop(&self) -> bool {
        self.processing
            && !self.stopping
            && self.source.as_ref().map(|s| s.is_stream()).unwrap_or(false)
    }

    pub fn can_save(&self) -> bool {
        self.has_result && !self.processing
    }

    pub fn can_reload(&self) -> bool {
        self.has_model() && !self.processing
    }

    pub fn can_select_source(&self) -> bool {
        !self.processing
    }

    pub fn can_load_model(&self) -> bool {
        !self.processing
    }

    pub fn can_clear(&self) -> bool {
        !self.processing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::DetectionReport;
    use crate::DetectionResult;

    fn loaded() -> AppState {
        let mut state = AppState::new();
        state.model_loaded(Path::new("models/default_yolo.onnx"));
        state
    }

    fn image() -> MediaSource {
        MediaSource::Image(PathBuf::from("photos/cat.jpg"))
    }

    fn video() -> MediaSource {
        MediaSource::Video(PathBuf::from("clips/street.mp4"))
    }

    #[test]
    fn test_source_requires_model() {
        let mut state = AppState::new();
        assert!(matches!(state.select_source(image()), Err(DetectorError::NoModel)));
        assert!(!state.can_detect());
        assert_eq!(state.source_label(), ("No file selected".to_string(), false));

        let mut state = loaded();
        assert_eq!(state.model_label(), ("✓ default_yolo.onnx".to_string(), true));
        state.select_source(image()).unwrap();
        assert!(state.can_detect());
        assert_eq!(state.status(), ("Image loaded: cat.jpg", StatusTone::Success));
    }

    #[test]
    fn test_detect_guards() {
        let mut state = AppState::new();
        assert!(matches!(state.begin_detection(), Err(DetectorError::NoModel)));

        let mut state = loaded();
        assert!(matches!(state.begin_detection(), Err(DetectorError::NoSource)));
    }

    #[test]
    fn test_image_detection_cycle() {
        let mut state = loaded();
        state.select_source(image()).unwrap();
        assert!(!state.can_save());

        assert_eq!(state.begin_detection().unwrap(), image());
        assert!(state.is_processing());
        assert!(!state.can_detect());
        assert!(!state.can_stop()); // 图片不能停止
        assert!(!state.can_select_source());
        assert!(!state.can_reload());

        let report = DetectionReport::from_result(&DetectionResult::default(), &[], None);
        state.image_finished(&report);
        assert!(state.can_detect());
        assert!(state.can_save());
        assert_eq!(
            state.status(),
            ("✓ Detection complete: 0 objects found", StatusTone::Success)
        );
    }

    #[test]
    fn test_video_stop_cycle() {
        let mut state = loaded();
        state.select_source(video()).unwrap();
        state.begin_detection().unwrap();
        assert!(state.can_stop());
        assert!(matches!(state.select_source(image()), Err(DetectorError::Busy)));

        assert!(state.request_stop());
        assert!(!state.can_stop());
        assert_eq!(state.status().0, "Stopping...");

        state.video_finished(10, 4, true);
        assert!(!state.is_processing());
        assert!(state.can_detect());
        assert_eq!(state.status(), ("Video processing stopped", StatusTone::Warning));
    }

    #[test]
    fn test_video_complete_status() {
        let mut state = loaded();
        state.select_source(video()).unwrap();
        state.begin_detection().unwrap();

        let report = DetectionReport::from_result(&DetectionResult::default(), &[], Some(1));
        state.frame_processed(&report);
        assert_eq!(state.status().0, "Frame 1 - 0 objects detected");

        state.video_finished(120, 37, false);
        assert_eq!(
            state.status(),
            ("✓ Video complete: 120 frames, 37 total detections", StatusTone::Success)
        );
        assert!(state.can_save());
    }

    #[test]
    fn test_failure_resets_processing() {
        let mut state = loaded();
        state.select_source(video()).unwrap();
        state.begin_detection().unwrap();
        state.detection_failed();
        assert!(!state.is_processing());
        assert!(state.can_detect());
        assert_eq!(state.status(), ("Video processing failed", StatusTone::Error));
    }

    #[test]
    fn test_reload_and_model_failure() {
        let state = AppState::new();
        assert!(matches!(state.reload_target(), Err(DetectorError::NothingToReload)));

        let state = loaded();
        assert_eq!(
            state.reload_target().unwrap(),
            PathBuf::from("models/default_yolo.onnx")
        );

        let mut state = AppState::new();
        state.model_failed();
        assert!(!state.has_model());
        assert!(!state.can_reload());
        assert_eq!(state.model_label(), ("❌ Failed to load".to_string(), false));
    }

    #[test]
    fn test_failed_load_keeps_previous_model() {
        let mut state = loaded();
        state.model_loading();
        state.model_failed();

        assert_eq!(state.model_label(), ("❌ Failed to load".to_string(), false));
        assert_eq!(state.status(), ("Error loading model", StatusTone::Error));
        assert!(state.has_model());
        assert!(state.can_reload());
        assert_eq!(
            state.reload_target().unwrap(),
            PathBuf::from("models/default_yolo.onnx")
        );

        state.select_source(image()).unwrap();
        assert!(state.can_detect());

        // 再次加载成功后标签恢复
        state.model_loaded(Path::new("models/other.onnx"));
        assert_eq!(state.model_label(), ("✓ other.onnx".to_string(), true));
    }

    #[test]
    fn test_clear() {
        let mut state = loaded();
        state.select_source(image()).unwrap();
        state.begin_detection().unwrap();
        assert!(matches!(state.clear(), Err(DetectorError::Busy)));

        let report = DetectionReport::from_result(&DetectionResult::default(), &[], None);
        state.image_finished(&report);
        state.clear().unwrap();
        assert!(state.source().is_none());
        assert!(!state.can_save());
        assert!(!state.can_detect());
        assert!(state.has_model());
        assert_eq!(state.status(), ("Display cleared", StatusTone::Dim));
    }
}
