// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 配置: 命令行参数 + JSON持久化的界面设置

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::ort_backend::OrtEP;

/// 启动时自动加载的模型
pub const DEFAULT_MODEL_PATH: &str = "models/default_yolo.onnx";

/// 滑块范围
pub const MIN_THRESHOLD: f32 = 0.1;
pub const MAX_THRESHOLD: f32 = 0.9;

pub const DEFAULT_CONF: f32 = 0.25;
pub const DEFAULT_IOU: f32 = 0.45;

/// YOLO 目标检测桌面程序参数
#[derive(Parser, Clone, Debug)]
#[command(author, version, about = "YOLO 目标检测桌面程序", long_about = None)]
pub struct Args {
    /// ONNX 模型路径 (默认: 上次使用的模型或 models/default_yolo.onnx)
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// 置信度阈值 (0.1 ~ 0.9)
    #[arg(long)]
    pub conf: Option<f32>,

    /// NMS IoU阈值 (0.1 ~ 0.9)
    #[arg(long)]
    pub iou: Option<f32>,

    /// 使用 CUDA
    #[arg(long)]
    pub cuda: bool,

    /// 使用 TensorRT
    #[arg(long)]
    pub trt: bool,

    /// GPU 设备号
    #[arg(long, default_value_t = 0)]
    pub device_id: i32,

    /// 动态输入时的推理宽度
    #[arg(long)]
    pub width: Option<u32>,

    /// 动态输入时的推理高度
    #[arg(long)]
    pub height: Option<u32>,

    /// 类别数 (模型元数据缺失时使用)
    #[arg(long)]
    pub nc: Option<u32>,

    /// 打印各阶段耗时
    #[arg(long)]
    pub profile: bool,

    /// 界面设置文件
    #[arg(long, default_value = "detector_settings.json")]
    pub settings: PathBuf,

    /// 日志级别 (RUST_LOG 优先)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// JSON 格式日志
    #[arg(long)]
    pub log_json: bool,

    /// 标签字体 (TTF/OTF)
    #[arg(long)]
    pub font: Option<PathBuf>,
}

impl Args {
    pub fn ep(&self) -> OrtEP {
        if self.trt {
            OrtEP::Trt(self.device_id)
        } else if self.cuda {
            OrtEP::CUDA(self.device_id)
        } else {
            OrtEP::CPU
        }
    }

    /// 启动模型: 命令行 > 设置文件 > 默认路径
    pub fn startup_model(&self, settings: &AppSettings) -> PathBuf {
        self.model
            .clone()
            .or_else(|| settings.last_model.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH))
    }

    /// 命令行阈值覆盖设置文件
    pub fn startup_thresholds(&self, settings: &AppSettings) -> Thresholds {
        let saved = settings.thresholds();
        Thresholds::new(
            self.conf.unwrap_or(saved.conf),
            self.iou.unwrap_or(saved.iou),
        )
    }
}

/// 推理阈值,原样传给模型
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub conf: f32,
    pub iou: f32,
}

impl Thresholds {
    pub fn new(conf: f32, iou: f32) -> Self {
        Self {
            conf: clamp_threshold(conf),
            iou: clamp_threshold(iou),
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            conf: DEFAULT_CONF,
            iou: DEFAULT_IOU,
        }
    }
}

fn clamp_threshold(v: f32) -> f32 {
    if v.is_nan() {
        return MIN_THRESHOLD;
    }
    v.clamp(MIN_THRESHOLD, MAX_THRESHOLD)
}

/// 界面设置 - 通过JSON文件保存
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub last_model: Option<PathBuf>,
    pub conf_threshold: f32,
    pub iou_threshold: f32,
    pub last_dir: Option<PathBuf>, // 文件对话框的起始目录
    pub font_path: Option<PathBuf>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            last_model: None,
            conf_threshold: DEFAULT_CONF,
            iou_threshold: DEFAULT_IOU,
            last_dir: None,
            font_path: None,
        }
    }
}

impl AppSettings {
    /// 从JSON文件加载配置
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str::<AppSettings>(&json) {
                Ok(mut settings) => {
                    tracing::info!("✅ 配置已从 {} 加载", path.display());
                    settings.set_thresholds(settings.thresholds());
                    settings
                }
                Err(e) => {
                    tracing::warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("📝 配置文件不存在,创建默认配置...");
                let settings = Self::default();
                if let Err(e) = settings.save(path) {
                    tracing::warn!("⚠️  {:#}", e);
                }
                settings
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("序列化配置失败")?;
        fs::write(path, json).with_context(|| format!("保存配置失败: {}", path.display()))?;
        tracing::debug!("💾 配置已保存到 {}", path.display());
        Ok(())
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds::new(self.conf_threshold, self.iou_threshold)
    }

    pub fn set_thresholds(&mut self, thresholds: Thresholds) {
        let t = Thresholds::new(thresholds.conf, thresholds.iou);
        self.conf_threshold = t.conf;
        self.iou_threshold = t.iou;
    }

    /// 记住对话框所在目录
    pub fn remember_dir(&mut self, file: &Path) {
        if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.last_dir = Some(parent.to_path_buf());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds_are_clamped_to_slider_range() {
        let t = Thresholds::new(0.0, 1.5);
        assert_eq!(t.conf, MIN_THRESHOLD);
        assert_eq!(t.iou, MAX_THRESHOLD);

        let t = Thresholds::new(0.3, 0.5);
        assert_eq!(t, Thresholds { conf: 0.3, iou: 0.5 });
        assert_eq!(Thresholds::new(f32::NAN, 0.5).conf, MIN_THRESHOLD);
    }

    #[test]
    fn test_settings_missing_file_creates_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let settings = AppSettings::load(&path);
        assert_eq!(settings, AppSettings::default());
        assert!(path.exists());
    }

    #[test]
    fn test_settings_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut settings = AppSettings::default();
        settings.last_model = Some(PathBuf::from("models/voc.onnx"));
        settings.set_thresholds(Thresholds::new(0.6, 0.3));
        settings.save(&path).unwrap();

        let loaded = AppSettings::load(&path);
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_settings_malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        assert_eq!(AppSettings::load(&path), AppSettings::default());
    }

    #[test]
    fn test_settings_out_of_range_thresholds_clamped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"conf_threshold": 5.0}"#).unwrap();

        let loaded = AppSettings::load(&path);
        assert_eq!(loaded.conf_threshold, MAX_THRESHOLD);
        assert_eq!(loaded.iou_threshold, DEFAULT_IOU);
    }

    #[test]
    fn test_args_precedence() {
        let args = Args::parse_from(["yolo-detector", "--conf", "0.5"]);
        let mut settings = AppSettings::default();
        settings.last_model = Some(PathBuf::from("models/last.onnx"));
        settings.iou_threshold = 0.7;

        assert_eq!(args.startup_model(&settings), PathBuf::from("models/last.onnx"));
        let t = args.startup_thresholds(&settings);
        assert_eq!(t.conf, 0.5);
        assert_eq!(t.iou, 0.7);

        let args = Args::parse_from(["yolo-detector", "--model", "a.onnx", "--cuda"]);
        assert_eq!(args.startup_model(&settings), PathBuf::from("a.onnx"));
        assert_eq!(args.ep(), OrtEP::CUDA(0));
        assert_eq!(
            Args::parse_from(["yolo-detector"]).startup_model(&AppSettings::default()),
            PathBuf::from(DEFAULT_MODEL_PATH)
        );
    }
}
