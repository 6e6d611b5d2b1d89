// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 模型统一接口与实现
///
/// # 架构说明
///
/// 界面层只通过 [`Model`] trait 调用推理,把它当作外部检测库:
/// 传入图片与阈值,取回检测框。
///
/// ## Model Trait
/// 统一的模型接口,定义标准流程: preprocess → run → postprocess
///
/// ```text
/// 原始图片 → preprocess → ndarray张量
///          ↓
///     推理引擎 run
///          ↓
///     原始输出 → postprocess → 检测结果
/// ```
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use image::DynamicImage;
use ndarray::{Array, IxDyn};

use crate::config::Thresholds;
use crate::error::DetectorError;
use crate::{DetectionResult, OrtEP};

pub mod yolov8;

pub use yolov8::{YOLOv8, YOLOv8Config, YOLOv8Postprocessor};

/// 界面线程与视频工作线程共享的模型
pub type SharedModel = Arc<Mutex<Box<dyn Model>>>;

pub trait Model: Send {
    /// 预处理: 图片 → NCHW 张量
    fn preprocess(&mut self, images: &[DynamicImage]) -> Result<Vec<Array<f32, IxDyn>>>;

    /// 推理: 执行模型前向传播
    fn run(&mut self, xs: Vec<Array<f32, IxDyn>>, profile: bool) -> Result<Vec<Array<f32, IxDyn>>>;

    /// 后处理: 原始输出 → 检测结果 (坐标还原到原图)
    fn postprocess(
        &self,
        xs: Vec<Array<f32, IxDyn>>,
        xs0: &[DynamicImage],
    ) -> Result<Vec<DetectionResult>>;

    /// 完整的推理流程: preprocess → run → postprocess
    fn forward(&mut self, images: &[DynamicImage]) -> Result<Vec<DetectionResult>> {
        let xs = self.preprocess(images)?;
        let ys = self.run(xs, false)?;
        self.postprocess(ys, images)
    }

    /// 单张图片推理,阈值在本次调用前生效
    fn predict(&mut self, image: &DynamicImage, thresholds: Thresholds) -> Result<DetectionResult> {
        self.set_conf(thresholds.conf);
        self.set_iou(thresholds.iou);
        let ys = self.forward(std::slice::from_ref(image))?;
        Ok(ys.into_iter().next().unwrap_or_default())
    }

    /// 类别名 (按 class id 索引)
    fn names(&self) -> &[String];

    fn conf(&self) -> f32;

    fn set_conf(&mut self, val: f32);

    fn iou(&self) -> f32;

    fn set_iou(&mut self, val: f32);

    /// 打印模型信息
    fn summary(&self);
}

/// 模型加载参数
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub model: PathBuf,
    pub ep: OrtEP,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub nc: Option<u32>,
    pub thresholds: Thresholds,
    pub profile: bool,
}

impl ModelConfig {
    pub fn from_args(args: &crate::Args, model: &Path, thresholds: Thresholds) -> Self {
        Self {
            model: model.to_path_buf(),
            ep: args.ep(),
            width: args.width,
            height: args.height,
            nc: args.nc,
            thresholds,
            profile: args.profile,
        }
    }
}

/// 加载模型 (加载/重新加载按钮共用)
pub fn load_model(config: ModelConfig) -> std::result::Result<SharedModel, DetectorError> {
    let path = config.model.clone();
    tracing::info!("📦 加载模型: {}", path.display());
    match YOLOv8::new(config) {
        Ok(model) => {
            model.summary();
            let boxed: Box<dyn Model> = Box::new(model);
            Ok(Arc::new(Mutex::new(boxed)))
        }
        Err(e) => {
            tracing::error!("❌ 模型加载失败: {:#}", e);
            Err(DetectorError::model_load(&path, e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Thresholds;

    #[test]
    fn test_missing_model_file_is_load_error() {
        let config = ModelConfig {
            model: PathBuf::from("definitely/not/here.onnx"),
            ep: OrtEP::CPU,
            width: None,
            height: None,
            nc: None,
            thresholds: Thresholds::default(),
            profile: false,
        };
        match load_model(config) {
            Err(DetectorError::ModelLoad { path, message }) => {
                assert_eq!(path, PathBuf::from("definitely/not/here.onnx"));
                assert!(message.contains("model file not found"));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("model should not load"),
        }
    }
}
