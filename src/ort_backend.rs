// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! ONNX Runtime 推理后端
//!
//! 负责: 会话构建、执行器选择 (CPU/CUDA/TensorRT)、输入尺寸与类别名读取

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use ndarray::{Array, IxDyn};
use once_cell::sync::Lazy;
use ort::execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider};
use ort::inputs;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use regex::Regex;

/// 动态输入且未指定尺寸时的默认推理尺寸
pub const DEFAULT_IMAGE_SIZE: u32 = 640;

/// Pascal VOC 类别 (20类模型缺少元数据时使用)
pub const VOC_CLASSES: [&str; 20] = [
    "aeroplane",
    "bicycle",
    "bird",
    "boat",
    "bottle",
    "bus",
    "car",
    "cat",
    "chair",
    "cow",
    "diningtable",
    "dog",
    "horse",
    "motorbike",
    "person",
    "pottedplant",
    "sheep",
    "sofa",
    "train",
    "tvmonitor",
];

// ultralytics 导出的 names 元数据: {0: 'person', 1: 'bicycle', ...}
static NAMES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(\d+)\s*:\s*(?:'([^']*)'|"([^"]*)")"#).expect("valid regex"));

/// 执行器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrtEP {
    CPU,
    CUDA(i32),
    Trt(i32),
}

#[derive(Debug, Clone)]
pub struct OrtConfig {
    pub f: PathBuf,
    pub ep: OrtEP,
    pub image_size: (Option<u32>, Option<u32>), // (height, width)
    pub intra_threads: usize,
}

pub struct OrtBackend {
    session: Session,
    ep: OrtEP,
    input_name: String,
    height: u32,
    width: u32,
    height_dynamic: bool,
    width_dynamic: bool,
    nc: Option<u32>,
    names: Option<Vec<String>>,
    author: Option<String>,
    version: Option<String>,
}

impl OrtBackend {
    pub fn build(config: OrtConfig) -> Result<Self> {
        if !config.f.is_file() {
            bail!("model file not found: {}", config.f.display());
        }

        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(config.intra_threads)?;

        // GPU 执行器可选: 注册失败时继续使用 CPU
        let ep = match config.ep {
            OrtEP::CPU => OrtEP::CPU,
            OrtEP::CUDA(device_id) => {
                let cuda = CUDAExecutionProvider::default()
                    .with_device_id(device_id)
                    .build();
                match builder.clone().with_execution_providers([cuda]) {
                    Ok(b) => {
                        builder = b;
                        config.ep
                    }
                    Err(e) => {
                        tracing::warn!("⚠️ CUDA 不可用,回退到 CPU: {}", e);
                        OrtEP::CPU
                    }
                }
            }
            OrtEP::Trt(device_id) => {
                let trt = TensorRTExecutionProvider::default()
                    .with_device_id(device_id)
                    .build();
                match builder.clone().with_execution_providers([trt]) {
                    Ok(b) => {
                        builder = b;
                        config.ep
                    }
                    Err(e) => {
                        tracing::warn!("⚠️ TensorRT 不可用,回退到 CPU: {}", e);
                        OrtEP::CPU
                    }
                }
            }
        };

        let session = builder
            .commit_from_file(&config.f)
            .with_context(|| format!("failed to build session from {}", config.f.display()))?;

        // 输入: NCHW
        let input = session.inputs.first().context("model has no inputs")?;
        let input_name = input.name.clone();
        let input_dims: Vec<i64> = input
            .input_type
            .tensor_shape()
            .map(|s| s.to_vec())
            .unwrap_or_default();
        if input_dims.len() != 4 {
            bail!(
                "expected a 4-D image input (NCHW), got shape {:?}",
                input_dims
            );
        }
        let (height, height_dynamic) =
            resolve_dim(input_dims[2], config.image_size.0, DEFAULT_IMAGE_SIZE);
        let (width, width_dynamic) =
            resolve_dim(input_dims[3], config.image_size.1, DEFAULT_IMAGE_SIZE);

        // 输出: [B, 4 + nc, N]
        let nc = session
            .outputs
            .first()
            .and_then(|o| o.output_type.tensor_shape().map(|s| s.to_vec()))
            .and_then(|dims| dims.get(1).copied())
            .filter(|&c| c > 4)
            .map(|c| (c - 4) as u32);

        let names = read_metadata(&session, "names").map(|s| parse_names(&s));
        let author = read_metadata(&session, "author");
        let version = read_metadata(&session, "version");

        Ok(Self {
            session,
            ep,
            input_name,
            height,
            width,
            height_dynamic,
            width_dynamic,
            nc,
            names: names.filter(|n| !n.is_empty()),
            author,
            version,
        })
    }

    pub fn run(&mut self, xs: Array<f32, IxDyn>, profile: bool) -> Result<Vec<Array<f32, IxDyn>>> {
        let t = Instant::now();
        let input = Tensor::from_array(xs)?;
        let outputs = self
            .session
            .run(inputs![self.input_name.as_str() => input])?;
        let ys = outputs[0].try_extract_array::<f32>()?.into_owned();
        if profile {
            tracing::info!("[ORT run]: {:?}", t.elapsed());
        }
        Ok(vec![ys])
    }

    pub fn ep(&self) -> OrtEP {
        self.ep
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn is_height_dynamic(&self) -> bool {
        self.height_dynamic
    }

    pub fn is_width_dynamic(&self) -> bool {
        self.width_dynamic
    }

    pub fn nc(&self) -> Option<u32> {
        self.nc
    }

    pub fn names(&self) -> Option<Vec<String>> {
        self.names.clone()
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

fn read_metadata(session: &Session, key: &str) -> Option<String> {
    session.metadata().ok()?.custom(key).ok().flatten()
}

fn resolve_dim(dim: i64, requested: Option<u32>, fallback: u32) -> (u32, bool) {
    if dim > 0 {
        (dim as u32, false)
    } else {
        (requested.unwrap_or(fallback), true)
    }
}

/// 解析 `{0: 'person', 1: 'bicycle'}` 形式的类别表,按 id 排序
pub fn parse_names(raw: &str) -> Vec<String> {
    let mut pairs: Vec<(usize, String)> = NAMES_RE
        .captures_iter(raw)
        .filter_map(|cap| {
            let id = cap.get(1)?.as_str().parse::<usize>().ok()?;
            let name = cap.get(2).or_else(|| cap.get(3))?.as_str().to_string();
            Some((id, name))
        })
        .collect();
    pairs.sort_by_key(|(id, _)| *id);

    let len = pairs.last().map(|(id, _)| id + 1).unwrap_or(0);
    let mut names: Vec<String> = (0..len).map(|i| format!("class_{}", i)).collect();
    for (id, name) in pairs {
        names[id] = name;
    }
    names
}

/// 类别名: 元数据 > VOC(20类) > class_<id>
pub fn resolve_class_names(names: Option<Vec<String>>, nc: u32) -> Vec<String> {
    match names {
        Some(names) if names.len() >= nc as usize => names,
        _ if nc as usize == VOC_CLASSES.len() => {
            VOC_CLASSES.iter().map(|s| s.to_string()).collect()
        }
        _ => (0..nc).map(|i| format!("class_{}", i)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ultralytics_names() {
        let names = parse_names("{0: 'person', 1: 'bicycle', 2: \"traffic light\"}");
        assert_eq!(names, vec!["person", "bicycle", "traffic light"]);
    }

    #[test]
    fn test_parse_names_fills_gaps() {
        let names = parse_names("{2: 'car', 0: 'person'}");
        assert_eq!(names, vec!["person", "class_1", "car"]);
        assert!(parse_names("garbage").is_empty());
    }

    #[test]
    fn test_class_name_fallbacks() {
        let voc = resolve_class_names(None, 20);
        assert_eq!(voc[14], "person");
        assert_eq!(voc.len(), 20);

        let generic = resolve_class_names(None, 3);
        assert_eq!(generic, vec!["class_0", "class_1", "class_2"]);

        let short = resolve_class_names(Some(vec!["a".to_string()]), 3);
        assert_eq!(short.len(), 3);

        let meta = resolve_class_names(Some(vec!["cat".into(), "dog".into()]), 2);
        assert_eq!(meta, vec!["cat", "dog"]);
    }

    #[test]
    fn test_dynamic_dims() {
        assert_eq!(resolve_dim(640, Some(320), 640), (640, false));
        assert_eq!(resolve_dim(-1, Some(320), 640), (320, true));
        assert_eq!(resolve_dim(-1, None, 640), (640, true));
    }
}
