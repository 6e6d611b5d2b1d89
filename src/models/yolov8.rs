// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLOv8 检测模型实现
// 包含: 模型加载、预处理、推理、后处理

use anyhow::{bail, Result};
use fast_image_resize as fr;
use image::{DynamicImage, GenericImageView};
use ndarray::{s, Array, Axis, IxDyn};

use super::ModelConfig;
use crate::ort_backend::resolve_class_names;
use crate::{non_max_suppression, Bbox, DetectionResult, OrtBackend, OrtConfig, OrtEP};

const CXYWH_OFFSET: usize = 4;

/// 预处理填充色
const PAD_VALUE: f32 = 144.0 / 255.0;

/// YOLOv8 检测模型
pub struct YOLOv8 {
    engine: OrtBackend,
    post: YOLOv8Postprocessor,
    names: Vec<String>,
    profile: bool,
}

impl YOLOv8 {
    pub fn new(config: ModelConfig) -> Result<Self> {
        let ort_args = OrtConfig {
            ep: config.ep,
            f: config.model,
            image_size: (config.height, config.width),
            intra_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        };
        let engine = OrtBackend::build(ort_args)?;

        let nc = match engine.nc().or(config.nc) {
            Some(nc) => nc,
            None => bail!("Failed to get num_classes, make it explicit with `--nc`"),
        };
        let names = resolve_class_names(engine.names(), nc);

        let post = YOLOv8Postprocessor::new(YOLOv8Config::new(
            nc as usize,
            engine.width() as usize,
            engine.height() as usize,
            config.thresholds.conf,
            config.thresholds.iou,
        ));

        Ok(Self {
            engine,
            post,
            names,
            profile: config.profile,
        })
    }

    pub fn preprocess(&mut self, xs: &[DynamicImage]) -> Result<Array<f32, IxDyn>> {
        let (width, height) = (self.width(), self.height());
        let mut ys = Array::ones((xs.len(), 3, height as usize, width as usize)).into_dyn();
        ys.fill(PAD_VALUE);

        let mut resizer = fr::Resizer::new();
        for (idx, x) in xs.iter().enumerate() {
            let (w0, h0) = x.dimensions();
            if w0 == 0 || h0 == 0 {
                bail!("empty image ({}x{})", w0, h0);
            }
            let (_, w_new, h_new) =
                scale_wh(w0 as f32, h0 as f32, width as f32, height as f32);
            let w_new = (w_new as u32).clamp(1, width);
            let h_new = (h_new as u32).clamp(1, height);

            // 等比缩放到左上角,其余区域保持填充色
            let src = fr::images::Image::from_vec_u8(
                w0,
                h0,
                x.to_rgb8().into_raw(),
                fr::PixelType::U8x3,
            )?;
            let mut dst = fr::images::Image::new(w_new, h_new, fr::PixelType::U8x3);
            resizer.resize(
                &src,
                &mut dst,
                &fr::ResizeOptions::new()
                    .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear)),
            )?;

            let row = w_new as usize;
            for (i, rgb) in dst.buffer().chunks_exact(3).enumerate() {
                let (y, x) = (i / row, i % row);
                ys[[idx, 0, y, x]] = (rgb[0] as f32) / 255.0;
                ys[[idx, 1, y, x]] = (rgb[1] as f32) / 255.0;
                ys[[idx, 2, y, x]] = (rgb[2] as f32) / 255.0;
            }
        }

        Ok(ys)
    }

    pub fn width(&self) -> u32 {
        self.engine.width()
    }

    pub fn height(&self) -> u32 {
        self.engine.height()
    }

    pub fn nc(&self) -> usize {
        self.post.config.nc
    }
}

impl super::Model for YOLOv8 {
    fn preprocess(&mut self, images: &[DynamicImage]) -> Result<Vec<Array<f32, IxDyn>>> {
        let t_pre = std::time::Instant::now();
        let batch = YOLOv8::preprocess(self, images)?;
        if self.profile {
            tracing::info!("[Model Preprocess]: {:?}", t_pre.elapsed());
        }
        Ok(vec![batch])
    }

    fn run(&mut self, xs: Vec<Array<f32, IxDyn>>, profile: bool) -> Result<Vec<Array<f32, IxDyn>>> {
        match xs.into_iter().next() {
            Some(x) => self.engine.run(x, profile || self.profile),
            None => bail!("no input tensor"),
        }
    }

    fn postprocess(
        &self,
        xs: Vec<Array<f32, IxDyn>>,
        xs0: &[DynamicImage],
    ) -> Result<Vec<DetectionResult>> {
        let t_post = std::time::Instant::now();
        let ys = self.post.postprocess(xs, xs0)?;
        if self.profile {
            tracing::info!("[Model Postprocess]: {:?}", t_post.elapsed());
        }
        Ok(ys)
    }

    fn names(&self) -> &[String] {
        &self.names
    }

    fn conf(&self) -> f32 {
        self.post.config.conf
    }

    fn set_conf(&mut self, val: f32) {
        self.post.config.conf = val;
    }

    fn iou(&self) -> f32 {
        self.post.config.iou
    }

    fn set_iou(&mut self, val: f32) {
        self.post.config.iou = val;
    }

    fn summary(&self) {
        tracing::info!(
            "\nSummary:\n\
            > Task: Detect{}\n\
            > EP: {:?} {}\n\
            > Height: {} ({}), Width: {} ({})\n\
            > nc: {}, conf: {}, iou: {}\n",
            match self.engine.author().zip(self.engine.version()) {
                Some((author, ver)) => format!(" ({} {})", author, ver),
                None => String::from(""),
            },
            self.engine.ep(),
            if let OrtEP::CPU = self.engine.ep() {
                ""
            } else {
                "(May still fall back to CPU)"
            },
            self.height(),
            if self.engine.is_height_dynamic() {
                "Dynamic"
            } else {
                "Const"
            },
            self.width(),
            if self.engine.is_width_dynamic() {
                "Dynamic"
            } else {
                "Const"
            },
            self.nc(),
            self.post.config.conf,
            self.post.config.iou,
        );
    }
}

fn scale_wh(w0: f32, h0: f32, w1: f32, h1: f32) -> (f32, f32, f32) {
    let r = (w1 / w0).min(h1 / h0);
    (r, (w0 * r).round(), (h0 * r).round())
}

/// YOLOv8 后处理配置
#[derive(Debug, Clone)]
pub struct YOLOv8Config {
    pub nc: usize,
    pub conf: f32,
    pub iou: f32,
    pub width: usize,
    pub height: usize,
}

impl YOLOv8Config {
    pub fn new(nc: usize, width: usize, height: usize, conf: f32, iou: f32) -> Self {
        Self {
            nc,
            conf,
            iou,
            width,
            height,
        }
    }
}

/// YOLOv8 后处理器: `[B, 4 + nc, N]` → 检测框
pub struct YOLOv8Postprocessor {
    config: YOLOv8Config,
}

impl YOLOv8Postprocessor {
    pub fn new(config: YOLOv8Config) -> Self {
        Self { config }
    }

    pub fn postprocess(
        &self,
        xs: Vec<Array<f32, IxDyn>>,
        xs0: &[DynamicImage],
    ) -> Result<Vec<DetectionResult>> {
        let preds = match xs.first() {
            Some(preds) if preds.ndim() == 3 => preds,
            Some(preds) => bail!("unexpected output shape {:?}", preds.shape()),
            None => bail!("model returned no outputs"),
        };
        if preds.shape()[1] < CXYWH_OFFSET + self.config.nc {
            bail!(
                "output has {} channels, expected 4 + {} classes",
                preds.shape()[1],
                self.config.nc
            );
        }

        let mut ys = Vec::new();
        for (idx, anchor) in preds.axis_iter(Axis(0)).enumerate() {
            let Some(image) = xs0.get(idx) else {
                break;
            };
            let width_original = image.width() as f32;
            let height_original = image.height() as f32;
            let ratio = (self.config.width as f32 / width_original)
                .min(self.config.height as f32 / height_original);

            let mut data: Vec<Bbox> = Vec::new();
            for pred in anchor.axis_iter(Axis(1)) {
                let bbox = pred.slice(s![0..CXYWH_OFFSET]);
                let clss = pred.slice(s![CXYWH_OFFSET..CXYWH_OFFSET + self.config.nc]);

                let Some((id, &confidence)) = clss
                    .into_iter()
                    .enumerate()
                    .reduce(|max, x| if x.1 > max.1 { x } else { max })
                else {
                    continue;
                };

                if confidence < self.config.conf {
                    continue;
                }

                let cx = bbox[0] / ratio;
                let cy = bbox[1] / ratio;
                let w = bbox[2] / ratio;
                let h = bbox[3] / ratio;
                let x = (cx - w / 2.).max(0.0f32).min(width_original);
                let y = (cy - h / 2.).max(0.0f32).min(height_original);
                let w = w.min(width_original - x);
                let h = h.min(height_original - y);
                data.push(Bbox::new(x, y, w, h, id, confidence));
            }

            non_max_suppression(&mut data, self.config.iou);
            ys.push(DetectionResult::new(data));
        }

        Ok(ys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    /// 构造 [1, 4 + nc, N] 输出
    fn output(anchors: &[[f32; 6]]) -> Array<f32, IxDyn> {
        let mut a = Array::zeros((1, 6, anchors.len())).into_dyn();
        for (i, anchor) in anchors.iter().enumerate() {
            for (c, v) in anchor.iter().enumerate() {
                a[[0, c, i]] = *v;
            }
        }
        a
    }

    fn image(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::new(w, h))
    }

    #[test]
    fn test_scale_wh() {
        let (r, w, h) = scale_wh(1280.0, 720.0, 640.0, 640.0);
        assert_eq!(r, 0.5);
        assert_eq!((w, h), (640.0, 360.0));
    }

    #[test]
    fn test_postprocess_scales_back_and_filters() {
        let post = YOLOv8Postprocessor::new(YOLOv8Config::new(2, 640, 640, 0.25, 0.45));
        // 原图 1280x720 → ratio 0.5
        let xs = vec![output(&[
            [100.0, 100.0, 50.0, 40.0, 0.9, 0.1],
            [300.0, 200.0, 20.0, 20.0, 0.05, 0.1], // 低于阈值
            [500.0, 300.0, 60.0, 60.0, 0.2, 0.8],
        ])];
        let ys = post.postprocess(xs, &[image(1280, 720)]).unwrap();

        assert_eq!(ys.len(), 1);
        let boxes = ys[0].bboxes();
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].id(), 0);
        assert_eq!(boxes[0].xmin(), 150.0);
        assert_eq!(boxes[0].ymin(), 160.0);
        assert_eq!(boxes[0].width(), 100.0);
        assert_eq!(boxes[0].height(), 80.0);
        assert_eq!(boxes[1].id(), 1);
        assert!((boxes[1].confidence() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_postprocess_applies_nms() {
        let post = YOLOv8Postprocessor::new(YOLOv8Config::new(2, 640, 640, 0.25, 0.45));
        let xs = vec![output(&[
            [100.0, 100.0, 50.0, 50.0, 0.6, 0.0],
            [102.0, 101.0, 50.0, 50.0, 0.9, 0.0],
        ])];
        let ys = post.postprocess(xs, &[image(640, 640)]).unwrap();
        assert_eq!(ys[0].len(), 1);
        assert!((ys[0].bboxes()[0].confidence() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_postprocess_clips_to_image() {
        let post = YOLOv8Postprocessor::new(YOLOv8Config::new(2, 640, 640, 0.25, 0.45));
        let xs = vec![output(&[[5.0, 5.0, 40.0, 40.0, 0.9, 0.0]])];
        let ys = post.postprocess(xs, &[image(640, 640)]).unwrap();
        let b = &ys[0].bboxes()[0];
        assert_eq!(b.xmin(), 0.0);
        assert_eq!(b.ymin(), 0.0);
        assert!(b.xmax() <= 640.0);
    }

    #[test]
    fn test_postprocess_rejects_wrong_channel_count() {
        let post = YOLOv8Postprocessor::new(YOLOv8Config::new(20, 640, 640, 0.25, 0.45));
        let xs = vec![output(&[[5.0, 5.0, 40.0, 40.0, 0.9, 0.0]])];
        assert!(post.postprocess(xs, &[image(640, 640)]).is_err());
        assert!(post.postprocess(vec![], &[image(640, 640)]).is_err());
    }
}
