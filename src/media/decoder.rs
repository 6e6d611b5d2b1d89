// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 视频文件 / 摄像头解码器
//!
//! 摄像头支持 DirectShow(Windows) / AVFoundation(macOS) / V4L2(Linux)

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Input};

use super::{FrameTap, MediaSource};

const CAMERA_RETRIES: usize = 3;

pub struct VideoDecoder {
    source: MediaSource,
}

impl VideoDecoder {
    pub fn new(source: MediaSource) -> Result<Self> {
        if let MediaSource::Image(p) = &source {
            bail!("not a video source: {}", p.display());
        }
        Ok(Self { source })
    }

    pub fn source(&self) -> &MediaSource {
        &self.source
    }

    /// 阻塞解码直到结束、出错或被停止
    pub fn run(&self, filter: FrameTap) -> Result<()> {
        match &self.source {
            MediaSource::Video(path) => {
                tracing::info!("🎬 视频解码启动: {}", path.display());
                decode(Input::new(path.to_string_lossy().into_owned()), filter)
            }
            MediaSource::Webcam { index, name } => {
                let url = camera_url(*index, name);
                tracing::info!("📷 摄像头解码启动: {} ({}), URL: {}", index, name, url);
                decode_camera(&url, filter)
            }
            MediaSource::Image(p) => bail!("not a video source: {}", p.display()),
        }
    }
}

fn decode(input: Input, filter: FrameTap) -> Result<()> {
    let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
    let pipe = pipe.filter("decode", Box::new(filter));
    let out = create_null_output().add_frame_pipeline(pipe);

    let ctx = FfmpegContext::builder()
        .input(input)
        .filter_descs(["format=rgba"].into())
        .output(out)
        .build()
        .map_err(|e| anyhow!("构建失败: {}", e))?;

    let sch = ctx.start().map_err(|e| anyhow!("启动失败: {}", e))?;
    sch.wait().map_err(|e| anyhow!("解码中断: {}", e))?;
    Ok(())
}

/// 摄像头忙时重试
fn decode_camera(url: &str, filter: FrameTap) -> Result<()> {
    let format = camera_format();
    tracing::info!("🔍 使用格式: {}, 输入: {}", format, url);

    let mut retry_count = 0;
    loop {
        let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
        let pipe = pipe.filter("decode", Box::new(filter.clone()));
        let out = create_null_output().add_frame_pipeline(pipe);

        // 不指定分辨率和帧率,由驱动协商默认值
        let input = Input::new(url).set_format(format);

        let ctx = match FfmpegContext::builder()
            .input(input)
            .filter_descs(["format=rgba"].into())
            .output(out)
            .build()
        {
            Ok(c) => c,
            Err(e) => {
                retry_count += 1;
                tracing::warn!("❌ 摄像头构建错误: {}", e);
                if retry_count >= CAMERA_RETRIES {
                    bail!("摄像头构建失败 (重试{}次): {}", CAMERA_RETRIES, e);
                }
                tracing::warn!(
                    "⚠️ 摄像头忙或无法打开, 1秒后重试... ({}/{})",
                    retry_count,
                    CAMERA_RETRIES
                );
                std::thread::sleep(Duration::from_secs(1));
                continue;
            }
        };

        let sch = ctx.start().map_err(|e| anyhow!("摄像头启动失败: {}", e))?;
        tracing::info!("✅ 摄像头连接成功,开始解码!");
        sch.wait().map_err(|e| anyhow!("摄像头解码中断: {}", e))?;
        return Ok(());
    }
}

fn camera_format() -> &'static str {
    if cfg!(target_os = "windows") {
        "dshow"
    } else if cfg!(target_os = "macos") {
        "avfoundation"
    } else if cfg!(target_os = "linux") {
        "v4l2"
    } else {
        "video4linux2"
    }
}

/// 摄像头URL - 根据平台选择
pub fn camera_url(index: usize, name: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("video={}", name)
    } else if cfg!(target_os = "linux") {
        format!("/dev/video{}", index)
    } else {
        index.to_string()
    }
}
