// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// FFmpeg解码过滤器: 视频/摄像头 → RGBA帧 → 检测线程
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::Sender;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame};

use super::DecodedFrame;

/// 解码帧发送到有界通道 (容量1): 上一帧处理完才接收下一帧
#[derive(Clone)]
pub struct FrameTap {
    tx: Sender<DecodedFrame>,
    stop: Arc<AtomicBool>,
    index: u64,
    dropped: u64,
    count: usize,
    last: Instant,
}

impl FrameTap {
    pub fn new(tx: Sender<DecodedFrame>, stop: Arc<AtomicBool>) -> Self {
        Self {
            tx,
            stop,
            index: 0,
            dropped: 0,
            count: 0,
            last: Instant::now(),
        }
    }

    /// 发送一帧; 停止或接收端关闭时返回错误以终止解码
    pub fn push(&mut self, width: u32, height: u32, rgba: Vec<u8>) -> Result<(), String> {
        if self.stop.load(Ordering::Relaxed) {
            return Err("stopped".to_string());
        }
        self.index += 1;
        self.count += 1;

        if self.last.elapsed().as_secs_f64() >= 1.0 {
            let fps = self.count as f64 / self.last.elapsed().as_secs_f64();
            tracing::debug!(
                "📺 解码统计: 第{}帧 | {:.1}fps | 丢弃{}",
                self.index,
                fps,
                self.dropped
            );
            self.last = Instant::now();
            self.count = 0;
        }

        self.tx
            .send(DecodedFrame {
                width,
                height,
                rgba,
                index: self.index,
            })
            .map_err(|_| "receiver closed".to_string())
    }

}

impl FrameFilter for FrameTap {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        tracing::info!("✅ 解码线程启动");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        if self.stop.load(Ordering::Relaxed) {
            tracing::info!("🛑 收到停止信号,终止解码");
            return Err("stopped".to_string());
        }

        let rgba = unsafe {
            if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
                self.dropped += 1;
                return Ok(None);
            }

            let w = (*frame.as_ptr()).width as u32;
            let h = (*frame.as_ptr()).height as u32;
            if w == 0 || h == 0 {
                self.dropped += 1;
                return Ok(None);
            }

            let data = (*frame.as_ptr()).data;
            let linesize = (*frame.as_ptr()).linesize;
            if data[0].is_null() {
                self.dropped += 1;
                return Ok(None);
            }

            // 单平面: 已由 format=rgba 滤镜转换
            if data[1].is_null() && linesize[0] as usize >= w as usize * 4 {
                Some((w, h, copy_rgba(data[0], linesize[0] as usize, w, h)))
            } else if !data[1].is_null()
                && !data[2].is_null()
                && linesize[0] as usize >= w as usize
                && linesize[1] as usize >= (w as usize).div_ceil(2)
            {
                Some((
                    w,
                    h,
                    yuv420p_to_rgba(
                        data[0],
                        data[1],
                        data[2],
                        linesize[0] as usize,
                        linesize[1] as usize,
                        w as usize,
                        h as usize,
                    ),
                ))
            } else {
                None
            }
        };

        match rgba {
            Some((w, h, rgba)) => {
                self.push(w, h, rgba)?;
                Ok(Some(frame))
            }
            None => {
                self.dropped += 1;
                Ok(None)
            }
        }
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        tracing::info!("✅ 解码线程退出, 共{}帧", self.index);
    }
}

/// 按行拷贝 (去掉行尾填充)
unsafe fn copy_rgba(src: *const u8, stride: usize, w: u32, h: u32) -> Vec<u8> {
    let row = w as usize * 4;
    let mut out = Vec::with_capacity(row * h as usize);
    for y in 0..h as usize {
        out.extend_from_slice(std::slice::from_raw_parts(src.add(y * stride), row));
    }
    out
}

/// YUV420P → RGBA (BT.601)
unsafe fn yuv420p_to_rgba(
    data_y: *const u8,
    data_u: *const u8,
    data_v: *const u8,
    y_stride: usize,
    uv_stride: usize,
    w: usize,
    h: usize,
) -> Vec<u8> {
    let mut rgba = vec![255u8; w * h * 4]; // 预填充alpha=255
    for y in 0..h {
        for x in 0..w {
            let y_val = *data_y.add(y * y_stride + x) as f32;
            let u_val = *data_u.add((y / 2) * uv_stride + x / 2) as f32 - 128.0;
            let v_val = *data_v.add((y / 2) * uv_stride + x / 2) as f32 - 128.0;

            let idx = (y * w + x) * 4;
            rgba[idx] = (y_val + 1.402 * v_val).clamp(0.0, 255.0) as u8;
            rgba[idx + 1] = (y_val - 0.344 * u_val - 0.714 * v_val).clamp(0.0, 255.0) as u8;
            rgba[idx + 2] = (y_val + 1.772 * u_val).clamp(0.0, 255.0) as u8;
        }
    }
    rgba
}
