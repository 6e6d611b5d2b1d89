// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 视频检测工作线程
///
/// 解码线程 → 有界通道(1) → 检测线程 → 有界事件通道 → 界面
///
/// 停止标志每帧检查一次,解码滤镜与检测循环共用。
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use image::RgbaImage;

use crate::annotate::Annotator;
use crate::config::Thresholds;
use crate::error::DetectorError;
use crate::media::{DecodedFrame, FrameTap, MediaSource, VideoDecoder};
use crate::models::SharedModel;
use crate::report::DetectionReport;

/// 检测线程 → 界面
#[derive(Debug)]
pub enum WorkerEvent {
    Frame(FrameUpdate),
    Finished {
        frames: u64,
        total_detections: usize,
        stopped: bool,
    },
    Failed(DetectorError),
}

#[derive(Debug, Clone)]
pub struct FrameUpdate {
    pub frame_num: u64,
    pub image: RgbaImage,
    pub report: DetectionReport,
}

/// 界面 → 检测线程
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlMessage {
    UpdateParams {
        conf_threshold: f32,
        iou_threshold: f32,
    },
}

type DecodeOutcome = Result<(), String>;

/// 事件通道容量: 界面跟不上时丢弃旧帧
const EVENT_CAPACITY: usize = 4;

pub struct VideoWorker {
    stop: Arc<AtomicBool>,
    events: Receiver<WorkerEvent>,
    control: Sender<ControlMessage>,
    handle: Option<JoinHandle<()>>,
}

impl VideoWorker {
    pub fn spawn(
        source: MediaSource,
        model: SharedModel,
        annotator: Arc<Annotator>,
        thresholds: Thresholds,
    ) -> Result<Self, DetectorError> {
        let decoder = VideoDecoder::new(source.clone())
            .map_err(|e| DetectorError::MediaOpen(format!("{:#}", e)))?;

        let stop = Arc::new(AtomicBool::new(false));
        let (tx_events, rx_events) = bounded(EVENT_CAPACITY);
        let (tx_control, rx_control) = unbounded();

        let thread_stop = stop.clone();
        let handle = std::thread::Builder::new()
            .name("video-worker".into())
            .spawn(move || {
                tracing::info!("🎬 检测线程启动: {}", source.display_name());
                let (tx_frames, rx_frames) = bounded::<DecodedFrame>(1);
                let (tx_done, rx_done) = bounded::<DecodeOutcome>(1);

                let tap = FrameTap::new(tx_frames, thread_stop.clone());
                let decode_handle = std::thread::Builder::new()
                    .name("video-decoder".into())
                    .spawn(move || {
                        let outcome = decoder.run(tap).map_err(|e| format!("{:#}", e));
                        if let Err(e) = &outcome {
                            tracing::warn!("⚠️ 解码结束: {}", e);
                        }
                        let _ = tx_done.send(outcome);
                    });

                let event = match decode_handle {
                    Ok(decode_handle) => {
                        let event = detection_loop(
                            rx_frames,
                            rx_done,
                            &model,
                            &annotator,
                            thresholds,
                            &thread_stop,
                            &rx_control,
                            &tx_events,
                        );
                        // 接收端已关闭,解码线程会随之退出
                        if decode_handle.join().is_err() {
                            tracing::error!("❌ 解码线程异常退出");
                        }
                        event
                    }
                    Err(e) => WorkerEvent::Failed(DetectorError::MediaOpen(e.to_string())),
                };

                tracing::info!("🏁 检测线程结束: {:?}", FinishedLog(&event));
                let _ = tx_events.send(event);
            })
            .map_err(|e| DetectorError::MediaOpen(e.to_string()))?;

        Ok(Self {
            stop,
            events: rx_events,
            control: tx_control,
            handle: Some(handle),
        })
    }

    /// 请求停止,下一帧生效
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn events(&self) -> &Receiver<WorkerEvent> {
        &self.events
    }

    /// 阈值在下一帧生效
    pub fn update_thresholds(&self, thresholds: Thresholds) {
        let _ = self.control.send(ControlMessage::UpdateParams {
            conf_threshold: thresholds.conf,
            iou_threshold: thresholds.iou,
        });
    }

    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            // 结束事件可能正在等通道空位
            while !handle.is_finished() {
                for _ in self.events.try_iter() {}
                std::thread::sleep(Duration::from_millis(5));
            }
            if handle.join().is_err() {
                tracing::error!("❌ 检测线程异常退出");
            }
        }
    }
}

impl Drop for VideoWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// 日志里不打印整帧图像
struct FinishedLog<'a>(&'a WorkerEvent);

impl std::fmt::Debug for FinishedLog<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            WorkerEvent::Frame(u) => write!(f, "Frame({})", u.frame_num),
            other => write!(f, "{:?}", other),
        }
    }
}

/// 检测循环, 返回最终事件 (Finished / Failed)
#[allow(clippy::too_many_arguments)]
fn detection_loop(
    frames: Receiver<DecodedFrame>,
    done: Receiver<DecodeOutcome>,
    model: &SharedModel,
    annotator: &Annotator,
    mut thresholds: Thresholds,
    stop: &AtomicBool,
    control: &Receiver<ControlMessage>,
    events: &Sender<WorkerEvent>,
) -> WorkerEvent {
    let mut frame_count: u64 = 0;
    let mut total_detections: usize = 0;
    let mut outcome: Option<DecodeOutcome> = None;

    let mut handle_frame = |frame: DecodedFrame,
                            thresholds: Thresholds|
     -> Result<bool, DetectorError> {
        let Some(image) = frame.into_image() else {
            tracing::warn!("⚠️ 帧数据尺寸不匹配,跳过");
            return Ok(true);
        };
        frame_count += 1;

        let (annotated, report) = {
            let mut guard = model
                .lock()
                .map_err(|_| DetectorError::Detection("model lock poisoned".into()))?;
            let result = guard
                .predict(&image, thresholds)
                .map_err(DetectorError::detection)?;
            let names = guard.names();
            (
                annotator.annotate(&image, &result, names),
                DetectionReport::from_result(&result, names, Some(frame_count)),
            )
        };
        total_detections += report.total();
        tracing::debug!("🔍 第{}帧: {}个目标", frame_count, report.total());

        let update = WorkerEvent::Frame(FrameUpdate {
            frame_num: frame_count,
            image: annotated,
            report,
        });
        match events.try_send(update) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => {
                tracing::debug!("⏭ 界面繁忙,丢弃第{}帧画面", frame_count);
                Ok(true)
            }
            // 界面已关闭
            Err(TrySendError::Disconnected(_)) => Ok(false),
        }
    };

    loop {
        if stop.load(Ordering::Relaxed) {
            tracing::info!("🛑 视频检测已停止");
            break;
        }

        // 最新阈值
        for ControlMessage::UpdateParams {
            conf_threshold,
            iou_threshold,
        } in control.try_iter()
        {
            thresholds = Thresholds::new(conf_threshold, iou_threshold);
            tracing::debug!(
                "🎚 阈值更新: conf={:.2}, iou={:.2}",
                thresholds.conf,
                thresholds.iou
            );
        }

        // 解码已结束: 先处理通道里剩下的帧
        if let Ok(done) = done.try_recv() {
            outcome = Some(done);
            for frame in frames.try_iter() {
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                match handle_frame(frame, thresholds) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => {
                        tracing::error!("❌ 检测失败: {}", e);
                        return WorkerEvent::Failed(e);
                    }
                }
            }
            break;
        }

        match frames.recv_timeout(Duration::from_millis(100)) {
            Ok(frame) => match handle_frame(frame, thresholds) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    tracing::error!("❌ 检测失败: {}", e);
                    return WorkerEvent::Failed(e);
                }
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                outcome = Some(done.recv().unwrap_or_else(|_| Err("decoder exited".into())));
                break;
            }
        }
    }

    let stopped = stop.load(Ordering::Relaxed);
    match outcome {
        Some(Err(msg)) if frame_count == 0 && !stopped => {
            WorkerEvent::Failed(DetectorError::MediaOpen(msg))
        }
        _ => WorkerEvent::Finished {
            frames: frame_count,
            total_detections,
            stopped,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Model;
    use crate::{Bbox, DetectionResult};
    use anyhow::anyhow;
    use image::DynamicImage;
    use ndarray::{Array, IxDyn};
    use std::sync::Mutex;

    /// 每张图返回固定的 2 个框; `fail` 时推理报错
    struct MockModel {
        names: Vec<String>,
        conf: f32,
        iou: f32,
        fail: bool,
        seen_conf: Arc<Mutex<Vec<f32>>>,
    }

    impl Model for MockModel {
        fn preprocess(&mut self, _images: &[DynamicImage]) -> anyhow::Result<Vec<Array<f32, IxDyn>>> {
            Ok(vec![])
        }

        fn run(
            &mut self,
            xs: Vec<Array<f32, IxDyn>>,
            _profile: bool,
        ) -> anyhow::Result<Vec<Array<f32, IxDyn>>> {
            if self.fail {
                return Err(anyhow!("boom"));
            }
            Ok(xs)
        }

        fn postprocess(
            &self,
            _xs: Vec<Array<f32, IxDyn>>,
            xs0: &[DynamicImage],
        ) -> anyhow::Result<Vec<DetectionResult>> {
            self.seen_conf.lock().unwrap().push(self.conf);
            Ok(xs0
                .iter()
                .map(|_| {
                    DetectionResult::new(vec![
                        Bbox::new(0.0, 0.0, 2.0, 2.0, 0, 0.9),
                        Bbox::new(1.0, 1.0, 2.0, 2.0, 0, 0.5),
                    ])
                })
                .collect())
        }

        fn names(&self) -> &[String] {
            &self.names
        }

        fn conf(&self) -> f32 {
            self.conf
        }

        fn set_conf(&mut self, val: f32) {
            self.conf = val;
        }

        fn iou(&self) -> f32 {
            self.iou
        }

        fn set_iou(&mut self, val: f32) {
            self.iou = val;
        }

        fn summary(&self) {}
    }

    fn mock(fail: bool) -> (SharedModel, Arc<Mutex<Vec<f32>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let model = MockModel {
            names: vec!["person".into()],
            conf: 0.25,
            iou: 0.45,
            fail,
            seen_conf: seen.clone(),
        };
        let boxed: Box<dyn Model> = Box::new(model);
        (Arc::new(Mutex::new(boxed)), seen)
    }

    fn frame(index: u64) -> DecodedFrame {
        DecodedFrame {
            width: 4,
            height: 4,
            rgba: vec![100; 64],
            index,
        }
    }

    struct Harness {
        tx_frames: Sender<DecodedFrame>,
        rx_frames: Receiver<DecodedFrame>,
        tx_done: Sender<DecodeOutcome>,
        rx_done: Receiver<DecodeOutcome>,
        tx_control: Sender<ControlMessage>,
        rx_control: Receiver<ControlMessage>,
        tx_events: Sender<WorkerEvent>,
        rx_events: Receiver<WorkerEvent>,
    }

    fn harness() -> Harness {
        harness_with_events(unbounded())
    }

    fn harness_with_events(
        (tx_events, rx_events): (Sender<WorkerEvent>, Receiver<WorkerEvent>),
    ) -> Harness {
        let (tx_frames, rx_frames) = bounded(8);
        let (tx_done, rx_done) = bounded(1);
        let (tx_control, rx_control) = unbounded();
        Harness {
            tx_frames,
            rx_frames,
            tx_done,
            rx_done,
            tx_control,
            rx_control,
            tx_events,
            rx_events,
        }
    }

    fn run(h: Harness, model: &SharedModel, stop: &AtomicBool) -> (WorkerEvent, Vec<WorkerEvent>) {
        let Harness {
            tx_frames,
            rx_frames,
            tx_done,
            rx_done,
            tx_control,
            rx_control,
            tx_events,
            rx_events,
        } = h;
        drop(tx_frames);
        drop(tx_done);
        drop(tx_control);
        let event = detection_loop(
            rx_frames,
            rx_done,
            model,
            &Annotator::new(None),
            Thresholds::default(),
            stop,
            &rx_control,
            &tx_events,
        );
        drop(tx_events);
        (event, rx_events.iter().collect())
    }

    #[test]
    fn test_one_event_per_frame_then_finished() {
        let (model, _) = mock(false);
        let h = harness();
        for i in 1..=3 {
            h.tx_frames.send(frame(i)).unwrap();
        }
        h.tx_done.send(Ok(())).unwrap();

        let (event, updates) = run(h, &model, &AtomicBool::new(false));

        assert_eq!(updates.len(), 3);
        for (i, e) in updates.iter().enumerate() {
            match e {
                WorkerEvent::Frame(u) => {
                    assert_eq!(u.frame_num, i as u64 + 1);
                    assert_eq!(u.report.total(), 2);
                    assert_eq!(u.report.frame, Some(i as u64 + 1));
                    assert_eq!(u.image.dimensions(), (4, 4));
                }
                other => panic!("unexpected event {:?}", FinishedLog(other)),
            }
        }
        match event {
            WorkerEvent::Finished {
                frames,
                total_detections,
                stopped,
            } => {
                assert_eq!(frames, 3);
                assert_eq!(total_detections, 6);
                assert!(!stopped);
            }
            other => panic!("unexpected event {:?}", FinishedLog(&other)),
        }
    }

    #[test]
    fn test_stop_flag_ends_loop() {
        let (model, _) = mock(false);
        let h = harness();
        h.tx_frames.send(frame(1)).unwrap();

        let (event, updates) = run(h, &model, &AtomicBool::new(true));

        assert!(updates.is_empty());
        assert!(matches!(
            event,
            WorkerEvent::Finished {
                frames: 0,
                stopped: true,
                ..
            }
        ));
    }

    #[test]
    fn test_unopenable_source_fails() {
        let (model, _) = mock(false);
        let h = harness();
        h.tx_done.send(Err("No such file or directory".into())).unwrap();

        let (event, updates) = run(h, &model, &AtomicBool::new(false));

        assert!(updates.is_empty());
        match event {
            WorkerEvent::Failed(e) => {
                assert!(e.to_string().starts_with("Failed to open video source!"));
            }
            other => panic!("unexpected event {:?}", FinishedLog(&other)),
        }
    }

    #[test]
    fn test_detection_error_fails_run() {
        let (model, _) = mock(true);
        let h = harness();
        h.tx_frames.send(frame(1)).unwrap();
        h.tx_done.send(Ok(())).unwrap();

        let (event, _) = run(h, &model, &AtomicBool::new(false));
        match event {
            WorkerEvent::Failed(DetectorError::Detection(msg)) => assert_eq!(msg, "boom"),
            other => panic!("unexpected event {:?}", FinishedLog(&other)),
        }
    }

    #[test]
    fn test_threshold_update_applies_to_next_frame() {
        let (model, seen) = mock(false);
        let h = harness();
        h.tx_control
            .send(ControlMessage::UpdateParams {
                conf_threshold: 0.6,
                iou_threshold: 0.3,
            })
            .unwrap();
        h.tx_frames.send(frame(1)).unwrap();
        h.tx_done.send(Ok(())).unwrap();

        let (_, updates) = run(h, &model, &AtomicBool::new(false));
        assert_eq!(updates.len(), 1);
        assert_eq!(*seen.lock().unwrap(), vec![0.6]);
    }

    #[test]
    fn test_frames_queued_before_done_are_processed() {
        let (model, _) = mock(false);
        let h = harness();
        // 滤镜仍持有帧发送端
        let tx_frames = h.tx_frames.clone();
        tx_frames.send(frame(1)).unwrap();
        tx_frames.send(frame(2)).unwrap();
        h.tx_done.send(Ok(())).unwrap();

        let (event, updates) = run(h, &model, &AtomicBool::new(false));
        drop(tx_frames);

        assert_eq!(updates.len(), 2);
        assert!(matches!(
            event,
            WorkerEvent::Finished {
                frames: 2,
                total_detections: 4,
                stopped: false,
            }
        ));
    }

    #[test]
    fn test_full_event_channel_drops_stale_frames() {
        let (model, _) = mock(false);
        // 界面不取事件
        let h = harness_with_events(bounded(1));
        for i in 1..=3 {
            h.tx_frames.send(frame(i)).unwrap();
        }
        h.tx_done.send(Ok(())).unwrap();

        let (event, updates) = run(h, &model, &AtomicBool::new(false));

        assert_eq!(updates.len(), 1);
        match &updates[0] {
            WorkerEvent::Frame(u) => assert_eq!(u.frame_num, 1),
            other => panic!("unexpected event {:?}", FinishedLog(other)),
        }
        assert!(matches!(
            event,
            WorkerEvent::Finished {
                frames: 3,
                stopped: false,
                ..
            }
        ));
    }
}
