//! LineTracker - 采集线程 + 线程安全的观测读取
//!
//! # 线程模型
//!
//! - 采集线程（`linebot-capture`）独占相机和 [`LineAnalyzer`]，
//!   阻塞在 `Camera::capture()` 上，没有额外的 sleep
//! - 观测、调试帧和可热更新的视觉参数放在同一把锁里：
//!   读者拿到的 error/lost/right_angle 永远来自同一帧
//! - 停止时使用 [`JoinTimeout`]，采集线程卡死也不会阻塞进程退出
//!
//! 相机在线程退出时关闭并交还给 `LineTracker`，因此可以反复 start/stop。

use crate::analyzer::{LineAnalyzer, LineObservation};
use crate::camera::{Camera, CameraError};
use crate::debug;
use crate::error::VisionError;
use crate::liveness::LivenessWindow;
use crate::Frame;
use bytes::Bytes;
use linebot_tools::{
    CameraSettings, JoinTimeout, LineSettings, RobotConfig, VisionSettings, VisionUpdate,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// 采集或处理失败后的重试间隔
pub const CAPTURE_RETRY_DELAY: Duration = Duration::from_millis(50);

/// 可热更新的视觉参数
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSettings {
    pub vision: VisionSettings,
    pub line: LineSettings,
}

/// 单锁保护的共享状态
#[derive(Debug)]
struct TrackerState {
    observation: LineObservation,
    debug_frame: Option<Bytes>,
    settings: TrackerSettings,
}

/// 采集线程持有的句柄
struct CaptureContext {
    camera_settings: CameraSettings,
    state: Arc<Mutex<TrackerState>>,
    liveness: Arc<LivenessWindow>,
    running: Arc<AtomicBool>,
    frames: Arc<AtomicU64>,
}

/// 线跟踪器
pub struct LineTracker {
    camera_settings: CameraSettings,
    state: Arc<Mutex<TrackerState>>,
    liveness: Arc<LivenessWindow>,
    running: Arc<AtomicBool>,
    frames: Arc<AtomicU64>,
    /// 未运行时持有相机；运行期间由采集线程持有
    camera: Mutex<Option<Box<dyn Camera>>>,
    capture_thread: Mutex<Option<JoinHandle<Box<dyn Camera>>>>,
    join_timeout: Duration,
}

impl LineTracker {
    /// 创建跟踪器（不打开相机）
    pub fn new(camera: impl Camera + 'static, config: &RobotConfig) -> Self {
        let settings = TrackerSettings {
            vision: config.vision.clone(),
            line: config.line.clone(),
        };
        Self {
            camera_settings: config.camera.clone(),
            liveness: Arc::new(LivenessWindow::new(config.vision.debug_timeout())),
            state: Arc::new(Mutex::new(TrackerState {
                observation: LineObservation::lost(),
                debug_frame: None,
                settings,
            })),
            running: Arc::new(AtomicBool::new(false)),
            frames: Arc::new(AtomicU64::new(0)),
            camera: Mutex::new(Some(Box::new(camera))),
            capture_thread: Mutex::new(None),
            join_timeout: config.control.join_timeout(),
        }
    }

    /// 打开相机并启动采集线程
    ///
    /// 已经在运行时直接返回 `Ok(())`。
    pub fn start(&self) -> Result<(), VisionError> {
        let mut thread_slot = self.capture_thread.lock();
        if self.running.load(Ordering::Acquire) {
            debug!("LineTracker already running");
            return Ok(());
        }

        let mut camera = self.camera.lock().take().ok_or(VisionError::CameraUnavailable)?;
        if let Err(e) = camera.open(&self.camera_settings) {
            *self.camera.lock() = Some(camera);
            return Err(e.into());
        }

        self.running.store(true, Ordering::Release);
        let ctx = CaptureContext {
            camera_settings: self.camera_settings.clone(),
            state: self.state.clone(),
            liveness: self.liveness.clone(),
            running: self.running.clone(),
            frames: self.frames.clone(),
        };

        let handle = thread::Builder::new()
            .name("linebot-capture".into())
            .spawn(move || capture_loop(camera, ctx))
            .map_err(|e| {
                self.running.store(false, Ordering::Release);
                VisionError::Camera(CameraError::Io(e))
            })?;
        *thread_slot = Some(handle);

        info!(
            "Camera started {}x{} @{}fps rot={}",
            self.camera_settings.width,
            self.camera_settings.height,
            self.camera_settings.fps,
            self.camera_settings.rotation
        );
        Ok(())
    }

    /// 停止采集线程（有界等待）
    ///
    /// 未启动或重复调用都是 no-op。停止后观测回到初始的丢线状态，
    /// 重新启动时不会读到上一轮的误差。
    pub fn stop(&self) {
        let mut thread_slot = self.capture_thread.lock();
        self.running.store(false, Ordering::Release);

        let Some(handle) = thread_slot.take() else {
            return;
        };

        match handle.join_timeout(self.join_timeout) {
            Ok(camera) => *self.camera.lock() = Some(camera),
            Err(e) => warn!(
                "Capture thread did not exit within {:?} ({}), camera abandoned",
                self.join_timeout, e
            ),
        }
        self.state.lock().observation = LineObservation::lost();
        info!("Camera stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// 当前误差（像素）
    pub fn error(&self) -> f64 {
        self.state.lock().observation.error
    }

    pub fn is_line_lost(&self) -> bool {
        self.state.lock().observation.lost
    }

    pub fn is_right_angle(&self) -> bool {
        self.state.lock().observation.right_angle
    }

    /// 同一帧的 error/lost/right_angle
    pub fn observation(&self) -> LineObservation {
        self.state.lock().observation
    }

    /// 续期调试帧存活窗口，消费者每次需要新帧时都要调用
    pub fn request_debug_frame(&self) {
        self.liveness.request();
    }

    /// 最近一次渲染的调试帧（JPEG）
    pub fn debug_frame(&self) -> Option<Bytes> {
        self.state.lock().debug_frame.clone()
    }

    /// 已处理的帧数
    pub fn frames_processed(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// 热更新视觉参数（下一帧生效）
    pub fn update_settings(&self, update: &VisionUpdate) -> Result<(), VisionError> {
        {
            let mut state = self.state.lock();
            let TrackerSettings { vision, line } = &mut state.settings;
            update.apply(vision, line)?;
        }
        info!("Vision settings updated: {:?}", update);
        Ok(())
    }

    /// 当前视觉参数快照
    pub fn settings(&self) -> TrackerSettings {
        self.state.lock().settings.clone()
    }

    pub fn camera_settings(&self) -> &CameraSettings {
        &self.camera_settings
    }
}

impl Drop for LineTracker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn capture_loop(mut camera: Box<dyn Camera>, ctx: CaptureContext) -> Box<dyn Camera> {
    let mut analyzer = LineAnalyzer::new(&ctx.camera_settings);

    while ctx.running.load(Ordering::Acquire) {
        let frame = match camera.capture() {
            Ok(frame) => frame,
            Err(CameraError::Timeout) => continue,
            Err(e) => {
                warn!("Frame capture failed: {}", e);
                thread::sleep(CAPTURE_RETRY_DELAY);
                continue;
            },
        };

        if let Err(e) = ctx.process(&mut analyzer, &frame) {
            warn!("Frame processing failed: {}", e);
            thread::sleep(CAPTURE_RETRY_DELAY);
        }
    }

    camera.close();
    debug!("Capture thread exiting");
    camera
}

impl CaptureContext {
    fn process(&self, analyzer: &mut LineAnalyzer, frame: &Frame) -> Result<(), VisionError> {
        let settings = self.state.lock().settings.clone();
        let analysis = analyzer.analyze_frame(frame, &settings.vision, &settings.line);

        // 没有消费者时完全跳过渲染和编码
        let rendered = if self.liveness.is_active() {
            Some(debug::render(
                frame,
                &analysis,
                analyzer.center_x(),
                settings.vision.jpeg_quality,
            ))
        } else {
            None
        };

        let mut encode_error = None;
        {
            let mut state = self.state.lock();
            state.observation = analysis.observation;
            match rendered {
                Some(Ok(jpeg)) => state.debug_frame = Some(jpeg),
                Some(Err(e)) => encode_error = Some(e),
                None => {},
            }
        }
        self.frames.fetch_add(1, Ordering::Relaxed);

        encode_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{ChannelCamera, FrameSender};
    use image::Rgb;
    use std::time::Instant;

    fn config() -> RobotConfig {
        let mut config =
            RobotConfig::from_toml_str(include_str!("../../../config/robot.toml")).unwrap();
        config.camera.rotation = linebot_tools::Rotation::Deg0;
        config.vision.blur_kernel = 0;
        config
    }

    /// 320x240 白底，x0..x0+20 列画黑线
    fn frame_with_line(x0: u32) -> Frame {
        let mut frame = Frame::from_pixel(320, 240, Rgb([240, 240, 240]));
        for y in 0..240 {
            for x in x0..x0 + 20 {
                frame.put_pixel(x, y, Rgb([10, 10, 10]));
            }
        }
        frame
    }

    fn blank_frame() -> Frame {
        Frame::from_pixel(320, 240, Rgb([240, 240, 240]))
    }

    fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        cond()
    }

    fn tracker(config: &RobotConfig) -> (FrameSender, LineTracker) {
        let (tx, camera) = ChannelCamera::new();
        let camera = camera.with_poll_interval(Duration::from_millis(5));
        (tx, LineTracker::new(camera, config))
    }

    #[test]
    fn test_stop_without_start_is_noop() {
        let (_tx, tracker) = tracker(&config());
        tracker.stop();
        tracker.stop();
        assert!(!tracker.is_running());
        assert_eq!(tracker.observation(), LineObservation::lost());
    }

    #[test]
    fn test_start_twice_and_restart() {
        let (tx, tracker) = tracker(&config());
        tracker.start().unwrap();
        tracker.start().unwrap();
        assert!(tracker.is_running());
        tracker.stop();
        assert!(!tracker.is_running());

        // 相机已交还，可以再次启动
        tracker.start().unwrap();
        tx.send(Ok(frame_with_line(200))).unwrap();
        assert!(wait_until(Duration::from_secs(2), || tracker.frames_processed() == 1));
        tracker.stop();
    }

    #[test]
    fn test_restart_begins_with_lost_line() {
        let (tx, tracker) = tracker(&config());
        tracker.start().unwrap();
        tx.send(Ok(frame_with_line(200))).unwrap();
        assert!(wait_until(Duration::from_secs(2), || !tracker.is_line_lost()));
        tracker.stop();
        assert_eq!(tracker.observation(), LineObservation::lost());

        tracker.start().unwrap();
        assert!(tracker.is_line_lost());
        assert_eq!(tracker.error(), 0.0);
        tracker.stop();
    }

    #[test]
    fn test_open_failure_propagates() {
        let (_tx, camera) = ChannelCamera::new();
        let tracker = LineTracker::new(camera.with_open_error("no camera"), &config());
        let err = tracker.start().unwrap_err();
        assert!(matches!(err, VisionError::Camera(CameraError::Device(_))));
        assert!(!tracker.is_running());
        // 相机仍在，失败后可以重试
        assert!(matches!(tracker.start(), Err(VisionError::Camera(_))));
    }

    #[test]
    fn test_observation_follows_frames() {
        let (tx, tracker) = tracker(&config());
        tracker.start().unwrap();

        tx.send(Ok(frame_with_line(200))).unwrap();
        assert!(wait_until(Duration::from_secs(2), || tracker.frames_processed() == 1));
        let obs = tracker.observation();
        assert!(!obs.lost);
        // 列 200..220 → 质心 209，中心 160
        assert_eq!(obs.error, 49.0);
        assert_eq!(tracker.error(), 49.0);
        assert!(!tracker.is_line_lost());
        assert!(!tracker.is_right_angle());

        tx.send(Ok(blank_frame())).unwrap();
        assert!(wait_until(Duration::from_secs(2), || tracker.frames_processed() == 2));
        assert!(tracker.is_line_lost());

        tracker.stop();
    }

    #[test]
    fn test_capture_error_is_not_fatal() {
        let (tx, tracker) = tracker(&config());
        tracker.start().unwrap();

        tx.send(Err(CameraError::Device("glitch".into()))).unwrap();
        tx.send(Ok(frame_with_line(100))).unwrap();
        assert!(wait_until(Duration::from_secs(2), || tracker.frames_processed() == 1));
        assert!(tracker.is_running());
        assert!(!tracker.is_line_lost());

        tracker.stop();
    }

    #[test]
    fn test_debug_frame_only_when_requested() {
        let (tx, tracker) = tracker(&config());
        tracker.start().unwrap();

        tx.send(Ok(frame_with_line(150))).unwrap();
        assert!(wait_until(Duration::from_secs(2), || tracker.frames_processed() == 1));
        assert!(tracker.debug_frame().is_none());

        tracker.request_debug_frame();
        tx.send(Ok(frame_with_line(150))).unwrap();
        assert!(wait_until(Duration::from_secs(2), || tracker.frames_processed() == 2));
        let jpeg = tracker.debug_frame().unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        tracker.stop();
    }

    #[test]
    fn test_debug_frame_frozen_after_window() {
        let mut config = config();
        config.vision.debug_timeout_secs = 0.05;
        let (tx, tracker) = tracker(&config);
        tracker.start().unwrap();

        tracker.request_debug_frame();
        tx.send(Ok(frame_with_line(150))).unwrap();
        assert!(wait_until(Duration::from_secs(2), || tracker.frames_processed() == 1));
        let sentinel = tracker.debug_frame().unwrap();

        thread::sleep(Duration::from_millis(100));
        for i in 0..3 {
            tx.send(Ok(frame_with_line(60 + i * 40))).unwrap();
        }
        assert!(wait_until(Duration::from_secs(2), || tracker.frames_processed() == 4));

        let current = tracker.debug_frame().unwrap();
        assert_eq!(current.as_ptr(), sentinel.as_ptr());
        // 观测仍在更新
        assert_eq!(tracker.error(), (149 - 160) as f64);

        tracker.stop();
    }

    #[test]
    fn test_update_settings() {
        let (_tx, tracker) = tracker(&config());
        tracker
            .update_settings(&VisionUpdate {
                threshold: Some(90),
                continuity_power: Some(1.0),
                ..Default::default()
            })
            .unwrap();
        let settings = tracker.settings();
        assert_eq!(settings.vision.threshold_value, 90);
        assert_eq!(settings.line.continuity_weight_power, 1.0);

        let err = tracker
            .update_settings(&VisionUpdate {
                side_margin: Some(0.7),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, VisionError::Settings(_)));
        assert_eq!(tracker.settings(), settings);
    }

    #[test]
    fn test_threshold_update_applies_to_next_frame() {
        let (tx, tracker) = tracker(&config());
        tracker.start().unwrap();

        // 灰度 100 的线在阈值 60 下不可见
        let mut frame = blank_frame();
        for y in 0..240 {
            for x in 200..220 {
                frame.put_pixel(x, y, Rgb([100, 100, 100]));
            }
        }
        tx.send(Ok(frame.clone())).unwrap();
        assert!(wait_until(Duration::from_secs(2), || tracker.frames_processed() == 1));
        assert!(tracker.is_line_lost());

        tracker
            .update_settings(&VisionUpdate {
                threshold: Some(120),
                ..Default::default()
            })
            .unwrap();
        tx.send(Ok(frame)).unwrap();
        assert!(wait_until(Duration::from_secs(2), || tracker.frames_processed() == 2));
        assert!(!tracker.is_line_lost());

        tracker.stop();
    }
}
