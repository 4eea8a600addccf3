//! 脚本化的线位置传感器（无相机）

use crate::sensor::LineSensor;
use linebot_tools::{RobotConfig, VisionUpdate};
use linebot_vision::{CameraError, LineObservation, TrackerSettings, VisionError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// 由测试直接设置观测值的传感器
#[derive(Debug)]
pub struct ScriptedSensor {
    observation: Mutex<LineObservation>,
    settings: Mutex<TrackerSettings>,
    running: AtomicBool,
    fail_start: AtomicBool,
    panic_read: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl ScriptedSensor {
    pub fn new(config: &RobotConfig) -> Self {
        Self {
            observation: Mutex::new(LineObservation::lost()),
            settings: Mutex::new(TrackerSettings {
                vision: config.vision.clone(),
                line: config.line.clone(),
            }),
            running: AtomicBool::new(false),
            fail_start: AtomicBool::new(false),
            panic_read: AtomicBool::new(false),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, observation: LineObservation) {
        *self.observation.lock() = observation;
    }

    /// 线可见，误差为 `error`
    pub fn show_line(&self, error: f64) {
        self.set(LineObservation {
            error,
            lost: false,
            right_angle: false,
        });
    }

    pub fn lose_line(&self) {
        self.set(LineObservation::lost());
    }

    pub fn show_right_angle(&self, error: f64) {
        self.set(LineObservation {
            error,
            lost: false,
            right_angle: true,
        });
    }

    /// 下一次 `start()` 模拟相机打开失败
    pub fn fail_next_start(&self) {
        self.fail_start.store(true, Ordering::SeqCst);
    }

    /// 下一次读取观测时 panic（模拟驱动层的程序错误）
    pub fn panic_next_read(&self) {
        self.panic_read.store(true, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl LineSensor for ScriptedSensor {
    fn start(&self) -> Result<(), VisionError> {
        if self.fail_start.swap(false, Ordering::SeqCst) {
            return Err(CameraError::Device("scripted open failure".into()).into());
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }

    fn observation(&self) -> LineObservation {
        if self.panic_read.swap(false, Ordering::SeqCst) {
            panic!("scripted sensor fault");
        }
        *self.observation.lock()
    }

    fn update_settings(&self, update: &VisionUpdate) -> Result<(), VisionError> {
        let mut settings = self.settings.lock();
        let TrackerSettings { vision, line } = &mut *settings;
        update.apply(vision, line)?;
        Ok(())
    }

    fn settings(&self) -> TrackerSettings {
        self.settings.lock().clone()
    }
}
