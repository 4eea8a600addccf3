//! 仿真硬件
//!
//! 没有相机和驱动板时使用：相机渲染一条左右摆动的线（周期性消失一段时间），
//! 电机后端只把输出变化写进日志。

use linebot_sdk::drive::{DriveError, DriveSignal, MotorBackend};
use linebot_sdk::tools::{CameraSettings, MotorChannel};
use linebot_sdk::vision::{Camera, CameraError, Frame};
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::BTreeMap;
use std::f64::consts::TAU;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const BACKGROUND: [u8; 3] = [225, 225, 220];
const LINE: [u8; 3] = [20, 20, 25];

/// 摆动周期
const SWAY_PERIOD: f64 = 6.0;
/// 每隔多久线消失一次
const GAP_EVERY: f64 = 15.0;
/// 消失持续时间
const GAP_LENGTH: f64 = 1.0;

/// 合成画面的相机
pub struct SimulatedCamera {
    settings: Option<CameraSettings>,
    started: Instant,
    rng: StdRng,
}

impl SimulatedCamera {
    pub fn new() -> Self {
        Self {
            settings: None,
            started: Instant::now(),
            rng: StdRng::from_entropy(),
        }
    }

    /// 时刻 `t`（秒）的线中心，`None` 表示线不可见
    pub fn line_center(t: f64, width: u32) -> Option<f64> {
        if t % GAP_EVERY > GAP_EVERY - GAP_LENGTH {
            return None;
        }
        let w = width as f64;
        Some(w / 2.0 + 0.3 * w * (TAU * t / SWAY_PERIOD).sin())
    }

    fn render(&mut self, settings: &CameraSettings, t: f64) -> Frame {
        let (w, h) = (settings.width, settings.height);
        let mut frame = Frame::from_pixel(w, h, image::Rgb(BACKGROUND));
        let Some(center) = Self::line_center(t, w) else {
            return frame;
        };

        let half = (w / 32).max(2) as f64;
        for y in 0..h {
            let jitter: f64 = self.rng.gen_range(-1.5..1.5);
            let lo = (center - half + jitter).max(0.0) as u32;
            let hi = ((center + half + jitter).max(0.0) as u32).min(w);
            for x in lo..hi {
                frame.put_pixel(x, y, image::Rgb(LINE));
            }
        }
        frame
    }
}

impl Camera for SimulatedCamera {
    fn open(&mut self, settings: &CameraSettings) -> Result<(), CameraError> {
        info!(
            "Simulated camera {}x{} @{}fps",
            settings.width, settings.height, settings.fps
        );
        self.settings = Some(settings.clone());
        self.started = Instant::now();
        Ok(())
    }

    fn capture(&mut self) -> Result<Frame, CameraError> {
        let settings = self.settings.clone().ok_or(CameraError::NotOpened)?;
        thread::sleep(Duration::from_secs_f64(1.0 / settings.fps as f64));
        let t = self.started.elapsed().as_secs_f64();
        Ok(self.render(&settings, t))
    }

    fn close(&mut self) {
        self.settings = None;
    }
}

/// 只记录输出变化的电机后端
#[derive(Default)]
pub struct LoggingBackend {
    last: BTreeMap<MotorChannel, DriveSignal>,
}

impl MotorBackend for LoggingBackend {
    fn drive(&mut self, channel: MotorChannel, signal: DriveSignal) -> Result<(), DriveError> {
        if self.last.insert(channel, signal) != Some(signal) {
            debug!("{:?} -> {:?}", channel, signal);
        }
        Ok(())
    }

    fn servo_duty(&mut self, duty: f64) -> Result<(), DriveError> {
        debug!("servo duty {:.2}%", duty);
        Ok(())
    }

    fn release(&mut self) -> Result<(), DriveError> {
        self.last.clear();
        info!("Simulated motor outputs released");
        Ok(())
    }
}
