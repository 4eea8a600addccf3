//! Mock 后端
//!
//! 两个实现都是 `Clone` 的共享句柄：一份交给被测对象，一份留在测试里检查。

use crate::backend::{DriveSignal, MotorBackend};
use crate::error::DriveError;
use crate::motion::{DriveSettings, Motion, Side};
use linebot_tools::{MotorChannel, RobotConfig, SpeedUpdate};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
struct BackendLog {
    signals: Vec<(MotorChannel, DriveSignal)>,
    servo_duties: Vec<f64>,
    released: bool,
}

/// 记录所有引脚级输出的后端
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    log: Arc<Mutex<BackendLog>>,
    fail: Arc<AtomicBool>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// 之后的所有输出都返回错误
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn signals(&self) -> Vec<(MotorChannel, DriveSignal)> {
        self.log.lock().signals.clone()
    }

    pub fn signals_for(&self, channel: MotorChannel) -> Vec<DriveSignal> {
        self.log
            .lock()
            .signals
            .iter()
            .filter(|(ch, _)| *ch == channel)
            .map(|(_, s)| *s)
            .collect()
    }

    pub fn last_signal(&self, channel: MotorChannel) -> Option<DriveSignal> {
        self.signals_for(channel).last().copied()
    }

    /// 通道最近一次输出还原为车轮速度（乘回方向修正）
    pub fn wheel_speed(&self, channel: MotorChannel, inversion: i8) -> f64 {
        self.last_signal(channel)
            .map_or(0.0, |s| s.signed_speed() * inversion as f64)
    }

    pub fn servo_duties(&self) -> Vec<f64> {
        self.log.lock().servo_duties.clone()
    }

    pub fn is_released(&self) -> bool {
        self.log.lock().released
    }

    fn check(&self) -> Result<(), DriveError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(DriveError::Backend("mock backend failure".into()))
        } else {
            Ok(())
        }
    }
}

impl MotorBackend for MockBackend {
    fn drive(&mut self, channel: MotorChannel, signal: DriveSignal) -> Result<(), DriveError> {
        self.check()?;
        self.log.lock().signals.push((channel, signal));
        Ok(())
    }

    fn servo_duty(&mut self, duty: f64) -> Result<(), DriveError> {
        self.check()?;
        self.log.lock().servo_duties.push(duty);
        Ok(())
    }

    fn release(&mut self) -> Result<(), DriveError> {
        self.log.lock().released = true;
        Ok(())
    }
}

/// [`MockMotion`] 记录的高层指令
#[derive(Debug, Clone, PartialEq)]
pub enum MotionCommand {
    Wheels([f64; 4]),
    SetSpeed { left: f64, right: f64 },
    Stop,
    Brake(Option<Duration>),
    Curve { speed: f64, steering: f64 },
    RightAngleTurn(Side),
    Servo(f64),
    Wait(Duration),
}

#[derive(Debug)]
struct MotionState {
    commands: Vec<MotionCommand>,
    settings: DriveSettings,
    servo_angle: f64,
}

/// 只记录指令、从不等待的 [`Motion`]
///
/// `stop()` 即使在故障注入状态下也会成功，用来验证出错后的安全停车。
#[derive(Debug, Clone)]
pub struct MockMotion {
    state: Arc<Mutex<MotionState>>,
    fail: Arc<AtomicBool>,
}

impl MockMotion {
    pub fn new(config: &RobotConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(MotionState {
                commands: Vec::new(),
                settings: DriveSettings {
                    speeds: config.speeds.clone(),
                    times: config.times.clone(),
                    servo: config.servo.clone(),
                },
                servo_angle: config.servo_angle(),
            })),
            fail: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 故障注入：之后的运动指令（除 `stop()` 外）都返回错误
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn commands(&self) -> Vec<MotionCommand> {
        self.state.lock().commands.clone()
    }

    pub fn last_command(&self) -> Option<MotionCommand> {
        self.state.lock().commands.last().cloned()
    }

    pub fn count(&self, pred: impl Fn(&MotionCommand) -> bool) -> usize {
        self.state.lock().commands.iter().filter(|c| pred(c)).count()
    }

    pub fn clear(&self) {
        self.state.lock().commands.clear();
    }

    fn record(&self, command: MotionCommand) -> Result<(), DriveError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DriveError::Backend(format!("mock motion failure on {:?}", command)));
        }
        self.state.lock().commands.push(command);
        Ok(())
    }
}

impl Motion for MockMotion {
    fn set_wheels(&mut self, fl: f64, fr: f64, rl: f64, rr: f64) -> Result<(), DriveError> {
        self.record(MotionCommand::Wheels([fl, fr, rl, rr]))
    }

    fn set_speed(&mut self, left: f64, right: f64) -> Result<(), DriveError> {
        self.record(MotionCommand::SetSpeed { left, right })
    }

    fn stop(&mut self) -> Result<(), DriveError> {
        self.state.lock().commands.push(MotionCommand::Stop);
        Ok(())
    }

    fn brake(&mut self, duration: Option<Duration>) -> Result<(), DriveError> {
        self.record(MotionCommand::Brake(duration))
    }

    fn curve(&mut self, speed: f64, steering: f64) -> Result<(), DriveError> {
        self.record(MotionCommand::Curve { speed, steering })
    }

    fn right_angle_turn(&mut self, side: Side) -> Result<(), DriveError> {
        self.record(MotionCommand::RightAngleTurn(side))
    }

    fn set_servo(&mut self, angle: f64, _settle: Option<Duration>) -> Result<(), DriveError> {
        let servo = self.state.lock().settings.servo.clone();
        let angle = angle.clamp(servo.angle_min, servo.angle_max);
        self.record(MotionCommand::Servo(angle))?;
        self.state.lock().servo_angle = angle;
        Ok(())
    }

    fn servo_angle(&self) -> f64 {
        self.state.lock().servo_angle
    }

    fn settings(&self) -> DriveSettings {
        self.state.lock().settings.clone()
    }

    fn update_speeds(&mut self, update: &SpeedUpdate) {
        update.apply(&mut self.state.lock().settings.speeds);
    }

    fn wait(&mut self, duration: Duration) {
        self.state.lock().commands.push(MotionCommand::Wait(duration));
    }
}
