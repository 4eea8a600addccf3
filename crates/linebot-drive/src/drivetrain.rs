//! DriveTrain - 四轮差速底盘
//!
//! 车轮 → 通道映射和每个通道的方向修正都来自 `[motors]` 配置，
//! 控制层只需要关心前/后/左/右。

use crate::backend::{DriveSignal, MotorBackend};
use crate::error::DriveError;
use crate::motion::{DriveSettings, Motion};
use linebot_tools::{
    MotorChannel, MotorSettings, RobotConfig, ServoSettings, SpeedSettings, SpeedUpdate,
    TimeSettings, Wheel,
};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// 舵机角度 → PWM 占空比（50Hz 舵机：0° = 2%，180° = 12%）
pub fn servo_duty(angle: f64) -> f64 {
    2.0 + angle / 18.0
}

/// 四轮差速底盘
pub struct DriveTrain<B: MotorBackend> {
    backend: B,
    motors: MotorSettings,
    speeds: SpeedSettings,
    times: TimeSettings,
    servo: ServoSettings,
    servo_angle: f64,
}

impl<B: MotorBackend> DriveTrain<B> {
    /// 创建底盘，舵机角度记为配置值但不立即驱动
    pub fn new(backend: B, config: &RobotConfig) -> Self {
        Self {
            backend,
            motors: config.motors.clone(),
            speeds: config.speeds.clone(),
            times: config.times.clone(),
            servo: config.servo.clone(),
            servo_angle: config.servo_angle(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// 单个车轮（应用方向修正后限幅到 ±100）
    pub fn set_wheel(&mut self, wheel: Wheel, speed: f64) -> Result<(), DriveError> {
        if !speed.is_finite() {
            return Err(DriveError::InvalidCommand(format!(
                "speed for {:?} is not finite: {}",
                wheel, speed
            )));
        }
        let channel = self.motors.channel_of(wheel).ok_or_else(|| {
            DriveError::InvalidCommand(format!("wheel {:?} has no motor channel", wheel))
        })?;
        let corrected = (speed * self.motors.inversion_of(channel) as f64).clamp(-100.0, 100.0);
        trace!("{:?} ({:?}) -> {:+.1}", wheel, channel, corrected);
        self.backend.drive(channel, DriveSignal::from_speed(corrected))
    }

    /// 停车并释放后端输出
    pub fn shutdown(&mut self) -> Result<(), DriveError> {
        self.stop()?;
        self.backend.servo_duty(0.0)?;
        self.backend.release()?;
        info!("Drive train released");
        Ok(())
    }
}

impl<B: MotorBackend> Motion for DriveTrain<B> {
    fn set_wheels(
        &mut self,
        front_left: f64,
        front_right: f64,
        rear_left: f64,
        rear_right: f64,
    ) -> Result<(), DriveError> {
        self.set_wheel(Wheel::FrontLeft, front_left)?;
        self.set_wheel(Wheel::FrontRight, front_right)?;
        self.set_wheel(Wheel::RearLeft, rear_left)?;
        self.set_wheel(Wheel::RearRight, rear_right)
    }

    fn brake(&mut self, duration: Option<Duration>) -> Result<(), DriveError> {
        for channel in MotorChannel::ALL {
            self.backend.drive(channel, DriveSignal::Brake)?;
        }
        if let Some(duration) = duration {
            self.wait(duration);
            self.stop()?;
        }
        Ok(())
    }

    fn set_servo(&mut self, angle: f64, settle: Option<Duration>) -> Result<(), DriveError> {
        if !angle.is_finite() {
            return Err(DriveError::InvalidCommand(format!("servo angle is not finite: {}", angle)));
        }
        let angle = angle.clamp(self.servo.angle_min, self.servo.angle_max);
        self.backend.servo_duty(servo_duty(angle))?;
        self.servo_angle = angle;
        debug!("Servo -> {:.1}°", angle);

        let settle = settle.unwrap_or_else(|| self.times.servo_settle());
        if !settle.is_zero() {
            self.wait(settle);
            // 停止输出，避免舵机抖动发声
            self.backend.servo_duty(0.0)?;
        }
        Ok(())
    }

    fn servo_angle(&self) -> f64 {
        self.servo_angle
    }

    fn settings(&self) -> DriveSettings {
        DriveSettings {
            speeds: self.speeds.clone(),
            times: self.times.clone(),
            servo: self.servo.clone(),
        }
    }

    fn update_speeds(&mut self, update: &SpeedUpdate) {
        update.apply(&mut self.speeds);
        info!("Speed settings updated: {:?}", update);
    }
}

impl<B: MotorBackend> Drop for DriveTrain<B> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("Failed to release drive train: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;
    use crate::motion::Side;

    const CONFIG: &str = include_str!("../../../config/robot.toml");

    fn drivetrain() -> (MockBackend, DriveTrain<MockBackend>) {
        let config = RobotConfig::from_toml_str(CONFIG).unwrap();
        let backend = MockBackend::new();
        (backend.clone(), DriveTrain::new(backend, &config))
    }

    #[test]
    fn test_inversion_is_applied() {
        let (backend, mut drive) = drivetrain();
        drive.set_speed(30.0, 30.0).unwrap();
        // driver1_b / driver2_b 反向安装
        assert_eq!(backend.last_signal(MotorChannel::Driver1A), Some(DriveSignal::Forward(30.0)));
        assert_eq!(backend.last_signal(MotorChannel::Driver1B), Some(DriveSignal::Reverse(30.0)));
        assert_eq!(backend.last_signal(MotorChannel::Driver2A), Some(DriveSignal::Forward(30.0)));
        assert_eq!(backend.last_signal(MotorChannel::Driver2B), Some(DriveSignal::Reverse(30.0)));
    }

    #[test]
    fn test_wheel_speed_is_clamped() {
        let (backend, mut drive) = drivetrain();
        drive.set_wheel(Wheel::FrontLeft, 250.0).unwrap();
        assert_eq!(backend.last_signal(MotorChannel::Driver1A), Some(DriveSignal::Forward(100.0)));
    }

    #[test]
    fn test_nan_speed_rejected() {
        let (_backend, mut drive) = drivetrain();
        assert!(matches!(
            drive.set_speed(f64::NAN, 0.0),
            Err(DriveError::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_curve_clamps_each_side() {
        let (backend, mut drive) = drivetrain();
        // speed 40 + steering 30: left 70 → max 45, right 10
        drive.curve(40.0, 30.0).unwrap();
        assert_eq!(backend.wheel_speed(MotorChannel::Driver1A, 1), 45.0);
        assert_eq!(backend.wheel_speed(MotorChannel::Driver1B, -1), 10.0);

        // speed 20 - steering 80: right 100 → 45, left -60 → min_turn -20
        drive.curve(20.0, -80.0).unwrap();
        assert_eq!(backend.wheel_speed(MotorChannel::Driver1A, 1), -20.0);
        assert_eq!(backend.wheel_speed(MotorChannel::Driver1B, -1), 45.0);
    }

    #[test]
    fn test_brake_then_release() {
        let (backend, mut drive) = drivetrain();
        drive.brake(None).unwrap();
        for ch in MotorChannel::ALL {
            assert_eq!(backend.last_signal(ch), Some(DriveSignal::Brake));
        }
        drive.brake(Some(Duration::from_millis(1))).unwrap();
        for ch in MotorChannel::ALL {
            assert_eq!(backend.last_signal(ch), Some(DriveSignal::Coast));
        }
    }

    #[test]
    fn test_servo_duty_and_clamp() {
        let (backend, mut drive) = drivetrain();
        drive.set_servo(90.0, Some(Duration::ZERO)).unwrap();
        assert_eq!(backend.servo_duties(), vec![7.0]);
        assert_eq!(drive.servo_angle(), 90.0);

        // 超出 [30, 150] 被限幅，稳定后输出归零
        drive.set_servo(180.0, Some(Duration::from_millis(1))).unwrap();
        assert_eq!(drive.servo_angle(), 150.0);
        assert_eq!(backend.servo_duties(), vec![7.0, servo_duty(150.0), 0.0]);
    }

    #[test]
    fn test_right_angle_turn_ends_stopped() {
        let config = RobotConfig::from_toml_str(CONFIG).unwrap();
        let mut config = config;
        config.times.right_angle_turn_time = 0.001;
        let backend = MockBackend::new();
        let mut drive = DriveTrain::new(backend.clone(), &config);

        drive.right_angle_turn(Side::Left).unwrap();
        let fl = backend.signals_for(MotorChannel::Driver1A);
        // 左转：左侧后退，结束时停车
        assert_eq!(fl, vec![DriveSignal::Reverse(45.0), DriveSignal::Coast]);
    }

    #[test]
    fn test_update_speeds() {
        let (_backend, mut drive) = drivetrain();
        drive.update_speeds(&SpeedUpdate {
            base: Some(50.0),
            ..Default::default()
        });
        assert_eq!(drive.settings().speeds.base_speed, 50.0);
        assert_eq!(drive.settings().speeds.max_speed, 45.0);
    }

    #[test]
    fn test_drop_releases_backend() {
        let (backend, drive) = drivetrain();
        drop(drive);
        assert!(backend.is_released());
    }
}
