//! 高层运动接口
//!
//! 实现者只需要提供车轮输出、制动、舵机和参数读写；定时动作（前进 N 秒、
//! 原地转向、直角机动、找线旋转）都由默认方法基于 [`Motion::wait`] 组合而成。
//! 所有定时动作都是阻塞的，结束时停车（coast）。

use crate::error::DriveError;
use linebot_tools::{ServoSettings, SpeedSettings, SpeedUpdate, TimeSettings};
use std::thread;
use std::time::Duration;

/// 转向方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Side {
    Left,
    /// 启动时的默认找线方向
    #[default]
    Right,
}

impl Side {
    /// 左 = -1，右 = +1
    pub fn sign(self) -> f64 {
        match self {
            Side::Left => -1.0,
            Side::Right => 1.0,
        }
    }

    /// 由误差符号推断（0 没有方向信息）
    pub fn from_error(error: f64) -> Option<Self> {
        if error > 0.0 {
            Some(Side::Right)
        } else if error < 0.0 {
            Some(Side::Left)
        } else {
            None
        }
    }
}

/// 控制循环需要读取的速度、时间和舵机参数
#[derive(Debug, Clone, PartialEq)]
pub struct DriveSettings {
    pub speeds: SpeedSettings,
    pub times: TimeSettings,
    pub servo: ServoSettings,
}

fn clamp_speed(value: f64, lo: f64, hi: f64) -> f64 {
    value.max(lo).min(hi)
}

/// 差速底盘运动接口
///
/// 同一时刻只能有一个线程调用（控制线程运行期间由它独占）。
pub trait Motion: Send {
    /// 四轮独立速度（前左、前右、后左、后右）
    fn set_wheels(
        &mut self,
        front_left: f64,
        front_right: f64,
        rear_left: f64,
        rear_right: f64,
    ) -> Result<(), DriveError>;

    /// 电磁制动；给出时长时制动结束后停车
    fn brake(&mut self, duration: Option<Duration>) -> Result<(), DriveError>;

    /// 舵机转到 `angle`（限制在配置范围内），`settle` 缺省使用配置的稳定时间
    fn set_servo(&mut self, angle: f64, settle: Option<Duration>) -> Result<(), DriveError>;

    /// 当前舵机角度
    fn servo_angle(&self) -> f64;

    /// 当前速度/时间参数快照
    fn settings(&self) -> DriveSettings;

    /// 热更新速度
    fn update_speeds(&mut self, update: &SpeedUpdate);

    /// 阻塞等待（mock 实现可以只记录不等待）
    fn wait(&mut self, duration: Duration) {
        thread::sleep(duration);
    }

    /// 左右两侧速度（差速）
    fn set_speed(&mut self, left: f64, right: f64) -> Result<(), DriveError> {
        self.set_wheels(left, right, left, right)
    }

    /// 停车（coast）
    fn stop(&mut self) -> Result<(), DriveError> {
        self.set_wheels(0.0, 0.0, 0.0, 0.0)
    }

    /// 前进，`speed` 缺省为 base_speed
    fn forward(
        &mut self,
        speed: Option<f64>,
        duration: Option<Duration>,
    ) -> Result<(), DriveError> {
        let s = clamp_speed(speed.unwrap_or(self.settings().speeds.base_speed), 0.0, 100.0);
        self.set_speed(s, s)?;
        finish_after(self, duration)
    }

    /// 后退，`speed` 缺省为 base_speed
    fn backward(
        &mut self,
        speed: Option<f64>,
        duration: Option<Duration>,
    ) -> Result<(), DriveError> {
        let s = clamp_speed(speed.unwrap_or(self.settings().speeds.base_speed), 0.0, 100.0);
        self.set_speed(-s, -s)?;
        finish_after(self, duration)
    }

    /// 原地左转（右侧前进、左侧后退），`speed` 缺省为 turn_speed
    fn turn_left(
        &mut self,
        speed: Option<f64>,
        duration: Option<Duration>,
    ) -> Result<(), DriveError> {
        let s = clamp_speed(speed.unwrap_or(self.settings().speeds.turn_speed), 0.0, 100.0);
        self.set_speed(-s, s)?;
        finish_after(self, duration)
    }

    /// 原地右转，`speed` 缺省为 turn_speed
    fn turn_right(
        &mut self,
        speed: Option<f64>,
        duration: Option<Duration>,
    ) -> Result<(), DriveError> {
        let s = clamp_speed(speed.unwrap_or(self.settings().speeds.turn_speed), 0.0, 100.0);
        self.set_speed(s, -s)?;
        finish_after(self, duration)
    }

    fn turn(
        &mut self,
        side: Side,
        speed: Option<f64>,
        duration: Option<Duration>,
    ) -> Result<(), DriveError> {
        match side {
            Side::Left => self.turn_left(speed, duration),
            Side::Right => self.turn_right(speed, duration),
        }
    }

    /// 弧线行驶
    ///
    /// `left = speed + steering`，`right = speed - steering`，
    /// 每侧限制在 `[min_turn_speed, max_speed]`；steering 为负时向左。
    fn curve(&mut self, speed: f64, steering: f64) -> Result<(), DriveError> {
        let speeds = self.settings().speeds;
        let speed = clamp_speed(speed, -100.0, 100.0);
        let steering = clamp_speed(steering, -100.0, 100.0);
        let left = clamp_speed(speed + steering, speeds.min_turn_speed, speeds.max_speed);
        let right = clamp_speed(speed - steering, speeds.min_turn_speed, speeds.max_speed);
        self.set_speed(left, right)
    }

    /// 90° 原地转向（right_angle_turn_speed × right_angle_turn_time）
    fn right_angle_turn(&mut self, side: Side) -> Result<(), DriveError> {
        let DriveSettings { speeds, times, .. } = self.settings();
        self.turn(side, Some(speeds.right_angle_turn_speed), Some(times.right_angle_turn()))
    }

    /// 找线旋转，`duration` 缺省为 search_time
    fn search_turn(&mut self, side: Side, duration: Option<Duration>) -> Result<(), DriveError> {
        let DriveSettings { speeds, times, .. } = self.settings();
        let duration = duration.unwrap_or_else(|| times.search());
        self.turn(side, Some(speeds.search_turn_speed), Some(duration))
    }

    /// 停车并等待，`duration` 缺省为 maneuver_pause
    fn pause(&mut self, duration: Option<Duration>) -> Result<(), DriveError> {
        self.stop()?;
        let duration = duration.unwrap_or_else(|| self.settings().times.maneuver_pause());
        self.wait(duration);
        Ok(())
    }

    /// 舵机回中
    fn servo_center(&mut self, settle: Option<Duration>) -> Result<(), DriveError> {
        let center = self.settings().servo.angle_center;
        self.set_servo(center, settle)
    }
}

/// 定时动作：等待后停车
fn finish_after<M: Motion + ?Sized>(
    motion: &mut M,
    duration: Option<Duration>,
) -> Result<(), DriveError> {
    if let Some(duration) = duration {
        motion.wait(duration);
        motion.stop()?;
    }
    Ok(())
}

impl<M: Motion + ?Sized> Motion for Box<M> {
    fn set_wheels(&mut self, fl: f64, fr: f64, rl: f64, rr: f64) -> Result<(), DriveError> {
        (**self).set_wheels(fl, fr, rl, rr)
    }
    fn brake(&mut self, duration: Option<Duration>) -> Result<(), DriveError> {
        (**self).brake(duration)
    }
    fn set_servo(&mut self, angle: f64, settle: Option<Duration>) -> Result<(), DriveError> {
        (**self).set_servo(angle, settle)
    }
    fn servo_angle(&self) -> f64 {
        (**self).servo_angle()
    }
    fn settings(&self) -> DriveSettings {
        (**self).settings()
    }
    fn update_speeds(&mut self, update: &SpeedUpdate) {
        (**self).update_speeds(update)
    }
    fn wait(&mut self, duration: Duration) {
        (**self).wait(duration)
    }
    fn set_speed(&mut self, left: f64, right: f64) -> Result<(), DriveError> {
        (**self).set_speed(left, right)
    }
    fn stop(&mut self) -> Result<(), DriveError> {
        (**self).stop()
    }
    fn forward(
        &mut self,
        speed: Option<f64>,
        duration: Option<Duration>,
    ) -> Result<(), DriveError> {
        (**self).forward(speed, duration)
    }
    fn backward(
        &mut self,
        speed: Option<f64>,
        duration: Option<Duration>,
    ) -> Result<(), DriveError> {
        (**self).backward(speed, duration)
    }
    fn turn_left(
        &mut self,
        speed: Option<f64>,
        duration: Option<Duration>,
    ) -> Result<(), DriveError> {
        (**self).turn_left(speed, duration)
    }
    fn turn_right(
        &mut self,
        speed: Option<f64>,
        duration: Option<Duration>,
    ) -> Result<(), DriveError> {
        (**self).turn_right(speed, duration)
    }
    fn turn(
        &mut self,
        side: Side,
        speed: Option<f64>,
        duration: Option<Duration>,
    ) -> Result<(), DriveError> {
        (**self).turn(side, speed, duration)
    }
    fn curve(&mut self, speed: f64, steering: f64) -> Result<(), DriveError> {
        (**self).curve(speed, steering)
    }
    fn right_angle_turn(&mut self, side: Side) -> Result<(), DriveError> {
        (**self).right_angle_turn(side)
    }
    fn search_turn(&mut self, side: Side, duration: Option<Duration>) -> Result<(), DriveError> {
        (**self).search_turn(side, duration)
    }
    fn pause(&mut self, duration: Option<Duration>) -> Result<(), DriveError> {
        (**self).pause(duration)
    }
    fn servo_center(&mut self, settle: Option<Duration>) -> Result<(), DriveError> {
        (**self).servo_center(settle)
    }
}
