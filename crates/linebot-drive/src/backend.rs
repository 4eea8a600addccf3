//! 引脚级电机后端
//!
//! 一个通道对应驱动板上的一路 H 桥（方向脚 + PWM）。

use crate::error::DriveError;
use linebot_tools::MotorChannel;

/// 单个通道的输出
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriveSignal {
    /// 正转，占空比 0..=100
    Forward(f64),
    /// 反转，占空比 0..=100
    Reverse(f64),
    /// 两个方向脚都拉低，车轮自由滑行
    Coast,
    /// 两个方向脚都拉高、满占空比，电磁制动
    Brake,
}

impl DriveSignal {
    /// 由带符号速度生成（已经过方向修正和限幅）
    pub fn from_speed(speed: f64) -> Self {
        if speed > 0.0 {
            DriveSignal::Forward(speed)
        } else if speed < 0.0 {
            DriveSignal::Reverse(-speed)
        } else {
            DriveSignal::Coast
        }
    }

    /// 带符号速度（制动视为 0）
    pub fn signed_speed(&self) -> f64 {
        match *self {
            DriveSignal::Forward(duty) => duty,
            DriveSignal::Reverse(duty) => -duty,
            DriveSignal::Coast | DriveSignal::Brake => 0.0,
        }
    }
}

/// 电机/舵机硬件后端
pub trait MotorBackend: Send {
    fn drive(&mut self, channel: MotorChannel, signal: DriveSignal) -> Result<(), DriveError>;

    /// 舵机 PWM 占空比（百分比），0 表示停止输出
    fn servo_duty(&mut self, duty: f64) -> Result<(), DriveError>;

    /// 释放所有输出
    fn release(&mut self) -> Result<(), DriveError> {
        Ok(())
    }
}

impl MotorBackend for Box<dyn MotorBackend> {
    fn drive(&mut self, channel: MotorChannel, signal: DriveSignal) -> Result<(), DriveError> {
        (**self).drive(channel, signal)
    }

    fn servo_duty(&mut self, duty: f64) -> Result<(), DriveError> {
        (**self).servo_duty(duty)
    }

    fn release(&mut self) -> Result<(), DriveError> {
        (**self).release()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_from_speed() {
        assert_eq!(DriveSignal::from_speed(30.0), DriveSignal::Forward(30.0));
        assert_eq!(DriveSignal::from_speed(-30.0), DriveSignal::Reverse(30.0));
        assert_eq!(DriveSignal::from_speed(0.0), DriveSignal::Coast);
        assert_eq!(DriveSignal::Reverse(12.5).signed_speed(), -12.5);
        assert_eq!(DriveSignal::Brake.signed_speed(), 0.0);
    }
}
