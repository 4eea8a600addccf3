//! # Linebot Drive - 差速底盘与相机舵机
//!
//! 控制循环只通过 [`Motion`] trait 驱动底盘：
//!
//! - [`DriveTrain`] 把差速指令映射到四个车轮，处理通道映射和方向修正，
//!   最终交给引脚级的 [`MotorBackend`]
//! - 启用 `mock` feature 后提供 [`mock::MockBackend`] 和 [`mock::MockMotion`]，
//!   只记录指令、不做任何等待
//!
//! 速度统一使用 -100..=100 标度：正为前进，负为后退。

mod backend;
mod drivetrain;
mod error;
mod motion;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use backend::{DriveSignal, MotorBackend};
pub use drivetrain::DriveTrain;
pub use error::DriveError;
pub use motion::{DriveSettings, Motion, Side};
