//! Linebot SDK - 巡线机器人感知到执行的控制核心
//!
//! # 架构设计
//!
//! 从底层到高层：
//!
//! - **工具层** (`tools`): 配置、热更新结构体、带超时的 join
//! - **视觉层** (`vision`): 相机抽象、掩码/连通区域/选线、调试帧
//! - **底盘层** (`drive`): `Motion` trait、四轮差速底盘、引脚级后端
//! - **控制层** (`control`): 转向 PID、状态快照、监督状态机
//!
//! # 快速开始
//!
//! ```rust
//! use linebot_sdk::prelude::*;
//! ```
//!
//! 进程入口先初始化日志：
//!
//! ```rust
//! linebot_sdk::init_logger("info");
//! ```

pub mod prelude;

mod logging;

pub use linebot_control as control;
pub use linebot_drive as drive;
pub use linebot_tools as tools;
pub use linebot_vision as vision;

pub use logging::init_logger;

// 各层错误
pub use linebot_control::ControlError;
pub use linebot_drive::DriveError;
pub use linebot_tools::ConfigError;
pub use linebot_vision::{CameraError, VisionError};

// 推荐入口
pub use linebot_control::{LineSensor, RobotMode, RobotSnapshot, Supervisor};
pub use linebot_drive::{DriveTrain, Motion, MotorBackend};
pub use linebot_tools::RobotConfig;
pub use linebot_vision::{Camera, LineTracker};
