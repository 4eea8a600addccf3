//! # Linebot Tools - 共享数据结构和工具
//!
//! **依赖原则**: 不依赖任何硬件相关 crate，所有上层 crate 都可以安全引用。
//!
//! ## 包含模块
//!
//! - `config` - 机器人配置（TOML，只在构造时读取一次）
//! - `update` - 运行时热更新用的部分更新结构体
//! - `join` - 带超时的线程 join

pub mod config;
pub mod join;
pub mod update;

// 重新导出常用类型
pub use config::{
    CameraSettings, ConfigError, ControlSettings, LineSettings, LiveSettings, MotorChannel,
    MotorInversion, MotorMapping, MotorSettings, PidSettings, RobotConfig, Rotation,
    ServoSettings, SpeedSettings, TimeSettings, VisionSettings, WebSettings, Wheel,
};
pub use join::{JoinError, JoinTimeout};
pub use update::{PidUpdate, SpeedUpdate, VisionUpdate};
