//! # Linebot Control - 转向控制和监督状态机
//!
//! ## 模块
//!
//! - `pid` - [`SteeringController`]：带死区和积分限幅的转向 PID
//! - `state` - [`RobotState`]：线程安全的模式/误差/转向/速度快照
//! - `sensor` - [`LineSensor`]：监督器依赖的线位置传感器接口
//! - `loop_policy` - [`LoopPolicy`]：控制循环节拍
//! - `supervisor` - [`Supervisor`]：控制线程、跟线/找线/直角状态机、热更新
//!
//! # 示例
//!
//! ```no_run
//! use linebot_control::Supervisor;
//! use linebot_drive::DriveTrain;
//! use linebot_tools::RobotConfig;
//! use linebot_vision::{ChannelCamera, LineTracker};
//! # use linebot_drive::{DriveError, DriveSignal, MotorBackend};
//! # use linebot_tools::MotorChannel;
//! # struct Pins;
//! # impl MotorBackend for Pins {
//! #     fn drive(&mut self, _: MotorChannel, _: DriveSignal) -> Result<(), DriveError> { Ok(()) }
//! #     fn servo_duty(&mut self, _: f64) -> Result<(), DriveError> { Ok(()) }
//! # }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RobotConfig::load("robot.toml")?;
//! let (_frames, camera) = ChannelCamera::new();
//! let tracker = LineTracker::new(camera, &config);
//! let drive = DriveTrain::new(Pins, &config);
//!
//! let supervisor = Supervisor::new(tracker, drive, &config);
//! supervisor.start()?;
//! println!("{:?}", supervisor.state());
//! supervisor.stop();
//! # Ok(())
//! # }
//! ```

mod error;
pub mod loop_policy;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod pid;
pub mod sensor;
pub mod state;
pub mod supervisor;

pub use error::ControlError;
pub use loop_policy::LoopPolicy;
pub use pid::SteeringController;
pub use sensor::LineSensor;
pub use state::{RobotMode, RobotSnapshot, RobotState};
pub use supervisor::{ControlLoop, Supervisor, adaptive_speed};
