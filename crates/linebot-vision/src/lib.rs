//! # Linebot Vision - 线跟踪视觉管线
//!
//! 相机帧 → ROI 二值掩码 → 连通区域 → 连续性加权选线 → 线位置误差。
//!
//! ## 模块
//!
//! - `camera` - 相机抽象（[`Camera`] trait）和基于通道的 [`ChannelCamera`]
//! - `mask` - ROI 裁剪、灰度、模糊、反相阈值、边缘屏蔽
//! - `blob` - 8 连通区域提取
//! - `analyzer` - 纯函数式的单帧分析（选线、误差、直角检测）
//! - `debug` - 调试帧标注和 JPEG 编码
//! - `liveness` - 调试帧请求的存活窗口
//! - `tracker` - [`LineTracker`]：采集线程和线程安全的观测读取
//!
//! # 示例
//!
//! ```no_run
//! use linebot_tools::RobotConfig;
//! use linebot_vision::{ChannelCamera, LineTracker};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RobotConfig::load("robot.toml")?;
//! let (_frames, camera) = ChannelCamera::new();
//! let tracker = LineTracker::new(camera, &config);
//! tracker.start()?;
//! let obs = tracker.observation();
//! println!("error={} lost={}", obs.error, obs.lost);
//! tracker.stop();
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod blob;
pub mod camera;
pub mod debug;
mod error;
pub mod liveness;
pub mod mask;
pub mod tracker;

pub use analyzer::{Analysis, LineAnalyzer, LineObservation};
pub use blob::Blob;
pub use camera::{Camera, CameraError, ChannelCamera, FrameSender};
pub use error::VisionError;
pub use liveness::LivenessWindow;
pub use mask::Roi;
pub use tracker::{LineTracker, TrackerSettings};

/// 相机帧（RGB，行优先）
pub type Frame = image::RgbImage;
