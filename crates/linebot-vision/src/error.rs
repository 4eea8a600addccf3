use crate::camera::CameraError;
use linebot_tools::ConfigError;
use thiserror::Error;

/// 视觉管线错误
#[derive(Error, Debug)]
pub enum VisionError {
    /// 相机打开或采集失败
    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    /// 上一次停止时采集线程没有按时退出，相机句柄已被放弃
    #[error("Camera is unavailable (capture thread did not return it)")]
    CameraUnavailable,

    /// 调试帧编码失败
    #[error("Debug frame encode error: {0}")]
    Encode(#[from] image::ImageError),

    /// 设置更新非法
    #[error("Invalid vision settings: {0}")]
    Settings(#[from] ConfigError),
}
