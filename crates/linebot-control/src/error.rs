use linebot_drive::DriveError;
use linebot_tools::ConfigError;
use linebot_vision::VisionError;
use thiserror::Error;

/// 控制层错误
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("Vision error: {0}")]
    Vision(#[from] VisionError),

    #[error("Drive error: {0}")]
    Drive(#[from] DriveError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// 控制线程运行期间底盘由它独占
    #[error("Control loop is running, stop it before {0}")]
    Busy(&'static str),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}
