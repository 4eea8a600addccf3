use thiserror::Error;

/// 底盘错误
#[derive(Error, Debug)]
pub enum DriveError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    /// 引脚级后端故障
    #[error("Motor backend error: {0}")]
    Backend(String),

    /// 指令参数非法（NaN 速度、未映射的车轮）
    #[error("Invalid motion command: {0}")]
    InvalidCommand(String),
}
