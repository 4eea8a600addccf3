//! 机器人状态
//!
//! 控制线程每次迭代结束时整体替换一次快照；读者拿到的是拷贝。

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 监督状态机模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotMode {
    /// 从未启动
    #[default]
    Idle,
    /// PID 跟线
    Following,
    /// 丢线后原地旋转找线
    Searching,
    /// 直角机动
    RightAngle,
    /// 找线超时或已停止
    Stopped,
}

impl RobotMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RobotMode::Idle => "idle",
            RobotMode::Following => "following",
            RobotMode::Searching => "searching",
            RobotMode::RightAngle => "right_angle",
            RobotMode::Stopped => "stopped",
        }
    }
}

impl fmt::Display for RobotMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 状态快照
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RobotSnapshot {
    pub mode: RobotMode,
    /// 线位置误差（像素）
    pub error: f64,
    /// 转向量 `[-100, 100]`
    pub steering: f64,
    /// 前进速度
    pub speed: f64,
    pub running: bool,
}

impl RobotSnapshot {
    /// 指定模式、其余为 0 的快照
    pub fn halted(mode: RobotMode, error: f64, running: bool) -> Self {
        Self {
            mode,
            error,
            steering: 0.0,
            speed: 0.0,
            running,
        }
    }
}

/// 线程安全的状态单元
#[derive(Debug, Default)]
pub struct RobotState {
    inner: Mutex<RobotSnapshot>,
}

impl RobotState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> RobotSnapshot {
        *self.inner.lock()
    }

    pub fn mode(&self) -> RobotMode {
        self.inner.lock().mode
    }

    /// 整体替换
    pub fn publish(&self, snapshot: RobotSnapshot) {
        *self.inner.lock() = snapshot;
    }
}
