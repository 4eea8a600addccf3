//! 相机抽象层
//!
//! 具体相机驱动（CSI、USB、仿真）实现 [`Camera`] trait。
//! 旋转由驱动在出帧前完成（硬件 transform），视觉管线只在误差符号上
//! 处理 180° 倒装。

use crate::Frame;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use linebot_tools::CameraSettings;
use std::time::Duration;
use thiserror::Error;

/// 相机错误
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Camera device error: {0}")]
    Device(String),
    #[error("Unsupported camera config: {0}")]
    Unsupported(String),
    /// 在轮询周期内没有新帧（非故障，采集线程直接重试）
    #[error("Frame timeout")]
    Timeout,
    #[error("Camera not opened")]
    NotOpened,
    #[error("Camera disconnected")]
    Disconnected,
}

/// 相机驱动
pub trait Camera: Send {
    /// 按分辨率、帧率和旋转打开相机
    fn open(&mut self, settings: &CameraSettings) -> Result<(), CameraError>;

    /// 阻塞等待下一帧
    ///
    /// 实现应当在有限时间内返回（无帧时返回 [`CameraError::Timeout`]），
    /// 否则停止采集线程时只能等到 join 超时。
    fn capture(&mut self) -> Result<Frame, CameraError>;

    /// 释放相机
    fn close(&mut self) {}
}

impl Camera for Box<dyn Camera> {
    fn open(&mut self, settings: &CameraSettings) -> Result<(), CameraError> {
        (**self).open(settings)
    }

    fn capture(&mut self) -> Result<Frame, CameraError> {
        (**self).capture()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// [`ChannelCamera`] 的发送端
pub type FrameSender = Sender<Result<Frame, CameraError>>;

const DEFAULT_POLL: Duration = Duration::from_millis(50);

/// 由其他线程推送帧的相机
///
/// 用于测试和离线回放：发送端推送 `Ok(frame)` 模拟出帧，
/// 推送 `Err(..)` 模拟采集故障。
pub struct ChannelCamera {
    rx: Receiver<Result<Frame, CameraError>>,
    poll: Duration,
    opened: bool,
    open_error: Option<String>,
}

impl ChannelCamera {
    /// 创建相机和对应的发送端
    pub fn new() -> (FrameSender, Self) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (
            tx,
            Self {
                rx,
                poll: DEFAULT_POLL,
                opened: false,
                open_error: None,
            },
        )
    }

    /// 设置无帧时的轮询周期
    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    /// 让 `open()` 失败（模拟设备不存在）
    pub fn with_open_error(mut self, message: impl Into<String>) -> Self {
        self.open_error = Some(message.into());
        self
    }

    pub fn is_open(&self) -> bool {
        self.opened
    }
}

impl Camera for ChannelCamera {
    fn open(&mut self, settings: &CameraSettings) -> Result<(), CameraError> {
        if let Some(message) = &self.open_error {
            return Err(CameraError::Device(message.clone()));
        }
        tracing::debug!(
            "ChannelCamera opened {}x{} @{}fps rot={}",
            settings.width,
            settings.height,
            settings.fps,
            settings.rotation
        );
        self.opened = true;
        Ok(())
    }

    fn capture(&mut self) -> Result<Frame, CameraError> {
        if !self.opened {
            return Err(CameraError::NotOpened);
        }
        match self.rx.recv_timeout(self.poll) {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Timeout) => Err(CameraError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(CameraError::Disconnected),
        }
    }

    fn close(&mut self) {
        self.opened = false;
    }
}
