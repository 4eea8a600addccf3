//! 线位置传感器接口
//!
//! 监督器只依赖这组调用；[`LineTracker`] 是唯一的生产实现，
//! 测试里可以换成脚本化的观测源。

use linebot_tools::VisionUpdate;
use linebot_vision::{LineObservation, LineTracker, TrackerSettings, VisionError};
use std::sync::Arc;

pub trait LineSensor: Send + Sync {
    /// 开始产生观测（重复调用为 no-op）
    fn start(&self) -> Result<(), VisionError>;

    /// 停止（未启动时为 no-op）
    fn stop(&self);

    /// 最近一帧的 error/lost/right_angle
    fn observation(&self) -> LineObservation;

    fn update_settings(&self, update: &VisionUpdate) -> Result<(), VisionError>;

    fn settings(&self) -> TrackerSettings;
}

impl LineSensor for LineTracker {
    fn start(&self) -> Result<(), VisionError> {
        LineTracker::start(self)
    }

    fn stop(&self) {
        LineTracker::stop(self)
    }

    fn observation(&self) -> LineObservation {
        LineTracker::observation(self)
    }

    fn update_settings(&self, update: &VisionUpdate) -> Result<(), VisionError> {
        LineTracker::update_settings(self, update)
    }

    fn settings(&self) -> TrackerSettings {
        LineTracker::settings(self)
    }
}

impl<S: LineSensor + ?Sized> LineSensor for Arc<S> {
    fn start(&self) -> Result<(), VisionError> {
        (**self).start()
    }

    fn stop(&self) {
        (**self).stop()
    }

    fn observation(&self) -> LineObservation {
        (**self).observation()
    }

    fn update_settings(&self, update: &VisionUpdate) -> Result<(), VisionError> {
        (**self).update_settings(update)
    }

    fn settings(&self) -> TrackerSettings {
        (**self).settings()
    }
}
