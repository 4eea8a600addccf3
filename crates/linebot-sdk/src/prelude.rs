//! 常用类型一次导入

pub use linebot_control::{
    ControlError, LineSensor, LoopPolicy, RobotMode, RobotSnapshot, SteeringController, Supervisor,
};
pub use linebot_drive::{DriveError, DriveSignal, DriveTrain, Motion, MotorBackend, Side};
pub use linebot_tools::{
    ConfigError, LiveSettings, MotorChannel, PidUpdate, RobotConfig, SpeedUpdate, VisionUpdate,
};
pub use linebot_vision::{
    Camera, CameraError, ChannelCamera, Frame, LineObservation, LineTracker, VisionError,
};
