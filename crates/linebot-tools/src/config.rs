//! # 机器人配置
//!
//! 相机几何、视觉阈值、PID 增益、速度/时间限制、电机映射和网络设置。
//!
//! 配置在构造时读取一次；运行时只有一部分字段可以通过
//! [`update`](crate::update) 中的部分更新结构体热更新。
//!
//! 所有必需字段都没有 serde 默认值：缺少任何一个键都会在加载时返回
//! [`ConfigError::Parse`]，组件永远不会带着未定义的参数运行。
//!
//! # 示例
//!
//! ```toml
//! [camera]
//! width = 320
//! height = 240
//! fps = 30
//! rotation = 180
//!
//! [vision]
//! threshold_value = 60
//! blur_kernel = 3
//! roi_top_ratio = 0.55
//! roi_bottom_ratio = 1.0
//! side_margin_ratio = 0.05
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 写入配置文件失败
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML 解析失败（包括缺少必需键）
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML 序列化失败
    #[error("Config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// 字段取值非法
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// 相机安装旋转角度
///
/// 180° 表示相机倒装：左右语义镜像，误差需要取反。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// 角度值
    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// 是否为倒装（左右镜像）
    pub fn is_inverted(self) -> bool {
        self == Rotation::Deg180
    }
}

impl TryFrom<u16> for Rotation {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(format!("rotation must be 0, 90, 180 or 270, got {}", other)),
        }
    }
}

impl From<Rotation> for u16 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// `[camera]` 相机几何
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraSettings {
    /// 帧宽（像素）
    pub width: u32,
    /// 帧高（像素）
    pub height: u32,
    /// 帧率
    pub fps: u32,
    /// 安装旋转
    pub rotation: Rotation,
    /// 相机舵机角度（度），缺省时使用 `[servo] angle_center`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servo_angle: Option<f64>,
}

impl CameraSettings {
    /// 帧中心列（整除）
    pub fn center_x(&self) -> i32 {
        (self.width / 2) as i32
    }
}

/// 配置中任何时长字段的上限（秒）
pub const MAX_DURATION_SECS: f64 = 3600.0;

/// 秒数转 `Duration`，负数和 NaN 按 0，超过上限按上限
fn secs(value: f64) -> Duration {
    Duration::from_secs_f64(value.max(0.0).min(MAX_DURATION_SECS))
}

/// 有限且在 `[min, MAX_DURATION_SECS]` 内
fn check_secs(name: &str, value: f64, min: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= min && value <= MAX_DURATION_SECS {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{} must be within [{}, {}] seconds, got {}",
            name, min, MAX_DURATION_SECS, value
        )))
    }
}

fn default_debug_timeout_secs() -> f64 {
    3.0
}

fn default_jpeg_quality() -> u8 {
    60
}

/// `[vision]` 视觉阈值和 ROI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionSettings {
    /// 反相二值化阈值（灰度 <= 阈值为前景）
    pub threshold_value: u8,
    /// 模糊核大小（<= 1 表示不模糊，偶数会被强制为奇数）
    pub blur_kernel: u32,
    /// ROI 上边界（帧高比例）
    pub roi_top_ratio: f64,
    /// ROI 下边界（帧高比例）
    pub roi_bottom_ratio: f64,
    /// 左右边缘屏蔽宽度（帧宽比例）
    pub side_margin_ratio: f64,
    /// 调试帧存活窗口（秒）
    #[serde(default = "default_debug_timeout_secs")]
    pub debug_timeout_secs: f64,
    /// 调试帧 JPEG 质量
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl VisionSettings {
    /// 调试帧存活窗口
    pub fn debug_timeout(&self) -> Duration {
        secs(self.debug_timeout_secs)
    }

    /// 校验取值范围
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ratio_ok = |v: f64| (0.0..=1.0).contains(&v);
        if !ratio_ok(self.roi_top_ratio) || !ratio_ok(self.roi_bottom_ratio) {
            return Err(ConfigError::Invalid(format!(
                "ROI ratios must be within [0, 1], got top={} bottom={}",
                self.roi_top_ratio, self.roi_bottom_ratio
            )));
        }
        if self.roi_top_ratio >= self.roi_bottom_ratio {
            return Err(ConfigError::Invalid(format!(
                "roi_top_ratio ({}) must be below roi_bottom_ratio ({})",
                self.roi_top_ratio, self.roi_bottom_ratio
            )));
        }
        if !(0.0..0.5).contains(&self.side_margin_ratio) {
            return Err(ConfigError::Invalid(format!(
                "side_margin_ratio must be within [0, 0.5), got {}",
                self.side_margin_ratio
            )));
        }
        check_secs("debug_timeout_secs", self.debug_timeout_secs, 0.0)?;
        if self.debug_timeout_secs == 0.0 {
            return Err(ConfigError::Invalid(
                "debug_timeout_secs must be positive".to_string(),
            ));
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(ConfigError::Invalid(format!(
                "jpeg_quality must be within [1, 100], got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }
}

/// `[line]` 线跟踪启发式参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineSettings {
    /// 连续性权重指数
    pub continuity_weight_power: f64,
    /// 中心历史最大长度
    pub max_frames_memory: usize,
    /// 直角检测阈值（距帧中心像素）
    pub right_angle_error_threshold: f64,
    /// 是否启用直角检测与直角机动
    pub right_angle_enabled: bool,
}

impl LineSettings {
    /// 校验取值范围
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_frames_memory == 0 {
            return Err(ConfigError::Invalid(
                "max_frames_memory must be at least 1".to_string(),
            ));
        }
        if !self.continuity_weight_power.is_finite() || self.continuity_weight_power < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "continuity_weight_power must be a non-negative number, got {}",
                self.continuity_weight_power
            )));
        }
        Ok(())
    }
}

/// `[pid]` 转向 PID 参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PidSettings {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// 死区（|误差| 小于该值视为 0）
    pub dead_zone: f64,
    /// 积分项绝对值上限（anti-windup）
    pub max_integral: f64,
}

impl PidSettings {
    /// 仅指定增益，死区 0、积分上限 100
    pub fn with_gains(kp: f64, ki: f64, kd: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            dead_zone: 0.0,
            max_integral: 100.0,
        }
    }

    /// 校验取值范围
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("kp", self.kp),
            ("ki", self.ki),
            ("kd", self.kd),
            ("dead_zone", self.dead_zone),
            ("max_integral", self.max_integral),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "pid.{} must be a finite number, got {}",
                    name, value
                )));
            }
        }
        if self.dead_zone < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "dead_zone must be >= 0, got {}",
                self.dead_zone
            )));
        }
        if self.max_integral < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "max_integral must be >= 0, got {}",
                self.max_integral
            )));
        }
        Ok(())
    }
}

/// `[speeds]` 速度（-100..=100 标度）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedSettings {
    pub base_speed: f64,
    pub max_speed: f64,
    pub min_speed: f64,
    pub turn_speed: f64,
    /// 差速曲线中单侧允许的最低速度（可为负，即内侧反转）
    pub min_turn_speed: f64,
    pub curve_speed: f64,
    pub search_turn_speed: f64,
    pub right_angle_turn_speed: f64,
}

impl SpeedSettings {
    /// 校验取值范围
    pub fn validate(&self) -> Result<(), ConfigError> {
        let in_range = |name: &str, v: f64| {
            if (-100.0..=100.0).contains(&v) {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!(
                    "{} must be within [-100, 100], got {}",
                    name, v
                )))
            }
        };
        in_range("base_speed", self.base_speed)?;
        in_range("max_speed", self.max_speed)?;
        in_range("min_speed", self.min_speed)?;
        in_range("turn_speed", self.turn_speed)?;
        in_range("min_turn_speed", self.min_turn_speed)?;
        in_range("curve_speed", self.curve_speed)?;
        in_range("search_turn_speed", self.search_turn_speed)?;
        in_range("right_angle_turn_speed", self.right_angle_turn_speed)?;
        if self.min_speed > self.max_speed {
            return Err(ConfigError::Invalid(format!(
                "min_speed ({}) must not exceed max_speed ({})",
                self.min_speed, self.max_speed
            )));
        }
        if self.min_turn_speed > self.max_speed {
            return Err(ConfigError::Invalid(format!(
                "min_turn_speed ({}) must not exceed max_speed ({})",
                self.min_turn_speed, self.max_speed
            )));
        }
        Ok(())
    }
}

/// `[times]` 机动时间（秒）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSettings {
    pub right_angle_turn_time: f64,
    pub search_time: f64,
    pub servo_settle_time: f64,
    pub maneuver_pause: f64,
}

impl TimeSettings {
    pub fn right_angle_turn(&self) -> Duration {
        secs(self.right_angle_turn_time)
    }

    pub fn search(&self) -> Duration {
        secs(self.search_time)
    }

    pub fn servo_settle(&self) -> Duration {
        secs(self.servo_settle_time)
    }

    pub fn maneuver_pause(&self) -> Duration {
        secs(self.maneuver_pause)
    }

    /// 校验取值范围
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_secs("right_angle_turn_time", self.right_angle_turn_time, 0.0)?;
        check_secs("search_time", self.search_time, 0.0)?;
        check_secs("servo_settle_time", self.servo_settle_time, 0.0)?;
        check_secs("maneuver_pause", self.maneuver_pause, 0.0)
    }
}

/// `[servo]` 相机舵机角度限制（度）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServoSettings {
    pub angle_min: f64,
    pub angle_center: f64,
    pub angle_max: f64,
}

impl ServoSettings {
    /// 校验取值范围
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.angle_min <= self.angle_center && self.angle_center <= self.angle_max) {
            return Err(ConfigError::Invalid(format!(
                "servo angles must satisfy min <= center <= max, got {} / {} / {}",
                self.angle_min, self.angle_center, self.angle_max
            )));
        }
        if self.angle_min < 0.0 || self.angle_max > 180.0 {
            return Err(ConfigError::Invalid(format!(
                "servo angles must be within [0, 180], got [{}, {}]",
                self.angle_min, self.angle_max
            )));
        }
        Ok(())
    }
}

/// 电机驱动通道（两块双通道驱动板）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotorChannel {
    Driver1A,
    Driver1B,
    Driver2A,
    Driver2B,
}

impl MotorChannel {
    pub const ALL: [MotorChannel; 4] = [
        MotorChannel::Driver1A,
        MotorChannel::Driver1B,
        MotorChannel::Driver2A,
        MotorChannel::Driver2B,
    ];
}

/// 车轮物理位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Wheel {
    FrontLeft,
    FrontRight,
    RearLeft,
    RearRight,
}

impl Wheel {
    pub const ALL: [Wheel; 4] = [
        Wheel::FrontLeft,
        Wheel::FrontRight,
        Wheel::RearLeft,
        Wheel::RearRight,
    ];

    /// 是否为左侧车轮
    pub fn is_left(self) -> bool {
        matches!(self, Wheel::FrontLeft | Wheel::RearLeft)
    }
}

/// `[motors.mapping]` 通道 → 车轮
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorMapping {
    pub driver1_a: Wheel,
    pub driver1_b: Wheel,
    pub driver2_a: Wheel,
    pub driver2_b: Wheel,
}

fn default_inversion() -> i8 {
    1
}

/// `[motors.inversion]` 通道方向修正（+1 / -1）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorInversion {
    #[serde(default = "default_inversion")]
    pub driver1_a: i8,
    #[serde(default = "default_inversion")]
    pub driver1_b: i8,
    #[serde(default = "default_inversion")]
    pub driver2_a: i8,
    #[serde(default = "default_inversion")]
    pub driver2_b: i8,
}

impl Default for MotorInversion {
    fn default() -> Self {
        Self {
            driver1_a: 1,
            driver1_b: 1,
            driver2_a: 1,
            driver2_b: 1,
        }
    }
}

/// `[motors]` 电机映射与方向修正
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorSettings {
    pub mapping: MotorMapping,
    #[serde(default)]
    pub inversion: MotorInversion,
}

impl MotorSettings {
    /// 通道对应的车轮
    pub fn wheel_of(&self, channel: MotorChannel) -> Wheel {
        match channel {
            MotorChannel::Driver1A => self.mapping.driver1_a,
            MotorChannel::Driver1B => self.mapping.driver1_b,
            MotorChannel::Driver2A => self.mapping.driver2_a,
            MotorChannel::Driver2B => self.mapping.driver2_b,
        }
    }

    /// 通道方向修正
    pub fn inversion_of(&self, channel: MotorChannel) -> i8 {
        match channel {
            MotorChannel::Driver1A => self.inversion.driver1_a,
            MotorChannel::Driver1B => self.inversion.driver1_b,
            MotorChannel::Driver2A => self.inversion.driver2_a,
            MotorChannel::Driver2B => self.inversion.driver2_b,
        }
    }

    /// 车轮对应的通道
    ///
    /// 配置经过 [`validate`](Self::validate) 后每个车轮恰好对应一个通道。
    pub fn channel_of(&self, wheel: Wheel) -> Option<MotorChannel> {
        MotorChannel::ALL.into_iter().find(|&ch| self.wheel_of(ch) == wheel)
    }

    /// 校验：四个车轮各映射一次，方向修正只能是 ±1
    pub fn validate(&self) -> Result<(), ConfigError> {
        for wheel in Wheel::ALL {
            let count = MotorChannel::ALL
                .iter()
                .filter(|&&ch| self.wheel_of(ch) == wheel)
                .count();
            if count != 1 {
                return Err(ConfigError::Invalid(format!(
                    "wheel {:?} must be mapped exactly once, found {} channels",
                    wheel, count
                )));
            }
        }
        for ch in MotorChannel::ALL {
            let inv = self.inversion_of(ch);
            if inv != 1 && inv != -1 {
                return Err(ConfigError::Invalid(format!(
                    "inversion for {:?} must be 1 or -1, got {}",
                    ch, inv
                )));
            }
        }
        Ok(())
    }
}

/// `[control]` 控制循环策略
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSettings {
    /// 控制循环最小周期（毫秒），缺省表示不限速
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_loop_interval_ms: Option<u64>,
    /// 找线超时后停车状态下的暂停时间
    pub stopped_pause_ms: u64,
    /// 单次迭代出错后的退避时间
    pub error_backoff_ms: u64,
    /// 直角机动前停车稳定时间
    pub maneuver_settle_ms: u64,
    /// 停止时 join 线程的最长等待
    pub join_timeout_ms: u64,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            min_loop_interval_ms: None,
            stopped_pause_ms: 500,
            error_backoff_ms: 100,
            maneuver_settle_ms: 100,
            join_timeout_ms: 2000,
        }
    }
}

impl ControlSettings {
    pub fn min_loop_interval(&self) -> Option<Duration> {
        self.min_loop_interval_ms.map(Duration::from_millis)
    }

    pub fn stopped_pause(&self) -> Duration {
        Duration::from_millis(self.stopped_pause_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn maneuver_settle(&self) -> Duration {
        Duration::from_millis(self.maneuver_settle_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

/// `[web]` 遥测面板网络设置（面板本身在本 workspace 之外）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSettings {
    pub host: String,
    pub port: u16,
    pub stream_fps: u32,
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            stream_fps: 15,
        }
    }
}

/// 完整机器人配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotConfig {
    pub camera: CameraSettings,
    pub vision: VisionSettings,
    pub line: LineSettings,
    pub pid: PidSettings,
    pub speeds: SpeedSettings,
    pub times: TimeSettings,
    pub servo: ServoSettings,
    pub motors: MotorSettings,
    #[serde(default)]
    pub control: ControlSettings,
    #[serde(default)]
    pub web: WebSettings,
}

impl RobotConfig {
    /// 从文件加载并校验
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::info!(
            "Loaded config {}: {}x{} @{}fps rot={}",
            path.display(),
            config.camera.width,
            config.camera.height,
            config.camera.fps,
            config.camera.rotation
        );
        Ok(config)
    }

    /// 从 TOML 字符串解析并校验
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: RobotConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 序列化为 TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// 保存到文件
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = self.to_toml_string()?;
        fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("Saved config to {}", path.display());
        Ok(())
    }

    /// 校验所有分组
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "camera resolution must be non-zero, got {}x{}",
                self.camera.width, self.camera.height
            )));
        }
        if self.camera.fps == 0 {
            return Err(ConfigError::Invalid("camera fps must be non-zero".to_string()));
        }
        if let Some(angle) = self.camera.servo_angle
            && !angle.is_finite()
        {
            return Err(ConfigError::Invalid(format!(
                "camera servo_angle must be a finite number, got {}",
                angle
            )));
        }
        self.vision.validate()?;
        self.line.validate()?;
        self.pid.validate()?;
        self.speeds.validate()?;
        self.times.validate()?;
        self.servo.validate()?;
        self.motors.validate()?;
        Ok(())
    }

    /// 相机舵机初始角度
    pub fn servo_angle(&self) -> f64 {
        self.camera.servo_angle.unwrap_or(self.servo.angle_center)
    }

    /// 将运行时调好的参数写回配置（用于保存）
    pub fn apply_live(&mut self, live: &LiveSettings) {
        self.pid = live.pid.clone();
        self.vision = live.vision.clone();
        self.line = live.line.clone();
        self.speeds = live.speeds.clone();
        self.camera.servo_angle = Some(live.servo_angle);
    }
}

/// 运行时可调参数快照（供遥测面板读取、保存到文件）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveSettings {
    pub pid: PidSettings,
    pub vision: VisionSettings,
    pub line: LineSettings,
    pub speeds: SpeedSettings,
    pub servo_angle: f64,
}
