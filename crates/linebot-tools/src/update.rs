//! 运行时热更新用的部分更新结构体
//!
//! 每个字段都是 `Option`：`None` 表示保持原值，`Some` 表示覆盖。
//! 应用顺序固定为逐字段覆盖，不会重置任何累计状态。

use crate::config::{ConfigError, LineSettings, PidSettings, SpeedSettings, VisionSettings};
use serde::{Deserialize, Serialize};

/// PID 参数部分更新
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PidUpdate {
    pub kp: Option<f64>,
    pub ki: Option<f64>,
    pub kd: Option<f64>,
    pub dead_zone: Option<f64>,
    pub max_integral: Option<f64>,
}

impl PidUpdate {
    /// 是否没有任何字段
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// 所有给出的字段都是有限数
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("kp", self.kp),
            ("ki", self.ki),
            ("kd", self.kd),
            ("dead_zone", self.dead_zone),
            ("max_integral", self.max_integral),
        ] {
            if let Some(value) = value
                && !value.is_finite()
            {
                return Err(ConfigError::Invalid(format!(
                    "pid.{} must be a finite number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// 覆盖给定的字段
    ///
    /// 任一字段非法时参数保持不变并返回错误。
    pub fn apply(&self, params: &mut PidSettings) -> Result<(), ConfigError> {
        self.validate()?;
        let mut next = params.clone();
        if let Some(kp) = self.kp {
            next.kp = kp;
        }
        if let Some(ki) = self.ki {
            next.ki = ki;
        }
        if let Some(kd) = self.kd {
            next.kd = kd;
        }
        if let Some(dead_zone) = self.dead_zone {
            next.dead_zone = dead_zone.max(0.0);
        }
        if let Some(max_integral) = self.max_integral {
            next.max_integral = max_integral.abs();
        }
        next.validate()?;
        *params = next;
        Ok(())
    }
}

/// 视觉参数部分更新
///
/// 字段名沿用遥测面板使用的短名（`threshold`、`blur_k` ...）。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisionUpdate {
    pub threshold: Option<u8>,
    #[serde(alias = "blur_k")]
    pub blur_kernel: Option<u32>,
    pub roi_top: Option<f64>,
    pub roi_bottom: Option<f64>,
    pub side_margin: Option<f64>,
    pub continuity_power: Option<f64>,
}

impl VisionUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// 覆盖给定的字段
    ///
    /// 更新后的组合如果非法（例如 ROI 上下颠倒），两个设置都保持不变并返回错误。
    pub fn apply(
        &self,
        vision: &mut VisionSettings,
        line: &mut LineSettings,
    ) -> Result<(), ConfigError> {
        let mut next_vision = vision.clone();
        let mut next_line = line.clone();

        if let Some(threshold) = self.threshold {
            next_vision.threshold_value = threshold;
        }
        if let Some(kernel) = self.blur_kernel {
            next_vision.blur_kernel = kernel;
        }
        if let Some(top) = self.roi_top {
            next_vision.roi_top_ratio = top;
        }
        if let Some(bottom) = self.roi_bottom {
            next_vision.roi_bottom_ratio = bottom;
        }
        if let Some(margin) = self.side_margin {
            next_vision.side_margin_ratio = margin;
        }
        if let Some(power) = self.continuity_power {
            next_line.continuity_weight_power = power;
        }

        next_vision.validate()?;
        next_line.validate()?;
        *vision = next_vision;
        *line = next_line;
        Ok(())
    }
}

/// 速度部分更新
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeedUpdate {
    #[serde(alias = "base_speed")]
    pub base: Option<f64>,
    #[serde(alias = "max_speed")]
    pub max: Option<f64>,
    #[serde(alias = "min_speed")]
    pub min: Option<f64>,
    #[serde(alias = "turn_speed")]
    pub turn: Option<f64>,
    #[serde(alias = "search_turn_speed")]
    pub search_turn: Option<f64>,
    #[serde(alias = "right_angle_turn_speed")]
    pub right_angle_turn: Option<f64>,
}

impl SpeedUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    fn fields(&self) -> [(&'static str, Option<f64>); 6] {
        [
            ("base", self.base),
            ("max", self.max),
            ("min", self.min),
            ("turn", self.turn),
            ("search_turn", self.search_turn),
            ("right_angle_turn", self.right_angle_turn),
        ]
    }

    /// 所有给出的字段都是有限数
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in self.fields() {
            if let Some(value) = value
                && !value.is_finite()
            {
                return Err(ConfigError::Invalid(format!(
                    "speeds.{} must be a finite number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// 覆盖给定的字段，每个值都会被限制在 [-100, 100]
    ///
    /// 非有限值被忽略，对应速度保持原值。
    pub fn apply(&self, speeds: &mut SpeedSettings) {
        let targets = [
            &mut speeds.base_speed,
            &mut speeds.max_speed,
            &mut speeds.min_speed,
            &mut speeds.turn_speed,
            &mut speeds.search_turn_speed,
            &mut speeds.right_angle_turn_speed,
        ];
        for ((name, value), target) in self.fields().into_iter().zip(targets) {
            let Some(value) = value else {
                continue;
            };
            if !value.is_finite() {
                tracing::warn!("Ignoring non-finite speed update {} = {}", name, value);
                continue;
            }
            *target = value.clamp(-100.0, 100.0);
        }
        if speeds.min_speed > speeds.max_speed {
            tracing::warn!(
                "Speed update left min_speed ({}) above max_speed ({}), \
            adaptive speed pins to max",
                speeds.min_speed,
                speeds.max_speed
            );
        }
    }
}
