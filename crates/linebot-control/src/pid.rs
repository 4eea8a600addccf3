//! 转向 PID
//!
//! 输入是线位置误差（像素，正 = 线在右侧），输出是 `[-100, 100]` 的转向量，
//! 直接交给 `Motion::curve()`。

use linebot_tools::{ConfigError, PidSettings, PidUpdate};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// 第一次计算时假设的采样间隔（约 30fps）
pub const INITIAL_DT: Duration = Duration::from_nanos(1_000_000_000 / 30);

/// 采样间隔下限，避免微分项除以接近 0 的数
pub const MIN_DT: Duration = Duration::from_millis(1);

/// 输出上限
pub const OUTPUT_LIMIT: f64 = 100.0;

/// 带死区和积分限幅的 PID
#[derive(Debug, Clone)]
pub struct SteeringController {
    params: PidSettings,
    integral: f64,
    last_error: f64,
    last_time: Option<Instant>,
}

impl SteeringController {
    pub fn new(params: PidSettings) -> Self {
        Self {
            params,
            integral: 0.0,
            last_error: 0.0,
            last_time: None,
        }
    }

    /// 以当前时间计算
    pub fn compute(&mut self, error: f64) -> f64 {
        self.compute_at(error, Instant::now())
    }

    /// 以给定时间点计算
    ///
    /// `now` 早于上一次调用时按 [`MIN_DT`] 处理。
    pub fn compute_at(&mut self, error: f64, now: Instant) -> f64 {
        let dt = match self.last_time {
            Some(last) => now.saturating_duration_since(last).max(MIN_DT),
            None => INITIAL_DT,
        }
        .as_secs_f64();
        self.last_time = Some(now);

        let error = if !error.is_finite() || error.abs() < self.params.dead_zone {
            0.0
        } else {
            error
        };

        let p = self.params.kp * error;

        self.integral = self.clamp_integral(self.integral + error * dt);
        let i = self.params.ki * self.integral;

        let d = self.params.kd * (error - self.last_error) / dt;
        self.last_error = error;

        let output = (p + i + d).clamp(-OUTPUT_LIMIT, OUTPUT_LIMIT);
        debug!(
            "err={:+.1} P={:+.2} I={:+.2} D={:+.2} -> {:+.2}",
            error, p, i, d, output
        );
        output
    }

    /// 热更新参数，不清除积分和历史
    ///
    /// 非法更新整体丢弃，参数保持不变。
    pub fn update_params(&mut self, update: &PidUpdate) -> Result<(), ConfigError> {
        update.apply(&mut self.params)?;
        // 新上限比当前积分小时立即生效
        self.integral = self.clamp_integral(self.integral);
        info!(
            "PID updated: Kp={} Ki={} Kd={}",
            self.params.kp, self.params.ki, self.params.kd
        );
        Ok(())
    }

    /// 积分限幅，上限非法时不 panic
    fn clamp_integral(&self, value: f64) -> f64 {
        let limit = self.params.max_integral.abs();
        value.max(-limit).min(limit)
    }

    /// 清除积分、上次误差和时间戳
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_error = 0.0;
        self.last_time = None;
        debug!("PID reset");
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn last_error(&self) -> f64 {
        self.last_error
    }

    pub fn params(&self) -> &PidSettings {
        &self.params
    }
}
