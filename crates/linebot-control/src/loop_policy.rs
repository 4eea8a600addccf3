//! 控制循环节拍

use linebot_tools::ControlSettings;
use std::time::{Duration, Instant};

/// 控制循环周期策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopPolicy {
    /// 不限速：一次迭代结束立即开始下一次
    #[default]
    Unbounded,
    /// 每次迭代至少占用给定时长
    MinInterval(Duration),
}

impl LoopPolicy {
    /// 由 `[control] min_loop_interval_ms` 得到
    pub fn from_settings(control: &ControlSettings) -> Self {
        match control.min_loop_interval() {
            Some(interval) if !interval.is_zero() => LoopPolicy::MinInterval(interval),
            _ => LoopPolicy::Unbounded,
        }
    }

    /// 本次迭代还需要等待多久
    pub fn remaining(&self, iteration_start: Instant, now: Instant) -> Option<Duration> {
        match *self {
            LoopPolicy::Unbounded => None,
            LoopPolicy::MinInterval(interval) => {
                let elapsed = now.saturating_duration_since(iteration_start);
                interval.checked_sub(elapsed).filter(|d| !d.is_zero())
            },
        }
    }

    /// 睡眠到本次迭代的最小周期结束
    pub fn pace(&self, iteration_start: Instant) {
        if let Some(remaining) = self.remaining(iteration_start, Instant::now()) {
            spin_sleep::sleep(remaining);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_never_waits() {
        let t0 = Instant::now();
        assert_eq!(LoopPolicy::Unbounded.remaining(t0, t0), None);
    }

    #[test]
    fn test_min_interval_remaining() {
        let policy = LoopPolicy::MinInterval(Duration::from_millis(20));
        let t0 = Instant::now();
        assert_eq!(
            policy.remaining(t0, t0 + Duration::from_millis(5)),
            Some(Duration::from_millis(15))
        );
        // 超时的迭代不补偿
        assert_eq!(policy.remaining(t0, t0 + Duration::from_millis(25)), None);
    }

    #[test]
    fn test_from_settings() {
        let mut control = ControlSettings::default();
        assert_eq!(LoopPolicy::from_settings(&control), LoopPolicy::Unbounded);
        control.min_loop_interval_ms = Some(10);
        assert_eq!(
            LoopPolicy::from_settings(&control),
            LoopPolicy::MinInterval(Duration::from_millis(10))
        );
        control.min_loop_interval_ms = Some(0);
        assert_eq!(LoopPolicy::from_settings(&control), LoopPolicy::Unbounded);
    }

    #[test]
    fn test_pace_sleeps_remaining() {
        let policy = LoopPolicy::MinInterval(Duration::from_millis(10));
        let t0 = Instant::now();
        policy.pace(t0);
        assert!(t0.elapsed() >= Duration::from_millis(10));
    }
}
