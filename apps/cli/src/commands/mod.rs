//! 子命令

pub mod check_config;
pub mod run;

pub use check_config::CheckConfigCommand;
pub use drive_test::DriveTestCommand;
pub use run::RunCommand;

use anyhow::bail;
use std::time::Duration;

/// 真实相机 / GPIO 后端不在本 workspace 内
pub(crate) fn require_simulation(simulate: bool) -> anyhow::Result<()> {
    if !simulate {
        bail!(
            "no hardware camera or motor driver is built into this binary; \
             pass --simulate or embed linebot-sdk with your own Camera/MotorBackend"
        );
    }
    Ok(())
}

/// 解析秒数参数（clap `value_parser`），拒绝负数、NaN 和无穷大
pub(crate) fn parse_seconds(value: &str) -> Result<Duration, String> {
    let secs: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid number of seconds '{}': {}", value, e))?;
    if secs < 0.0 {
        return Err(format!("seconds must not be negative, got {}", secs));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid duration {}: {}", secs, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seconds() {
        assert_eq!(parse_seconds("2.5"), Ok(Duration::from_millis(2500)));
        assert_eq!(parse_seconds("0"), Ok(Duration::ZERO));
        for bad in ["-1", "nan", "inf", "1e30", "abc"] {
            assert!(parse_seconds(bad).is_err(), "{} accepted", bad);
        }
    }

    #[test]
    fn test_simulation_required() {
        assert!(require_simulation(false).is_err());
        assert!(require_simulation(true).is_ok());
    }
}
