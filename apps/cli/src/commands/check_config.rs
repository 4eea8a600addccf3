//! check-config 命令

use anyhow::{Context, Result};
use clap::Args;
use linebot_sdk::RobotConfig;
use linebot_sdk::tools::Wheel;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct CheckConfigCommand {
    /// 配置文件
    #[arg(short, long, default_value = "config/robot.toml")]
    pub config: PathBuf,

    /// 输出规范化后的完整 TOML
    #[arg(long)]
    pub print: bool,
}

impl CheckConfigCommand {
    pub fn execute(&self) -> Result<()> {
        let config = RobotConfig::load(&self.config)
            .with_context(|| format!("invalid config {}", self.config.display()))?;

        if self.print {
            print!("{}", config.to_toml_string()?);
            return Ok(());
        }

        println!("✅ {} is valid", self.config.display());
        println!("{}", summary(&config));
        Ok(())
    }
}

fn summary(config: &RobotConfig) -> String {
    let mut lines = vec![
        format!(
            "  camera   {}x{} @{}fps, rotation {}, servo {:.0}°",
            config.camera.width,
            config.camera.height,
            config.camera.fps,
            config.camera.rotation,
            config.servo_angle()
        ),
        format!(
            "  vision   threshold {}, blur {}, roi {:.2}..{:.2}, margin {:.2}",
            config.vision.threshold_value,
            config.vision.blur_kernel,
            config.vision.roi_top_ratio,
            config.vision.roi_bottom_ratio,
            config.vision.side_margin_ratio
        ),
        format!(
            "  pid      kp {} ki {} kd {}, dead zone {}, max integral {}",
            config.pid.kp,
            config.pid.ki,
            config.pid.kd,
            config.pid.dead_zone,
            config.pid.max_integral
        ),
        format!(
            "  speeds   base {} / min {} / max {}, search {}, right angle {} for {}s",
            config.speeds.base_speed,
            config.speeds.min_speed,
            config.speeds.max_speed,
            config.speeds.search_turn_speed,
            config.speeds.right_angle_turn_speed,
            config.times.right_angle_turn_time
        ),
    ];
    for wheel in Wheel::ALL {
        if let Some(channel) = config.motors.channel_of(wheel) {
            lines.push(format!(
                "  motor    {:?} -> {:?} ({:+})",
                wheel,
                channel,
                config.motors.inversion_of(channel)
            ));
        }
    }
    lines.join("\n")
}
