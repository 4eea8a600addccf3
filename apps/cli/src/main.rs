//! # Linebot CLI
//!
//! 巡线机器人命令行入口。
//!
//! ```bash
//! # 仿真运行 30 秒（合成相机画面 + 日志电机）
//! linebot run --config config/robot.toml --simulate --duration 30
//!
//! # 校验配置
//! linebot check-config --config config/robot.toml
//!
//! # 底盘接线测试（每个车轮、基本动作、弧线、直角、舵机）
//! linebot drive-test --config config/robot.toml --simulate
//! ```
//!
//! 真实相机和 GPIO 驱动不在本 workspace 内，需要由集成方实现
//! `Camera` / `MotorBackend` 后接入。

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod sim;

use commands::{CheckConfigCommand, DriveTestCommand, RunCommand};

/// Linebot - 巡线机器人
#[derive(Parser, Debug)]
#[command(name = "linebot")]
#[command(about = "Line-following robot controller", long_about = None)]
#[command(version)]
struct Cli {
    /// 日志级别（RUST_LOG 优先）
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 启动跟线控制
    Run {
        #[command(flatten)]
        args: RunCommand,
    },

    /// 加载并校验配置文件
    CheckConfig {
        #[command(flatten)]
        args: CheckConfigCommand,
    },

    /// 底盘接线和动作测试
    DriveTest {
        #[command(flatten)]
        args: DriveTestCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    linebot_sdk::init_logger(&cli.log_level);

    match cli.command {
        Commands::Run { args } => args.execute(),
        Commands::CheckConfig { args } => args.execute(),
        Commands::DriveTest { args } => args.execute(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::time::Duration;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_duration_argument_is_validated() {
        let cli = Cli::try_parse_from(["linebot", "run", "--duration", "1.5"]).unwrap();
        let Commands::Run { args } = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.duration, Some(Duration::from_millis(1500)));

        for bad in ["--duration=-1", "--duration=nan", "--duration=inf"] {
            assert!(Cli::try_parse_from(["linebot", "run", bad]).is_err(), "{}", bad);
        }
        assert!(Cli::try_parse_from(["linebot", "drive-test", "--step=-0.5"]).is_err());
    }
}
