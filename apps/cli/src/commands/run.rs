//! run 命令
//!
//! 启动监督器，周期性输出状态快照（JSON 行），Ctrl+C 或到时后停止。

use anyhow::{Context, Result};
use clap::Args;
use linebot_sdk::{DriveTrain, LineTracker, RobotConfig, Supervisor};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

use crate::sim::{LoggingBackend, SimulatedCamera};

#[derive(Args, Debug)]
pub struct RunCommand {
    /// 配置文件
    #[arg(short, long, default_value = "config/robot.toml")]
    pub config: PathBuf,

    /// 使用仿真相机和日志电机
    #[arg(long)]
    pub simulate: bool,

    /// 运行时长（秒），缺省运行到 Ctrl+C
    #[arg(short, long, value_parser = super::parse_seconds)]
    pub duration: Option<Duration>,

    /// 状态输出周期（毫秒）
    #[arg(long, default_value_t = 500)]
    pub status_interval_ms: u64,

    /// 退出时把运行时参数写回配置文件
    #[arg(long)]
    pub save_on_exit: bool,
}

impl RunCommand {
    pub fn execute(&self) -> Result<()> {
        let config = RobotConfig::load(&self.config)
            .with_context(|| format!("failed to load {}", self.config.display()))?;
        super::require_simulation(self.simulate)?;

        let tracker = LineTracker::new(SimulatedCamera::new(), &config);
        let drive = DriveTrain::new(LoggingBackend::default(), &config);
        let supervisor = Supervisor::new(tracker, drive, &config);
        supervisor.set_camera_servo(config.servo_angle())?;

        let interrupted = Arc::new(AtomicBool::new(false));
        {
            let interrupted = interrupted.clone();
            ctrlc::set_handler(move || {
                eprintln!("\nReceived interrupt signal. Shutting down...");
                interrupted.store(true, Ordering::SeqCst);
            })
            .context("failed to set signal handler")?;
        }

        supervisor.start()?;
        let started = Instant::now();
        let deadline = self.duration;
        let interval = Duration::from_millis(self.status_interval_ms.max(10));

        while !interrupted.load(Ordering::SeqCst)
            && deadline.is_none_or(|d| started.elapsed() < d)
        {
            thread::sleep(interval);
            println!("{}", serde_json::to_string(&supervisor.state())?);
        }

        supervisor.stop();
        info!(
            "Processed {} frames in {:.1}s",
            supervisor.sensor().frames_processed(),
            started.elapsed().as_secs_f64()
        );

        if self.save_on_exit {
            supervisor.save_settings(&self.config)?;
        }
        Ok(())
    }
}
