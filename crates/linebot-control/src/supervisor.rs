//! Supervisor - 监督状态机和控制线程
//!
//! # 状态机
//!
//! 每次迭代读取一次传感器观测，按优先级选择分支：
//!
//! 1. 直角标志 && 直角机动已启用 → `right_angle`（阻塞的 90° 转向）
//! 2. 丢线 → `searching`（超过 search_time 后 `stopped`）
//! 3. 否则 → `following`
//!
//! 状态机是电平触发的：找线和直角机动都没有"完成"事件，
//! 是否离开由下一次迭代读到的观测决定。
//!
//! # 线程模型
//!
//! - 控制线程（`linebot-control`）独占 [`SteeringController`]，
//!   PID 参数通过 crossbeam 通道在每次迭代开始时送达
//! - 底盘放在 `Arc<Mutex<_>>` 里；运行期间只有控制线程加锁，
//!   所以需要独占底盘的入口（舵机、手动机动）在运行时返回 [`ControlError::Busy`]
//! - 停止时使用 [`JoinTimeout`] 有界等待

use crate::error::ControlError;
use crate::loop_policy::LoopPolicy;
use crate::pid::SteeringController;
use crate::sensor::LineSensor;
use crate::state::{RobotMode, RobotSnapshot, RobotState};
use crossbeam_channel::{Receiver, Sender};
use linebot_drive::{Motion, Side};
use linebot_tools::{
    ControlSettings, JoinTimeout, LiveSettings, PidSettings, PidUpdate, RobotConfig, SpeedUpdate,
    VisionUpdate,
};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// 按转向量降低前进速度
///
/// `factor = min(|steering| / 100, 1)`，`speed = max - factor * (max - min)`，
/// 结果限制在 `[min, max]`。
pub fn adaptive_speed(steering: f64, min_speed: f64, max_speed: f64) -> f64 {
    let factor = (steering.abs() / 100.0).min(1.0);
    let speed = max_speed - factor * (max_speed - min_speed);
    speed.max(min_speed).min(max_speed)
}

/// 控制线程的迭代逻辑
///
/// 不持有线程，`step()` 可以在测试中用确定的时间点直接驱动。
pub struct ControlLoop<S: LineSensor, M: Motion> {
    sensor: Arc<S>,
    motion: Arc<Mutex<M>>,
    state: Arc<RobotState>,
    pid: SteeringController,
    pid_updates: Option<Receiver<PidUpdate>>,
    /// 最近一次看到线的一侧，也是找线和直角转向的方向
    search_side: Side,
    search_started: Option<Instant>,
    stopped_pause: Duration,
    maneuver_settle: Duration,
    error_backoff: Duration,
}

impl<S: LineSensor, M: Motion> ControlLoop<S, M> {
    pub fn new(
        sensor: Arc<S>,
        motion: Arc<Mutex<M>>,
        state: Arc<RobotState>,
        pid: PidSettings,
        control: &ControlSettings,
    ) -> Self {
        Self {
            sensor,
            motion,
            state,
            pid: SteeringController::new(pid),
            pid_updates: None,
            search_side: Side::default(),
            search_started: None,
            stopped_pause: control.stopped_pause(),
            maneuver_settle: control.maneuver_settle(),
            error_backoff: control.error_backoff(),
        }
    }

    /// 从通道接收 PID 热更新
    pub fn with_pid_updates(mut self, updates: Receiver<PidUpdate>) -> Self {
        self.pid_updates = Some(updates);
        self
    }

    pub fn pid(&self) -> &SteeringController {
        &self.pid
    }

    pub fn search_side(&self) -> Side {
        self.search_side
    }

    /// 一次迭代，返回本次发布（或执行）的模式
    pub fn step(&mut self, now: Instant) -> Result<RobotMode, ControlError> {
        self.drain_pid_updates();

        let observation = self.sensor.observation();
        let previous = self.state.mode();
        let motion = self.motion.clone();
        let mut motion = motion.lock();

        if observation.right_angle && self.sensor.settings().line.right_angle_enabled {
            self.right_angle(&mut *motion, observation.error)
        } else if observation.lost {
            self.search(&mut *motion, observation.error, now)
        } else {
            self.follow(&mut *motion, observation.error, previous, now)
        }
    }

    /// 运行直到 `running` 被清除
    pub fn run(mut self, running: &AtomicBool, policy: LoopPolicy) {
        #[cfg(feature = "realtime")]
        {
            use thread_priority::*;

            match set_current_thread_priority(ThreadPriority::Max) {
                Ok(_) => info!("Control thread priority set to MAX (realtime)"),
                Err(e) => warn!(
                    "Failed to set control thread priority: {}. \
                    On Linux, you may need to run with CAP_SYS_NICE.",
                    e
                ),
            }
        }

        let _halt = HaltOnPanic {
            running,
            motion: self.motion.clone(),
            state: self.state.clone(),
        };

        info!("Control loop started ({:?})", policy);
        while running.load(Ordering::Acquire) {
            let started = Instant::now();
            if let Err(e) = self.step(started) {
                error!("Control iteration failed: {}", e);
                let mut motion = self.motion.lock();
                if let Err(e) = motion.stop() {
                    warn!("Failed to stop motors after error: {}", e);
                }
                motion.wait(self.error_backoff);
            }
            policy.pace(started);
        }
        debug!("Control thread exiting");
    }

    fn drain_pid_updates(&mut self) {
        let Some(updates) = &self.pid_updates else {
            return;
        };
        for update in updates.try_iter() {
            if let Err(e) = self.pid.update_params(&update) {
                warn!("Rejected PID update {:?}: {}", update, e);
            }
        }
    }

    fn follow(
        &mut self,
        motion: &mut M,
        error: f64,
        previous: RobotMode,
        now: Instant,
    ) -> Result<RobotMode, ControlError> {
        self.search_started = None;
        if previous != RobotMode::Following {
            self.pid.reset();
        }

        let steering = self.pid.compute_at(error, now);
        let speeds = motion.settings().speeds;
        let speed = adaptive_speed(steering, speeds.min_speed, speeds.max_speed);
        motion.curve(speed, steering)?;

        if let Some(side) = Side::from_error(error) {
            self.search_side = side;
        }

        self.state.publish(RobotSnapshot {
            mode: RobotMode::Following,
            error,
            steering,
            speed,
            running: true,
        });
        Ok(RobotMode::Following)
    }

    fn search(
        &mut self,
        motion: &mut M,
        error: f64,
        now: Instant,
    ) -> Result<RobotMode, ControlError> {
        let started = match self.search_started {
            Some(started) => started,
            None => {
                info!("Line lost, searching {:?}", self.search_side);
                self.pid.reset();
                self.search_started = Some(now);
                now
            },
        };

        let settings = motion.settings();
        if now.saturating_duration_since(started) > settings.times.search() {
            motion.stop()?;
            if self.state.mode() != RobotMode::Stopped {
                warn!(
                    "Line not found after {:?}, robot stopped",
                    settings.times.search()
                );
            }
            self.state
                .publish(RobotSnapshot::halted(RobotMode::Stopped, error, true));
            motion.wait(self.stopped_pause);
            return Ok(RobotMode::Stopped);
        }

        let turn = settings.speeds.search_turn_speed * self.search_side.sign();
        motion.set_speed(turn, -turn)?;

        self.state.publish(RobotSnapshot {
            mode: RobotMode::Searching,
            error,
            steering: turn,
            speed: 0.0,
            running: true,
        });
        Ok(RobotMode::Searching)
    }

    fn right_angle(&mut self, motion: &mut M, error: f64) -> Result<RobotMode, ControlError> {
        info!("Right angle detected, turning {:?}", self.search_side);
        motion.stop()?;
        motion.wait(self.maneuver_settle);

        self.state
            .publish(RobotSnapshot::halted(RobotMode::RightAngle, error, true));

        motion.right_angle_turn(self.search_side)?;
        self.pid.reset();
        Ok(RobotMode::RightAngle)
    }
}

/// 控制线程 panic 时停车并发布 `stopped`
///
/// 底盘锁在展开到这里之前已经释放。
struct HaltOnPanic<'a, M: Motion> {
    running: &'a AtomicBool,
    motion: Arc<Mutex<M>>,
    state: Arc<RobotState>,
}

impl<M: Motion> Drop for HaltOnPanic<'_, M> {
    fn drop(&mut self) {
        if !thread::panicking() {
            return;
        }
        error!("Control thread panicked, stopping motors");
        if let Err(e) = self.motion.lock().stop() {
            warn!("Failed to stop motors after panic: {}", e);
        }
        let error = self.state.snapshot().error;
        self.state
            .publish(RobotSnapshot::halted(RobotMode::Stopped, error, false));
        self.running.store(false, Ordering::Release);
    }
}

/// 监督器：持有传感器、底盘、状态和控制线程
pub struct Supervisor<S: LineSensor + 'static, M: Motion + 'static> {
    config: Mutex<RobotConfig>,
    sensor: Arc<S>,
    motion: Arc<Mutex<M>>,
    state: Arc<RobotState>,
    /// 控制线程中 PID 参数的镜像（用于 settings() 和下一次 start）
    pid_params: Mutex<PidSettings>,
    pid_tx: Sender<PidUpdate>,
    pid_rx: Receiver<PidUpdate>,
    policy: LoopPolicy,
    running: Arc<AtomicBool>,
    control_thread: Mutex<Option<JoinHandle<()>>>,
    join_timeout: Duration,
}

impl<S: LineSensor + 'static, M: Motion + 'static> Supervisor<S, M> {
    /// 创建监督器（不启动任何线程）
    pub fn new(sensor: S, motion: M, config: &RobotConfig) -> Self {
        let (pid_tx, pid_rx) = crossbeam_channel::unbounded();
        Self {
            config: Mutex::new(config.clone()),
            sensor: Arc::new(sensor),
            motion: Arc::new(Mutex::new(motion)),
            state: Arc::new(RobotState::new()),
            pid_params: Mutex::new(config.pid.clone()),
            pid_tx,
            pid_rx,
            policy: LoopPolicy::from_settings(&config.control),
            running: Arc::new(AtomicBool::new(false)),
            control_thread: Mutex::new(None),
            join_timeout: config.control.join_timeout(),
        }
    }

    /// 覆盖配置中的循环节拍
    pub fn with_loop_policy(mut self, policy: LoopPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 启动传感器和控制线程
    ///
    /// 已经在运行时直接返回 `Ok(())`；传感器启动失败时原样返回错误。
    pub fn start(&self) -> Result<(), ControlError> {
        let mut thread_slot = self.control_thread.lock();
        if self.running.load(Ordering::Acquire) {
            debug!("Supervisor already running");
            return Ok(());
        }

        // 上一次的控制线程可能因 panic 退出
        if let Some(stale) = thread_slot.take()
            && let Err(e) = stale.join_timeout(self.join_timeout)
        {
            warn!("Previous control thread ended abnormally: {}", e);
        }

        self.sensor.start()?;

        // 参数镜像已经包含所有待处理的更新
        while self.pid_rx.try_recv().is_ok() {}
        let control = self.config.lock().control.clone();
        let control_loop = ControlLoop::new(
            self.sensor.clone(),
            self.motion.clone(),
            self.state.clone(),
            self.pid_params.lock().clone(),
            &control,
        )
        .with_pid_updates(self.pid_rx.clone());

        self.state
            .publish(RobotSnapshot::halted(RobotMode::Following, 0.0, true));
        self.running.store(true, Ordering::Release);

        let running = self.running.clone();
        let policy = self.policy;
        let spawned = thread::Builder::new()
            .name("linebot-control".into())
            .spawn(move || control_loop.run(&running, policy));

        match spawned {
            Ok(handle) => *thread_slot = Some(handle),
            Err(e) => {
                self.running.store(false, Ordering::Release);
                self.sensor.stop();
                self.state
                    .publish(RobotSnapshot::halted(RobotMode::Stopped, 0.0, false));
                return Err(e.into());
            },
        }

        info!("Supervisor started");
        Ok(())
    }

    /// 停止控制线程、底盘和传感器
    ///
    /// 未启动时也可以调用，结果总是 `stopped` / `running = false`。
    pub fn stop(&self) {
        let mut thread_slot = self.control_thread.lock();
        self.running.store(false, Ordering::Release);

        if let Some(handle) = thread_slot.take()
            && let Err(e) = handle.join_timeout(self.join_timeout)
        {
            warn!(
                "Control thread did not exit within {:?} ({}), abandoned",
                self.join_timeout, e
            );
        }

        // 被放弃的控制线程可能仍持有底盘锁
        match self.motion.try_lock_for(self.join_timeout) {
            Some(mut motion) => {
                if let Err(e) = motion.stop() {
                    warn!("Failed to stop motors: {}", e);
                }
            },
            None => warn!("Drive train is still locked, motors not stopped"),
        }

        self.sensor.stop();

        let error = self.state.snapshot().error;
        self.state
            .publish(RobotSnapshot::halted(RobotMode::Stopped, error, false));
        info!("Supervisor stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// 当前状态快照
    pub fn state(&self) -> RobotSnapshot {
        self.state.snapshot()
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    /// PID 热更新（下一次迭代生效，不重置积分）
    ///
    /// 非法值（NaN、无穷大）整体拒绝，控制线程不受影响。
    pub fn update_pid(&self, update: &PidUpdate) -> Result<(), ControlError> {
        update.apply(&mut self.pid_params.lock())?;
        // 接收端由 self 持有，发送不会失败
        let _ = self.pid_tx.send(update.clone());
        info!("PID update queued: {:?}", update);
        Ok(())
    }

    /// 视觉参数热更新（下一帧生效）
    pub fn update_vision(&self, update: &VisionUpdate) -> Result<(), ControlError> {
        self.sensor.update_settings(update)?;
        Ok(())
    }

    /// 速度热更新
    ///
    /// 控制线程正在执行阻塞机动时，会等到机动结束。
    pub fn update_speeds(&self, update: &SpeedUpdate) -> Result<(), ControlError> {
        update.validate()?;
        self.motion.lock().update_speeds(update);
        Ok(())
    }

    /// 运行时可调参数快照
    pub fn settings(&self) -> LiveSettings {
        let tracker = self.sensor.settings();
        let (speeds, servo_angle) = {
            let motion = self.motion.lock();
            (motion.settings().speeds, motion.servo_angle())
        };
        LiveSettings {
            pid: self.pid_params.lock().clone(),
            vision: tracker.vision,
            line: tracker.line,
            speeds,
            servo_angle,
        }
    }

    /// 把当前参数合并进加载时的配置并写到 `path`
    pub fn save_settings<P: AsRef<Path>>(&self, path: P) -> Result<(), ControlError> {
        let live = self.settings();
        let mut config = self.config.lock();
        config.apply_live(&live);
        config.save(path)?;
        Ok(())
    }

    /// 转动相机舵机
    pub fn set_camera_servo(&self, angle: f64) -> Result<(), ControlError> {
        if self.is_running() {
            return Err(ControlError::Busy("moving the camera servo"));
        }
        self.motion.lock().set_servo(angle, None)?;
        Ok(())
    }

    /// 在调用线程上直接操作底盘（手动机动、硬件测试）
    pub fn with_motion<R>(&self, f: impl FnOnce(&mut M) -> R) -> Result<R, ControlError> {
        if self.is_running() {
            return Err(ControlError::Busy("driving manually"));
        }
        Ok(f(&mut self.motion.lock()))
    }
}

impl<S: LineSensor + 'static, M: Motion + 'static> Drop for Supervisor<S, M> {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop();
        }
    }
}
