use tracing_subscriber::EnvFilter;

/// 初始化进程日志
///
/// `RUST_LOG` 优先；未设置或无法解析时使用 `default_directive`（例如 `"info"`、
/// `"linebot_control=debug,info"`）。`log` crate 的记录经 `tracing-log` 转发。
///
/// 只有第一次调用会安装 subscriber，之后返回 `false`。
pub fn init_logger(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return false;
    }
    if let Err(e) = tracing_log::LogTracer::init() {
        tracing::debug!("log bridge already installed: {}", e);
    }
    true
}
