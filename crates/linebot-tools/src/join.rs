//! 带超时的线程 join
//!
//! 标准库的 `JoinHandle::join()` 会无限期阻塞。停机时如果某个线程卡在
//! 阻塞调用里（例如相机驱动不返回），进程就无法退出。

use std::sync::mpsc;
use std::thread::{JoinHandle, spawn};
use std::time::Duration;
use thiserror::Error;

/// join 失败原因
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    /// 线程未在限定时间内退出
    #[error("Thread join timeout")]
    Timeout,

    /// 线程 panic
    #[error("Thread panicked during join")]
    Panicked,
}

/// Extension trait for timeout-capable thread joins
pub trait JoinTimeout<T> {
    /// 最多等待 `timeout`，超时后放弃（线程继续运行，进程退出时由 OS 回收）
    fn join_timeout(self, timeout: Duration) -> Result<T, JoinError>;
}

impl<T: Send + 'static> JoinTimeout<T> for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> Result<T, JoinError> {
        let (tx, rx) = mpsc::channel();

        // watchdog 线程负责真正的 join
        spawn(move || {
            let result = self.join();
            // 接收端可能已经超时退出，忽略发送错误
            let _ = tx.send(result);
        });

        match rx.recv_timeout(timeout) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(JoinError::Panicked),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(JoinError::Timeout),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(JoinError::Panicked),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_join_timeout_returns_value() {
        let handle = thread::spawn(|| 42u32);
        assert_eq!(handle.join_timeout(Duration::from_secs(1)), Ok(42));
    }

    #[test]
    fn test_join_timeout_expires() {
        let handle = thread::spawn(|| thread::sleep(Duration::from_millis(500)));
        let result = handle.join_timeout(Duration::from_millis(20));
        assert_eq!(result, Err(JoinError::Timeout));
    }

    #[test]
    fn test_join_timeout_reports_panic() {
        let handle = thread::spawn(|| {
            panic!("boom");
        });
        let result: Result<(), JoinError> = handle.join_timeout(Duration::from_secs(1));
        assert_eq!(result, Err(JoinError::Panicked));
    }
}
