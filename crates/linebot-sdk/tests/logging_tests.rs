//! 日志初始化

#[test]
fn test_init_logger_is_idempotent() {
    assert!(linebot_sdk::init_logger("debug"));
    assert!(!linebot_sdk::init_logger("info"));

    // log crate 的记录经桥接进入 tracing
    log::info!("bridged log record");
    tracing::info!("tracing record");
}
