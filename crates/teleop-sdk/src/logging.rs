//! 日志初始化
//!
//! 安装 `tracing-subscriber` 的 fmt subscriber（输出到 stderr），
//! 并通过 `tracing-log` 把 `log` crate 的记录桥接到 tracing。
//! 过滤规则优先取 `RUST_LOG`，否则使用调用方给出的默认值。

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// 默认过滤规则
pub const DEFAULT_LOG_FILTER: &str = "info";

/// 日志初始化错误
#[derive(Error, Debug)]
pub enum LoggerError {
    /// 过滤规则无法解析
    #[error("Invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    /// 全局 subscriber 已经设置过
    #[error("Global tracing subscriber already set: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    /// `log` 的全局 logger 已经设置过
    #[error("Global log logger already set: {0}")]
    Log(#[from] log::SetLoggerError),
}

/// 以给定默认过滤规则初始化日志
///
/// # 错误
///
/// 重复初始化或过滤规则非法时返回 `LoggerError`。
pub fn try_init_logger(default_filter: &str) -> Result<(), LoggerError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)?,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;
    Ok(())
}

/// 使用 [`DEFAULT_LOG_FILTER`] 初始化日志，已初始化时静默忽略
pub fn init_logger() {
    let _ = try_init_logger(DEFAULT_LOG_FILTER);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails() {
        // 同一进程内只有第一次能成功
        let _ = try_init_logger("debug");
        assert!(try_init_logger("debug").is_err());

        // log crate 的记录经桥接后不会 panic
        log::info!("log record bridged into tracing");
        tracing::info!("tracing event");
    }
}
