//! 会话层错误类型定义

use crate::session::SessionId;
use teleop_backend::BackendError;
use teleop_tools::ConfigError;
use teleop_types::GateStatus;
use thiserror::Error;

/// 会话层错误类型
#[derive(Error, Debug)]
pub enum SessionError {
    /// 后端错误（只有后端错误会作为错误上报给操作员）
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// 配置不合法
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// 会话通道已关闭（会话线程已退出）
    #[error("Session channel closed")]
    ChannelClosed,

    /// 会话输入通道已满
    #[error("Session inbound channel full (capacity: {0})")]
    ChannelFull(usize),

    /// 只有 `Faulted` 状态可以复位
    #[error("Reset is only valid from FAULTED (current: {0})")]
    NotFaulted(GateStatus),

    /// 会话不存在
    #[error("Unknown session: {0}")]
    UnknownSession(SessionId),

    /// 会话线程启动失败
    #[error("Failed to spawn session thread: {0}")]
    Spawn(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_display() {
        let msg = SessionError::Backend(BackendError::NotConnected).to_string();
        assert!(msg.contains("Backend error") && msg.contains("not connected"));

        assert_eq!(
            SessionError::NotFaulted(GateStatus::Active).to_string(),
            "Reset is only valid from FAULTED (current: ACTIVE)"
        );
        assert_eq!(
            SessionError::UnknownSession(SessionId(7)).to_string(),
            "Unknown session: session-7"
        );
        assert!(SessionError::ChannelFull(64).to_string().contains("64"));
    }

    #[test]
    fn test_backend_error_conversion() {
        let err: SessionError = BackendError::Timeout { timeout_ms: 10 }.into();
        assert!(matches!(
            err,
            SessionError::Backend(BackendError::Timeout { timeout_ms: 10 })
        ));
    }
}
