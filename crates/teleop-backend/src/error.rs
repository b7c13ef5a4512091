//! 后端错误类型定义

use thiserror::Error;

/// 后端错误类型
///
/// 后端失败必须以类型化错误上报，绝不能静默忽略。
/// 任何后端错误都会让会话进入 `Faulted`，控制循环**不会**自动重试。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// 后端未连接
    #[error("Backend not connected")]
    NotConnected,

    /// 等待后端响应超时
    #[error("Backend timeout after {timeout_ms}ms")]
    Timeout {
        /// 超时时间（毫秒）
        timeout_ms: u64,
    },

    /// 后端拒绝了目标位姿
    #[error("Pose rejected by backend: {0}")]
    Rejected(String),

    /// 与后端的连接丢失
    #[error("Backend connection lost: {0}")]
    ConnectionLost(String),

    /// 后端报告的硬件/仿真故障
    #[error("Backend fault: {0}")]
    Fault(String),
}

impl BackendError {
    /// 是否可能是瞬时故障
    ///
    /// 仅供操作员判断；控制循环无论如何都要求显式复位。
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BackendError::Timeout { .. } | BackendError::ConnectionLost(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::BackendError;

    #[test]
    fn test_backend_error_display() {
        assert_eq!(
            BackendError::NotConnected.to_string(),
            "Backend not connected"
        );
        assert_eq!(
            BackendError::Timeout { timeout_ms: 50 }.to_string(),
            "Backend timeout after 50ms"
        );

        let msg = BackendError::Rejected("joint limit".to_string()).to_string();
        assert!(msg.contains("rejected") && msg.contains("joint limit"));

        let msg = BackendError::Fault("overcurrent".to_string()).to_string();
        assert!(msg.contains("fault") && msg.contains("overcurrent"));
    }

    #[test]
    fn test_is_transient() {
        assert!(BackendError::Timeout { timeout_ms: 1 }.is_transient());
        assert!(BackendError::ConnectionLost("eof".into()).is_transient());
        assert!(!BackendError::Fault("x".into()).is_transient());
        assert!(!BackendError::Rejected("x".into()).is_transient());
        assert!(!BackendError::NotConnected.is_transient());
    }
}
