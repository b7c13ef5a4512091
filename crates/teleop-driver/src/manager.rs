//! 会话管理器
//!
//! 按 [`SessionId`] 打开、关闭相互隔离的会话。会话之间只共享只读的
//! `Arc<TeleopConfig>`；管理器被 drop 时关闭所有会话。

use crate::error::SessionError;
use crate::metrics::SessionMetricsSnapshot;
use crate::session::{Session, SessionId};
use std::collections::BTreeMap;
use std::sync::Arc;
use teleop_backend::Backend;
use teleop_tools::TeleopConfig;
use teleop_types::DeltaCommand;
use tracing::info;

/// 会话管理器
#[derive(Debug)]
pub struct SessionManager {
    config: Arc<TeleopConfig>,
    sessions: BTreeMap<SessionId, Session>,
    next_id: u64,
}

impl SessionManager {
    /// 创建管理器（配置在此校验一次）
    pub fn new(config: TeleopConfig) -> Result<Self, SessionError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            sessions: BTreeMap::new(),
            next_id: 1,
        })
    }

    /// 共享配置
    pub fn config(&self) -> &Arc<TeleopConfig> {
        &self.config
    }

    /// 用给定后端打开新会话
    pub fn open(&mut self, backend: Box<dyn Backend>) -> Result<SessionId, SessionError> {
        let id = SessionId(self.next_id);
        let session = Session::open(id, Arc::clone(&self.config), backend)?;
        self.next_id += 1;
        self.sessions.insert(id, session);
        Ok(id)
    }

    /// 查找会话
    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    fn session(&self, id: SessionId) -> Result<&Session, SessionError> {
        self.get(id).ok_or(SessionError::UnknownSession(id))
    }

    /// 向指定会话提交命令
    pub fn submit(&self, id: SessionId, command: DeltaCommand) -> Result<(), SessionError> {
        self.session(id)?.submit(command)
    }

    /// 复位指定会话
    pub fn reset(&self, id: SessionId) -> Result<(), SessionError> {
        self.session(id)?.reset()
    }

    /// 关闭指定会话（让后端保持并 join 会话线程），返回最终计数
    pub fn close(&mut self, id: SessionId) -> Result<SessionMetricsSnapshot, SessionError> {
        let session = self
            .sessions
            .remove(&id)
            .ok_or(SessionError::UnknownSession(id))?;
        Ok(session.close())
    }

    /// 关闭所有会话
    pub fn close_all(&mut self) {
        if self.sessions.is_empty() {
            return;
        }
        info!("Closing {} session(s)", self.sessions.len());
        // BTreeMap 按 id 顺序 drop
        self.sessions.clear();
    }

    /// 当前会话 id
    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.keys().copied().collect()
    }

    /// 会话数量
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// 是否没有会话
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.close_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teleop_backend::MockBackend;

    #[test]
    fn test_open_and_close() {
        let mut manager = SessionManager::new(TeleopConfig::default()).unwrap();
        let home = manager.config().home_pose();

        let a = manager.open(Box::new(MockBackend::new(home))).unwrap();
        let b = manager.open(Box::new(MockBackend::new(home))).unwrap();
        assert_ne!(a, b);
        assert_eq!(manager.ids(), vec![a, b]);

        manager
            .submit(a, DeltaCommand::translation(1, 0.01, 0.0, 0.0))
            .unwrap();
        // 关闭前会处理完已入队的命令
        let metrics = manager.close(a).unwrap();
        assert_eq!(metrics.commands_received, 1);
        assert_eq!(manager.len(), 1);
        assert!(manager.get(a).is_none());
        assert!(matches!(
            manager.close(a),
            Err(SessionError::UnknownSession(id)) if id == a
        ));

        manager.close_all();
        assert!(manager.is_empty());
    }

    #[test]
    fn test_unknown_session() {
        let manager = SessionManager::new(TeleopConfig::default()).unwrap();
        let missing = SessionId(42);
        assert!(matches!(
            manager.submit(missing, DeltaCommand::keep_alive(1)),
            Err(SessionError::UnknownSession(_))
        ));
        assert!(matches!(
            manager.reset(missing),
            Err(SessionError::UnknownSession(_))
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = TeleopConfig::default();
        config.deadman.timeout_ms = 0;
        assert!(matches!(
            SessionManager::new(config),
            Err(SessionError::Config(_))
        ));
    }
}
