//! 会话计数器
//!
//! 所有计数器都是原子操作，可以在任何线程读取，不会引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 会话实时指标
#[derive(Debug, Default)]
pub struct SessionMetrics {
    /// 收到的命令总数
    pub commands_received: AtomicU64,

    /// 成功下发到后端的位姿数（含死区保持位姿）
    pub poses_applied: AtomicU64,

    /// 因序号过期/重复被丢弃的命令数
    pub stale_discarded: AtomicU64,

    /// 校验失败被拒绝的命令数
    pub rejected: AtomicU64,

    /// 死区开关触发次数
    pub deadman_trips: AtomicU64,

    /// 后端错误次数
    pub backend_errors: AtomicU64,

    /// 状态通道满时丢弃的更新数
    ///
    /// 如果这个值持续增长，说明状态消费者跟不上控制循环。
    pub status_dropped: AtomicU64,
}

impl SessionMetrics {
    /// 创建新的指标实例（所有计数器初始化为 0）
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// 获取快照
    pub fn snapshot(&self) -> SessionMetricsSnapshot {
        SessionMetricsSnapshot {
            commands_received: self.commands_received.load(Ordering::Relaxed),
            poses_applied: self.poses_applied.load(Ordering::Relaxed),
            stale_discarded: self.stale_discarded.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            deadman_trips: self.deadman_trips.load(Ordering::Relaxed),
            backend_errors: self.backend_errors.load(Ordering::Relaxed),
            status_dropped: self.status_dropped.load(Ordering::Relaxed),
        }
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionMetricsSnapshot {
    pub commands_received: u64,
    pub poses_applied: u64,
    pub stale_discarded: u64,
    pub rejected: u64,
    pub deadman_trips: u64,
    pub backend_errors: u64,
    pub status_dropped: u64,
}
