//! 状态通道的消息类型
//!
//! 会话线程每处理一条消息都会把最新的 [`StatusSnapshot`] 写入 `ArcSwap`；
//! 产生事件时额外向有界状态通道发送一条 [`StatusUpdate`]。

use teleop_control::GateAdjustments;
use teleop_types::{CommandError, GateStatus, Pose, PoseState, Timestamp};

/// 会话状态快照
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatusSnapshot {
    /// 最近一次成功下发的位姿
    pub current: Pose,
    /// 安全门状态
    pub gate_status: GateStatus,
    /// 最近一次被接受命令的序号
    pub last_sequence: u64,
    /// 最近一次被接受命令的时间
    pub last_command_time: Timestamp,
    /// 最近一次漂移检查的结果（米）
    pub drift: Option<f64>,
}

impl StatusSnapshot {
    /// 从会话状态构造
    pub fn from_state(state: &PoseState, drift: Option<f64>) -> Self {
        Self {
            current: state.current,
            gate_status: state.gate_status,
            last_sequence: state.last_sequence,
            last_command_time: state.last_command_time,
            drift,
        }
    }
}

/// 状态事件
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum StatusEvent {
    /// 位姿已下发（可能被软限制修改过）
    Applied {
        /// 软限制记录
        adjustments: GateAdjustments,
    },
    /// 死区开关触发，保持当前位姿
    Held,
    /// 命令校验失败，已丢弃
    Rejected {
        /// 校验错误
        error: CommandError,
    },
    /// 后端故障（或故障期间被接受但未下发的命令）
    Faulted {
        /// 故障原因
        reason: String,
    },
    /// 已从故障中复位
    Reset,
    /// 后端位姿与 `current` 的偏差超过阈值
    Drift {
        /// 偏差（米）
        distance: f64,
    },
}

/// 状态通道消息
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatusUpdate {
    /// 事件发生后的快照
    pub snapshot: StatusSnapshot,
    /// 事件
    pub event: StatusEvent,
}
