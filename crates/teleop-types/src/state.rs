//! 会话位姿状态
//!
//! `PoseState` 由控制循环独占持有；积分器和安全门只操作它的副本。

use crate::pose::Pose;
use crate::time::Timestamp;
use std::fmt;

/// 安全门状态
///
/// 状态转换：
///
/// ```text
/// Active --(死区超时)--> Held --(新的有效命令)--> Active
/// Active|Held --(后端错误)--> Faulted --(显式复位)--> Active
/// ```
///
/// `Faulted` 在显式复位前是终态，控制循环不会自动恢复。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum GateStatus {
    /// 正常运行
    #[default]
    Active,
    /// 死区开关触发，保持当前位姿
    Held,
    /// 后端报告故障，需要人工复位
    Faulted,
}

impl GateStatus {
    /// 是否允许向后端下发位姿
    pub fn can_apply(self) -> bool {
        !matches!(self, GateStatus::Faulted)
    }
}

impl fmt::Display for GateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GateStatus::Active => "ACTIVE",
            GateStatus::Held => "HELD",
            GateStatus::Faulted => "FAULTED",
        };
        f.write_str(s)
    }
}

/// 会话位姿状态
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoseState {
    /// 最近一次成功下发到后端的位姿
    pub current: Pose,
    /// 积分基准（成功下发后与 `current` 相同）
    pub target: Pose,
    /// 最近一次被接受命令的时间（服务端单调时间）
    pub last_command_time: Timestamp,
    /// 最近一次被接受命令的序号
    pub last_sequence: u64,
    /// 安全门状态
    pub gate_status: GateStatus,
}

impl PoseState {
    /// 会话开始时创建：`current = target = home`
    pub fn new(home: Pose, now: Timestamp) -> Self {
        PoseState {
            current: home,
            target: home,
            last_command_time: now,
            last_sequence: 0,
            gate_status: GateStatus::Active,
        }
    }

    /// `sequence` 是否严格大于已接受的序号
    pub fn accepts_sequence(&self, sequence: u64) -> bool {
        sequence > self.last_sequence
    }
}
