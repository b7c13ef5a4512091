//! 安全门
//!
//! 对候选位姿做校验和钳位。步骤顺序固定，保证行为可复现：
//!
//! 1. **死区检查**：`now - last_command_time > timeout` 时直接忽略候选，
//!    返回 `(previous.current, Held)`，其余步骤不执行
//! 2. **速度限制**：位移超过 `max_velocity × Δt` 时按比例缩短（保持方向）
//! 3. **工作空间钳位**：各轴独立钳位到 `[min, max]`，姿态重新归一化
//!
//! 速度限制必须在钳位之前：反过来会在长时间停顿后的第一帧掩盖死区分支。
//!
//! 安全门是纯函数，不做 IO，也永远不会产生 `Faulted`（由后端错误触发）。

use std::time::Duration;
use teleop_tools::TeleopConfig;
use teleop_types::{GateStatus, Pose, PoseState, Timestamp, WorkspaceBounds};

/// 判定"发生了修改"的浮点容差
pub const GATE_TOLERANCE: f64 = 1e-9;

/// 本次过门时做了哪些软限制
///
/// 软限制不是错误，只用于观测（日志、状态通道）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GateAdjustments {
    /// 线位移被速度限制缩短
    pub linear_limited: bool,
    /// 姿态变化被角速度限制缩短
    pub angular_limited: bool,
    /// 位置被钳位到工作空间内
    pub clamped: bool,
}

impl GateAdjustments {
    /// 是否有任何软限制生效
    pub fn any(&self) -> bool {
        self.linear_limited || self.angular_limited || self.clamped
    }
}

/// 过门结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateOutcome {
    /// 允许下发的位姿
    pub pose: Pose,
    /// 过门后的状态（`Active` 或 `Held`）
    pub status: GateStatus,
    /// 软限制记录
    pub adjustments: GateAdjustments,
}

/// 安全门
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafetyGate {
    bounds: WorkspaceBounds,
    deadman_timeout: Duration,
}

impl SafetyGate {
    /// 创建安全门
    pub fn new(bounds: WorkspaceBounds, deadman_timeout: Duration) -> Self {
        Self {
            bounds,
            deadman_timeout,
        }
    }

    /// 从配置创建
    pub fn from_config(config: &TeleopConfig) -> Self {
        Self::new(config.workspace, config.deadman_timeout())
    }

    /// 工作空间边界
    pub fn bounds(&self) -> &WorkspaceBounds {
        &self.bounds
    }

    /// 死区超时
    pub fn deadman_timeout(&self) -> Duration {
        self.deadman_timeout
    }

    /// 死区是否已超时
    pub fn deadman_expired(&self, previous: &PoseState, now: Timestamp) -> bool {
        now.saturating_duration_since(previous.last_command_time) > self.deadman_timeout
    }

    /// 对候选位姿过门
    ///
    /// # 参数
    ///
    /// - `candidate`: 积分器输出的候选位姿
    /// - `previous`: 当前会话状态的副本
    /// - `now`: 当前单调时间
    ///
    /// # 示例
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use teleop_control::SafetyGate;
    /// use teleop_types::{GateStatus, Pose, PoseState, Position3D, Timestamp, WorkspaceBounds};
    ///
    /// let bounds = WorkspaceBounds {
    ///     max_linear_velocity: 10.0,
    ///     max_angular_velocity: 1.0,
    ///     min: Position3D::new(0.0, 0.0, 0.0),
    ///     max: Position3D::new(1.0, 1.0, 1.0),
    /// };
    /// let gate = SafetyGate::new(bounds, Duration::from_millis(500));
    /// let previous = PoseState::new(Pose::from_position(0.95, 0.5, 0.5), Timestamp::ZERO);
    ///
    /// let out = gate.gate(&Pose::from_position(1.45, 0.5, 0.5), &previous, Timestamp::from_millis(100));
    /// assert_eq!(out.pose.position.x, 1.0);
    /// assert_eq!(out.status, GateStatus::Active);
    /// ```
    pub fn gate(&self, candidate: &Pose, previous: &PoseState, now: Timestamp) -> GateOutcome {
        // 1. 死区检查（优先于一切）
        if self.deadman_expired(previous, now) {
            return GateOutcome {
                pose: previous.current,
                status: GateStatus::Held,
                adjustments: GateAdjustments::default(),
            };
        }

        let dt = now
            .saturating_duration_since(previous.last_command_time)
            .as_secs_f64();
        let mut adjustments = GateAdjustments::default();

        // 2. 速度限制
        let limited = self.limit_velocity(candidate, &previous.target, dt, &mut adjustments);

        // 3. 工作空间钳位
        let clamped = self.clamp_workspace(&limited, &mut adjustments);

        GateOutcome {
            pose: clamped,
            status: GateStatus::Active,
            adjustments,
        }
    }

    fn limit_velocity(
        &self,
        candidate: &Pose,
        previous_target: &Pose,
        dt: f64,
        adjustments: &mut GateAdjustments,
    ) -> Pose {
        let max_step = self.bounds.max_linear_velocity * dt;
        let displacement = candidate.position - previous_target.position;
        let distance = displacement.norm();

        let position = if distance > max_step + GATE_TOLERANCE {
            adjustments.linear_limited = true;
            previous_target.position + displacement * (max_step / distance)
        } else {
            candidate.position
        };

        let max_angle = self.bounds.max_angular_velocity * dt;
        let angle = previous_target
            .orientation
            .angle_to(&candidate.orientation);

        let orientation = if angle > max_angle + GATE_TOLERANCE {
            adjustments.angular_limited = true;
            previous_target
                .orientation
                .slerp(&candidate.orientation, max_angle / angle)
        } else {
            candidate.orientation
        };

        Pose::new(position, orientation)
    }

    fn clamp_workspace(&self, pose: &Pose, adjustments: &mut GateAdjustments) -> Pose {
        let position = self.bounds.clamp(pose.position);
        if (position - pose.position).norm() > GATE_TOLERANCE {
            adjustments.clamped = true;
        }
        Pose::new(position, pose.orientation.normalize())
    }
}
