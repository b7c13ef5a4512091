//! 增量命令
//!
//! 操作员每条消息携带的相对运动意图。增量命令**不是幂等的**：
//! 同一条命令施加两次会累积两倍的运动，因此由 `sequence` 去重。

use crate::pose::{Position3D, Quaternion};
use thiserror::Error;

/// 增量命令的参考坐标系
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ReferenceFrame {
    /// 世界坐标系：平移直接相加，旋转左乘
    #[default]
    World,
    /// 末端坐标系：平移先按当前姿态旋转，旋转右乘
    EndEffector,
}

/// 命令校验错误
///
/// 在入口处拒绝，永远不会进入积分器。
#[derive(Error, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CommandError {
    /// 字段不是有限值（NaN / 无穷大）
    #[error("Non-finite value in field `{field}`: {value}")]
    NonFinite {
        /// 字段名
        field: String,
        /// 实际值
        value: f64,
    },

    /// 客户端时间戳为负
    #[error("Negative client timestamp: {0}")]
    NegativeTimestamp(f64),
}

/// 增量命令
///
/// # 示例
///
/// ```rust
/// use teleop_types::{DeltaCommand, ReferenceFrame};
///
/// let cmd = DeltaCommand::translation(1, 0.02, 0.0, 0.0)
///     .with_rotation(0.0, 0.0, 0.05)
///     .with_frame(ReferenceFrame::EndEffector);
/// assert!(cmd.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeltaCommand {
    /// X 方向增量（米）
    pub dx: f64,
    /// Y 方向增量（米）
    pub dy: f64,
    /// Z 方向增量（米）
    pub dz: f64,
    /// 绕 X 轴增量（弧度）
    pub droll: f64,
    /// 绕 Y 轴增量（弧度）
    pub dpitch: f64,
    /// 绕 Z 轴增量（弧度）
    pub dyaw: f64,
    /// 客户端时间戳（秒，客户端时钟）
    ///
    /// 只用于日志和延迟观测；死区判定使用服务端单调时间。
    pub timestamp: f64,
    /// 客户端单调递增序号
    pub sequence: u64,
    /// 参考坐标系
    #[cfg_attr(feature = "serde", serde(default))]
    pub frame: ReferenceFrame,
}

impl DeltaCommand {
    /// 纯平移命令
    pub fn translation(sequence: u64, dx: f64, dy: f64, dz: f64) -> Self {
        DeltaCommand {
            dx,
            dy,
            dz,
            droll: 0.0,
            dpitch: 0.0,
            dyaw: 0.0,
            timestamp: 0.0,
            sequence,
            frame: ReferenceFrame::World,
        }
    }

    /// 零增量（保活）命令
    pub fn keep_alive(sequence: u64) -> Self {
        Self::translation(sequence, 0.0, 0.0, 0.0)
    }

    /// 设置旋转增量（弧度）
    pub fn with_rotation(mut self, droll: f64, dpitch: f64, dyaw: f64) -> Self {
        self.droll = droll;
        self.dpitch = dpitch;
        self.dyaw = dyaw;
        self
    }

    /// 设置参考坐标系
    pub fn with_frame(mut self, frame: ReferenceFrame) -> Self {
        self.frame = frame;
        self
    }

    /// 设置客户端时间戳（秒）
    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// 平移增量
    pub fn translation_delta(&self) -> Position3D {
        Position3D::new(self.dx, self.dy, self.dz)
    }

    /// 旋转增量（单位四元数）
    pub fn rotation_delta(&self) -> Quaternion {
        Quaternion::from_euler(self.droll, self.dpitch, self.dyaw)
    }

    /// 平移幅值（米）
    pub fn linear_magnitude(&self) -> f64 {
        self.translation_delta().norm()
    }

    /// 旋转幅值（弧度，欧拉分量的范数）
    pub fn angular_magnitude(&self) -> f64 {
        Position3D::new(self.droll, self.dpitch, self.dyaw).norm()
    }

    /// 校验命令
    ///
    /// # 错误
    ///
    /// - `CommandError::NonFinite`: 任意分量为 NaN 或无穷大
    /// - `CommandError::NegativeTimestamp`: 客户端时间戳为负
    pub fn validate(&self) -> Result<(), CommandError> {
        let fields = [
            ("dx", self.dx),
            ("dy", self.dy),
            ("dz", self.dz),
            ("droll", self.droll),
            ("dpitch", self.dpitch),
            ("dyaw", self.dyaw),
            ("timestamp", self.timestamp),
        ];

        for (field, value) in fields {
            if !value.is_finite() {
                return Err(CommandError::NonFinite {
                    field: field.to_string(),
                    value,
                });
            }
        }

        if self.timestamp < 0.0 {
            return Err(CommandError::NegativeTimestamp(self.timestamp));
        }

        Ok(())
    }
}
