//! 工作空间边界
//!
//! 进程级只读配置：轴对齐包围盒 + 线速度/角速度上限。

use crate::pose::{Pose, Position3D};

/// 工作空间边界与速度限制
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WorkspaceBounds {
    /// 最大线速度（米/秒）
    pub max_linear_velocity: f64,
    /// 最大角速度（弧度/秒）
    pub max_angular_velocity: f64,
    /// 位置下限（米）
    pub min: Position3D,
    /// 位置上限（米）
    pub max: Position3D,
}

impl Default for WorkspaceBounds {
    fn default() -> Self {
        Self {
            max_linear_velocity: 0.5,
            max_angular_velocity: 1.0,
            min: Position3D::new(-0.5, -0.5, 0.0),
            max: Position3D::new(0.5, 0.5, 1.0),
        }
    }
}

impl WorkspaceBounds {
    /// 位置是否在包围盒内（含边界）
    pub fn contains(&self, p: &Position3D) -> bool {
        (self.min.x..=self.max.x).contains(&p.x)
            && (self.min.y..=self.max.y).contains(&p.y)
            && (self.min.z..=self.max.z).contains(&p.z)
    }

    /// 位姿的位置是否在包围盒内
    pub fn contains_pose(&self, pose: &Pose) -> bool {
        self.contains(&pose.position)
    }

    /// 各轴独立钳位到 `[min, max]`
    pub fn clamp(&self, p: Position3D) -> Position3D {
        Position3D::new(
            p.x.clamp(self.min.x, self.max.x),
            p.y.clamp(self.min.y, self.max.y),
            p.z.clamp(self.min.z, self.max.z),
        )
    }
}
