//! 命令积分器
//!
//! 把增量命令累积成候选绝对位姿。纯函数：不记忆序号、不钳位、不校验，
//! 保持"操作员请求了什么"与"允许什么"的分离（后者由安全门负责）。

use teleop_types::{DeltaCommand, Pose, ReferenceFrame};

/// 积分一条增量命令
///
/// - 位置：按分量相加（末端坐标系下先用当前姿态旋转增量）
/// - 姿态：增量旋转与当前姿态**组合**（四元数乘法），而非欧拉角相加
///
/// 调用方负责保证 `delta.sequence` 严格递增。
///
/// # 示例
///
/// ```rust
/// use teleop_control::integrate;
/// use teleop_types::{DeltaCommand, Pose};
///
/// let start = Pose::from_position(0.1, 0.0, 0.5);
/// let next = integrate(&start, &DeltaCommand::translation(1, 0.02, 0.0, 0.0));
/// assert!((next.position.x - 0.12).abs() < 1e-12);
/// ```
pub fn integrate(current_target: &Pose, delta: &DeltaCommand) -> Pose {
    let translation = delta.translation_delta();
    let rotation = delta.rotation_delta();
    let orientation = current_target.orientation;

    match delta.frame {
        ReferenceFrame::World => Pose::new(
            current_target.position + translation,
            rotation.multiply(&orientation).normalize(),
        ),
        ReferenceFrame::EndEffector => Pose::new(
            current_target.position + orientation.rotate(translation),
            orientation.multiply(&rotation).normalize(),
        ),
    }
}
