//! # Teleop Control - 命令积分与安全门
//!
//! 实时命令管线中的两个纯函数组件：
//!
//! - [`integrate`] - 把增量命令累积为候选绝对位姿
//! - [`SafetyGate`] - 死区检查 → 速度限制 → 工作空间钳位
//!
//! 两者都不持有会话状态，只操作调用方传入的副本，
//! 因此可以在任意线程中重复调用、确定性测试。

pub mod gate;
pub mod integrator;

pub use gate::{GATE_TOLERANCE, GateAdjustments, GateOutcome, SafetyGate};
pub use integrator::integrate;
