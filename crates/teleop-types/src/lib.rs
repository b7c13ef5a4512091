//! # Teleop Types - 遥操作管线数据模型
//!
//! **依赖原则**: 纯数据，无 IO，无线程
//!
//! ## 包含模块
//!
//! - `pose` - 位姿、位置、四元数
//! - `command` - 增量命令及其校验
//! - `state` - 会话位姿状态和安全门状态
//! - `bounds` - 工作空间边界
//! - `time` - 单调时间戳
//!
//! ## Feature Flags
//!
//! - `serde` - 为所有数据类型派生 `Serialize` / `Deserialize`

pub mod bounds;
pub mod command;
pub mod pose;
pub mod state;
pub mod time;

pub use bounds::WorkspaceBounds;
pub use command::{CommandError, DeltaCommand, ReferenceFrame};
pub use pose::{Pose, Position3D, Quaternion};
pub use state::{GateStatus, PoseState};
pub use time::Timestamp;
