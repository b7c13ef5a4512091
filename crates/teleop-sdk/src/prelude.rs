//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use teleop_sdk::prelude::*;
//! ```

// 类型
pub use teleop_types::{
    DeltaCommand, GateStatus, Pose, PoseState, Position3D, Quaternion, ReferenceFrame, Timestamp,
    WorkspaceBounds,
};

// 配置
pub use teleop_tools::{LoopMode, TeleopConfig};

// 控制
pub use teleop_control::{GateAdjustments, SafetyGate, integrate};

// 后端
pub use crate::builder::BackendKind;
pub use teleop_backend::{Backend, MockBackend, SimBackend, SimConfig};

// 会话
pub use teleop_driver::{
    Session, SessionId, SessionManager, StatusEvent, StatusSnapshot, StatusUpdate,
};

// 错误类型
pub use teleop_backend::BackendError;
pub use teleop_driver::SessionError;
pub use teleop_tools::ConfigError;
pub use teleop_types::CommandError;
