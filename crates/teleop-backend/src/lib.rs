//! # Teleop Backend - 后端能力接口
//!
//! 控制循环只通过 [`Backend`] trait 与执行器交互，不关心后端是本地调用、
//! 子进程 RPC 还是网络调用；延迟和失败特性由各适配器负责。
//!
//! ## 实现
//!
//! - [`MockBackend`] - 确定性内存桩：把下发的位姿原样作为状态回显
//! - [`SimBackend`] - 仿真进程适配器：独立线程上的一阶跟踪模型，带链路延迟、
//!   响应超时和故障注入
//!
//! ## 并发约定
//!
//! 每个会话独占一个 `Box<dyn Backend>`。同一个仿真/机器人实例只能被
//! 控制同一台机器人的会话共享，这是适配器的约定，控制循环不做假设。

mod error;
pub mod mock;
pub mod sim;

pub use error::BackendError;
pub use mock::{MockBackend, MockBackendHandle};
pub use sim::{SimBackend, SimConfig};

use teleop_types::{Pose, Timestamp};

/// 后端对一次 `apply_pose` 的确认
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ack {
    /// 后端累计接受的命令数
    pub command_count: u64,
    /// 后端接受命令的时间
    pub accepted_at: Timestamp,
}

/// 后端报告的权威状态快照
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BackendState {
    /// 执行器当前实际位姿
    pub pose: Pose,
    /// 后端累计接受的命令数
    pub command_count: u64,
    /// 快照时间
    pub timestamp: Timestamp,
}

/// 后端能力接口
///
/// 方法集合固定，各实现相互独立，没有共享基类状态。
pub trait Backend: Send {
    /// 后端名称（日志和状态使用）
    fn name(&self) -> &str;

    /// 下发经过安全门的目标位姿
    ///
    /// 可能很慢或瞬时失败；失败必须返回 `BackendError`。
    fn apply_pose(&mut self, pose: &Pose) -> Result<Ack, BackendError>;

    /// 读取后端的权威当前位姿（用于检测漂移）
    fn state(&mut self) -> Result<BackendState, BackendError>;

    /// 让执行器保持最后一次下发的位姿
    ///
    /// 会话关闭时调用；之后不得继续无人监督的运动。
    fn hold(&mut self) -> Result<(), BackendError> {
        Ok(())
    }
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn apply_pose(&mut self, pose: &Pose) -> Result<Ack, BackendError> {
        (**self).apply_pose(pose)
    }

    fn state(&mut self) -> Result<BackendState, BackendError> {
        (**self).state()
    }

    fn hold(&mut self) -> Result<(), BackendError> {
        (**self).hold()
    }
}
