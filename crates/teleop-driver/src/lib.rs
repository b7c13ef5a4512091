//! 会话驱动层
//!
//! 本模块把积分器、安全门和后端组合成可运行的遥操作会话：
//! - [`ControlLoop`]：单会话状态机（纯逻辑，显式传入时间）
//! - [`Session`]：在命名线程上驱动控制循环，`select!` 同时处理输入与定时器
//! - [`BackendWorker`]：后端调用在独立线程执行，会话线程按超时等待
//! - [`SessionManager`]：按 [`SessionId`] 管理多个相互隔离的会话
//!
//! # 示例
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use teleop_backend::MockBackend;
//! use teleop_driver::{Session, SessionId};
//! use teleop_tools::TeleopConfig;
//! use teleop_types::DeltaCommand;
//!
//! let config = Arc::new(TeleopConfig::default());
//! let backend = MockBackend::new(config.home_pose());
//! let session = Session::open(SessionId(1), config, Box::new(backend)).unwrap();
//!
//! session.submit(DeltaCommand::translation(1, 0.01, 0.0, 0.0)).unwrap();
//! let update = session.updates().recv().unwrap();
//! println!("{:?}", update.event);
//! ```

mod control_loop;
mod error;
mod manager;
mod metrics;
mod session;
mod status;
mod worker;

pub use control_loop::ControlLoop;
pub use error::SessionError;
pub use manager::SessionManager;
pub use metrics::{SessionMetrics, SessionMetricsSnapshot};
pub use session::{INBOUND_CAPACITY, Session, SessionId};
pub use status::{StatusEvent, StatusSnapshot, StatusUpdate};
pub use worker::BackendWorker;
