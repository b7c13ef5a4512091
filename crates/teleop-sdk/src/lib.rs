//! Teleop SDK - 带安全门的机械臂遥操作
//!
//! 把操作员的增量命令（平移/旋转）积分成目标位姿，经过安全门（死区开关、
//! 速度限制、工作空间钳位）后下发给可替换的后端。
//!
//! # 架构设计
//!
//! 从底层到高层：
//!
//! - **类型层** (`types`): 位姿、增量命令、会话状态、工作空间边界
//! - **配置层** (`tools`): TOML 配置加载与校验
//! - **控制层** (`control`): 积分器与安全门（纯函数）
//! - **后端层** (`backend`): 后端接口，Mock 与仿真实现
//! - **驱动层** (`driver`): 控制循环、会话线程、会话管理器
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use teleop_sdk::prelude::*;
//!
//! teleop_sdk::init_logger();
//!
//! let config = TeleopConfig::default();
//! let mut manager = SessionManager::new(config).unwrap();
//! let backend = BackendKind::Mock.build(manager.config()).unwrap();
//! let id = manager.open(backend).unwrap();
//!
//! manager.submit(id, DeltaCommand::translation(1, 0.01, 0.0, 0.0)).unwrap();
//! ```

mod builder;
mod logging;
pub mod prelude;

pub use teleop_backend as backend;
pub use teleop_control as control;
pub use teleop_driver as driver;
pub use teleop_tools as tools;
pub use teleop_types as types;

pub use builder::{BackendKind, UnknownBackend};
pub use logging::{DEFAULT_LOG_FILTER, LoggerError, init_logger, try_init_logger};

// --- 常用类型 ---
pub use teleop_backend::{Backend, BackendError};
pub use teleop_driver::{Session, SessionError, SessionId, SessionManager};
pub use teleop_tools::{ConfigError, TeleopConfig};
