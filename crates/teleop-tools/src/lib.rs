//! # Teleop Tools - 配置与共享工具
//!
//! **依赖原则**: 只依赖 `teleop-types`，避免依赖控制循环或后端
//!
//! ## 包含模块
//!
//! - `config` - 遥操作配置（TOML 加载、校验、保存）

// ⚠️ 禁止引入 teleop-driver / teleop-backend

pub mod config;

// 重新导出常用类型
pub use config::{ConfigError, ControlSettings, DeadmanSettings, LoopMode, TeleopConfig};
