//! 后端选择
//!
//! 会话构造时按名称选择后端实现，返回 `Box<dyn Backend>`。

use std::fmt;
use std::str::FromStr;
use teleop_backend::{Backend, BackendError, MockBackend, SimBackend, SimConfig};
use teleop_tools::TeleopConfig;
use thiserror::Error;

/// 可选的后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// 内存 Mock 后端
    #[default]
    Mock,
    /// 仿真后端
    Sim,
}

/// 未知的后端名称
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown backend `{0}` (expected `mock` or `sim`)")]
pub struct UnknownBackend(pub String);

impl FromStr for BackendKind {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(BackendKind::Mock),
            "sim" | "simulator" => Ok(BackendKind::Sim),
            other => Err(UnknownBackend(other.to_string())),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Mock => f.write_str("mock"),
            BackendKind::Sim => f.write_str("sim"),
        }
    }
}

impl BackendKind {
    /// 创建后端，初始位姿取配置中的 home
    ///
    /// 仿真后端会在这里连接。
    pub fn build(self, config: &TeleopConfig) -> Result<Box<dyn Backend>, BackendError> {
        let home = config.home_pose();
        match self {
            BackendKind::Mock => Ok(Box::new(MockBackend::new(home))),
            BackendKind::Sim => {
                let sim = SimBackend::new(SimConfig {
                    initial_pose: home,
                    ..SimConfig::default()
                });
                sim.connect()?;
                Ok(Box::new(sim))
            },
        }
    }
}
