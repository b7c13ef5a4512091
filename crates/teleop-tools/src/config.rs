//! # 遥操作配置
//!
//! 进程启动时加载一次，之后只读。控制循环在构造时接收
//! `Arc<TeleopConfig>`，运行期间不会读取任何全局状态。
//!
//! 配置文件示例：
//!
//! ```toml
//! [workspace]
//! max_linear_velocity = 0.5
//! max_angular_velocity = 1.0
//! min = { x = -0.5, y = -0.5, z = 0.0 }
//! max = { x = 0.5, y = 0.5, z = 1.0 }
//!
//! [deadman]
//! timeout_ms = 500
//! check_interval_ms = 50
//!
//! [control]
//! mode = "command"
//! rate_hz = 50.0
//! backend_timeout_ms = 200
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use teleop_types::{Pose, Position3D, Quaternion, WorkspaceBounds};
use thiserror::Error;

/// 控制频率上限（Hz），超过视为配置错误
const MAX_RATE_HZ: f64 = 10_000.0;

/// 控制频率告警阈值（Hz）
const HIGH_RATE_WARN_HZ: f64 = 1_000.0;

/// 初始姿态四元数允许的模长偏差
const HOME_QUATERNION_TOLERANCE: f64 = 1e-3;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 读写配置文件失败
    #[error("Config file I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML 解析失败
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML 序列化失败
    #[error("Config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// 字段取值非法
    #[error("Invalid config `{field}`: {reason}")]
    Invalid {
        /// 字段路径
        field: &'static str,
        /// 原因
        reason: String,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// 控制循环调度模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopMode {
    /// 每收到一条命令立即积分、过门、下发
    #[default]
    Command,
    /// 命令先累积，按固定频率过门、下发
    FixedRate,
}

/// 死区开关设置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadmanSettings {
    /// 超时（毫秒），超过此时间无命令则进入 Held
    pub timeout_ms: u64,

    /// 定时器检查周期（毫秒）
    ///
    /// 命令触发模式下死区检查的定时器周期；不能大于 `timeout_ms`。
    pub check_interval_ms: u64,
}

impl Default for DeadmanSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 500,
            check_interval_ms: 50,
        }
    }
}

/// 控制循环设置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSettings {
    /// 调度模式
    pub mode: LoopMode,

    /// 固定频率模式的控制频率（Hz）
    pub rate_hz: f64,

    /// 状态通道容量（满时丢弃最新状态，不阻塞控制循环）
    pub status_capacity: usize,

    /// 每隔多少次定时器触发读取一次后端状态做漂移检查（0 = 关闭）
    pub drift_check_interval: u32,

    /// 漂移告警阈值（米）
    pub drift_tolerance: f64,

    /// 单次后端调用的超时（毫秒），必须小于死区超时
    ///
    /// 超时的调用按 `BackendError::Timeout` 处理，会话进入 `Faulted`。
    pub backend_timeout_ms: u64,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            mode: LoopMode::Command,
            rate_hz: 50.0,
            status_capacity: 64,
            drift_check_interval: 10,
            drift_tolerance: 0.05,
            backend_timeout_ms: 200,
        }
    }
}

/// 遥操作配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeleopConfig {
    /// 工作空间边界与速度限制
    pub workspace: WorkspaceBounds,

    /// 死区开关
    pub deadman: DeadmanSettings,

    /// 控制循环
    pub control: ControlSettings,

    /// 会话初始位姿
    pub home: Pose,
}

impl Default for TeleopConfig {
    fn default() -> Self {
        Self {
            workspace: WorkspaceBounds::default(),
            deadman: DeadmanSettings::default(),
            control: ControlSettings::default(),
            home: Pose::new(Position3D::new(0.0, 0.0, 0.5), Quaternion::IDENTITY),
        }
    }
}

impl TeleopConfig {
    /// 创建默认配置
    pub fn default_config() -> Self {
        Self::default()
    }

    /// 从 TOML 字符串解析并校验
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: TeleopConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载配置并校验
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&content)?;
        tracing::info!("Loaded teleop config from {}", path.as_ref().display());
        Ok(config)
    }

    /// 序列化为 TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// 死区超时
    pub fn deadman_timeout(&self) -> Duration {
        Duration::from_millis(self.deadman.timeout_ms)
    }

    /// 单次后端调用超时
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.control.backend_timeout_ms)
    }

    /// 会话线程定时器周期
    ///
    /// - `Command` 模式：死区检查周期
    /// - `FixedRate` 模式：`1 / rate_hz`
    pub fn tick_period(&self) -> Duration {
        match self.control.mode {
            LoopMode::Command => Duration::from_millis(self.deadman.check_interval_ms),
            LoopMode::FixedRate => Duration::from_secs_f64(1.0 / self.control.rate_hz),
        }
    }

    /// 归一化后的初始位姿
    pub fn home_pose(&self) -> Pose {
        Pose::new(self.home.position, self.home.orientation.normalize())
    }

    /// 校验配置
    ///
    /// # 错误
    ///
    /// 返回第一个不合法字段对应的 `ConfigError::Invalid`。
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ws = &self.workspace;

        for (field, v) in [
            ("workspace.max_linear_velocity", ws.max_linear_velocity),
            ("workspace.max_angular_velocity", ws.max_angular_velocity),
        ] {
            if !v.is_finite() || v <= 0.0 {
                return Err(ConfigError::invalid(
                    field,
                    format!("{} (must be finite and > 0)", v),
                ));
            }
        }

        if !ws.min.is_finite() {
            return Err(ConfigError::invalid("workspace.min", "non-finite value"));
        }
        if !ws.max.is_finite() {
            return Err(ConfigError::invalid("workspace.max", "non-finite value"));
        }
        for (axis, lo, hi) in [
            ("x", ws.min.x, ws.max.x),
            ("y", ws.min.y, ws.max.y),
            ("z", ws.min.z, ws.max.z),
        ] {
            if lo > hi {
                return Err(ConfigError::invalid(
                    "workspace.min",
                    format!("min.{axis} = {lo} is greater than max.{axis} = {hi}"),
                ));
            }
        }

        if self.deadman.timeout_ms == 0 {
            return Err(ConfigError::invalid("deadman.timeout_ms", "must be > 0"));
        }
        if self.deadman.check_interval_ms == 0
            || self.deadman.check_interval_ms > self.deadman.timeout_ms
        {
            return Err(ConfigError::invalid(
                "deadman.check_interval_ms",
                format!(
                    "{} (must be in 1..={})",
                    self.deadman.check_interval_ms, self.deadman.timeout_ms
                ),
            ));
        }

        if self.control.backend_timeout_ms == 0
            || self.control.backend_timeout_ms >= self.deadman.timeout_ms
        {
            return Err(ConfigError::invalid(
                "control.backend_timeout_ms",
                format!(
                    "{} (must be in 1..{})",
                    self.control.backend_timeout_ms, self.deadman.timeout_ms
                ),
            ));
        }

        let rate = self.control.rate_hz;
        if !rate.is_finite() || rate <= 0.0 || rate > MAX_RATE_HZ {
            return Err(ConfigError::invalid(
                "control.rate_hz",
                format!("{} (must be in (0, {}])", rate, MAX_RATE_HZ),
            ));
        }
        if rate > HIGH_RATE_WARN_HZ {
            tracing::warn!(
                "Very high control rate: {} Hz. This may cause performance issues.",
                rate
            );
        }
        if self.control.status_capacity == 0 {
            return Err(ConfigError::invalid(
                "control.status_capacity",
                "must be > 0",
            ));
        }
        if !self.control.drift_tolerance.is_finite() || self.control.drift_tolerance < 0.0 {
            return Err(ConfigError::invalid(
                "control.drift_tolerance",
                format!("{} (must be finite and >= 0)", self.control.drift_tolerance),
            ));
        }

        if !self.home.is_finite() {
            return Err(ConfigError::invalid("home", "non-finite value"));
        }
        if (self.home.orientation.norm_squared().sqrt() - 1.0).abs() > HOME_QUATERNION_TOLERANCE {
            return Err(ConfigError::invalid(
                "home.orientation",
                format!("{} is not a unit quaternion", self.home.orientation),
            ));
        }
        if !ws.contains_pose(&self.home) {
            return Err(ConfigError::invalid(
                "home.position",
                format!("{} is outside the workspace bounds", self.home.position),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = TeleopConfig::default_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.deadman_timeout(), Duration::from_millis(500));
        assert_eq!(config.workspace.max_linear_velocity, 0.5);
        assert_eq!(config.workspace.max_angular_velocity, 1.0);
        assert_eq!(config.home.position, Position3D::new(0.0, 0.0, 0.5));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = TeleopConfig::from_toml_str(
            r#"
            [deadman]
            timeout_ms = 250
            check_interval_ms = 25
            "#,
        )
        .unwrap();

        assert_eq!(config.deadman.timeout_ms, 250);
        assert_eq!(config.control, ControlSettings::default());
        assert_eq!(config.workspace, WorkspaceBounds::default());
    }

    #[test]
    fn test_partial_workspace_table() {
        let config = TeleopConfig::from_toml_str(
            r#"
            [workspace]
            max_linear_velocity = 0.25
            "#,
        )
        .unwrap();

        assert_eq!(config.workspace.max_linear_velocity, 0.25);
        assert_eq!(config.workspace.min, WorkspaceBounds::default().min);

        let err = TeleopConfig::from_toml_str("[workspace]\nmax_linear_velocity = -1.0\n")
            .unwrap_err();
        assert!(err.to_string().contains("max_linear_velocity"));
    }

    #[test]
    fn test_full_toml() {
        let config = TeleopConfig::from_toml_str(
            r#"
            [workspace]
            max_linear_velocity = 0.25
            max_angular_velocity = 0.5
            min = { x = 0.0, y = 0.0, z = 0.0 }
            max = { x = 1.0, y = 1.0, z = 1.0 }

            [control]
            mode = "fixed_rate"
            rate_hz = 100.0

            [home]
            position = { x = 0.5, y = 0.5, z = 0.5 }
            orientation = { w = 1.0, x = 0.0, y = 0.0, z = 0.0 }
            "#,
        )
        .unwrap();

        assert_eq!(config.control.mode, LoopMode::FixedRate);
        assert_eq!(config.tick_period(), Duration::from_millis(10));
        assert_eq!(config.workspace.max, Position3D::new(1.0, 1.0, 1.0));
        assert_eq!(config.home.position, Position3D::new(0.5, 0.5, 0.5));
    }

    #[test]
    fn test_tick_period_command_mode_uses_deadman_interval() {
        let config = TeleopConfig::default();
        assert_eq!(config.tick_period(), Duration::from_millis(50));
    }

    #[test]
    fn test_backend_timeout_must_be_below_deadman() {
        let mut config = TeleopConfig::default();
        assert_eq!(config.backend_timeout(), Duration::from_millis(200));

        config.control.backend_timeout_ms = config.deadman.timeout_ms;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "control.backend_timeout_ms",
                ..
            })
        ));

        config.control.backend_timeout_ms = 0;
        assert!(config.validate().is_err());

        config.control.backend_timeout_ms = 499;
        assert!(config.validate().is_ok());

        let err = TeleopConfig::from_toml_str(
            r#"
            [deadman]
            timeout_ms = 150
            check_interval_ms = 10
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("backend_timeout_ms"));
    }

    #[test]
    fn test_rejects_inverted_bounds() {
        let mut config = TeleopConfig::default();
        config.workspace.min.y = 2.0;

        match config.validate() {
            Err(ConfigError::Invalid { field, reason }) => {
                assert_eq!(field, "workspace.min");
                assert!(reason.contains("min.y"), "reason: {}", reason);
            },
            other => panic!("Expected Invalid error, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_non_positive_velocity() {
        let mut config = TeleopConfig::default();
        config.workspace.max_angular_velocity = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "workspace.max_angular_velocity",
                ..
            })
        ));

        config.workspace.max_angular_velocity = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_check_interval_longer_than_timeout() {
        let mut config = TeleopConfig::default();
        config.deadman.check_interval_ms = 600;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "deadman.check_interval_ms",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_home_outside_bounds() {
        let mut config = TeleopConfig::default();
        config.home.position.z = 5.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "home.position",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_non_unit_home_orientation() {
        let mut config = TeleopConfig::default();
        config.home.orientation = Quaternion::new(2.0, 0.0, 0.0, 0.0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "home.orientation",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_zero_rate_and_capacity() {
        let mut config = TeleopConfig::default();
        config.control.rate_hz = 0.0;
        assert!(config.validate().is_err());

        let mut config = TeleopConfig::default();
        config.control.status_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = TeleopConfig::from_toml_str("[deadman]\ntimeout_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("teleop.toml");

        let mut config = TeleopConfig::default();
        config.deadman.timeout_ms = 300;
        config.control.mode = LoopMode::FixedRate;
        config.save_to_file(&path).unwrap();

        let loaded = TeleopConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_from_file_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[deadman]\ntimeout_ms = 0").unwrap();

        let err = TeleopConfig::load_from_file(file.path()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "deadman.timeout_ms",
                ..
            }
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = TeleopConfig::load_from_file("/nonexistent/teleop.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
