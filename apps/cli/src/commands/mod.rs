//! 命令定义和实现

pub mod config;
pub mod replay;
pub mod run;

pub use config::ConfigCommand;
pub use replay::ReplayCommand;
pub use run::RunCommand;

use anyhow::{Context, Result};
use clap::Args;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use teleop_sdk::driver::{SessionMetricsSnapshot, StatusUpdate};
use teleop_sdk::{BackendKind, SessionId, SessionManager, TeleopConfig};

/// 会话相关的公共参数
#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// 后端类型（mock / sim）
    #[arg(short, long, default_value = "mock")]
    pub backend: BackendKind,

    /// 配置文件路径（默认 ~/.config/teleop/config.toml，不存在时使用内置默认值）
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// 默认配置文件路径
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|mut path| {
        path.push("teleop");
        path.push("config.toml");
        path
    })
}

/// 加载配置
///
/// 显式路径必须存在；否则尝试默认路径，再回退到内置默认值。
pub fn load_config(path: Option<&Path>) -> Result<TeleopConfig> {
    if let Some(path) = path {
        return TeleopConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }

    if let Some(path) = default_config_path()
        && path.exists()
    {
        tracing::debug!("Using config {}", path.display());
        return TeleopConfig::load_from_file(&path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }

    Ok(TeleopConfig::default())
}

/// 已打开的会话以及状态输出线程
pub struct OpenSession {
    pub manager: SessionManager,
    pub id: SessionId,
    printer: Option<JoinHandle<()>>,
}

impl OpenSession {
    /// 按参数打开会话，并启动状态输出线程
    pub fn open(args: &SessionArgs) -> Result<Self> {
        let config = load_config(args.config.as_deref())?;
        let mut manager = SessionManager::new(config).context("Invalid configuration")?;

        let backend = args
            .backend
            .build(manager.config())
            .with_context(|| format!("Failed to create {} backend", args.backend))?;
        let id = manager.open(backend).context("Failed to open session")?;

        let updates = manager
            .get(id)
            .map(|session| session.updates())
            .context("Session disappeared after open")?;

        let printer = thread::Builder::new()
            .name("teleop-cli-status".into())
            .spawn(move || print_updates(updates))
            .context("Failed to spawn status printer")?;

        tracing::info!("Opened {} with {} backend", id, args.backend);

        Ok(Self {
            manager,
            id,
            printer: Some(printer),
        })
    }

    /// 关闭会话，等待状态输出完毕，返回会话计数
    pub fn finish(mut self) -> Option<SessionMetricsSnapshot> {
        let metrics = self.manager.close(self.id).ok();
        if let Some(printer) = self.printer.take() {
            let _ = printer.join();
        }
        metrics
    }
}

/// 状态事件逐行输出为 JSON，直到会话关闭
fn print_updates(updates: crossbeam_channel::Receiver<StatusUpdate>) {
    let stdout = std::io::stdout();
    for update in updates.iter() {
        let line = match serde_json::to_string(&update) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Failed to encode status update: {}", e);
                continue;
            },
        };
        let mut out = stdout.lock();
        if writeln!(out, "{}", line).and_then(|_| out.flush()).is_err() {
            // stdout 已关闭（例如管道另一端退出）
            break;
        }
    }
}

/// 在 stderr 打印会话统计
pub fn print_summary(metrics: &SessionMetricsSnapshot) {
    eprintln!("📊 会话统计:");
    eprintln!("   收到命令: {}", metrics.commands_received);
    eprintln!("   已下发位姿: {}", metrics.poses_applied);
    eprintln!("   过期丢弃: {}", metrics.stale_discarded);
    eprintln!("   拒绝: {}", metrics.rejected);
    eprintln!("   死区触发: {}", metrics.deadman_trips);
    eprintln!("   后端错误: {}", metrics.backend_errors);
    eprintln!("   状态丢弃: {}", metrics.status_dropped);
}
