//! # Teleop CLI
//!
//! Command-line interface for safety-gated teleoperation sessions.
//!
//! ## 输入格式
//!
//! 每行一个 JSON 编码的 `DeltaCommand`（NDJSON），空行和 `#` 开头的行被忽略：
//!
//! ```text
//! {"dx":0.01,"dy":0,"dz":0,"droll":0,"dpitch":0,"dyaw":0,"timestamp":0.0,"sequence":1}
//! ```
//!
//! ## 示例
//!
//! ```bash
//! # 从 stdin 读取命令，驱动 Mock 后端，状态以 JSON 行输出到 stdout
//! teleop-cli run --backend mock < commands.ndjson
//!
//! # 以 20 Hz 回放命令文件（与键盘客户端的发送频率一致）
//! teleop-cli replay --rate 20 commands.ndjson
//!
//! # 配置管理
//! teleop-cli config init teleop.toml
//! teleop-cli config check --config teleop.toml
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod input;

use commands::{ConfigCommand, ReplayCommand, RunCommand};

/// Teleop CLI - 遥操作命令行工具
#[derive(Parser, Debug)]
#[command(name = "teleop-cli")]
#[command(about = "Command-line interface for safety-gated robot arm teleoperation", long_about = None)]
#[command(version)]
struct Cli {
    /// 输出调试日志（RUST_LOG 优先）
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 打开会话，从文件或 stdin 读取命令
    Run {
        #[command(flatten)]
        args: RunCommand,
    },

    /// 按固定频率回放命令文件
    Replay {
        #[command(flatten)]
        args: ReplayCommand,
    },

    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志（输出到 stderr，stdout 只输出状态 JSON）
    let filter = if cli.verbose { "debug" } else { "warn,teleop_cli=info" };
    teleop_sdk::try_init_logger(filter)?;

    match cli.command {
        Commands::Run { args } => args.execute().await,

        Commands::Replay { args } => args.execute().await,

        Commands::Config(cmd) => cmd.execute(),
    }
}
