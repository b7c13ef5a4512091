//! replay 命令
//!
//! 按固定频率回放 NDJSON 命令文件。

use super::{OpenSession, SessionArgs, print_summary};
use crate::input::load_commands;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use teleop_sdk::types::DeltaCommand;
use tokio::task::spawn_blocking;
use tracing::warn;

/// 回放频率上限（Hz）
const MAX_RATE_HZ: f64 = 1000.0;

/// 回放命令参数
#[derive(Args, Debug)]
pub struct ReplayCommand {
    #[command(flatten)]
    pub session: SessionArgs,

    /// 发送频率（Hz），默认与键盘客户端一致
    #[arg(short, long, default_value_t = 20.0)]
    pub rate: f64,

    /// 忽略文件中的序号，按回放顺序重新编号
    #[arg(long)]
    pub resequence: bool,

    /// 命令文件路径（NDJSON）
    pub path: PathBuf,
}

impl ReplayCommand {
    pub async fn execute(&self) -> Result<()> {
        validate_rate(self.rate)?;

        let mut commands = load_commands(&self.path)?;
        if commands.is_empty() {
            anyhow::bail!("No commands in {}", self.path.display());
        }
        if self.resequence {
            resequence(&mut commands);
        }

        eprintln!(
            "▶️  回放 {} 条命令 @ {:.1} Hz（按 Ctrl-C 停止）",
            commands.len(),
            self.rate
        );

        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();

        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!();
                eprintln!("🛑 收到停止信号，正在关闭会话...");
                running_clone.store(false, Ordering::SeqCst);
            }
        });

        let session = self.session.clone();
        let period = Duration::from_secs_f64(1.0 / self.rate);

        let result =
            spawn_blocking(move || Self::replay_sync(session, commands, period, running)).await;

        match result {
            Ok(inner) => inner,
            Err(e) => Err(anyhow::anyhow!("Replay task failed: {}", e)),
        }
    }

    /// 同步回放（在 spawn_blocking 的线程中运行）
    fn replay_sync(
        args: SessionArgs,
        commands: Vec<DeltaCommand>,
        period: Duration,
        running: Arc<AtomicBool>,
    ) -> Result<()> {
        let open = OpenSession::open(&args)?;

        // 绝对时间锚点，消除累积漂移
        let mut next_tick = Instant::now();
        let mut sent = 0usize;

        for command in commands {
            if !running.load(Ordering::SeqCst) {
                break;
            }
            next_tick += period;

            open.manager.submit(open.id, command)?;
            sent += 1;

            let now = Instant::now();
            if next_tick > now {
                spin_sleep::sleep(next_tick - now);
            } else {
                warn!(
                    "Replay overrun: submit took {:?} (period {:?})",
                    now.duration_since(next_tick - period),
                    period
                );
                next_tick = now;
            }
        }

        eprintln!("✅ 已发送 {} 条命令", sent);
        if let Some(metrics) = open.finish() {
            print_summary(&metrics);
        }
        Ok(())
    }
}

/// 校验回放频率
fn validate_rate(rate: f64) -> Result<()> {
    if !rate.is_finite() || rate <= 0.0 {
        anyhow::bail!("Replay rate must be a positive number, got {}", rate);
    }
    if rate > MAX_RATE_HZ {
        anyhow::bail!("Replay rate {} Hz exceeds the maximum of {} Hz", rate, MAX_RATE_HZ);
    }
    Ok(())
}

/// 按回放顺序重新编号，序号从 1 开始
fn resequence(commands: &mut [DeltaCommand]) {
    for (index, command) in commands.iter_mut().enumerate() {
        command.sequence = index as u64 + 1;
    }
}
