//! run 命令
//!
//! 打开一个会话，从文件或 stdin 逐行读取命令并提交。

use super::{OpenSession, SessionArgs, print_summary};
use crate::input::parse_line;
use anyhow::{Context, Result};
use clap::Args;
use crossbeam_channel::{RecvTimeoutError, bounded};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tokio::task::spawn_blocking;

/// 读取线程与提交循环之间的行缓冲
const LINE_BUFFER: usize = 256;

/// 提交循环检查停止信号的间隔
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// run 命令参数
#[derive(Args, Debug)]
pub struct RunCommand {
    #[command(flatten)]
    pub session: SessionArgs,

    /// 命令输入（NDJSON 文件路径，`-` 表示 stdin）
    #[arg(short, long, default_value = "-")]
    pub input: PathBuf,

    /// 输入结束后保持会话的时间（毫秒），用于观察死区开关
    #[arg(long, default_value_t = 0)]
    pub linger_ms: u64,
}

impl RunCommand {
    pub async fn execute(&self) -> Result<()> {
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
        let input = self.input.clone();
        let linger = Duration::from_millis(self.linger_ms);

        let result = spawn_blocking(move || Self::run_sync(session, input, linger, running)).await;

        match result {
            Ok(inner) => inner,
            Err(e) => Err(anyhow::anyhow!("Run task failed: {}", e)),
        }
    }

    /// 同步执行（在 spawn_blocking 的线程中运行）
    fn run_sync(
        args: SessionArgs,
        input: PathBuf,
        linger: Duration,
        running: Arc<AtomicBool>,
    ) -> Result<()> {
        let reader: Box<dyn BufRead + Send> = if input.as_os_str() == "-" {
            Box::new(BufReader::new(std::io::stdin()))
        } else {
            let file = File::open(&input)
                .with_context(|| format!("Failed to open input {}", input.display()))?;
            Box::new(BufReader::new(file))
        };

        let open = OpenSession::open(&args)?;

        // stdin 的读取会阻塞，放在独立线程里，提交循环才能响应 Ctrl-C
        let (lines_tx, lines_rx) = bounded::<String>(LINE_BUFFER);
        thread::Builder::new()
            .name("teleop-cli-input".into())
            .spawn(move || {
                for line in reader.lines() {
                    match line {
                        Ok(line) => {
                            if lines_tx.send(line).is_err() {
                                break;
                            }
                        },
                        Err(e) => {
                            tracing::warn!("Input read error: {}", e);
                            break;
                        },
                    }
                }
            })
            .context("Failed to spawn input reader")?;

        let mut line_no = 0usize;
        while running.load(Ordering::SeqCst) {
            let line = match lines_rx.recv_timeout(POLL_INTERVAL) {
                Ok(line) => line,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            line_no += 1;

            let command = match parse_line(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(e) => {
                    eprintln!("⚠️  第 {} 行格式错误，已跳过: {}", line_no, e);
                    continue;
                },
            };

            open.manager
                .submit(open.id, command)
                .context("Session stopped accepting commands")?;
        }

        if !linger.is_zero() && running.load(Ordering::SeqCst) {
            thread::sleep(linger);
        }

        if let Some(metrics) = open.finish() {
            print_summary(&metrics);
        }
        Ok(())
    }
}
