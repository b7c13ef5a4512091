//! 会话线程
//!
//! 每个会话在独立的命名线程上运行一个 [`ControlLoop`]，用 `select!`
//! 同时等待输入消息和定时器，因此即使没有输入死区开关也会触发。
//!
//! - 单写者：只有会话线程修改 `PoseState`
//! - 读者通过 `ArcSwap` 无锁读取最新快照，或从有界状态通道接收事件
//! - 状态通道满时丢弃更新并计数，永远不阻塞控制循环
//! - `Session` 被 drop 时关闭输入通道、让后端保持，并 join 线程

use crate::control_loop::ControlLoop;
use crate::error::SessionError;
use crate::metrics::{SessionMetrics, SessionMetricsSnapshot};
use crate::status::{StatusEvent, StatusSnapshot, StatusUpdate};
use crate::worker::BackendWorker;
use arc_swap::ArcSwap;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, select, tick};
use std::fmt;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use teleop_backend::Backend;
use teleop_tools::TeleopConfig;
use teleop_types::{DeltaCommand, Timestamp};
use tracing::{debug, error, info, warn};

/// 输入通道容量
pub const INBOUND_CAPACITY: usize = 64;

/// 会话标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

enum SessionMessage {
    Command(DeltaCommand),
    Reset {
        reply: Sender<Result<(), SessionError>>,
    },
}

/// 会话线程的发布端
struct StatusPublisher {
    latest: Arc<ArcSwap<StatusSnapshot>>,
    updates: Sender<StatusUpdate>,
    metrics: Arc<SessionMetrics>,
}

impl StatusPublisher {
    fn publish(&self, snapshot: StatusSnapshot, event: Option<StatusEvent>) {
        self.latest.store(Arc::new(snapshot));

        let Some(event) = event else {
            return;
        };
        match self.updates.try_send(StatusUpdate { snapshot, event }) {
            Ok(()) => {},
            Err(TrySendError::Full(_)) => {
                SessionMetrics::incr(&self.metrics.status_dropped);
            },
            // 所有接收端都已关闭（只会在会话关闭过程中发生）
            Err(TrySendError::Disconnected(_)) => {},
        }
    }
}

/// 遥操作会话
pub struct Session {
    id: SessionId,
    backend_name: String,
    inbound: Option<Sender<SessionMessage>>,
    latest: Arc<ArcSwap<StatusSnapshot>>,
    updates: Receiver<StatusUpdate>,
    metrics: Arc<SessionMetrics>,
    thread: Option<JoinHandle<()>>,
}

impl Session {
    /// 打开会话并启动会话线程
    ///
    /// # 错误
    ///
    /// - `SessionError::Config`: 配置校验失败
    /// - `SessionError::Spawn`: 线程启动失败
    pub fn open(
        id: SessionId,
        config: Arc<TeleopConfig>,
        backend: Box<dyn Backend>,
    ) -> Result<Self, SessionError> {
        config.validate()?;

        let backend_name = backend.name().to_string();
        let backend = BackendWorker::spawn(
            format!("teleop-{}-backend", id),
            backend,
            config.backend_timeout(),
        )
        .map_err(|e| SessionError::Spawn(e.to_string()))?;

        let metrics = Arc::new(SessionMetrics::new());
        let tick_period = config.tick_period();
        let control = ControlLoop::new(Arc::clone(&config), backend, Timestamp::now())
            .with_metrics(Arc::clone(&metrics));

        let latest = Arc::new(ArcSwap::from_pointee(control.snapshot()));
        let (inbound_tx, inbound_rx) = bounded(INBOUND_CAPACITY);
        let (updates_tx, updates_rx) = bounded(config.control.status_capacity);

        let publisher = StatusPublisher {
            latest: Arc::clone(&latest),
            updates: updates_tx,
            metrics: Arc::clone(&metrics),
        };

        let thread = std::thread::Builder::new()
            .name(format!("teleop-{}", id))
            .spawn(move || run_session(id, control, inbound_rx, tick_period, publisher))
            .map_err(|e| SessionError::Spawn(e.to_string()))?;

        info!(
            "Opened {} on backend '{}' ({:?} mode, tick {:?}, backend timeout {:?})",
            id,
            backend_name,
            config.control.mode,
            tick_period,
            config.backend_timeout()
        );

        Ok(Self {
            id,
            backend_name,
            inbound: Some(inbound_tx),
            latest,
            updates: updates_rx,
            metrics,
            thread: Some(thread),
        })
    }

    /// 会话标识
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// 后端名称
    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }

    fn inbound(&self) -> Result<&Sender<SessionMessage>, SessionError> {
        self.inbound.as_ref().ok_or(SessionError::ChannelClosed)
    }

    /// 提交命令（输入通道满时阻塞）
    pub fn submit(&self, command: DeltaCommand) -> Result<(), SessionError> {
        self.inbound()?
            .send(SessionMessage::Command(command))
            .map_err(|_| SessionError::ChannelClosed)
    }

    /// 提交命令（输入通道满时立即返回 `ChannelFull`）
    pub fn try_submit(&self, command: DeltaCommand) -> Result<(), SessionError> {
        self.inbound()?
            .try_send(SessionMessage::Command(command))
            .map_err(|e| match e {
                TrySendError::Full(_) => SessionError::ChannelFull(INBOUND_CAPACITY),
                TrySendError::Disconnected(_) => SessionError::ChannelClosed,
            })
    }

    /// 从 `Faulted` 复位（等待会话线程处理完成）
    pub fn reset(&self) -> Result<(), SessionError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.inbound()?
            .send(SessionMessage::Reset { reply: reply_tx })
            .map_err(|_| SessionError::ChannelClosed)?;
        reply_rx.recv().map_err(|_| SessionError::ChannelClosed)?
    }

    /// 最新状态快照（无锁）
    pub fn latest(&self) -> StatusSnapshot {
        **self.latest.load()
    }

    /// 状态通道接收端
    ///
    /// 多个克隆共享同一个队列，每条更新只会被其中一个接收到。
    pub fn updates(&self) -> Receiver<StatusUpdate> {
        self.updates.clone()
    }

    /// 指标快照
    pub fn metrics(&self) -> SessionMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// 关闭会话，返回最终计数
    ///
    /// 会先处理完已入队的命令，再让后端保持。
    pub fn close(mut self) -> SessionMetricsSnapshot {
        self.stop();
        self.metrics()
    }

    fn stop(&mut self) {
        // 必须先 drop Sender，会话线程才会收到 Disconnected
        if self.inbound.take().is_none() {
            return;
        }

        if let Some(handle) = self.thread.take()
            && handle.join().is_err()
        {
            error!("{} thread panicked", self.id);
        }
        info!("Closed {}", self.id);
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("backend", &self.backend_name)
            .field("latest", &self.latest())
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_session<B: Backend>(
    id: SessionId,
    mut control: ControlLoop<B>,
    inbound: Receiver<SessionMessage>,
    tick_period: Duration,
    publisher: StatusPublisher,
) {
    let ticker = tick(tick_period);
    debug!("{} loop started", id);

    loop {
        select! {
            recv(inbound) -> msg => match msg {
                Ok(SessionMessage::Command(command)) => {
                    let event = control.on_command(command, Timestamp::now());
                    publisher.publish(control.snapshot(), event);
                },
                Ok(SessionMessage::Reset { reply }) => {
                    let result = control.reset(Timestamp::now()).map(|event| {
                        publisher.publish(control.snapshot(), Some(event));
                    });
                    if let Err(e) = &result {
                        warn!("{} reset failed: {}", id, e);
                    }
                    let _ = reply.send(result);
                },
                Err(_) => break,
            },
            recv(ticker) -> _ => {
                let events = control.on_tick(Timestamp::now());
                if events.is_empty() {
                    publisher.publish(control.snapshot(), None);
                }
                for event in events {
                    publisher.publish(control.snapshot(), Some(event));
                }
            },
        }
    }

    control.shutdown();
    publisher.publish(control.snapshot(), None);
    debug!("{} loop stopped", id);
}
