//! 仿真后端适配器
//!
//! 把外部仿真进程建模为一个独立的 plant 线程：
//!
//! - 请求经有界通道发给 plant 线程，调用方按 `response_timeout` 等待确认；
//!   超过截止时间才到达 plant 的下发请求被丢弃，不改变指令位姿
//! - plant 线程每个 `step_period` 以一阶滞后跟踪指令位姿：
//!   `current = current × (1 − α) + commanded × α`
//! - 可配置链路延迟（在 plant 线程内用 `spin_sleep` 模拟）
//! - 显式故障注入：注入后 `apply_pose`/`state` 返回 `BackendError::Fault`
//!
//! `SimBackend` 是 `Clone + Send + Sync` 的句柄，所有克隆驱动同一个仿真实例。

use crate::{Ack, Backend, BackendError, BackendState};
use arc_swap::ArcSwap;
use crossbeam_channel::{
    Receiver, RecvTimeoutError, SendTimeoutError, Sender, bounded, select, tick,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use teleop_types::{Pose, Position3D, Quaternion, Timestamp};
use tracing::{debug, info, warn};

/// 请求队列容量
const REQUEST_QUEUE_CAPACITY: usize = 8;

/// 调用方在截止时间之后多等的时间，覆盖 plant 提交后发送确认的间隙
const REPLY_GRACE: Duration = Duration::from_millis(5);

/// 仿真后端配置
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// 后端名称
    pub name: String,
    /// 仿真进程主机
    pub host: String,
    /// 仿真进程端口
    pub port: u16,
    /// 连接时执行器的初始位姿
    pub initial_pose: Pose,
    /// plant 步进周期
    pub step_period: Duration,
    /// 每步的跟踪系数 α，范围 (0, 1]
    pub tracking_gain: f64,
    /// 单向链路延迟
    pub link_latency: Duration,
    /// 单次调用的响应超时
    pub response_timeout: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            name: "sim".to_string(),
            host: "localhost".to_string(),
            port: 3000,
            initial_pose: Pose::new(Position3D::new(0.0, 0.0, 0.5), Quaternion::IDENTITY),
            step_period: Duration::from_millis(10),
            tracking_gain: 0.5,
            link_latency: Duration::ZERO,
            response_timeout: Duration::from_millis(100),
        }
    }
}

impl SimConfig {
    /// `host:port` 形式的端点标签
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

enum PlantRequest {
    Apply {
        pose: Pose,
        /// 超过此时间调用方已放弃，plant 不得执行
        deadline: Instant,
        reply: Sender<Result<Ack, BackendError>>,
    },
    Hold {
        reply: Sender<()>,
    },
}

/// plant 线程与调用方共享的状态
struct PlantShared {
    state: ArcSwap<BackendState>,
    fault: Mutex<Option<String>>,
    command_count: AtomicU64,
}

struct PlantLink {
    requests: Sender<PlantRequest>,
    thread: JoinHandle<()>,
}

struct SimInner {
    config: SimConfig,
    shared: Arc<PlantShared>,
    link: Mutex<Option<PlantLink>>,
}

impl SimInner {
    fn shutdown(&self) -> bool {
        let Some(link) = self.link.lock().take() else {
            return false;
        };

        // 关闭请求通道，plant 线程随即退出
        drop(link.requests);
        if link.thread.join().is_err() {
            warn!("Sim plant thread panicked during shutdown");
        }
        true
    }
}

impl Drop for SimInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// 仿真后端
#[derive(Clone)]
pub struct SimBackend {
    inner: Arc<SimInner>,
}

impl std::fmt::Debug for SimBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimBackend")
            .field("name", &self.inner.config.name)
            .field("endpoint", &self.inner.config.endpoint())
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl SimBackend {
    /// 创建（未连接）
    pub fn new(config: SimConfig) -> Self {
        let initial = BackendState {
            pose: config.initial_pose,
            command_count: 0,
            timestamp: Timestamp::now(),
        };

        Self {
            inner: Arc::new(SimInner {
                shared: Arc::new(PlantShared {
                    state: ArcSwap::from_pointee(initial),
                    fault: Mutex::new(None),
                    command_count: AtomicU64::new(0),
                }),
                link: Mutex::new(None),
                config,
            }),
        }
    }

    /// 配置
    pub fn config(&self) -> &SimConfig {
        &self.inner.config
    }

    /// 连接仿真进程（启动 plant 线程）
    ///
    /// 已连接时直接返回 `Ok`。
    pub fn connect(&self) -> Result<(), BackendError> {
        let mut link = self.inner.link.lock();
        if link.is_some() {
            return Ok(());
        }

        let (tx, rx) = bounded(REQUEST_QUEUE_CAPACITY);
        let config = self.inner.config.clone();
        let shared = Arc::clone(&self.inner.shared);

        let thread = std::thread::Builder::new()
            .name("teleop-sim-plant".to_string())
            .spawn(move || run_plant(config, shared, rx))
            .map_err(|e| BackendError::ConnectionLost(format!("failed to spawn plant: {e}")))?;

        *link = Some(PlantLink {
            requests: tx,
            thread,
        });

        info!(
            "Connected to simulator '{}' at {}",
            self.inner.config.name,
            self.inner.config.endpoint()
        );
        Ok(())
    }

    /// 断开连接（停止 plant 线程）
    ///
    /// plant 停在断开时的位姿，重新连接后从该位姿继续。
    pub fn disconnect(&self) {
        if self.inner.shutdown() {
            info!("Disconnected from simulator '{}'", self.inner.config.name);
        }
    }

    /// 是否已连接
    pub fn is_connected(&self) -> bool {
        self.inner.link.lock().is_some()
    }

    /// 注入故障
    pub fn inject_fault(&self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!("Injecting simulator fault: {}", reason);
        *self.inner.shared.fault.lock() = Some(reason);
    }

    /// 清除已注入的故障
    pub fn clear_fault(&self) {
        *self.inner.shared.fault.lock() = None;
    }

    /// 累计接受的命令数
    pub fn command_count(&self) -> u64 {
        self.inner.shared.command_count.load(Ordering::SeqCst)
    }

    fn timeout_error(&self) -> BackendError {
        BackendError::Timeout {
            timeout_ms: self.inner.config.response_timeout.as_millis() as u64,
        }
    }

    fn requests(&self) -> Result<Sender<PlantRequest>, BackendError> {
        self.inner
            .link
            .lock()
            .as_ref()
            .map(|link| link.requests.clone())
            .ok_or(BackendError::NotConnected)
    }

    fn send(&self, request: PlantRequest, deadline: Instant) -> Result<(), BackendError> {
        let requests = self.requests()?;
        requests
            .send_deadline(request, deadline)
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => self.timeout_error(),
                SendTimeoutError::Disconnected(_) => {
                    BackendError::ConnectionLost("plant thread exited".to_string())
                },
            })
    }

    fn await_reply<T>(&self, reply: &Receiver<T>, deadline: Instant) -> Result<T, BackendError> {
        reply
            .recv_deadline(deadline + REPLY_GRACE)
            .map_err(|e| match e {
                RecvTimeoutError::Timeout => self.timeout_error(),
                RecvTimeoutError::Disconnected => {
                    BackendError::ConnectionLost("plant dropped the request".to_string())
                },
            })
    }
}

impl Backend for SimBackend {
    fn name(&self) -> &str {
        &self.inner.config.name
    }

    fn apply_pose(&mut self, pose: &Pose) -> Result<Ack, BackendError> {
        let deadline = Instant::now() + self.inner.config.response_timeout;
        let (reply_tx, reply_rx) = bounded(1);
        self.send(
            PlantRequest::Apply {
                pose: *pose,
                deadline,
                reply: reply_tx,
            },
            deadline,
        )?;
        self.await_reply(&reply_rx, deadline)?
    }

    fn state(&mut self) -> Result<BackendState, BackendError> {
        if !self.is_connected() {
            return Err(BackendError::NotConnected);
        }
        if let Some(reason) = self.inner.shared.fault.lock().clone() {
            return Err(BackendError::Fault(reason));
        }
        Ok(**self.inner.shared.state.load())
    }

    /// 冻结 plant：把指令位姿设为当前位姿
    ///
    /// 未连接时执行器本就不会运动，直接返回 `Ok`。
    fn hold(&mut self) -> Result<(), BackendError> {
        if !self.is_connected() {
            return Ok(());
        }
        let deadline = Instant::now() + self.inner.config.response_timeout;
        let (reply_tx, reply_rx) = bounded(1);
        self.send(PlantRequest::Hold { reply: reply_tx }, deadline)?;
        self.await_reply(&reply_rx, deadline)
    }
}

/// 一阶滞后：位置线性插值，姿态球面插值
fn blend(current: &Pose, commanded: &Pose, alpha: f64) -> Pose {
    let alpha = alpha.clamp(0.0, 1.0);
    Pose::new(
        current.position + (commanded.position - current.position) * alpha,
        current.orientation.slerp(&commanded.orientation, alpha),
    )
}

fn run_plant(config: SimConfig, shared: Arc<PlantShared>, requests: Receiver<PlantRequest>) {
    let ticker = tick(config.step_period);
    let mut current = shared.state.load().pose;
    let mut commanded = current;

    debug!("Sim plant started at {}", current);

    loop {
        select! {
            recv(requests) -> msg => match msg {
                Ok(PlantRequest::Apply { pose, deadline, reply }) => {
                    if !config.link_latency.is_zero() {
                        spin_sleep::sleep(config.link_latency);
                    }

                    if Instant::now() > deadline {
                        warn!("Dropping expired pose command {}, keeping {}", pose, commanded);
                        let _ = reply.send(Err(BackendError::Timeout {
                            timeout_ms: config.response_timeout.as_millis() as u64,
                        }));
                        continue;
                    }

                    let result = match shared.fault.lock().clone() {
                        Some(reason) => Err(BackendError::Fault(reason)),
                        None => {
                            commanded = pose;
                            let count = shared.command_count.fetch_add(1, Ordering::SeqCst) + 1;
                            Ok(Ack {
                                command_count: count,
                                accepted_at: Timestamp::now(),
                            })
                        },
                    };
                    // 调用方可能已超时放弃等待
                    let _ = reply.send(result);
                },
                Ok(PlantRequest::Hold { reply }) => {
                    commanded = current;
                    let _ = reply.send(());
                },
                Err(_) => break,
            },
            recv(ticker) -> _ => {
                current = blend(&current, &commanded, config.tracking_gain);
                shared.state.store(Arc::new(BackendState {
                    pose: current,
                    command_count: shared.command_count.load(Ordering::SeqCst),
                    timestamp: Timestamp::now(),
                }));
            },
        }
    }

    debug!("Sim plant stopped at {}", current);
}
