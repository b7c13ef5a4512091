//! 后端工作线程
//!
//! 后端调用在独立线程上执行，会话线程最多等待 `backend_timeout`：
//! 慢后端不会拖住死区定时器，超时按 `BackendError::Timeout` 返回。
//!
//! 被放弃的 `apply_pose` 仍可能在后台生效，所以超时后会在同一队列里
//! 追加一条保持指令，工作线程处理完慢调用后立即让后端保持。

use crossbeam_channel::{Receiver, SendTimeoutError, Sender, TrySendError, bounded};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use teleop_backend::{Ack, Backend, BackendError, BackendState};
use teleop_types::Pose;
use tracing::{debug, warn};

/// 请求队列容量
const REQUEST_QUEUE_CAPACITY: usize = 4;

enum BackendRequest {
    Apply {
        pose: Pose,
        reply: Sender<Result<Ack, BackendError>>,
    },
    State {
        reply: Sender<Result<BackendState, BackendError>>,
    },
    /// `reply` 为 `None` 时是超时后追加的保持指令，没有调用方等待
    Hold {
        reply: Option<Sender<Result<(), BackendError>>>,
    },
}

/// 在工作线程上运行的后端，调用带超时
pub struct BackendWorker {
    name: String,
    timeout: Duration,
    requests: Option<Sender<BackendRequest>>,
    thread: Option<JoinHandle<()>>,
}

impl BackendWorker {
    /// 把后端移入名为 `thread_name` 的工作线程
    pub fn spawn(
        thread_name: String,
        backend: Box<dyn Backend>,
        timeout: Duration,
    ) -> std::io::Result<Self> {
        let name = backend.name().to_string();
        let (tx, rx) = bounded(REQUEST_QUEUE_CAPACITY);

        let thread = std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || run_worker(backend, rx))?;

        Ok(Self {
            name,
            timeout,
            requests: Some(tx),
            thread: Some(thread),
        })
    }

    /// 单次调用超时
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn timeout_error(&self) -> BackendError {
        BackendError::Timeout {
            timeout_ms: self.timeout.as_millis() as u64,
        }
    }

    fn call<T>(
        &self,
        request: BackendRequest,
        reply: &Receiver<Result<T, BackendError>>,
    ) -> Result<T, BackendError> {
        let requests = self
            .requests
            .as_ref()
            .ok_or_else(|| BackendError::ConnectionLost("backend worker stopped".to_string()))?;
        let deadline = Instant::now() + self.timeout;

        requests
            .send_deadline(request, deadline)
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => self.timeout_error(),
                SendTimeoutError::Disconnected(_) => {
                    BackendError::ConnectionLost("backend worker exited".to_string())
                },
            })?;

        match reply.recv_deadline(deadline) {
            Ok(result) => result,
            Err(e) if e.is_timeout() => Err(self.timeout_error()),
            Err(_) => Err(BackendError::ConnectionLost(
                "backend worker dropped the request".to_string(),
            )),
        }
    }

    /// 超时后追加保持指令（不等待）
    fn queue_hold(&self) {
        let Some(requests) = self.requests.as_ref() else {
            return;
        };
        match requests.try_send(BackendRequest::Hold { reply: None }) {
            Ok(()) => debug!("Queued hold behind abandoned apply on '{}'", self.name),
            Err(TrySendError::Full(_)) => warn!(
                "Backend '{}' request queue full, relying on abandoned-reply hold",
                self.name
            ),
            Err(TrySendError::Disconnected(_)) => {},
        }
    }
}

impl Backend for BackendWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply_pose(&mut self, pose: &Pose) -> Result<Ack, BackendError> {
        let (reply_tx, reply_rx) = bounded(1);
        let result = self.call(
            BackendRequest::Apply {
                pose: *pose,
                reply: reply_tx,
            },
            &reply_rx,
        );
        if matches!(result, Err(BackendError::Timeout { .. })) {
            self.queue_hold();
        }
        result
    }

    fn state(&mut self) -> Result<BackendState, BackendError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.call(BackendRequest::State { reply: reply_tx }, &reply_rx)
    }

    fn hold(&mut self) -> Result<(), BackendError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.call(
            BackendRequest::Hold {
                reply: Some(reply_tx),
            },
            &reply_rx,
        )
    }
}

impl Drop for BackendWorker {
    fn drop(&mut self) {
        // 先 drop Sender，工作线程处理完队列后退出
        self.requests.take();
        if let Some(handle) = self.thread.take()
            && handle.join().is_err()
        {
            warn!("Backend worker for '{}' panicked", self.name);
        }
    }
}

fn run_worker(mut backend: Box<dyn Backend>, requests: Receiver<BackendRequest>) {
    for request in requests.iter() {
        match request {
            BackendRequest::Apply { pose, reply } => {
                let result = backend.apply_pose(&pose);
                if reply.send(result).is_err() {
                    warn!(
                        "Apply on '{}' finished after the caller gave up, holding",
                        backend.name()
                    );
                    if let Err(e) = backend.hold() {
                        warn!("Failed to hold '{}': {}", backend.name(), e);
                    }
                }
            },
            BackendRequest::State { reply } => {
                let _ = reply.send(backend.state());
            },
            BackendRequest::Hold { reply } => {
                let result = backend.hold();
                match reply {
                    Some(reply) => {
                        let _ = reply.send(result);
                    },
                    None => {
                        if let Err(e) = result {
                            warn!("Failed to hold '{}': {}", backend.name(), e);
                        }
                    },
                }
            },
        }
    }
    debug!("Backend worker for '{}' stopped", backend.name());
}
