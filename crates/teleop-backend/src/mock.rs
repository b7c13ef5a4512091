//! 内存 Mock 后端
//!
//! 确定性桩实现：`apply_pose` 把位姿原样记录并作为状态回显。
//! 通过 [`MockBackendHandle`] 可在后端被会话线程独占后继续注入故障、
//! 读取下发记录，用于测试控制循环。

use crate::{Ack, Backend, BackendError, BackendState};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use teleop_types::{Pose, Timestamp};

#[derive(Debug)]
struct MockShared {
    fail_apply: AtomicBool,
    fail_state: AtomicBool,
    apply_latency: Mutex<Duration>,
    reported_pose: Mutex<Option<Pose>>,
    applied: Mutex<Vec<Pose>>,
    current: Mutex<Pose>,
    apply_calls: AtomicU64,
    hold_calls: AtomicU64,
}

/// Mock 后端
#[derive(Debug)]
pub struct MockBackend {
    name: String,
    shared: Arc<MockShared>,
}

impl MockBackend {
    /// 以给定初始位姿创建
    pub fn new(initial: Pose) -> Self {
        Self {
            name: "mock".to_string(),
            shared: Arc::new(MockShared {
                fail_apply: AtomicBool::new(false),
                fail_state: AtomicBool::new(false),
                apply_latency: Mutex::new(Duration::ZERO),
                reported_pose: Mutex::new(None),
                applied: Mutex::new(Vec::new()),
                current: Mutex::new(initial),
                apply_calls: AtomicU64::new(0),
                hold_calls: AtomicU64::new(0),
            }),
        }
    }

    /// 设置后端名称
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 获取控制句柄
    pub fn handle(&self) -> MockBackendHandle {
        MockBackendHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Backend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply_pose(&mut self, pose: &Pose) -> Result<Ack, BackendError> {
        let count = self.shared.apply_calls.fetch_add(1, Ordering::SeqCst) + 1;

        let latency = *self.shared.apply_latency.lock();
        if !latency.is_zero() {
            std::thread::sleep(latency);
        }

        if self.shared.fail_apply.load(Ordering::SeqCst) {
            return Err(BackendError::Fault("injected apply failure".to_string()));
        }

        *self.shared.current.lock() = *pose;
        self.shared.applied.lock().push(*pose);

        Ok(Ack {
            command_count: count,
            accepted_at: Timestamp::now(),
        })
    }

    fn state(&mut self) -> Result<BackendState, BackendError> {
        if self.shared.fail_state.load(Ordering::SeqCst) {
            return Err(BackendError::ConnectionLost(
                "injected state failure".to_string(),
            ));
        }

        let pose = match *self.shared.reported_pose.lock() {
            Some(reported) => reported,
            None => *self.shared.current.lock(),
        };

        Ok(BackendState {
            pose,
            command_count: self.shared.applied.lock().len() as u64,
            timestamp: Timestamp::now(),
        })
    }

    fn hold(&mut self) -> Result<(), BackendError> {
        self.shared.hold_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Mock 后端的控制句柄（可克隆，跨线程共享）
#[derive(Debug, Clone)]
pub struct MockBackendHandle {
    shared: Arc<MockShared>,
}

impl MockBackendHandle {
    /// 让后续 `apply_pose` 失败
    pub fn set_fail_apply(&self, fail: bool) {
        self.shared.fail_apply.store(fail, Ordering::SeqCst);
    }

    /// 让后续 `state` 失败
    pub fn set_fail_state(&self, fail: bool) {
        self.shared.fail_state.store(fail, Ordering::SeqCst);
    }

    /// 模拟下发延迟
    pub fn set_apply_latency(&self, latency: Duration) {
        *self.shared.apply_latency.lock() = latency;
    }

    /// 让 `state` 报告指定位姿而不是最后下发的位姿（模拟漂移）
    pub fn set_reported_pose(&self, pose: Option<Pose>) {
        *self.shared.reported_pose.lock() = pose;
    }

    /// 成功下发的位姿记录
    pub fn applied_poses(&self) -> Vec<Pose> {
        self.shared.applied.lock().clone()
    }

    /// 最后一次成功下发的位姿
    pub fn last_applied(&self) -> Option<Pose> {
        self.shared.applied.lock().last().copied()
    }

    /// `apply_pose` 调用次数（含失败）
    pub fn apply_calls(&self) -> u64 {
        self.shared.apply_calls.load(Ordering::SeqCst)
    }

    /// `hold` 调用次数
    pub fn hold_calls(&self) -> u64 {
        self.shared.hold_calls.load(Ordering::SeqCst)
    }
}
