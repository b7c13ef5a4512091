//! 控制循环
//!
//! 单个会话的状态机，持有该会话唯一的 [`PoseState`]。
//! 所有方法都显式接收当前单调时间 `now`，本身不读时钟、不起线程，
//! 由 [`Session`](crate::Session) 线程驱动。
//!
//! # 命令路径（`on_command`）
//!
//! 1. 校验（非有限值）→ `Rejected`
//! 2. `sequence ≤ last_sequence` → 静默丢弃
//! 3. 积分 → 过门 → 下发（固定频率模式下先累积，在下一次 tick 下发）
//!
//! # 定时器路径（`on_tick`）
//!
//! - 固定频率模式：下发累积的候选位姿
//! - 死区：`Active` 且超时 → 向后端发送保持位姿，进入 `Held`
//! - 漂移检查：每 `drift_check_interval` 次 tick 读取一次后端状态

use crate::error::SessionError;
use crate::metrics::SessionMetrics;
use crate::status::{StatusEvent, StatusSnapshot};
use std::sync::Arc;
use teleop_backend::Backend;
use teleop_control::{SafetyGate, integrate};
use teleop_tools::{LoopMode, TeleopConfig};
use teleop_types::{DeltaCommand, GateStatus, Pose, PoseState, Timestamp};
use tracing::{debug, info, warn};

/// 固定频率模式下等待下一次 tick 的候选位姿
#[derive(Debug, Clone, Copy)]
struct PendingCandidate {
    pose: Pose,
    sequence: u64,
}

/// 控制循环
pub struct ControlLoop<B: Backend> {
    config: Arc<TeleopConfig>,
    gate: SafetyGate,
    backend: B,
    state: PoseState,
    pending: Option<PendingCandidate>,
    fault_reason: Option<String>,
    drift: Option<f64>,
    ticks: u64,
    metrics: Arc<SessionMetrics>,
}

impl<B: Backend> ControlLoop<B> {
    /// 创建控制循环，`current = target = home`
    pub fn new(config: Arc<TeleopConfig>, backend: B, now: Timestamp) -> Self {
        let state = PoseState::new(config.home_pose(), now);
        Self {
            gate: SafetyGate::from_config(&config),
            config,
            backend,
            state,
            pending: None,
            fault_reason: None,
            drift: None,
            ticks: 0,
            metrics: Arc::new(SessionMetrics::new()),
        }
    }

    /// 使用外部共享的指标实例
    pub fn with_metrics(mut self, metrics: Arc<SessionMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// 当前会话状态
    pub fn state(&self) -> &PoseState {
        &self.state
    }

    /// 当前状态快照
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot::from_state(&self.state, self.drift)
    }

    /// 最近一次故障原因（`Faulted` 时有值）
    pub fn fault_reason(&self) -> Option<&str> {
        self.fault_reason.as_deref()
    }

    /// 后端
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// 指标
    pub fn metrics(&self) -> &Arc<SessionMetrics> {
        &self.metrics
    }

    /// 处理一条命令
    ///
    /// 返回 `None` 表示命令被静默丢弃（过期序号），或在固定频率模式下
    /// 已累积、等待下一次 tick。
    pub fn on_command(&mut self, command: DeltaCommand, now: Timestamp) -> Option<StatusEvent> {
        SessionMetrics::incr(&self.metrics.commands_received);

        if let Err(error) = command.validate() {
            warn!("Rejected command seq {}: {}", command.sequence, error);
            SessionMetrics::incr(&self.metrics.rejected);
            return Some(StatusEvent::Rejected { error });
        }

        let highest = self
            .pending
            .map_or(self.state.last_sequence, |pending| pending.sequence);
        if command.sequence <= highest {
            debug!(
                "Discarding stale command seq {} (last accepted {})",
                command.sequence, highest
            );
            SessionMetrics::incr(&self.metrics.stale_discarded);
            return None;
        }

        debug!(
            "Command seq {} (client t={:.3}s, frame {:?})",
            command.sequence, command.timestamp, command.frame
        );

        match self.config.control.mode {
            LoopMode::Command => {
                let candidate = integrate(&self.state.target, &command);
                Some(self.commit(candidate, command.sequence, now))
            },
            LoopMode::FixedRate => {
                let base = self.pending.map_or(self.state.target, |pending| pending.pose);
                self.pending = Some(PendingCandidate {
                    pose: integrate(&base, &command),
                    sequence: command.sequence,
                });
                None
            },
        }
    }

    /// 定时器触发
    pub fn on_tick(&mut self, now: Timestamp) -> Vec<StatusEvent> {
        self.ticks += 1;
        let mut events = Vec::new();

        if let Some(pending) = self.pending.take() {
            events.push(self.commit(pending.pose, pending.sequence, now));
        }

        if self.state.gate_status == GateStatus::Active
            && self.gate.deadman_expired(&self.state, now)
        {
            events.push(self.hold_on_deadman(now));
        }

        let interval = u64::from(self.config.control.drift_check_interval);
        if interval > 0
            && self.ticks % interval == 0
            && self.state.gate_status != GateStatus::Faulted
            && let Some(event) = self.check_drift()
        {
            events.push(event);
        }

        events
    }

    /// 从 `Faulted` 显式复位
    ///
    /// 以后端报告的位姿作为新的 `current`/`target`。
    ///
    /// # 错误
    ///
    /// - `SessionError::NotFaulted`: 当前不是 `Faulted`
    /// - `SessionError::Backend`: 读取后端状态失败，保持 `Faulted`
    pub fn reset(&mut self, now: Timestamp) -> Result<StatusEvent, SessionError> {
        if self.state.gate_status != GateStatus::Faulted {
            return Err(SessionError::NotFaulted(self.state.gate_status));
        }

        let backend_state = self.backend.state()?;

        self.state.current = backend_state.pose;
        self.state.target = backend_state.pose;
        self.state.last_command_time = now;
        self.state.gate_status = GateStatus::Active;
        self.pending = None;
        self.fault_reason = None;
        self.drift = None;

        info!("Session reset from FAULTED, resuming at {}", backend_state.pose);
        Ok(StatusEvent::Reset)
    }

    /// 会话关闭：丢弃未下发的候选，并让后端保持
    pub fn shutdown(&mut self) {
        self.pending = None;
        match self.backend.hold() {
            Ok(()) => info!(
                "Backend '{}' holding at {}",
                self.backend.name(),
                self.state.current
            ),
            Err(e) => warn!(
                "Failed to hold backend '{}' on shutdown: {}",
                self.backend.name(),
                e
            ),
        }
    }

    /// 过门并下发候选位姿
    fn commit(&mut self, candidate: Pose, sequence: u64, now: Timestamp) -> StatusEvent {
        let outcome = self.gate.gate(&candidate, &self.state, now);

        if !self.state.gate_status.can_apply() {
            self.state.last_sequence = sequence;
            self.state.last_command_time = now;
            debug!("Command seq {} gated while FAULTED, not applied", sequence);
            return StatusEvent::Faulted {
                reason: self.fault_reason.clone().unwrap_or_default(),
            };
        }

        if let Err(e) = self.backend.apply_pose(&outcome.pose) {
            return self.fault(e.to_string());
        }

        let previous = self.state.gate_status;
        self.state.current = outcome.pose;
        self.state.target = outcome.pose;
        self.state.last_command_time = now;
        self.state.last_sequence = sequence;
        self.state.gate_status = outcome.status;
        SessionMetrics::incr(&self.metrics.poses_applied);

        if outcome.status == GateStatus::Held {
            if previous == GateStatus::Held {
                info!("Deadman re-armed by command seq {}", sequence);
            } else {
                info!("Deadman expired before command seq {}, holding", sequence);
                SessionMetrics::incr(&self.metrics.deadman_trips);
            }
            return StatusEvent::Held;
        }

        if previous == GateStatus::Held {
            info!("Session ACTIVE again at command seq {}", sequence);
        }
        if outcome.adjustments.any() {
            debug!(
                "Soft limits on seq {}: {:?}",
                sequence, outcome.adjustments
            );
        }
        StatusEvent::Applied {
            adjustments: outcome.adjustments,
        }
    }

    fn hold_on_deadman(&mut self, now: Timestamp) -> StatusEvent {
        let outcome = self.gate.gate(&self.state.target, &self.state, now);

        if let Err(e) = self.backend.apply_pose(&outcome.pose) {
            return self.fault(e.to_string());
        }

        self.state.current = outcome.pose;
        self.state.target = outcome.pose;
        self.state.gate_status = GateStatus::Held;
        SessionMetrics::incr(&self.metrics.poses_applied);
        SessionMetrics::incr(&self.metrics.deadman_trips);

        info!(
            "Deadman expired ({:?} without input), holding at {}",
            self.gate.deadman_timeout(),
            outcome.pose
        );
        StatusEvent::Held
    }

    fn check_drift(&mut self) -> Option<StatusEvent> {
        let backend_state = match self.backend.state() {
            Ok(state) => state,
            Err(e) => return Some(self.fault(e.to_string())),
        };

        let distance = backend_state.pose.distance_to(&self.state.current);
        self.drift = Some(distance);

        let tolerance = self.config.control.drift_tolerance;
        if distance > tolerance {
            warn!(
                "Backend drift {:.4}m exceeds tolerance {:.4}m",
                distance, tolerance
            );
            return Some(StatusEvent::Drift { distance });
        }
        None
    }

    fn fault(&mut self, reason: String) -> StatusEvent {
        warn!(
            "Backend '{}' failed: {}, session FAULTED",
            self.backend.name(),
            reason
        );
        SessionMetrics::incr(&self.metrics.backend_errors);

        self.state.gate_status = GateStatus::Faulted;
        self.pending = None;
        self.fault_reason = Some(reason.clone());
        StatusEvent::Faulted { reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teleop_backend::{MockBackend, MockBackendHandle};

    fn loop_with(config: TeleopConfig) -> (ControlLoop<MockBackend>, MockBackendHandle) {
        let backend = MockBackend::new(config.home_pose());
        let handle = backend.handle();
        (
            ControlLoop::new(Arc::new(config), backend, Timestamp::ZERO),
            handle,
        )
    }

    fn default_loop() -> (ControlLoop<MockBackend>, MockBackendHandle) {
        loop_with(TeleopConfig::default())
    }

    fn ms(v: u64) -> Timestamp {
        Timestamp::from_millis(v)
    }

    #[test]
    fn test_command_is_integrated_and_applied() {
        let (mut cl, handle) = default_loop();

        let event = cl.on_command(DeltaCommand::translation(1, 0.01, 0.0, 0.0), ms(100));
        assert!(matches!(event, Some(StatusEvent::Applied { .. })));

        let state = cl.state();
        assert!((state.current.position.x - 0.01).abs() < 1e-12);
        assert_eq!(state.current, state.target);
        assert_eq!(state.last_sequence, 1);
        assert_eq!(state.last_command_time, ms(100));
        assert_eq!(state.gate_status, GateStatus::Active);
        assert_eq!(handle.last_applied(), Some(state.current));
    }

    #[test]
    fn test_stale_and_duplicate_commands_are_discarded() {
        let (mut cl, handle) = default_loop();

        cl.on_command(DeltaCommand::translation(5, 0.01, 0.0, 0.0), ms(100));
        let before = *cl.state();

        assert!(cl.on_command(DeltaCommand::translation(5, 0.01, 0.0, 0.0), ms(150)).is_none());
        assert!(cl.on_command(DeltaCommand::translation(3, 0.01, 0.0, 0.0), ms(160)).is_none());

        assert_eq!(*cl.state(), before);
        assert_eq!(handle.apply_calls(), 1);
        assert_eq!(cl.metrics().snapshot().stale_discarded, 2);
    }

    #[test]
    fn test_malformed_command_is_rejected() {
        let (mut cl, handle) = default_loop();
        let before = *cl.state();

        let event = cl.on_command(DeltaCommand::translation(1, f64::NAN, 0.0, 0.0), ms(100));
        assert!(matches!(event, Some(StatusEvent::Rejected { .. })));
        assert_eq!(*cl.state(), before);
        assert_eq!(handle.apply_calls(), 0);

        // 会话不受影响
        let event = cl.on_command(DeltaCommand::translation(1, 0.01, 0.0, 0.0), ms(150));
        assert!(matches!(event, Some(StatusEvent::Applied { .. })));
    }

    #[test]
    fn test_backend_error_faults_until_reset() {
        let (mut cl, handle) = default_loop();
        let home = cl.state().current;
        handle.set_fail_apply(true);

        let event = cl.on_command(DeltaCommand::translation(1, 0.01, 0.0, 0.0), ms(100));
        assert!(matches!(event, Some(StatusEvent::Faulted { .. })));
        assert_eq!(cl.state().gate_status, GateStatus::Faulted);
        assert_eq!(cl.state().current, home);
        assert!(cl.fault_reason().is_some());

        // 故障期间：命令被接受、过门，但不下发
        handle.set_fail_apply(false);
        let event = cl.on_command(DeltaCommand::translation(2, 0.01, 0.0, 0.0), ms(200));
        assert!(matches!(event, Some(StatusEvent::Faulted { .. })));
        assert_eq!(handle.apply_calls(), 1);
        assert_eq!(cl.state().last_sequence, 2);
        assert_eq!(cl.state().last_command_time, ms(200));
        assert_eq!(cl.state().current, home);

        // 故障期间定时器不做死区保持
        assert!(cl.on_tick(ms(2_000)).is_empty());
        assert_eq!(handle.apply_calls(), 1);
    }

    #[test]
    fn test_reset_requires_faulted() {
        let (mut cl, _handle) = default_loop();
        assert!(matches!(
            cl.reset(ms(10)),
            Err(SessionError::NotFaulted(GateStatus::Active))
        ));
    }

    #[test]
    fn test_reset_resyncs_to_backend_pose() {
        let (mut cl, handle) = default_loop();
        handle.set_fail_apply(true);
        cl.on_command(DeltaCommand::translation(1, 0.01, 0.0, 0.0), ms(100));

        handle.set_fail_apply(false);
        let actual = Pose::from_position(0.05, 0.0, 0.45);
        handle.set_reported_pose(Some(actual));

        assert_eq!(cl.reset(ms(300)).unwrap(), StatusEvent::Reset);
        assert_eq!(cl.state().gate_status, GateStatus::Active);
        assert_eq!(cl.state().current, actual);
        assert_eq!(cl.state().target, actual);
        assert_eq!(cl.state().last_command_time, ms(300));
        assert!(cl.fault_reason().is_none());

        let event = cl.on_command(DeltaCommand::translation(2, 0.01, 0.0, 0.0), ms(350));
        assert!(matches!(event, Some(StatusEvent::Applied { .. })));
        assert!((cl.state().current.position.x - 0.06).abs() < 1e-12);
    }

    #[test]
    fn test_failed_reset_stays_faulted() {
        let (mut cl, handle) = default_loop();
        handle.set_fail_apply(true);
        cl.on_command(DeltaCommand::translation(1, 0.01, 0.0, 0.0), ms(100));

        handle.set_fail_state(true);
        assert!(matches!(cl.reset(ms(200)), Err(SessionError::Backend(_))));
        assert_eq!(cl.state().gate_status, GateStatus::Faulted);
    }

    #[test]
    fn test_timer_deadman_holds_once() {
        let (mut cl, handle) = default_loop();
        let home = cl.state().current;

        assert!(cl.on_tick(ms(400)).is_empty());
        assert_eq!(cl.on_tick(ms(600)), vec![StatusEvent::Held]);
        assert_eq!(cl.state().gate_status, GateStatus::Held);
        assert_eq!(cl.state().current, home);
        assert_eq!(cl.state().last_command_time, Timestamp::ZERO);
        assert_eq!(handle.applied_poses(), vec![home]);

        assert!(cl.on_tick(ms(700)).is_empty());
        assert_eq!(handle.apply_calls(), 1);
        assert_eq!(cl.metrics().snapshot().deadman_trips, 1);
    }

    #[test]
    fn test_first_command_after_stall_rearms() {
        let (mut cl, _handle) = default_loop();
        cl.on_tick(ms(600));
        let held_at = cl.state().current;

        let event = cl.on_command(DeltaCommand::translation(1, 0.2, 0.0, 0.0), ms(800));
        assert_eq!(event, Some(StatusEvent::Held));
        assert_eq!(cl.state().current, held_at);
        assert_eq!(cl.state().last_command_time, ms(800));
        assert_eq!(cl.state().last_sequence, 1);

        let event = cl.on_command(DeltaCommand::translation(2, 0.01, 0.0, 0.0), ms(850));
        assert!(matches!(event, Some(StatusEvent::Applied { .. })));
        assert_eq!(cl.state().gate_status, GateStatus::Active);
        assert!((cl.state().current.position.x - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_fixed_rate_applies_on_tick() {
        let mut config = TeleopConfig::default();
        config.control.mode = LoopMode::FixedRate;
        let (mut cl, handle) = loop_with(config);

        assert!(cl.on_command(DeltaCommand::translation(1, 0.01, 0.0, 0.0), ms(10)).is_none());
        assert!(cl.on_command(DeltaCommand::translation(2, 0.01, 0.0, 0.0), ms(15)).is_none());
        assert!(cl.on_command(DeltaCommand::translation(2, 0.01, 0.0, 0.0), ms(16)).is_none());
        assert_eq!(handle.apply_calls(), 0);

        let events = cl.on_tick(ms(100));
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], StatusEvent::Applied { .. }));
        assert!((cl.state().current.position.x - 0.02).abs() < 1e-12);
        assert_eq!(cl.state().last_sequence, 2);
        assert_eq!(handle.apply_calls(), 1);
        assert_eq!(cl.metrics().snapshot().stale_discarded, 1);

        // 没有新命令时 tick 不下发
        assert!(cl.on_tick(ms(120)).is_empty());
        assert_eq!(handle.apply_calls(), 1);
    }

    #[test]
    fn test_drift_check() {
        let mut config = TeleopConfig::default();
        config.control.drift_check_interval = 2;
        let (mut cl, handle) = loop_with(config);

        handle.set_reported_pose(Some(Pose::from_position(0.0, 0.0, 0.6)));
        assert!(cl.on_tick(ms(50)).is_empty());

        let events = cl.on_tick(ms(100));
        assert_eq!(events.len(), 1);
        match events[0] {
            StatusEvent::Drift { distance } => assert!((distance - 0.1).abs() < 1e-9),
            ref other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(cl.state().gate_status, GateStatus::Active);
        assert!(cl.snapshot().drift.is_some());

        handle.set_reported_pose(None);
        handle.set_fail_state(true);
        cl.on_tick(ms(150));
        let events = cl.on_tick(ms(200));
        assert!(matches!(events[..], [StatusEvent::Faulted { .. }]));
        assert_eq!(cl.state().gate_status, GateStatus::Faulted);
    }

    #[test]
    fn test_shutdown_holds_backend() {
        let (mut cl, handle) = default_loop();
        cl.shutdown();
        assert_eq!(handle.hold_calls(), 1);
    }
}
