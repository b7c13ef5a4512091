//! 会话线程集成测试
//!
//! 使用真实线程和较短的超时验证：
//! 1. 命令经会话线程下发并发布到状态通道
//! 2. 没有输入时死区开关由定时器触发
//! 3. 后端故障后命令被接受但不下发，直到显式复位
//! 4. 会话关闭时后端收到保持指令

use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use teleop_backend::{MockBackend, MockBackendHandle};
use teleop_driver::{Session, SessionError, SessionId, SessionManager, StatusEvent, StatusUpdate};
use teleop_tools::TeleopConfig;
use teleop_types::{DeltaCommand, GateStatus};

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

fn open_mock(config: TeleopConfig) -> (Session, MockBackendHandle) {
    let backend = MockBackend::new(config.home_pose());
    let handle = backend.handle();
    let session = Session::open(SessionId(1), Arc::new(config), Box::new(backend)).unwrap();
    (session, handle)
}

fn next_update(updates: &Receiver<StatusUpdate>) -> StatusUpdate {
    updates
        .recv_timeout(RECV_TIMEOUT)
        .expect("no status update within timeout")
}

fn wait_until(timeout: Duration, mut f: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if f() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    f()
}

#[test]
fn test_command_is_applied_and_published() {
    let (session, handle) = open_mock(TeleopConfig::default());
    let updates = session.updates();

    session
        .submit(DeltaCommand::translation(1, 0.01, 0.0, 0.0))
        .unwrap();

    let update = next_update(&updates);
    assert!(matches!(update.event, StatusEvent::Applied { .. }));
    assert_eq!(update.snapshot.last_sequence, 1);
    assert_eq!(update.snapshot.gate_status, GateStatus::Active);
    assert_eq!(handle.apply_calls(), 1);
    assert_eq!(session.latest().last_sequence, 1);
}

#[test]
fn test_deadman_fires_without_input() {
    let mut config = TeleopConfig::default();
    config.deadman.timeout_ms = 100;
    config.deadman.check_interval_ms = 10;
    config.control.backend_timeout_ms = 50;
    let home = config.home_pose();
    let (session, handle) = open_mock(config);
    let updates = session.updates();

    let start = Instant::now();
    let update = next_update(&updates);
    assert_eq!(update.event, StatusEvent::Held);
    assert!(start.elapsed() >= Duration::from_millis(90));
    assert_eq!(update.snapshot.current, home);
    assert_eq!(handle.applied_poses(), vec![home]);
    assert_eq!(session.latest().gate_status, GateStatus::Held);
    assert_eq!(session.metrics().deadman_trips, 1);
}

#[test]
fn test_slow_backend_times_out_instead_of_stalling_deadman() {
    let mut config = TeleopConfig::default();
    config.deadman.timeout_ms = 100;
    config.deadman.check_interval_ms = 10;
    config.control.backend_timeout_ms = 50;
    let home = config.home_pose();
    let (session, handle) = open_mock(config);
    let updates = session.updates();
    handle.set_apply_latency(Duration::from_millis(400));

    let start = Instant::now();
    session
        .submit(DeltaCommand::translation(1, 0.01, 0.0, 0.0))
        .unwrap();

    let update = next_update(&updates);
    match &update.event {
        StatusEvent::Faulted { reason } => assert!(reason.contains("timeout"), "{}", reason),
        other => panic!("unexpected event {:?}", other),
    }
    // 会话线程最多被阻塞一个后端超时
    assert!(start.elapsed() < Duration::from_millis(300));
    assert_eq!(update.snapshot.gate_status, GateStatus::Faulted);
    assert_eq!(update.snapshot.current, home);
    assert_eq!(session.metrics().backend_errors, 1);

    // 被放弃的调用完成后后端被要求保持
    assert!(wait_until(Duration::from_secs(2), || handle.hold_calls() >= 1));
    assert_eq!(handle.apply_calls(), 1);
}

#[test]
fn test_backend_fault_requires_reset() {
    let (session, handle) = open_mock(TeleopConfig::default());
    let updates = session.updates();
    handle.set_fail_apply(true);

    session.submit(DeltaCommand::keep_alive(1)).unwrap();
    let update = next_update(&updates);
    assert!(matches!(update.event, StatusEvent::Faulted { .. }));
    assert_eq!(update.snapshot.gate_status, GateStatus::Faulted);

    // 后端恢复也不会自动退出 Faulted
    handle.set_fail_apply(false);
    session
        .submit(DeltaCommand::translation(2, 0.01, 0.0, 0.0))
        .unwrap();
    let update = next_update(&updates);
    assert!(matches!(update.event, StatusEvent::Faulted { .. }));
    assert_eq!(update.snapshot.last_sequence, 2);
    assert_eq!(handle.apply_calls(), 1);

    session.reset().unwrap();
    assert_eq!(next_update(&updates).event, StatusEvent::Reset);
    assert_eq!(session.latest().gate_status, GateStatus::Active);

    session
        .submit(DeltaCommand::translation(3, 0.01, 0.0, 0.0))
        .unwrap();
    let update = next_update(&updates);
    assert!(matches!(update.event, StatusEvent::Applied { .. }));
    assert_eq!(handle.apply_calls(), 2);
    assert_eq!(session.metrics().backend_errors, 1);
}

#[test]
fn test_reset_outside_fault_is_rejected() {
    let (session, _handle) = open_mock(TeleopConfig::default());
    assert!(matches!(
        session.reset(),
        Err(SessionError::NotFaulted(GateStatus::Active))
    ));
}

#[test]
fn test_malformed_command_reported_not_fatal() {
    let (session, handle) = open_mock(TeleopConfig::default());
    let updates = session.updates();

    session
        .submit(DeltaCommand::translation(1, f64::INFINITY, 0.0, 0.0))
        .unwrap();
    let update = next_update(&updates);
    assert!(matches!(update.event, StatusEvent::Rejected { .. }));
    assert_eq!(update.snapshot.gate_status, GateStatus::Active);
    assert_eq!(handle.apply_calls(), 0);

    session.submit(DeltaCommand::keep_alive(1)).unwrap();
    assert!(matches!(
        next_update(&updates).event,
        StatusEvent::Applied { .. }
    ));
}

#[test]
fn test_full_status_channel_drops_and_counts() {
    let mut config = TeleopConfig::default();
    config.control.status_capacity = 1;
    let (session, _handle) = open_mock(config);

    for seq in 1..=5 {
        session.submit(DeltaCommand::keep_alive(seq)).unwrap();
    }

    assert!(wait_until(RECV_TIMEOUT, || session.latest().last_sequence == 5));
    assert!(session.metrics().status_dropped >= 3);
    assert_eq!(session.metrics().poses_applied, 5);
}

#[test]
fn test_close_holds_backend() {
    let (session, handle) = open_mock(TeleopConfig::default());
    session.submit(DeltaCommand::keep_alive(1)).unwrap();
    assert!(wait_until(RECV_TIMEOUT, || handle.apply_calls() == 1));

    session.close();
    assert_eq!(handle.hold_calls(), 1);
}

#[test]
fn test_sessions_are_isolated() {
    let mut manager = SessionManager::new(TeleopConfig::default()).unwrap();
    let home = manager.config().home_pose();

    let faulty = MockBackend::new(home);
    let faulty_handle = faulty.handle();
    faulty_handle.set_fail_apply(true);
    let healthy = MockBackend::new(home).with_name("healthy");
    let healthy_handle = healthy.handle();

    let a = manager.open(Box::new(faulty)).unwrap();
    let b = manager.open(Box::new(healthy)).unwrap();

    manager.submit(a, DeltaCommand::keep_alive(1)).unwrap();
    manager.submit(b, DeltaCommand::keep_alive(1)).unwrap();

    let session_a = manager.get(a).unwrap();
    let session_b = manager.get(b).unwrap();
    assert!(wait_until(RECV_TIMEOUT, || {
        session_a.latest().gate_status == GateStatus::Faulted
            && session_b.latest().last_sequence == 1
    }));
    assert_eq!(session_b.latest().gate_status, GateStatus::Active);
    assert_eq!(session_b.backend_name(), "healthy");
    assert_eq!(healthy_handle.apply_calls(), 1);

    drop(manager);
    assert_eq!(faulty_handle.hold_calls(), 1);
    assert_eq!(healthy_handle.hold_calls(), 1);
}
