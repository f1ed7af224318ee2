//! Tests for recovery delays.

use std::time::{Duration, Instant};

use copilot_bridge::error::{attempt_recovery, ClassifiedError, ErrorKind};

#[tokio::test]
async fn network_waits_two_seconds() {
    let err = ClassifiedError::new(ErrorKind::Network, "Network connection failed");
    let start = Instant::now();
    assert!(attempt_recovery(&err).await);
    assert!(start.elapsed() >= Duration::from_millis(2000));
}

#[tokio::test]
async fn timeout_waits_one_second() {
    let err = ClassifiedError::new(ErrorKind::Timeout, "Command execution timeout");
    let start = Instant::now();
    assert!(attempt_recovery(&err).await);
    assert!(start.elapsed() >= Duration::from_millis(1000));
}

#[tokio::test]
async fn non_recoverable_returns_immediately() {
    let err = ClassifiedError::new(ErrorKind::Permission, "Permission denied");
    let start = Instant::now();
    assert!(!attempt_recovery(&err).await);
    assert!(start.elapsed() < Duration::from_millis(500));
}

#[tokio::test]
async fn process_exit_recovers_without_delay() {
    let err = ClassifiedError::new(ErrorKind::ProcessExit, "Copilot process exited unexpectedly");
    let start = Instant::now();
    assert!(attempt_recovery(&err).await);
    assert!(start.elapsed() < Duration::from_millis(500));
}
