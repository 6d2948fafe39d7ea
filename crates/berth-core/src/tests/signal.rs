//! Signal handling suites.

use std::time::Duration;

use crate::error::SupervisorError;
use crate::signal::SignalSource;
use crate::tests::mocks::MockSignals;
use crate::types::Signal;

#[test]
fn termination_set_is_fixed() {
    let names: Vec<_> = Signal::TERMINATION.iter().map(Signal::name).collect();
    assert_eq!(names, vec!["SIGINT", "SIGTERM", "SIGABRT", "SIGHUP"]);
}

#[tokio::test]
async fn signal_sent_before_wait_is_not_lost() {
    let (tx, mut signals) = MockSignals::channel();
    tx.send(Signal::Hup).await.unwrap();

    let sig = tokio::time::timeout(Duration::from_secs(1), signals.wait())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sig, Signal::Hup);
}

#[tokio::test]
async fn single_slot_drops_extra_signals() {
    let (tx, mut signals) = MockSignals::channel();
    tx.try_send(Signal::Term).unwrap();
    assert!(tx.try_send(Signal::Int).is_err());
    assert_eq!(signals.wait().await.unwrap(), Signal::Term);
}

#[tokio::test]
async fn closed_source_is_an_error() {
    let (tx, mut signals) = MockSignals::channel();
    drop(tx);
    let err = signals.wait().await.unwrap_err();
    assert!(matches!(err, SupervisorError::Signal(_)));
}

#[cfg(unix)]
#[tokio::test]
async fn os_signals_trap_sighup() {
    use crate::signal::OsSignals;

    let mut signals = OsSignals::install().unwrap();
    nix::sys::signal::raise(nix::sys::signal::Signal::SIGHUP).unwrap();

    let sig = tokio::time::timeout(Duration::from_secs(5), signals.wait())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sig, Signal::Hup);
}
