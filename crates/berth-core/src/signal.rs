//! Termination signal source.
//!
//! The supervisor blocks on [`SignalSource::wait`] once everything is up.
//! [`OsSignals`] traps SIGINT, SIGTERM, SIGABRT and SIGHUP into a single-slot
//! channel; a signal delivered before the supervisor starts waiting is kept,
//! later ones are dropped while the slot is full.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{Result, SupervisorError};
use crate::types::Signal;

/// Source of termination signals.
#[async_trait]
pub trait SignalSource: Send {
    /// Waits for the next termination signal.
    ///
    /// # Errors
    /// Returns an error if the source can no longer deliver signals.
    async fn wait(&mut self) -> Result<Signal>;
}

/// Process signals trapped through tokio.
#[derive(Debug)]
pub struct OsSignals {
    rx: mpsc::Receiver<Signal>,
}

impl OsSignals {
    /// Installs handlers for every signal in [`Signal::TERMINATION`].
    ///
    /// Must be called from within a tokio runtime, before startup begins.
    ///
    /// # Errors
    /// Returns an error if a handler cannot be registered.
    #[cfg(unix)]
    pub fn install() -> Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        let (tx, rx) = mpsc::channel(1);
        for sig in Signal::TERMINATION {
            let mut stream = signal(SignalKind::from_raw(raw_signal(sig))).map_err(|e| {
                SupervisorError::signal(format!("cannot install {sig} handler: {e}"))
            })?;
            let tx = tx.clone();
            tokio::spawn(async move {
                while stream.recv().await.is_some() {
                    if tx.try_send(sig).is_err() {
                        tracing::debug!(signal = %sig, "signal already pending, dropped");
                    }
                }
            });
        }
        tracing::debug!("termination signal handlers installed");
        Ok(Self { rx })
    }

    /// Installs a Ctrl-C handler.
    ///
    /// # Errors
    /// Never fails on this platform.
    #[cfg(not(unix))]
    pub fn install() -> Result<Self> {
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if tx.try_send(Signal::Int).is_err() {
                    tracing::debug!("signal already pending, dropped");
                }
            }
        });
        Ok(Self { rx })
    }
}

#[cfg(unix)]
fn raw_signal(sig: Signal) -> i32 {
    use nix::sys::signal::Signal as Nix;

    match sig {
        Signal::Hup => Nix::SIGHUP as i32,
        Signal::Int => Nix::SIGINT as i32,
        Signal::Abrt => Nix::SIGABRT as i32,
        Signal::Term => Nix::SIGTERM as i32,
    }
}

#[async_trait]
impl SignalSource for OsSignals {
    async fn wait(&mut self) -> Result<Signal> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| SupervisorError::signal("signal channel closed"))
    }
}
