//! Auxiliary side process (sshd, a web server, ...).
//!
//! Launching happens on a background task that hands exactly one
//! [`AuxiliaryOutcome`] back over a oneshot channel and then reaps the child.
//! Launch failures are reported, not raised; a failed stop is fatal.

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::command::{CommandRunner, Invocation};
use crate::error::{Result, SupervisorError};
use crate::types::AuxiliaryOutcome;

/// Pending result of an auxiliary launch.
#[derive(Debug)]
pub struct AuxiliaryLaunch {
    command: String,
    outcome: oneshot::Receiver<AuxiliaryOutcome>,
}

impl AuxiliaryLaunch {
    /// The launched command line.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Waits for the launch outcome.
    ///
    /// Consumes the handle, so the outcome is read exactly once.
    pub async fn outcome(self) -> AuxiliaryOutcome {
        self.outcome.await.unwrap_or_else(|_| {
            AuxiliaryOutcome::failed(format!(
                "'{}': launcher ended without reporting",
                self.command
            ))
        })
    }
}

/// Starts and stops the auxiliary process.
#[derive(Clone)]
pub struct AuxiliaryManager {
    runner: Arc<dyn CommandRunner>,
}

impl std::fmt::Debug for AuxiliaryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuxiliaryManager").finish_non_exhaustive()
    }
}

impl AuxiliaryManager {
    /// Creates a manager using `runner`.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Launches `invocation` in the background without waiting for it.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(&self, invocation: Invocation) -> AuxiliaryLaunch {
        let (tx, rx) = oneshot::channel();
        let runner = Arc::clone(&self.runner);
        let command = invocation.to_string();

        tokio::spawn(async move {
            match runner.launch(&invocation).await {
                Ok(process) => {
                    let detail = match process.pid() {
                        Some(pid) => format!("'{invocation}' running as pid {pid}"),
                        None => format!("'{invocation}' launched"),
                    };
                    // The receiver may already be gone; the process still gets reaped.
                    let _ = tx.send(AuxiliaryOutcome::launched(detail));
                    let pid = process.pid();
                    if let Some(code) = process.wait().await {
                        tracing::info!(
                            command = %invocation,
                            pid = ?pid,
                            code,
                            "auxiliary process exited"
                        );
                    }
                }
                Err(e) => {
                    let _ = tx.send(AuxiliaryOutcome::failed(format!("'{invocation}': {e}")));
                }
            }
        });

        AuxiliaryLaunch {
            command,
            outcome: rx,
        }
    }

    /// Runs the stop command to completion.
    ///
    /// # Errors
    /// Returns [`SupervisorError::AuxiliaryStop`] if the command cannot run or
    /// exits non-zero.
    pub async fn stop(&self, invocation: &Invocation) -> Result<()> {
        tracing::info!(command = %invocation, "stopping auxiliary service");
        let output = self
            .runner
            .output(invocation)
            .await
            .map_err(|e| SupervisorError::AuxiliaryStop {
                command: invocation.to_string(),
                reason: e.to_string(),
            })?;
        if !output.is_success() {
            return Err(SupervisorError::AuxiliaryStop {
                command: invocation.to_string(),
                reason: output.describe(),
            });
        }
        tracing::info!(command = %invocation, "auxiliary service down");
        Ok(())
    }
}
