//! Signal-driven supervisor.
//!
//! Sequences the lifecycle:
//!
//! ```text
//! Init → Tuning → StartingPrimary → StartingApp? → StartingAuxiliary? → Running
//!      → ShuttingDownPrimary? → StoppingAuxiliary? → Terminated
//! ```
//!
//! Every phase is a hard gate. A failure returns immediately and skips all
//! later phases, shutdown included.

use std::sync::Arc;

use crate::auxiliary::AuxiliaryManager;
use crate::command::CommandRunner;
use crate::config::StartupConfig;
use crate::control::ControlInterface;
use crate::error::{Result, SupervisorError};
use crate::observer::{LifecycleObserver, TracingObserver};
use crate::platform::OsFamily;
use crate::primary::PrimaryController;
use crate::signal::SignalSource;
use crate::tuner::{EnvironmentTuner, TuneOutcome};
use crate::types::{AuxiliaryOutcome, InstallLocation, LifecyclePhase, Signal};

/// What a completed run did.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Signal that triggered shutdown.
    pub signal: Signal,
    /// Tuning result, `None` when startup was disabled.
    pub tuning: Option<TuneOutcome>,
    /// Resolved installation, `None` when startup was disabled.
    pub install_location: Option<InstallLocation>,
    /// Whether the application routine ran.
    pub app_launched: bool,
    /// Auxiliary launch outcome, `None` when no start command was configured.
    pub auxiliary: Option<AuxiliaryOutcome>,
    /// Whether the primary service was stopped.
    pub primary_stopped: bool,
    /// Whether the auxiliary stop command ran.
    pub auxiliary_stopped: bool,
}

/// Top-level lifecycle orchestrator.
pub struct Supervisor {
    config: StartupConfig,
    runner: Arc<dyn CommandRunner>,
    observer: Arc<dyn LifecycleObserver>,
    os: Option<OsFamily>,
    phase: LifecyclePhase,
}

impl Supervisor {
    /// Creates a supervisor for `config` running commands through `runner`.
    #[must_use]
    pub fn new(config: StartupConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            config,
            runner,
            observer: Arc::new(TracingObserver),
            os: None,
            phase: LifecyclePhase::Init,
        }
    }

    /// Replaces the default [`TracingObserver`].
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Overrides OS family detection for the tuner.
    #[must_use]
    pub const fn with_os_family(mut self, os: OsFamily) -> Self {
        self.os = Some(os);
        self
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &StartupConfig {
        &self.config
    }

    /// Moves to `to`, which must come after the current phase.
    ///
    /// # Errors
    /// Returns [`SupervisorError::InvalidTransition`] for a backward or
    /// repeated transition.
    pub fn advance(&mut self, to: LifecyclePhase) -> Result<()> {
        if to <= self.phase {
            return Err(SupervisorError::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        if to.is_shutdown() && !self.phase.is_shutdown() {
            tracing::info!(from = %self.phase, to = %to, "shutting down");
        }
        self.observer.phase_changed(self.phase, to);
        self.phase = to;
        Ok(())
    }

    /// Runs the full lifecycle, blocking on `signals` once everything is up.
    ///
    /// # Errors
    /// Returns the first fatal error; later phases are not attempted.
    pub async fn run<S>(mut self, mut signals: S) -> Result<RunSummary>
    where
        S: SignalSource,
    {
        self.config.validate()?;
        let config = self.config.clone();
        tracing::debug!(config = ?config, "starting lifecycle");

        let control = ControlInterface::new(
            Arc::clone(&self.runner),
            config.tools.control.clone(),
            config.instance.clone(),
        );
        let primary = PrimaryController::new(control);
        let auxiliary = AuxiliaryManager::new(Arc::clone(&self.runner));

        let mut tuning = None;
        let mut install_location = None;
        let mut app_launched = false;

        if config.start_enabled {
            self.advance(LifecyclePhase::Tuning)?;
            let mut tuner = EnvironmentTuner::new(Arc::clone(&self.runner), &config.tools);
            if let Some(os) = self.os {
                tuner = tuner.with_os_family(os);
            }
            let outcome = tuner.tune(config.shmem_mb).await?;
            self.observer.tuned(&outcome);
            tuning = Some(outcome);

            self.advance(LifecyclePhase::StartingPrimary)?;
            install_location = Some(primary.start(&config).await?);

            if let Some(app) = &config.app {
                self.advance(LifecyclePhase::StartingApp)?;
                primary.launch_routine(app).await?;
                app_launched = true;
            }
        } else {
            tracing::info!(
                instance = %config.instance,
                "startup disabled; primary service and shared memory left untouched"
            );
        }

        let mut auxiliary_outcome = None;
        if let Some(invocation) = config.auxiliary.start_invocation() {
            self.advance(LifecyclePhase::StartingAuxiliary)?;
            let outcome = auxiliary.start(invocation).outcome().await;
            self.observer.auxiliary_outcome(&outcome);
            auxiliary_outcome = Some(outcome);
        }

        self.advance(LifecyclePhase::Running)?;
        tracing::info!(instance = %config.instance, "up; waiting for a termination signal");
        let signal = signals.wait().await?;
        self.observer.signal_received(signal);

        let mut primary_stopped = false;
        if config.stops_primary() {
            self.advance(LifecyclePhase::ShuttingDownPrimary)?;
            primary.stop().await?;
            primary_stopped = true;
        }

        let mut auxiliary_stopped = false;
        if let Some(invocation) = config.auxiliary.stop_invocation() {
            self.advance(LifecyclePhase::StoppingAuxiliary)?;
            auxiliary.stop(&invocation).await?;
            auxiliary_stopped = true;
        }

        self.advance(LifecyclePhase::Terminated)?;
        tracing::info!(signal = %signal, "shutdown complete");

        Ok(RunSummary {
            signal,
            tuning,
            install_location,
            app_launched,
            auxiliary: auxiliary_outcome,
            primary_stopped,
            auxiliary_stopped,
        })
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("config", &self.config)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::mocks::MockRunner;

    #[test]
    fn test_advance_is_strictly_forward() {
        let mut sup = Supervisor::new(StartupConfig::default(), Arc::new(MockRunner::new()));
        assert_eq!(sup.phase(), LifecyclePhase::Init);

        sup.advance(LifecyclePhase::Tuning).unwrap();
        sup.advance(LifecyclePhase::Running).unwrap();
        assert_eq!(sup.phase(), LifecyclePhase::Running);

        let err = sup.advance(LifecyclePhase::Tuning).unwrap_err();
        assert!(matches!(
            err,
            SupervisorError::InvalidTransition {
                from: LifecyclePhase::Running,
                to: LifecyclePhase::Tuning,
            }
        ));
        assert!(sup.advance(LifecyclePhase::Running).is_err());
        assert_eq!(sup.phase(), LifecyclePhase::Running);
    }

    #[test]
    fn test_no_startup_phase_after_shutdown_began() {
        let mut sup = Supervisor::new(StartupConfig::default(), Arc::new(MockRunner::new()));
        sup.advance(LifecyclePhase::Running).unwrap();
        assert!(!sup.phase().is_shutdown());

        sup.advance(LifecyclePhase::StoppingAuxiliary).unwrap();
        assert!(sup.phase().is_shutdown());
        assert!(sup.advance(LifecyclePhase::ShuttingDownPrimary).is_err());
        assert!(sup.advance(LifecyclePhase::StartingAuxiliary).is_err());
        sup.advance(LifecyclePhase::Terminated).unwrap();
    }
}
