//! Primary service controller.
//!
//! Every transition is confirmed through the [`StatusProber`]: `start` must
//! end in [`ServiceState::Running`], `stop` in [`ServiceState::Down`].

use crate::config::{AppLaunch, StartupConfig};
use crate::console::ConsoleLogFollower;
use crate::control::{ControlInterface, ControlOperation};
use crate::error::{Result, SupervisorError};
use crate::status::StatusProber;
use crate::types::{InstallLocation, ServiceState};

/// Starts, stops and runs routines on the primary service.
#[derive(Debug, Clone)]
pub struct PrimaryController {
    control: ControlInterface,
    prober: StatusProber,
}

impl PrimaryController {
    /// Creates a controller on top of `control`.
    #[must_use]
    pub fn new(control: ControlInterface) -> Self {
        let prober = StatusProber::new(control.clone());
        Self { control, prober }
    }

    /// Returns the status prober used to verify transitions.
    #[must_use]
    pub const fn prober(&self) -> &StatusProber {
        &self.prober
    }

    /// Starts the service and waits until it reports `running`.
    ///
    /// The installation directory is resolved first. When console-log
    /// following is enabled the follower is spawned before the start command
    /// so boot messages are captured.
    ///
    /// # Errors
    /// Returns an error if the instance cannot be resolved, the start command
    /// fails, or the service is not running afterwards.
    pub async fn start(&self, config: &StartupConfig) -> Result<InstallLocation> {
        let instance = self.control.instance();
        let location = self.prober.install_location().await?;
        tracing::info!(instance = %instance, install = %location, "resolved installation");

        if config.follow_console_log {
            let path = location.console_log(&config.tools.console_log);
            // Detached; ends with the process.
            drop(ConsoleLogFollower::new(path, config.follow_poll_interval).spawn());
        }

        tracing::info!(
            instance = %instance,
            single_user = config.single_user,
            "starting primary service"
        );
        self.control.start(config.single_user).await?;

        match self.prober.query().await? {
            ServiceState::Running => {
                tracing::info!(instance = %instance, "primary service is up");
                Ok(location)
            }
            actual => {
                if actual == ServiceState::SignOnInhibited {
                    tracing::warn!(
                        instance = %instance,
                        "sign-on inhibited: restart the container with --start false to inspect the instance"
                    );
                }
                Err(SupervisorError::UnexpectedState {
                    operation: ControlOperation::Start,
                    expected: ServiceState::Running,
                    actual,
                })
            }
        }
    }

    /// Runs the configured application routine to completion.
    ///
    /// # Errors
    /// Returns an error if the session command fails.
    pub async fn launch_routine(&self, app: &AppLaunch) -> Result<()> {
        tracing::info!(
            instance = %self.control.instance(),
            namespace = %app.namespace,
            routine = %app.routine,
            "launching application routine"
        );
        self.control.session(&app.namespace, &app.routine).await?;
        tracing::info!(routine = %app.routine, "application is up");
        Ok(())
    }

    /// Stops the service and waits until it reports `down`.
    ///
    /// # Errors
    /// Returns an error if the stop command fails or the service is not down
    /// afterwards.
    pub async fn stop(&self) -> Result<()> {
        let instance = self.control.instance();
        tracing::info!(instance = %instance, "stopping primary service");
        self.control.stop().await?;

        match self.prober.query().await? {
            ServiceState::Down => {
                tracing::info!(instance = %instance, "primary service is down");
                Ok(())
            }
            actual => Err(SupervisorError::UnexpectedState {
                operation: ControlOperation::Stop,
                expected: ServiceState::Down,
                actual,
            }),
        }
    }
}
