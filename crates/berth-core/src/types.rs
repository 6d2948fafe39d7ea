//! Core types for the entrypoint lifecycle.
//!
//! Explicit state machines, no implicit transitions: the supervisor only ever
//! moves forward through [`LifecyclePhase`].

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Name of the managed service instance as known to the control tool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceRef(String);

impl InstanceRef {
    /// Creates an instance reference.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the instance name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for InstanceRef {
    fn default() -> Self {
        Self::new("CACHE")
    }
}

impl fmt::Display for InstanceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Installation directory of an instance, resolved through `qlist`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallLocation(PathBuf);

impl InstallLocation {
    /// Wraps a resolved installation directory.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Returns the installation directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Path of the console log with the given file name (`<install>/mgr/<name>`).
    #[must_use]
    pub fn console_log(&self, file_name: &str) -> PathBuf {
        self.0.join("mgr").join(file_name)
    }
}

impl fmt::Display for InstallLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// State of the primary service as reported by the control tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceState {
    /// Service is up and accepting work.
    Running,
    /// Service is stopped.
    Down,
    /// Service is up but refuses multi-user sign-on.
    SignOnInhibited,
    /// Status text was not recognised.
    Unknown,
}

impl ServiceState {
    /// Classifies the status text of a `qlist` record.
    ///
    /// Only the leading keyword matters; trailing detail such as
    /// `, since Mon Jun  8 12:00:30 2015` is ignored.
    #[must_use]
    pub fn classify(status: &str) -> Self {
        if status.starts_with("running") {
            Self::Running
        } else if status.starts_with("down") {
            Self::Down
        } else if status.starts_with("sign-on inhibited") {
            Self::SignOnInhibited
        } else {
            Self::Unknown
        }
    }

    /// Returns the state name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Down => "down",
            Self::SignOnInhibited => "sign-on inhibited",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Supervisor lifecycle phase.
///
/// Phases are ordered; the supervisor only ever advances:
/// ```text
/// Init → Tuning → StartingPrimary → StartingApp → StartingAuxiliary → Running
///      → ShuttingDownPrimary → StoppingAuxiliary → Terminated
/// ```
/// Optional phases are skipped, never revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LifecyclePhase {
    /// Configuration captured, nothing touched yet.
    Init,
    /// Adjusting the shared-memory ceiling.
    Tuning,
    /// Starting the primary service.
    StartingPrimary,
    /// Launching the configured application routine.
    StartingApp,
    /// Launching the auxiliary side process.
    StartingAuxiliary,
    /// Everything is up; waiting for a termination signal.
    Running,
    /// Stopping the primary service.
    ShuttingDownPrimary,
    /// Running the auxiliary stop command.
    StoppingAuxiliary,
    /// Shutdown finished.
    Terminated,
}

impl LifecyclePhase {
    /// Returns the phase name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Tuning => "tuning",
            Self::StartingPrimary => "starting-primary",
            Self::StartingApp => "starting-app",
            Self::StartingAuxiliary => "starting-auxiliary",
            Self::Running => "running",
            Self::ShuttingDownPrimary => "shutting-down-primary",
            Self::StoppingAuxiliary => "stopping-auxiliary",
            Self::Terminated => "terminated",
        }
    }

    /// Returns true once the shutdown sequence has begun.
    #[must_use]
    pub const fn is_shutdown(&self) -> bool {
        matches!(
            self,
            Self::ShuttingDownPrimary | Self::StoppingAuxiliary | Self::Terminated
        )
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Termination signals the entrypoint reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
    /// Hangup.
    Hup,
    /// Interrupt (Ctrl+C).
    Int,
    /// Abort.
    Abrt,
    /// Terminate (`docker stop`).
    Term,
}

impl Signal {
    /// Every signal that triggers shutdown.
    pub const TERMINATION: [Self; 4] = [Self::Int, Self::Term, Self::Abrt, Self::Hup];

    /// Returns the Unix signal number.
    #[must_use]
    pub const fn as_i32(&self) -> i32 {
        match self {
            Self::Hup => 1,
            Self::Int => 2,
            Self::Abrt => 6,
            Self::Term => 15,
        }
    }

    /// Returns the conventional signal name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Hup => "SIGHUP",
            Self::Int => "SIGINT",
            Self::Abrt => "SIGABRT",
            Self::Term => "SIGTERM",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of one auxiliary launch attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxiliaryOutcome {
    /// Whether the process was launched.
    pub launched: bool,
    /// Diagnostic text (PID on success, the launch error otherwise).
    pub detail: String,
}

impl AuxiliaryOutcome {
    /// Creates a successful outcome.
    #[must_use]
    pub fn launched(detail: impl Into<String>) -> Self {
        Self {
            launched: true,
            detail: detail.into(),
        }
    }

    /// Creates a failed outcome.
    #[must_use]
    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            launched: false,
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_states() {
        assert_eq!(
            ServiceState::classify("running, since Mon Jun  8 12:00:30 2015"),
            ServiceState::Running
        );
        assert_eq!(
            ServiceState::classify("down, last used Mon Jun  8 16:40:07 2015"),
            ServiceState::Down
        );
        assert_eq!(
            ServiceState::classify("sign-on inhibited, last used Mon Jun  8 11:31:37 2015"),
            ServiceState::SignOnInhibited
        );
    }

    #[test]
    fn test_classify_unknown() {
        assert_eq!(ServiceState::classify(""), ServiceState::Unknown);
        assert_eq!(ServiceState::classify("alive"), ServiceState::Unknown);
        assert_eq!(ServiceState::classify("Running"), ServiceState::Unknown);
    }

    #[test]
    fn test_phase_ordering() {
        let phases = [
            LifecyclePhase::Init,
            LifecyclePhase::Tuning,
            LifecyclePhase::StartingPrimary,
            LifecyclePhase::StartingApp,
            LifecyclePhase::StartingAuxiliary,
            LifecyclePhase::Running,
            LifecyclePhase::ShuttingDownPrimary,
            LifecyclePhase::StoppingAuxiliary,
            LifecyclePhase::Terminated,
        ];
        for pair in phases.windows(2) {
            assert!(pair[0] < pair[1], "{} should precede {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_phase_is_shutdown() {
        assert!(!LifecyclePhase::Running.is_shutdown());
        assert!(!LifecyclePhase::StartingAuxiliary.is_shutdown());
        assert!(LifecyclePhase::ShuttingDownPrimary.is_shutdown());
        assert!(LifecyclePhase::Terminated.is_shutdown());
    }

    #[test]
    fn test_signal_conversion() {
        let numbers: Vec<i32> = Signal::TERMINATION.iter().map(Signal::as_i32).collect();
        assert_eq!(numbers, vec![2, 15, 6, 1]);
        assert_eq!(Signal::Term.to_string(), "SIGTERM");
    }

    #[test]
    fn test_install_location_console_log() {
        let location = InstallLocation::new("/usr/cachesys");
        assert_eq!(
            location.console_log("cconsole.log"),
            PathBuf::from("/usr/cachesys/mgr/cconsole.log")
        );
    }

    #[test]
    fn test_instance_ref_default() {
        assert_eq!(InstanceRef::default().as_str(), "CACHE");
    }

    #[test]
    fn test_auxiliary_outcome_constructors() {
        assert!(AuxiliaryOutcome::launched("pid 42").launched);
        let failed = AuxiliaryOutcome::failed("not found");
        assert!(!failed.launched);
        assert_eq!(failed.detail, "not found");
    }

    #[test]
    fn test_service_state_serialize_roundtrip() {
        for state in [
            ServiceState::Running,
            ServiceState::Down,
            ServiceState::SignOnInhibited,
            ServiceState::Unknown,
        ] {
            let json = serde_json::to_string(&state).unwrap();
            let back: ServiceState = serde_json::from_str(&json).unwrap();
            assert_eq!(state, back);
        }
    }
}
