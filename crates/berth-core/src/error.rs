//! Error types for berth-core.
//!
//! Every fatal condition is a value. Components return it, the binary logs it
//! together with [`SupervisorError::hints`] and exits non-zero.

use crate::control::ControlOperation;
use crate::types::{LifecyclePhase, ServiceState};

/// Result type alias for supervisor operations.
pub type Result<T> = std::result::Result<T, SupervisorError>;

/// Failure categories of the entrypoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid or inconsistent configuration.
    Configuration,
    /// Kernel version query or shared-memory tuning failed.
    Environment,
    /// The control tool failed or the service did not reach its target state.
    ControlInterface,
    /// The auxiliary stop command failed.
    Auxiliary,
    /// Broken supervisor invariant or signal plumbing.
    Internal,
}

/// Comprehensive error type for the entrypoint.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Kernel version could not be determined.
    #[error("cannot determine kernel version: {0}")]
    KernelVersion(String),

    /// Applying `kernel.shmmax` failed.
    #[error("failed to set kernel.shmmax={bytes}: {reason}")]
    Tuning {
        /// Value that was requested, in bytes.
        bytes: u64,
        /// Why the privileged command failed.
        reason: String,
    },

    /// The control tool returned an empty status record.
    #[error("empty status record from '{invocation}'")]
    EmptyStatusRecord {
        /// The query command line.
        invocation: String,
    },

    /// The status record did not have the expected number of fields.
    #[error("malformed status record: expected at least {expected} '^'-separated fields, found {found} in {record:?}")]
    MalformedStatusRecord {
        /// Minimum number of fields required.
        expected: usize,
        /// Number of fields present.
        found: usize,
        /// The raw record.
        record: String,
    },

    /// A control-tool invocation could not be run or exited non-zero.
    #[error("{operation} failed: '{invocation}': {reason}")]
    Command {
        /// The control operation that failed.
        operation: ControlOperation,
        /// The command line.
        invocation: String,
        /// Exit status and captured output.
        reason: String,
    },

    /// The service did not reach the expected state after a transition.
    #[error("{operation} did not reach '{expected}', service reports '{actual}'")]
    UnexpectedState {
        /// The transition being verified.
        operation: ControlOperation,
        /// State required for success.
        expected: ServiceState,
        /// State reported by the control tool.
        actual: ServiceState,
    },

    /// The auxiliary stop command failed.
    #[error("auxiliary stop command '{command}' failed: {reason}")]
    AuxiliaryStop {
        /// The stop command line.
        command: String,
        /// Exit status and captured output.
        reason: String,
    },

    /// Signal handling could not be set up.
    #[error("signal error: {0}")]
    Signal(String),

    /// The supervisor attempted a backward phase transition.
    #[error("invalid phase transition: {from} -> {to}")]
    InvalidTransition {
        /// Current phase.
        from: LifecyclePhase,
        /// Rejected phase.
        to: LifecyclePhase,
    },
}

impl SupervisorError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a kernel version error.
    #[must_use]
    pub fn kernel_version(msg: impl Into<String>) -> Self {
        Self::KernelVersion(msg.into())
    }

    /// Creates a signal error.
    #[must_use]
    pub fn signal(msg: impl Into<String>) -> Self {
        Self::Signal(msg.into())
    }

    /// Returns the failure category.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::KernelVersion(_) | Self::Tuning { .. } => ErrorKind::Environment,
            Self::EmptyStatusRecord { .. }
            | Self::MalformedStatusRecord { .. }
            | Self::Command { .. }
            | Self::UnexpectedState { .. } => ErrorKind::ControlInterface,
            Self::AuxiliaryStop { .. } => ErrorKind::Auxiliary,
            Self::Signal(_) | Self::InvalidTransition { .. } => ErrorKind::Internal,
        }
    }

    /// Probable causes to show the operator before exiting.
    #[must_use]
    pub fn hints(&self) -> &'static [&'static str] {
        match self {
            Self::KernelVersion(_) => &[
                "insufficient privileges to run the version query command",
                "version query command missing from the container image",
            ],
            Self::Tuning { .. } => &[
                "insufficient privileges to run sysctl on a pre-3.16 kernel",
                "container started without --privileged (needed to set shared memory)",
            ],
            Self::Command {
                operation: ControlOperation::Start,
                ..
            } => &[
                "the service was not installed successfully",
                "wrong instance name",
                "missing privileges to start/stop the service; process not in the service group",
            ],
            Self::Command {
                operation: ControlOperation::Stop,
                ..
            } => &[
                "wrong instance name",
                "service up in single-user mode (there was trouble at startup)",
            ],
            Self::Command {
                operation: ControlOperation::Session,
                ..
            } => &[
                "routine or namespace does not exist",
                "the routine returned an error",
            ],
            Self::Command {
                operation: ControlOperation::Query,
                ..
            }
            | Self::EmptyStatusRecord { .. }
            | Self::MalformedStatusRecord { .. } => &[
                "wrong instance name",
                "control tool missing from PATH",
            ],
            Self::UnexpectedState {
                actual: ServiceState::SignOnInhibited,
                ..
            } => &[
                "something prevents multi-user startup; restart the container with --start false to fix it",
            ],
            Self::AuxiliaryStop { .. } => &[
                "stop command missing or not executable",
                "auxiliary service already stopped",
            ],
            _ => &[],
        }
    }
}
