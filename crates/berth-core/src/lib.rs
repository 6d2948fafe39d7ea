// Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # berth-core
//!
//! Lifecycle supervisor for the berth container entrypoint.
//!
//! berth runs as a container's primary process. It tunes the shared-memory
//! ceiling when the host kernel needs it, starts one primary service through
//! that service's external control tool, optionally launches an application
//! routine and an auxiliary side process, then blocks until a termination
//! signal arrives and tears everything down in order.
//!
//! - [`EnvironmentTuner`] adjusts `kernel.shmmax` on pre-3.16 kernels
//! - [`StatusProber`] classifies the control tool's `qlist` record
//! - [`PrimaryController`] starts, stops and launches routines on the service
//! - [`AuxiliaryManager`] launches and stops the side process
//! - [`Supervisor`] sequences the [`LifecyclePhase`]s
//!
//! Every fatal condition is returned as a [`SupervisorError`]; only the binary
//! decides to exit.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use berth_core::{OsSignals, StartupConfig, Supervisor, SystemRunner};
//!
//! let config = StartupConfig::new("CACHE");
//! let signals = OsSignals::install()?;
//! let summary = Supervisor::new(config, Arc::new(SystemRunner::new()))
//!     .run(signals)
//!     .await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod auxiliary;
pub mod command;
pub mod config;
pub mod console;
pub mod control;
pub mod error;
pub mod observer;
pub mod platform;
pub mod primary;
pub mod signal;
pub mod status;
pub mod supervisor;
#[cfg(test)]
pub mod tests;
pub mod tuner;
pub mod types;

pub use auxiliary::{AuxiliaryLaunch, AuxiliaryManager};
pub use command::{CommandOutput, CommandRunner, Invocation, LaunchedProcess, SystemRunner};
pub use config::{AppLaunch, AuxiliaryCommands, StartupConfig, ToolPaths};
pub use console::{ConsoleLogFollower, LogTail};
pub use control::{ControlInterface, ControlOperation};
pub use error::{ErrorKind, Result, SupervisorError};
pub use observer::{LifecycleObserver, TracingObserver};
pub use platform::{OsFamily, detect_os_family};
pub use primary::PrimaryController;
pub use signal::{OsSignals, SignalSource};
pub use status::{StatusProber, StatusRecord};
pub use supervisor::{RunSummary, Supervisor};
pub use tuner::{EnvironmentTuner, KernelVersion, TuneOutcome};
pub use types::{
    AuxiliaryOutcome, InstallLocation, InstanceRef, LifecyclePhase, ServiceState, Signal,
};
