// Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # berth-test
//!
//! Testing infrastructure for the berth entrypoint.
//!
//! This crate provides:
//! - **Scripted host**: a stateful fake of the control tool, `uname` and
//!   `sysctl`, with fault injection
//! - **Manual signals**: a signal source triggered from the test
//! - **Scenario harness**: runs a [`Supervisor`](berth_core::Supervisor)
//!   against the host and reports phases, commands and the exit code
//!
//! ## Example
//!
//! ```rust,ignore
//! use berth_core::{Signal, StartupConfig};
//! use berth_test::{Scenario, ScriptedHost};
//!
//! let host = ScriptedHost::new("CACHE").with_kernel("4.4.0-21-generic");
//! let report = Scenario::new(StartupConfig::new("CACHE"), host)
//!     .run_until(Signal::Term)
//!     .await?;
//! assert_eq!(report.exit_code(), 0);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod harness;
pub mod host;

pub use error::{Result, TestError};
pub use harness::{ManualSignals, PhaseRecorder, Scenario, ScenarioReport, SignalTrigger};
pub use host::{HostFaults, ScriptedHost};
