// Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! berth: container entrypoint supervisor.
//!
//! Runs as a container's primary process, brings up one managed service and
//! an optional side process, waits for a termination signal and shuts both
//! down in order.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use berth::prelude::*;
//!
//! # async fn run() -> berth::core::Result<()> {
//! let config = StartupConfig::new("CACHE");
//! let signals = OsSignals::install()?;
//! let summary = Supervisor::new(config, Arc::new(SystemRunner::new()))
//!     .run(signals)
//!     .await?;
//! println!("stopped on {}", summary.signal);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub use berth_core as core;

pub mod cli;

/// Prelude module for common imports.
pub mod prelude {
    pub use berth_core::{
        AppLaunch, AuxiliaryCommands, CommandRunner, LifecycleObserver, LifecyclePhase,
        OsSignals, RunSummary, ServiceState, Signal, SignalSource, StartupConfig, Supervisor,
        SupervisorError, SystemRunner, ToolPaths, TracingObserver,
    };
}
