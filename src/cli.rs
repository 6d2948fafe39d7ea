//! Command-line interface.
//!
//! Flags given on the command line override values loaded from `--config`.

use std::path::PathBuf;

use berth_core::{InstanceRef, Result, StartupConfig};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// Container entrypoint for a single managed service.
#[derive(Debug, Parser)]
#[command(name = "berth", version, about = "Container entrypoint supervisor")]
pub struct Args {
    /// Instance name to start and stop [default: CACHE]
    #[arg(short = 'i', long = "instance")]
    pub instance: Option<String>,

    /// Namespace of the application routine
    #[arg(short = 'n', long = "namespace")]
    pub namespace: Option<String>,

    /// Application routine to launch once the service is up
    #[arg(short = 'r', long = "routine")]
    pub routine: Option<String>,

    /// Stop the service on shutdown; false suits throw-away containers [default: true]
    #[arg(long = "stop", value_name = "BOOL")]
    pub stop: Option<bool>,

    /// Start the service and tune shared memory; false brings the container up untouched [default: true]
    #[arg(long = "start", value_name = "BOOL")]
    pub start: Option<bool>,

    /// Start in single-user (maintenance) mode
    #[arg(long = "single-user")]
    pub single_user: bool,

    /// Shared-memory segment target in MB [default: 512]
    #[arg(long = "shmem", value_name = "MB")]
    pub shmem: Option<u64>,

    /// Stream the service's console log to stdout
    #[arg(long = "console-log")]
    pub console_log: bool,

    /// Command launched in the background once the service is up (sshd, ...)
    #[arg(long = "aux-start", value_name = "CMD")]
    pub aux_start: Option<String>,

    /// Command run after the service is down
    #[arg(long = "aux-stop", value_name = "CMD")]
    pub aux_stop: Option<String>,

    /// TOML configuration file
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Path of the service control tool [default: ccontrol]
    #[arg(long = "control-tool", value_name = "PATH")]
    pub control_tool: Option<PathBuf>,

    /// Log at debug level
    #[arg(long = "debug")]
    pub debug: bool,
}

impl Args {
    /// Builds the startup configuration.
    ///
    /// # Errors
    /// Returns an error if the config file cannot be loaded or only one of
    /// namespace and routine is given.
    pub fn into_config(self) -> Result<StartupConfig> {
        let mut config = match &self.config {
            Some(path) => StartupConfig::load(path)?,
            None => StartupConfig::default(),
        };

        if let Some(instance) = self.instance {
            config.instance = InstanceRef::new(instance);
        }
        if self.namespace.is_some() || self.routine.is_some() {
            config.set_app(self.namespace, self.routine)?;
        }
        if let Some(stop) = self.stop {
            config.stop_enabled = stop;
        }
        if let Some(start) = self.start {
            config.start_enabled = start;
        }
        if self.single_user {
            config.single_user = true;
        }
        if let Some(shmem) = self.shmem {
            config.shmem_mb = shmem;
        }
        if self.console_log {
            config.follow_console_log = true;
        }
        if self.aux_start.is_some() {
            config.auxiliary.start = self.aux_start;
        }
        if self.aux_stop.is_some() {
            config.auxiliary.stop = self.aux_stop;
        }
        if let Some(tool) = self.control_tool {
            config.tools.control = tool;
        }

        config.validate()?;
        Ok(config)
    }

    /// Builds the log filter from the `RUST_LOG` value, if any.
    ///
    /// A non-empty, parseable `RUST_LOG` wins; otherwise the level is DEBUG
    /// with `--debug` and INFO without.
    #[must_use]
    pub fn log_filter(&self, rust_log: Option<&str>) -> EnvFilter {
        rust_log
            .filter(|directives| !directives.trim().is_empty())
            .and_then(|directives| EnvFilter::try_new(directives).ok())
            .unwrap_or_else(|| {
                let level = if self.debug {
                    LevelFilter::DEBUG
                } else {
                    LevelFilter::INFO
                };
                EnvFilter::default().add_directive(level.into())
            })
    }
}
