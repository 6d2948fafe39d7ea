//! Startup configuration.
//!
//! Captured once at process start and read-only afterwards. Validated at load
//! time so a bad combination fails before anything is touched.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::command::Invocation;
use crate::error::{Result, SupervisorError};
use crate::types::InstanceRef;

/// Everything the supervisor needs to know about one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupConfig {
    /// Managed service instance.
    #[serde(default)]
    pub instance: InstanceRef,

    /// Start the service in single-user (maintenance) mode.
    #[serde(default)]
    pub single_user: bool,

    /// Start the service and tune shared memory.
    #[serde(default = "default_true")]
    pub start_enabled: bool,

    /// Stop the service on shutdown.
    #[serde(default = "default_true")]
    pub stop_enabled: bool,

    /// Shared-memory segment target in MB.
    #[serde(default = "default_shmem_mb")]
    pub shmem_mb: u64,

    /// Stream the service's console log to stdout.
    #[serde(default)]
    pub follow_console_log: bool,

    /// Poll interval of the console-log follower.
    #[serde(default = "default_follow_poll_interval")]
    #[serde(with = "humantime_serde")]
    pub follow_poll_interval: Duration,

    /// Application routine to launch after the service is up.
    #[serde(default)]
    pub app: Option<AppLaunch>,

    /// Auxiliary side-process commands.
    #[serde(default)]
    pub auxiliary: AuxiliaryCommands,

    /// External tool names and paths.
    #[serde(default)]
    pub tools: ToolPaths,
}

fn default_true() -> bool {
    true
}

fn default_shmem_mb() -> u64 {
    512
}

fn default_follow_poll_interval() -> Duration {
    Duration::from_millis(250)
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self::new(InstanceRef::default().as_str())
    }
}

impl StartupConfig {
    /// Creates a configuration for `instance` with default settings.
    #[must_use]
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: InstanceRef::new(instance),
            app: None,
            single_user: false,
            start_enabled: true,
            stop_enabled: true,
            shmem_mb: default_shmem_mb(),
            follow_console_log: false,
            follow_poll_interval: default_follow_poll_interval(),
            auxiliary: AuxiliaryCommands::default(),
            tools: ToolPaths::default(),
        }
    }

    /// Sets the application routine from separately supplied parts.
    ///
    /// Both parts or neither must be present; an empty string counts as absent.
    ///
    /// # Errors
    /// Returns an error if only one of `namespace` and `routine` is given.
    pub fn set_app(&mut self, namespace: Option<String>, routine: Option<String>) -> Result<()> {
        let namespace = namespace.filter(|s| !s.is_empty());
        let routine = routine.filter(|s| !s.is_empty());
        self.app = match (namespace, routine) {
            (Some(namespace), Some(routine)) => Some(AppLaunch { namespace, routine }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(SupervisorError::config(
                    "namespace given without a routine; both or neither are required",
                ));
            }
            (None, Some(_)) => {
                return Err(SupervisorError::config(
                    "routine given without a namespace; both or neither are required",
                ));
            }
        };
        Ok(())
    }

    /// Returns true if the primary service is stopped on shutdown.
    ///
    /// A run that never started the service has nothing to stop.
    #[must_use]
    pub const fn stops_primary(&self) -> bool {
        self.start_enabled && self.stop_enabled
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        let name = self.instance.as_str();
        if name.is_empty() {
            return Err(SupervisorError::config("instance name cannot be empty"));
        }
        if name.chars().any(|c| c.is_whitespace() || c == '^') {
            return Err(SupervisorError::config(
                "instance name must not contain whitespace or '^'",
            ));
        }

        if self.shmem_mb == 0 {
            return Err(SupervisorError::config("shmem_mb must be greater than 0"));
        }

        if let Some(app) = &self.app {
            app.validate()?;
        }

        self.auxiliary.validate()?;
        self.tools.validate()?;

        if self.follow_poll_interval.is_zero() {
            return Err(SupervisorError::config(
                "follow_poll_interval must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| SupervisorError::config(format!("failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| SupervisorError::config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}

/// Namespace and routine launched through the control tool's session command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppLaunch {
    /// Namespace to run in.
    pub namespace: String,
    /// Routine or entry point.
    pub routine: String,
}

impl AppLaunch {
    /// Creates an application launch target.
    #[must_use]
    pub fn new(namespace: impl Into<String>, routine: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            routine: routine.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.namespace.trim().is_empty() || self.routine.trim().is_empty() {
            return Err(SupervisorError::config(
                "app namespace and routine cannot be empty",
            ));
        }
        Ok(())
    }
}

/// Commands that start and stop the auxiliary side process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxiliaryCommands {
    /// Launched in the background after the primary service is up.
    #[serde(default)]
    pub start: Option<String>,
    /// Run to completion after the primary service is down.
    #[serde(default)]
    pub stop: Option<String>,
}

impl AuxiliaryCommands {
    /// Parsed start command, if configured.
    #[must_use]
    pub fn start_invocation(&self) -> Option<Invocation> {
        self.start.as_deref().and_then(Invocation::parse)
    }

    /// Parsed stop command, if configured.
    #[must_use]
    pub fn stop_invocation(&self) -> Option<Invocation> {
        self.stop.as_deref().and_then(Invocation::parse)
    }

    fn validate(&self) -> Result<()> {
        for (label, cmd) in [("start", &self.start), ("stop", &self.stop)] {
            if cmd.as_deref().is_some_and(|c| c.trim().is_empty()) {
                return Err(SupervisorError::config(format!(
                    "auxiliary {label} command cannot be blank"
                )));
            }
        }
        Ok(())
    }
}

/// External tools used by the supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPaths {
    /// Control tool of the primary service.
    #[serde(default = "default_control")]
    pub control: PathBuf,
    /// Command printing the kernel release (`<tool> -r`).
    #[serde(default = "default_version_query")]
    pub version_query: PathBuf,
    /// Privileged kernel-parameter command (`<tool> -w key=value`).
    #[serde(default = "default_sysctl")]
    pub sysctl: PathBuf,
    /// Console log file name under `<install>/mgr/`.
    #[serde(default = "default_console_log")]
    pub console_log: String,
}

fn default_control() -> PathBuf {
    PathBuf::from("ccontrol")
}

fn default_version_query() -> PathBuf {
    PathBuf::from("uname")
}

fn default_sysctl() -> PathBuf {
    PathBuf::from("sysctl")
}

fn default_console_log() -> String {
    "cconsole.log".to_string()
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            control: default_control(),
            version_query: default_version_query(),
            sysctl: default_sysctl(),
            console_log: default_console_log(),
        }
    }
}

impl ToolPaths {
    fn validate(&self) -> Result<()> {
        for (label, path) in [
            ("control", &self.control),
            ("version_query", &self.version_query),
            ("sysctl", &self.sysctl),
        ] {
            if path.as_os_str().is_empty() {
                return Err(SupervisorError::config(format!(
                    "tools.{label} cannot be empty"
                )));
            }
        }
        if self.console_log.is_empty() || self.console_log.contains('/') {
            return Err(SupervisorError::config(
                "tools.console_log must be a plain file name",
            ));
        }
        Ok(())
    }
}

/// Serde helper for humantime durations.
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serializes a duration as a human-readable string.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    /// Deserializes a duration from a human-readable string.
    ///
    /// # Errors
    /// Returns an error if the string cannot be parsed.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
