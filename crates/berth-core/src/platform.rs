//! Platform detection.
//!
//! Only the OS family matters to the entrypoint: it decides whether the
//! shared-memory ceiling may need tuning.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Operating system family the entrypoint runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OsFamily {
    /// Linux kernel.
    Linux,
    /// FreeBSD, OpenBSD, NetBSD, DragonFly.
    Bsd,
    /// macOS.
    MacOS,
    /// Windows.
    Windows,
    /// Anything else.
    Other,
}

impl OsFamily {
    /// Maps a `std::env::consts::OS` value to a family.
    #[must_use]
    pub fn from_os_name(os: &str) -> Self {
        match os {
            "linux" | "android" => Self::Linux,
            "freebsd" | "openbsd" | "netbsd" | "dragonfly" => Self::Bsd,
            "macos" => Self::MacOS,
            "windows" => Self::Windows,
            _ => Self::Other,
        }
    }

    /// Returns true if the family may carry the pre-3.16 `shmmax` default.
    #[must_use]
    pub const fn has_tunable_shmmax(&self) -> bool {
        matches!(self, Self::Linux | Self::Bsd)
    }

    /// Returns the family name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Bsd => "bsd",
            Self::MacOS => "macos",
            Self::Windows => "windows",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Detects the OS family of the running process.
#[must_use]
pub fn detect_os_family() -> OsFamily {
    OsFamily::from_os_name(std::env::consts::OS)
}
