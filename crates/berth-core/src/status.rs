//! Status prober.
//!
//! `qlist` prints one caret-delimited record per instance:
//!
//! ```text
//! C151^/usr/cachesys^2015.1.0.429.0^running, since Mon Jun  8 12:00:30 2015^cache.cpf^1972^57772^62972^warn^
//! CACHE142^/Users/CACHE142^2014.2.0.177.0^sign-on inhibited, last used Mon Jun  8 11:31:37 2015^cache.cpf^1972^57772^62972^
//! C151^/usr/cachesys^2015.1.0.429.0^down, last used Mon Jun  8 16:40:07 2015^cache.cpf^1972^57772^62972^^
//! ```
//!
//! Field 2 is the installation directory, field 4 up to the first comma is
//! the status keyword.

use crate::control::ControlInterface;
use crate::error::{Result, SupervisorError};
use crate::types::{InstallLocation, ServiceState};

/// Fields up to and including the status field.
const REQUIRED_FIELDS: usize = 4;

/// Parsed `qlist` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    /// Instance name (field 1).
    pub name: String,
    /// Installation directory (field 2).
    pub install_path: String,
    /// Product version (field 3).
    pub version: String,
    /// Status keyword (field 4 before the first comma).
    pub status: String,
    /// Status detail (field 4 after the first comma).
    pub detail: Option<String>,
}

impl StatusRecord {
    /// Parses one `qlist` record.
    ///
    /// Only the first line is considered; trailing fields are ignored.
    ///
    /// # Errors
    /// Returns [`SupervisorError::MalformedStatusRecord`] if fewer than four
    /// fields are present.
    pub fn parse(record: &str) -> Result<Self> {
        let line = record.lines().next().unwrap_or_default();
        let fields: Vec<&str> = line.splitn(REQUIRED_FIELDS + 1, '^').collect();
        if fields.len() < REQUIRED_FIELDS {
            return Err(SupervisorError::MalformedStatusRecord {
                expected: REQUIRED_FIELDS,
                found: fields.len(),
                record: record.to_string(),
            });
        }

        let (status, detail) = match fields[3].split_once(',') {
            Some((status, detail)) => (status, Some(detail.trim().to_string())),
            None => (fields[3], None),
        };

        Ok(Self {
            name: fields[0].to_string(),
            install_path: fields[1].to_string(),
            version: fields[2].to_string(),
            status: status.trim().to_string(),
            detail,
        })
    }

    /// Classifies the status keyword.
    #[must_use]
    pub fn state(&self) -> ServiceState {
        ServiceState::classify(&self.status)
    }

    /// Installation directory of the instance.
    #[must_use]
    pub fn install_location(&self) -> InstallLocation {
        InstallLocation::new(&self.install_path)
    }
}

/// Queries and classifies the primary service's state.
#[derive(Debug, Clone)]
pub struct StatusProber {
    control: ControlInterface,
}

impl StatusProber {
    /// Creates a prober using `control`.
    #[must_use]
    pub const fn new(control: ControlInterface) -> Self {
        Self { control }
    }

    /// Runs `qlist` and parses its record.
    ///
    /// # Errors
    /// Returns an error if the query fails or the record is empty or malformed.
    pub async fn record(&self) -> Result<StatusRecord> {
        let raw = self.control.qlist().await?;
        if raw.trim().is_empty() {
            return Err(SupervisorError::EmptyStatusRecord {
                invocation: self.control.qlist_invocation().to_string(),
            });
        }
        StatusRecord::parse(&raw)
    }

    /// Current state of the service.
    ///
    /// Unrecognised status text yields [`ServiceState::Unknown`]; the caller
    /// decides whether that is acceptable.
    ///
    /// # Errors
    /// Returns an error if the query fails or the record is empty or malformed.
    pub async fn query(&self) -> Result<ServiceState> {
        let record = self.record().await?;
        let state = record.state();
        if state == ServiceState::Unknown {
            tracing::warn!(
                instance = %self.control.instance(),
                status = %record.status,
                record = ?record,
                "unrecognised service status"
            );
        } else {
            tracing::debug!(instance = %self.control.instance(), state = %state, "service status");
        }
        Ok(state)
    }

    /// Resolves the instance's installation directory.
    ///
    /// # Errors
    /// Returns an error if the query fails or the record is empty or malformed.
    pub async fn install_location(&self) -> Result<InstallLocation> {
        Ok(self.record().await?.install_location())
    }
}
