//! Environment tuner.
//!
//! Kernels before 3.16 ship a 32 MB default for `kernel.shmmax`, far too small
//! for the primary service. On those kernels the tuner raises the ceiling via
//! `sysctl -w kernel.shmmax=<bytes>`; newer kernels and other platforms are
//! left alone.

use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::command::{CommandRunner, Invocation};
use crate::config::ToolPaths;
use crate::error::{Result, SupervisorError};
use crate::platform::{OsFamily, detect_os_family};

/// First kernel with a usable default shared-memory ceiling.
pub const LARGE_SHM_KERNEL: KernelVersion = KernelVersion::new(3, 16);

/// Total shared memory (`shmall`) on a stock pre-3.16 kernel, in MB.
///
/// A single segment cannot be larger than this.
pub const PRE_316_SHMALL_MB: u64 = 8192;

/// `major.minor` kernel release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelVersion {
    /// Major version.
    pub major: u32,
    /// Minor version.
    pub minor: u32,
}

impl KernelVersion {
    /// Creates a kernel version.
    #[must_use]
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parses a release string such as `3.10.0-123.20.1.el7.x86_64`.
    ///
    /// Only the first two dot-separated components are read; anything after
    /// the minor number's digits is ignored.
    ///
    /// # Errors
    /// Returns an error if the major or minor component is not numeric.
    pub fn parse(release: &str) -> Result<Self> {
        let release = release.trim();
        let mut parts = release.split('.');
        let major = parts
            .next()
            .and_then(|p| p.parse::<u32>().ok())
            .ok_or_else(|| {
                SupervisorError::kernel_version(format!("no major version in {release:?}"))
            })?;
        let minor = parts
            .next()
            .map(|p| {
                p.chars()
                    .take_while(char::is_ascii_digit)
                    .collect::<String>()
            })
            .and_then(|digits| digits.parse::<u32>().ok())
            .ok_or_else(|| {
                SupervisorError::kernel_version(format!("no minor version in {release:?}"))
            })?;
        Ok(Self { major, minor })
    }

    /// The version as a `major.minor` decimal, e.g. `3.16` or `3.8`.
    ///
    /// For display only: as decimals `3.8 > 3.16`, so ordering uses the
    /// components.
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        format!("{}.{}", self.major, self.minor)
            .parse()
            .unwrap_or(f64::NAN)
    }

    /// Returns true if the default `shmmax` is too small on this kernel.
    #[must_use]
    pub fn needs_shm_tuning(&self) -> bool {
        *self < LARGE_SHM_KERNEL
    }
}

impl PartialOrd for KernelVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KernelVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor).cmp(&(other.major, other.minor))
    }
}

impl fmt::Display for KernelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Clamps a segment request to what a pre-3.16 kernel can grant.
#[must_use]
pub fn clamp_pre_316_mb(target_mb: u64) -> u64 {
    target_mb.min(PRE_316_SHMALL_MB)
}

/// Converts MB to bytes.
#[must_use]
pub const fn mb_to_bytes(mb: u64) -> u64 {
    mb.saturating_mul(1024 * 1024)
}

/// What [`EnvironmentTuner::tune`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuneOutcome {
    /// The platform has no tunable `shmmax`.
    UnsupportedPlatform(OsFamily),
    /// The kernel's default ceiling is already large enough.
    NotNeeded(KernelVersion),
    /// `kernel.shmmax` was set.
    Applied {
        /// Running kernel.
        kernel: KernelVersion,
        /// Requested size in MB.
        requested_mb: u64,
        /// Applied size in MB after clamping.
        applied_mb: u64,
        /// Applied size in bytes.
        bytes: u64,
    },
}

/// Adjusts the shared-memory ceiling before the primary service starts.
pub struct EnvironmentTuner {
    runner: Arc<dyn CommandRunner>,
    version_query: PathBuf,
    sysctl: PathBuf,
    os: OsFamily,
}

impl EnvironmentTuner {
    /// Creates a tuner for the detected OS family.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, tools: &ToolPaths) -> Self {
        Self {
            runner,
            version_query: tools.version_query.clone(),
            sysctl: tools.sysctl.clone(),
            os: detect_os_family(),
        }
    }

    /// Overrides the detected OS family.
    #[must_use]
    pub const fn with_os_family(mut self, os: OsFamily) -> Self {
        self.os = os;
        self
    }

    /// Reads the running kernel version through the version query command.
    ///
    /// # Errors
    /// Returns an error if the command fails or its output cannot be parsed.
    pub async fn kernel_version(&self) -> Result<KernelVersion> {
        let invocation = Invocation::new(self.version_query.to_string_lossy(), ["-r"]);
        let output = self
            .runner
            .output(&invocation)
            .await
            .map_err(|e| SupervisorError::kernel_version(format!("'{invocation}': {e}")))?;
        if !output.is_success() {
            return Err(SupervisorError::kernel_version(format!(
                "'{invocation}': {}",
                output.describe()
            )));
        }
        let version = KernelVersion::parse(&output.stdout)?;
        tracing::debug!(release = %output.stdout.trim(), version = %version, "kernel version");
        Ok(version)
    }

    /// Tunes `kernel.shmmax` to `target_mb` if the platform needs it.
    ///
    /// # Errors
    /// Returns an error if the kernel version cannot be read or the
    /// privileged command fails.
    pub async fn tune(&self, target_mb: u64) -> Result<TuneOutcome> {
        match self.os {
            OsFamily::Windows => {
                tracing::warn!("shared-memory tuning is not implemented on windows; skipping");
                return Ok(TuneOutcome::UnsupportedPlatform(self.os));
            }
            os if !os.has_tunable_shmmax() => {
                tracing::info!(os = %os, "no shared-memory tuning for this platform");
                return Ok(TuneOutcome::UnsupportedPlatform(os));
            }
            _ => {}
        }

        let kernel = self.kernel_version().await?;
        if !kernel.needs_shm_tuning() {
            tracing::info!(kernel = %kernel, "kernel >= 3.16; shmmax left unchanged");
            return Ok(TuneOutcome::NotNeeded(kernel));
        }

        tracing::info!(kernel = %kernel, "kernel older than 3.16, tuning shmmax");
        let applied_mb = clamp_pre_316_mb(target_mb);
        if applied_mb < target_mb {
            tracing::warn!(
                requested_mb = target_mb,
                applied_mb,
                "pre-3.16 kernels have only 8192MB of total shared memory; clamping shmmax"
            );
        }
        let bytes = mb_to_bytes(applied_mb);
        self.set_shmmax(bytes).await?;

        Ok(TuneOutcome::Applied {
            kernel,
            requested_mb: target_mb,
            applied_mb,
            bytes,
        })
    }

    async fn set_shmmax(&self, bytes: u64) -> Result<()> {
        let invocation = Invocation::new(
            self.sysctl.to_string_lossy(),
            ["-w".to_string(), format!("kernel.shmmax={bytes}")],
        );
        let output = self
            .runner
            .output(&invocation)
            .await
            .map_err(|e| SupervisorError::Tuning {
                bytes,
                reason: e.to_string(),
            })?;
        if !output.is_success() {
            return Err(SupervisorError::Tuning {
                bytes,
                reason: output.describe(),
            });
        }
        tracing::info!(bytes, "kernel.shmmax set");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::command::CommandOutput;
    use crate::tests::mocks::MockRunner;

    fn tuner(runner: &Arc<MockRunner>, os: OsFamily) -> EnvironmentTuner {
        EnvironmentTuner::new(runner.clone(), &ToolPaths::default()).with_os_family(os)
    }

    #[test]
    fn test_parse_release_strings() {
        let cases = [
            ("3.8.0-19-generic", KernelVersion::new(3, 8)),
            ("3.10.0-123.20.1.el7.x86_64", KernelVersion::new(3, 10)),
            ("3.16.6-2-desktop", KernelVersion::new(3, 16)),
            ("3.16.0-34-generic\n", KernelVersion::new(3, 16)),
            ("6.1-rc1", KernelVersion::new(6, 1)),
        ];
        for (release, expected) in cases {
            assert_eq!(KernelVersion::parse(release).unwrap(), expected, "{release}");
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(KernelVersion::parse("").is_err());
        assert!(KernelVersion::parse("linux").is_err());
        assert!(KernelVersion::parse("4").is_err());
        assert!(KernelVersion::parse("4.x").is_err());
    }

    #[test]
    fn test_as_f64() {
        assert_eq!(KernelVersion::new(3, 16).as_f64(), 3.16);
        assert_eq!(KernelVersion::new(3, 8).as_f64(), 3.8);
    }

    #[test]
    fn test_ordering_is_component_wise() {
        assert!(KernelVersion::new(3, 8) < KernelVersion::new(3, 16));
        assert!(KernelVersion::new(3, 8).needs_shm_tuning());
        assert!(KernelVersion::new(3, 10).needs_shm_tuning());
        assert!(!KernelVersion::new(3, 16).needs_shm_tuning());
        assert!(!KernelVersion::new(4, 4).needs_shm_tuning());
        assert!(KernelVersion::new(2, 99).needs_shm_tuning());
    }

    #[tokio::test]
    async fn test_tune_not_needed_on_new_kernel() {
        let runner = Arc::new(MockRunner::new());
        runner.respond("uname -r", CommandOutput::success("4.4.0-21-generic\n"));

        let outcome = tuner(&runner, OsFamily::Linux).tune(512).await.unwrap();
        assert_eq!(outcome, TuneOutcome::NotNeeded(KernelVersion::new(4, 4)));
        assert!(runner.calls_matching("sysctl").is_empty());
    }

    #[tokio::test]
    async fn test_tune_applies_on_old_kernel() {
        let runner = Arc::new(MockRunner::new());
        runner.respond("uname -r", CommandOutput::success("3.10.0-123.el7.x86_64\n"));

        let outcome = tuner(&runner, OsFamily::Linux).tune(512).await.unwrap();
        assert_eq!(
            outcome,
            TuneOutcome::Applied {
                kernel: KernelVersion::new(3, 10),
                requested_mb: 512,
                applied_mb: 512,
                bytes: 536_870_912,
            }
        );
        assert_eq!(
            runner.calls_matching("sysctl"),
            vec!["sysctl -w kernel.shmmax=536870912".to_string()]
        );
    }

    #[tokio::test]
    async fn test_tune_clamps_on_old_kernel() {
        let runner = Arc::new(MockRunner::new());
        runner.respond("uname -r", CommandOutput::success("3.10.0\n"));

        let outcome = tuner(&runner, OsFamily::Bsd).tune(10_000).await.unwrap();
        assert!(matches!(
            outcome,
            TuneOutcome::Applied {
                applied_mb: 8192,
                bytes: 8_589_934_592,
                ..
            }
        ));
        assert_eq!(
            runner.calls_matching("sysctl"),
            vec!["sysctl -w kernel.shmmax=8589934592".to_string()]
        );
    }

    #[tokio::test]
    async fn test_tune_sysctl_failure_is_fatal() {
        let runner = Arc::new(MockRunner::new());
        runner.respond("uname -r", CommandOutput::success("3.8.0-19-generic\n"));
        runner.respond("sysctl", CommandOutput::failure(255, "permission denied"));

        let err = tuner(&runner, OsFamily::Linux).tune(512).await.unwrap_err();
        assert!(matches!(err, SupervisorError::Tuning { bytes: 536_870_912, .. }));
        assert!(err.hints().iter().any(|h| h.contains("--privileged")));
    }

    #[tokio::test]
    async fn test_tune_version_query_failure_is_fatal() {
        let runner = Arc::new(MockRunner::new());
        runner.fail_to_spawn("uname");

        let err = tuner(&runner, OsFamily::Linux).tune(512).await.unwrap_err();
        assert!(matches!(err, SupervisorError::KernelVersion(_)));
    }

    #[tokio::test]
    async fn test_tune_skips_unsupported_platforms() {
        for os in [OsFamily::MacOS, OsFamily::Windows, OsFamily::Other] {
            let runner = Arc::new(MockRunner::new());
            let outcome = tuner(&runner, os).tune(512).await.unwrap();
            assert_eq!(outcome, TuneOutcome::UnsupportedPlatform(os));
            assert!(runner.calls().is_empty());
        }
    }

    proptest! {
        #[test]
        fn prop_parse_reads_major_minor(
            major in 0u32..100,
            minor in 0u32..100,
            patch in 0u32..1000,
            suffix in "(-[a-z0-9]{1,8}){0,2}",
        ) {
            let release = format!("{major}.{minor}.{patch}{suffix}");
            let version = KernelVersion::parse(&release).unwrap();
            prop_assert_eq!(version, KernelVersion::new(major, minor));
            let expected: f64 = format!("{major}.{minor}").parse().unwrap();
            prop_assert_eq!(version.as_f64(), expected);
        }

        #[test]
        fn prop_clamp(target in 1u64..1_000_000) {
            let applied = clamp_pre_316_mb(target);
            if target > PRE_316_SHMALL_MB {
                prop_assert_eq!(applied, PRE_316_SHMALL_MB);
            } else {
                prop_assert_eq!(applied, target);
            }
            prop_assert_eq!(mb_to_bytes(applied), applied * 1024 * 1024);
        }
    }
}
