//! Invocations of the primary service's control tool.
//!
//! The supervisor depends on exactly four call shapes:
//!
//! ```text
//! <tool> qlist <instance>
//! <tool> start <instance> [nostu] quietly
//! <tool> stop <instance> quietly
//! <tool> session <instance> -U <namespace> <routine>
//! ```

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::command::{CommandOutput, CommandRunner, Invocation};
use crate::error::{Result, SupervisorError};
use crate::types::InstanceRef;

/// Control-tool operation, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlOperation {
    /// `qlist`.
    Query,
    /// `start`.
    Start,
    /// `stop`.
    Stop,
    /// `session`.
    Session,
}

impl ControlOperation {
    /// Returns the operation name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Query => "status query",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Session => "routine launch",
        }
    }
}

impl fmt::Display for ControlOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Control tool bound to one instance.
#[derive(Clone)]
pub struct ControlInterface {
    runner: Arc<dyn CommandRunner>,
    tool: PathBuf,
    instance: InstanceRef,
}

impl fmt::Debug for ControlInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlInterface")
            .field("tool", &self.tool)
            .field("instance", &self.instance)
            .finish_non_exhaustive()
    }
}

impl ControlInterface {
    /// Creates a control interface for `instance` using `tool`.
    #[must_use]
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        tool: impl Into<PathBuf>,
        instance: InstanceRef,
    ) -> Self {
        Self {
            runner,
            tool: tool.into(),
            instance,
        }
    }

    /// Returns the managed instance.
    #[must_use]
    pub const fn instance(&self) -> &InstanceRef {
        &self.instance
    }

    /// `qlist <instance>`.
    #[must_use]
    pub fn qlist_invocation(&self) -> Invocation {
        self.invocation(["qlist", self.instance.as_str()])
    }

    /// `start <instance> [nostu] quietly`.
    #[must_use]
    pub fn start_invocation(&self, single_user: bool) -> Invocation {
        let mut args = vec!["start", self.instance.as_str()];
        if single_user {
            args.push("nostu");
        }
        args.push("quietly");
        self.invocation(args)
    }

    /// `stop <instance> quietly`.
    #[must_use]
    pub fn stop_invocation(&self) -> Invocation {
        self.invocation(["stop", self.instance.as_str(), "quietly"])
    }

    /// `session <instance> -U <namespace> <routine>`.
    #[must_use]
    pub fn session_invocation(&self, namespace: &str, routine: &str) -> Invocation {
        self.invocation(["session", self.instance.as_str(), "-U", namespace, routine])
    }

    /// Runs `qlist` and returns its raw stdout.
    ///
    /// # Errors
    /// Returns an error if the tool cannot run or exits non-zero.
    pub async fn qlist(&self) -> Result<String> {
        let output = self
            .run(ControlOperation::Query, &self.qlist_invocation())
            .await?;
        Ok(output.stdout)
    }

    /// Runs `start`.
    ///
    /// # Errors
    /// Returns an error if the tool cannot run or exits non-zero.
    pub async fn start(&self, single_user: bool) -> Result<()> {
        self.run(ControlOperation::Start, &self.start_invocation(single_user))
            .await
            .map(drop)
    }

    /// Runs `stop`.
    ///
    /// # Errors
    /// Returns an error if the tool cannot run or exits non-zero.
    pub async fn stop(&self) -> Result<()> {
        self.run(ControlOperation::Stop, &self.stop_invocation())
            .await
            .map(drop)
    }

    /// Runs `session` to completion.
    ///
    /// # Errors
    /// Returns an error if the tool cannot run or exits non-zero.
    pub async fn session(&self, namespace: &str, routine: &str) -> Result<()> {
        self.run(
            ControlOperation::Session,
            &self.session_invocation(namespace, routine),
        )
        .await
        .map(drop)
    }

    fn invocation<I, S>(&self, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Invocation::new(self.tool.to_string_lossy(), args)
    }

    async fn run(
        &self,
        operation: ControlOperation,
        invocation: &Invocation,
    ) -> Result<CommandOutput> {
        let output = self
            .runner
            .output(invocation)
            .await
            .map_err(|e| SupervisorError::Command {
                operation,
                invocation: invocation.to_string(),
                reason: e.to_string(),
            })?;

        if !output.is_success() {
            return Err(SupervisorError::Command {
                operation,
                invocation: invocation.to_string(),
                reason: output.describe(),
            });
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::mocks::MockRunner;

    fn control(runner: &Arc<MockRunner>) -> ControlInterface {
        ControlInterface::new(runner.clone(), "ccontrol", InstanceRef::new("C151"))
    }

    #[test]
    fn test_invocation_shapes() {
        let runner = Arc::new(MockRunner::new());
        let ctl = control(&runner);
        assert_eq!(ctl.qlist_invocation().to_string(), "ccontrol qlist C151");
        assert_eq!(
            ctl.start_invocation(false).to_string(),
            "ccontrol start C151 quietly"
        );
        assert_eq!(
            ctl.start_invocation(true).to_string(),
            "ccontrol start C151 nostu quietly"
        );
        assert_eq!(ctl.stop_invocation().to_string(), "ccontrol stop C151 quietly");
        assert_eq!(
            ctl.session_invocation("USER", "^START").to_string(),
            "ccontrol session C151 -U USER ^START"
        );
    }

    #[tokio::test]
    async fn test_qlist_returns_stdout() {
        let runner = Arc::new(MockRunner::new());
        runner.respond("ccontrol qlist", CommandOutput::success("C151^/usr/cachesys^x^down^"));
        let record = control(&runner).qlist().await.unwrap();
        assert!(record.starts_with("C151^"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_command_error() {
        let runner = Arc::new(MockRunner::new());
        runner.respond("ccontrol start", CommandOutput::failure(1, "no such instance"));
        let err = control(&runner).start(false).await.unwrap_err();
        match err {
            SupervisorError::Command {
                operation, reason, ..
            } => {
                assert_eq!(operation, ControlOperation::Start);
                assert!(reason.contains("no such instance"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_spawn_failure_is_command_error() {
        let runner = Arc::new(MockRunner::new());
        runner.fail_to_spawn("ccontrol stop");
        let err = control(&runner).stop().await.unwrap_err();
        assert!(matches!(
            err,
            SupervisorError::Command {
                operation: ControlOperation::Stop,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_session_runs_to_completion() {
        let runner = Arc::new(MockRunner::new());
        control(&runner).session("USER", "^START").await.unwrap();
        assert_eq!(
            runner.calls(),
            vec!["ccontrol session C151 -U USER ^START".to_string()]
        );
    }
}
