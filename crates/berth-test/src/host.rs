//! Scripted host.
//!
//! A stateful stand-in for the tools the entrypoint drives: the control tool
//! (`ccontrol`), the kernel version query (`uname`) and `sysctl`. Anything
//! else is treated as an auxiliary command. Faults are injected through
//! [`HostFaults`].

use std::path::PathBuf;

use async_trait::async_trait;
use berth_core::{CommandOutput, CommandRunner, Invocation, LaunchedProcess, ServiceState};
use parking_lot::Mutex;

/// Faults the host injects.
#[derive(Debug, Clone, Default)]
pub struct HostFaults {
    /// `qlist` prints nothing.
    pub empty_qlist: bool,
    /// `sysctl -w` is refused.
    pub sysctl_denied: bool,
    /// `start` exits non-zero.
    pub start_fails: bool,
    /// State the service lands in after `start` (default `running`).
    pub start_lands_in: Option<ServiceState>,
    /// `stop` exits zero but the service keeps running.
    pub stop_ignored: bool,
    /// `session` exits non-zero.
    pub session_fails: bool,
    /// Programs that cannot be executed at all.
    pub missing_programs: Vec<String>,
    /// Programs that run but exit non-zero.
    pub failing_programs: Vec<String>,
}

/// Fake host answering the entrypoint's commands.
#[derive(Debug)]
pub struct ScriptedHost {
    instance: String,
    install_dir: PathBuf,
    kernel_release: String,
    faults: HostFaults,
    state: Mutex<HostState>,
}

#[derive(Debug)]
struct HostState {
    service: ServiceState,
    shmmax: Option<u64>,
    calls: Vec<String>,
    launches: Vec<String>,
    next_pid: u32,
}

impl ScriptedHost {
    /// Creates a host with `instance` installed under `/usr/cachesys`, down,
    /// on a 4.4 kernel.
    #[must_use]
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            install_dir: PathBuf::from("/usr/cachesys"),
            kernel_release: "4.4.0-21-generic".to_string(),
            faults: HostFaults::default(),
            state: Mutex::new(HostState {
                service: ServiceState::Down,
                shmmax: None,
                calls: Vec::new(),
                launches: Vec::new(),
                next_pid: 100,
            }),
        }
    }

    /// Sets the kernel release `uname -r` reports.
    #[must_use]
    pub fn with_kernel(mut self, release: impl Into<String>) -> Self {
        self.kernel_release = release.into();
        self
    }

    /// Sets the installation directory `qlist` reports.
    #[must_use]
    pub fn with_install_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.install_dir = dir.into();
        self
    }

    /// Sets the initial service state.
    #[must_use]
    pub fn with_service_state(self, state: ServiceState) -> Self {
        self.state.lock().service = state;
        self
    }

    /// Sets the injected faults.
    #[must_use]
    pub fn with_faults(mut self, faults: HostFaults) -> Self {
        self.faults = faults;
        self
    }

    /// Current service state.
    #[must_use]
    pub fn service_state(&self) -> ServiceState {
        self.state.lock().service
    }

    /// `kernel.shmmax` as last set through `sysctl`, in bytes.
    #[must_use]
    pub fn shmmax(&self) -> Option<u64> {
        self.state.lock().shmmax
    }

    /// Every command run to completion, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// Commands run to completion that start with `prefix`.
    #[must_use]
    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    /// Commands launched in the background, in order.
    #[must_use]
    pub fn launches(&self) -> Vec<String> {
        self.state.lock().launches.clone()
    }

    fn is_missing(&self, program: &str) -> bool {
        self.faults.missing_programs.iter().any(|p| p == program)
    }

    fn qlist_record(&self, state: ServiceState) -> String {
        let status = match state {
            ServiceState::Running => "running, since Mon Jun  8 12:00:30 2015",
            ServiceState::Down => "down, last used Mon Jun  8 16:40:07 2015",
            ServiceState::SignOnInhibited => {
                "sign-on inhibited, last used Mon Jun  8 11:31:37 2015"
            }
            ServiceState::Unknown => "starting up",
        };
        format!(
            "{}^{}^2015.1.0.429.0^{status}^cache.cpf^1972^57772^62972^ok^\n",
            self.instance,
            self.install_dir.display()
        )
    }

    fn control(&self, state: &mut HostState, args: &[String]) -> CommandOutput {
        let (Some(sub), Some(instance)) = (args.first(), args.get(1)) else {
            return CommandOutput::failure(1, "usage: ccontrol <command> <instance>");
        };
        if instance != &self.instance {
            return match sub.as_str() {
                "qlist" => CommandOutput::success(""),
                _ => CommandOutput::failure(1, format!("Cache instance '{instance}' not found")),
            };
        }

        match sub.as_str() {
            "qlist" if self.faults.empty_qlist => CommandOutput::success(""),
            "qlist" => CommandOutput::success(self.qlist_record(state.service)),
            "start" if self.faults.start_fails => {
                CommandOutput::failure(1, "Startup failed; see cconsole.log")
            }
            "start" => {
                state.service = self.faults.start_lands_in.unwrap_or(ServiceState::Running);
                CommandOutput::success("")
            }
            "stop" => {
                if !self.faults.stop_ignored {
                    state.service = ServiceState::Down;
                }
                CommandOutput::success("")
            }
            "session" if self.faults.session_fails => {
                CommandOutput::failure(1, "<NOROUTINE>")
            }
            "session" if state.service == ServiceState::Running => CommandOutput::success(""),
            "session" => CommandOutput::failure(1, "Cache is not running"),
            other => CommandOutput::failure(1, format!("unknown command '{other}'")),
        }
    }

    fn sysctl(&self, state: &mut HostState, args: &[String]) -> CommandOutput {
        if self.faults.sysctl_denied {
            return CommandOutput::failure(
                255,
                "sysctl: permission denied on key 'kernel.shmmax'",
            );
        }
        let value = match args {
            [flag, assignment] if flag == "-w" => assignment
                .strip_prefix("kernel.shmmax=")
                .and_then(|v| v.parse::<u64>().ok()),
            _ => None,
        };
        match value {
            Some(bytes) => {
                state.shmmax = Some(bytes);
                CommandOutput::success(format!("kernel.shmmax = {bytes}\n"))
            }
            None => CommandOutput::failure(1, "sysctl: invalid argument"),
        }
    }
}

fn not_found(program: &str) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("{program}: No such file or directory"),
    )
}

#[async_trait]
impl CommandRunner for ScriptedHost {
    async fn output(&self, invocation: &Invocation) -> std::io::Result<CommandOutput> {
        let mut state = self.state.lock();
        state.calls.push(invocation.to_string());
        if self.is_missing(&invocation.program) {
            return Err(not_found(&invocation.program));
        }

        let output = match invocation.program.as_str() {
            "ccontrol" => self.control(&mut state, &invocation.args),
            "uname" => CommandOutput::success(format!("{}\n", self.kernel_release)),
            "sysctl" => self.sysctl(&mut state, &invocation.args),
            program if self.faults.failing_programs.iter().any(|p| p == program) => {
                CommandOutput::failure(1, format!("{program}: failed"))
            }
            _ => CommandOutput::success(""),
        };
        tracing::trace!(command = %invocation, code = ?output.code, "scripted host");
        Ok(output)
    }

    async fn launch(&self, invocation: &Invocation) -> std::io::Result<LaunchedProcess> {
        let mut state = self.state.lock();
        state.launches.push(invocation.to_string());
        if self.is_missing(&invocation.program) {
            return Err(not_found(&invocation.program));
        }
        state.next_pid += 1;
        Ok(LaunchedProcess::detached(Some(state.next_pid)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inv(line: &str) -> Invocation {
        Invocation::parse(line).unwrap()
    }

    #[tokio::test]
    async fn test_qlist_tracks_service_state() {
        let host = ScriptedHost::new("CACHE");
        let out = host.output(&inv("ccontrol qlist CACHE")).await.unwrap();
        assert!(out.stdout.starts_with("CACHE^/usr/cachesys^"));
        assert!(out.stdout.contains("^down, last used"));

        host.output(&inv("ccontrol start CACHE quietly")).await.unwrap();
        assert_eq!(host.service_state(), ServiceState::Running);
        let out = host.output(&inv("ccontrol qlist CACHE")).await.unwrap();
        assert!(out.stdout.contains("^running, since"));
    }

    #[tokio::test]
    async fn test_unknown_instance() {
        let host = ScriptedHost::new("CACHE");
        let out = host.output(&inv("ccontrol qlist OTHER")).await.unwrap();
        assert!(out.stdout.is_empty());
        let out = host.output(&inv("ccontrol start OTHER quietly")).await.unwrap();
        assert!(!out.is_success());
    }

    #[tokio::test]
    async fn test_sysctl_records_value() {
        let host = ScriptedHost::new("CACHE");
        let out = host
            .output(&inv("sysctl -w kernel.shmmax=536870912"))
            .await
            .unwrap();
        assert!(out.is_success());
        assert_eq!(host.shmmax(), Some(536_870_912));
    }

    #[tokio::test]
    async fn test_missing_program_cannot_run() {
        let host = ScriptedHost::new("CACHE").with_faults(HostFaults {
            missing_programs: vec!["/opt/sshd.sh".into()],
            ..HostFaults::default()
        });
        assert!(host.launch(&inv("/opt/sshd.sh -D")).await.is_err());
        assert_eq!(host.launches(), vec!["/opt/sshd.sh -D".to_string()]);
    }
}
