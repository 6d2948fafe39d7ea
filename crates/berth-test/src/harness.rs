//! Scenario harness.
//!
//! Runs a [`Supervisor`] against a [`ScriptedHost`] with a test-controlled
//! signal source and records what happened.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use berth_core::{
    AuxiliaryOutcome, LifecycleObserver, LifecyclePhase, OsFamily, RunSummary, Signal,
    SignalSource, StartupConfig, Supervisor, SupervisorError,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Result, TestError};
use crate::host::ScriptedHost;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Signal source driven by a [`SignalTrigger`].
#[derive(Debug)]
pub struct ManualSignals {
    rx: mpsc::Receiver<Signal>,
}

/// Sends signals to a [`ManualSignals`].
#[derive(Debug, Clone)]
pub struct SignalTrigger {
    tx: mpsc::Sender<Signal>,
}

impl ManualSignals {
    /// Creates a source and its trigger.
    #[must_use]
    pub fn channel() -> (SignalTrigger, Self) {
        let (tx, rx) = mpsc::channel(1);
        (SignalTrigger { tx }, Self { rx })
    }
}

impl SignalTrigger {
    /// Delivers `signal`.
    ///
    /// # Errors
    /// Returns an error if the source was dropped.
    pub async fn send(&self, signal: Signal) -> Result<()> {
        self.tx
            .send(signal)
            .await
            .map_err(|_| TestError::harness("signal source dropped"))
    }
}

#[async_trait]
impl SignalSource for ManualSignals {
    async fn wait(&mut self) -> berth_core::Result<Signal> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| SupervisorError::signal("trigger dropped"))
    }
}

/// Observer recording phases and outcomes.
#[derive(Debug, Default)]
pub struct PhaseRecorder {
    phases: Mutex<Vec<LifecyclePhase>>,
    auxiliary: Mutex<Vec<AuxiliaryOutcome>>,
    signals: Mutex<Vec<Signal>>,
}

impl PhaseRecorder {
    /// Phases entered, in order, starting with `Init`.
    #[must_use]
    pub fn phases(&self) -> Vec<LifecyclePhase> {
        let mut phases = vec![LifecyclePhase::Init];
        phases.extend(self.phases.lock().iter().copied());
        phases
    }

    /// Most recent phase.
    #[must_use]
    pub fn current(&self) -> LifecyclePhase {
        self.phases
            .lock()
            .last()
            .copied()
            .unwrap_or(LifecyclePhase::Init)
    }
}

impl LifecycleObserver for PhaseRecorder {
    fn phase_changed(&self, _from: LifecyclePhase, to: LifecyclePhase) {
        self.phases.lock().push(to);
    }

    fn auxiliary_outcome(&self, outcome: &AuxiliaryOutcome) {
        self.auxiliary.lock().push(outcome.clone());
    }

    fn signal_received(&self, signal: Signal) {
        self.signals.lock().push(signal);
    }
}

/// One supervisor run against a scripted host.
#[derive(Debug, Clone)]
pub struct Scenario {
    config: StartupConfig,
    host: Arc<ScriptedHost>,
    os: OsFamily,
    recorder: Arc<PhaseRecorder>,
    timeout: Duration,
}

impl Scenario {
    /// Creates a scenario. The tuner sees a Linux host.
    #[must_use]
    pub fn new(config: StartupConfig, host: ScriptedHost) -> Self {
        Self {
            config,
            host: Arc::new(host),
            os: OsFamily::Linux,
            recorder: Arc::new(PhaseRecorder::default()),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the OS family the tuner sees.
    #[must_use]
    pub const fn with_os_family(mut self, os: OsFamily) -> Self {
        self.os = os;
        self
    }

    /// Sets how long a run may take before the harness gives up.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The scripted host.
    #[must_use]
    pub fn host(&self) -> &ScriptedHost {
        &self.host
    }

    /// The phase recorder.
    #[must_use]
    pub fn recorder(&self) -> &PhaseRecorder {
        &self.recorder
    }

    fn supervisor(&self) -> Supervisor {
        Supervisor::new(self.config.clone(), self.host.clone())
            .with_observer(self.recorder.clone())
            .with_os_family(self.os)
    }

    /// Starts the supervisor on a background task.
    ///
    /// The returned trigger delivers the shutdown signal.
    #[must_use]
    pub fn spawn(&self) -> (SignalTrigger, JoinHandle<berth_core::Result<RunSummary>>) {
        let (trigger, signals) = ManualSignals::channel();
        let supervisor = self.supervisor();
        let handle = tokio::spawn(async move { supervisor.run(signals).await });
        (trigger, handle)
    }

    /// Runs the scenario with `signal` already pending.
    ///
    /// # Errors
    /// Returns an error if the run does not finish within the timeout.
    pub async fn run_until(&self, signal: Signal) -> Result<ScenarioReport> {
        let (trigger, signals) = ManualSignals::channel();
        trigger.send(signal).await?;
        let result = tokio::time::timeout(self.timeout, self.supervisor().run(signals))
            .await
            .map_err(|_| TestError::Timeout(self.timeout))?;
        Ok(self.report(result))
    }

    /// Waits for a spawned run to finish.
    ///
    /// # Errors
    /// Returns an error if the task panicked or does not finish in time.
    pub async fn join(
        &self,
        handle: JoinHandle<berth_core::Result<RunSummary>>,
    ) -> Result<ScenarioReport> {
        let result = tokio::time::timeout(self.timeout, handle)
            .await
            .map_err(|_| TestError::Timeout(self.timeout))?
            .map_err(|e| TestError::harness(format!("supervisor task failed: {e}")))?;
        Ok(self.report(result))
    }

    fn report(&self, result: berth_core::Result<RunSummary>) -> ScenarioReport {
        ScenarioReport {
            result,
            phases: self.recorder.phases(),
            calls: self.host.calls(),
            launches: self.host.launches(),
            auxiliary: self.recorder.auxiliary.lock().clone(),
            signals: self.recorder.signals.lock().clone(),
        }
    }
}

/// What a scenario did.
#[derive(Debug)]
pub struct ScenarioReport {
    /// Supervisor result.
    pub result: berth_core::Result<RunSummary>,
    /// Phases entered, in order.
    pub phases: Vec<LifecyclePhase>,
    /// Commands run to completion, in order.
    pub calls: Vec<String>,
    /// Commands launched in the background.
    pub launches: Vec<String>,
    /// Auxiliary outcomes observed.
    pub auxiliary: Vec<AuxiliaryOutcome>,
    /// Signals observed.
    pub signals: Vec<Signal>,
}

impl ScenarioReport {
    /// Exit code the binary would return.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(self.result.is_err())
    }

    /// Commands run to completion that start with `prefix`.
    #[must_use]
    pub fn calls_matching(&self, prefix: &str) -> Vec<&str> {
        self.calls
            .iter()
            .map(String::as_str)
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    /// The supervisor error, if the run failed.
    #[must_use]
    pub fn error(&self) -> Option<&SupervisorError> {
        self.result.as_ref().err()
    }

    /// Last phase reached.
    #[must_use]
    pub fn last_phase(&self) -> LifecyclePhase {
        self.phases.last().copied().unwrap_or(LifecyclePhase::Init)
    }
}
