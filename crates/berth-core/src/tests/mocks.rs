//! Mock implementations for testing.
//!
//! Provides a scripted command runner, a channel-fed signal source and an
//! observer that records every lifecycle event.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::command::{CommandOutput, CommandRunner, Invocation, LaunchedProcess};
use crate::error::{Result, SupervisorError};
use crate::observer::LifecycleObserver;
use crate::signal::SignalSource;
use crate::tuner::TuneOutcome;
use crate::types::{AuxiliaryOutcome, LifecyclePhase, Signal};

/// Command runner answering from a script.
///
/// Responses are registered per command-line prefix. Each prefix holds a
/// queue; responses are handed out in order and the last one repeats.
/// Unscripted commands succeed with empty output.
#[derive(Default)]
pub struct MockRunner {
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    responses: Vec<(String, VecDeque<CommandOutput>)>,
    spawn_failures: Vec<String>,
    calls: Vec<String>,
    launches: Vec<String>,
    next_pid: u32,
}

impl MockState {
    fn fails_to_spawn(&self, command: &str) -> bool {
        self.spawn_failures.iter().any(|p| command.starts_with(p.as_str()))
    }

    fn next_output(&mut self, command: &str) -> CommandOutput {
        let entry = self
            .responses
            .iter_mut()
            .filter(|(prefix, _)| command.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len());
        match entry {
            Some((_, queue)) if queue.len() > 1 => queue
                .pop_front()
                .unwrap_or_else(|| CommandOutput::success("")),
            Some((_, queue)) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| CommandOutput::success("")),
            None => CommandOutput::success(""),
        }
    }
}

impl MockRunner {
    /// Creates a runner with no scripted responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `output` for commands starting with `prefix`.
    pub fn respond(&self, prefix: &str, output: CommandOutput) {
        let mut state = self.state.lock();
        if let Some((_, queue)) = state.responses.iter_mut().find(|(p, _)| p == prefix) {
            queue.push_back(output);
        } else {
            state
                .responses
                .push((prefix.to_string(), VecDeque::from([output])));
        }
    }

    /// Makes commands starting with `prefix` fail to execute.
    pub fn fail_to_spawn(&self, prefix: &str) {
        self.state.lock().spawn_failures.push(prefix.to_string());
    }

    /// Command lines run to completion, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// Command lines run to completion that start with `prefix`.
    #[must_use]
    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    /// Command lines launched in the background, in order.
    #[must_use]
    pub fn launches(&self) -> Vec<String> {
        self.state.lock().launches.clone()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn output(&self, invocation: &Invocation) -> std::io::Result<CommandOutput> {
        let command = invocation.to_string();
        let mut state = self.state.lock();
        state.calls.push(command.clone());
        if state.fails_to_spawn(&command) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{}: not found", invocation.program),
            ));
        }
        Ok(state.next_output(&command))
    }

    async fn launch(&self, invocation: &Invocation) -> std::io::Result<LaunchedProcess> {
        let command = invocation.to_string();
        let mut state = self.state.lock();
        state.launches.push(command.clone());
        if state.fails_to_spawn(&command) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{}: not found", invocation.program),
            ));
        }
        state.next_pid += 1;
        Ok(LaunchedProcess::detached(Some(4000 + state.next_pid)))
    }
}

/// Signal source fed from a channel.
#[derive(Debug)]
pub struct MockSignals {
    rx: mpsc::Receiver<Signal>,
}

impl MockSignals {
    /// Creates a source and the sender that feeds it.
    #[must_use]
    pub fn channel() -> (mpsc::Sender<Signal>, Self) {
        let (tx, rx) = mpsc::channel(1);
        (tx, Self { rx })
    }

    /// Creates a source with `signal` already pending.
    #[must_use]
    pub fn pending(signal: Signal) -> Self {
        let (tx, rx) = mpsc::channel(1);
        // Capacity 1 and a fresh channel: cannot be full.
        let _ = tx.try_send(signal);
        Self { rx }
    }
}

#[async_trait]
impl SignalSource for MockSignals {
    async fn wait(&mut self) -> Result<Signal> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| SupervisorError::signal("signal channel closed"))
    }
}

/// Observer recording every event.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    phases: Mutex<Vec<LifecyclePhase>>,
    tunings: Mutex<Vec<TuneOutcome>>,
    auxiliary: Mutex<Vec<AuxiliaryOutcome>>,
    signals: Mutex<Vec<Signal>>,
}

impl RecordingObserver {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Phases entered, in order, starting with `Init`.
    #[must_use]
    pub fn phases(&self) -> Vec<LifecyclePhase> {
        let mut phases = vec![LifecyclePhase::Init];
        phases.extend(self.phases.lock().iter().copied());
        phases
    }

    /// Tuning outcomes reported.
    #[must_use]
    pub fn tunings(&self) -> Vec<TuneOutcome> {
        self.tunings.lock().clone()
    }

    /// Auxiliary outcomes reported.
    #[must_use]
    pub fn auxiliary_outcomes(&self) -> Vec<AuxiliaryOutcome> {
        self.auxiliary.lock().clone()
    }

    /// Signals reported.
    #[must_use]
    pub fn signals(&self) -> Vec<Signal> {
        self.signals.lock().clone()
    }
}

impl LifecycleObserver for RecordingObserver {
    fn phase_changed(&self, _from: LifecyclePhase, to: LifecyclePhase) {
        self.phases.lock().push(to);
    }

    fn tuned(&self, outcome: &TuneOutcome) {
        self.tunings.lock().push(*outcome);
    }

    fn auxiliary_outcome(&self, outcome: &AuxiliaryOutcome) {
        self.auxiliary.lock().push(outcome.clone());
    }

    fn signal_received(&self, signal: Signal) {
        self.signals.lock().push(signal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_runner_queue_and_repeat() {
        let runner = MockRunner::new();
        runner.respond("ccontrol qlist", CommandOutput::success("first"));
        runner.respond("ccontrol qlist", CommandOutput::success("second"));
        let qlist = Invocation::new("ccontrol", ["qlist", "CACHE"]);

        assert_eq!(runner.output(&qlist).await.unwrap().stdout, "first");
        assert_eq!(runner.output(&qlist).await.unwrap().stdout, "second");
        assert_eq!(runner.output(&qlist).await.unwrap().stdout, "second");
        assert_eq!(runner.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_mock_runner_longest_prefix_wins() {
        let runner = MockRunner::new();
        runner.respond("ccontrol", CommandOutput::failure(1, "generic"));
        runner.respond("ccontrol qlist", CommandOutput::success("specific"));

        let out = runner
            .output(&Invocation::new("ccontrol", ["qlist", "CACHE"]))
            .await
            .unwrap();
        assert_eq!(out.stdout, "specific");
        let out = runner
            .output(&Invocation::new("ccontrol", ["stop", "CACHE"]))
            .await
            .unwrap();
        assert!(!out.is_success());
    }

    #[tokio::test]
    async fn test_mock_signals_pending() {
        let mut signals = MockSignals::pending(Signal::Term);
        assert_eq!(signals.wait().await.unwrap(), Signal::Term);
    }
}
