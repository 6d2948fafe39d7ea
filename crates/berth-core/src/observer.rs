//! Lifecycle observation.
//!
//! The supervisor reports what it does to a [`LifecycleObserver`] instead of
//! consulting global log settings. [`TracingObserver`] is the default.

use crate::tuner::TuneOutcome;
use crate::types::{AuxiliaryOutcome, LifecyclePhase, Signal};

/// Receives supervisor lifecycle events.
///
/// All methods default to doing nothing.
pub trait LifecycleObserver: Send + Sync {
    /// The supervisor moved from `from` to `to`.
    fn phase_changed(&self, from: LifecyclePhase, to: LifecyclePhase) {
        let _ = (from, to);
    }

    /// Shared-memory tuning finished.
    fn tuned(&self, outcome: &TuneOutcome) {
        let _ = outcome;
    }

    /// The auxiliary launch reported its outcome.
    fn auxiliary_outcome(&self, outcome: &AuxiliaryOutcome) {
        let _ = outcome;
    }

    /// A termination signal was trapped.
    fn signal_received(&self, signal: Signal) {
        let _ = signal;
    }
}

/// Logs lifecycle events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl LifecycleObserver for TracingObserver {
    fn phase_changed(&self, from: LifecyclePhase, to: LifecyclePhase) {
        tracing::debug!(from = %from, to = %to, "phase transition");
    }

    fn tuned(&self, outcome: &TuneOutcome) {
        match outcome {
            TuneOutcome::UnsupportedPlatform(os) => {
                tracing::debug!(os = %os, "shared memory not tuned");
            }
            TuneOutcome::NotNeeded(kernel) => {
                tracing::debug!(kernel = %kernel, "shared memory not tuned");
            }
            TuneOutcome::Applied {
                kernel, applied_mb, ..
            } => {
                tracing::info!(kernel = %kernel, shmmax_mb = applied_mb, "shared memory tuned");
            }
        }
    }

    fn auxiliary_outcome(&self, outcome: &AuxiliaryOutcome) {
        if outcome.launched {
            tracing::info!(detail = %outcome.detail, "auxiliary service is up");
        } else {
            tracing::error!(detail = %outcome.detail, "failed to start auxiliary service");
        }
    }

    fn signal_received(&self, signal: Signal) {
        tracing::info!(signal = %signal, number = signal.as_i32(), "signal trapped");
    }
}
