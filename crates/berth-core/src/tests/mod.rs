//! Test infrastructure and cross-component suites.
//!
//! Unit tests live next to each component; the suites here drive the
//! [`Supervisor`](crate::Supervisor) end to end against a [`MockRunner`].

pub mod mocks;
pub mod signal;

pub use mocks::{MockRunner, MockSignals, RecordingObserver};
