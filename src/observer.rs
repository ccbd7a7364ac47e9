//! Observer trait for finalization events.
//!
//! Inject an [`Arc<dyn SessionObserver>`] via
//! [`crate::SigningSession::with_observer`] to surface busy indicators and
//! success / failure notifications. Snapshots of the placeholder store are
//! delivered separately through [`crate::SigningSession::subscribe`].
//!
//! # Example
//!
//! ```rust
//! use docsign::{FinalizePhase, SessionObserver, SignError};
//! use std::sync::{Arc, Mutex};
//!
//! struct Toasts {
//!     shown: Mutex<Vec<String>>,
//! }
//!
//! impl SessionObserver for Toasts {
//!     fn on_confirmed(&self, signed_file_url: Option<&str>) {
//!         self.shown.lock().unwrap().push(format!("Signed: {signed_file_url:?}"));
//!     }
//!
//!     fn on_failed(&self, error: &SignError) {
//!         self.shown.lock().unwrap().push(error.to_string());
//!     }
//! }
//!
//! let toasts = Arc::new(Toasts { shown: Mutex::new(Vec::new()) });
//! toasts.on_phase_change(FinalizePhase::Submitting);
//! ```

use crate::error::SignError;
use crate::finalize::FinalizePhase;
use std::sync::Arc;

/// Called by the session as a finalize attempt progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Callbacks run after the session's internal lock is
/// released, so they may query the session.
pub trait SessionObserver: Send + Sync {
    /// Called on every transition of the finalization state machine.
    fn on_phase_change(&self, phase: FinalizePhase) {
        let _ = phase;
    }

    /// Called once validation passed, just before the request is sent.
    ///
    /// # Arguments
    /// * `placeholder_count` — number of normalized marks being submitted
    fn on_submit_start(&self, placeholder_count: usize) {
        let _ = placeholder_count;
    }

    /// Called when the backend confirmed the document.
    ///
    /// # Arguments
    /// * `signed_file_url` — canonical URL of the signed artifact, if the
    ///   backend returned a usable path
    fn on_confirmed(&self, signed_file_url: Option<&str>) {
        let _ = signed_file_url;
    }

    /// Called when a finalize attempt failed (validation, auth, timeout,
    /// network or server error).
    fn on_failed(&self, error: &SignError) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need notifications.
///
/// This is the default when no observer is configured.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Convenience alias for the type stored in [`crate::SigningSession`].
pub type Observer = Arc<dyn SessionObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        phases: Mutex<Vec<FinalizePhase>>,
        failures: Mutex<Vec<String>>,
    }

    impl SessionObserver for Recorder {
        fn on_phase_change(&self, phase: FinalizePhase) {
            self.phases.lock().unwrap().push(phase);
        }

        fn on_failed(&self, error: &SignError) {
            self.failures.lock().unwrap().push(error.to_string());
        }
    }

    #[test]
    fn noop_observer_does_not_panic() {
        let o = NoopObserver;
        o.on_phase_change(FinalizePhase::Validating);
        o.on_submit_start(3);
        o.on_confirmed(Some("http://localhost:5000/uploads/a.pdf"));
        o.on_failed(&SignError::Timeout { secs: 30 });
    }

    #[test]
    fn recorder_receives_events_through_arc_dyn() {
        let rec = Arc::new(Recorder::default());
        let obs: Observer = rec.clone();
        obs.on_phase_change(FinalizePhase::Submitting);
        obs.on_failed(&SignError::Network {
            reason: "connection reset".into(),
        });
        assert_eq!(*rec.phases.lock().unwrap(), vec![FinalizePhase::Submitting]);
        assert_eq!(rec.failures.lock().unwrap().len(), 1);
    }
}
