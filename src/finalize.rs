//! The finalization protocol.
//!
//! ```text
//!  Composing ──► Validating ──► Submitting ──► Confirmed
//!      ▲             │              │
//!      │             ▼              ▼
//!      └────────── Failed ◄─────────┘
//! ```
//!
//! 1. **Validate** — at least one placeholder, all signed, page dimensions
//!    known, viewport rendered. Failures are [`ValidationError`]s and never
//!    reach the network.
//! 2. **Normalize** — every placeholder through the forward transform.
//! 3. **Submit** — one `PUT /docs/{id}/complete`, bounded by
//!    `submit_timeout_secs`. A second `finalize` while one is outstanding
//!    returns [`FinalizeOutcome::AlreadyInFlight`] without a request.
//! 4. **Confirm** — document `completed`, placeholders locked and rewritten
//!    into document space, signed URL recorded.
//! 5. **Fail** — the error is reported and the session returns to
//!    `Composing` with the store exactly as it was.

use crate::backend::paths;
use crate::error::{SignError, ValidationError};
use crate::engine::normalize::CoordinateNormalizer;
use crate::model::{CompletionRequest, DocStatus, NormalizedPlaceholder};
use crate::session::{Composer, SigningSession};
use serde::Serialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Where the session is in the finalization state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FinalizePhase {
    #[default]
    Composing,
    Validating,
    Submitting,
    Confirmed,
    Failed,
}

/// Result of a successful backend confirmation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
    /// Path as returned by the backend.
    pub signed_file_path: String,
    /// Canonical viewer URL for the signed artifact.
    pub signed_file_url: Option<String>,
    /// The normalized marks that were submitted.
    pub signatures: Vec<NormalizedPlaceholder>,
    pub duration_ms: u64,
}

/// What a call to [`SigningSession::finalize`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum FinalizeOutcome {
    Confirmed(Confirmation),
    /// Another attempt was already pending; nothing was sent.
    AlreadyInFlight,
}

impl Composer {
    /// Run the completeness gate and build the request body.
    fn prepare_submission(&self) -> Result<CompletionRequest, ValidationError> {
        if self.store.is_read_only() {
            return Err(ValidationError::AlreadyConfirmed);
        }
        if self.store.is_empty() {
            return Err(ValidationError::NoPlaceholders);
        }
        let unsigned = self.store.unsigned_count();
        if unsigned > 0 {
            return Err(ValidationError::Unsigned { count: unsigned });
        }
        let normalizer = CoordinateNormalizer::new(self.pdf, self.viewport.viewport())?;
        let pdf = normalizer.pdf();
        Ok(CompletionRequest {
            signatures: normalizer.normalize_all(self.store.placeholders())?,
            pdf_width: pdf.width,
            pdf_height: pdf.height,
        })
    }
}

/// Clears the in-flight flag if the finalize future is dropped mid-request.
struct InFlight<'a> {
    composer: &'a Mutex<Composer>,
    armed: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut c = self.composer.lock().unwrap_or_else(|e| e.into_inner());
            c.submitting = false;
            c.phase = FinalizePhase::Composing;
        }
    }
}

impl SigningSession {
    /// Validate, normalize and submit every placeholder.
    ///
    /// # Errors
    /// - [`SignError::Validation`] — nothing placed, unsigned placeholders,
    ///   page not measured or not rendered, or already confirmed
    /// - [`SignError::Auth`] — no credential; no request was sent
    /// - [`SignError::Timeout`] — no answer within `submit_timeout_secs`
    /// - [`SignError::Network`] / [`SignError::Server`] — transport or
    ///   backend failure
    ///
    /// On every error the placeholder store is left untouched and the
    /// session is back in [`FinalizePhase::Composing`].
    pub async fn finalize(&self) -> Result<FinalizeOutcome, SignError> {
        // ── Validate + normalize (under the lock) ────────────────────────
        let prepared = {
            let mut c = self.lock();
            if c.submitting {
                info!("Finalize for {} ignored: submission pending", self.doc_id);
                return Ok(FinalizeOutcome::AlreadyInFlight);
            }
            c.phase = FinalizePhase::Validating;
            let prepared = c.prepare_submission();
            if prepared.is_ok() {
                c.drag.end();
                c.submitting = true;
                c.phase = FinalizePhase::Submitting;
            }
            prepared
        };
        self.observer.on_phase_change(FinalizePhase::Validating);

        let request = match prepared {
            Ok(request) => request,
            Err(e) => return Err(self.fail(e.into())),
        };

        // ── Submit (lock released) ───────────────────────────────────────
        let mut in_flight = InFlight {
            composer: self.composer.as_ref(),
            armed: true,
        };
        self.observer.on_phase_change(FinalizePhase::Submitting);
        self.observer.on_submit_start(request.signatures.len());

        let secs = self.config.submit_timeout_secs;
        info!(
            "Submitting {} signatures for {} (timeout {}s)",
            request.signatures.len(),
            self.doc_id,
            secs
        );
        let start = Instant::now();
        let result = match tokio::time::timeout(
            Duration::from_secs(secs),
            self.backend.complete(&self.doc_id, &request),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SignError::Timeout { secs }),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        // ── Resolve ──────────────────────────────────────────────────────
        in_flight.armed = false;
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                self.lock().submitting = false;
                return Err(self.fail(e));
            }
        };

        let confirmation = {
            let mut c = self.lock();
            c.submitting = false;
            let signed_file_url = paths::file_url(
                &self.config.file_base_url,
                &response.doc.signed_file_path,
                &self.config.storage_root,
            );
            c.status = DocStatus::Completed;
            c.store.commit_confirmed(&request.signatures);
            c.stored = request.signatures.clone();
            c.signed_file_url = signed_file_url.clone();
            c.capture.reset();
            c.last_error = None;
            c.phase = FinalizePhase::Confirmed;
            Confirmation {
                signed_file_path: response.doc.signed_file_path,
                signed_file_url,
                signatures: request.signatures,
                duration_ms,
            }
        };

        info!(
            "Document {} signed in {}ms: {}",
            self.doc_id,
            duration_ms,
            confirmation.signed_file_url.as_deref().unwrap_or("<no file url>")
        );
        self.observer.on_phase_change(FinalizePhase::Confirmed);
        self.observer
            .on_confirmed(confirmation.signed_file_url.as_deref());
        Ok(FinalizeOutcome::Confirmed(confirmation))
    }

    /// Record a failed attempt and return to composing.
    fn fail(&self, error: SignError) -> SignError {
        warn!("Finalize for {} failed: {}", self.doc_id, error);
        {
            let mut c = self.lock();
            c.phase = FinalizePhase::Composing;
            c.last_error = Some(error.to_string());
        }
        self.observer.on_phase_change(FinalizePhase::Failed);
        self.observer.on_failed(&error);
        self.observer.on_phase_change(FinalizePhase::Composing);
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SigningBackend;
    use crate::config::SessionConfig;
    use crate::model::{CompletedDoc, CompletionResponse, DocumentRecord, PdfDimensions, Point};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Accepting;

    #[async_trait]
    impl SigningBackend for Accepting {
        async fn fetch_document(&self, _: &str) -> Result<DocumentRecord, SignError> {
            Err(SignError::Internal("unused".into()))
        }

        async fn complete(
            &self,
            _: &str,
            _: &CompletionRequest,
        ) -> Result<CompletionResponse, SignError> {
            Ok(CompletionResponse {
                doc: CompletedDoc {
                    signed_file_path: r"uploads\signed-a.pdf".into(),
                },
            })
        }
    }

    fn session() -> SigningSession {
        let s = SigningSession::from_record(
            SessionConfig::default(),
            Arc::new(Accepting),
            "doc-1",
            DocumentRecord {
                file_path: "uploads/a.pdf".into(),
                signed_file_path: None,
                signed: false,
                signatures: None,
            },
        )
        .unwrap();
        {
            let mut c = s.lock();
            c.on_document_loaded(1, PdfDimensions::new(612.0, 792.0));
            c.on_render(612.0, 792.0);
        }
        s
    }

    #[tokio::test]
    async fn empty_store_is_rejected() {
        let s = session();
        let err = s.finalize().await.unwrap_err();
        assert!(matches!(
            err,
            SignError::Validation(ValidationError::NoPlaceholders)
        ));
        assert_eq!(s.lock().phase(), FinalizePhase::Composing);
        assert!(s.lock().last_error().is_some());
    }

    #[tokio::test]
    async fn confirmation_locks_and_rewrites_coordinates() {
        let s = session();
        {
            let mut c = s.lock();
            c.enter_placement_mode().unwrap();
            let id = c.place(Point::new(100.0, 100.0), 1).unwrap();
            c.capture_mut().set_text("Ada");
            c.apply_signature(&id).unwrap();
        }

        let FinalizeOutcome::Confirmed(conf) = s.finalize().await.unwrap() else {
            panic!("expected confirmation");
        };
        assert_eq!(
            conf.signed_file_url.as_deref(),
            Some("http://localhost:5000/uploads/signed-a.pdf")
        );

        let c = s.lock();
        assert_eq!(c.status(), DocStatus::Completed);
        assert_eq!(c.phase(), FinalizePhase::Confirmed);
        let p = &c.store().placeholders()[0];
        assert!(p.is_locked());
        assert_eq!(p.position(), Point::new(100.0, 692.0));
        assert_eq!(c.document().signatures.len(), 1);
        drop(c);

        let again = s.finalize().await.unwrap_err();
        assert!(matches!(
            again,
            SignError::Validation(ValidationError::AlreadyConfirmed)
        ));
    }
}
