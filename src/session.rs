//! The composing session for one document.
//!
//! [`SigningSession`] is a cheap-to-clone handle. All engine state (store,
//! viewport tracker, capture panel, drag controller, document status) lives
//! in a [`Composer`] behind one lock; input handlers take the lock, perform
//! one synchronous operation and release it. The only asynchronous
//! operations are [`SigningSession::open`] and
//! [`SigningSession::finalize`](crate::finalize), and neither holds the lock
//! across an `.await`.
//!
//! ```rust,no_run
//! use docsign::{Point, SessionConfig, SigningSession};
//! use docsign::backend::{auth::MemoryTokenStore, http::HttpBackend};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SessionConfig::default();
//! let tokens = Arc::new(MemoryTokenStore::new(Some("jwt".into())));
//! let backend = Arc::new(HttpBackend::new(&config, tokens)?);
//! let session = SigningSession::open(config, backend, "65f0c1").await?;
//!
//! let mut c = session.lock();
//! c.on_document_loaded(2, docsign::PdfDimensions::new(612.0, 792.0));
//! c.on_render(600.0, 776.0);
//! c.enter_placement_mode()?;
//! let id = c.place(Point::new(100.0, 50.0), 1)?;
//! c.capture_mut().set_text("Ada Lovelace");
//! c.apply_signature(&id)?;
//! drop(c);
//!
//! session.finalize().await?;
//! # Ok(())
//! # }
//! ```

use crate::backend::paths;
use crate::backend::SigningBackend;
use crate::config::SessionConfig;
use crate::engine::capture::{SignatureCapture, UploadedFile};
use crate::engine::drag::{DragController, PointerListeners};
use crate::engine::normalize::CoordinateNormalizer;
use crate::engine::store::{PlaceholderStore, StoreSnapshot};
use crate::engine::viewport::ViewportTracker;
use crate::error::{EditError, SignError};
use crate::finalize::FinalizePhase;
use crate::model::{
    DocStatus, Document, DocumentRecord, NormalizedPlaceholder, PdfDimensions, PlaceholderId,
    Point, SignatureKind, Viewport,
};
use crate::observer::{NoopObserver, Observer};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, info};

// ── Composer ─────────────────────────────────────────────────────────────

/// Synchronous engine state for one document.
///
/// Every edit operation fails with [`EditError::SubmissionPending`] while a
/// finalize request is outstanding.
#[derive(Debug)]
pub struct Composer {
    pub(crate) doc_id: String,
    pub(crate) status: DocStatus,
    pub(crate) file_url: String,
    pub(crate) signed_file_url: Option<String>,
    /// Document-space marks as last persisted by the backend.
    pub(crate) stored: Vec<NormalizedPlaceholder>,
    pub(crate) pdf: Option<PdfDimensions>,
    pub(crate) viewport: ViewportTracker,
    pub(crate) store: PlaceholderStore,
    pub(crate) capture: SignatureCapture,
    pub(crate) drag: DragController,
    pub(crate) phase: FinalizePhase,
    pub(crate) submitting: bool,
    pub(crate) last_error: Option<String>,
}

impl Composer {
    fn new(doc_id: &str, record: DocumentRecord, config: &SessionConfig) -> Result<Self, SignError> {
        let file_url = paths::file_url(&config.file_base_url, &record.file_path, &config.storage_root)
            .ok_or_else(|| SignError::InvalidDocument {
                detail: format!("document {doc_id} has no usable file path"),
            })?;
        let signed_file_url = record
            .signed_file_path
            .as_deref()
            .and_then(|p| paths::file_url(&config.file_base_url, p, &config.storage_root));
        let status = if record.signed {
            DocStatus::Completed
        } else {
            DocStatus::Pending
        };

        let mut store = PlaceholderStore::new(0);
        store.set_read_only(status == DocStatus::Completed);

        Ok(Self {
            doc_id: doc_id.to_string(),
            status,
            file_url,
            signed_file_url,
            stored: record.signatures.unwrap_or_default(),
            pdf: None,
            viewport: ViewportTracker::new(config.reference_width),
            store,
            capture: SignatureCapture::new(config),
            drag: DragController::default(),
            phase: FinalizePhase::Composing,
            submitting: false,
            last_error: None,
        })
    }

    fn guard(&self) -> Result<(), EditError> {
        if self.submitting {
            return Err(EditError::SubmissionPending);
        }
        Ok(())
    }

    // ── Viewer events ────────────────────────────────────────────────────

    /// The viewer finished loading: page count and native page size.
    pub fn on_document_loaded(&mut self, num_pages: u32, pdf: PdfDimensions) {
        info!(
            "Document {} loaded: {} pages, {}x{}",
            self.doc_id, num_pages, pdf.width, pdf.height
        );
        let dropped = self.store.set_page_count(num_pages);
        if self.drag.active_id().is_some_and(|id| dropped.contains(id)) {
            self.drag.end();
        }
        self.pdf = pdf.is_valid().then_some(pdf);
    }

    /// The viewer rendered the current page at `width × height`.
    pub fn on_render(&mut self, width: f64, height: f64) -> Option<Viewport> {
        self.viewport.on_render(width, height)
    }

    /// Page navigation: the previous render no longer applies.
    pub fn on_page_change(&mut self) {
        self.viewport.invalidate();
    }

    // ── Placement ────────────────────────────────────────────────────────

    pub fn enter_placement_mode(&mut self) -> Result<(), EditError> {
        self.guard()?;
        self.store.enter_placement_mode()
    }

    pub fn cancel_placement_mode(&mut self) {
        self.store.cancel_placement_mode();
    }

    /// Handle a click on `page` while placement mode is armed.
    ///
    /// Deferred with [`EditError::NotRendered`] until the viewer has
    /// rendered the page.
    pub fn place(&mut self, pointer: Point, page: u32) -> Result<PlaceholderId, EditError> {
        self.guard()?;
        if !self.viewport.is_rendered() {
            return Err(EditError::NotRendered);
        }
        self.store.create(pointer, page, self.viewport.scale())
    }

    pub fn remove(&mut self, id: &PlaceholderId) -> Result<bool, EditError> {
        self.guard()?;
        if self.drag.active_id() == Some(id) {
            self.drag.end();
        }
        self.store.remove(id)
    }

    pub fn clear_all(&mut self) -> Result<usize, EditError> {
        self.guard()?;
        self.drag.end();
        self.store.clear_all()
    }

    pub fn resize(&mut self, id: &PlaceholderId, width: f64, height: f64) -> Result<(), EditError> {
        self.guard()?;
        self.store.resize(id, width, height)
    }

    // ── Drag ─────────────────────────────────────────────────────────────

    pub fn begin_drag(&mut self, id: &PlaceholderId, pointer: Point) -> Result<(), EditError> {
        self.guard()?;
        if !self.viewport.is_rendered() {
            return Err(EditError::NotRendered);
        }
        let scale = self.viewport.scale();
        self.drag.begin(&self.store, id, pointer, scale)
    }

    pub fn drag_to(&mut self, pointer: Point) -> Result<Option<Point>, EditError> {
        self.guard()?;
        self.drag.update(&mut self.store, pointer)
    }

    pub fn end_drag(&mut self) -> Option<PlaceholderId> {
        self.drag.end()
    }

    // ── Signing ──────────────────────────────────────────────────────────

    /// The capture panel, for mode / text / stroke input.
    pub fn capture(&self) -> &SignatureCapture {
        &self.capture
    }

    pub fn capture_mut(&mut self) -> &mut SignatureCapture {
        &mut self.capture
    }

    /// Offer a file to the upload mode.
    pub fn select_file(&mut self, file: UploadedFile) -> Result<(), EditError> {
        self.capture.select_file(file)
    }

    /// Attach the pending capture artifact to `id`.
    pub fn apply_signature(&mut self, id: &PlaceholderId) -> Result<SignatureKind, EditError> {
        self.guard()?;
        let kind = self.capture.apply(&mut self.store, id)?;
        debug!("Applied {:?} signature to {}", kind, id);
        Ok(kind)
    }

    /// Re-open the capture panel pre-populated from a signed placeholder.
    pub fn edit_signature(&mut self, id: &PlaceholderId) -> Result<(), EditError> {
        self.guard()?;
        if self.store.is_read_only() {
            return Err(EditError::ReadOnly);
        }
        self.capture.open_for_edit(&self.store, id)
    }

    // ── Edit mode ────────────────────────────────────────────────────────

    /// Re-open a confirmed document's marks for changes.
    ///
    /// The stored document-space marks are mapped back into screen space for
    /// the current viewport, so the page must be measured and rendered.
    pub fn enter_edit_mode(&mut self) -> Result<(), SignError> {
        self.guard()?;
        if self.status != DocStatus::Completed {
            return Err(EditError::NotConfirmed.into());
        }
        let normalizer = CoordinateNormalizer::new(self.pdf, self.viewport.viewport())?;
        self.store.load_from_server(&self.stored, &normalizer)?;
        self.drag.end();
        info!(
            "Document {} in edit mode with {} marks",
            self.doc_id,
            self.store.len()
        );
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────────────

    pub fn store(&self) -> &PlaceholderStore {
        &self.store
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.store.snapshot()
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport.viewport()
    }

    pub fn pdf_dimensions(&self) -> Option<PdfDimensions> {
        self.pdf
    }

    pub fn status(&self) -> DocStatus {
        self.status
    }

    pub fn phase(&self) -> FinalizePhase {
        self.phase
    }

    /// Busy indicator: a finalize request is outstanding.
    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Whether the confirm action should be enabled.
    pub fn can_finalize(&self) -> bool {
        !self.submitting
            && !self.store.is_read_only()
            && !self.store.is_empty()
            && self.store.unsigned_count() == 0
            && self.pdf.is_some()
            && self.viewport.is_rendered()
    }

    /// User-facing message from the last failed finalize attempt.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn document(&self) -> Document {
        Document {
            id: self.doc_id.clone(),
            status: self.status,
            file_url: self.file_url.clone(),
            signed_file_url: self.signed_file_url.clone(),
            signatures: self.stored.clone(),
        }
    }
}

// ── Session handle ───────────────────────────────────────────────────────

/// Shared handle to one document's signing session.
#[derive(Clone)]
pub struct SigningSession {
    pub(crate) doc_id: Arc<str>,
    pub(crate) config: Arc<SessionConfig>,
    pub(crate) backend: Arc<dyn SigningBackend>,
    pub(crate) composer: Arc<Mutex<Composer>>,
    pub(crate) observer: Observer,
}

impl std::fmt::Debug for SigningSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningSession")
            .field("doc_id", &self.doc_id)
            .finish_non_exhaustive()
    }
}

impl SigningSession {
    /// Fetch `doc_id` from the backend and start composing.
    ///
    /// A document the backend reports as signed opens read-only; its stored
    /// marks are kept for [`Composer::enter_edit_mode`].
    pub async fn open(
        config: SessionConfig,
        backend: Arc<dyn SigningBackend>,
        doc_id: &str,
    ) -> Result<Self, SignError> {
        info!("Opening document {}", doc_id);
        let record = backend.fetch_document(doc_id).await?;
        Self::from_record(config, backend, doc_id, record)
    }

    /// Start a session from a record the host already fetched.
    pub fn from_record(
        config: SessionConfig,
        backend: Arc<dyn SigningBackend>,
        doc_id: &str,
        record: DocumentRecord,
    ) -> Result<Self, SignError> {
        let composer = Composer::new(doc_id, record, &config)?;
        debug!(
            "Document {} is {:?} with {} stored marks",
            doc_id,
            composer.status,
            composer.stored.len()
        );
        Ok(Self {
            doc_id: Arc::from(doc_id),
            config: Arc::new(config),
            backend,
            composer: Arc::new(Mutex::new(composer)),
            observer: Arc::new(NoopObserver),
        })
    }

    /// Receive finalize notifications.
    pub fn with_observer(mut self, observer: Observer) -> Self {
        self.observer = observer;
        self
    }

    /// Route drag listener registration through `host`.
    ///
    /// The host is called with the composer locked; see [`PointerListeners`].
    pub fn with_pointer_listeners(self, host: Arc<dyn PointerListeners>) -> Self {
        self.lock().drag = DragController::new(host);
        self
    }

    /// Lock the composer for one input event.
    ///
    /// Do not hold the guard across an `.await`.
    pub fn lock(&self) -> MutexGuard<'_, Composer> {
        self.composer.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Subscribe to placeholder store snapshots.
    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.lock().store.subscribe()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.lock().snapshot()
    }

    pub fn document(&self) -> Document {
        self.lock().document()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CompletionRequest, CompletionResponse};
    use async_trait::async_trait;

    struct Unreachable;

    #[async_trait]
    impl SigningBackend for Unreachable {
        async fn fetch_document(&self, _: &str) -> Result<DocumentRecord, SignError> {
            Err(SignError::Network {
                reason: "offline".into(),
            })
        }

        async fn complete(
            &self,
            _: &str,
            _: &CompletionRequest,
        ) -> Result<CompletionResponse, SignError> {
            Err(SignError::Network {
                reason: "offline".into(),
            })
        }
    }

    fn record(signed: bool) -> DocumentRecord {
        DocumentRecord {
            file_path: r"uploads\1712-contract.pdf".into(),
            signed_file_path: signed.then(|| "uploads/signed-1712-contract.pdf".into()),
            signed,
            signatures: None,
        }
    }

    fn session(signed: bool) -> SigningSession {
        SigningSession::from_record(
            SessionConfig::default(),
            Arc::new(Unreachable),
            "doc-1",
            record(signed),
        )
        .unwrap()
    }

    #[test]
    fn file_urls_are_canonical() {
        let doc = session(true).document();
        assert_eq!(doc.file_url, "http://localhost:5000/uploads/1712-contract.pdf");
        assert_eq!(
            doc.signed_file_url.as_deref(),
            Some("http://localhost:5000/uploads/signed-1712-contract.pdf")
        );
        assert_eq!(doc.status, DocStatus::Completed);
    }

    #[test]
    fn record_without_file_path_is_rejected() {
        let mut r = record(false);
        r.file_path = " / ".into();
        let err = SigningSession::from_record(
            SessionConfig::default(),
            Arc::new(Unreachable),
            "doc-1",
            r,
        )
        .unwrap_err();
        assert!(matches!(err, SignError::InvalidDocument { .. }));
    }

    #[test]
    fn placement_is_deferred_until_rendered() {
        let s = session(false);
        let mut c = s.lock();
        c.on_document_loaded(1, PdfDimensions::new(612.0, 792.0));
        c.enter_placement_mode().unwrap();
        assert_eq!(
            c.place(Point::new(10.0, 10.0), 1).unwrap_err(),
            EditError::NotRendered
        );
        c.on_render(612.0, 792.0);
        assert!(c.place(Point::new(10.0, 10.0), 1).is_ok());
    }

    #[test]
    fn confirmed_document_opens_read_only() {
        let s = session(true);
        let mut c = s.lock();
        c.on_document_loaded(1, PdfDimensions::new(612.0, 792.0));
        c.on_render(612.0, 792.0);
        assert_eq!(c.enter_placement_mode().unwrap_err(), EditError::ReadOnly);
        assert!(!c.can_finalize());
    }

    #[test]
    fn edit_mode_requires_a_rendered_page() {
        let s = session(true);
        let mut c = s.lock();
        c.on_document_loaded(1, PdfDimensions::new(612.0, 792.0));
        assert!(matches!(
            c.enter_edit_mode(),
            Err(SignError::Validation(crate::error::ValidationError::ViewportNotRendered))
        ));
    }

    #[derive(Default)]
    struct CountingListeners {
        attached: std::sync::atomic::AtomicUsize,
        detached: std::sync::atomic::AtomicUsize,
    }

    impl PointerListeners for CountingListeners {
        fn attach(&self) {
            self.attached.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
        fn detach(&self) {
            self.detached.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    #[test]
    fn composer_edits_release_drag_listeners() {
        use std::sync::atomic::Ordering;

        let host = Arc::new(CountingListeners::default());
        let s = session(false).with_pointer_listeners(host.clone());
        let mut c = s.lock();
        c.on_document_loaded(2, PdfDimensions::new(612.0, 792.0));
        c.on_render(612.0, 792.0);
        c.enter_placement_mode().unwrap();
        let first = c.place(Point::new(10.0, 10.0), 1).unwrap();
        c.enter_placement_mode().unwrap();
        let second = c.place(Point::new(20.0, 20.0), 2).unwrap();

        c.begin_drag(&first, Point::new(10.0, 10.0)).unwrap();
        c.remove(&first).unwrap();
        assert_eq!(host.detached.load(Ordering::SeqCst), 1);

        c.begin_drag(&second, Point::new(20.0, 20.0)).unwrap();
        c.on_document_loaded(1, PdfDimensions::new(612.0, 792.0));
        assert!(c.store().get(&second).is_none());
        assert_eq!(host.detached.load(Ordering::SeqCst), 2);

        c.enter_placement_mode().unwrap();
        let third = c.place(Point::new(5.0, 5.0), 1).unwrap();
        c.begin_drag(&third, Point::new(5.0, 5.0)).unwrap();
        c.clear_all().unwrap();
        assert_eq!(host.attached.load(Ordering::SeqCst), 3);
        assert_eq!(host.detached.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn edits_are_refused_while_submitting() {
        let s = session(false);
        let mut c = s.lock();
        c.on_document_loaded(1, PdfDimensions::new(612.0, 792.0));
        c.on_render(612.0, 792.0);
        c.submitting = true;
        assert_eq!(
            c.enter_placement_mode().unwrap_err(),
            EditError::SubmissionPending
        );
        assert_eq!(c.clear_all().unwrap_err(), EditError::SubmissionPending);
    }
}
