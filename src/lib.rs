//! # docsign
//!
//! Headless signature-placement engine for paginated documents.
//!
//! ## What it does
//!
//! A viewer renders a document page; the user clicks to drop signature
//! placeholders, drags them into place, fills each with a typed, drawn or
//! uploaded signature, and confirms. This crate owns everything between the
//! clicks and the backend call: placeholder state, the screen ⇄ document
//! coordinate transform, signature capture, and the finalization protocol
//! that submits a document-space description of every mark.
//!
//! Rendering the page and producing the signed binary are left to external
//! collaborators (the viewer and the backend service).
//!
//! ## Data flow
//!
//! ```text
//! viewer ── page count, native size ──► SigningSession
//!        ── rendered size ───────────► ViewportTracker ──► scale
//! click  ─────────────────────────────► PlaceholderStore (screen space)
//! drag   ──► DragController ──────────► PlaceholderStore
//! input  ──► SignatureCapture ── apply ► PlaceholderStore
//! confirm ─► finalize: validate ─► CoordinateNormalizer ─► PUT /complete
//!                                                         └► confirmed, locked
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docsign::backend::{auth::FileTokenStore, http::HttpBackend};
//! use docsign::{FinalizeOutcome, PdfDimensions, Point, SessionConfig, SigningSession};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SessionConfig::default();
//!     let tokens = Arc::new(FileTokenStore::new("token.json"));
//!     let backend = Arc::new(HttpBackend::new(&config, tokens)?);
//!     let session = SigningSession::open(config, backend, "65f0c1").await?;
//!
//!     {
//!         let mut c = session.lock();
//!         c.on_document_loaded(1, PdfDimensions::new(612.0, 792.0));
//!         c.on_render(600.0, 776.0);
//!         c.enter_placement_mode()?;
//!         let id = c.place(Point::new(100.0, 50.0), 1)?;
//!         c.capture_mut().set_text("Ada Lovelace");
//!         c.apply_signature(&id)?;
//!     }
//!
//!     if let FinalizeOutcome::Confirmed(done) = session.finalize().await? {
//!         println!("signed: {:?}", done.signed_file_url);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docsign` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when embedding the engine:
//! ```toml
//! docsign = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod finalize;
pub mod model;
pub mod observer;
pub mod session;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::SigningBackend;
pub use config::{SessionConfig, SessionConfigBuilder};
pub use engine::capture::{CaptureMode, SignatureArtifact, SignatureCapture, UploadedFile};
pub use engine::store::{PlaceholderStore, StoreSnapshot};
pub use error::{EditError, ServerErrorKind, SignError, ValidationError};
pub use finalize::{Confirmation, FinalizeOutcome, FinalizePhase};
pub use model::{
    CoordinateSpace, DocStatus, Document, NormalizedPlaceholder, PdfDimensions, Placeholder,
    PlaceholderId, Point, SignatureKind, Viewport,
};
pub use observer::{NoopObserver, SessionObserver};
pub use session::{Composer, SigningSession};
pub use stream::{progress_stream, snapshot_stream, SigningProgress, SnapshotStream};
