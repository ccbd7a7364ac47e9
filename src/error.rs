//! Error types for the docsign library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`SignError`] — an async operation against the backend failed
//!   (validation rejected the finalize attempt, credential missing, timeout,
//!   transport failure, non-2xx response). Returned as `Err(SignError)` from
//!   [`crate::SigningSession::open`] and [`crate::SigningSession::finalize`].
//!
//! * [`ValidationError`] — the local completeness gate refused to submit.
//!   Wrapped in [`SignError::Validation`]; never reaches the network.
//!
//! * [`EditError`] — a synchronous edit (place, drag, sign, upload) was
//!   refused. These are user-facing, local, and leave every placeholder as
//!   it was.
//!
//! None of them mutate the placeholder store: a failed finalize can always be
//! retried without re-entering signatures.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::PlaceholderId;

/// Errors returned by the async session entry points.
#[derive(Debug, Error)]
pub enum SignError {
    // ── Local validation ──────────────────────────────────────────────────
    /// The completeness gate rejected the attempt before any request.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A local edit was refused (only from operations that also talk to
    /// the backend or change modes, such as entering edit mode).
    #[error(transparent)]
    Edit(#[from] EditError),

    // ── Credential ────────────────────────────────────────────────────────
    /// No bearer credential is available (or it was rejected up front).
    #[error("Not signed in: {detail}\nLog in again and retry.")]
    Auth { detail: String },

    /// The token store could not be read or written.
    #[error("Failed to access token store '{path}': {source}")]
    TokenStore {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Transport ─────────────────────────────────────────────────────────
    /// The backend did not answer within the submission deadline.
    #[error("The signing service did not respond within {secs}s. Your signatures are kept; try again.")]
    Timeout { secs: u64 },

    /// Connection refused, DNS failure, reset mid-body, …
    #[error("Network error: {reason}")]
    Network { reason: String },

    /// The backend answered with a non-2xx status.
    #[error("{message} (HTTP {status})")]
    Server {
        status: u16,
        kind: ServerErrorKind,
        message: String,
    },

    /// The backend answered 2xx but the body did not match the contract.
    #[error("Unexpected response from the signing service: {detail}")]
    InvalidDocument { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SignError {
    /// Whether the user may simply retry the same action.
    pub fn is_retryable(&self) -> bool {
        match self {
            SignError::Timeout { .. } | SignError::Network { .. } => true,
            SignError::Server { kind, .. } => matches!(kind, ServerErrorKind::Unavailable),
            _ => false,
        }
    }

    /// Whether the user must sign in again before retrying.
    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            SignError::Auth { .. }
                | SignError::Server {
                    kind: ServerErrorKind::SessionExpired,
                    ..
                }
        )
    }
}

/// Classification of a non-2xx backend response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ServerErrorKind {
    /// 400 / 422: the request or its data was rejected.
    BadRequest,
    /// 401: the credential expired.
    SessionExpired,
    /// 403: the user may not sign this document.
    Forbidden,
    /// 404: the document no longer exists.
    NotFound,
    /// 413: the payload (usually image signatures) is too large.
    PayloadTooLarge,
    /// 5xx: the service is failing or unavailable.
    Unavailable,
    /// Anything else.
    Other,
}

impl ServerErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => ServerErrorKind::BadRequest,
            401 => ServerErrorKind::SessionExpired,
            403 => ServerErrorKind::Forbidden,
            404 => ServerErrorKind::NotFound,
            413 => ServerErrorKind::PayloadTooLarge,
            500..=599 => ServerErrorKind::Unavailable,
            _ => ServerErrorKind::Other,
        }
    }

    /// Message shown when the response body carries none.
    pub fn default_message(self) -> &'static str {
        match self {
            ServerErrorKind::BadRequest => "The signing request was rejected as invalid",
            ServerErrorKind::SessionExpired => "Your session has expired; please log in again",
            ServerErrorKind::Forbidden => "You do not have permission to sign this document",
            ServerErrorKind::NotFound => "The document could not be found",
            ServerErrorKind::PayloadTooLarge => {
                "The signatures are too large to upload; use smaller images"
            }
            ServerErrorKind::Unavailable => "The signing service is unavailable; try again later",
            ServerErrorKind::Other => "The signing service returned an unexpected error",
        }
    }
}

/// Reasons the completeness gate refuses a finalize attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Add at least one signature before finishing.")]
    NoPlaceholders,

    #[error("{count} signature placeholder(s) still need to be signed.")]
    Unsigned { count: usize },

    #[error("The page size is not known yet; wait for the document to finish loading.")]
    DimensionsUnavailable,

    #[error("The page has not been rendered yet; wait for the viewer to finish drawing.")]
    ViewportNotRendered,

    #[error("This document has already been signed.")]
    AlreadyConfirmed,
}

/// A refused local edit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("Click \"Add signature\" before placing a mark.")]
    PlacementInactive,

    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: u32, total: u32 },

    #[error("The document is signed and read-only.")]
    ReadOnly,

    #[error("This signature is locked; enter edit mode to change it.")]
    Locked,

    #[error("No placeholder with id {0}")]
    UnknownPlaceholder(PlaceholderId),

    #[error("Placeholder id {0} appears more than once")]
    DuplicateId(PlaceholderId),

    #[error("Provide a signature before applying it.")]
    EmptyArtifact,

    #[error("Unsupported file type '{mime}'. Use a JPEG or PNG image.")]
    UnsupportedMime { mime: String },

    #[error("File is {size} bytes; the maximum is {max} bytes.")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Could not read the image: {0}")]
    ImageDecode(String),

    #[error("Another placeholder is already being dragged.")]
    DragInProgress,

    #[error("Wait for the current submission to finish.")]
    SubmissionPending,

    #[error("The page has not been rendered yet.")]
    NotRendered,

    #[error("Only a signed document can be re-opened for editing.")]
    NotConfirmed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_display_names_count() {
        let e = SignError::from(ValidationError::Unsigned { count: 1 });
        assert!(e.to_string().contains('1'), "got: {e}");
        assert!(!e.is_retryable());
    }

    #[test]
    fn status_classification() {
        assert_eq!(ServerErrorKind::from_status(400), ServerErrorKind::BadRequest);
        assert_eq!(ServerErrorKind::from_status(422), ServerErrorKind::BadRequest);
        assert_eq!(ServerErrorKind::from_status(401), ServerErrorKind::SessionExpired);
        assert_eq!(ServerErrorKind::from_status(403), ServerErrorKind::Forbidden);
        assert_eq!(ServerErrorKind::from_status(404), ServerErrorKind::NotFound);
        assert_eq!(ServerErrorKind::from_status(413), ServerErrorKind::PayloadTooLarge);
        assert_eq!(ServerErrorKind::from_status(502), ServerErrorKind::Unavailable);
        assert_eq!(ServerErrorKind::from_status(418), ServerErrorKind::Other);
    }

    #[test]
    fn retry_and_reauth_flags() {
        assert!(SignError::Timeout { secs: 30 }.is_retryable());
        assert!(SignError::Network {
            reason: "reset".into()
        }
        .is_retryable());

        let expired = SignError::Server {
            status: 401,
            kind: ServerErrorKind::SessionExpired,
            message: "jwt expired".into(),
        };
        assert!(expired.requires_reauth());
        assert!(!expired.is_retryable());

        let down = SignError::Server {
            status: 503,
            kind: ServerErrorKind::Unavailable,
            message: "maintenance".into(),
        };
        assert!(down.is_retryable());
    }

    #[test]
    fn server_display_includes_status() {
        let e = SignError::Server {
            status: 404,
            kind: ServerErrorKind::NotFound,
            message: "Document not found".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("404"), "got: {msg}");
        assert!(msg.contains("Document not found"), "got: {msg}");
    }
}
