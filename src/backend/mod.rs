//! The signing backend: document fetch and completion.
//!
//! [`SigningBackend`] is the seam between the session and the network. The
//! production implementation is [`http::HttpBackend`] (reqwest, bearer
//! credential from a [`auth::TokenStore`]); tests substitute their own.
//!
//! ## Contract
//!
//! ```text
//! GET /docs/{id}            → { doc: { filePath, signedFilePath?, signed, signatures? } }
//! PUT /docs/{id}/complete   { signatures, pdfWidth, pdfHeight }
//!                           → { doc: { signedFilePath } }
//! ```
//!
//! File paths in responses are raw; [`paths`] canonicalises them.

pub mod auth;
pub mod http;
pub mod paths;

use crate::error::SignError;
use crate::model::{CompletionRequest, CompletionResponse, DocumentRecord};
use async_trait::async_trait;

/// Backend operations needed by a signing session.
#[async_trait]
pub trait SigningBackend: Send + Sync {
    /// Load a document and any previously confirmed marks.
    async fn fetch_document(&self, doc_id: &str) -> Result<DocumentRecord, SignError>;

    /// Submit normalized marks; returns the signed artifact reference.
    async fn complete(
        &self,
        doc_id: &str,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, SignError>;
}
