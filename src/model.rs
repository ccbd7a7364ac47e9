//! Data model shared by the engine, the session and the backend.
//!
//! Two families of types live here:
//!
//! * **Engine state** — [`Placeholder`], [`Viewport`], [`PdfDimensions`],
//!   [`Document`]. Placeholder fields are private: only the store may change
//!   them, so the `signed` flag can only flip through the capture apply step.
//!
//! * **Wire types** — [`NormalizedPlaceholder`], [`CompletionRequest`],
//!   [`CompletionResponse`], [`DocumentRecord`]. These mirror the backend's
//!   JSON contract (camelCase keys, document-space units).

use serde::{Deserialize, Serialize};
use std::fmt;

// ── Identifiers & geometry ───────────────────────────────────────────────

/// Stable identifier of a placeholder.
///
/// Fresh ids are random v4 UUIDs and are never reused within a session.
/// Ids loaded from the backend are kept verbatim; older documents store
/// numeric ids, which are accepted and kept as their decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawId", into = "String")]
pub struct PlaceholderId(String);

impl PlaceholderId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlaceholderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlaceholderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PlaceholderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<PlaceholderId> for String {
    fn from(id: PlaceholderId) -> Self {
        id.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl From<RawId> for PlaceholderId {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => Self(s),
            RawId::Integer(n) => Self(n.to_string()),
            RawId::Float(n) => Self(n.to_string()),
        }
    }
}

/// A position in either screen or document space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Which coordinate system a placeholder's `x, y` are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateSpace {
    /// Scaled rendering viewport, origin top-left.
    #[default]
    Screen,
    /// Native page units at scale 1, origin bottom-left.
    Document,
}

/// On-screen rendered page size and its ratio to the reference render width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub scale: f64,
}

/// Native page size at scale 1; authoritative for document space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PdfDimensions {
    pub width: f64,
    pub height: f64,
}

impl PdfDimensions {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Both sides finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

// ── Signatures ───────────────────────────────────────────────────────────

/// Kind of a signature artifact as stored by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureKind {
    Text,
    Image,
}

// ── Placeholder ──────────────────────────────────────────────────────────

/// One signature mark.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Placeholder {
    pub(crate) id: PlaceholderId,
    pub(crate) x: f64,
    pub(crate) y: f64,
    pub(crate) page: u32,
    pub(crate) signed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) signature_type: Option<SignatureKind>,
    pub(crate) locked: bool,
    pub(crate) show_box: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) height: Option<f64>,
}

impl Placeholder {
    /// A fresh, unsigned placeholder showing its placement outline.
    pub(crate) fn unsigned(id: PlaceholderId, position: Point, page: u32) -> Self {
        Self {
            id,
            x: clamp_coordinate(position.x),
            y: clamp_coordinate(position.y),
            page,
            signed: false,
            signature: None,
            signature_type: None,
            locked: false,
            show_box: true,
            width: None,
            height: None,
        }
    }

    pub fn id(&self) -> &PlaceholderId {
        &self.id
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn is_signed(&self) -> bool {
        self.signed
    }

    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    pub fn signature_type(&self) -> Option<SignatureKind> {
        self.signature_type
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn show_box(&self) -> bool {
        self.show_box
    }

    /// Box size in the placeholder's current coordinate space, if set.
    pub fn size(&self) -> Option<(f64, f64)> {
        self.width.zip(self.height)
    }

    pub(crate) fn set_position(&mut self, p: Point) {
        self.x = clamp_coordinate(p.x);
        self.y = clamp_coordinate(p.y);
    }
}

/// Map any coordinate to a finite, non-negative value.
pub(crate) fn clamp_coordinate(v: f64) -> f64 {
    if v.is_finite() {
        v.max(0.0)
    } else {
        0.0
    }
}

// ── Document ─────────────────────────────────────────────────────────────

/// Backend-side lifecycle of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocStatus {
    #[default]
    Pending,
    Completed,
}

/// The session's view of a backend document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub status: DocStatus,
    /// Canonical viewer URL for the unsigned file.
    pub file_url: String,
    /// Canonical viewer URL for the signed artifact, once completed.
    pub signed_file_url: Option<String>,
    /// Document-space marks persisted by the backend.
    pub signatures: Vec<NormalizedPlaceholder>,
}

// ── Wire types ───────────────────────────────────────────────────────────

/// A placeholder in document-space units, as submitted to and stored by the
/// backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedPlaceholder {
    pub id: PlaceholderId,
    pub x: f64,
    pub y: f64,
    pub page: u32,
    pub signature: String,
    pub signature_type: SignatureKind,
    #[serde(default)]
    pub page_width: f64,
    #[serde(default)]
    pub page_height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

/// Body of `PUT /docs/{id}/complete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub signatures: Vec<NormalizedPlaceholder>,
    pub pdf_width: f64,
    pub pdf_height: f64,
}

/// Success body of `PUT /docs/{id}/complete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub doc: CompletedDoc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedDoc {
    pub signed_file_path: String,
}

/// Success body of `GET /docs/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEnvelope {
    pub doc: DocumentRecord,
}

/// A document as returned by the backend; paths are not yet canonical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub file_path: String,
    #[serde(default)]
    pub signed_file_path: Option<String>,
    #[serde(default)]
    pub signed: bool,
    #[serde(default)]
    pub signatures: Option<Vec<NormalizedPlaceholder>>,
}
