//! Signature capture: typed text, freehand drawing, or an uploaded image.
//!
//! Each mode produces one canonical [`SignatureArtifact`]:
//!
//! | Mode     | Input                         | Artifact                       |
//! |----------|-------------------------------|--------------------------------|
//! | `Text`   | the literal string typed      | `Text(String)`                 |
//! | `Draw`   | strokes on a drawing surface  | `Image(data:image/png;base64…)`|
//! | `Upload` | a JPEG/PNG file ≤ the limit   | `Image(data:image/png;base64…)`|
//!
//! Drawings and uploads share one representation: uploads are decoded and
//! re-encoded as PNG so the backend only ever sees PNG data URLs.
//!
//! [`SignatureCapture::apply`] is the only path that marks a placeholder as
//! signed.

use crate::config::{SessionConfig, ACCEPTED_IMAGE_MIMES};
use crate::engine::store::PlaceholderStore;
use crate::error::EditError;
use crate::model::{PlaceholderId, Point, SignatureKind};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, warn};

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";
const INK: Rgba<u8> = Rgba([17, 24, 39, 255]);

// ── Artifacts ────────────────────────────────────────────────────────────

/// A base64 PNG data URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload(String);

impl ImagePayload {
    /// Encode an image as a PNG data URL.
    pub fn from_image(img: &DynamicImage) -> Result<Self, image::ImageError> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
        let b64 = STANDARD.encode(&buf);
        debug!("Encoded signature image → {} bytes base64", b64.len());
        Ok(Self(format!("{PNG_DATA_URL_PREFIX}{b64}")))
    }

    /// Decode the payload back into pixels.
    ///
    /// Accepts any `data:<mime>;base64,` prefix (stored marks may predate
    /// PNG normalisation) or bare base64.
    pub fn decode(&self) -> Result<DynamicImage, EditError> {
        let b64 = match self.0.split_once(";base64,") {
            Some((_, data)) => data,
            None => self.0.as_str(),
        };
        let bytes = STANDARD
            .decode(b64.trim())
            .map_err(|e| EditError::ImageDecode(e.to_string()))?;
        image::load_from_memory(&bytes).map_err(|e| EditError::ImageDecode(e.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The canonical payload of a completed signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureArtifact {
    Text(String),
    Image(ImagePayload),
}

impl SignatureArtifact {
    pub fn kind(&self) -> SignatureKind {
        match self {
            SignatureArtifact::Text(_) => SignatureKind::Text,
            SignatureArtifact::Image(_) => SignatureKind::Image,
        }
    }

    /// The string stored in `Placeholder::signature`.
    pub fn into_payload(self) -> String {
        match self {
            SignatureArtifact::Text(s) => s,
            SignatureArtifact::Image(p) => p.0,
        }
    }

    fn from_stored(kind: SignatureKind, payload: &str) -> Self {
        match kind {
            SignatureKind::Text => SignatureArtifact::Text(payload.to_string()),
            SignatureKind::Image => SignatureArtifact::Image(ImagePayload(payload.to_string())),
        }
    }
}

// ── Drawing surface ──────────────────────────────────────────────────────

/// A fixed-size canvas accumulating freehand strokes.
///
/// Editing an image signature resizes the canvas to that image until the
/// next [`clear`](Self::clear).
#[derive(Debug, Clone)]
pub struct DrawingSurface {
    base_width: u32,
    base_height: u32,
    width: u32,
    height: u32,
    stroke_width: f32,
    strokes: Vec<Vec<Point>>,
    drawing: bool,
    background: Option<RgbaImage>,
}

impl DrawingSurface {
    pub fn new(width: u32, height: u32, stroke_width: f32) -> Self {
        Self {
            base_width: width,
            base_height: height,
            width,
            height,
            stroke_width,
            strokes: Vec::new(),
            drawing: false,
            background: None,
        }
    }

    /// Non-finite points are ignored.
    pub fn begin_stroke(&mut self, p: Point) {
        if !is_finite(p) {
            return;
        }
        self.strokes.push(vec![p]);
        self.drawing = true;
    }

    pub fn extend_stroke(&mut self, p: Point) {
        if !self.drawing || !is_finite(p) {
            return;
        }
        if let Some(stroke) = self.strokes.last_mut() {
            stroke.push(p);
        }
    }

    /// Release the pointer. Returns whether the surface holds any ink.
    pub fn end_stroke(&mut self) -> bool {
        self.drawing = false;
        !self.is_empty()
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty() && self.background.is_none()
    }

    pub fn stroke_count(&self) -> usize {
        self.strokes.len()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Drop all ink and restore the configured canvas size.
    pub fn clear(&mut self) {
        self.strokes.clear();
        self.drawing = false;
        self.background = None;
        self.width = self.base_width;
        self.height = self.base_height;
    }

    /// Start from an existing image (editing a drawn signature).
    fn set_background(&mut self, img: RgbaImage) {
        self.width = img.width();
        self.height = img.height();
        self.background = Some(img);
        self.strokes.clear();
        self.drawing = false;
    }

    /// Render the strokes onto a transparent canvas with a round brush.
    pub fn rasterize(&self) -> RgbaImage {
        let mut canvas = self
            .background
            .clone()
            .unwrap_or_else(|| RgbaImage::from_pixel(self.width, self.height, Rgba([0, 0, 0, 0])));
        let radius = f64::from(self.stroke_width) / 2.0;
        let min = Point::new(-radius - 1.0, -radius - 1.0);
        let max = Point::new(
            f64::from(canvas.width()) + radius + 1.0,
            f64::from(canvas.height()) + radius + 1.0,
        );

        for stroke in &self.strokes {
            match stroke.as_slice() {
                [] => {}
                [only] => stamp(&mut canvas, *only, radius),
                points => {
                    for pair in points.windows(2) {
                        // Only the visible part of a segment is interpolated.
                        let Some((a, b)) = clip_segment(pair[0], pair[1], min, max) else {
                            continue;
                        };
                        let len = ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt();
                        let steps = (len / 0.5).ceil().max(1.0) as usize;
                        for i in 0..=steps {
                            let t = i as f64 / steps as f64;
                            stamp(
                                &mut canvas,
                                Point::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t),
                                radius,
                            );
                        }
                    }
                }
            }
        }
        canvas
    }
}

fn is_finite(p: Point) -> bool {
    p.x.is_finite() && p.y.is_finite()
}

/// Liang-Barsky clip of segment `a → b` to the box `min..max`.
fn clip_segment(a: Point, b: Point, min: Point, max: Point) -> Option<(Point, Point)> {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    for (p, q) in [
        (-dx, a.x - min.x),
        (dx, max.x - a.x),
        (-dy, a.y - min.y),
        (dy, max.y - a.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                t0 = t0.max(r);
            } else {
                t1 = t1.min(r);
            }
            if t0 > t1 {
                return None;
            }
        }
    }
    Some((
        Point::new(a.x + dx * t0, a.y + dy * t0),
        Point::new(a.x + dx * t1, a.y + dy * t1),
    ))
}

fn has_ink(img: &RgbaImage) -> bool {
    img.pixels().any(|p| p[3] != 0)
}

fn stamp(canvas: &mut RgbaImage, c: Point, radius: f64) {
    let (w, h) = (canvas.width() as i64, canvas.height() as i64);
    let r2 = radius * radius;
    let x0 = (c.x - radius).floor() as i64;
    let x1 = (c.x + radius).ceil() as i64;
    let y0 = (c.y - radius).floor() as i64;
    let y1 = (c.y + radius).ceil() as i64;
    for y in y0.max(0)..=y1.min(h - 1) {
        for x in x0.max(0)..=x1.min(w - 1) {
            let dx = x as f64 + 0.5 - c.x;
            let dy = y as f64 + 0.5 - c.y;
            if dx * dx + dy * dy <= r2.max(0.25) {
                canvas.put_pixel(x as u32, y as u32, INK);
            }
        }
    }
}

// ── Uploads ──────────────────────────────────────────────────────────────

/// A locally selected file offered to the upload mode.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Read a file from disk, deriving the MIME type from its extension.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            mime: mime_from_extension(path).to_string(),
            name,
            bytes,
        })
    }
}

fn mime_from_extension(path: &Path) -> &'static str {
    match path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

// ── Capture state machine ────────────────────────────────────────────────

/// Which input the capture panel is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureMode {
    #[default]
    Text,
    Draw,
    Upload,
}

/// The signature capture panel.
#[derive(Debug, Clone)]
pub struct SignatureCapture {
    mode: CaptureMode,
    text: String,
    surface: DrawingSurface,
    drawn: Option<ImagePayload>,
    uploaded: Option<ImagePayload>,
    upload_name: Option<String>,
    max_upload_bytes: u64,
}

impl SignatureCapture {
    pub fn new(config: &SessionConfig) -> Self {
        let (w, h) = config.drawing_surface;
        Self {
            mode: CaptureMode::default(),
            text: String::new(),
            surface: DrawingSurface::new(w, h, config.stroke_width),
            drawn: None,
            uploaded: None,
            upload_name: None,
            max_upload_bytes: config.max_upload_bytes,
        }
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: CaptureMode) {
        self.mode = mode;
    }

    // ── Text ─────────────────────────────────────────────────────────────

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    // ── Draw ─────────────────────────────────────────────────────────────

    pub fn surface(&self) -> &DrawingSurface {
        &self.surface
    }

    pub fn begin_stroke(&mut self, p: Point) {
        self.surface.begin_stroke(p);
    }

    pub fn extend_stroke(&mut self, p: Point) {
        self.surface.extend_stroke(p);
    }

    /// Release the pointer and serialize the surface into the pending image.
    pub fn end_stroke(&mut self) -> Result<(), EditError> {
        if !self.surface.end_stroke() {
            self.drawn = None;
            return Ok(());
        }
        let canvas = self.surface.rasterize();
        if !has_ink(&canvas) {
            debug!("Drawing left no visible ink; nothing to apply");
            self.drawn = None;
            return Ok(());
        }
        let img = DynamicImage::ImageRgba8(canvas);
        let payload =
            ImagePayload::from_image(&img).map_err(|e| EditError::ImageDecode(e.to_string()))?;
        self.drawn = Some(payload);
        Ok(())
    }

    /// Reset the drawing surface and discard the pending drawing.
    pub fn clear_drawing(&mut self) {
        self.surface.clear();
        self.drawn = None;
    }

    // ── Upload ───────────────────────────────────────────────────────────

    /// Validate and decode a selected file.
    ///
    /// On rejection the selection is discarded and the error is returned
    /// for display.
    pub fn select_file(&mut self, file: UploadedFile) -> Result<(), EditError> {
        self.uploaded = None;
        self.upload_name = None;

        let mime = file.mime.trim().to_ascii_lowercase();
        if !ACCEPTED_IMAGE_MIMES.contains(&mime.as_str()) {
            warn!("Rejected upload '{}': type {}", file.name, mime);
            return Err(EditError::UnsupportedMime { mime: file.mime });
        }
        let size = file.bytes.len() as u64;
        if size > self.max_upload_bytes {
            warn!("Rejected upload '{}': {} bytes", file.name, size);
            return Err(EditError::FileTooLarge {
                size,
                max: self.max_upload_bytes,
            });
        }

        let img = image::load_from_memory(&file.bytes)
            .map_err(|e| EditError::ImageDecode(e.to_string()))?;
        let payload =
            ImagePayload::from_image(&img).map_err(|e| EditError::ImageDecode(e.to_string()))?;
        debug!("Accepted upload '{}' ({}x{})", file.name, img.width(), img.height());
        self.uploaded = Some(payload);
        self.upload_name = Some(file.name);
        Ok(())
    }

    pub fn upload_name(&self) -> Option<&str> {
        self.upload_name.as_deref()
    }

    // ── Apply / edit ─────────────────────────────────────────────────────

    /// The artifact the current mode would apply, if any.
    pub fn pending_artifact(&self) -> Option<SignatureArtifact> {
        match self.mode {
            CaptureMode::Text => (!self.text.trim().is_empty())
                .then(|| SignatureArtifact::Text(self.text.clone())),
            CaptureMode::Draw => self.drawn.clone().map(SignatureArtifact::Image),
            CaptureMode::Upload => self.uploaded.clone().map(SignatureArtifact::Image),
        }
    }

    /// Attach the pending artifact to a placeholder and reset.
    pub fn apply(
        &mut self,
        store: &mut PlaceholderStore,
        id: &PlaceholderId,
    ) -> Result<SignatureKind, EditError> {
        let artifact = self.pending_artifact().ok_or(EditError::EmptyArtifact)?;
        let kind = artifact.kind();
        store.attach_signature(id, artifact)?;
        self.reset();
        Ok(kind)
    }

    /// Pre-populate the panel from an already signed placeholder.
    pub fn open_for_edit(
        &mut self,
        store: &PlaceholderStore,
        id: &PlaceholderId,
    ) -> Result<(), EditError> {
        let p = store
            .get(id)
            .ok_or_else(|| EditError::UnknownPlaceholder(id.clone()))?;
        self.reset();
        let (Some(kind), Some(payload)) = (p.signature_type(), p.signature()) else {
            return Ok(());
        };
        match SignatureArtifact::from_stored(kind, payload) {
            SignatureArtifact::Text(text) => {
                self.mode = CaptureMode::Text;
                self.text = text;
            }
            SignatureArtifact::Image(img) => {
                self.mode = CaptureMode::Draw;
                self.surface.set_background(img.decode()?.to_rgba8());
                self.drawn = Some(img);
            }
        }
        Ok(())
    }

    /// Clear text, drawing surface and pending image.
    pub fn reset(&mut self) {
        self.text.clear();
        self.surface.clear();
        self.drawn = None;
        self.uploaded = None;
        self.upload_name = None;
    }
}
