//! Screen space ⇄ document space.
//!
//! Placement and dragging stay in screen space; the forward transform runs
//! once per placeholder at finalization so repeated moves never compound
//! rounding error. The inverse runs when previously confirmed marks are
//! loaded back for editing.
//!
//! ```text
//! scaleX = W / w          scaleY = H / h
//! docX   = round(max(0, screenX · scaleX))
//! docY   = round(max(0, H − screenY · scaleY))     top-left → bottom-left
//!
//! screenX = docX / scaleX
//! screenY = (H − docY) / scaleY
//! ```

use crate::error::ValidationError;
use crate::model::{
    clamp_coordinate, NormalizedPlaceholder, PdfDimensions, Placeholder, Point, Viewport,
};

/// A transform pinned to one native page size and one rendered viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateNormalizer {
    pdf: PdfDimensions,
    scale_x: f64,
    scale_y: f64,
}

impl CoordinateNormalizer {
    /// Build the transform, refusing when either side is unknown.
    ///
    /// Missing or degenerate page dimensions yield
    /// [`ValidationError::DimensionsUnavailable`]; a viewport that has not
    /// rendered (or rendered at zero size) yields
    /// [`ValidationError::ViewportNotRendered`].
    pub fn new(
        pdf: Option<PdfDimensions>,
        viewport: Option<Viewport>,
    ) -> Result<Self, ValidationError> {
        let pdf = pdf
            .filter(PdfDimensions::is_valid)
            .ok_or(ValidationError::DimensionsUnavailable)?;
        let viewport = viewport
            .filter(|v| v.width.is_finite() && v.height.is_finite())
            .filter(|v| v.width > 0.0 && v.height > 0.0)
            .ok_or(ValidationError::ViewportNotRendered)?;
        Ok(Self {
            pdf,
            scale_x: pdf.width / viewport.width,
            scale_y: pdf.height / viewport.height,
        })
    }

    pub fn pdf(&self) -> PdfDimensions {
        self.pdf
    }

    /// Screen-space point → rounded document-space point.
    pub fn to_document(&self, p: Point) -> Point {
        Point::new(
            (p.x * self.scale_x).max(0.0).round(),
            (self.pdf.height - p.y * self.scale_y).max(0.0).round(),
        )
    }

    /// Document-space point → screen-space point (clamped non-negative).
    pub fn to_screen(&self, p: Point) -> Point {
        Point::new(
            clamp_coordinate(p.x / self.scale_x),
            clamp_coordinate((self.pdf.height - p.y) / self.scale_y),
        )
    }

    /// Normalize one signed placeholder for submission.
    pub fn normalize(&self, p: &Placeholder) -> Result<NormalizedPlaceholder, ValidationError> {
        let (Some(signature), Some(signature_type)) = (p.signature.clone(), p.signature_type)
        else {
            return Err(ValidationError::Unsigned { count: 1 });
        };
        if !p.signed {
            return Err(ValidationError::Unsigned { count: 1 });
        }
        let doc = self.to_document(p.position());
        Ok(NormalizedPlaceholder {
            id: p.id.clone(),
            x: doc.x,
            y: doc.y,
            page: p.page,
            signature,
            signature_type,
            page_width: self.pdf.width,
            page_height: self.pdf.height,
            width: p.width.map(|w| (w * self.scale_x).round()),
            height: p.height.map(|h| (h * self.scale_y).round()),
        })
    }

    /// Normalize every placeholder, failing if any is unsigned.
    pub fn normalize_all(
        &self,
        placeholders: &[Placeholder],
    ) -> Result<Vec<NormalizedPlaceholder>, ValidationError> {
        let unsigned = placeholders.iter().filter(|p| !p.is_signed()).count();
        if unsigned > 0 {
            return Err(ValidationError::Unsigned { count: unsigned });
        }
        placeholders.iter().map(|p| self.normalize(p)).collect()
    }

    /// Rebuild a locked, signed screen-space placeholder from a stored mark.
    pub(crate) fn denormalize(&self, n: &NormalizedPlaceholder) -> Placeholder {
        let screen = self.to_screen(Point::new(n.x, n.y));
        let mut p = Placeholder::unsigned(n.id.clone(), screen, n.page);
        p.signed = true;
        p.signature = Some(n.signature.clone());
        p.signature_type = Some(n.signature_type);
        p.locked = true;
        p.show_box = false;
        p.width = n.width.map(|w| w / self.scale_x);
        p.height = n.height.map(|h| h / self.scale_y);
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PlaceholderId, SignatureKind};

    fn letter_at_600() -> CoordinateNormalizer {
        CoordinateNormalizer::new(
            Some(PdfDimensions::new(612.0, 792.0)),
            Some(Viewport {
                width: 600.0,
                height: 776.0,
                scale: 600.0 / 612.0,
            }),
        )
        .unwrap()
    }

    #[test]
    fn letter_page_forward_transform() {
        let n = letter_at_600();
        let doc = n.to_document(Point::new(102.0, 51.0));
        assert_eq!(doc, Point::new(104.0, 740.0));
    }

    #[test]
    fn forward_clamps_to_zero() {
        let n = letter_at_600();
        // Below the bottom edge of the page.
        let doc = n.to_document(Point::new(0.0, 900.0));
        assert_eq!(doc.y, 0.0);
    }

    #[test]
    fn round_trip_document_to_screen_and_back() {
        let n = letter_at_600();
        for doc_x in (0..=612).step_by(17) {
            for doc_y in (0..=792).step_by(23) {
                let d = Point::new(doc_x as f64, doc_y as f64);
                let back = n.to_document(n.to_screen(d));
                assert!((back.x - d.x).abs() <= 1.0, "x drifted: {d:?} → {back:?}");
                assert!((back.y - d.y).abs() <= 1.0, "y drifted: {d:?} → {back:?}");
            }
        }
    }

    #[test]
    fn round_trip_screen_to_document_and_back() {
        let n = letter_at_600();
        // One document unit ≈ 0.98 screen units, so ±1 doc unit of rounding
        // maps back to at most ~1 screen unit.
        for sx in [0.0, 12.5, 300.25, 599.0] {
            for sy in [0.0, 51.0, 400.75, 775.0] {
                let s = Point::new(sx, sy);
                let back = n.to_screen(n.to_document(s));
                assert!((back.x - s.x).abs() <= 1.0, "{s:?} → {back:?}");
                assert!((back.y - s.y).abs() <= 1.0, "{s:?} → {back:?}");
            }
        }
    }

    #[test]
    fn missing_dimensions_refused() {
        let err = CoordinateNormalizer::new(
            None,
            Some(Viewport {
                width: 600.0,
                height: 776.0,
                scale: 1.0,
            }),
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::DimensionsUnavailable);
    }

    #[test]
    fn zero_width_viewport_refused() {
        let err = CoordinateNormalizer::new(
            Some(PdfDimensions::new(612.0, 792.0)),
            Some(Viewport {
                width: 0.0,
                height: 776.0,
                scale: 0.0,
            }),
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::ViewportNotRendered);
    }

    #[test]
    fn unsigned_placeholders_are_counted() {
        let n = letter_at_600();
        let ps = vec![
            Placeholder::unsigned(PlaceholderId::from("a"), Point::new(1.0, 1.0), 1),
            Placeholder::unsigned(PlaceholderId::from("b"), Point::new(2.0, 2.0), 1),
        ];
        assert_eq!(
            n.normalize_all(&ps).unwrap_err(),
            ValidationError::Unsigned { count: 2 }
        );
    }

    #[test]
    fn denormalize_locks_and_positions() {
        let n = letter_at_600();
        let stored = NormalizedPlaceholder {
            id: PlaceholderId::from("s1"),
            x: 104.0,
            y: 740.0,
            page: 2,
            signature: "Ada".into(),
            signature_type: SignatureKind::Text,
            page_width: 612.0,
            page_height: 792.0,
            width: Some(153.0),
            height: None,
        };
        let p = n.denormalize(&stored);
        assert!(p.is_locked());
        assert!(p.is_signed());
        assert!(!p.show_box());
        assert_eq!(p.page(), 2);
        assert!((p.position().x - 101.96).abs() < 0.01);
        assert!((p.position().y - 50.95).abs() < 0.01);
        assert_eq!(n.normalize(&p).unwrap().x, 104.0);
        assert_eq!(n.normalize(&p).unwrap().y, 740.0);
        assert_eq!(n.normalize(&p).unwrap().width, Some(153.0));
    }
}
