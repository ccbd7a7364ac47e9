//! The placeholder store: the single owner of placeholder data.
//!
//! Every mutation goes through a method here and publishes a fresh
//! [`StoreSnapshot`] on a `tokio::sync::watch` channel, so a rendering layer
//! subscribes to snapshots instead of holding state of its own.
//!
//! Placement and dragging operate in screen space. Coordinates are only
//! rewritten into document space when a finalization is confirmed
//! ([`PlaceholderStore::commit_confirmed`]), and back into screen space when
//! the confirmed marks are re-opened for editing
//! ([`PlaceholderStore::load_from_server`]).

use crate::engine::capture::SignatureArtifact;
use crate::engine::normalize::CoordinateNormalizer;
use crate::error::EditError;
use crate::model::{CoordinateSpace, NormalizedPlaceholder, Placeholder, PlaceholderId, Point};
use serde::Serialize;
use tokio::sync::watch;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Immutable view of the store published after every mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    /// Incremented on every published change.
    pub revision: u64,
    pub placeholders: Vec<Placeholder>,
    /// Placement mode: the next click on the page creates a placeholder.
    pub placing: bool,
    /// Confirmed document outside edit mode.
    pub read_only: bool,
    /// Previously confirmed marks re-opened for changes.
    pub editing: bool,
    pub space: CoordinateSpace,
}

impl StoreSnapshot {
    pub fn unsigned_count(&self) -> usize {
        self.placeholders.iter().filter(|p| !p.is_signed()).count()
    }

    /// Whether the "clear all" action should be enabled.
    pub fn can_clear(&self) -> bool {
        !self.read_only && !self.placeholders.is_empty()
    }
}

/// Ordered collection of placeholders with create / move / remove / sign.
#[derive(Debug)]
pub struct PlaceholderStore {
    items: Vec<Placeholder>,
    num_pages: u32,
    placing: bool,
    read_only: bool,
    editing: bool,
    space: CoordinateSpace,
    revision: u64,
    tx: watch::Sender<StoreSnapshot>,
}

impl PlaceholderStore {
    pub fn new(num_pages: u32) -> Self {
        let (tx, _rx) = watch::channel(StoreSnapshot {
            revision: 0,
            placeholders: Vec::new(),
            placing: false,
            read_only: false,
            editing: false,
            space: CoordinateSpace::Screen,
        });
        Self {
            items: Vec::new(),
            num_pages,
            placing: false,
            read_only: false,
            editing: false,
            space: CoordinateSpace::Screen,
            revision: 0,
            tx,
        }
    }

    // ── Observation ──────────────────────────────────────────────────────

    /// Receive every future snapshot (the current one is marked seen).
    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            revision: self.revision,
            placeholders: self.items.clone(),
            placing: self.placing,
            read_only: self.read_only,
            editing: self.editing,
            space: self.space,
        }
    }

    fn publish(&mut self) {
        self.revision += 1;
        let snapshot = self.snapshot();
        self.tx.send_replace(snapshot);
    }

    // ── Queries ──────────────────────────────────────────────────────────

    pub fn placeholders(&self) -> &[Placeholder] {
        &self.items
    }

    pub fn get(&self, id: &PlaceholderId) -> Option<&Placeholder> {
        self.items.iter().find(|p| &p.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn unsigned_count(&self) -> usize {
        self.items.iter().filter(|p| !p.is_signed()).count()
    }

    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    pub fn is_placing(&self) -> bool {
        self.placing
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn space(&self) -> CoordinateSpace {
        self.space
    }

    pub fn can_clear(&self) -> bool {
        !self.read_only && !self.items.is_empty()
    }

    // ── Mode changes ─────────────────────────────────────────────────────

    /// Update the page count, dropping placeholders on pages that no
    /// longer exist. Returns the ids that were dropped.
    pub fn set_page_count(&mut self, num_pages: u32) -> Vec<PlaceholderId> {
        self.num_pages = num_pages;
        let mut dropped = Vec::new();
        self.items.retain(|p| {
            let keep = (1..=num_pages).contains(&p.page);
            if !keep {
                warn!("Dropping {} on page {} (document has {} pages)", p.id, p.page, num_pages);
                dropped.push(p.id.clone());
            }
            keep
        });
        if !dropped.is_empty() {
            self.publish();
        }
        dropped
    }

    /// Arm placement mode: the next `create` adds one placeholder.
    pub fn enter_placement_mode(&mut self) -> Result<(), EditError> {
        if self.read_only {
            return Err(EditError::ReadOnly);
        }
        if !self.placing {
            self.placing = true;
            self.publish();
        }
        Ok(())
    }

    pub fn cancel_placement_mode(&mut self) {
        if self.placing {
            self.placing = false;
            self.publish();
        }
    }

    // ── Mutations ────────────────────────────────────────────────────────

    /// Create an unsigned placeholder from a placement click.
    ///
    /// `pointer` is relative to the rendering container; it is divided by
    /// `scale` and clamped to be non-negative. Placement mode is single-shot
    /// and is left after one successful placement.
    pub fn create(
        &mut self,
        pointer: Point,
        page: u32,
        scale: f64,
    ) -> Result<PlaceholderId, EditError> {
        if self.read_only {
            return Err(EditError::ReadOnly);
        }
        if !self.placing {
            return Err(EditError::PlacementInactive);
        }
        if page == 0 || page > self.num_pages {
            return Err(EditError::PageOutOfRange {
                page,
                total: self.num_pages,
            });
        }
        if !(scale.is_finite() && scale > 0.0) {
            return Err(EditError::NotRendered);
        }

        let id = PlaceholderId::generate();
        let position = Point::new(pointer.x / scale, pointer.y / scale);
        let placeholder = Placeholder::unsigned(id.clone(), position, page);
        debug!(
            "Placed {} on page {} at ({:.1}, {:.1})",
            id, page, placeholder.x, placeholder.y
        );
        self.items.push(placeholder);
        self.placing = false;
        self.publish();
        Ok(id)
    }

    /// Remove one placeholder. Returns whether anything was removed.
    pub fn remove(&mut self, id: &PlaceholderId) -> Result<bool, EditError> {
        let Some(idx) = self.index_of(id) else {
            return Ok(false);
        };
        self.ensure_mutable(idx)?;
        self.items.remove(idx);
        self.publish();
        Ok(true)
    }

    /// Remove every placeholder. Returns how many were removed.
    pub fn clear_all(&mut self) -> Result<usize, EditError> {
        if self.read_only {
            return Err(EditError::ReadOnly);
        }
        if self.items.is_empty() {
            return Ok(0);
        }
        let removed = self.items.len();
        self.items.clear();
        self.publish();
        Ok(removed)
    }

    /// Add a screen-space delta to the current position.
    pub fn move_by(&mut self, id: &PlaceholderId, dx: f64, dy: f64) -> Result<Point, EditError> {
        let idx = self.mutable_index(id)?;
        let current = self.items[idx].position();
        self.items[idx].set_position(Point::new(current.x + dx, current.y + dy));
        let moved = self.items[idx].position();
        self.publish();
        Ok(moved)
    }

    /// Place at `origin + (dx, dy)`; the drag controller passes the
    /// absolute delta from drag start so per-event rounding never drifts.
    pub fn move_from(
        &mut self,
        id: &PlaceholderId,
        origin: Point,
        dx: f64,
        dy: f64,
    ) -> Result<Point, EditError> {
        let idx = self.mutable_index(id)?;
        self.items[idx].set_position(Point::new(origin.x + dx, origin.y + dy));
        let moved = self.items[idx].position();
        self.publish();
        Ok(moved)
    }

    /// Set the screen-space box size of a placeholder.
    pub fn resize(&mut self, id: &PlaceholderId, width: f64, height: f64) -> Result<(), EditError> {
        let idx = self.mutable_index(id)?;
        let valid = |v: f64| v.is_finite() && v > 0.0;
        let p = &mut self.items[idx];
        p.width = valid(width).then_some(width);
        p.height = valid(height).then_some(height);
        self.publish();
        Ok(())
    }

    /// Attach a signature artifact. Only the capture apply step calls this.
    pub(crate) fn attach_signature(
        &mut self,
        id: &PlaceholderId,
        artifact: SignatureArtifact,
    ) -> Result<(), EditError> {
        let idx = self.mutable_index(id)?;
        let p = &mut self.items[idx];
        p.signature_type = Some(artifact.kind());
        p.signature = Some(artifact.into_payload());
        p.signed = true;
        p.show_box = false;
        debug!("Signed {}", id);
        self.publish();
        Ok(())
    }

    /// Re-open confirmed marks for editing.
    ///
    /// Stored document-space marks are converted to screen space for the
    /// current viewport, marked `locked`, and the store becomes mutable
    /// again in edit mode.
    ///
    /// Every mark must sit on a page of the loaded document and carry a
    /// unique id; otherwise nothing is loaded and the store is unchanged.
    pub fn load_from_server(
        &mut self,
        stored: &[NormalizedPlaceholder],
        normalizer: &CoordinateNormalizer,
    ) -> Result<(), EditError> {
        let mut seen = HashSet::new();
        for n in stored {
            if !(1..=self.num_pages).contains(&n.page) {
                return Err(EditError::PageOutOfRange {
                    page: n.page,
                    total: self.num_pages,
                });
            }
            if !seen.insert(&n.id) {
                return Err(EditError::DuplicateId(n.id.clone()));
            }
        }

        self.items = stored.iter().map(|n| normalizer.denormalize(n)).collect();
        self.read_only = false;
        self.editing = true;
        self.placing = false;
        self.space = CoordinateSpace::Screen;
        debug!("Loaded {} stored marks for editing", self.items.len());
        self.publish();
        Ok(())
    }

    /// Rewrite every placeholder into document space and lock the store.
    ///
    /// `normalized` must be the list that was submitted, in store order.
    pub(crate) fn commit_confirmed(&mut self, normalized: &[NormalizedPlaceholder]) {
        for p in self.items.iter_mut() {
            if let Some(n) = normalized.iter().find(|n| n.id == p.id) {
                p.x = n.x;
                p.y = n.y;
                p.width = n.width;
                p.height = n.height;
            }
            p.locked = true;
        }
        self.read_only = true;
        self.editing = false;
        self.placing = false;
        self.space = CoordinateSpace::Document;
        self.publish();
    }

    /// Mark the store read-only without touching its contents.
    pub(crate) fn set_read_only(&mut self, read_only: bool) {
        if self.read_only != read_only {
            self.read_only = read_only;
            if read_only {
                self.placing = false;
            }
            self.publish();
        }
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    fn index_of(&self, id: &PlaceholderId) -> Option<usize> {
        self.items.iter().position(|p| &p.id == id)
    }

    fn mutable_index(&self, id: &PlaceholderId) -> Result<usize, EditError> {
        let idx = self
            .index_of(id)
            .ok_or_else(|| EditError::UnknownPlaceholder(id.clone()))?;
        self.ensure_mutable(idx)?;
        Ok(idx)
    }

    fn ensure_mutable(&self, idx: usize) -> Result<(), EditError> {
        if self.read_only {
            return Err(EditError::ReadOnly);
        }
        if self.items[idx].locked && !self.editing {
            return Err(EditError::Locked);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SignatureKind;

    fn place(store: &mut PlaceholderStore, x: f64, y: f64) -> PlaceholderId {
        store.enter_placement_mode().unwrap();
        store.create(Point::new(x, y), 1, 1.0).unwrap()
    }

    #[test]
    fn create_divides_by_scale_and_leaves_placement_mode() {
        let mut store = PlaceholderStore::new(3);
        store.enter_placement_mode().unwrap();
        let scale = 600.0 / 612.0;
        let id = store.create(Point::new(100.0, 50.0), 1, scale).unwrap();

        let p = store.get(&id).unwrap();
        assert!((p.position().x - 102.0).abs() < 1e-9);
        assert!((p.position().y - 51.0).abs() < 1e-9);
        assert!(!p.is_signed());
        assert!(p.show_box());
        assert!(!store.is_placing());

        let err = store.create(Point::new(1.0, 1.0), 1, scale).unwrap_err();
        assert_eq!(err, EditError::PlacementInactive);
    }

    #[test]
    fn create_clamps_negative_pointer() {
        let mut store = PlaceholderStore::new(1);
        for (x, y) in [(-10.0, 5.0), (5.0, -0.1), (-1e9, -1e9), (f64::NAN, 3.0)] {
            store.enter_placement_mode().unwrap();
            let id = store.create(Point::new(x, y), 1, 0.75).unwrap();
            let p = store.get(&id).unwrap().position();
            assert!(p.x >= 0.0 && p.y >= 0.0, "({x}, {y}) → {p:?}");
        }
    }

    #[test]
    fn create_rejects_page_out_of_range() {
        let mut store = PlaceholderStore::new(2);
        store.enter_placement_mode().unwrap();
        assert_eq!(
            store.create(Point::new(1.0, 1.0), 3, 1.0).unwrap_err(),
            EditError::PageOutOfRange { page: 3, total: 2 }
        );
        assert_eq!(
            store.create(Point::new(1.0, 1.0), 0, 1.0).unwrap_err(),
            EditError::PageOutOfRange { page: 0, total: 2 }
        );
        assert!(store.is_placing(), "failed placement keeps placement mode armed");
    }

    #[test]
    fn remove_is_idempotent() {
        let mut store = PlaceholderStore::new(1);
        let id = place(&mut store, 10.0, 10.0);
        assert!(store.remove(&id).unwrap());
        assert!(!store.remove(&id).unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn clear_all_empties_and_reports_count() {
        let mut store = PlaceholderStore::new(1);
        place(&mut store, 1.0, 1.0);
        place(&mut store, 2.0, 2.0);
        assert!(store.can_clear());
        assert_eq!(store.clear_all().unwrap(), 2);
        assert!(!store.can_clear());
        assert_eq!(store.clear_all().unwrap(), 0);
    }

    #[test]
    fn move_by_clamps_at_origin() {
        let mut store = PlaceholderStore::new(1);
        let id = place(&mut store, 10.0, 10.0);
        let p = store.move_by(&id, -50.0, 5.0).unwrap();
        assert_eq!(p, Point::new(0.0, 15.0));
    }

    #[test]
    fn attach_signature_flips_flags() {
        let mut store = PlaceholderStore::new(1);
        let id = place(&mut store, 10.0, 10.0);
        store
            .attach_signature(&id, SignatureArtifact::Text("Ada".into()))
            .unwrap();
        let p = store.get(&id).unwrap();
        assert!(p.is_signed());
        assert!(!p.show_box());
        assert_eq!(p.signature(), Some("Ada"));
        assert_eq!(p.signature_type(), Some(SignatureKind::Text));
        assert_eq!(store.unsigned_count(), 0);
    }

    #[test]
    fn read_only_store_refuses_edits() {
        let mut store = PlaceholderStore::new(1);
        let id = place(&mut store, 10.0, 10.0);
        store.set_read_only(true);
        assert_eq!(store.move_by(&id, 1.0, 1.0).unwrap_err(), EditError::ReadOnly);
        assert_eq!(store.clear_all().unwrap_err(), EditError::ReadOnly);
        assert_eq!(store.enter_placement_mode().unwrap_err(), EditError::ReadOnly);
        assert!(!store.can_clear());
    }

    fn stored(id: &str, page: u32) -> NormalizedPlaceholder {
        NormalizedPlaceholder {
            id: PlaceholderId::from(id),
            x: 100.0,
            y: 700.0,
            page,
            signature: "Ada".into(),
            signature_type: SignatureKind::Text,
            page_width: 612.0,
            page_height: 792.0,
            width: None,
            height: None,
        }
    }

    fn normalizer() -> CoordinateNormalizer {
        CoordinateNormalizer::new(
            Some(crate::model::PdfDimensions::new(612.0, 792.0)),
            Some(crate::model::Viewport {
                width: 612.0,
                height: 792.0,
                scale: 1.0,
            }),
        )
        .unwrap()
    }

    #[test]
    fn load_rejects_marks_outside_the_document() {
        let mut store = PlaceholderStore::new(2);
        let id = place(&mut store, 1.0, 1.0);
        for page in [0, 9] {
            let err = store
                .load_from_server(&[stored("a", 1), stored("b", page)], &normalizer())
                .unwrap_err();
            assert_eq!(err, EditError::PageOutOfRange { page, total: 2 });
        }
        assert_eq!(store.len(), 1);
        assert!(store.get(&id).is_some());
        assert!(!store.is_editing());
    }

    #[test]
    fn load_rejects_duplicate_ids() {
        let mut store = PlaceholderStore::new(2);
        let err = store
            .load_from_server(&[stored("x", 1), stored("x", 2)], &normalizer())
            .unwrap_err();
        assert_eq!(err, EditError::DuplicateId(PlaceholderId::from("x")));
        assert!(store.is_empty());
    }

    #[test]
    fn load_accepts_valid_marks() {
        let mut store = PlaceholderStore::new(2);
        store
            .load_from_server(&[stored("a", 1), stored("b", 2)], &normalizer())
            .unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.is_editing());
        assert!(store.placeholders().iter().all(|p| p.is_locked()));
    }

    #[test]
    fn shrinking_page_count_drops_orphaned_marks() {
        let mut store = PlaceholderStore::new(3);
        let keep = place(&mut store, 1.0, 1.0);
        store.enter_placement_mode().unwrap();
        let gone = store.create(Point::new(2.0, 2.0), 3, 1.0).unwrap();

        assert_eq!(store.set_page_count(2), vec![gone]);
        assert_eq!(store.len(), 1);
        assert!(store.get(&keep).is_some());
        assert!(store.set_page_count(5).is_empty());
    }

    #[test]
    fn snapshots_are_published_on_mutation() {
        let mut store = PlaceholderStore::new(1);
        let mut rx = store.subscribe();
        let id = place(&mut store, 4.0, 8.0);
        assert!(rx.has_changed().unwrap());
        let snap = rx.borrow_and_update().clone();
        assert_eq!(snap.placeholders.len(), 1);
        assert_eq!(snap.placeholders[0].id(), &id);
        assert_eq!(snap.unsigned_count(), 1);
        assert!(snap.revision >= 2);
    }
}
