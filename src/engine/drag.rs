//! Pointer-drag sessions for repositioning placeholders.
//!
//! Drag state is a single slot: at most one placeholder is dragged at a
//! time. Opening a session registers the global pointer-move / pointer-up
//! listeners through a [`PointerListeners`] host; the registration is owned
//! by a guard inside the session, so releasing the pointer, abandoning the
//! drag, or dropping the controller all deregister through the same `Drop`.

use crate::engine::store::PlaceholderStore;
use crate::error::EditError;
use crate::model::{PlaceholderId, Point};
use std::sync::Arc;
use tracing::debug;

/// Host hook for the global pointer listeners a drag needs.
///
/// Both methods run while the session's internal lock is held (for example
/// `detach` fires from `end_drag`, `remove` or `clear_all`). Implementations
/// must not call back into the session; queue the work and return.
pub trait PointerListeners: Send + Sync {
    /// Register pointer-move and pointer-up listeners.
    fn attach(&self);
    /// Deregister them. Called exactly once per `attach`.
    fn detach(&self);
}

/// For hosts that route pointer events without explicit registration.
pub struct NoopListeners;

impl PointerListeners for NoopListeners {
    fn attach(&self) {}
    fn detach(&self) {}
}

struct ListenerGuard {
    host: Arc<dyn PointerListeners>,
}

impl ListenerGuard {
    fn acquire(host: &Arc<dyn PointerListeners>) -> Self {
        host.attach();
        Self {
            host: Arc::clone(host),
        }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.host.detach();
    }
}

struct DragSession {
    id: PlaceholderId,
    pointer_start: Point,
    origin: Point,
    scale: f64,
    _listeners: ListenerGuard,
}

/// Converts pointer drags into placeholder moves.
pub struct DragController {
    host: Arc<dyn PointerListeners>,
    session: Option<DragSession>,
}

impl std::fmt::Debug for DragController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DragController")
            .field("active", &self.session.as_ref().map(|s| &s.id))
            .finish()
    }
}

impl Default for DragController {
    fn default() -> Self {
        Self::new(Arc::new(NoopListeners))
    }
}

impl DragController {
    pub fn new(host: Arc<dyn PointerListeners>) -> Self {
        Self {
            host,
            session: None,
        }
    }

    /// Open a drag session on `id` at `pointer` (container-relative).
    pub fn begin(
        &mut self,
        store: &PlaceholderStore,
        id: &PlaceholderId,
        pointer: Point,
        scale: f64,
    ) -> Result<(), EditError> {
        if self.session.is_some() {
            return Err(EditError::DragInProgress);
        }
        let placeholder = store
            .get(id)
            .ok_or_else(|| EditError::UnknownPlaceholder(id.clone()))?;
        if store.is_read_only() {
            return Err(EditError::ReadOnly);
        }
        if placeholder.is_locked() && !store.is_editing() {
            return Err(EditError::Locked);
        }
        if !(scale.is_finite() && scale > 0.0) {
            return Err(EditError::NotRendered);
        }

        debug!("Drag start {}", id);
        self.session = Some(DragSession {
            id: id.clone(),
            pointer_start: pointer,
            origin: placeholder.position(),
            scale,
            _listeners: ListenerGuard::acquire(&self.host),
        });
        Ok(())
    }

    /// Handle a pointer move. Returns the new position while dragging.
    ///
    /// The position is always `origin + (pointer − start) / scale`, computed
    /// from the drag start rather than accumulated per event.
    pub fn update(
        &mut self,
        store: &mut PlaceholderStore,
        pointer: Point,
    ) -> Result<Option<Point>, EditError> {
        let Some(session) = &self.session else {
            return Ok(None);
        };
        let dx = (pointer.x - session.pointer_start.x) / session.scale;
        let dy = (pointer.y - session.pointer_start.y) / session.scale;
        match store.move_from(&session.id, session.origin, dx, dy) {
            Ok(p) => Ok(Some(p)),
            Err(e) => {
                // Placeholder vanished or became read-only mid-drag.
                self.session = None;
                Err(e)
            }
        }
    }

    /// Handle pointer release. Returns the id that was being dragged.
    pub fn end(&mut self) -> Option<PlaceholderId> {
        let session = self.session.take()?;
        debug!("Drag end {}", session.id);
        Some(session.id)
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn active_id(&self) -> Option<&PlaceholderId> {
        self.session.as_ref().map(|s| &s.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingListeners {
        attached: AtomicUsize,
        detached: AtomicUsize,
    }

    impl PointerListeners for CountingListeners {
        fn attach(&self) {
            self.attached.fetch_add(1, Ordering::SeqCst);
        }
        fn detach(&self) {
            self.detached.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn setup() -> (PlaceholderStore, PlaceholderId) {
        let mut store = PlaceholderStore::new(1);
        store.enter_placement_mode().unwrap();
        let id = store.create(Point::new(40.0, 60.0), 1, 1.0).unwrap();
        (store, id)
    }

    #[test]
    fn drag_uses_absolute_delta_divided_by_scale() {
        let (mut store, id) = setup();
        let mut drag = DragController::default();
        let scale = 0.8;
        drag.begin(&store, &id, Point::new(100.0, 100.0), scale).unwrap();

        // Many intermediate events must not accumulate error.
        for i in 1..=50 {
            let step = i as f64 * 0.37;
            drag.update(&mut store, Point::new(100.0 + step, 100.0 - step))
                .unwrap();
        }
        let p = drag
            .update(&mut store, Point::new(124.0, 92.0))
            .unwrap()
            .unwrap();
        assert!((p.x - (40.0 + 24.0 / scale)).abs() < 1e-9);
        assert!((p.y - (60.0 - 8.0 / scale)).abs() < 1e-9);
        assert_eq!(drag.end(), Some(id));
    }

    #[test]
    fn second_drag_is_refused() {
        let (mut store, a) = setup();
        store.enter_placement_mode().unwrap();
        let b = store.create(Point::new(1.0, 1.0), 1, 1.0).unwrap();
        let mut drag = DragController::default();
        drag.begin(&store, &a, Point::new(0.0, 0.0), 1.0).unwrap();
        assert_eq!(
            drag.begin(&store, &b, Point::new(0.0, 0.0), 1.0).unwrap_err(),
            EditError::DragInProgress
        );
        assert_eq!(drag.active_id(), Some(&a));
    }

    #[test]
    fn listeners_are_released_on_end_and_on_teardown() {
        let (store, id) = setup();
        let host = Arc::new(CountingListeners::default());
        let mut drag = DragController::new(host.clone());

        for _ in 0..3 {
            drag.begin(&store, &id, Point::new(0.0, 0.0), 1.0).unwrap();
            drag.end();
        }
        assert_eq!(host.attached.load(Ordering::SeqCst), 3);
        assert_eq!(host.detached.load(Ordering::SeqCst), 3);

        drag.begin(&store, &id, Point::new(0.0, 0.0), 1.0).unwrap();
        drop(drag);
        assert_eq!(host.attached.load(Ordering::SeqCst), 4);
        assert_eq!(host.detached.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn removed_placeholder_ends_the_session() {
        let (mut store, id) = setup();
        let host = Arc::new(CountingListeners::default());
        let mut drag = DragController::new(host.clone());
        drag.begin(&store, &id, Point::new(0.0, 0.0), 1.0).unwrap();
        store.remove(&id).unwrap();
        assert!(drag.update(&mut store, Point::new(5.0, 5.0)).is_err());
        assert!(!drag.is_active());
        assert_eq!(host.detached.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn update_without_session_is_a_no_op() {
        let (mut store, _) = setup();
        let mut drag = DragController::default();
        assert_eq!(drag.update(&mut store, Point::new(1.0, 1.0)).unwrap(), None);
        assert_eq!(drag.end(), None);
    }
}
