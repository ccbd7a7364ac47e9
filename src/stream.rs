//! Snapshot streams: observe the placeholder store as a `Stream`.
//!
//! The store publishes a [`StoreSnapshot`] on every mutation. A rendering
//! layer that lives in async code can consume those as a stream instead of
//! polling a `watch::Receiver` by hand. The first item is always the
//! snapshot current at subscription time; intermediate snapshots may be
//! skipped when the consumer is slower than the producer (only the latest
//! matters for redraws).

use crate::engine::store::StoreSnapshot;
use crate::session::SigningSession;
use futures::StreamExt;
use std::pin::Pin;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::Stream;

/// A boxed stream of store snapshots.
pub type SnapshotStream = Pin<Box<dyn Stream<Item = StoreSnapshot> + Send>>;

/// Signing progress derived from a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigningProgress {
    pub signed: usize,
    pub total: usize,
}

impl SigningProgress {
    /// Every placeholder is signed and there is at least one.
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.signed == self.total
    }
}

impl From<&StoreSnapshot> for SigningProgress {
    fn from(s: &StoreSnapshot) -> Self {
        let total = s.placeholders.len();
        Self {
            signed: total - s.unsigned_count(),
            total,
        }
    }
}

/// Stream every snapshot of `session`'s store.
///
/// # Example
/// ```rust,no_run
/// use docsign::snapshot_stream;
/// use futures::StreamExt;
///
/// # async fn run(session: docsign::SigningSession) {
/// let mut snapshots = snapshot_stream(&session);
/// while let Some(snap) = snapshots.next().await {
///     println!("rev {}: {} marks", snap.revision, snap.placeholders.len());
/// }
/// # }
/// ```
pub fn snapshot_stream(session: &SigningSession) -> SnapshotStream {
    let rx = session.subscribe();
    Box::pin(WatchStream::new(rx))
}

/// Stream signed / total counts, emitting only when they change.
pub fn progress_stream(session: &SigningSession) -> Pin<Box<dyn Stream<Item = SigningProgress> + Send>> {
    let mut last: Option<SigningProgress> = None;
    let s = snapshot_stream(session)
        .map(|snap| SigningProgress::from(&snap))
        .filter(move |p| {
            let changed = last != Some(*p);
            last = Some(*p);
            futures::future::ready(changed)
        });
    Box::pin(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SigningBackend;
    use crate::config::SessionConfig;
    use crate::error::SignError;
    use crate::model::{
        CompletionRequest, CompletionResponse, DocumentRecord, PdfDimensions, Point,
    };
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Offline;

    #[async_trait]
    impl SigningBackend for Offline {
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

    fn session() -> SigningSession {
        let s = SigningSession::from_record(
            SessionConfig::default(),
            Arc::new(Offline),
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
    async fn first_item_is_the_current_snapshot() {
        let s = session();
        s.lock().enter_placement_mode().unwrap();
        let mut stream = snapshot_stream(&s);
        let first = stream.next().await.unwrap();
        assert!(first.placing);
    }

    #[tokio::test]
    async fn progress_reports_changes_only() {
        let s = session();
        let mut progress = progress_stream(&s);
        assert_eq!(
            progress.next().await.unwrap(),
            SigningProgress { signed: 0, total: 0 }
        );

        let id = {
            let mut c = s.lock();
            c.enter_placement_mode().unwrap();
            c.place(Point::new(5.0, 5.0), 1).unwrap()
        };
        assert_eq!(
            progress.next().await.unwrap(),
            SigningProgress { signed: 0, total: 1 }
        );

        {
            let mut c = s.lock();
            c.capture_mut().set_text("Ada");
            c.apply_signature(&id).unwrap();
        }
        let p = progress.next().await.unwrap();
        assert_eq!(p, SigningProgress { signed: 1, total: 1 });
        assert!(p.is_complete());
    }
}
