//! Playlist
//!
//! Ordered list of segments plus the cursor of the current entry. Every
//! mutation is persisted as a JSON document and announced on a change
//! channel; the scheduler subscribes to re-arm when the live entry's offsets
//! are edited.

use crate::error::{Error, Result};
use segloop_common::db::{load_json, store_json, KeyValueStore, PLAYLIST_KEY};
use segloop_common::events::{EventBus, SegloopEvent};
use segloop_common::models::{PlaylistDocument, PlaylistEntry};
use segloop_common::{Segment, SegmentId};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

/// Change notifications
#[derive(Debug, Clone, PartialEq)]
pub enum PlaylistChange {
    Added(SegmentId),
    /// Offsets of an existing entry were edited
    Updated(Segment),
    Removed(SegmentId),
    CursorMoved(Option<SegmentId>),
    /// A subscriber fell behind and missed changes; re-read the playlist
    Resync,
}

pub struct Playlist {
    doc: RwLock<PlaylistDocument>,
    store: Arc<dyn KeyValueStore>,
    changes: broadcast::Sender<PlaylistChange>,
    event_bus: EventBus,
}

impl Playlist {
    /// Empty playlist
    pub fn new(store: Arc<dyn KeyValueStore>, event_bus: EventBus) -> Self {
        Self::with_document(PlaylistDocument::default(), store, event_bus)
    }

    /// Restore the persisted playlist
    ///
    /// A missing or corrupt document yields an empty playlist.
    pub async fn restore(store: Arc<dyn KeyValueStore>, event_bus: EventBus) -> Self {
        let doc = match load_json::<PlaylistDocument>(store.as_ref(), PLAYLIST_KEY).await {
            Ok(Some(mut doc)) => {
                doc.entries.retain(|e| match e.segment.validate() {
                    Ok(()) => true,
                    Err(err) => {
                        warn!("Dropping invalid playlist entry {}: {}", e.segment.id, err);
                        false
                    }
                });
                if let Some(current) = doc.current_id {
                    if !doc.entries.iter().any(|e| e.segment.id == current) {
                        doc.current_id = None;
                    }
                }
                info!("Restored playlist with {} entries", doc.entries.len());
                doc
            }
            Ok(None) => PlaylistDocument::default(),
            Err(e) => {
                warn!("Stored playlist unreadable, starting empty: {}", e);
                PlaylistDocument::default()
            }
        };
        Self::with_document(doc, store, event_bus)
    }

    fn with_document(doc: PlaylistDocument, store: Arc<dyn KeyValueStore>, event_bus: EventBus) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            doc: RwLock::new(doc),
            store,
            changes,
            event_bus,
        }
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<PlaylistChange> {
        self.changes.subscribe()
    }

    pub async fn entries(&self) -> Vec<PlaylistEntry> {
        self.doc.read().await.entries.clone()
    }

    pub async fn len(&self) -> usize {
        self.doc.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.doc.read().await.entries.is_empty()
    }

    pub async fn get(&self, id: SegmentId) -> Option<PlaylistEntry> {
        self.doc.read().await.entries.iter().find(|e| e.segment.id == id).cloned()
    }

    pub async fn current_id(&self) -> Option<SegmentId> {
        self.doc.read().await.current_id
    }

    /// The entry under the cursor
    pub async fn current_entry(&self) -> Option<Segment> {
        let doc = self.doc.read().await;
        let current = doc.current_id?;
        doc.entries
            .iter()
            .find(|e| e.segment.id == current)
            .map(|e| e.segment.clone())
    }

    /// Entry following `after_id`, wrapping past the end
    ///
    /// Entries flagged as failed are skipped. An unknown `after_id` starts
    /// from the top. Returns `None` when no playable entry exists.
    pub async fn next_entry(&self, after_id: SegmentId) -> Option<Segment> {
        let doc = self.doc.read().await;
        let n = doc.entries.len();
        if n == 0 {
            return None;
        }
        let start = match doc.entries.iter().position(|e| e.segment.id == after_id) {
            Some(idx) => idx + 1,
            None => 0,
        };
        (0..n)
            .map(|k| &doc.entries[(start + k) % n])
            .find(|e| !e.failed)
            .map(|e| e.segment.clone())
    }

    /// Move the cursor
    pub async fn set_current(&self, id: Option<SegmentId>) -> Result<()> {
        {
            let mut doc = self.doc.write().await;
            if let Some(id) = id {
                if !doc.entries.iter().any(|e| e.segment.id == id) {
                    return Err(Error::NotFound(format!("segment {}", id)));
                }
            }
            if doc.current_id == id {
                return Ok(());
            }
            doc.current_id = id;
        }
        debug!("Playlist cursor moved to {:?}", id);
        self.commit(PlaylistChange::CursorMoved(id)).await;
        Ok(())
    }

    /// Append a segment
    pub async fn add(&self, segment: Segment) -> Result<()> {
        segment.validate()?;
        let id = segment.id;
        {
            let mut doc = self.doc.write().await;
            if doc.entries.iter().any(|e| e.segment.id == id) {
                return Err(Error::BadRequest(format!("segment {} already in playlist", id)));
            }
            doc.entries.push(PlaylistEntry {
                segment,
                failed: false,
            });
        }
        info!("Added segment {} to playlist", id);
        self.commit(PlaylistChange::Added(id)).await;
        Ok(())
    }

    /// Edit the offsets of an entry
    pub async fn update_offsets(&self, id: SegmentId, start: Option<f64>, end: Option<f64>) -> Result<Segment> {
        let updated = {
            let mut doc = self.doc.write().await;
            let entry = doc
                .entries
                .iter_mut()
                .find(|e| e.segment.id == id)
                .ok_or_else(|| Error::NotFound(format!("segment {}", id)))?;

            let mut candidate = entry.segment.clone();
            candidate.start_offset_seconds = start;
            candidate.end_offset_seconds = end;
            candidate.validate()?;

            entry.segment = candidate.clone();
            candidate
        };
        info!("Updated offsets of segment {}: {:?}..{:?}", id, start, end);
        self.commit(PlaylistChange::Updated(updated.clone())).await;
        Ok(updated)
    }

    /// Remove an entry; the cursor is cleared if it pointed at it
    pub async fn remove(&self, id: SegmentId) -> Result<()> {
        {
            let mut doc = self.doc.write().await;
            let before = doc.entries.len();
            doc.entries.retain(|e| e.segment.id != id);
            if doc.entries.len() == before {
                return Err(Error::NotFound(format!("segment {}", id)));
            }
            if doc.current_id == Some(id) {
                doc.current_id = None;
            }
        }
        info!("Removed segment {} from playlist", id);
        self.commit(PlaylistChange::Removed(id)).await;
        Ok(())
    }

    /// Set or clear the permanent-failure flag
    pub async fn set_failed(&self, id: SegmentId, failed: bool) {
        let changed = {
            let mut doc = self.doc.write().await;
            match doc.entries.iter_mut().find(|e| e.segment.id == id) {
                Some(entry) if entry.failed != failed => {
                    entry.failed = failed;
                    true
                }
                _ => false,
            }
        };
        if changed {
            self.persist().await;
            self.announce().await;
        }
    }

    pub async fn is_failed(&self, id: SegmentId) -> bool {
        self.get(id).await.map(|e| e.failed).unwrap_or(false)
    }

    async fn commit(&self, change: PlaylistChange) {
        self.persist().await;
        let _ = self.changes.send(change);
        self.announce().await;
    }

    async fn persist(&self) {
        let doc = self.doc.read().await.clone();
        if let Err(e) = store_json(self.store.as_ref(), PLAYLIST_KEY, &doc).await {
            warn!("Failed to persist playlist: {}", e);
        }
    }

    async fn announce(&self) {
        let (entry_count, current_id) = {
            let doc = self.doc.read().await;
            (doc.entries.len(), doc.current_id)
        };
        self.event_bus.emit_lossy(SegloopEvent::PlaylistChanged {
            entry_count,
            current_id,
            timestamp: chrono::Utc::now(),
        });
    }
}
