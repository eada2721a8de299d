//! Process-local record store.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::button::{DownloadButton, NewButton};
use crate::error::{Error, Result};
use crate::types::ButtonId;

use super::RecordStore;

/// Record store that keeps committed buttons in memory
///
/// Commits store a snapshot, so uncommitted changes to a fetched button are
/// invisible to later queries, the same as with [`Database`](super::Database).
#[derive(Debug)]
pub struct MemoryRecordStore {
    buttons: DashMap<ButtonId, DownloadButton>,
    next_id: AtomicI64,
}

impl MemoryRecordStore {
    /// Empty store; identities start at 1
    pub fn new() -> Self {
        Self {
            buttons: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    /// Number of stored buttons
    pub fn len(&self) -> usize {
        self.buttons.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.buttons.is_empty()
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn add(&self, new: &NewButton) -> Result<ButtonId> {
        let id = ButtonId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.buttons
            .insert(id, DownloadButton::from_new(id, new.clone()));
        Ok(id)
    }

    async fn commit(&self, button: &DownloadButton) -> Result<()> {
        let mut entry = self
            .buttons
            .get_mut(&button.id())
            .ok_or_else(|| Error::UnknownEntity {
                id: button.id(),
                cls: button.class_name().to_string(),
            })?;

        let mut snapshot = button.clone();
        snapshot.clear_transient_downloads();
        *entry = snapshot;
        Ok(())
    }

    async fn query_by_id(&self, id: ButtonId) -> Result<Option<DownloadButton>> {
        Ok(self.buttons.get(&id).map(|entry| entry.value().clone()))
    }

    async fn query_by_key(
        &self,
        class_name: &str,
        lookup_key: &str,
    ) -> Result<Option<DownloadButton>> {
        Ok(self
            .buttons
            .iter()
            .find(|entry| {
                entry.class_name() == class_name && entry.lookup_key() == Some(lookup_key)
            })
            .map(|entry| entry.value().clone()))
    }

    async fn delete(&self, id: ButtonId) -> Result<bool> {
        Ok(self.buttons.remove(&id).is_some())
    }
}
