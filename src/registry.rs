//! Explicit registry of the rows currently shown in the list.
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api::EntryApi;
use crate::config::Config;
use crate::error::{StateError, SyncError, TransportError};
use crate::model::{EntryRecord, RowId};
use crate::row::{EntryRow, FieldEdit};
use crate::sync::{RowSynchronizer, SyncState};

/// Maps row identity to its synchronizer. A synchronizer is created with
/// its row and leaves the map when the row is removed; removed rows with a
/// request still outstanding are kept aside until they settle.
pub struct RowRegistry {
    api: Arc<dyn EntryApi>,
    timeout: Duration,
    rows: HashMap<RowId, RowSynchronizer>,
    order: Vec<RowId>,
    retired: Vec<RowSynchronizer>,
}

impl RowRegistry {
    pub fn new(api: Arc<dyn EntryApi>, timeout: Duration) -> Self {
        Self {
            api,
            timeout,
            rows: HashMap::new(),
            order: Vec::new(),
            retired: Vec::new(),
        }
    }

    pub fn from_config(api: Arc<dyn EntryApi>, cfg: &Config) -> Self {
        Self::new(api, cfg.request_timeout())
    }

    /// The "add" action: append an unsynced row dated today.
    pub fn add_row(&mut self) -> RowId {
        self.insert(EntryRow::new())
    }

    /// Append rows for entries the backend already holds. A record whose
    /// duration cannot be transmitted is restored as-is and logged; edits to
    /// that row are rejected until its duration is corrected.
    pub fn restore(&mut self, records: impl IntoIterator<Item = EntryRecord>) -> Vec<RowId> {
        records
            .into_iter()
            .map(|record| {
                let row = EntryRow::from_record(&record);
                if let Err(err) = row.field_values().validate() {
                    warn!(entry = %record.id, %err, "restored entry needs its duration fixed before it can sync");
                }
                self.insert(row)
            })
            .collect()
    }

    /// Rebuild the list from `GET /entry`. Returns the number of rows added.
    pub async fn load(&mut self) -> Result<usize, TransportError> {
        let records = self.api.list().await?;
        let added = self.restore(records).len();
        info!(added, "restored rows from backend");
        Ok(added)
    }

    fn insert(&mut self, row: EntryRow) -> RowId {
        let id = row.id();
        let sync = RowSynchronizer::new(row, Arc::clone(&self.api), self.timeout);
        self.rows.insert(id, sync);
        self.order.push(id);
        debug!(row = %id, "row added");
        id
    }

    pub fn get(&self, id: RowId) -> Option<&RowSynchronizer> {
        self.rows.get(&id)
    }

    pub fn edit(&self, id: RowId, edit: FieldEdit) -> Result<SyncState, SyncError> {
        self.get(id)
            .ok_or(StateError::UnknownRow(id))?
            .edit(edit)
    }

    /// Remove a row from the list; its synchronizer decides whether the
    /// backend must be told.
    pub fn remove(&mut self, id: RowId) -> Result<(), SyncError> {
        self.retired.retain(|sync| sync.status().in_flight);
        let sync = self.rows.remove(&id).ok_or(StateError::UnknownRow(id))?;
        self.order.retain(|row| *row != id);
        sync.on_remove_requested()?;
        if sync.status().in_flight {
            self.retired.push(sync);
        }
        Ok(())
    }

    /// Visible rows in list order.
    pub fn rows(&self) -> impl Iterator<Item = &RowSynchronizer> {
        self.order.iter().filter_map(|id| self.rows.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Removed rows whose last request had not resolved when last checked.
    pub fn pending_removals(&self) -> usize {
        self.retired.len()
    }

    /// Wait until no row, visible or already removed, has a request in flight.
    pub async fn settle(&mut self) {
        join_all(
            self.rows
                .values()
                .chain(self.retired.iter())
                .map(|sync| sync.settled()),
        )
        .await;
        self.retired.retain(|sync| sync.status().in_flight);
    }
}
