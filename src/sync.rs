//! Per-row synchronization state machine.
//!
//! Each row owns at most one request in flight. Edits arriving while a
//! request is outstanding land in a single pending slot (newest wins) and
//! are sent by the continuation of the in-flight request, which always
//! re-reads the row's state before acting on the response.
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::api::EntryApi;
use crate::error::{StateError, SyncError, TransportError};
use crate::model::{Entry, EntryId, EntryPayload, RowId};
use crate::row::{EntryRow, FieldEdit};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No identifier, nothing in flight.
    Unsynced,
    /// Create sent, identifier not yet known.
    CreatePending,
    /// Identifier assigned, nothing in flight.
    Synced,
    /// Identifier assigned, update in flight.
    UpdatePending,
    /// Detached from the list. Terminal.
    Removed,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Unsynced => "unsynced",
            SyncState::CreatePending => "create_pending",
            SyncState::Synced => "synced",
            SyncState::UpdatePending => "update_pending",
            SyncState::Removed => "removed",
        }
    }
}

/// What a view needs to render a row's sync indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStatus {
    pub state: SyncState,
    /// A request for this row has been sent and not yet resolved. Stays set
    /// while a delete for an already removed row is outstanding.
    pub in_flight: bool,
}

#[derive(Debug)]
enum Request {
    Create(EntryPayload),
    Update(EntryId, EntryPayload),
    Delete(EntryId),
}

#[derive(Debug)]
enum Outcome {
    Created(Result<EntryId, TransportError>),
    Updated(EntryId, Result<(), TransportError>),
    Deleted(EntryId, Result<(), TransportError>),
}

struct Slot {
    state: SyncState,
    row: EntryRow,
    /// Latest validated snapshot waiting for the in-flight request.
    queued: Option<EntryPayload>,
    in_flight: bool,
}

struct Shared {
    row_id: RowId,
    slot: Mutex<Slot>,
    api: Arc<dyn EntryApi>,
    timeout: Duration,
    status: watch::Sender<SyncStatus>,
}

/// Observes field changes and removal of one row and keeps the backend in
/// step with it. Cloning yields another handle to the same row.
///
/// Requests are spawned on the ambient tokio runtime, so events must be
/// delivered from within one.
#[derive(Clone)]
pub struct RowSynchronizer {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for RowSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowSynchronizer")
            .field("row", &self.shared.row_id)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl RowSynchronizer {
    /// Rows that already carry an identifier start out `Synced`.
    pub fn new(row: EntryRow, api: Arc<dyn EntryApi>, timeout: Duration) -> Self {
        let state = if row.has_identifier() {
            SyncState::Synced
        } else {
            SyncState::Unsynced
        };
        let (status, _) = watch::channel(SyncStatus {
            state,
            in_flight: false,
        });
        Self {
            shared: Arc::new(Shared {
                row_id: row.id(),
                slot: Mutex::new(Slot {
                    state,
                    row,
                    queued: None,
                    in_flight: false,
                }),
                api,
                timeout,
                status,
            }),
        }
    }

    pub fn row_id(&self) -> RowId {
        self.shared.row_id
    }

    pub fn state(&self) -> SyncState {
        self.shared.lock().state
    }

    pub fn status(&self) -> SyncStatus {
        *self.shared.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.shared.status.subscribe()
    }

    /// Current field values of the row.
    pub fn snapshot(&self) -> Entry {
        self.shared.lock().row.field_values()
    }

    pub fn identifier(&self) -> Option<EntryId> {
        self.shared.lock().row.identifier().cloned()
    }

    pub fn is_attached(&self) -> bool {
        self.shared.lock().row.is_attached()
    }

    /// Apply a user edit to the row, then react to it as a field change.
    /// The edit is kept on the row even when the resulting snapshot fails
    /// validation.
    pub fn edit(&self, edit: FieldEdit) -> Result<SyncState, SyncError> {
        {
            let mut slot = self.shared.lock();
            if slot.state == SyncState::Removed {
                return Err(StateError::RowRemoved(self.row_id()).into());
            }
            slot.row.apply(edit);
        }
        self.on_field_changed()
    }

    #[instrument(skip_all, fields(row = %self.row_id()))]
    pub fn on_field_changed(&self) -> Result<SyncState, SyncError> {
        let mut slot = self.shared.lock();
        if slot.state == SyncState::Removed {
            return Err(StateError::RowRemoved(self.row_id()).into());
        }
        let payload = slot.row.field_values().to_payload().map_err(|err| {
            debug!(%err, "edit not transmitted");
            err
        })?;

        let request = match slot.state {
            SyncState::Unsynced => {
                slot.state = SyncState::CreatePending;
                Some(Request::Create(payload))
            }
            SyncState::Synced => {
                let id = slot
                    .row
                    .identifier()
                    .cloned()
                    .ok_or(StateError::MissingIdentifier(self.row_id()))?;
                slot.state = SyncState::UpdatePending;
                Some(Request::Update(id, payload))
            }
            SyncState::CreatePending | SyncState::UpdatePending => {
                if slot.queued.replace(payload).is_some() {
                    debug!("queued snapshot superseded");
                }
                None
            }
            SyncState::Removed => return Err(StateError::RowRemoved(self.row_id()).into()),
        };

        if let Some(request) = request {
            self.dispatch(&mut slot, request);
        }
        self.shared.publish(&slot);
        Ok(slot.state)
    }

    /// Detach the row. Issues a delete when the backend knows the entry,
    /// or arranges one for when its identifier becomes known.
    #[instrument(skip_all, fields(row = %self.row_id()))]
    pub fn on_remove_requested(&self) -> Result<(), StateError> {
        let mut slot = self.shared.lock();
        let request = match slot.state {
            SyncState::Removed => return Err(StateError::RowRemoved(self.row_id())),
            SyncState::Unsynced => None,
            // The in-flight continuation issues the delete.
            SyncState::CreatePending | SyncState::UpdatePending => {
                slot.queued = None;
                None
            }
            SyncState::Synced => slot.row.identifier().cloned().map(Request::Delete),
        };

        slot.row.remove();
        slot.state = SyncState::Removed;
        if let Some(request) = request {
            self.dispatch(&mut slot, request);
        }
        info!(in_flight = slot.in_flight, "row removed");
        self.shared.publish(&slot);
        Ok(())
    }

    /// Resolves once no request for this row is in flight.
    pub async fn settled(&self) -> SyncStatus {
        let mut rx = self.shared.status.subscribe();
        let settled = match rx.wait_for(|status| !status.in_flight).await {
            Ok(status) => Some(*status),
            Err(_) => None,
        };
        settled.unwrap_or_else(|| self.status())
    }

    fn dispatch(&self, slot: &mut Slot, request: Request) {
        slot.in_flight = true;
        tokio::spawn(drive(Arc::clone(&self.shared), request));
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, slot: &Slot) {
        self.status.send_replace(SyncStatus {
            state: slot.state,
            in_flight: slot.in_flight,
        });
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, TransportError>>,
    ) -> Result<T, TransportError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::TimedOut(self.timeout)),
        }
    }

    async fn send(&self, request: Request) -> Outcome {
        match request {
            Request::Create(payload) => {
                Outcome::Created(self.bounded(self.api.create(&payload)).await)
            }
            Request::Update(id, payload) => {
                let result = self.bounded(self.api.update(&id, &payload)).await;
                Outcome::Updated(id, result)
            }
            Request::Delete(id) => {
                let result = self.bounded(self.api.delete(&id)).await;
                Outcome::Deleted(id, result)
            }
        }
    }

    /// Continuation of a finished request: re-reads the row's state and
    /// returns the next request to send, if any.
    fn complete(&self, outcome: Outcome) -> Option<Request> {
        let mut slot = self.lock();
        let next = match outcome {
            Outcome::Created(Ok(id)) => {
                if let Err(err) = slot.row.assign_identifier(id.clone()) {
                    error!(%err, "create resolved for a row that already has an identifier");
                    slot.row.remove();
                    slot.state = SyncState::Removed;
                    slot.queued = None;
                    None
                } else if slot.state == SyncState::Removed {
                    info!(entry = %id, "row removed while creating; sending compensating delete");
                    Some(Request::Delete(id))
                } else {
                    info!(entry = %id, "entry created");
                    slot.state = SyncState::Synced;
                    follow_up(&mut slot)
                }
            }
            Outcome::Created(Err(err)) => {
                warn!(%err, state = slot.state.as_str(), "create failed");
                if slot.state != SyncState::Removed {
                    slot.state = SyncState::Unsynced;
                    if slot.queued.take().is_some() {
                        debug!("dropping snapshot queued behind failed create");
                    }
                }
                None
            }
            Outcome::Updated(id, result) => {
                match result {
                    Ok(()) => debug!(entry = %id, "entry updated"),
                    Err(err) => warn!(entry = %id, %err, "update failed"),
                }
                if slot.state == SyncState::Removed {
                    Some(Request::Delete(id))
                } else {
                    slot.state = SyncState::Synced;
                    follow_up(&mut slot)
                }
            }
            Outcome::Deleted(id, result) => {
                match result {
                    Ok(()) => info!(entry = %id, "entry deleted"),
                    Err(err) => warn!(entry = %id, %err, "delete failed; entry may remain on the backend"),
                }
                None
            }
        };
        slot.in_flight = next.is_some();
        self.publish(&slot);
        next
    }
}

/// Send the queued snapshot, if any, as an update.
fn follow_up(slot: &mut Slot) -> Option<Request> {
    let payload = slot.queued.take()?;
    let id = slot.row.identifier().cloned()?;
    slot.state = SyncState::UpdatePending;
    Some(Request::Update(id, payload))
}

#[instrument(skip_all, fields(row = %shared.row_id))]
async fn drive(shared: Arc<Shared>, first: Request) {
    let mut next = Some(first);
    while let Some(request) = next {
        debug!(?request, "sending");
        let outcome = shared.send(request).await;
        next = shared.complete(outcome);
    }
}
