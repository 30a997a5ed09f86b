#![allow(dead_code)]
use async_trait::async_trait;
use chrono::NaiveDate;
use hefti::api::EntryApi;
use hefti::error::TransportError;
use hefti::model::{EntryId, EntryPayload, EntryRecord, EntryType};
use reqwest::StatusCode;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};

pub const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create(EntryPayload),
    Update(EntryId, EntryPayload),
    Delete(EntryId),
}

/// In-memory backend that records every call in order. Calls can be held
/// open with `hold()` and failed with the `fail_next_*`/`script_create`
/// helpers.
#[derive(Clone, Default)]
pub struct RecordingApi {
    calls: Arc<Mutex<Vec<Call>>>,
    create_responses: Arc<Mutex<VecDeque<Result<EntryId, TransportError>>>>,
    update_failures: Arc<Mutex<usize>>,
    delete_failures: Arc<Mutex<usize>>,
    holds: Arc<Mutex<VecDeque<oneshot::Receiver<()>>>>,
    store: Arc<Mutex<BTreeMap<String, EntryPayload>>>,
    issued: Arc<Mutex<HashSet<EntryId>>>,
    violations: Arc<Mutex<Vec<String>>>,
    next_id: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub fn server_error() -> TransportError {
    TransportError::Status {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: "boom".into(),
    }
}

pub fn payload(title: &str, hours: f64) -> EntryPayload {
    EntryPayload {
        title: title.into(),
        logdate: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
        entry_type: EntryType::BetrieblicheTaetigkeit,
        spend_time: hours,
    }
}

pub fn record(id: &str, p: &EntryPayload) -> EntryRecord {
    EntryRecord {
        id: EntryId::new(id),
        title: p.title.clone(),
        description: None,
        spend_time: p.spend_time,
        logdate: p.logdate,
        entry_type: p.entry_type,
    }
}

impl RecordingApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(&self) -> Arc<dyn EntryApi> {
        Arc::new(self.clone())
    }

    /// Pretend the backend already holds `id`.
    pub async fn seed(&self, id: &str, p: EntryPayload) {
        self.store.lock().await.insert(id.to_string(), p);
        self.issued.lock().await.insert(EntryId::new(id));
    }

    pub async fn script_create(&self, response: Result<EntryId, TransportError>) {
        self.create_responses.lock().await.push_back(response);
    }

    pub async fn fail_next_update(&self) {
        *self.update_failures.lock().await += 1;
    }

    pub async fn fail_next_delete(&self) {
        *self.delete_failures.lock().await += 1;
    }

    /// The next call blocks until the returned sender fires (or is dropped).
    pub async fn hold(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.holds.lock().await.push_back(rx);
        tx
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }

    pub async fn stored(&self, id: &str) -> Option<EntryPayload> {
        self.store.lock().await.get(id).cloned()
    }

    pub async fn stored_count(&self) -> usize {
        self.store.lock().await.len()
    }

    pub async fn violations(&self) -> Vec<String> {
        self.violations.lock().await.clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Yield until at least `n` calls have reached the backend.
    pub async fn wait_for_calls(&self, n: usize) {
        for _ in 0..1000 {
            if self.calls.lock().await.len() >= n {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("backend never saw {} calls", n);
    }

    async fn enter(&self, call: Call) -> ActiveGuard {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        let guard = ActiveGuard(Arc::clone(&self.active));

        if let Call::Update(id, _) | Call::Delete(id) = &call {
            if !self.issued.lock().await.contains(id) {
                self.violations
                    .lock()
                    .await
                    .push(format!("{:?} sent for an identifier the backend never issued", call));
            }
        }
        self.calls.lock().await.push(call);

        let hold = self.holds.lock().await.pop_front();
        if let Some(rx) = hold {
            let _ = rx.await;
        }
        guard
    }

    async fn take_failure(counter: &Mutex<usize>) -> bool {
        let mut left = counter.lock().await;
        if *left > 0 {
            *left -= 1;
            true
        } else {
            false
        }
    }
}

#[async_trait]
impl EntryApi for RecordingApi {
    async fn create(&self, entry: &EntryPayload) -> Result<EntryId, TransportError> {
        let _guard = self.enter(Call::Create(entry.clone())).await;
        let scripted = self.create_responses.lock().await.pop_front();
        let id = match scripted {
            Some(response) => response?,
            None => EntryId::new((self.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string()),
        };
        self.store
            .lock()
            .await
            .insert(id.as_str().to_string(), entry.clone());
        self.issued.lock().await.insert(id.clone());
        Ok(id)
    }

    async fn update(&self, id: &EntryId, entry: &EntryPayload) -> Result<(), TransportError> {
        let _guard = self.enter(Call::Update(id.clone(), entry.clone())).await;
        if Self::take_failure(&self.update_failures).await {
            return Err(server_error());
        }
        self.store
            .lock()
            .await
            .insert(id.as_str().to_string(), entry.clone());
        Ok(())
    }

    async fn delete(&self, id: &EntryId) -> Result<(), TransportError> {
        let _guard = self.enter(Call::Delete(id.clone())).await;
        if Self::take_failure(&self.delete_failures).await {
            return Err(server_error());
        }
        self.store.lock().await.remove(id.as_str());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<EntryRecord>, TransportError> {
        Ok(self
            .store
            .lock()
            .await
            .iter()
            .map(|(id, p)| record(id, p))
            .collect())
    }
}
