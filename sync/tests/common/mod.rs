//! Shared fixtures: an in-memory remote store and a wired-up sync stack.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use groundbook_engine::{Clock, EntityKind, ManualClock};
use groundbook_sync::remote::TransportKind;
use groundbook_sync::{
    Connectivity, LocalStore, NetworkState, ReachabilityProbe, RemoteApi, RemoteError,
    SyncManager,
};
use serde_json::Value;

/// A remote store held in memory.
#[derive(Default)]
pub struct FakeRemote {
    records: Mutex<BTreeMap<(EntityKind, String), Value>>,
    rejected_ids: Mutex<HashSet<String>>,
    unreachable: AtomicBool,
    /// Assign `srv-N` ids on create instead of keeping the client's.
    assign_ids: AtomicBool,
    /// Store writes but answer with a body no entity decodes from.
    garble_replies: AtomicBool,
    next_id: AtomicUsize,
    pub creates: AtomicUsize,
    pub updates: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reject(&self, id: &str) {
        self.rejected_ids.lock().unwrap().insert(id.to_string());
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn assign_ids(&self) {
        self.assign_ids.store(true, Ordering::SeqCst);
    }

    pub fn garble_replies(&self, garble: bool) {
        self.garble_replies.store(garble, Ordering::SeqCst);
    }

    fn reply(&self, stored: Value) -> Value {
        if self.garble_replies.load(Ordering::SeqCst) {
            Value::String("accepted".into())
        } else {
            stored
        }
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn stored(&self, kind: EntityKind, id: &str) -> Option<Value> {
        self.records
            .lock()
            .unwrap()
            .get(&(kind, id.to_string()))
            .cloned()
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.records
            .lock()
            .unwrap()
            .keys()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    /// Put a record straight into the remote store.
    pub fn seed(&self, kind: EntityKind, value: Value) {
        let id = value["id"].as_str().unwrap().to_string();
        self.records.lock().unwrap().insert((kind, id), value);
    }

    fn check(&self, id: &str) -> Result<(), RemoteError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(RemoteError::Transport {
                kind: TransportKind::Connect,
                message: "connection refused".into(),
            });
        }
        if self.rejected_ids.lock().unwrap().contains(id) {
            return Err(RemoteError::Rejected {
                status: 422,
                message: format!("record {id} rejected"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteApi for FakeRemote {
    async fn list(&self, kind: EntityKind) -> Result<Vec<Value>, RemoteError> {
        self.check("")?;
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn list_by_parent(
        &self,
        kind: EntityKind,
        parent: &str,
        parent_id: &str,
    ) -> Result<Vec<Value>, RemoteError> {
        let field = format!("{parent}Id");
        Ok(self
            .list(kind)
            .await?
            .into_iter()
            .filter(|v| v[&field] == parent_id)
            .collect())
    }

    async fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Value>, RemoteError> {
        self.check(id)?;
        Ok(self.stored(kind, id))
    }

    async fn create(&self, kind: EntityKind, body: &Value) -> Result<Value, RemoteError> {
        let client_id = body["id"].as_str().unwrap_or_default().to_string();
        self.check(&client_id)?;
        self.creates.fetch_add(1, Ordering::SeqCst);

        let mut stored = body.clone();
        let id = if self.assign_ids.load(Ordering::SeqCst) {
            format!("srv-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
        } else {
            client_id
        };
        stored["id"] = Value::String(id.clone());
        stored["synced"] = Value::from(1);
        self.records.lock().unwrap().insert((kind, id), stored.clone());
        Ok(self.reply(stored))
    }

    async fn update(&self, kind: EntityKind, id: &str, body: &Value) -> Result<Value, RemoteError> {
        self.check(id)?;
        self.updates.fetch_add(1, Ordering::SeqCst);
        let mut stored = body.clone();
        stored["synced"] = Value::from(1);
        self.records
            .lock()
            .unwrap()
            .insert((kind, id.to_string()), stored.clone());
        Ok(self.reply(stored))
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<(), RemoteError> {
        self.check(id)?;
        self.deletes.fetch_add(1, Ordering::SeqCst);
        match self.records.lock().unwrap().remove(&(kind, id.to_string())) {
            Some(_) => Ok(()),
            None => Err(RemoteError::Rejected {
                status: 404,
                message: "not found".into(),
            }),
        }
    }
}

#[async_trait]
impl ReachabilityProbe for FakeRemote {
    async fn is_reachable(&self) -> bool {
        !self.unreachable.load(Ordering::SeqCst)
    }
}

pub fn at(date: &str, time: &str) -> NaiveDateTime {
    NaiveDateTime::new(
        NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        chrono::NaiveTime::parse_from_str(time, "%H:%M").unwrap(),
    )
}

/// Everything a test needs, sharing one clock.
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub store: LocalStore,
    pub remote: Arc<FakeRemote>,
    pub sync: Arc<SyncManager>,
}

impl Harness {
    pub async fn new(state: NetworkState) -> Self {
        let clock = Arc::new(ManualClock::new(at("2024-06-01", "09:00")));
        let store = LocalStore::in_memory(clock.clone() as Arc<dyn Clock>)
            .await
            .unwrap();
        let remote = FakeRemote::new();
        let sync = Arc::new(SyncManager::new(
            store.clone(),
            remote.clone() as Arc<dyn RemoteApi>,
            Connectivity::new(state),
        ));
        Self {
            clock,
            store,
            remote,
            sync,
        }
    }

    pub async fn online() -> Self {
        Self::new(NetworkState::Online).await
    }

    pub async fn offline() -> Self {
        Self::new(NetworkState::Offline).await
    }

    pub fn go_online(&self) {
        self.sync.connectivity().set(NetworkState::Online);
    }

    pub fn go_offline(&self) {
        self.sync.connectivity().set(NetworkState::Offline);
    }
}
