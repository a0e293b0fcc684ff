//! Pushing local writes to the remote store.
//!
//! Every write is durable locally before the remote store is contacted. A
//! failed push leaves the record dirty; the next [`SyncManager::sync_all`]
//! picks it up again. Nothing here ever overwrites a newer local write with
//! an older server copy.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use groundbook_engine::{with_entity_kind, Entity, EntityKind};
use serde::Serialize;

use crate::connectivity::Connectivity;
use crate::remote::{Endpoint, RemoteApi, RemoteError};
use crate::store::{CommitOutcome, LocalStore, LocalWrite, Removal, StoreError};

/// Default number of records pushed concurrently within one kind.
pub const DEFAULT_PARALLELISM: usize = 4;

/// Where a write ended up.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome<E> {
    /// The remote store acknowledged it.
    Synced(E),
    /// Stored locally only; the device is offline.
    LocalOnly(E),
}

impl<E> SyncOutcome<E> {
    pub fn is_synced(&self) -> bool {
        matches!(self, SyncOutcome::Synced(_))
    }

    pub fn entity(&self) -> &E {
        match self {
            SyncOutcome::Synced(e) | SyncOutcome::LocalOnly(e) => e,
        }
    }

    pub fn into_entity(self) -> E {
        match self {
            SyncOutcome::Synced(e) | SyncOutcome::LocalOnly(e) => e,
        }
    }
}

/// Sync failures. The local write has always been kept when one of these is
/// returned after a save.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl SyncError {
    /// Whether retrying later may help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Remote(e) if e.is_transport())
    }
}

/// Result of a full sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub synced_users: usize,
    pub synced_venues: usize,
    pub synced_bookings: usize,
    pub synced_reviews: usize,
    pub synced_favorites: usize,
    pub synced_notifications: usize,
    /// Remote deletions acknowledged.
    pub deleted: usize,
    /// Records that failed and stay pending.
    pub errors: usize,
    /// The pass did nothing because the device was offline.
    pub skipped_offline: bool,
}

impl SyncSummary {
    fn record_synced(&mut self, kind: EntityKind) {
        match kind {
            EntityKind::User => self.synced_users += 1,
            EntityKind::Venue => self.synced_venues += 1,
            EntityKind::Booking => self.synced_bookings += 1,
            EntityKind::Review => self.synced_reviews += 1,
            EntityKind::Favorite => self.synced_favorites += 1,
            EntityKind::Notification => self.synced_notifications += 1,
        }
    }

    pub fn synced(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::User => self.synced_users,
            EntityKind::Venue => self.synced_venues,
            EntityKind::Booking => self.synced_bookings,
            EntityKind::Review => self.synced_reviews,
            EntityKind::Favorite => self.synced_favorites,
            EntityKind::Notification => self.synced_notifications,
        }
    }

    pub fn total_synced(&self) -> usize {
        EntityKind::ALL.iter().map(|kind| self.synced(*kind)).sum()
    }
}

/// Result of pulling remote records into the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PullSummary {
    pub pulled: usize,
    pub errors: usize,
    pub skipped_offline: bool,
}

/// Coordinates the local store, the remote store and connectivity.
pub struct SyncManager {
    store: LocalStore,
    remote: Arc<dyn RemoteApi>,
    connectivity: Connectivity,
    parallelism: usize,
}

impl SyncManager {
    pub fn new(store: LocalStore, remote: Arc<dyn RemoteApi>, connectivity: Connectivity) -> Self {
        Self {
            store,
            remote,
            connectivity,
            parallelism: DEFAULT_PARALLELISM,
        }
    }

    /// Limit on concurrent pushes per kind during [`Self::sync_all`].
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn remote(&self) -> &Arc<dyn RemoteApi> {
        &self.remote
    }

    /// Save `entity` locally, then push it if online.
    ///
    /// A remote failure is returned as an error but the local write stands
    /// and stays pending.
    pub async fn sync_entity<E: Entity>(&self, entity: E) -> Result<SyncOutcome<E>, SyncError> {
        let write = self.store.save(entity).await?;
        if !self.connectivity.is_online() {
            tracing::debug!(kind = %E::KIND, id = %write.entity.id(), "Offline, write kept locally");
            return Ok(SyncOutcome::LocalOnly(write.entity));
        }
        self.push(write).await.map(SyncOutcome::Synced)
    }

    /// Delete locally, then remotely if online and the remote store has it.
    pub async fn delete_entity<E: Entity>(&self, id: &str) -> Result<SyncOutcome<()>, SyncError> {
        match self.store.delete::<E>(id).await? {
            Removal::Missing | Removal::Removed => Ok(SyncOutcome::Synced(())),
            Removal::Tombstoned if !self.connectivity.is_online() => {
                Ok(SyncOutcome::LocalOnly(()))
            }
            Removal::Tombstoned => {
                self.push_delete(E::KIND, id).await?;
                Ok(SyncOutcome::Synced(()))
            }
        }
    }

    /// Push every pending write and deletion, kind by kind.
    ///
    /// One record failing never stops the others; failures are counted and
    /// the records stay pending.
    pub async fn sync_all(&self) -> SyncSummary {
        let mut summary = SyncSummary::default();
        if !self.connectivity.is_online() {
            tracing::debug!("Offline, skipping sync pass");
            summary.skipped_offline = true;
            return summary;
        }

        for kind in EntityKind::ALL {
            with_entity_kind!(kind, |E| self.push_pending::<E>(&mut summary).await);
            self.push_pending_deletes(kind, &mut summary).await;
        }

        tracing::info!(
            synced = summary.total_synced(),
            deleted = summary.deleted,
            errors = summary.errors,
            "Sync pass finished"
        );
        summary
    }

    /// Replace the cached copy of every clean record of one kind with the
    /// remote store's. Returns how many records were written.
    pub async fn refresh<E: Entity>(&self) -> Result<usize, SyncError> {
        let records = Endpoint::<E>::new(self.remote.as_ref()).list().await?;
        let pulled = self.store.absorb_remote(records).await?;
        tracing::debug!(kind = %E::KIND, pulled, "Refreshed from remote");
        Ok(pulled)
    }

    /// [`Self::refresh`] for every kind.
    pub async fn refresh_all(&self) -> PullSummary {
        let mut summary = PullSummary::default();
        if !self.connectivity.is_online() {
            summary.skipped_offline = true;
            return summary;
        }
        for kind in EntityKind::ALL {
            match with_entity_kind!(kind, |E| self.refresh::<E>().await) {
                Ok(pulled) => summary.pulled += pulled,
                Err(e) => {
                    tracing::warn!(kind = %kind, error = %e, "Refresh failed");
                    summary.errors += 1;
                }
            }
        }
        summary
    }

    async fn push<E: Entity>(&self, write: LocalWrite<E>) -> Result<E, SyncError> {
        let local_id = write.entity.id().to_string();
        let endpoint = Endpoint::<E>::new(self.remote.as_ref());
        let result = if write.is_new() {
            endpoint.create(&write.entity).await
        } else {
            endpoint.update(&write.entity).await
        };

        let mut remote = match result {
            Ok(remote) => remote,
            Err(e) => {
                tracing::warn!(kind = %E::KIND, id = %local_id, error = %e, "Push failed, record stays pending");
                if write.is_new() && e.was_accepted() {
                    // Created remotely; pushing again must not create a second copy.
                    self.store.mark_remote_known(E::KIND, &local_id).await?;
                }
                return Err(e.into());
            }
        };
        if let Some(id) = remote.derived_id() {
            remote.set_id(id);
        } else if remote.id().is_empty() {
            remote.set_id(local_id.clone());
        }
        remote.set_synced(true);

        match self
            .store
            .commit_remote(&local_id, write.revision, &remote)
            .await?
        {
            CommitOutcome::Applied => {
                tracing::debug!(kind = %E::KIND, id = %remote.id(), "Pushed");
            }
            CommitOutcome::Superseded => {
                tracing::debug!(kind = %E::KIND, id = %remote.id(), "Pushed, newer local write still pending");
            }
        }
        Ok(remote)
    }

    async fn push_pending<E: Entity>(&self, summary: &mut SyncSummary) {
        let pending = match self.store.unsynced_writes::<E>().await {
            Ok(pending) => pending,
            Err(e) => {
                tracing::error!(kind = %E::KIND, error = %e, "Failed to read pending writes");
                summary.errors += 1;
                return;
            }
        };
        if pending.is_empty() {
            return;
        }

        let results: Vec<_> = stream::iter(pending)
            .map(|write| self.push(write))
            .buffer_unordered(self.parallelism)
            .collect()
            .await;

        for result in results {
            match result {
                Ok(_) => summary.record_synced(E::KIND),
                Err(_) => summary.errors += 1,
            }
        }
    }

    async fn push_pending_deletes(&self, kind: EntityKind, summary: &mut SyncSummary) {
        let ids = match self.store.pending_deletes(kind).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(kind = %kind, error = %e, "Failed to read pending deletes");
                summary.errors += 1;
                return;
            }
        };
        for id in ids {
            match self.push_delete(kind, &id).await {
                Ok(()) => summary.deleted += 1,
                Err(_) => summary.errors += 1,
            }
        }
    }

    async fn push_delete(&self, kind: EntityKind, id: &str) -> Result<(), SyncError> {
        match self.remote.delete(kind, id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!(kind = %kind, id = %id, "Already gone remotely");
            }
            Err(e) => {
                tracing::warn!(kind = %kind, id = %id, error = %e, "Remote delete failed, will retry");
                return Err(e.into());
            }
        }
        self.store.purge(kind, id).await?;
        Ok(())
    }
}
