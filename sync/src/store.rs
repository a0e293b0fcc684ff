//! The on-device record cache.
//!
//! Every entity kind lives in one `records` table keyed by `(kind, id)`. A
//! local write always lands here first with `synced = 0`; only an
//! acknowledgement from the remote store flips it back. Observers are told
//! about every change through a broadcast feed.

use std::marker::PhantomData;
use std::sync::Arc;

use groundbook_engine::{
    average_rating, Booking, Clock, Entity, EntityKind, Favorite, Notification, RecordId, Review,
    Timestamp, Venue,
};
use serde::Serialize;
use sqlx::{Sqlite, Transaction};
use tokio::sync::broadcast;

use crate::db::{self, Pool, StoredRecord};

const CHANGE_FEED_CAPACITY: usize = 256;

/// Errors raised by the local store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Corrupt {kind} record {id}: {source}")]
    Corrupt {
        kind: EntityKind,
        id: RecordId,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid record: {0}")]
    Invalid(#[from] groundbook_engine::Error),
}

/// What happened to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Saved,
    Deleted,
    Synced,
}

/// One entry on the change feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreChange {
    pub kind: EntityKind,
    pub id: RecordId,
    pub change: ChangeKind,
}

/// A local write as the reconciler needs to see it.
#[derive(Debug, Clone)]
pub struct LocalWrite<E> {
    pub entity: E,
    /// Row revision at the time of the write. Used to detect a newer local
    /// write racing a remote acknowledgement.
    pub revision: i64,
    /// Whether the remote store has ever acknowledged this record.
    pub remote_known: bool,
}

impl<E> LocalWrite<E> {
    /// Whether pushing this write means creating the record remotely.
    pub fn is_new(&self) -> bool {
        !self.remote_known
    }
}

/// Result of a local delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// There was nothing to delete.
    Missing,
    /// The remote store never saw the record; it is gone.
    Removed,
    /// The remote copy still has to be deleted.
    Tombstoned,
}

/// Result of writing a remote acknowledgement back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The remote copy replaced the local one and the record is clean.
    Applied,
    /// A newer local write landed meanwhile; the record stays dirty.
    Superseded,
}

/// Typed access to the record cache.
#[derive(Clone)]
pub struct LocalStore {
    pool: Pool,
    clock: Arc<dyn Clock>,
    changes: broadcast::Sender<StoreChange>,
}

impl LocalStore {
    /// Wrap an already migrated pool.
    pub fn new(pool: Pool, clock: Arc<dyn Clock>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            pool,
            clock,
            changes,
        }
    }

    /// Open the database at `database_url` and bring its schema up to date.
    pub async fn open(database_url: &str, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        let pool = db::create_pool(database_url).await?;
        db::run_migrations(&pool).await?;
        Ok(Self::new(pool, clock))
    }

    /// A fresh, private in-memory store.
    pub async fn in_memory(clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        let pool = db::create_memory_pool().await?;
        db::run_migrations(&pool).await?;
        Ok(Self::new(pool, clock))
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Persist a local write.
    ///
    /// Rejects invalid entities. Assigns an id when the entity has none (or
    /// derives it, for entities identified by their fields), stamps it, and
    /// marks it unsynced. Saving a review refreshes the rating of its venue
    /// and, if the review moved, of the venue it left.
    pub async fn save<E: Entity>(&self, mut entity: E) -> Result<LocalWrite<E>, StoreError> {
        entity.validate()?;
        if let Some(id) = entity.derived_id() {
            entity.set_id(id);
        } else if entity.id().is_empty() {
            entity.set_id(uuid::Uuid::new_v4().to_string());
        }
        let now = self.clock.now_millis();
        entity.touch(now);
        entity.set_synced(false);
        let payload = serde_json::to_string(&entity)?;

        let mut tx = self.begin_write().await?;
        let previous_venue = match entity.rated_venue() {
            Some(_) => Self::live_rated_venue::<E>(&mut tx, entity.id()).await?,
            None => None,
        };
        let (revision, remote_known) =
            db::upsert_local(&mut *tx, E::KIND, entity.id(), &payload, now).await?;
        let mut rerated = Vec::new();
        if let Some(venue_id) = entity.rated_venue() {
            rerated.extend(Self::rerate_venue(&mut tx, venue_id, now).await?);
        }
        if let Some(venue_id) = previous_venue.filter(|v| Some(v.as_str()) != entity.rated_venue()) {
            rerated.extend(Self::rerate_venue(&mut tx, &venue_id, now).await?);
        }
        tx.commit().await?;

        tracing::debug!(kind = %E::KIND, id = %entity.id(), revision, "Saved local write");
        self.publish(E::KIND, entity.id(), ChangeKind::Saved);
        for venue_id in rerated {
            self.publish(EntityKind::Venue, &venue_id, ChangeKind::Saved);
        }

        Ok(LocalWrite {
            entity,
            revision,
            remote_known,
        })
    }

    /// Delete a record locally.
    ///
    /// Records the remote store never saw are removed outright; the rest
    /// become tombstones until the remote delete succeeds.
    pub async fn delete<E: Entity>(&self, id: &str) -> Result<Removal, StoreError> {
        let now = self.clock.now_millis();
        let mut tx = self.begin_write().await?;

        let Some(row) = db::fetch_record(&mut *tx, E::KIND, id).await? else {
            return Ok(Removal::Missing);
        };
        if row.deleted {
            return Ok(Removal::Missing);
        }
        let entity: E = decode(&row)?;

        let removal = if row.remote_known {
            db::tombstone(&mut *tx, E::KIND, id, now).await?;
            Removal::Tombstoned
        } else {
            db::remove(&mut *tx, E::KIND, id).await?;
            Removal::Removed
        };
        let rerated = match entity.rated_venue() {
            Some(venue_id) => Self::rerate_venue(&mut tx, venue_id, now).await?,
            None => None,
        };
        tx.commit().await?;

        tracing::debug!(kind = %E::KIND, id = %id, ?removal, "Deleted local record");
        self.publish(E::KIND, id, ChangeKind::Deleted);
        if let Some(venue_id) = rerated {
            self.publish(EntityKind::Venue, &venue_id, ChangeKind::Saved);
        }
        Ok(removal)
    }

    /// A live record by id.
    pub async fn get<E: Entity>(&self, id: &str) -> Result<Option<E>, StoreError> {
        match db::fetch_record(&self.pool, E::KIND, id).await? {
            Some(row) if !row.deleted => Ok(Some(decode(&row)?)),
            _ => Ok(None),
        }
    }

    /// Every live record of a kind. Rows that no longer decode are skipped.
    pub async fn list<E: Entity>(&self) -> Result<Vec<E>, StoreError> {
        let rows = db::fetch_live(&self.pool, E::KIND).await?;
        Ok(decode_all(rows))
    }

    /// Live records of a kind whose camelCase field `field` equals `value`.
    pub async fn list_where<E: Entity>(
        &self,
        field: &str,
        value: &str,
    ) -> Result<Vec<E>, StoreError> {
        let rows = db::fetch_live_where(&self.pool, E::KIND, field, value).await?;
        Ok(decode_all(rows))
    }

    pub async fn bookings_for_venue(&self, venue_id: &str) -> Result<Vec<Booking>, StoreError> {
        self.list_where("venueId", venue_id).await
    }

    pub async fn bookings_for_user(&self, user_id: &str) -> Result<Vec<Booking>, StoreError> {
        self.list_where("userId", user_id).await
    }

    pub async fn reviews_for_venue(&self, venue_id: &str) -> Result<Vec<Review>, StoreError> {
        self.list_where("venueId", venue_id).await
    }

    pub async fn favorites_for_user(&self, user_id: &str) -> Result<Vec<Favorite>, StoreError> {
        self.list_where("userId", user_id).await
    }

    /// A user's notifications, newest first.
    pub async fn notifications_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<Notification>, StoreError> {
        let mut notifications: Vec<Notification> = self.list_where("userId", user_id).await?;
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    pub async fn unread_notifications(&self, user_id: &str) -> Result<usize, StoreError> {
        let notifications = self.notifications_for_user(user_id).await?;
        Ok(notifications.iter().filter(|n| !n.read).count())
    }

    /// Live records of a kind that still need pushing.
    pub async fn get_unsynced<E: Entity>(&self) -> Result<Vec<E>, StoreError> {
        Ok(self
            .unsynced_writes::<E>()
            .await?
            .into_iter()
            .map(|write| write.entity)
            .collect())
    }

    /// Pending writes of a kind together with their revision.
    pub async fn unsynced_writes<E: Entity>(&self) -> Result<Vec<LocalWrite<E>>, StoreError> {
        let rows = db::fetch_unsynced(&self.pool, E::KIND).await?;
        let mut writes = Vec::with_capacity(rows.len());
        for row in rows {
            match decode::<E>(&row) {
                Ok(entity) => writes.push(LocalWrite {
                    entity,
                    revision: row.revision,
                    remote_known: row.remote_known,
                }),
                Err(e) => tracing::warn!(error = %e, "Skipping undecodable unsynced record"),
            }
        }
        Ok(writes)
    }

    /// Ids of records deleted locally but not yet remotely.
    pub async fn pending_deletes(&self, kind: EntityKind) -> Result<Vec<RecordId>, StoreError> {
        Ok(db::fetch_tombstones(&self.pool, kind).await?)
    }

    /// Number of local changes the remote store has not acknowledged.
    pub async fn pending_count(&self) -> Result<i64, StoreError> {
        Ok(db::count_pending(&self.pool).await?)
    }

    /// Flag a record as acknowledged. Idempotent; unknown ids are ignored.
    pub async fn mark_synced(&self, kind: EntityKind, id: &str) -> Result<(), StoreError> {
        if db::set_synced(&self.pool, kind, id).await? > 0 {
            self.publish(kind, id, ChangeKind::Synced);
        }
        Ok(())
    }

    /// Remember that the remote store has `id`, so the next push updates it
    /// instead of creating it again. The record stays dirty.
    pub async fn mark_remote_known(&self, kind: EntityKind, id: &str) -> Result<(), StoreError> {
        db::set_remote_known(&self.pool, kind, id).await?;
        Ok(())
    }

    /// Write the remote store's copy of a pushed record back.
    ///
    /// `local_id` is the id the record was pushed under and `revision` the
    /// revision that was pushed. When the remote copy carries a different id
    /// the local row is re-keyed. When a newer local write exists, only the
    /// identity is taken over and the record stays dirty.
    pub async fn commit_remote<E: Entity>(
        &self,
        local_id: &str,
        revision: i64,
        remote: &E,
    ) -> Result<CommitOutcome, StoreError> {
        let now = self.clock.now_millis();
        let remote_id = remote.id().to_string();
        let mut synced = remote.clone();
        synced.set_synced(true);
        let payload = serde_json::to_string(&synced)?;

        let mut tx = self.begin_write().await?;
        if remote_id != local_id {
            db::remove(&mut *tx, E::KIND, &remote_id).await?;
            db::rekey(&mut *tx, E::KIND, local_id, &remote_id).await?;
            tracing::debug!(kind = %E::KIND, from = %local_id, to = %remote_id, "Re-keyed record");
        }
        let outcome = if db::write_back(&mut *tx, E::KIND, &remote_id, &payload, revision, now)
            .await?
            > 0
        {
            CommitOutcome::Applied
        } else {
            db::set_remote_known(&mut *tx, E::KIND, &remote_id).await?;
            CommitOutcome::Superseded
        };
        tx.commit().await?;

        if remote_id != local_id {
            self.publish(E::KIND, local_id, ChangeKind::Deleted);
        }
        self.publish(E::KIND, &remote_id, ChangeKind::Synced);
        Ok(outcome)
    }

    /// Drop a tombstone after the remote delete was acknowledged.
    pub async fn purge(&self, kind: EntityKind, id: &str) -> Result<(), StoreError> {
        db::purge_tombstone(&self.pool, kind, id).await?;
        Ok(())
    }

    /// Cache records fetched from the remote store.
    ///
    /// Records with unsynced local changes are kept as they are. Returns how
    /// many records were written.
    pub async fn absorb_remote<E: Entity>(&self, records: Vec<E>) -> Result<usize, StoreError> {
        let now = self.clock.now_millis();
        let mut written = Vec::new();

        let mut tx = self.begin_write().await?;
        for mut record in records {
            if let Some(id) = record.derived_id() {
                record.set_id(id);
            }
            if record.id().is_empty() {
                tracing::warn!(kind = %E::KIND, "Ignoring remote record without id");
                continue;
            }
            if let Err(e) = record.validate() {
                tracing::warn!(kind = %E::KIND, id = %record.id(), error = %e, "Ignoring invalid remote record");
                continue;
            }
            record.set_synced(true);
            let payload = serde_json::to_string(&record)?;
            if db::absorb(&mut *tx, E::KIND, record.id(), &payload, now).await? > 0 {
                written.push(record.id().to_string());
            }
        }
        tx.commit().await?;

        for id in &written {
            self.publish(E::KIND, id, ChangeKind::Synced);
        }
        Ok(written.len())
    }

    /// Subscribe to every change.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    /// Observe the full list of one kind, re-read after each change to it.
    pub fn watch<E: Entity>(&self) -> Watch<E> {
        Watch {
            store: self.clone(),
            changes: self.subscribe(),
            primed: false,
            _kind: PhantomData,
        }
    }

    fn publish(&self, kind: EntityKind, id: &str, change: ChangeKind) {
        // No subscribers is fine.
        let _ = self.changes.send(StoreChange {
            kind,
            id: id.to_string(),
            change,
        });
    }

    /// Start a transaction that takes the write lock up front, so a later
    /// write in it waits on `busy_timeout` instead of failing with
    /// `SQLITE_BUSY` when another connection committed in between.
    async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>, StoreError> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    /// Venue rated by the live stored copy of record `id`, if any.
    async fn live_rated_venue<E: Entity>(
        tx: &mut Transaction<'_, Sqlite>,
        id: &str,
    ) -> Result<Option<RecordId>, StoreError> {
        let Some(row) = db::fetch_record(&mut **tx, E::KIND, id).await? else {
            return Ok(None);
        };
        if row.deleted {
            return Ok(None);
        }
        Ok(decode::<E>(&row)
            .ok()
            .and_then(|stored| stored.rated_venue().map(str::to_string)))
    }

    /// Recompute a venue's rating from its live reviews and store it as a
    /// local write. Returns the venue id if a venue was updated.
    async fn rerate_venue(
        tx: &mut Transaction<'_, Sqlite>,
        venue_id: &str,
        now: Timestamp,
    ) -> Result<Option<RecordId>, StoreError> {
        let Some(row) = db::fetch_record(&mut **tx, EntityKind::Venue, venue_id).await? else {
            return Ok(None);
        };
        if row.deleted {
            return Ok(None);
        }
        let mut venue: Venue = decode(&row)?;

        let reviews: Vec<Review> =
            decode_all(db::fetch_live_where(&mut **tx, EntityKind::Review, "venueId", venue_id).await?);
        let rating = average_rating(&reviews);
        if venue.rating == rating {
            return Ok(None);
        }
        venue.apply_rating(rating);
        venue.set_synced(false);

        let payload = serde_json::to_string(&venue)?;
        db::upsert_local(&mut **tx, EntityKind::Venue, venue_id, &payload, now).await?;
        tracing::debug!(venue_id = %venue_id, rating, reviews = reviews.len(), "Updated venue rating");
        Ok(Some(venue_id.to_string()))
    }
}

fn decode<E: Entity>(row: &StoredRecord) -> Result<E, StoreError> {
    row.decode().map_err(|source| StoreError::Corrupt {
        kind: E::KIND,
        id: row.id.clone(),
        source,
    })
}

fn decode_all<E: Entity>(rows: Vec<StoredRecord>) -> Vec<E> {
    rows.iter()
        .filter_map(|row| match decode::<E>(row) {
            Ok(entity) => Some(entity),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping undecodable record");
                None
            }
        })
        .collect()
}

/// A live view of one entity kind. See [`LocalStore::watch`].
pub struct Watch<E> {
    store: LocalStore,
    changes: broadcast::Receiver<StoreChange>,
    primed: bool,
    _kind: PhantomData<fn() -> E>,
}

impl<E: Entity> Watch<E> {
    /// The current list on the first call; afterwards, the list after the
    /// next change to this kind. `None` once the store is gone.
    pub async fn next(&mut self) -> Option<Result<Vec<E>, StoreError>> {
        if self.primed {
            loop {
                match self.changes.recv().await {
                    Ok(change) if change.kind == E::KIND => break,
                    Ok(_) => continue,
                    // Missed changes; re-reading covers them.
                    Err(broadcast::error::RecvError::Lagged(_)) => break,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        }
        self.primed = true;
        Some(self.store.list::<E>().await)
    }
}
