//! Database operations for the records table.
//!
//! Every function runs a single statement against any SQLite executor, so
//! callers can use either the pool or an open transaction.

use groundbook_engine::{Entity, EntityKind, Timestamp};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor};

/// A stored record row from the database.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub kind: String,
    pub id: String,
    pub payload: String,
    pub synced: bool,
    pub remote_known: bool,
    pub deleted: bool,
    pub revision: i64,
    pub updated_at: i64,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for StoredRecord {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(StoredRecord {
            kind: row.try_get("kind")?,
            id: row.try_get("id")?,
            payload: row.try_get("payload")?,
            synced: row.try_get("synced")?,
            remote_known: row.try_get("remote_known")?,
            deleted: row.try_get("deleted")?,
            revision: row.try_get("revision")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl StoredRecord {
    /// Decode the payload into a typed entity.
    ///
    /// Identity and the synced flag come from the row, not the payload, so a
    /// re-keyed or acknowledged record reads back consistently.
    pub fn decode<E: Entity>(&self) -> Result<E, serde_json::Error> {
        let mut entity: E = serde_json::from_str(&self.payload)?;
        entity.set_id(self.id.clone());
        entity.set_synced(self.synced);
        Ok(entity)
    }
}

const COLUMNS: &str = "kind, id, payload, synced, remote_known, deleted, revision, updated_at";

/// Fetch one row, tombstones included.
pub async fn fetch_record<'e>(
    executor: impl SqliteExecutor<'e>,
    kind: EntityKind,
    id: &str,
) -> Result<Option<StoredRecord>, sqlx::Error> {
    let sql = format!("SELECT {COLUMNS} FROM records WHERE kind = ?1 AND id = ?2");
    sqlx::query_as::<_, StoredRecord>(&sql)
        .bind(kind.as_str())
        .bind(id)
        .fetch_optional(executor)
        .await
}

/// Every live row of a kind.
pub async fn fetch_live<'e>(
    executor: impl SqliteExecutor<'e>,
    kind: EntityKind,
) -> Result<Vec<StoredRecord>, sqlx::Error> {
    let sql = format!(
        "SELECT {COLUMNS} FROM records WHERE kind = ?1 AND deleted = 0 ORDER BY updated_at, id"
    );
    sqlx::query_as::<_, StoredRecord>(&sql)
        .bind(kind.as_str())
        .fetch_all(executor)
        .await
}

/// Live rows of a kind whose top-level payload field `field` equals `value`.
pub async fn fetch_live_where<'e>(
    executor: impl SqliteExecutor<'e>,
    kind: EntityKind,
    field: &str,
    value: &str,
) -> Result<Vec<StoredRecord>, sqlx::Error> {
    let sql = format!(
        "SELECT {COLUMNS} FROM records \
         WHERE kind = ?1 AND deleted = 0 AND json_extract(payload, ?2) = ?3 \
         ORDER BY updated_at, id"
    );
    sqlx::query_as::<_, StoredRecord>(&sql)
        .bind(kind.as_str())
        .bind(format!("$.{field}"))
        .bind(value)
        .fetch_all(executor)
        .await
}

/// Live rows of a kind still waiting for the remote store.
pub async fn fetch_unsynced<'e>(
    executor: impl SqliteExecutor<'e>,
    kind: EntityKind,
) -> Result<Vec<StoredRecord>, sqlx::Error> {
    let sql = format!(
        "SELECT {COLUMNS} FROM records \
         WHERE kind = ?1 AND synced = 0 AND deleted = 0 ORDER BY updated_at, id"
    );
    sqlx::query_as::<_, StoredRecord>(&sql)
        .bind(kind.as_str())
        .fetch_all(executor)
        .await
}

/// Ids of tombstoned rows of a kind.
pub async fn fetch_tombstones<'e>(
    executor: impl SqliteExecutor<'e>,
    kind: EntityKind,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT id FROM records WHERE kind = ?1 AND deleted = 1 ORDER BY id")
        .bind(kind.as_str())
        .fetch_all(executor)
        .await
}

/// Insert or overwrite a row as a dirty local write.
///
/// Returns the new revision and whether the remote store already knows the
/// record.
pub async fn upsert_local<'e>(
    executor: impl SqliteExecutor<'e>,
    kind: EntityKind,
    id: &str,
    payload: &str,
    now: Timestamp,
) -> Result<(i64, bool), sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO records (kind, id, payload, synced, remote_known, deleted, revision, updated_at)
        VALUES (?1, ?2, ?3, 0, 0, 0, 1, ?4)
        ON CONFLICT (kind, id) DO UPDATE SET
            payload = excluded.payload,
            synced = 0,
            deleted = 0,
            revision = records.revision + 1,
            updated_at = excluded.updated_at
        RETURNING revision, remote_known
        "#,
    )
    .bind(kind.as_str())
    .bind(id)
    .bind(payload)
    .bind(now)
    .fetch_one(executor)
    .await?;

    Ok((row.try_get("revision")?, row.try_get("remote_known")?))
}

/// Store the remote copy of a record, but only if no local write happened
/// after `revision` was read.
///
/// Returns the number of rows updated (0 or 1).
pub async fn write_back<'e>(
    executor: impl SqliteExecutor<'e>,
    kind: EntityKind,
    id: &str,
    payload: &str,
    revision: i64,
    now: Timestamp,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE records
        SET payload = ?3, synced = 1, remote_known = 1, updated_at = ?5
        WHERE kind = ?1 AND id = ?2 AND revision = ?4 AND deleted = 0
        "#,
    )
    .bind(kind.as_str())
    .bind(id)
    .bind(payload)
    .bind(revision)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Flag a row as synced without touching its payload.
pub async fn set_synced<'e>(
    executor: impl SqliteExecutor<'e>,
    kind: EntityKind,
    id: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE records SET synced = 1, remote_known = 1 WHERE kind = ?1 AND id = ?2 AND deleted = 0",
    )
    .bind(kind.as_str())
    .bind(id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Record that the remote store has the row, leaving it dirty.
pub async fn set_remote_known<'e>(
    executor: impl SqliteExecutor<'e>,
    kind: EntityKind,
    id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE records SET remote_known = 1 WHERE kind = ?1 AND id = ?2")
        .bind(kind.as_str())
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

/// Move a row to the identity the remote store assigned.
pub async fn rekey<'e>(
    executor: impl SqliteExecutor<'e>,
    kind: EntityKind,
    from: &str,
    to: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE records SET id = ?3 WHERE kind = ?1 AND id = ?2")
        .bind(kind.as_str())
        .bind(from)
        .bind(to)
        .execute(executor)
        .await?;
    Ok(())
}

/// Mark a row deleted, keeping it until the remote delete is acknowledged.
pub async fn tombstone<'e>(
    executor: impl SqliteExecutor<'e>,
    kind: EntityKind,
    id: &str,
    now: Timestamp,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE records
        SET deleted = 1, synced = 0, revision = revision + 1, updated_at = ?3
        WHERE kind = ?1 AND id = ?2
        "#,
    )
    .bind(kind.as_str())
    .bind(id)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(())
}

/// Remove a row outright.
pub async fn remove<'e>(
    executor: impl SqliteExecutor<'e>,
    kind: EntityKind,
    id: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM records WHERE kind = ?1 AND id = ?2")
        .bind(kind.as_str())
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

/// Remove a tombstone once the remote store has dropped the record.
pub async fn purge_tombstone<'e>(
    executor: impl SqliteExecutor<'e>,
    kind: EntityKind,
    id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM records WHERE kind = ?1 AND id = ?2 AND deleted = 1")
        .bind(kind.as_str())
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

/// Insert or refresh a row from the remote store.
///
/// Rows with unsynced local changes (including tombstones) are left alone.
/// Returns the number of rows written (0 or 1).
pub async fn absorb<'e>(
    executor: impl SqliteExecutor<'e>,
    kind: EntityKind,
    id: &str,
    payload: &str,
    now: Timestamp,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO records (kind, id, payload, synced, remote_known, deleted, revision, updated_at)
        VALUES (?1, ?2, ?3, 1, 1, 0, 1, ?4)
        ON CONFLICT (kind, id) DO UPDATE SET
            payload = excluded.payload,
            updated_at = excluded.updated_at
        WHERE records.synced = 1 AND records.deleted = 0
        "#,
    )
    .bind(kind.as_str())
    .bind(id)
    .bind(payload)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Number of live rows with unsynced changes plus pending deletions.
pub async fn count_pending<'e>(executor: impl SqliteExecutor<'e>) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE synced = 0")
        .fetch_one(executor)
        .await
}
