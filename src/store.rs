use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use sqlx::migrate::MigrateError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{query, query_as, FromRow, Row, SqlitePool};
use thiserror::Error;

use crate::tagset::TagSet;

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("Missing folderId")]
    MissingFolderId,

    #[error("Tag storage failed.")]
    Storage(#[from] sqlx::Error),

    #[error("Could not prepare tag storage.")]
    Migrate(#[from] MigrateError),

    #[error("Stored tags could not be encoded.")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    /// Validation failures are the caller's fault, everything else is ours.
    pub fn is_validation(&self) -> bool {
        matches!(self, StoreError::MissingFolderId)
    }
}

/// Tags of one folder together with the time of the last write.
#[derive(Debug, Clone)]
pub struct TagRecord {
    pub folder_id: String,
    pub tags: TagSet,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
#[error("Tags in database are in invalid format.")]
struct InvalidTagsFormat;

impl FromRow<'_, SqliteRow> for TagRecord {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let tags: &str = row.try_get("tags")?;
        let tags = serde_json::from_str::<Vec<String>>(tags).map_err(|_| {
            sqlx::Error::ColumnDecode {
                index: "tags".to_string(),
                source: Box::new(InvalidTagsFormat),
            }
        })?;

        Ok(TagRecord {
            folder_id: row.try_get("folder_id")?,
            tags: TagSet::from_stored(tags),
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Durable mapping of folder identifier to its [`TagSet`].
///
/// Every write replaces the whole set of a folder in a single upsert,
/// so the last writer wins per folder.
#[derive(Debug, Clone)]
pub struct TagStore {
    pool: SqlitePool,
}

impl TagStore {
    /// Open (or create) the tag table in an sqlite file at `path`.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<TagStore, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Storage(sqlx::Error::Io(e)))?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(
                SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true),
            )
            .await?;

        TagStore::with_pool(pool).await
    }

    /// Store living only as long as the returned value, for tests and dry runs.
    pub async fn in_memory() -> Result<TagStore, StoreError> {
        // One connection that never expires, otherwise the database is gone.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?)
            .await?;

        TagStore::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<TagStore, StoreError> {
        sqlx::migrate!().run(&pool).await?;
        log::debug!("Tag store ready.");
        Ok(TagStore { pool })
    }

    /// Tags of `folder_id`. A folder that was never written has no tags.
    pub async fn get_tags(&self, folder_id: &str) -> Result<TagSet, StoreError> {
        Ok(self
            .get_record(folder_id)
            .await?
            .map(|r| r.tags)
            .unwrap_or_default())
    }

    /// Full record of `folder_id`, `None` if it was never written.
    pub async fn get_record(&self, folder_id: &str) -> Result<Option<TagRecord>, StoreError> {
        validate(folder_id)?;

        let record = query_as::<_, TagRecord>(
            "SELECT folder_id, tags, updated_at FROM folder_tags WHERE folder_id = ?",
        )
        .bind(folder_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Replace the tags of `folder_id`. Omitted tags mean an empty set.
    /// Returns the set as stored.
    pub async fn set_tags(
        &self,
        folder_id: &str,
        tags: Option<Vec<String>>,
    ) -> Result<TagSet, StoreError> {
        validate(folder_id)?;

        let tags = TagSet::from_stored(tags.unwrap_or_default());
        let json = serde_json::to_string(&tags)?;

        query(
            r#"
INSERT INTO folder_tags (folder_id, tags, updated_at) VALUES (?, ?, ?)
ON CONFLICT(folder_id) DO UPDATE SET tags = excluded.tags, updated_at = excluded.updated_at"#,
        )
        .bind(folder_id)
        .bind(json)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        log::debug!("Stored {} tag(s) for folder {folder_id}.", tags.len());

        Ok(tags)
    }

    /// Sorted union of the tags of all folders.
    pub async fn all_tags(&self) -> Result<Vec<String>, StoreError> {
        let records = query_as::<_, TagRecord>("SELECT folder_id, tags, updated_at FROM folder_tags")
            .fetch_all(&self.pool)
            .await?;

        Ok(records
            .into_iter()
            .flat_map(|r| r.tags.into_vec())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect())
    }

    /// Close all connections. Any later call fails with a storage error.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn validate(folder_id: &str) -> Result<(), StoreError> {
    if folder_id.is_empty() {
        Err(StoreError::MissingFolderId)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{StoreError, TagStore};

    fn tags(t: &[&str]) -> Option<Vec<String>> {
        Some(t.iter().map(|s| s.to_string()).collect())
    }

    #[tokio::test]
    async fn unknown_folder_has_no_tags() {
        let store = TagStore::in_memory().await.unwrap();
        assert!(store.get_tags("never-written").await.unwrap().is_empty());
        assert!(store.get_record("never-written").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_folder_id_is_rejected() {
        let store = TagStore::in_memory().await.unwrap();
        assert!(matches!(
            store.get_tags("").await,
            Err(StoreError::MissingFolderId)
        ));
        assert!(matches!(
            store.set_tags("", tags(&["x"])).await,
            Err(StoreError::MissingFolderId)
        ));
    }

    #[tokio::test]
    async fn write_then_read_dedups_in_order() {
        let store = TagStore::in_memory().await.unwrap();
        store
            .set_tags("f1", tags(&["rock", "90s", "rock"]))
            .await
            .unwrap();
        assert_eq!(&*store.get_tags("f1").await.unwrap(), ["rock", "90s"]);
    }

    #[tokio::test]
    async fn rewriting_same_tags_is_idempotent() {
        let store = TagStore::in_memory().await.unwrap();
        store.set_tags("f1", tags(&["a", "b"])).await.unwrap();
        store.set_tags("f1", tags(&["a", "b"])).await.unwrap();
        assert_eq!(&*store.get_tags("f1").await.unwrap(), ["a", "b"]);
    }

    #[tokio::test]
    async fn empty_or_omitted_tags_clear_folder() {
        let store = TagStore::in_memory().await.unwrap();
        store.set_tags("f1", tags(&["a"])).await.unwrap();
        store.set_tags("f1", Some(vec![])).await.unwrap();
        assert!(store.get_tags("f1").await.unwrap().is_empty());

        store.set_tags("f2", tags(&["b"])).await.unwrap();
        store.set_tags("f2", None).await.unwrap();
        let record = store.get_record("f2").await.unwrap().unwrap();
        assert!(record.tags.is_empty());
    }

    #[tokio::test]
    async fn untrimmed_tags_are_stored_verbatim() {
        // Trimming happens client side only.
        let store = TagStore::in_memory().await.unwrap();
        store.set_tags("f1", tags(&[" rock ", "rock"])).await.unwrap();
        assert_eq!(&*store.get_tags("f1").await.unwrap(), [" rock ", "rock"]);
    }

    #[tokio::test]
    async fn out_of_order_saves_leave_stale_tags() {
        // Known race: add then remove dispatched concurrently may land reversed.
        let store = TagStore::in_memory().await.unwrap();
        store.set_tags("f1", tags(&["rock"])).await.unwrap();
        store.set_tags("f1", tags(&["rock", "90s"])).await.unwrap();
        assert_eq!(&*store.get_tags("f1").await.unwrap(), ["rock", "90s"]);
    }

    #[tokio::test]
    async fn all_tags_is_sorted_union() {
        let store = TagStore::in_memory().await.unwrap();
        store.set_tags("f1", tags(&["rock", "90s"])).await.unwrap();
        store.set_tags("f2", tags(&["jazz", "rock"])).await.unwrap();
        assert_eq!(store.all_tags().await.unwrap(), ["90s", "jazz", "rock"]);
    }

    #[tokio::test]
    async fn closed_store_reports_storage_error() {
        let store = TagStore::in_memory().await.unwrap();
        store.close().await;
        let err = store.get_tags("f1").await.unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)));
        assert!(!err.is_validation());
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tags.db");

        let store = TagStore::open(&path).await.unwrap();
        store.set_tags("f1", tags(&["live"])).await.unwrap();
        store.close().await;

        let store = TagStore::open(&path).await.unwrap();
        assert_eq!(&*store.get_tags("f1").await.unwrap(), ["live"]);
    }
}
