//! File metadata repository: CRUD and download gate for the `files` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dropvault_core::models::FileRecord;
use dropvault_core::AppError;
use sqlx::{Sqlite, SqlitePool};

use super::store::{DownloadGate, MetadataStore};

const FILE_COLUMNS: &str = "id, display_name, storage_key, size_bytes, content_type, owner_id, \
     one_time, expires_at, download_count, created_at";

/// Row type for the files table (for FromRow).
#[derive(Debug, sqlx::FromRow)]
pub struct FileRow {
    pub id: String,
    pub display_name: String,
    pub storage_key: String,
    pub size_bytes: i64,
    pub content_type: String,
    pub owner_id: String,
    pub one_time: bool,
    pub expires_at: i64,
    pub download_count: i64,
    pub created_at: i64,
}

fn millis_to_datetime(column: &str, millis: i64) -> Result<DateTime<Utc>, AppError> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        AppError::Internal(format!("Invalid timestamp in column {}: {}", column, millis))
    })
}

impl FileRow {
    pub fn to_file_record(self) -> Result<FileRecord, AppError> {
        Ok(FileRecord {
            expires_at: millis_to_datetime("expires_at", self.expires_at)?,
            created_at: millis_to_datetime("created_at", self.created_at)?,
            id: self.id,
            display_name: self.display_name,
            storage_key: self.storage_key,
            size_bytes: self.size_bytes,
            content_type: self.content_type,
            owner_id: self.owner_id,
            one_time: self.one_time,
            download_count: self.download_count,
        })
    }
}

fn rows_to_records(rows: Vec<FileRow>) -> Result<Vec<FileRecord>, AppError> {
    rows.into_iter().map(FileRow::to_file_record).collect()
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Repository for the files table.
#[derive(Clone)]
pub struct SqliteFileRepository {
    pool: SqlitePool,
}

impl SqliteFileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteFileRepository {
    #[tracing::instrument(skip(self, record), fields(db.table = "files", file.id = %record.id))]
    async fn put(&self, record: &FileRecord) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO files (id, display_name, storage_key, size_bytes, content_type, owner_id,
                               one_time, expires_at, download_count, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&record.id)
        .bind(&record.display_name)
        .bind(&record.storage_key)
        .bind(record.size_bytes)
        .bind(&record.content_type)
        .bind(&record.owner_id)
        .bind(record.one_time)
        .bind(record.expires_at.timestamp_millis())
        .bind(record.download_count)
        .bind(record.created_at.timestamp_millis())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
                AppError::Conflict(format!("File {} already exists", record.id)),
            ),
            Err(e) => Err(e.into()),
        }
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.record_id = %id))]
    async fn get(&self, id: &str) -> Result<Option<FileRecord>, AppError> {
        let row: Option<FileRow> = sqlx::query_as::<Sqlite, FileRow>(&format!(
            "SELECT {} FROM files WHERE id = ?1",
            FILE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(FileRow::to_file_record).transpose()
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.record_id = %id))]
    async fn delete(&self, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", owner_id = %owner_id))]
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<FileRecord>, AppError> {
        let rows: Vec<FileRow> = sqlx::query_as::<Sqlite, FileRow>(&format!(
            "SELECT {} FROM files WHERE owner_id = ?1 ORDER BY created_at DESC, rowid DESC",
            FILE_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        rows_to_records(rows)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.record_id = %id))]
    async fn increment_download_count(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<DownloadGate, AppError> {
        let now_ms = now.timestamp_millis();

        // The WHERE clause is the gate: only one concurrent UPDATE can move a
        // one-time row from 0 to 1.
        let new_count: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE files
            SET download_count = download_count + 1
            WHERE id = ?1
              AND expires_at > ?2
              AND NOT (one_time = 1 AND download_count >= 1)
            RETURNING download_count
            "#,
        )
        .bind(id)
        .bind(now_ms)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(count) = new_count {
            return Ok(DownloadGate::Granted {
                previous_count: count - 1,
            });
        }

        let state: Option<(i64, bool, i64)> = sqlx::query_as(
            "SELECT expires_at, one_time, download_count FROM files WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match state {
            None => DownloadGate::Missing,
            Some((expires_at, _, _)) if expires_at <= now_ms => DownloadGate::Expired,
            Some((_, true, count)) if count >= 1 => DownloadGate::Condemned,
            Some(_) => {
                tracing::warn!(file.id = %id, "Download gate refused a record that now looks downloadable");
                DownloadGate::Condemned
            }
        })
    }

    #[tracing::instrument(skip(self), fields(db.table = "files"))]
    async fn list_expired(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<FileRecord>, AppError> {
        let rows: Vec<FileRow> = sqlx::query_as::<Sqlite, FileRow>(&format!(
            "SELECT {} FROM files WHERE expires_at <= ?1 ORDER BY expires_at ASC LIMIT ?2",
            FILE_COLUMNS
        ))
        .bind(now.timestamp_millis())
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await?;
        rows_to_records(rows)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files"))]
    async fn list_condemned(&self, limit: usize) -> Result<Vec<FileRecord>, AppError> {
        let rows: Vec<FileRow> = sqlx::query_as::<Sqlite, FileRow>(&format!(
            "SELECT {} FROM files WHERE one_time = 1 AND download_count >= 1 \
             ORDER BY created_at ASC LIMIT ?1",
            FILE_COLUMNS
        ))
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await?;
        rows_to_records(rows)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files"))]
    async fn storage_key_exists(&self, storage_key: &str) -> Result<bool, AppError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM files WHERE storage_key = ?1)")
                .bind(storage_key)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }
}
