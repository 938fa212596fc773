//! SQLite-backed vector index.
//!
//! Backends implement the fallible `try_*` primitives; the provided soft
//! methods log failures and degrade to `false`, empty results or 0.

use crate::types::{IndexedRecord, Metadata, MetadataFilter, SearchResult};
use bookqa_core::{AppError, AppResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// File name of the index database inside the persist directory.
pub const INDEX_FILE_NAME: &str = "index.sqlite";

/// Distance metric every collection is created with.
pub const DISTANCE_METRIC: &str = "cosine";

/// Trait for vector index backends.
pub trait VectorIndex: Send + Sync {
    /// Store records atomically: either all are stored or none.
    fn try_add(&self, records: &[IndexedRecord]) -> AppResult<()>;

    /// Nearest records to `query`, ascending by distance, at most `limit`.
    fn try_search(
        &self,
        query: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> AppResult<Vec<SearchResult>>;

    /// Number of stored records.
    fn try_count(&self) -> AppResult<usize>;

    /// Remove every record and recreate the collection with the same metric.
    fn try_clear(&self) -> AppResult<()>;

    /// Remove records by id, returning how many existed.
    fn try_delete(&self, ids: &[String]) -> AppResult<usize>;

    /// Store records; false on an empty batch or any failure.
    fn add(&self, records: &[IndexedRecord]) -> bool {
        match self.try_add(records) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to add {} records: {}", records.len(), e);
                false
            }
        }
    }

    /// Search; empty on an empty collection or any failure.
    fn search(
        &self,
        query: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Vec<SearchResult> {
        self.try_search(query, limit, filter).unwrap_or_else(|e| {
            tracing::error!("Search failed: {}", e);
            Vec::new()
        })
    }

    /// Record count; 0 on failure.
    fn count(&self) -> usize {
        self.try_count().unwrap_or_else(|e| {
            tracing::error!("Count failed: {}", e);
            0
        })
    }

    /// Clear the collection; idempotent.
    fn clear(&self) -> bool {
        match self.try_clear() {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Clear failed: {}", e);
                false
            }
        }
    }

    fn delete(&self, ids: &[String]) -> bool {
        match self.try_delete(ids) {
            Ok(_) => true,
            Err(e) => {
                tracing::error!("Delete failed: {}", e);
                false
            }
        }
    }
}

/// Persisted index holding one named collection.
pub struct SqliteIndex {
    conn: Mutex<Connection>,
    collection: String,
    path: Option<PathBuf>,
}

impl SqliteIndex {
    /// Open (or create) the index in `persist_dir`.
    pub fn open(persist_dir: &Path, collection: &str) -> AppResult<Self> {
        std::fs::create_dir_all(persist_dir).map_err(|e| {
            AppError::Index(format!("Failed to create index directory: {}", e))
        })?;

        let path = persist_dir.join(INDEX_FILE_NAME);
        let conn = Connection::open(&path)
            .map_err(|e| AppError::Index(format!("Failed to open SQLite index: {}", e)))?;

        let index = Self::from_connection(conn, collection, Some(path))?;
        tracing::debug!(
            "Opened SQLite index at {:?} (collection '{}')",
            index.path,
            index.collection
        );
        Ok(index)
    }

    /// Open a throwaway index that lives only in memory.
    pub fn open_in_memory(collection: &str) -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Index(format!("Failed to open SQLite index: {}", e)))?;
        Self::from_connection(conn, collection, None)
    }

    fn from_connection(conn: Connection, collection: &str, path: Option<PathBuf>) -> AppResult<Self> {
        if collection.trim().is_empty() {
            return Err(AppError::Config(
                "Collection name must not be empty".to_string(),
            ));
        }

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                metric TEXT NOT NULL,
                dimension INTEGER,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS records (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                text TEXT NOT NULL,
                vector BLOB NOT NULL,
                metadata TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            );
            "#,
        )
        .map_err(|e| AppError::Index(format!("Failed to create tables: {}", e)))?;

        ensure_collection(&conn, collection)?;

        Ok(Self {
            conn: Mutex::new(conn),
            collection: collection.to_string(),
            path,
        })
    }

    /// Collection name.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Database file, if persisted.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Vector length fixed by the first add, if any.
    pub fn dimension(&self) -> AppResult<Option<usize>> {
        let conn = self.lock()?;
        stored_dimension(&conn, &self.collection)
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Index("Index connection lock poisoned".to_string()))
    }
}

impl VectorIndex for SqliteIndex {
    fn try_add(&self, records: &[IndexedRecord]) -> AppResult<()> {
        let first = records
            .first()
            .ok_or_else(|| AppError::Validation("no records to add".to_string()))?;
        let dimension = first.vector.len();
        if dimension == 0 {
            return Err(AppError::Validation("empty vector".to_string()));
        }
        if let Some(bad) = records.iter().find(|r| r.vector.len() != dimension) {
            return Err(AppError::Validation(format!(
                "record {} has dimension {}, batch has {}",
                bad.id,
                bad.vector.len(),
                dimension
            )));
        }

        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Index(format!("Failed to begin transaction: {}", e)))?;

        ensure_collection(&tx, &self.collection)?;

        match stored_dimension(&tx, &self.collection)? {
            Some(stored) if stored != dimension => {
                return Err(AppError::Index(format!(
                    "dimension mismatch: collection '{}' holds {}-dimensional vectors, got {}",
                    self.collection, stored, dimension
                )));
            }
            Some(_) => {}
            None => {
                tx.execute(
                    "UPDATE collections SET dimension = ?1 WHERE name = ?2",
                    params![dimension as i64, self.collection],
                )
                .map_err(|e| AppError::Index(format!("Failed to set dimension: {}", e)))?;
            }
        }

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO records (collection, id, text, vector, metadata)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .map_err(|e| AppError::Index(format!("Failed to prepare insert: {}", e)))?;

            for record in records {
                let metadata_json = serde_json::to_string(&record.metadata)?;
                stmt.execute(params![
                    self.collection,
                    record.id,
                    record.text,
                    vector_to_bytes(&record.vector),
                    metadata_json,
                ])
                .map_err(|e| {
                    AppError::Index(format!("Failed to insert record {}: {}", record.id, e))
                })?;
            }
        }

        tx.commit()
            .map_err(|e| AppError::Index(format!("Failed to commit records: {}", e)))?;

        tracing::debug!(
            "Added {} records to collection '{}'",
            records.len(),
            self.collection
        );
        Ok(())
    }

    fn try_search(
        &self,
        query: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> AppResult<Vec<SearchResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let conn = self.lock()?;

        let dimension = match stored_dimension(&conn, &self.collection)? {
            Some(dimension) => dimension,
            None => return Ok(Vec::new()),
        };
        if query.len() != dimension {
            return Err(AppError::Index(format!(
                "dimension mismatch: query has {} dimensions, collection '{}' holds {}",
                query.len(),
                self.collection,
                dimension
            )));
        }

        let mut stmt = conn
            .prepare("SELECT id, text, vector, metadata FROM records WHERE collection = ?1")
            .map_err(|e| AppError::Index(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![self.collection], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(|e| AppError::Index(format!("Failed to query records: {}", e)))?;

        let mut results = Vec::new();
        for row in rows {
            let (id, text, vector_bytes, metadata_json) =
                row.map_err(|e| AppError::Index(format!("Failed to read record: {}", e)))?;

            let metadata: Metadata = serde_json::from_str(&metadata_json)?;
            if let Some(filter) = filter {
                if !matches_filter(&metadata, filter) {
                    continue;
                }
            }

            let vector = bytes_to_vector(&vector_bytes)?;
            let distance = (1.0 - cosine_similarity(query, &vector)).max(0.0);

            results.push(SearchResult {
                id,
                document: text,
                distance: Some(distance),
                metadata,
            });
        }

        // Sort by distance ascending
        results.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);

        tracing::debug!(
            "Retrieved {} records (requested top-{})",
            results.len(),
            limit
        );

        Ok(results)
    }

    fn try_count(&self) -> AppResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM records WHERE collection = ?1",
                params![self.collection],
                |row| row.get(0),
            )
            .map_err(|e| AppError::Index(format!("Failed to count records: {}", e)))?;
        Ok(count as usize)
    }

    fn try_clear(&self) -> AppResult<()> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Index(format!("Failed to begin transaction: {}", e)))?;

        tx.execute(
            "DELETE FROM records WHERE collection = ?1",
            params![self.collection],
        )
        .map_err(|e| AppError::Index(format!("Failed to delete records: {}", e)))?;

        tx.execute(
            "DELETE FROM collections WHERE name = ?1",
            params![self.collection],
        )
        .map_err(|e| AppError::Index(format!("Failed to drop collection: {}", e)))?;

        ensure_collection(&tx, &self.collection)?;

        tx.commit()
            .map_err(|e| AppError::Index(format!("Failed to commit clear: {}", e)))?;

        tracing::info!("Cleared collection '{}'", self.collection);
        Ok(())
    }

    fn try_delete(&self, ids: &[String]) -> AppResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Index(format!("Failed to begin transaction: {}", e)))?;

        let mut deleted = 0;
        for id in ids {
            deleted += tx
                .execute(
                    "DELETE FROM records WHERE collection = ?1 AND id = ?2",
                    params![self.collection, id],
                )
                .map_err(|e| AppError::Index(format!("Failed to delete record {}: {}", id, e)))?;
        }

        tx.commit()
            .map_err(|e| AppError::Index(format!("Failed to commit delete: {}", e)))?;

        tracing::debug!("Deleted {} of {} requested records", deleted, ids.len());
        Ok(deleted)
    }
}

/// Create the collection row if missing.
fn ensure_collection(conn: &Connection, name: &str) -> AppResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO collections (name, metric, dimension, created_at)
         VALUES (?1, ?2, NULL, ?3)",
        params![name, DISTANCE_METRIC, Utc::now().to_rfc3339()],
    )
    .map_err(|e| AppError::Index(format!("Failed to create collection: {}", e)))?;
    Ok(())
}

fn stored_dimension(conn: &Connection, name: &str) -> AppResult<Option<usize>> {
    let dimension: Option<Option<i64>> = conn
        .query_row(
            "SELECT dimension FROM collections WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| AppError::Index(format!("Failed to read collection: {}", e)))?;
    Ok(dimension.flatten().map(|d| d as usize))
}

fn matches_filter(metadata: &Metadata, filter: &MetadataFilter) -> bool {
    filter
        .iter()
        .all(|(key, value)| metadata.get(key) == Some(value))
}

/// Convert vector to little-endian bytes for storage.
fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for &value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert bytes back to a vector.
fn bytes_to_vector(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Index("Invalid vector bytes length".to_string()));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Calculate cosine similarity between two vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
