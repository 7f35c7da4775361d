// Pail - Uniform Bucket Storage
// Copyright (C) 2026 Pail Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.

//! Chunked document-store bucket backend.
//!
//! Maps each key to a document identified by a composed name (database +
//! bucket prefix + key). Content is split into fixed-size binary
//! segments in a `chunks` table and committed by a `documents` row
//! written when the writer is closed, so readers never observe a
//! half-written document.
//!
//! The backend borrows a [`DocStore`] session handle at construction and
//! does not own its lifecycle; every logical operation acquires its own
//! connection from the underlying pool, so closing one in-flight stream
//! cannot disturb another.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_stream::try_stream;
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{BucketError, BucketResult};
use crate::item::{BucketItem, BucketIterator, ItemStream};
use crate::key::{join_key, strip_key_prefix, validate_key};
use crate::{BlobReader, BlobWriter, Bucket};

/// Segment size for chunked documents.
const CHUNK_SIZE: usize = 255 * 1024;

/// Session handle for a chunked document store.
///
/// Wraps a connection pool; cloning is cheap and clones share the same
/// pool. The caller owns the session lifecycle: buckets constructed over
/// a session never close it, and a session closed while operations are
/// in flight surfaces as a session error from those operations.
#[derive(Debug, Clone)]
pub struct DocStore {
    pool: SqlitePool,
}

impl DocStore {
    /// Open (creating if necessary) a document store at the given file
    /// path.
    pub async fn connect(path: &Path) -> BucketResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|err| {
                    BucketError::create_failed(
                        format!("enclosing directory '{}'", parent.display()),
                        err,
                    )
                })?;
            }
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let store = DocStore { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Open an in-memory document store.
    ///
    /// Useful for tests and embedders that do not want a file on disk.
    /// Restricted to a single pooled connection because each in-memory
    /// connection is its own database.
    pub async fn in_memory() -> BucketResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .journal_mode(SqliteJournalMode::Memory);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = DocStore { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Close the session. In-flight operations on any clone of this
    /// handle will fail with a session error.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Clone of the pool for one logical operation.
    fn session(&self) -> SqlitePool {
        self.pool.clone()
    }

    async fn ensure_schema(&self) -> BucketResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                db          TEXT NOT NULL,
                name        TEXT NOT NULL,
                length      INTEGER NOT NULL,
                chunk_count INTEGER NOT NULL,
                uploaded_at INTEGER NOT NULL,
                PRIMARY KEY (db, name)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                db   TEXT NOT NULL,
                name TEXT NOT NULL,
                seq  INTEGER NOT NULL,
                data BLOB NOT NULL,
                PRIMARY KEY (db, name, seq)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Construction parameters for a [`DocStoreBucket`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocStoreOptions {
    /// Logical database all documents of this bucket live in.
    pub database: String,
    /// Key namespace for this bucket instance within the database.
    pub prefix: String,
}

/// Bucket backend over a chunked document store.
#[derive(Clone)]
pub struct DocStoreBucket {
    store: DocStore,
    database: String,
    prefix: String,
}

impl DocStoreBucket {
    /// Create a bucket over an existing session handle.
    ///
    /// The bucket keeps a clone of the handle but never closes it;
    /// session teardown remains the caller's responsibility.
    pub fn new(store: DocStore, options: DocStoreOptions) -> BucketResult<Self> {
        if options.database.is_empty() {
            return Err(BucketError::invalid_name("database name is empty"));
        }
        Ok(DocStoreBucket {
            store,
            database: options.database,
            prefix: options.prefix,
        })
    }

    fn document_name(&self, key: &str) -> String {
        join_key(&self.prefix, key)
    }
}

impl fmt::Debug for DocStoreBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocStoreBucket")
            .field("database", &self.database)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Bucket for DocStoreBucket {
    async fn check(&self, cancel: &CancellationToken) -> BucketResult<()> {
        if cancel.is_cancelled() {
            return Err(BucketError::Cancelled);
        }
        sqlx::query("SELECT 1")
            .execute(&self.store.session())
            .await?;
        Ok(())
    }

    async fn writer(
        &self,
        cancel: &CancellationToken,
        key: &str,
    ) -> BucketResult<Box<dyn BlobWriter>> {
        validate_key(key)?;
        if cancel.is_cancelled() {
            return Err(BucketError::Cancelled);
        }
        let session = self.store.session();
        let name = self.document_name(key);
        // Overwrite semantics: drop any previous document before the
        // first chunk lands. The new document becomes visible only at
        // close.
        remove_document(&session, &self.database, &name).await?;
        debug!(key, name = %name, "opened document writer");
        Ok(Box::new(DocWriter {
            session,
            database: self.database.clone(),
            name,
            seq: 0,
            length: 0,
            buf: Vec::with_capacity(CHUNK_SIZE),
            cancel: cancel.clone(),
        }))
    }

    async fn reader(
        &self,
        cancel: &CancellationToken,
        key: &str,
    ) -> BucketResult<Box<dyn BlobReader>> {
        validate_key(key)?;
        if cancel.is_cancelled() {
            return Err(BucketError::Cancelled);
        }
        let session = self.store.session();
        let name = self.document_name(key);
        let row = sqlx::query("SELECT chunk_count FROM documents WHERE db = ? AND name = ?")
            .bind(&self.database)
            .bind(&name)
            .fetch_optional(&session)
            .await?;
        let Some(row) = row else {
            return Err(BucketError::not_found(key));
        };
        let chunk_count: i64 = row.get(0);
        Ok(Box::new(DocReader {
            session,
            database: self.database.clone(),
            name,
            seq: 0,
            chunk_count,
            cancel: cancel.clone(),
        }))
    }

    async fn remove(&self, cancel: &CancellationToken, key: &str) -> BucketResult<()> {
        validate_key(key)?;
        if cancel.is_cancelled() {
            return Err(BucketError::Cancelled);
        }
        let session = self.store.session();
        let name = self.document_name(key);
        remove_document(&session, &self.database, &name).await
    }

    async fn exists(&self, cancel: &CancellationToken, key: &str) -> BucketResult<bool> {
        validate_key(key)?;
        if cancel.is_cancelled() {
            return Err(BucketError::Cancelled);
        }
        let row = sqlx::query("SELECT 1 FROM documents WHERE db = ? AND name = ?")
            .bind(&self.database)
            .bind(self.document_name(key))
            .fetch_optional(&self.store.session())
            .await?;
        Ok(row.is_some())
    }

    async fn list(
        &self,
        cancel: &CancellationToken,
        prefix: &str,
    ) -> BucketResult<BucketIterator> {
        if cancel.is_cancelled() {
            return Err(BucketError::Cancelled);
        }
        if !prefix.is_empty() {
            validate_key(prefix)?;
        }
        let session = self.store.session();
        let database = self.database.clone();
        let full_prefix = join_key(&self.prefix, prefix);
        let bucket_prefix = self.prefix.clone();
        let bucket: Arc<dyn Bucket> = Arc::new(self.clone());
        let cancel = cancel.clone();
        debug!(prefix, full_prefix = %full_prefix, "listing documents");

        let stream: ItemStream = Box::pin(try_stream! {
            // LIKE pre-filters server-side; the exact (case-sensitive)
            // match happens below, so the pattern only has to be a
            // superset of the real prefix matches.
            let pattern = format!("{}%", escape_like(&full_prefix));
            let mut rows = sqlx::query(
                r"SELECT name FROM documents WHERE db = ? AND name LIKE ? ESCAPE '\' ORDER BY name",
            )
            .bind(&database)
            .bind(&pattern)
            .fetch(&session);
            while let Some(row) = rows.try_next().await? {
                if cancel.is_cancelled() {
                    Err(BucketError::Cancelled)?;
                }
                let name: String = row.get("name");
                if !name.starts_with(&full_prefix) {
                    continue;
                }
                let key = strip_key_prefix(&name, &bucket_prefix).to_string();
                yield BucketItem::new(key, Arc::clone(&bucket));
            }
        });
        Ok(BucketIterator::new(stream))
    }
}

async fn remove_document(session: &SqlitePool, database: &str, name: &str) -> BucketResult<()> {
    sqlx::query("DELETE FROM chunks WHERE db = ? AND name = ?")
        .bind(database)
        .bind(name)
        .execute(session)
        .await?;
    sqlx::query("DELETE FROM documents WHERE db = ? AND name = ?")
        .bind(database)
        .bind(name)
        .execute(session)
        .await?;
    Ok(())
}

/// Escape LIKE metacharacters so a literal prefix cannot over-match.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

struct DocWriter {
    session: SqlitePool,
    database: String,
    name: String,
    seq: i64,
    length: i64,
    buf: Vec<u8>,
    cancel: CancellationToken,
}

impl DocWriter {
    async fn flush_chunk(&mut self, chunk: Vec<u8>) -> BucketResult<()> {
        sqlx::query("INSERT INTO chunks (db, name, seq, data) VALUES (?, ?, ?, ?)")
            .bind(&self.database)
            .bind(&self.name)
            .bind(self.seq)
            .bind(chunk)
            .execute(&self.session)
            .await?;
        self.seq += 1;
        Ok(())
    }
}

#[async_trait]
impl BlobWriter for DocWriter {
    async fn write_chunk(&mut self, data: &[u8]) -> BucketResult<()> {
        if self.cancel.is_cancelled() {
            return Err(BucketError::Cancelled);
        }
        self.buf.extend_from_slice(data);
        self.length += data.len() as i64;
        while self.buf.len() >= CHUNK_SIZE {
            let rest = self.buf.split_off(CHUNK_SIZE);
            let chunk = std::mem::replace(&mut self.buf, rest);
            self.flush_chunk(chunk).await?;
        }
        Ok(())
    }

    async fn close(mut self: Box<Self>) -> BucketResult<()> {
        if self.cancel.is_cancelled() {
            return Err(BucketError::Cancelled);
        }
        if !self.buf.is_empty() {
            let chunk = std::mem::take(&mut self.buf);
            self.flush_chunk(chunk).await?;
        }
        // Committing the documents row is what makes the object visible.
        sqlx::query(
            "INSERT INTO documents (db, name, length, chunk_count, uploaded_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&self.database)
        .bind(&self.name)
        .bind(self.length)
        .bind(self.seq)
        .bind(unix_now())
        .execute(&self.session)
        .await?;
        debug!(name = %self.name, chunks = self.seq, "committed document");
        Ok(())
    }
}

struct DocReader {
    session: SqlitePool,
    database: String,
    name: String,
    seq: i64,
    chunk_count: i64,
    cancel: CancellationToken,
}

#[async_trait]
impl BlobReader for DocReader {
    async fn read_chunk(&mut self) -> BucketResult<Option<Bytes>> {
        if self.cancel.is_cancelled() {
            return Err(BucketError::Cancelled);
        }
        if self.seq >= self.chunk_count {
            return Ok(None);
        }
        let row = sqlx::query("SELECT data FROM chunks WHERE db = ? AND name = ? AND seq = ?")
            .bind(&self.database)
            .bind(&self.name)
            .bind(self.seq)
            .fetch_optional(&self.session)
            .await?;
        let Some(row) = row else {
            // The document row promised more segments than are present;
            // a concurrent overwrite or remove pulled them out from
            // under us.
            return Err(BucketError::backend(format!(
                "document '{}' is missing segment {} of {}",
                self.name, self.seq, self.chunk_count
            )));
        };
        let data: Vec<u8> = row.get(0);
        self.seq += 1;
        Ok(Some(Bytes::from(data)))
    }

    async fn close(self: Box<Self>) -> BucketResult<()> {
        Ok(())
    }
}
