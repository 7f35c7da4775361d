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

//! Local filesystem bucket backend.
//!
//! Maps keys directly onto relative paths below a root directory, with
//! async I/O via `tokio::fs`. The `/` key delimiter maps to the
//! platform path separator on disk, so a bucket written on one platform
//! lists identically on another.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_stream::try_stream;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{BucketError, BucketResult};
use crate::item::{BucketItem, BucketIterator, ItemStream};
use crate::key::{join_key, key_to_rel_path, rel_path_to_key, validate_key};
use crate::{BlobReader, BlobWriter, Bucket};

/// Read buffer size for local content streams.
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Bucket backend rooted at a local directory.
///
/// The backend holds no open resources of its own; it is a cheap,
/// clonable view over the directory tree and is safe for concurrent use.
#[derive(Clone)]
pub struct LocalBucket {
    root: PathBuf,
}

impl LocalBucket {
    /// Create a bucket view over the directory at `root`.
    ///
    /// The directory is not created here; `check` reports whether it is
    /// usable, and writers create intermediate directories on open.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        LocalBucket { root: root.into() }
    }

    /// The root directory this bucket maps keys under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(key_to_rel_path(key))
    }
}

impl fmt::Debug for LocalBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalBucket")
            .field("root", &self.root)
            .finish()
    }
}

#[async_trait]
impl Bucket for LocalBucket {
    async fn check(&self, cancel: &CancellationToken) -> BucketResult<()> {
        if cancel.is_cancelled() {
            return Err(BucketError::Cancelled);
        }
        match fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(BucketError::backend(format!(
                "root '{}' exists but is not a directory",
                self.root.display()
            ))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(BucketError::not_found(self.root.to_string_lossy()))
            }
            Err(err) => Err(err.into()),
        }
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
        let path = self.object_path(key);
        // Intermediate directories are a side effect of opening the
        // writer, not of closing it.
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|err| {
                BucketError::create_failed(
                    format!("base directories for '{}'", parent.display()),
                    err,
                )
            })?;
        }
        let file = fs::File::create(&path).await?;
        debug!(key, path = %path.display(), "opened local writer");
        Ok(Box::new(LocalWriter {
            file,
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
        let path = self.object_path(key);
        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(BucketError::not_found(key))
            }
            Err(err) => return Err(err.into()),
        };
        Ok(Box::new(LocalReader {
            file,
            cancel: cancel.clone(),
        }))
    }

    async fn remove(&self, cancel: &CancellationToken, key: &str) -> BucketResult<()> {
        validate_key(key)?;
        if cancel.is_cancelled() {
            return Err(BucketError::Cancelled);
        }
        match fs::remove_file(self.object_path(key)).await {
            Ok(()) => Ok(()),
            // Removing a key that does not exist is not an error.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn exists(&self, cancel: &CancellationToken, key: &str) -> BucketResult<bool> {
        validate_key(key)?;
        if cancel.is_cancelled() {
            return Err(BucketError::Cancelled);
        }
        match fs::metadata(self.object_path(key)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
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
        let base = if prefix.is_empty() {
            self.root.clone()
        } else {
            self.root.join(key_to_rel_path(prefix))
        };
        let meta = match fs::metadata(&base).await {
            Ok(meta) => meta,
            // A prefix that matches nothing is not a failure.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BucketIterator::empty())
            }
            Err(err) => return Err(err.into()),
        };
        debug!(prefix, base = %base.display(), "listing local subtree");

        let bucket: Arc<dyn Bucket> = Arc::new(self.clone());
        if meta.is_file() {
            // The prefix names a single object rather than a subtree.
            let item = BucketItem::new(prefix.to_string(), bucket);
            let stream: ItemStream =
                Box::pin(futures::stream::once(async { Ok::<_, BucketError>(item) }));
            return Ok(BucketIterator::new(stream));
        }

        let prefix = prefix.to_string();
        let cancel = cancel.clone();
        let stream: ItemStream = Box::pin(try_stream! {
            let mut pending = vec![base.clone()];
            while let Some(dir) = pending.pop() {
                if cancel.is_cancelled() {
                    Err(BucketError::Cancelled)?;
                }
                let mut entries = fs::read_dir(&dir).await?;
                while let Some(entry) = entries.next_entry().await? {
                    let file_type = entry.file_type().await?;
                    if file_type.is_dir() {
                        pending.push(entry.path());
                    } else if file_type.is_file() {
                        let path = entry.path();
                        let Ok(rel) = path.strip_prefix(&base) else {
                            continue;
                        };
                        let name = join_key(&prefix, &rel_path_to_key(rel));
                        yield BucketItem::new(name, Arc::clone(&bucket));
                    }
                }
            }
        });
        Ok(BucketIterator::new(stream))
    }
}

struct LocalWriter {
    file: fs::File,
    cancel: CancellationToken,
}

#[async_trait]
impl BlobWriter for LocalWriter {
    async fn write_chunk(&mut self, data: &[u8]) -> BucketResult<()> {
        if self.cancel.is_cancelled() {
            return Err(BucketError::Cancelled);
        }
        self.file.write_all(data).await?;
        Ok(())
    }

    async fn close(mut self: Box<Self>) -> BucketResult<()> {
        self.file.flush().await?;
        Ok(())
    }
}

struct LocalReader {
    file: fs::File,
    cancel: CancellationToken,
}

#[async_trait]
impl BlobReader for LocalReader {
    async fn read_chunk(&mut self) -> BucketResult<Option<Bytes>> {
        if self.cancel.is_cancelled() {
            return Err(BucketError::Cancelled);
        }
        let mut buf = vec![0u8; READ_CHUNK_SIZE];
        let n = self.file.read(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(Bytes::from(buf)))
    }

    async fn close(self: Box<Self>) -> BucketResult<()> {
        Ok(())
    }
}
