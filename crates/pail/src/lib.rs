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

//! Uniform bucket abstraction for named byte blobs.
//!
//! This crate provides one behavioral contract, the [`Bucket`] trait,
//! over storage media with very different native semantics:
//!
//! - Local filesystem directory trees (via [`LocalBucket`])
//! - A chunked document store behind a shared session handle (via
//!   [`DocStoreBucket`])
//!
//! # Architecture
//!
//! Callers construct a concrete backend, then depend exclusively on the
//! [`Bucket`] contract. Listing is exposed through a lazy, single-use
//! [`BucketIterator`]; bulk tree synchronization
//! ([`push`](Bucket::push)/[`pull`](Bucket::pull)) is implemented once,
//! in terms of the narrower per-backend primitives, so every backend
//! gets it for free.
//!
//! ## Core Concepts
//!
//! - **Keys**: opaque, `/`-delimited identifiers for stored blobs
//! - **Prefixes**: leading-substring filters for listing and sync
//! - **Operation scope**: every operation takes a
//!   [`CancellationToken`]; cancellation is polled at each blocking I/O
//!   boundary, so latency is bounded by one I/O step
//!
//! # Examples
//!
//! ```rust,no_run
//! use pail::{Bucket, LocalBucket};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), pail::BucketError> {
//!     let bucket = LocalBucket::new("/var/lib/pail");
//!     let cancel = CancellationToken::new();
//!
//!     bucket.put_bytes(&cancel, "reports/today.json", b"{}").await?;
//!     let data = bucket.get_bytes(&cancel, "reports/today.json").await?;
//!     assert_eq!(data, b"{}");
//!
//!     // Mirror the bucket into a local directory.
//!     bucket.pull(&cancel, "/tmp/mirror".as_ref(), "reports").await?;
//!     Ok(())
//! }
//! ```

pub mod docstore;
pub mod error;
pub mod item;
pub mod key;
pub mod local;
mod sync;

use std::fmt::Debug;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use docstore::{DocStore, DocStoreBucket, DocStoreOptions};
pub use error::{BucketError, BucketResult, TransferSide};
pub use item::{BucketItem, BucketIterator};
pub use local::LocalBucket;
pub use sync::walk_local_tree;

/// Buffer size for stream-to-stream copies.
const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// A scoped write handle bound to one key.
///
/// Closing is mandatory and finalizes the write: for the local backend
/// it flushes the file, for the document-store backend it commits the
/// chunked document. A handle dropped without
/// [`close`](BlobWriter::close) leaves no committed object behind on
/// backends with commit semantics.
#[async_trait]
pub trait BlobWriter: Send {
    /// Append a chunk of bytes to the destination.
    async fn write_chunk(&mut self, data: &[u8]) -> BucketResult<()>;

    /// Finalize and release the handle.
    async fn close(self: Box<Self>) -> BucketResult<()>;
}

/// A scoped read handle bound to one key.
#[async_trait]
pub trait BlobReader: Send {
    /// Read the next chunk of content; `None` signals end of stream.
    async fn read_chunk(&mut self) -> BucketResult<Option<Bytes>>;

    /// Release the handle.
    async fn close(self: Box<Self>) -> BucketResult<()>;
}

/// The abstract, backend-independent object-storage contract.
///
/// A bucket is a view over its medium, not a cache: it owns no in-memory
/// copy of its contents and is safe for concurrent use by multiple
/// callers. Write and read handles, by contrast, are exclusively owned
/// by the caller that opened them.
///
/// Every operation takes a [`CancellationToken`] as its first input; it
/// is the sole source of cancellation, and `list`/`push`/`pull` check it
/// before doing any work.
#[async_trait]
pub trait Bucket: Send + Sync + Debug {
    /// Verify the bucket is reachable and usable.
    async fn check(&self, cancel: &CancellationToken) -> BucketResult<()>;

    /// Open a stream that creates or overwrites `key`.
    ///
    /// For the local backend, intermediate directories are created as a
    /// side effect of opening, not of closing.
    async fn writer(
        &self,
        cancel: &CancellationToken,
        key: &str,
    ) -> BucketResult<Box<dyn BlobWriter>>;

    /// Open a stream that reads `key`; fails with a not-found error if
    /// the key does not exist.
    async fn reader(
        &self,
        cancel: &CancellationToken,
        key: &str,
    ) -> BucketResult<Box<dyn BlobReader>>;

    /// Delete one object. Removing a key that does not exist is not an
    /// error.
    async fn remove(&self, cancel: &CancellationToken, key: &str) -> BucketResult<()>;

    /// Enumerate all keys starting with `prefix` (empty lists
    /// everything).
    ///
    /// Fails immediately if the operation scope is already cancelled;
    /// this is a fail-fast contract, not a failure deferred to the first
    /// `next` call.
    async fn list(&self, cancel: &CancellationToken, prefix: &str)
        -> BucketResult<BucketIterator>;

    /// Probe whether `key` exists without reading its content.
    async fn exists(&self, cancel: &CancellationToken, key: &str) -> BucketResult<bool>;

    /// Write the full content of `source` to `key`.
    ///
    /// If the source stream errors mid-copy the partially written object
    /// is not rolled back; this is backend-specific, non-transactional
    /// behavior.
    async fn put(
        &self,
        cancel: &CancellationToken,
        key: &str,
        source: &mut (dyn AsyncRead + Send + Unpin),
    ) -> BucketResult<()> {
        let mut writer = self.writer(cancel, key).await?;
        let mut buf = vec![0u8; COPY_CHUNK_SIZE];
        loop {
            let n = match source.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) => {
                    return Err(BucketError::transfer(
                        TransferSide::Source,
                        BucketError::Io(err),
                    ))
                }
            };
            writer
                .write_chunk(&buf[..n])
                .await
                .map_err(|err| BucketError::transfer(TransferSide::Destination, err))?;
        }
        writer.close().await
    }

    /// Open a read stream over `key`; alias for
    /// [`reader`](Bucket::reader) intended for single full reads.
    async fn get(
        &self,
        cancel: &CancellationToken,
        key: &str,
    ) -> BucketResult<Box<dyn BlobReader>> {
        self.reader(cancel, key).await
    }

    /// Store a whole in-memory blob under `key`.
    async fn put_bytes(
        &self,
        cancel: &CancellationToken,
        key: &str,
        data: &[u8],
    ) -> BucketResult<()> {
        let mut writer = self.writer(cancel, key).await?;
        writer.write_chunk(data).await?;
        writer.close().await
    }

    /// Read the whole content of `key` into memory.
    async fn get_bytes(&self, cancel: &CancellationToken, key: &str) -> BucketResult<Vec<u8>> {
        let mut reader = self.reader(cancel, key).await?;
        let mut out = Vec::new();
        while let Some(chunk) = reader.read_chunk().await? {
            out.extend_from_slice(&chunk);
        }
        reader.close().await?;
        Ok(out)
    }

    /// Duplicate the content of `src_key` under `dst_key` within this
    /// bucket. The returned error names which side failed.
    async fn copy(
        &self,
        cancel: &CancellationToken,
        src_key: &str,
        dst_key: &str,
    ) -> BucketResult<()> {
        let mut reader = self.reader(cancel, src_key).await?;
        let mut writer = self.writer(cancel, dst_key).await?;
        loop {
            let chunk = reader
                .read_chunk()
                .await
                .map_err(|err| BucketError::transfer(TransferSide::Source, err))?;
            match chunk {
                Some(chunk) => writer
                    .write_chunk(&chunk)
                    .await
                    .map_err(|err| BucketError::transfer(TransferSide::Destination, err))?,
                None => break,
            }
        }
        reader.close().await?;
        writer.close().await
    }

    /// Transfer one local file into the bucket under `key`.
    async fn upload(
        &self,
        cancel: &CancellationToken,
        key: &str,
        local: &Path,
    ) -> BucketResult<()> {
        key::validate_local_path(local)?;
        let mut file = match fs::File::open(local).await {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(BucketError::not_found(local.to_string_lossy()))
            }
            Err(err) => return Err(err.into()),
        };
        self.put(cancel, key, &mut file).await
    }

    /// Transfer one object out of the bucket into a local file,
    /// overwriting it.
    ///
    /// Failure to create the destination's parent directory and failure
    /// to create the destination file itself are reported as distinct
    /// error kinds; they arise from different points in the operation.
    async fn download(
        &self,
        cancel: &CancellationToken,
        key: &str,
        local: &Path,
    ) -> BucketResult<()> {
        let mut reader = self.reader(cancel, key).await?;
        if let Some(parent) = local.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(|err| {
                    BucketError::create_failed(
                        format!("enclosing directory '{}'", parent.display()),
                        err,
                    )
                })?;
            }
        }
        let mut file = fs::File::create(local)
            .await
            .map_err(|err| BucketError::create_failed(format!("file '{}'", local.display()), err))?;
        while let Some(chunk) = reader
            .read_chunk()
            .await
            .map_err(|err| BucketError::transfer(TransferSide::Source, err))?
        {
            file.write_all(&chunk).await.map_err(|err| {
                BucketError::transfer(TransferSide::Destination, BucketError::Io(err))
            })?;
        }
        reader.close().await?;
        file.flush().await?;
        Ok(())
    }

    /// Mirror a local directory tree into the bucket under
    /// `remote_prefix`.
    ///
    /// Every regular file below `local` is uploaded to
    /// `join(remote_prefix, relative_path)`, overwriting existing
    /// objects. Re-running with identical inputs produces an identical
    /// key set. Cancellation aborts the walk; partial progress is
    /// possible and acceptable.
    async fn push(
        &self,
        cancel: &CancellationToken,
        local: &Path,
        remote_prefix: &str,
    ) -> BucketResult<()> {
        let files = sync::walk_local_tree(cancel, local).await?;
        debug!(
            files = files.len(),
            prefix = remote_prefix,
            "pushing local tree"
        );
        for rel in files {
            if cancel.is_cancelled() {
                return Err(BucketError::Cancelled);
            }
            let dest = key::join_key(remote_prefix, &rel);
            self.upload(cancel, &dest, &local.join(key::key_to_rel_path(&rel)))
                .await?;
        }
        Ok(())
    }

    /// Mirror the keys under `remote_prefix` into a local directory
    /// tree.
    ///
    /// Additive and overwriting: local files absent from the remote key
    /// set are never deleted. Cancellation aborts mid-listing or
    /// mid-transfer; files already written remain on disk.
    async fn pull(
        &self,
        cancel: &CancellationToken,
        local: &Path,
        remote_prefix: &str,
    ) -> BucketResult<()> {
        let mut iter = self.list(cancel, remote_prefix).await?;
        while iter.next(cancel).await {
            let Some(item) = iter.item() else { break };
            let name = item.name().to_string();
            let rel = key::strip_key_prefix(&name, remote_prefix).to_string();
            let dest = local.join(key::key_to_rel_path(&rel));
            self.download(cancel, &name, &dest).await?;
        }
        match iter.take_err() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
