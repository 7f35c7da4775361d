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

//! Listing items and the backend-agnostic iterator protocol.
//!
//! Backends adapt their native cursors (directory walks, document-store
//! result sets) into a lazy stream of [`BucketItem`]s; the
//! [`BucketIterator`] wraps that stream behind the uniform
//! `next`/`item`/`err` protocol. Iterators are single-use, forward-only,
//! and not restartable.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::{BucketError, BucketResult};
use crate::{BlobReader, Bucket};

/// The lazy stream of items a backend produces for one listing call.
pub(crate) type ItemStream = Pin<Box<dyn Stream<Item = BucketResult<BucketItem>> + Send>>;

/// One stored blob as observed during a listing.
///
/// An item is a name plus a handle back to the bucket that produced it;
/// it owns no backend resources until [`get`](BucketItem::get) opens a
/// fresh content stream.
pub struct BucketItem {
    name: String,
    bucket: Arc<dyn Bucket>,
}

impl BucketItem {
    pub(crate) fn new(name: String, bucket: Arc<dyn Bucket>) -> Self {
        BucketItem { name, bucket }
    }

    /// The item's full key within the bucket.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle to the bucket this item was listed from.
    pub fn bucket(&self) -> Arc<dyn Bucket> {
        Arc::clone(&self.bucket)
    }

    /// Open a fresh read stream over the item's content.
    pub async fn get(&self, cancel: &CancellationToken) -> BucketResult<Box<dyn BlobReader>> {
        self.bucket.reader(cancel, &self.name).await
    }
}

impl fmt::Debug for BucketItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketItem")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Single-use, forward-only cursor over the items matching a prefix.
///
/// Advance with [`next`](BucketIterator::next) until it returns `false`,
/// then consult [`err`](BucketIterator::err) to distinguish exhaustion
/// from a terminal failure (including cancellation). Not safe for
/// concurrent advancement by multiple callers.
pub struct BucketIterator {
    stream: Option<ItemStream>,
    current: Option<BucketItem>,
    error: Option<BucketError>,
}

impl BucketIterator {
    pub(crate) fn new(stream: ItemStream) -> Self {
        BucketIterator {
            stream: Some(stream),
            current: None,
            error: None,
        }
    }

    /// An iterator that is exhausted from the start.
    ///
    /// Listing a prefix that matches nothing is not a failure, so
    /// backends return this rather than an error.
    pub(crate) fn empty() -> Self {
        BucketIterator {
            stream: None,
            current: None,
            error: None,
        }
    }

    /// Advance to the next item.
    ///
    /// Returns `true` if an item is available via
    /// [`item`](BucketIterator::item). Cancellation of the operation
    /// scope terminates the iteration and is reported through
    /// [`err`](BucketIterator::err).
    pub async fn next(&mut self, cancel: &CancellationToken) -> bool {
        self.current = None;
        if self.error.is_some() {
            return false;
        }
        let Some(mut stream) = self.stream.take() else {
            return false;
        };
        let step = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(BucketError::Cancelled),
            step = stream.next() => Ok(step),
        };
        match step {
            Ok(Some(Ok(item))) => {
                self.stream = Some(stream);
                self.current = Some(item);
                true
            }
            Ok(Some(Err(err))) | Err(err) => {
                self.error = Some(err);
                false
            }
            Ok(None) => false,
        }
    }

    /// The item produced by the most recent successful
    /// [`next`](BucketIterator::next) call, if any.
    pub fn item(&self) -> Option<&BucketItem> {
        self.current.as_ref()
    }

    /// The terminal error, if iteration ended because of one.
    pub fn err(&self) -> Option<&BucketError> {
        self.error.as_ref()
    }

    /// Take ownership of the terminal error, if any.
    pub fn take_err(&mut self) -> Option<BucketError> {
        self.error.take()
    }
}

impl fmt::Debug for BucketIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketIterator")
            .field("live", &self.stream.is_some())
            .field("current", &self.current)
            .field("error", &self.error)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_iterator_is_exhausted_without_error() {
        let cancel = CancellationToken::new();
        let mut iter = BucketIterator::empty();
        assert!(!iter.next(&cancel).await);
        assert!(iter.item().is_none());
        assert!(iter.err().is_none());
    }

    #[tokio::test]
    async fn cancelled_scope_terminates_iteration() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let stream: ItemStream = Box::pin(futures::stream::pending());
        let mut iter = BucketIterator::new(stream);
        assert!(!iter.next(&cancel).await);
        assert!(matches!(iter.err(), Some(BucketError::Cancelled)));
    }
}
