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

//! Bucket error types and classification.
//!
//! Every failure a bucket operation can produce is classified into one of
//! the variants below before it reaches the caller. The display strings
//! name the operation stage that failed (opening, copying,
//! directory-creation, file-creation) so errors stay meaningful after
//! being stringified by callers.

use std::io;

use thiserror::Error;

/// Result type alias for bucket operations.
pub type BucketResult<T> = Result<T, BucketError>;

/// Which side of a byte copy failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferSide {
    /// The read half (source stream) produced the error.
    Source,
    /// The write half (destination stream) produced the error.
    Destination,
}

impl std::fmt::Display for TransferSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferSide::Source => write!(f, "from source"),
            TransferSide::Destination => write!(f, "to destination"),
        }
    }
}

/// Errors that can occur during bucket operations.
#[derive(Error, Debug)]
pub enum BucketError {
    /// Key or local path contains characters the backend cannot address.
    ///
    /// Raised before any I/O is attempted; never carries partial-success
    /// state.
    #[error("problem opening {0:?}: invalid name")]
    InvalidName(String),

    /// The target object, file, or bucket root does not exist.
    #[error("object not found: {0}")]
    NotFound(String),

    /// Intermediate structure (directories, files, documents) could not
    /// be created. Distinguished from plain I/O failure because it
    /// pinpoints setup rather than transfer.
    #[error("problem creating {target}: {source}")]
    CreateFailed {
        /// Human-readable description of what could not be created.
        target: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// An error occurred while copying bytes between two streams.
    #[error("problem copying data {side}: {source}")]
    Transfer {
        /// Which side of the copy failed.
        side: TransferSide,
        /// The underlying error from the failing stream.
        #[source]
        source: Box<BucketError>,
    },

    /// The operation scope was cancelled before or during the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// The underlying connection or session was closed or became
    /// unreachable mid-operation.
    #[error("backend session failure: {0}")]
    Session(String),

    /// The backend reached a state it cannot represent (for example a
    /// chunked document missing one of its segments).
    #[error("storage backend error: {0}")]
    Backend(String),

    /// Plain I/O error from the underlying medium.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error reported by the document store driver.
    #[error("document store error: {0}")]
    Database(#[source] sqlx::Error),
}

impl BucketError {
    /// Create an `InvalidName` error for the given key or path.
    pub fn invalid_name<S: Into<String>>(name: S) -> Self {
        BucketError::InvalidName(name.into())
    }

    /// Create a `NotFound` error for the given key or path.
    pub fn not_found<S: Into<String>>(name: S) -> Self {
        BucketError::NotFound(name.into())
    }

    /// Create a `CreateFailed` error naming the structure that could not
    /// be created.
    pub fn create_failed<S: Into<String>>(target: S, source: io::Error) -> Self {
        BucketError::CreateFailed {
            target: target.into(),
            source,
        }
    }

    /// Wrap a stream error as a transfer failure, recording which side
    /// of the copy produced it.
    pub fn transfer(side: TransferSide, source: BucketError) -> Self {
        BucketError::Transfer {
            side,
            source: Box::new(source),
        }
    }

    /// Create a `Session` error with context.
    pub fn session<S: Into<String>>(msg: S) -> Self {
        BucketError::Session(msg.into())
    }

    /// Create a `Backend` error with context.
    pub fn backend<S: Into<String>>(msg: S) -> Self {
        BucketError::Backend(msg.into())
    }

    /// True if this error (or the stream error it wraps) is a
    /// cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            BucketError::Cancelled => true,
            BucketError::Transfer { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// True if this error reports a missing object or path.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BucketError::NotFound(_))
    }
}

impl From<sqlx::Error> for BucketError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            // A closed or exhausted pool means the session handle the
            // bucket was constructed with is gone.
            sqlx::Error::PoolClosed => BucketError::session("connection pool is closed"),
            sqlx::Error::PoolTimedOut => {
                BucketError::session("timed out waiting for a pooled connection")
            }
            other => BucketError::Database(other),
        }
    }
}
