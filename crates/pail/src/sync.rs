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

//! Local-tree enumeration for the Push/Pull synchronizer.

use std::path::Path;

use tokio::fs;
use tokio_util::sync::CancellationToken;

use crate::error::{BucketError, BucketResult};
use crate::key::rel_path_to_key;

/// Enumerate every regular file below `root`, returning their
/// `/`-delimited paths relative to it.
///
/// Directories are not represented in the result; they exist only as
/// segments of the returned keys. Cancellation is checked at every
/// directory step, so aborting a walk over a large tree does not wait
/// for the walk to finish.
pub async fn walk_local_tree(
    cancel: &CancellationToken,
    root: &Path,
) -> BucketResult<Vec<String>> {
    let mut out = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        if cancel.is_cancelled() {
            return Err(BucketError::Cancelled);
        }
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                if let Ok(rel) = entry.path().strip_prefix(root) {
                    out.push(rel_path_to_key(rel));
                }
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn write(root: &Path, rel: &str, data: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.unwrap();
        }
        fs::write(path, data).await.unwrap();
    }

    #[tokio::test]
    async fn walk_yields_relative_slash_delimited_keys() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", "one").await;
        write(dir.path(), "nested/b.txt", "two").await;
        write(dir.path(), "nested/deeper/c.txt", "three").await;

        let cancel = CancellationToken::new();
        let mut files = walk_local_tree(&cancel, dir.path()).await.unwrap();
        files.sort();
        assert_eq!(files, vec!["a.txt", "nested/b.txt", "nested/deeper/c.txt"]);
    }

    #[tokio::test]
    async fn walk_fails_fast_when_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", "one").await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = walk_local_tree(&cancel, dir.path()).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn walk_errors_on_missing_root() {
        let cancel = CancellationToken::new();
        let missing = Path::new("/definitely/not/here");
        assert!(walk_local_tree(&cancel, missing).await.is_err());
    }
}
