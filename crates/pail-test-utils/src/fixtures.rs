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

//! Test data builders.
//!
//! Random keys and payloads for bucket round-trip tests, plus an
//! on-disk tree builder for Push/Pull mirror tests.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

/// A random 32-character hex key, unique for all practical purposes.
pub fn random_key() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

/// A random multi-line payload.
pub fn random_payload() -> String {
    format!("{}\n{}\n{}", random_key(), random_key(), random_key())
}

/// Generate `n` unique key/payload pairs.
pub fn unique_blobs(n: usize) -> HashMap<String, String> {
    let mut out = HashMap::with_capacity(n);
    while out.len() < n {
        out.insert(random_key(), random_payload());
    }
    out
}

/// Write `n` random flat files below `root`, creating it if needed.
///
/// Returns the file names (which are also valid bucket keys).
pub fn populate_tree(root: &Path, n: usize) -> io::Result<Vec<String>> {
    fs::create_dir_all(root)?;
    let mut names = Vec::with_capacity(n);
    for _ in 0..n {
        let name = random_key();
        fs::write(root.join(&name), random_payload())?;
        names.push(name);
    }
    Ok(names)
}
