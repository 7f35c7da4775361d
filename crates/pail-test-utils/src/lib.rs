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

//! Shared test fixtures for the pail workspace.

pub mod fixtures;

pub use fixtures::{populate_tree, random_key, random_payload, unique_blobs};
