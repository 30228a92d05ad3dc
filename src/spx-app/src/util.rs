// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::path::{Component, Path, PathBuf};

/// Reduce a network-supplied filename to its terminal path component.
///
/// Applied at the coordinator boundary so recorders can trust their inputs.
/// Returns `None` when nothing usable remains (empty, `.`, `..`, bare
/// separators).
#[must_use]
pub fn sanitize_filename(name: &str) -> Option<String> {
    let path = Path::new(name);
    let last = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .last()?;
    if last.is_empty() || last == "." || last == ".." {
        return None;
    }
    Some(last.to_string())
}

/// Total bytes used by regular files directly inside `dir`.
///
/// Unreadable entries are skipped; a missing directory counts as empty.
#[must_use]
pub fn storage_usage_bytes(dir: &Path) -> u64 {
    let mut total = 0u64;
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    for entry in entries.flatten() {
        if let Ok(meta) = entry.metadata() {
            if meta.is_file() {
                total += meta.len();
            }
        }
    }
    total
}
