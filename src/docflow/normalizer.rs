// SPDX-License-Identifier: MIT

//! Query normalization
//!
//! Canonical form used by every downstream step: lowercase, whitespace runs
//! collapsed to single spaces, no leading or trailing whitespace.

/// Normalize a raw query string.
///
/// Pure and total: the empty string maps to the empty string, and the
/// function is idempotent.
pub fn normalize(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
