// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Content fingerprinting for the repetition detector's rolling window and
//! for deduplicating re-delivered store writes.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of the sender-qualified content, used to detect
/// byte-identical re-delivery independent of the shingle-similarity check.
pub fn fingerprint(sender: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sender.as_bytes());
    hasher.update(b"\0");
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
#[path = "fingerprint_tests.rs"]
mod tests;
