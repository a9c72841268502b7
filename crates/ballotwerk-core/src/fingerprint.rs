// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Election fingerprinting — SHA-256 over the layout so a scanned page can be
// tied to the election it was printed for.

use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::layout::ElectionLayout;

/// Compute the SHA-256 hash of `data` and return it as a lowercase hex string.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Fingerprint of an election layout: the hash of its JSON serialization.
///
/// Struct fields serialize in declaration order, so the same layout always
/// yields the same fingerprint.
pub fn election_fingerprint(layout: &ElectionLayout) -> Result<String> {
    let canonical = serde_json::to_vec(layout)?;
    Ok(hash_bytes(&canonical))
}

/// Whether a prefix decoded from a page belongs to the expected fingerprint.
pub fn fingerprint_matches(expected: &str, decoded_prefix: &str) -> bool {
    !decoded_prefix.is_empty()
        && expected
            .get(..decoded_prefix.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(decoded_prefix))
}
