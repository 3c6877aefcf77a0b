//! Deterministic fingerprints and the heuristic similarity measures built on them.

use sha2::{Digest, Sha256};

use crate::models::{Classification, Parameters};

/// Characters of text that take part in the exact cache key.
pub const KEY_TEXT_PREFIX_CHARS: usize = 500;

/// Separator between classification levels; cannot appear in a level name
/// typed by a user.
const LEVEL_SEPARATOR: &str = "\u{1f}";

/// Hex-encoded SHA-256 of `data`.
fn digest(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

pub fn text_fingerprint(text: &str) -> String {
    digest(text.as_bytes())
}

pub fn classification_fingerprint(classification: &Classification) -> String {
    digest(classification.levels().join(LEVEL_SEPARATOR).as_bytes())
}

/// Digest of the parameters' debug form. The map is sorted, so equal sets
/// render the same regardless of insertion order, and unlike JSON the form
/// keeps non-finite floats and int/float variants apart.
pub fn parameters_fingerprint(parameters: &Parameters) -> String {
    digest(format!("{parameters:?}").as_bytes())
}

/// Leading `max_chars` characters of `text`, on a char boundary.
pub fn text_prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// One minus the positional mismatch rate of two fingerprints.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }

    let (a, b) = (a.as_bytes(), b.as_bytes());
    let max_len = a.len().max(b.len());
    let differences = (0..max_len).filter(|&i| a.get(i) != b.get(i)).count();

    1.0 - differences as f64 / max_len as f64
}

/// Key overlap scaled by value agreement: `(equal / union) * (common / union)`.
pub fn parameter_similarity(a: &Parameters, b: &Parameters) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let common = a.keys().filter(|k| b.contains_key(*k)).count();
    if common == 0 {
        return 0.0;
    }
    let union = a.len() + b.len() - common;
    let equal = a.iter().filter(|(k, v)| b.get(*k) == Some(*v)).count();

    (equal as f64 / union as f64) * (common as f64 / union as f64)
}
