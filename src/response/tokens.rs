//! Token estimation for budget enforcement.
//!
//! The estimate is the classic chars/4 heuristic over the serialised
//! payload plus a flat structural overhead. It only needs to be consistent
//! and slightly pessimistic; the response builder compares it against hard
//! caps, never against a real tokenizer.

use serde::Serialize;

/// Average characters per token for JSON-ish payloads.
const CHARS_PER_TOKEN: usize = 4;
/// Flat allowance for envelope framing the serialised value doesn't show.
const STRUCTURAL_OVERHEAD: u32 = 40;

/// Estimates tokens for a serialisable value.
///
/// Serialisation failure estimates 0 — the caller is about to serialise
/// the same value for real and will surface that error properly.
#[must_use]
pub fn estimate<T: Serialize>(value: &T) -> u32 {
    match serde_json::to_string(value) {
        Ok(json) => estimate_str(&json) + STRUCTURAL_OVERHEAD,
        Err(_) => 0,
    }
}

/// Estimates tokens for a raw string.
#[must_use]
pub fn estimate_str(s: &str) -> u32 {
    (s.len().div_ceil(CHARS_PER_TOKEN)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_str() {
        assert_eq!(estimate_str(""), 0);
        assert_eq!(estimate_str("abcd"), 1);
        assert_eq!(estimate_str("abcde"), 2);
    }

    #[test]
    fn test_estimate_scales_with_payload() {
        let small = vec!["x"; 2];
        let large = vec!["a long entry with plenty of characters"; 50];
        assert!(estimate(&large) > estimate(&small));
    }

    #[test]
    fn test_estimate_includes_overhead() {
        let empty: Vec<String> = Vec::new();
        assert!(estimate(&empty) >= STRUCTURAL_OVERHEAD);
    }
}
