//! Key ranges in the etcd convention.
//!
//! A range is the half-open interval `[start, end)` over raw key bytes. The
//! prefix range of `p` ends at the lexicographic successor of `p`: the last
//! byte below `0xff` is incremented and everything after it is dropped.

use serde::{Deserialize, Serialize};

/// Range end meaning "every key from start onwards".
///
/// Returned when a prefix has no successor (empty, or all `0xff`).
pub const NO_PREFIX_END: &[u8] = &[0];

/// Compute the canonical upper bound of the prefix range of `key`.
///
/// `"/app/"` becomes `"/app0"`, since `'0'` follows `'/'`.
pub fn prefix_range_end(key: &[u8]) -> Vec<u8> {
    let mut end = key.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xff {
            end.push(last + 1);
            return end;
        }
    }
    NO_PREFIX_END.to_vec()
}

/// A half-open key range `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyRange {
    pub start: Vec<u8>,
    pub end: Vec<u8>,
}

impl KeyRange {
    /// Range covering every key that starts with `prefix`.
    pub fn prefix(prefix: &[u8]) -> Self {
        Self {
            start: prefix.to_vec(),
            end: prefix_range_end(prefix),
        }
    }

    /// Range with an explicit end.
    pub fn between(start: &[u8], end: &[u8]) -> Self {
        Self {
            start: start.to_vec(),
            end: end.to_vec(),
        }
    }

    /// Whether `end` is the canonical prefix bound of `start`.
    pub fn is_prefix(&self) -> bool {
        self.end == prefix_range_end(&self.start)
    }

    /// Whether `key` falls inside the range.
    pub fn contains(&self, key: &[u8]) -> bool {
        if key < self.start.as_slice() {
            return false;
        }
        // An end of `\0` is open-ended.
        self.end.as_slice() == NO_PREFIX_END || key < self.end.as_slice()
    }
}
