//! Dictionary: interns strings into small unsigned integer codes for
//! `Category` columns (spec §2, §3).
//!
//! Code `0` is reserved for "unknown" and is never assigned to a real
//! string. Codes are assigned densely starting at 1 in first-insertion
//! order. A `Dictionary` is cheap to clone — it wraps an `Arc` so it can be
//! shallow-copied across `Column`s the same way a `TypedBuffer` is, until a
//! write forces a unique copy.

use ahash::AHashMap;
use smol_str::SmolStr;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Inner {
    strings: Vec<SmolStr>,
    codes: AHashMap<SmolStr, u32>,
}

/// A bidirectional mapping between short strings and dictionary codes.
#[derive(Debug, Clone, Default)]
pub struct Dictionary(Arc<Inner>);

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct real (non-unknown) strings interned so far.
    pub fn size(&self) -> usize {
        self.0.strings.len()
    }

    /// Look up the code for `s`, if already interned.
    pub fn code_of(&self, s: &str) -> Option<u32> {
        self.0.codes.get(s).copied()
    }

    /// Resolve a code back to its string. Code `0` ("unknown") has no
    /// string and returns `None`.
    pub fn str_of(&self, code: u32) -> Option<&str> {
        if code == 0 {
            return None;
        }
        self.0.strings.get((code - 1) as usize).map(|s| s.as_str())
    }

    /// Intern `s`, returning its code. Uniquifies the dictionary (a
    /// `make-unique-before-write` guard, mirroring `TypedBuffer`) so that
    /// other `Column`s sharing this dictionary are unaffected.
    pub fn intern(&mut self, s: &str) -> u32 {
        if let Some(code) = self.0.codes.get(s) {
            return *code;
        }
        let inner = Arc::make_mut(&mut self.0);
        let code = inner.strings.len() as u32 + 1;
        let smol: SmolStr = s.into();
        inner.strings.push(smol.clone());
        inner.codes.insert(smol, code);
        code
    }

    pub fn is_empty(&self) -> bool {
        self.0.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_assigns_dense_codes_from_one() {
        let mut dict = Dictionary::new();
        assert_eq!(dict.intern("a"), 1);
        assert_eq!(dict.intern("b"), 2);
        assert_eq!(dict.intern("a"), 1);
        assert_eq!(dict.size(), 2);
    }

    #[test]
    fn code_zero_is_unknown() {
        let dict = Dictionary::new();
        assert_eq!(dict.str_of(0), None);
    }

    #[test]
    fn round_trip_str_and_code() {
        let mut dict = Dictionary::new();
        let c = dict.intern("hello");
        assert_eq!(dict.str_of(c), Some("hello"));
        assert_eq!(dict.code_of("hello"), Some(c));
        assert_eq!(dict.code_of("missing"), None);
    }

    #[test]
    fn clone_shares_until_write() {
        let mut dict = Dictionary::new();
        dict.intern("a");
        let mut clone = dict.clone();
        assert_eq!(clone.size(), 1);
        clone.intern("b");
        assert_eq!(clone.size(), 2);
        assert_eq!(dict.size(), 1, "original must not observe the clone's write");
    }
}
