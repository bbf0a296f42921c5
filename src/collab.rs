//! External collaborator traits (spec §6): the parser, the persistent
//! partition store, the Bundler and the index provider are all named as
//! interface contracts rather than concrete implementations. The expression
//! parser is deliberately *not* represented here — an `ExprTree` arrives
//! already parsed, built directly by the caller.
//!
//! Each trait is kept small and free of any concrete storage/transport
//! choice so the crate is testable with an in-memory fake, mirroring how
//! the teacher keeps `input`/`output` as plain functions a caller wires up
//! to real files rather than baking file I/O into the rule engine itself.

use crate::bitmap::Bitmap;
use crate::board::Board;
use crate::error::BoardResult;
use crate::expr::ExprTree;

/// Reads and writes a Board's in-memory contents to a persistent partition
/// directory (spec §6): one file per column plus a `-part.txt` metadata
/// sidecar, and a `.msk` validity-bitmap sidecar when any column's bitmap
/// is non-trivial.
pub trait PartitionStore {
    /// Writes `board`'s current contents under `dir/name`, using
    /// `description` for the metadata sidecar.
    fn backup(&mut self, dir: &str, name: &str, description: &str, board: &Board) -> BoardResult<()>;

    /// Reads a previously-written partition back into a Board.
    fn restore(&mut self, dir: &str, name: &str) -> BoardResult<Board>;
}

/// One distinct key tuple's membership, as produced by a [`Bundler`]: the
/// row count and the row offsets (into the Bundler's input Board) that
/// share this key.
#[derive(Debug, Clone)]
pub struct Group {
    pub row_count: usize,
    pub rows: Vec<usize>,
}

/// Given a Board and an ordered list of key column names, groups rows by
/// equal key tuples (spec §4.5 step 2): "assumed to sort by the keys and
/// segment equal runs". A caller may substitute a hash- or index-based
/// grouper; the crate ships one default sort-based implementation
/// ([`crate::bundler::sort_bundle`]).
pub trait Bundler {
    /// Returns the distinct key-tuple row (as indices into `board`'s key
    /// columns, in the Bundler's chosen key order) paired with the group
    /// of input rows sharing that key. Groups are returned in the
    /// Bundler's key-sorted order so downstream merge operations see a
    /// consistent lexicographic order across partitions (spec §4.6: "Keys'
    /// lexicographic order must match the order used by the Bundler").
    fn bundle(&self, board: &Board, key_columns: &[String]) -> BoardResult<Vec<Group>>;
}

/// Optional pre-computed mask provider (spec §6): "if present, Scanner may
/// ask it for a pre-computed mask instead of scanning". Absent by default;
/// `Scanner` falls back to evaluating the predicate directly.
pub trait IndexProvider {
    /// Returns a pre-computed mask for `predicate` against `board`, if this
    /// provider has an index covering it.
    fn lookup(&self, board: &Board, predicate: &ExprTree) -> Option<Bitmap>;
}

/// Sink for progress/warning messages gated by `EngineConfig::verbosity`
/// (spec §6's Logger collaborator). The crate emits through the `log`
/// facade directly (`log::debug!`/`log::warn!`); this trait exists only for
/// callers who want to intercept messages without installing a global
/// logger.
pub trait MessageSink {
    fn progress(&mut self, message: &str);
    fn warning(&mut self, message: &str);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingSink {
        progress: RefCell<Vec<String>>,
        warnings: RefCell<Vec<String>>,
    }

    impl MessageSink for RecordingSink {
        fn progress(&mut self, message: &str) {
            self.progress.borrow_mut().push(message.to_string());
        }
        fn warning(&mut self, message: &str) {
            self.warnings.borrow_mut().push(message.to_string());
        }
    }

    #[test]
    fn message_sink_records_both_channels() {
        let mut sink = RecordingSink::default();
        sink.progress("scanning partition 1");
        sink.warning("ambiguous join column resolved to R side");
        assert_eq!(sink.progress.borrow().len(), 1);
        assert_eq!(sink.warnings.borrow().len(), 1);
    }
}
