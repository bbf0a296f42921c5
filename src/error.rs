//! Crate-wide error types (spec §7).
//!
//! `BoardError` covers the error kinds named in the spec: Schema, Shape,
//! Resource and Semantic. Arithmetic errors (division by zero and similar)
//! are deliberately not represented here — per spec they propagate as
//! NaN/Inf following IEEE-754 rules, never as a `Result::Err`.
//!
//! A handful of public-contract functions (widening reads, cursor random
//! access, `append`, `merge`) are specified with a literal negative-integer
//! return contract. Those call sites build a `BoardError` internally and
//! adapt it to the documented code via [`BoardError::code`], so the numeric
//! contract is honored without forcing callers deeper in the crate to match
//! on magic constants.

use crate::types::ScalarType;
use thiserror::Error;

pub type BoardResult<T> = Result<T, BoardError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BoardError {
    // --- Schema ---
    #[error("unknown column '{name}'")]
    UnknownColumn { name: String },

    #[error("duplicate column '{name}'")]
    DuplicateColumn { name: String },

    #[error("type mismatch on column '{name}': expected {expected}, found {found}")]
    TypeMismatch {
        name: String,
        expected: ScalarType,
        found: ScalarType,
    },

    #[error("cannot widen {src} to {dst}")]
    IncompatibleWidening { src: ScalarType, dst: ScalarType },

    // --- Shape ---
    #[error("row count mismatch: board has {board_rows} rows, supplied data has {data_rows}")]
    RowCountMismatch { board_rows: usize, data_rows: usize },

    #[error("mask length {mask_len} does not match row count {row_count}")]
    MaskLengthMismatch { mask_len: usize, row_count: usize },

    #[error("row index {row} out of range for board with {len} rows")]
    RowIndexOutOfRange { row: usize, len: usize },

    // --- Resource ---
    #[error("allocation failed while reserving {requested} rows")]
    OutOfMemory { requested: usize },

    #[error("writer failed: {message}")]
    WriterFailure { message: String },

    #[error("io error: {0}")]
    Io(String),

    // --- Semantic ---
    #[error("aggregator '{agg}' is not separable and cannot be used with merge")]
    NonSeparableAggregator { agg: String },

    #[error("join projection column '{name}' could not be resolved on either side")]
    UnresolvedJoinColumn { name: String },

    #[error("unknown built-in function '{name}'")]
    UnknownFunction { name: String },

    #[error("column type {found} is not supported for this operation")]
    UnsupportedColumnType { found: ScalarType },

    #[error("missing buffer for column '{name}'")]
    MissingBuffer { name: String },

    #[error("display order is neither a prefix nor a full permutation of the column set")]
    InvalidDisplayOrder,

    #[error("cursor is not positioned; call fetch() first")]
    CursorNotPositioned,
}

impl BoardError {
    /// The negative status code a C-style public-contract function would
    /// return for this error, per spec §4.1/§7: type mismatches are `-2`,
    /// missing/unknown columns are `-1`, missing buffers are `-3`.
    pub fn code(&self) -> i64 {
        match self {
            BoardError::UnknownColumn { .. } => -1,
            BoardError::TypeMismatch { .. } | BoardError::IncompatibleWidening { .. } => -2,
            BoardError::MissingBuffer { .. } => -3,
            BoardError::DuplicateColumn { .. }
            | BoardError::RowCountMismatch { .. }
            | BoardError::MaskLengthMismatch { .. }
            | BoardError::RowIndexOutOfRange { .. }
            | BoardError::InvalidDisplayOrder => -4,
            BoardError::OutOfMemory { .. } => -5,
            BoardError::WriterFailure { .. } | BoardError::Io(_) => -4,
            BoardError::NonSeparableAggregator { .. }
            | BoardError::UnresolvedJoinColumn { .. }
            | BoardError::UnknownFunction { .. }
            | BoardError::UnsupportedColumnType { .. }
            | BoardError::CursorNotPositioned => -6,
        }
    }
}
