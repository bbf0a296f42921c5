//! boardframe: an in-memory columnar analytics engine.
//!
//! A Board holds typed columns of equal length and supports SQL-like
//! filter/project/group-by/merge/order/join operators (spec §1–§4). See
//! `DESIGN.md` for the grounding ledger behind each module.

pub mod bitmap;
pub mod board;
pub mod buffer;
pub mod bundler;
pub mod collab;
pub mod column;
pub mod config;
pub mod cursor;
pub mod dict;
pub mod error;
pub mod expr;
pub mod groupby;
pub mod join;
pub mod merger;
pub mod ordering;
pub mod projector;
pub mod scalar;
pub mod scanner;
pub mod sentinel;
pub mod types;

pub use board::{Board, CancellationToken, GroupClause, GroupTerm, ProjectClause, ProjectTerm, SharedBoard};
pub use collab::{Bundler, Group, IndexProvider, MessageSink, PartitionStore};
pub use column::Column;
pub use config::{ConfigError, EngineConfig};
pub use cursor::{Cursor, Row};
pub use dict::Dictionary;
pub use error::{BoardError, BoardResult};
pub use expr::{ArithExpr, BinaryOp, ExprTree, UnaryOp};
pub use groupby::AggKind;
pub use join::JoinEngine;
pub use scalar::{CompareOp, ExtremeValue, Literal};
pub use types::ScalarType;
