//! `Board`: an ordered set of equal-length Columns plus row count and an
//! optional display order (spec §3, §4.2). The public contract named in
//! §6's "exposed interface" minimum set lives here.
//!
//! Mutating operations (`append`, `reorder`, `limit`, `reverseRows`,
//! `merge`) take `&mut self`; read-only operations (`select`, `dump`,
//! `describe`, `groupby`, `join`) take `&self` — matching §5's lock-mode
//! split, which [`SharedBoard`] enforces with a real `RwLock` for callers
//! who need the governed-access story rather than plain Rust borrowing.

use crate::bitmap::Bitmap;
use crate::collab::{Bundler, PartitionStore};
use crate::column::Column;
use crate::error::{BoardError, BoardResult};
use crate::expr::{ArithExpr, ExprTree};
use crate::groupby::AggKind;
use crate::scalar::Literal;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::RwLock;
use smol_str::SmolStr;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

/// A select-clause term, evaluated by the [`crate::projector::Projector`]
/// (spec §4.4).
#[derive(Debug, Clone)]
pub enum ProjectTerm {
    Variable(String),
    NumLiteral(f64),
    StrLiteral(String),
    CountStar,
    Arith(ArithExpr),
}

/// A top-level select clause: an ordered list of `(output name, term)`
/// pairs. Order defines both the Projector's output column order and,
/// when all terms are plain variables, the display order of the result.
#[derive(Debug, Clone, Default)]
pub struct ProjectClause(pub Vec<(String, ProjectTerm)>);

/// A group-by clause term: either a bare key (no aggregator) or an
/// aggregator applied to a named column (spec §4.5). `CntStar` ignores its
/// column argument.
#[derive(Debug, Clone)]
pub enum GroupTerm {
    Key(String),
    Agg(AggKind, String),
}

#[derive(Debug, Clone, Default)]
pub struct GroupClause(pub Vec<(String, GroupTerm)>);

/// A cooperative cancellation flag checked at row-chunk granularity by
/// long-running operators (spec §5).
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct Board {
    name: String,
    description: String,
    created_at: DateTime<Utc>,
    columns: IndexMap<SmolStr, Column>,
    display_order: Option<Vec<String>>,
    row_count: usize,
    row_validity: Bitmap,
}

fn normalize(name: &str) -> SmolStr {
    SmolStr::new(name.to_lowercase())
}

impl Board {
    /// Builds a Board from already-constructed columns, validating that
    /// every column has the same length and that names are unique under
    /// case-insensitive comparison (spec §3 Board invariants).
    pub fn from_columns(
        name: impl Into<String>,
        description: impl Into<String>,
        columns: Vec<Column>,
    ) -> BoardResult<Board> {
        let row_count = columns.first().map(|c| c.len()).unwrap_or(0);
        let mut map = IndexMap::with_capacity(columns.len());
        for col in columns {
            if col.len() != row_count {
                return Err(BoardError::RowCountMismatch {
                    board_rows: row_count,
                    data_rows: col.len(),
                });
            }
            let key = normalize(col.name());
            if map.contains_key(&key) {
                return Err(BoardError::DuplicateColumn {
                    name: col.name().to_string(),
                });
            }
            map.insert(key, col);
        }
        Ok(Board {
            name: name.into(),
            description: description.into(),
            created_at: Utc::now(),
            columns: map,
            display_order: None,
            row_count,
            row_validity: Bitmap::new_set(row_count),
        })
    }

    /// Exposed-interface constructor (spec §6): builds a Board directly
    /// from raw typed buffers plus a parallel schema of `(name, type,
    /// description)` triples. Dictionaries, if any, are supplied in the
    /// same order as the `Category` columns appear in `schema`.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        row_count: usize,
        buffers: Vec<crate::buffer::TypedBuffer>,
        schema: Vec<(String, crate::types::ScalarType, String)>,
        mut dictionaries: Vec<crate::dict::Dictionary>,
    ) -> BoardResult<Board> {
        if buffers.len() != schema.len() {
            return Err(BoardError::RowCountMismatch {
                board_rows: schema.len(),
                data_rows: buffers.len(),
            });
        }
        let mut columns = Vec::with_capacity(buffers.len());
        let mut dict_iter = dictionaries.drain(..);
        for (buffer, (col_name, ty, desc)) in buffers.into_iter().zip(schema) {
            let dict = if ty == crate::types::ScalarType::Category {
                dict_iter.next()
            } else {
                None
            };
            let validity = Bitmap::new_set(buffer.len());
            columns.push(Column::from_parts(col_name, ty, desc, buffer, validity, dict)?);
        }
        Board::from_columns(name, description, columns)
    }

    /// An empty placeholder Board with no columns and zero rows — the
    /// "empty answer" result for operators whose predicate matches nothing
    /// (spec §8 boundary behaviours).
    pub fn empty(name: impl Into<String>) -> Board {
        Board {
            name: name.into(),
            description: String::new(),
            created_at: Utc::now(),
            columns: IndexMap::new(),
            display_order: None,
            row_count: 0,
            row_validity: Bitmap::new_clear(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(&normalize(name))
    }

    pub(crate) fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.get_mut(&normalize(name))
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.values().map(|c| c.name().to_string()).collect()
    }

    pub fn column_names_with_prefix(&self, prefix: &str) -> Vec<String> {
        let prefix = prefix.to_lowercase();
        self.columns
            .values()
            .filter(|c| c.name().to_lowercase().starts_with(&prefix))
            .map(|c| c.name().to_string())
            .collect()
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.values()
    }

    /// Sets the display order. Must either cover exactly the Board's
    /// column set or be a proper prefix of it (spec §3); extras from the
    /// mapping are appended, sorted case-insensitively, on output.
    pub fn set_display_order(&mut self, order: Vec<String>) -> BoardResult<()> {
        for name in &order {
            if self.column(name).is_none() {
                return Err(BoardError::UnknownColumn { name: name.clone() });
            }
        }
        let mut seen = std::collections::HashSet::new();
        for name in &order {
            if !seen.insert(normalize(name)) {
                return Err(BoardError::InvalidDisplayOrder);
            }
        }
        self.display_order = Some(order);
        Ok(())
    }

    /// The effective output order: the display order (if set) followed by
    /// any remaining columns sorted case-insensitively by name.
    pub fn effective_order(&self) -> Vec<String> {
        match &self.display_order {
            None => {
                let mut names = self.column_names();
                names.sort_by_key(|n| n.to_lowercase());
                names
            }
            Some(order) => {
                let covered: std::collections::HashSet<SmolStr> =
                    order.iter().map(|n| normalize(n)).collect();
                let mut rest: Vec<String> = self
                    .column_names()
                    .into_iter()
                    .filter(|n| !covered.contains(&normalize(n)))
                    .collect();
                rest.sort_by_key(|n| n.to_lowercase());
                order.iter().cloned().chain(rest).collect()
            }
        }
    }

    // ---- describe / dump (spec §4.2) ----

    pub fn describe(&self, writer: &mut dyn Write) -> io::Result<()> {
        writeln!(writer, "{} : {}", self.name, self.description)?;
        writeln!(writer, "{} row(s)", self.row_count)?;
        for col_name in self.effective_order() {
            let Some(col) = self.column(&col_name) else { continue };
            match col.dictionary() {
                Some(dict) => writeln!(
                    writer,
                    "{}\t{}\t[dictionary size {}]",
                    col.name(),
                    col.scalar_type(),
                    dict.size()
                )?,
                None => writeln!(writer, "{}\t{}", col.name(), col.scalar_type())?,
            }
        }
        Ok(())
    }

    pub fn dump(&self, writer: &mut dyn Write, offset: usize, count: usize, delimiter: &str) -> BoardResult<()> {
        let order = self.effective_order();
        for name in &order {
            if self.column(name).is_none() {
                return Err(BoardError::UnknownColumn { name: name.clone() });
            }
        }
        let end = (offset + count).min(self.row_count);
        for row in offset..end {
            for (i, name) in order.iter().enumerate() {
                if i > 0 {
                    write!(writer, "{delimiter}").map_err(|e| BoardError::WriterFailure {
                        message: e.to_string(),
                    })?;
                }
                let col = self.column(name).expect("checked above");
                col.dump(writer, row).map_err(|e| BoardError::WriterFailure {
                    message: e.to_string(),
                })?;
            }
            writeln!(writer).map_err(|e| BoardError::WriterFailure {
                message: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Adapts [`Board::dump`]'s result to the documented negative-code
    /// contract: `0` success, `-3` unknown column, `-4` writer failure.
    pub fn dump_code(&self, writer: &mut dyn Write, offset: usize, count: usize, delimiter: &str) -> i64 {
        match self.dump(writer, offset, count, delimiter) {
            Ok(()) => 0,
            Err(e) => e.code(),
        }
    }

    /// Cheap lower/upper bound on the qualifying row count; with no index
    /// available the engine's only honest bound is `(0, nRows)`.
    pub fn estimate(&self, _predicate: &ExprTree) -> (usize, usize) {
        (0, self.row_count)
    }

    // ---- select (spec §4.2, §4.3, §4.4) ----

    pub fn select(&self, select_clause: &ProjectClause, where_clause: Option<&ExprTree>) -> BoardResult<Board> {
        log::debug!("select: board '{}', {} row(s)", self.name, self.row_count);
        let full_mask = Bitmap::new_set(self.row_count);
        let mask = match where_clause {
            None => full_mask,
            Some(expr) => crate::scanner::Scanner::new(self).evaluate(expr, &full_mask)?,
        };
        if mask.all_false() {
            log::debug!("select: predicate matched 0 rows, returning empty board");
            return Ok(Board::empty(format!("{}_select", self.name)));
        }
        crate::projector::Projector::new(self).project(select_clause, &mask)
    }

    // ---- groupby (spec §4.5) ----

    pub fn groupby(&self, clause: &GroupClause) -> BoardResult<Board> {
        crate::groupby::groupby_a(self, clause, &crate::bundler::SortBundler)
    }

    pub fn groupby_a_with<B: Bundler>(&self, clause: &GroupClause, bundler: &B) -> BoardResult<Board> {
        crate::groupby::groupby_a(self, clause, bundler)
    }

    pub fn groupby_c(&self, clause: &ProjectClause) -> BoardResult<Board> {
        crate::groupby::groupby_c(self, clause)
    }

    // ---- merge (spec §4.6) ----

    pub fn merge(&mut self, other: &Board, clause: &GroupClause) -> BoardResult<usize> {
        crate::merger::merge(self, other, clause)
    }

    // ---- orderby / reorder (spec §4.7) ----

    pub fn orderby(&mut self, keys: &[String], directions: &[bool]) -> BoardResult<()> {
        crate::ordering::orderby(self, keys, directions)
    }

    pub fn reorder(&mut self) -> BoardResult<()> {
        crate::ordering::reorder(self)
    }

    // ---- limit / reverseRows (spec §4.1/§4.2) ----

    pub fn limit(&mut self, n: usize) {
        if n >= self.row_count {
            return;
        }
        for col in self.columns.values_mut() {
            col.limit(n);
        }
        self.row_count = n;
        let bits: Vec<bool> = (0..n).map(|i| self.row_validity.get(i)).collect();
        self.row_validity = Bitmap::from_bools(&bits);
    }

    pub fn reverse_rows(&mut self) {
        for col in self.columns.values_mut() {
            col.reverse_rows();
        }
        let bits: Vec<bool> = (0..self.row_count).rev().map(|i| self.row_validity.get(i)).collect();
        self.row_validity = Bitmap::from_bools(&bits);
    }

    /// Applies `permutation` (`result[i] = self[permutation[i]]`) to every
    /// column, used by `Ordering` after a key sort is resolved.
    pub(crate) fn permute(&mut self, permutation: &[usize]) {
        for col in self.columns.values_mut() {
            *col = col.permute(permutation);
        }
        let bits: Vec<bool> = permutation.iter().map(|&i| self.row_validity.get(i)).collect();
        self.row_validity = Bitmap::from_bools(&bits);
    }

    // ---- memory (spec §5) ----

    pub fn reserve(&mut self, n: usize) {
        for col in self.columns.values_mut() {
            col.reserve(n);
        }
    }

    pub fn capacity(&self) -> usize {
        self.columns.values().map(|c| c.capacity()).min().unwrap_or(self.row_count)
    }

    // ---- backup (spec §4.2, §6) ----

    pub fn backup(&self, store: &mut dyn PartitionStore, dir: &str, name: &str, description: &str) -> BoardResult<()> {
        store.backup(dir, name, description, self)
    }

    // ---- append (spec §4.2) ----

    pub fn append(&mut self, clause: &ProjectClause, source: &Board, mask: &Bitmap) -> BoardResult<usize> {
        let added = mask.count_ones();
        for (output_name, term) in &clause.0 {
            match term {
                ProjectTerm::Variable(var_name) => {
                    let src_col = source
                        .column(var_name)
                        .ok_or_else(|| BoardError::UnknownColumn { name: var_name.clone() })?
                        .clone();
                    let dst = self
                        .column_mut(output_name)
                        .ok_or_else(|| BoardError::UnknownColumn { name: output_name.clone() })?;
                    dst.append_from(&src_col, mask)
                        .map_err(|_| BoardError::TypeMismatch {
                            name: output_name.clone(),
                            expected: dst.scalar_type(),
                            found: src_col.scalar_type(),
                        })?;
                }
                ProjectTerm::CountStar => {
                    let literal = crate::buffer::TypedBuffer::U32(Arc::new(vec![1u32; added]));
                    let dst = self
                        .column_mut(output_name)
                        .ok_or_else(|| BoardError::UnknownColumn { name: output_name.clone() })?;
                    dst.append_literal(&literal, &Bitmap::new_set(added))
                        .map_err(|_| BoardError::TypeMismatch {
                            name: output_name.clone(),
                            expected: dst.scalar_type(),
                            found: crate::types::ScalarType::U32,
                        })?;
                }
                ProjectTerm::Arith(expr) => {
                    let values = crate::expr::eval_rows(expr, source, mask)?;
                    let numeric: Vec<f64> = values.iter().map(|l| l.as_f64().unwrap_or(f64::NAN)).collect();
                    let valid = Bitmap::from_bools(&numeric.iter().map(|v| !v.is_nan()).collect::<Vec<_>>());
                    let literal = crate::buffer::TypedBuffer::F64(Arc::new(numeric));
                    let dst = self
                        .column_mut(output_name)
                        .ok_or_else(|| BoardError::UnknownColumn { name: output_name.clone() })?;
                    dst.append_literal(&literal, &valid)
                        .map_err(|_| BoardError::TypeMismatch {
                            name: output_name.clone(),
                            expected: dst.scalar_type(),
                            found: crate::types::ScalarType::F64,
                        })?;
                }
                ProjectTerm::NumLiteral(_) | ProjectTerm::StrLiteral(_) => {
                    return Err(BoardError::UnsupportedColumnType {
                        found: crate::types::ScalarType::Unknown,
                    });
                }
            }
        }
        self.row_count += added;
        let mut bits: Vec<bool> = (0..self.row_validity.len()).map(|i| self.row_validity.get(i)).collect();
        bits.extend(std::iter::repeat_n(true, added));
        self.row_validity = Bitmap::from_bools(&bits);
        Ok(added)
    }

    pub fn cursor(&self) -> crate::cursor::Cursor<'_> {
        crate::cursor::Cursor::new(self)
    }

    /// Adds a freshly computed column to an in-construction Board (used by
    /// `Projector`/`groupby`/`join`, not part of the public append/select
    /// contract).
    pub(crate) fn push_column(&mut self, col: Column) -> BoardResult<()> {
        let key = normalize(col.name());
        if self.columns.is_empty() {
            self.row_count = col.len();
            self.row_validity = Bitmap::new_set(col.len());
        } else if col.len() != self.row_count {
            return Err(BoardError::RowCountMismatch {
                board_rows: self.row_count,
                data_rows: col.len(),
            });
        }
        if self.columns.contains_key(&key) {
            return Err(BoardError::DuplicateColumn {
                name: col.name().to_string(),
            });
        }
        self.columns.insert(key, col);
        Ok(())
    }

    /// Replaces an existing column's value in place, preserving its
    /// position in the column order (used by [`crate::merger::merge`]'s
    /// identical-keys fold-in-place path).
    pub(crate) fn replace_column(&mut self, col: Column) -> BoardResult<()> {
        let key = normalize(col.name());
        if !self.columns.contains_key(&key) {
            return Err(BoardError::UnknownColumn { name: col.name().to_string() });
        }
        self.columns.insert(key, col);
        Ok(())
    }

    pub(crate) fn new_under_construction(name: impl Into<String>) -> Board {
        Board {
            name: name.into(),
            description: String::new(),
            created_at: Utc::now(),
            columns: IndexMap::new(),
            display_order: None,
            row_count: 0,
            row_validity: Bitmap::new_clear(0),
        }
    }
}

/// A `Board` governed by a read-write lock (spec §5): `select`, `dump`,
/// `describe`, `groupby` and `join` take the read guard; `append`,
/// `reorder`, `limit`, `reverseRows` and `merge` take the write guard.
#[derive(Clone)]
pub struct SharedBoard(Arc<RwLock<Board>>);

impl SharedBoard {
    pub fn new(board: Board) -> Self {
        Self(Arc::new(RwLock::new(board)))
    }

    pub fn read(&self) -> parking_lot::RwLockReadGuard<'_, Board> {
        self.0.read()
    }

    pub fn write(&self) -> parking_lot::RwLockWriteGuard<'_, Board> {
        self.0.write()
    }
}
