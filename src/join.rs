//! `JoinEngine`: sort-merge natural/equi-join of two Boards (spec §4.8),
//! grounded in `original_source/src/jnatural.cpp`'s constructor + sort-merge
//! `evaluate()`. Construction validates the join column the way
//! `jNatural::jNatural` does before building its masks, returning a
//! `BoardResult` instead of throwing.

use crate::bitmap::Bitmap;
use crate::board::Board;
use crate::collab::MessageSink;
use crate::column::Column;
use crate::error::{BoardError, BoardResult};
use crate::expr::ExprTree;
use crate::scanner::Scanner;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    R,
    S,
}

/// A resolved projection term: which side to read from, and the column
/// name on that side.
struct Resolved {
    side: Side,
    column: String,
    output: String,
}

pub struct JoinEngine<'a> {
    r: &'a Board,
    s: &'a Board,
    column: String,
    order_r: Vec<usize>,
    order_s: Vec<usize>,
}

impl<'a> JoinEngine<'a> {
    /// `Join::natural(partR, partS, column, condR?, condS?)` (spec §6). Mirrors
    /// `jNatural`'s constructor: missing column or mismatched type aborts
    /// immediately; per-side `where` expressions are evaluated before the
    /// join column is materialised, exactly as `condr`/`conds` are evaluated
    /// against each partition before `maskR_`/`maskS_` are built.
    pub fn new(r: &'a Board, s: &'a Board, column: &str, cond_r: Option<&ExprTree>, cond_s: Option<&ExprTree>) -> BoardResult<Self> {
        let col_r = r
            .column(column)
            .ok_or_else(|| BoardError::UnknownColumn { name: column.to_string() })?;
        let col_s = s
            .column(column)
            .ok_or_else(|| BoardError::UnknownColumn { name: column.to_string() })?;
        if col_r.scalar_type() != col_s.scalar_type() {
            return Err(BoardError::TypeMismatch {
                name: column.to_string(),
                expected: col_r.scalar_type(),
                found: col_s.scalar_type(),
            });
        }

        let mask_r = match cond_r {
            Some(expr) => Scanner::new(r).evaluate(expr, &Bitmap::new_set(r.row_count()))?,
            None => col_r.validity().clone(),
        };
        let mask_s = match cond_s {
            Some(expr) => Scanner::new(s).evaluate(expr, &Bitmap::new_set(s.row_count()))?,
            None => col_s.validity().clone(),
        };

        let mut order_r: Vec<usize> = (0..r.row_count()).filter(|&i| mask_r.get(i)).collect();
        let mut order_s: Vec<usize> = (0..s.row_count()).filter(|&i| mask_s.get(i)).collect();
        order_r.sort_by(|&a, &b| col_r.cmp_rows(a, b));
        order_s.sort_by(|&a, &b| col_s.cmp_rows(a, b));

        Ok(Self { r, s, column: column.to_string(), order_r, order_s })
    }

    /// Cheap pre-evaluation bound (spec §4.8 `estimate`), mirroring
    /// `jNatural::estimate`'s worst-case `|R| * |S|` ceiling.
    pub fn estimate(&self) -> (u64, u64) {
        (0, (self.order_r.len() as u64) * (self.order_s.len() as u64))
    }

    /// Runs the sort-merge cross product and materialises the requested
    /// projection columns, resolving `R.x`/`S.x`/unqualified names per
    /// spec §4.8. Ambiguous unqualified names are reported to `sink` (if
    /// given) and default to the `R` side.
    pub fn evaluate(&self, projection: &[String], mut sink: Option<&mut dyn MessageSink>) -> BoardResult<Board> {
        let col_r = self.r.column(&self.column).expect("validated at construction");
        let col_s = self.s.column(&self.column).expect("validated at construction");

        let mut pairs: Vec<(usize, usize)> = Vec::new();
        let (mut i, mut j) = (0usize, 0usize);
        let n_r = self.order_r.len();
        let n_s = self.order_s.len();
        while i < n_r && j < n_s {
            let ord = col_r.rows_cmp(self.order_r[i], col_s, self.order_s[j]);
            match ord {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    let mut i2 = i;
                    while i2 < n_r && col_r.cmp_rows(self.order_r[i], self.order_r[i2]) == Ordering::Equal {
                        i2 += 1;
                    }
                    let mut j2 = j;
                    while j2 < n_s && col_s.cmp_rows(self.order_s[j], self.order_s[j2]) == Ordering::Equal {
                        j2 += 1;
                    }
                    for ri in i..i2 {
                        for sj in j..j2 {
                            pairs.push((self.order_r[ri], self.order_s[sj]));
                        }
                    }
                    i = i2;
                    j = j2;
                }
            }
        }

        let mut resolved = Vec::with_capacity(projection.len());
        for name in projection {
            resolved.push(self.resolve(name, sink.as_deref_mut())?);
        }

        let mut out = Board::new_under_construction(format!("{}_join_{}", self.r.name(), self.s.name()));
        for r in &resolved {
            let source = match r.side {
                Side::R => self.r.column(&r.column),
                Side::S => self.s.column(&r.column),
            }
            .ok_or_else(|| BoardError::UnknownColumn { name: r.column.clone() })?;
            let picked: Vec<usize> = pairs
                .iter()
                .map(|&(ri, si)| match r.side {
                    Side::R => ri,
                    Side::S => si,
                })
                .collect();
            out.push_column(gather_column(&r.output, source, &picked))?;
        }
        Ok(out)
    }

    fn resolve(&self, name: &str, sink: Option<&mut dyn MessageSink>) -> BoardResult<Resolved> {
        if let Some(rest) = name.strip_prefix("R.") {
            if self.r.column(rest).is_none() {
                return Err(BoardError::UnknownColumn { name: name.to_string() });
            }
            return Ok(Resolved { side: Side::R, column: rest.to_string(), output: name.to_string() });
        }
        if let Some(rest) = name.strip_prefix("S.") {
            if self.s.column(rest).is_none() {
                return Err(BoardError::UnknownColumn { name: name.to_string() });
            }
            return Ok(Resolved { side: Side::S, column: rest.to_string(), output: name.to_string() });
        }

        let in_r = self.r.column(name).is_some();
        let in_s = self.s.column(name).is_some();
        match (in_r, in_s) {
            (true, true) => {
                log::warn!("column `{name}` is ambiguous in join; defaulting to R side");
                if let Some(sink) = sink {
                    sink.warning(&format!("column `{name}` is ambiguous in join; defaulting to R side"));
                }
                Ok(Resolved { side: Side::R, column: name.to_string(), output: name.to_string() })
            }
            (true, false) => Ok(Resolved { side: Side::R, column: name.to_string(), output: name.to_string() }),
            (false, true) => Ok(Resolved { side: Side::S, column: name.to_string(), output: name.to_string() }),
            (false, false) => Err(BoardError::UnresolvedJoinColumn { name: name.to_string() }),
        }
    }
}

/// Gathers `rows` from `source` into a column renamed to `output_name`,
/// via `Column::permute` so the result keeps `source`'s exact scalar type
/// and (for `Category`) its dictionary instead of collapsing to
/// `Text`/`F64` (spec §4.8: projected columns keep their source type).
fn gather_column(output_name: &str, source: &Column, rows: &[usize]) -> Column {
    source.permute(rows).renamed(output_name)
}
