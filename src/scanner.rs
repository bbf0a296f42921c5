//! `Scanner`: evaluates an [`ExprTree`] against a [`Board`] under an input
//! mask, producing an output mask of qualifying rows (spec §4.3).
//!
//! Evaluation is a post-order traversal; scanning never mutates the tree or
//! the Board. Row-chunk cancellation is checked at the granularity named in
//! §5 (every 4096 rows) inside the leaf predicate loops.

use crate::bitmap::Bitmap;
use crate::board::Board;
use crate::collab::IndexProvider;
use crate::error::{BoardError, BoardResult};
use crate::expr::{eval_row, ExprTree};
use crate::scalar::CompareOp;

/// Row-chunk granularity for cancellation checks (spec §5).
const CANCEL_CHECK_INTERVAL: usize = 4096;

pub struct Scanner<'a> {
    board: &'a Board,
    index: Option<&'a dyn IndexProvider>,
    cancel: Option<&'a crate::board::CancellationToken>,
}

impl<'a> Scanner<'a> {
    pub fn new(board: &'a Board) -> Self {
        Self {
            board,
            index: None,
            cancel: None,
        }
    }

    pub fn with_index(mut self, index: &'a dyn IndexProvider) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_cancellation(mut self, token: &'a crate::board::CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn check_cancelled(&self, row: usize) -> BoardResult<()> {
        if row % CANCEL_CHECK_INTERVAL == 0
            && let Some(token) = self.cancel
            && token.is_cancelled()
        {
            return Err(BoardError::WriterFailure {
                message: "scan cancelled".to_string(),
            });
        }
        Ok(())
    }

    /// Evaluates `expr` under `input`, returning the set of rows in `input`
    /// that also satisfy `expr`.
    pub fn evaluate(&self, expr: &ExprTree, input: &Bitmap) -> BoardResult<Bitmap> {
        if let Some(index) = self.index
            && let Some(mask) = index.lookup(self.board, expr)
        {
            return Ok(mask.and(input));
        }

        match expr {
            ExprTree::And(l, r) => {
                let left = self.evaluate(l, input)?;
                self.evaluate(r, &left)
            }
            ExprTree::Or(l, r) => {
                let left = self.evaluate(l, input)?;
                let right = self.evaluate(r, input)?;
                Ok(left.or(&right))
            }
            ExprTree::Xor(l, r) => {
                let left = self.evaluate(l, input)?;
                let right = self.evaluate(r, input)?;
                Ok(left.xor(&right))
            }
            ExprTree::Minus(l, r) => {
                let left = self.evaluate(l, input)?;
                let right = self.evaluate(r, input)?;
                Ok(left.and_not(&right))
            }
            ExprTree::Not(inner) => {
                let result = self.evaluate(inner, input)?;
                Ok(input.and_not(&result))
            }

            ExprTree::Range { column, op, value } => {
                let col = self.resolve(column)?;
                Ok(col.scan_compare(*op, value, input))
            }

            ExprTree::DoubleRange { lo, op1, expr, op2, hi } => {
                let mut out = Bitmap::new_clear(self.board.row_count());
                for row in input.iter_ones() {
                    self.check_cancelled(row)?;
                    let v = eval_row(expr, self.board, row)?.as_f64().unwrap_or(f64::NAN);
                    let lo_v = lo.as_f64().unwrap_or(f64::NAN);
                    let hi_v = hi.as_f64().unwrap_or(f64::NAN);
                    if op1.apply_f64(lo_v, v) && op2.apply_f64(v, hi_v) {
                        out.set(row, true);
                    }
                }
                Ok(out)
            }

            ExprTree::CompRange { lhs, op1, mid, rest } => {
                let mut out = Bitmap::new_clear(self.board.row_count());
                for row in input.iter_ones() {
                    self.check_cancelled(row)?;
                    let lv = eval_row(lhs, self.board, row)?.as_f64().unwrap_or(f64::NAN);
                    let mv = eval_row(mid, self.board, row)?.as_f64().unwrap_or(f64::NAN);
                    let first = op1.apply_f64(lv, mv);
                    let qualifies = match rest {
                        None => first,
                        Some((op2, rhs)) => {
                            let rv = eval_row(rhs, self.board, row)?.as_f64().unwrap_or(f64::NAN);
                            first && op2.apply_f64(mv, rv)
                        }
                    };
                    if qualifies {
                        out.set(row, true);
                    }
                }
                Ok(out)
            }

            ExprTree::DiscreteRange { column, values } => {
                let col = self.resolve(column)?;
                Ok(col.scan_discrete(values, input))
            }
            ExprTree::IntHod { column, values } => {
                let col = self.resolve(column)?;
                let as_f64: Vec<f64> = values.iter().map(|&v| v as f64).collect();
                Ok(col.scan_discrete(&as_f64, input))
            }
            ExprTree::UIntHod { column, values } => {
                let col = self.resolve(column)?;
                let as_f64: Vec<f64> = values.iter().map(|&v| v as f64).collect();
                Ok(col.scan_discrete(&as_f64, input))
            }
            ExprTree::AnyString { column, values } => {
                let col = self.resolve(column)?;
                Ok(col.scan_any_string(values, input))
            }
            ExprTree::Like { column, pattern } => {
                let col = self.resolve(column)?;
                Ok(col.scan_like(pattern, input))
            }
            ExprTree::Keyword { column, token } => {
                let col = self.resolve(column)?;
                Ok(col.scan_keyword(token, input))
            }
            ExprTree::AllWords { column, tokens } => {
                let col = self.resolve(column)?;
                Ok(col.scan_all_words(tokens, input))
            }

            ExprTree::Exists(column) => {
                let col = self.resolve(column)?;
                Ok(col.validity().and(input))
            }

            ExprTree::AnyAny { prefix, value } => {
                let mut out = Bitmap::new_clear(self.board.row_count());
                for name in self.board.column_names_with_prefix(prefix) {
                    let col = self.resolve(&name)?;
                    let matched = col.scan_compare(CompareOp::Eq, value, input);
                    out = out.or(&matched);
                }
                Ok(out)
            }
        }
    }

    fn resolve(&self, name: &str) -> BoardResult<&crate::column::Column> {
        self.board
            .column(name)
            .ok_or_else(|| BoardError::UnknownColumn { name: name.to_string() })
    }
}
