//! `ExprTree`: the parsed boolean/arithmetic expression tree (spec §3).
//!
//! Trees arrive already built — there is no parser in this crate (spec §1
//! non-goal: "query parser (the expression tree arrives parsed)"). Callers
//! (tests, or an external parser crate) construct `ExprTree`/`ArithExpr`
//! values directly.

use crate::board::Board;
use crate::error::{BoardError, BoardResult};
use crate::scalar::{CompareOp, Literal};
use chrono::{Local, TimeZone, Utc};

/// A boolean predicate tree, evaluated by [`crate::scanner::Scanner`]
/// against a Board under an input mask.
#[derive(Debug, Clone)]
pub enum ExprTree {
    And(Box<ExprTree>, Box<ExprTree>),
    Or(Box<ExprTree>, Box<ExprTree>),
    Xor(Box<ExprTree>, Box<ExprTree>),
    /// A ∧ ¬B.
    Minus(Box<ExprTree>, Box<ExprTree>),
    Not(Box<ExprTree>),

    /// `column op scalar`.
    Range {
        column: String,
        op: CompareOp,
        value: Literal,
    },
    /// `lo op1 expr op2 hi`.
    DoubleRange {
        lo: Literal,
        op1: CompareOp,
        expr: Box<ArithExpr>,
        op2: CompareOp,
        hi: Literal,
    },
    /// `lhs op1 mid` or `lhs op1 mid op2 rhs`.
    CompRange {
        lhs: Box<ArithExpr>,
        op1: CompareOp,
        mid: Box<ArithExpr>,
        rest: Option<(CompareOp, Box<ArithExpr>)>,
    },

    /// Numeric IN list.
    DiscreteRange { column: String, values: Vec<f64> },
    /// Integer IN (large) set.
    IntHod { column: String, values: Vec<i64> },
    /// Unsigned integer IN (large) set.
    UIntHod { column: String, values: Vec<u64> },
    /// String IN list.
    AnyString { column: String, values: Vec<String> },
    Like { column: String, pattern: String },
    Keyword { column: String, token: String },
    AllWords { column: String, tokens: Vec<String> },

    Exists(String),
    /// Any column whose name begins with `prefix` satisfies `= value`.
    AnyAny { prefix: String, value: Literal },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    BitAnd,
    BitOr,
}

/// The arithmetic/value sub-tree used inside `DoubleRange`/`CompRange`
/// predicates and by the Projector for expression select-terms.
#[derive(Debug, Clone)]
pub enum ArithExpr {
    Variable(String),
    NumLiteral(f64),
    StrLiteral(String),
    Unary(UnaryOp, Box<ArithExpr>),
    Binary(BinaryOp, Box<ArithExpr>, Box<ArithExpr>),
    /// A call to one of the fixed built-in scalar functions (spec §3).
    Call(String, Vec<ArithExpr>),
}

/// Evaluates `expr` against `row` of `board`, returning a scalar value.
/// `NULL` inputs (per §9's "propagate validity explicitly... operations on
/// NULL inputs produce NULL outputs") surface as `Literal::Num(f64::NAN)`;
/// arithmetic never errors (division by zero follows IEEE-754, per §7).
pub fn eval_row(expr: &ArithExpr, board: &Board, row: usize) -> BoardResult<Literal> {
    match expr {
        ArithExpr::Variable(name) => {
            let col = board
                .column(name)
                .ok_or_else(|| BoardError::UnknownColumn { name: name.clone() })?;
            if !col.is_valid(row) {
                return Ok(Literal::Num(f64::NAN));
            }
            if col.scalar_type().is_string() {
                Ok(Literal::Str(col.string_at(row)))
            } else {
                let v = col
                    .get_column_as_f64(row, row + 1)
                    .map_err(|_| BoardError::TypeMismatch {
                        name: name.clone(),
                        expected: crate::types::ScalarType::F64,
                        found: col.scalar_type(),
                    })?;
                Ok(Literal::Num(v[0]))
            }
        }
        ArithExpr::NumLiteral(n) => Ok(Literal::Num(*n)),
        ArithExpr::StrLiteral(s) => Ok(Literal::Str(s.clone())),
        ArithExpr::Unary(UnaryOp::Neg, inner) => {
            let v = as_f64(eval_row(inner, board, row)?);
            Ok(Literal::Num(-v))
        }
        ArithExpr::Binary(op, l, r) => {
            let lv = as_f64(eval_row(l, board, row)?);
            let rv = as_f64(eval_row(r, board, row)?);
            Ok(Literal::Num(apply_binary(*op, lv, rv)))
        }
        ArithExpr::Call(name, args) => eval_call(name, args, board, row),
    }
}

/// Evaluates `expr` over every set bit of `mask`, in ascending row order —
/// the form the Projector needs to materialise an expression column.
pub fn eval_rows(expr: &ArithExpr, board: &Board, mask: &crate::bitmap::Bitmap) -> BoardResult<Vec<Literal>> {
    mask.iter_ones().map(|row| eval_row(expr, board, row)).collect()
}

fn as_f64(lit: Literal) -> f64 {
    lit.as_f64().unwrap_or(f64::NAN)
}

fn apply_binary(op: BinaryOp, l: f64, r: f64) -> f64 {
    match op {
        BinaryOp::Add => l + r,
        BinaryOp::Sub => l - r,
        BinaryOp::Mul => l * r,
        BinaryOp::Div => l / r, // IEEE-754: x/0.0 -> inf/NaN, never an error
        BinaryOp::Mod => l % r,
        BinaryOp::Pow => l.powf(r),
        BinaryOp::BitAnd => ((l as i64) & (r as i64)) as f64,
        BinaryOp::BitOr => ((l as i64) | (r as i64)) as f64,
    }
}

fn eval_call(name: &str, args: &[ArithExpr], board: &Board, row: usize) -> BoardResult<Literal> {
    let arg_f64 = |i: usize| -> BoardResult<f64> {
        Ok(as_f64(eval_row(&args[i], board, row)?))
    };
    let arg_str = |i: usize| -> BoardResult<String> {
        match eval_row(&args[i], board, row)? {
            Literal::Str(s) => Ok(s),
            Literal::Num(n) => Ok(n.to_string()),
        }
    };

    match name.to_ascii_uppercase().as_str() {
        "SIN" => Ok(Literal::Num(arg_f64(0)?.sin())),
        "COS" => Ok(Literal::Num(arg_f64(0)?.cos())),
        "TAN" => Ok(Literal::Num(arg_f64(0)?.tan())),
        "LOG" => Ok(Literal::Num(arg_f64(0)?.ln())),
        "LOG10" => Ok(Literal::Num(arg_f64(0)?.log10())),
        "EXP" => Ok(Literal::Num(arg_f64(0)?.exp())),
        "SQRT" => Ok(Literal::Num(arg_f64(0)?.sqrt())),
        "ABS" => Ok(Literal::Num(arg_f64(0)?.abs())),
        "FLOOR" => Ok(Literal::Num(arg_f64(0)?.floor())),
        "CEIL" => Ok(Literal::Num(arg_f64(0)?.ceil())),
        "ROUND" => Ok(Literal::Num(arg_f64(0)?.round())),
        "POW" => Ok(Literal::Num(arg_f64(0)?.powf(arg_f64(1)?))),
        "ATAN2" => Ok(Literal::Num(arg_f64(0)?.atan2(arg_f64(1)?))),

        "FROM_UNIXTIME_GMT" => {
            let secs = arg_f64(0)? as i64;
            let fmt = arg_str(1)?;
            let dt = Utc
                .timestamp_opt(secs, 0)
                .single()
                .ok_or_else(|| BoardError::UnsupportedColumnType {
                    found: crate::types::ScalarType::I64,
                })?;
            Ok(Literal::Str(dt.format(&fmt).to_string()))
        }
        "FROM_UNIXTIME_LOCAL" => {
            let secs = arg_f64(0)? as i64;
            let fmt = arg_str(1)?;
            let dt = Local
                .timestamp_opt(secs, 0)
                .single()
                .ok_or_else(|| BoardError::UnsupportedColumnType {
                    found: crate::types::ScalarType::I64,
                })?;
            Ok(Literal::Str(dt.format(&fmt).to_string()))
        }
        "TO_UNIXTIME_GMT" => {
            let text = arg_str(0)?;
            let fmt = arg_str(1)?;
            let naive = chrono::NaiveDateTime::parse_from_str(&text, &fmt)
                .map_err(|_| BoardError::UnsupportedColumnType { found: crate::types::ScalarType::Text })?;
            Ok(Literal::Num(naive.and_utc().timestamp() as f64))
        }
        "TO_UNIXTIME_LOCAL" => {
            let text = arg_str(0)?;
            let fmt = arg_str(1)?;
            let naive = chrono::NaiveDateTime::parse_from_str(&text, &fmt)
                .map_err(|_| BoardError::UnsupportedColumnType { found: crate::types::ScalarType::Text })?;
            let local = Local
                .from_local_datetime(&naive)
                .single()
                .ok_or_else(|| BoardError::UnsupportedColumnType { found: crate::types::ScalarType::Text })?;
            Ok(Literal::Num(local.timestamp() as f64))
        }
        other => Err(BoardError::UnknownFunction { name: other.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::Bitmap;
    use crate::buffer::TypedBuffer;
    use crate::column::Column;
    use crate::types::ScalarType;
    use std::sync::Arc;

    fn board_with_ts(values: Vec<i64>) -> Board {
        let len = values.len();
        let col = Column::from_parts(
            "ts",
            ScalarType::I64,
            "",
            TypedBuffer::I64(Arc::new(values)),
            Bitmap::new_set(len),
            None,
        )
        .unwrap();
        Board::from_columns("t", "", vec![col]).unwrap()
    }

    #[test]
    fn from_unixtime_gmt_formats_epoch_days() {
        let board = board_with_ts(vec![0, 86400]);
        let expr = ArithExpr::Call(
            "FROM_UNIXTIME_GMT".to_string(),
            vec![
                ArithExpr::Variable("ts".to_string()),
                ArithExpr::StrLiteral("%Y-%m-%d".to_string()),
            ],
        );
        assert_eq!(
            eval_row(&expr, &board, 0).unwrap(),
            Literal::Str("1970-01-01".to_string())
        );
        assert_eq!(
            eval_row(&expr, &board, 1).unwrap(),
            Literal::Str("1970-01-02".to_string())
        );
    }

    #[test]
    fn division_by_zero_yields_infinity_not_error() {
        let board = board_with_ts(vec![1]);
        let expr = ArithExpr::Binary(
            BinaryOp::Div,
            Box::new(ArithExpr::NumLiteral(1.0)),
            Box::new(ArithExpr::NumLiteral(0.0)),
        );
        let result = eval_row(&expr, &board, 0).unwrap();
        assert_eq!(result, Literal::Num(f64::INFINITY));
    }

    #[test]
    fn null_input_propagates_as_nan() {
        let mut validity = Bitmap::new_set(1);
        validity.set(0, false);
        let col = Column::from_parts(
            "v",
            ScalarType::F64,
            "",
            TypedBuffer::F64(Arc::new(vec![5.0])),
            validity,
            None,
        )
        .unwrap();
        let board = Board::from_columns("t", "", vec![col]).unwrap();
        let expr = ArithExpr::Binary(
            BinaryOp::Add,
            Box::new(ArithExpr::Variable("v".to_string())),
            Box::new(ArithExpr::NumLiteral(1.0)),
        );
        let result = eval_row(&expr, &board, 0).unwrap();
        assert!(matches!(result, Literal::Num(n) if n.is_nan()));
    }

    #[test]
    fn pow_and_atan2_builtins() {
        let board = board_with_ts(vec![1]);
        let pow = ArithExpr::Call(
            "POW".to_string(),
            vec![ArithExpr::NumLiteral(2.0), ArithExpr::NumLiteral(10.0)],
        );
        assert_eq!(eval_row(&pow, &board, 0).unwrap(), Literal::Num(1024.0));
    }
}
