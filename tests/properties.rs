//! Property tests for the invariants named in spec §8: widening reads
//! preserve value, `orderby` is idempotent, and `select` under an
//! always-true predicate round-trips every row.

use std::sync::Arc;

use boardframe::bitmap::Bitmap;
use boardframe::board::{Board, ProjectClause, ProjectTerm};
use boardframe::buffer::TypedBuffer;
use boardframe::column::Column;
use boardframe::types::ScalarType;
use boardframe::{CompareOp, ExprTree, Literal};
use proptest::prelude::*;

fn i32_board(values: Vec<i32>) -> Board {
    let len = values.len();
    let col = Column::from_parts("v", ScalarType::I32, "", TypedBuffer::I32(Arc::new(values)), Bitmap::new_set(len), None).unwrap();
    Board::from_columns("t", "", vec![col]).unwrap()
}

proptest! {
    /// A widening read of an `i32` column as `i64` returns exactly the
    /// source values (spec §8: "widening reads preserve value").
    #[test]
    fn widening_i32_to_i64_preserves_value(values in prop::collection::vec(any::<i32>(), 0..64)) {
        let len = values.len();
        let col = Column::from_parts("v", ScalarType::I32, "", TypedBuffer::I32(Arc::new(values.clone())), Bitmap::new_set(len), None).unwrap();
        let widened = col.get_column_as_i64(0, len).unwrap();
        let expected: Vec<i64> = values.iter().map(|&v| v as i64).collect();
        prop_assert_eq!(widened, expected);
    }

    /// A widening read of an `i32` column as `f64` returns exactly the
    /// source values (doubles accept all 32-bit integers losslessly).
    #[test]
    fn widening_i32_to_f64_preserves_value(values in prop::collection::vec(any::<i32>(), 0..64)) {
        let len = values.len();
        let col = Column::from_parts("v", ScalarType::I32, "", TypedBuffer::I32(Arc::new(values.clone())), Bitmap::new_set(len), None).unwrap();
        let widened = col.get_column_as_f64(0, len).unwrap();
        let expected: Vec<f64> = values.iter().map(|&v| v as f64).collect();
        prop_assert_eq!(widened, expected);
    }

    /// `orderby(k)` followed by `orderby(k)` is idempotent (spec §8).
    #[test]
    fn orderby_is_idempotent(values in prop::collection::vec(any::<i32>(), 0..64)) {
        let mut board = i32_board(values);
        board.orderby(&["v".to_string()], &[true]).unwrap();
        let first = board.column("v").unwrap().get_column_as_i32(0, board.row_count()).unwrap();
        board.orderby(&["v".to_string()], &[true]).unwrap();
        let second = board.column("v").unwrap().get_column_as_i32(0, board.row_count()).unwrap();
        prop_assert_eq!(first, second);
    }

    /// `orderby` always produces a non-decreasing sequence for ascending
    /// direction, regardless of input order.
    #[test]
    fn orderby_ascending_produces_sorted_output(values in prop::collection::vec(any::<i32>(), 0..64)) {
        let mut board = i32_board(values);
        board.orderby(&["v".to_string()], &[true]).unwrap();
        let sorted = board.column("v").unwrap().get_column_as_i32(0, board.row_count()).unwrap();
        prop_assert!(sorted.windows(2).all(|w| w[0] <= w[1]));
    }

    /// `select("*", "1 = 1")`-equivalent (an always-true predicate) is
    /// observationally equivalent to the original Board (spec §8).
    #[test]
    fn select_under_true_predicate_round_trips(values in prop::collection::vec(any::<i32>(), 0..64)) {
        let board = i32_board(values.clone());
        let select = ProjectClause(vec![("v".to_string(), ProjectTerm::Variable("v".to_string()))]);
        let always_true = ExprTree::Range { column: "v".to_string(), op: CompareOp::NotNull, value: Literal::Num(0.0) };
        let result = board.select(&select, Some(&always_true)).unwrap();
        prop_assert_eq!(result.row_count(), values.len());
        prop_assert_eq!(result.column("v").unwrap().get_column_as_i32(0, result.row_count()).unwrap(), values);
    }

    /// `limit(n)` with `n >= nRows` never changes the row count (spec §8
    /// boundary behaviour), for any `n` at or beyond the board's length.
    #[test]
    fn limit_beyond_length_is_noop(values in prop::collection::vec(any::<i32>(), 0..32), extra in 0usize..16) {
        let mut board = i32_board(values.clone());
        let n = values.len() + extra;
        board.limit(n);
        prop_assert_eq!(board.row_count(), values.len());
    }
}
