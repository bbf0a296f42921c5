//! The six literal end-to-end scenarios from spec §8, plus the boundary
//! behaviours listed alongside them. Each test's name cross-references the
//! scenario number in the table rather than restating it.

use std::sync::Arc;

use boardframe::bitmap::Bitmap;
use boardframe::board::{Board, GroupClause, GroupTerm, ProjectClause, ProjectTerm};
use boardframe::buffer::TypedBuffer;
use boardframe::bundler::SortBundler;
use boardframe::column::Column;
use boardframe::types::ScalarType;
use boardframe::{AggKind, CompareOp, Dictionary, ExprTree, Literal};

fn i32_column(name: &str, values: Vec<i32>) -> Column {
    let len = values.len();
    Column::from_parts(name, ScalarType::I32, "", TypedBuffer::I32(Arc::new(values)), Bitmap::new_set(len), None).unwrap()
}

fn category_column(name: &str, values: &[&str]) -> Column {
    let mut dict = Dictionary::new();
    let codes: Vec<u32> = values.iter().map(|v| dict.intern(v)).collect();
    let len = codes.len();
    Column::from_parts(name, ScalarType::Category, "", TypedBuffer::U32(Arc::new(codes)), Bitmap::new_set(len), Some(dict)).unwrap()
}

/// Scenario 1: `select "v" where "id >= 3"` over `id=[1..5], v=[10,20,...,50]`.
#[test]
fn scenario_1_filter_and_project() {
    let id = i32_column("id", vec![1, 2, 3, 4, 5]);
    let v = i32_column("v", vec![10, 20, 30, 40, 50]);
    let board = Board::from_columns("t", "", vec![id, v]).unwrap();

    let select = ProjectClause(vec![("v".to_string(), ProjectTerm::Variable("v".to_string()))]);
    let where_clause = ExprTree::Range { column: "id".to_string(), op: CompareOp::Ge, value: Literal::Num(3.0) };
    let result = board.select(&select, Some(&where_clause)).unwrap();

    assert_eq!(result.row_count(), 3);
    assert_eq!(result.column("v").unwrap().get_column_as_i32(0, 3).unwrap(), vec![30, 40, 50]);
}

/// Scenario 2: `groupby "k, count(*)"` over `k=[a,b,a,c,b,a]` (Category).
#[test]
fn scenario_2_groupby_count_star() {
    let k = category_column("k", &["a", "b", "a", "c", "b", "a"]);
    let board = Board::from_columns("t", "", vec![k]).unwrap();

    let clause = GroupClause(vec![
        ("k".to_string(), GroupTerm::Key("k".to_string())),
        ("count".to_string(), GroupTerm::Agg(AggKind::CntStar, "k".to_string())),
    ]);
    let result = board.groupby(&clause).unwrap();

    assert_eq!(result.row_count(), 3);
    assert_eq!(result.column("k").unwrap().get_column_as_strings(0, 3), vec!["a", "b", "c"]);
    assert_eq!(result.column("count").unwrap().get_column_as_u64(0, 3).unwrap(), vec![3, 2, 1]);
}

/// Scenario 3: merging two partially-aggregated Boards on `k, SUM(v)`.
#[test]
fn scenario_3_merge_partial_aggregates() {
    let mut sp = Board::from_columns(
        "sp",
        "",
        vec![
            Column::from_string_values("k", vec!["a".into(), "b".into()]),
            Column::from_f64_values("v", vec![2.0, 5.0]),
        ],
    )
    .unwrap();
    let tp = Board::from_columns(
        "tp",
        "",
        vec![
            Column::from_string_values("k", vec!["a".into(), "c".into()]),
            Column::from_f64_values("v", vec![3.0, 1.0]),
        ],
    )
    .unwrap();

    let clause = GroupClause(vec![
        ("k".to_string(), GroupTerm::Key("k".to_string())),
        ("v".to_string(), GroupTerm::Agg(AggKind::Sum, "v".to_string())),
    ]);
    let n = sp.merge(&tp, &clause).unwrap();

    assert_eq!(n, 3);
    assert_eq!(sp.column("k").unwrap().get_column_as_strings(0, 3), vec!["a", "b", "c"]);
    assert_eq!(sp.column("v").unwrap().get_column_as_f64(0, 3).unwrap(), vec![5.0, 5.0, 1.0]);
}

/// Scenario 4: `orderby ["x", "y"]` is a stable multi-key sort.
#[test]
fn scenario_4_multi_key_orderby() {
    let x = i32_column("x", vec![3, 1, 4, 1, 5, 9, 2, 6]);
    let y = Column::from_string_values(
        "y",
        vec!["c", "a", "d", "b", "e", "f", "a", "g"].into_iter().map(String::from).collect(),
    );
    let mut board = Board::from_columns("t", "", vec![x, y]).unwrap();

    board.orderby(&["x".to_string(), "y".to_string()], &[true, true]).unwrap();

    assert_eq!(board.column("x").unwrap().get_column_as_i32(0, 8).unwrap(), vec![1, 1, 2, 3, 4, 5, 6, 9]);
    assert_eq!(board.column("y").unwrap().get_column_as_strings(0, 8), vec!["a", "b", "a", "c", "d", "e", "g", "f"]);
}

/// Scenario 5: natural join of R(id, va) and S(id, vb) on `id`.
#[test]
fn scenario_5_natural_join() {
    let r = Board::from_columns(
        "r",
        "",
        vec![i32_column("id", vec![1, 2, 3]), Column::from_string_values("va", vec!["r1", "r2", "r3"].into_iter().map(String::from).collect())],
    )
    .unwrap();
    let s = Board::from_columns(
        "s",
        "",
        vec![i32_column("id", vec![2, 3, 4]), Column::from_string_values("vb", vec!["s2", "s3", "s4"].into_iter().map(String::from).collect())],
    )
    .unwrap();

    let engine = boardframe::JoinEngine::new(&r, &s, "id", None, None).unwrap();
    let out = engine.evaluate(&["R.va".to_string(), "S.vb".to_string()], None).unwrap();

    assert_eq!(out.row_count(), 2);
    let mut pairs: Vec<(String, String)> = (0..out.row_count())
        .map(|i| (out.column("R.va").unwrap().string_at(i), out.column("S.vb").unwrap().string_at(i)))
        .collect();
    pairs.sort();
    assert_eq!(pairs, vec![("r2".to_string(), "s2".to_string()), ("r3".to_string(), "s3".to_string())]);
}

/// Scenario 6: `FROM_UNIXTIME_GMT(ts, '%Y-%m-%d')` over `ts=[0, 86400]`.
#[test]
fn scenario_6_from_unixtime_gmt() {
    use boardframe::{ArithExpr};

    let ts = Column::from_parts("ts", ScalarType::I64, "", TypedBuffer::I64(Arc::new(vec![0, 86400])), Bitmap::new_set(2), None).unwrap();
    let board = Board::from_columns("t", "", vec![ts]).unwrap();

    let select = ProjectClause(vec![(
        "d".to_string(),
        ProjectTerm::Arith(ArithExpr::Call(
            "FROM_UNIXTIME_GMT".to_string(),
            vec![ArithExpr::Variable("ts".to_string()), ArithExpr::StrLiteral("%Y-%m-%d".to_string())],
        )),
    )]);
    let result = board.select(&select, None).unwrap();

    assert_eq!(result.row_count(), 2);
    assert_eq!(result.column("d").unwrap().string_at(0), "1970-01-01");
    assert_eq!(result.column("d").unwrap().string_at(1), "1970-01-02");
}

// ---- Boundary behaviours (spec §8) ----

#[test]
fn empty_board_operators_yield_zero_row_boards() {
    let board = Board::from_columns("t", "", vec![i32_column("id", vec![])]).unwrap();
    assert_eq!(board.row_count(), 0);

    let select = ProjectClause(vec![("id".to_string(), ProjectTerm::Variable("id".to_string()))]);
    let result = board.select(&select, None).unwrap();
    assert_eq!(result.row_count(), 0);

    let clause = GroupClause(vec![("id".to_string(), GroupTerm::Key("id".to_string()))]);
    let grouped = board.groupby_a_with(&clause, &SortBundler).unwrap();
    assert_eq!(grouped.row_count(), 0);
}

#[test]
fn join_with_zero_row_side_is_empty_without_error() {
    let r = Board::from_columns("r", "", vec![i32_column("id", vec![1, 2])]).unwrap();
    let s = Board::from_columns("s", "", vec![i32_column("id", vec![])]).unwrap();

    let engine = boardframe::JoinEngine::new(&r, &s, "id", None, None).unwrap();
    let out = engine.evaluate(&["R.id".to_string()], None).unwrap();
    assert_eq!(out.row_count(), 0);
}

#[test]
fn limit_noop_when_n_at_least_row_count() {
    let mut board = Board::from_columns("t", "", vec![i32_column("id", vec![1, 2, 3])]).unwrap();
    board.limit(10);
    assert_eq!(board.row_count(), 3);
}

#[test]
fn orderby_empty_key_list_is_noop() {
    let mut board = Board::from_columns("t", "", vec![i32_column("id", vec![3, 1, 2])]).unwrap();
    board.orderby(&[], &[]).unwrap();
    assert_eq!(board.column("id").unwrap().get_column_as_i32(0, 3).unwrap(), vec![3, 1, 2]);
}
