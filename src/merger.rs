//! `Merger`: combines two partially-aggregated Boards sharing a select
//! clause (spec §4.6).
//!
//! The six named specializations in the spec (1key/1val, 1key/2val,
//! 1key/nval, 2keys/1val, 2keys/nval, and the general n-key/m-value case)
//! exist in the original to avoid per-row virtual dispatch in a language
//! without monomorphised generics over row width. In Rust the general
//! per-column `rows_equal`/`rows_cmp` path already monomorphises per
//! `Column` call and needs no further hand-duplication — see `DESIGN.md`
//! for the decision record.

use crate::board::{Board, GroupClause, GroupTerm};
use crate::column::Column;
use crate::error::{BoardError, BoardResult};
use crate::groupby::AggKind;
use crate::types::ScalarType;
use std::cmp::Ordering;

pub fn merge(self_board: &mut Board, other: &Board, clause: &GroupClause) -> BoardResult<usize> {
    let mut keys: Vec<String> = Vec::new();
    let mut values: Vec<(String, AggKind)> = Vec::new();
    for (_, term) in &clause.0 {
        match term {
            GroupTerm::Key(name) => keys.push(name.clone()),
            GroupTerm::Agg(kind, name) => {
                if !kind.is_separable() {
                    return Err(BoardError::NonSeparableAggregator {
                        agg: format!("{kind:?}"),
                    });
                }
                values.push((name.clone(), *kind));
            }
        }
    }

    for name in keys.iter().chain(values.iter().map(|(n, _)| n)) {
        let a = self_board
            .column(name)
            .ok_or_else(|| BoardError::UnknownColumn { name: name.clone() })?;
        let b = other
            .column(name)
            .ok_or_else(|| BoardError::UnknownColumn { name: name.clone() })?;
        if a.scalar_type() != b.scalar_type() {
            return Err(BoardError::TypeMismatch {
                name: name.clone(),
                expected: a.scalar_type(),
                found: b.scalar_type(),
            });
        }
    }

    let self_rows = self_board.row_count();
    let other_rows = other.row_count();
    let same_keys = self_rows == other_rows
        && keys.iter().all(|k| {
            let a = self_board.column(k).expect("validated above");
            let b = other.column(k).expect("validated above");
            (0..self_rows).all(|i| a.rows_equal(i, b, i))
        });

    if same_keys {
        for (name, kind) in &values {
            fold_in_place(self_board, other, name, *kind)?;
        }
        return Ok(self_rows);
    }

    k_way_merge(self_board, other, &keys, &values)
}

fn combine_f64(kind: AggKind, a: f64, b: f64) -> f64 {
    match kind {
        AggKind::CntStar | AggKind::Cnt | AggKind::Sum => a + b,
        AggKind::Min => a.min(b),
        AggKind::Max => a.max(b),
        _ => unreachable!("non-separable aggregators are rejected before reaching here"),
    }
}

/// String-typed counterpart of `combine_f64`, used when a `MIN`/`MAX`
/// value column is `Text`/`Category` (groupby.rs's `extreme_column`
/// supports string min/max; `CNT`/`SUM` never produce a string-typed
/// value column, so those kinds never reach here).
fn combine_string(kind: AggKind, a: String, b: String) -> String {
    match kind {
        AggKind::Min => if a <= b { a } else { b },
        AggKind::Max => if a >= b { a } else { b },
        _ => unreachable!("only MIN/MAX produce string-typed merge values"),
    }
}

/// Rebuilds `name` with `ty`'s exact scalar type (preserving a `Category`
/// column's dictionary and any other column's storage width) from a
/// combining function applied row-by-row, instead of collapsing every
/// non-string column to `F64` and every string column to plain `Text`
/// (spec §4.6: merge output must keep "the same column types").
fn combine_column(
    name: &str,
    ty: ScalarType,
    n: usize,
    str_at: impl Fn(usize) -> String,
    f64_at: impl Fn(usize) -> f64,
) -> Column {
    if ty.is_string() {
        let values: Vec<String> = (0..n).map(str_at).collect();
        if ty == ScalarType::Category {
            Column::category_from_strings(name, values)
        } else {
            Column::from_string_values(name, values)
        }
    } else {
        let values: Vec<f64> = (0..n).map(f64_at).collect();
        Column::from_f64_values_as(name, ty, values)
    }
}

fn fold_in_place(self_board: &mut Board, other: &Board, name: &str, kind: AggKind) -> BoardResult<()> {
    let self_col = self_board.column(name).expect("validated above");
    let other_col = other.column(name).expect("validated above");
    let n = self_col.len();
    let ty = self_col.scalar_type();
    let new_col = combine_column(
        name,
        ty,
        n,
        |row| combine_string(kind, self_col.string_at(row), other_col.string_at(row)),
        |row| combine_f64(kind, self_col.value_as_f64(row).unwrap_or(f64::NAN), other_col.value_as_f64(row).unwrap_or(f64::NAN)),
    );
    self_board.replace_column(new_col)
}

enum Pick {
    SelfRow(usize),
    OtherRow(usize),
    Both(usize, usize),
}

fn k_way_merge(
    self_board: &mut Board,
    other: &Board,
    keys: &[String],
    values: &[(String, AggKind)],
) -> BoardResult<usize> {
    let self_rows = self_board.row_count();
    let other_rows = other.row_count();
    let mut i = 0;
    let mut j = 0;
    let mut picks: Vec<Pick> = Vec::new();

    while i < self_rows || j < other_rows {
        if i >= self_rows {
            picks.push(Pick::OtherRow(j));
            j += 1;
            continue;
        }
        if j >= other_rows {
            picks.push(Pick::SelfRow(i));
            i += 1;
            continue;
        }
        let mut ord = Ordering::Equal;
        for k in keys {
            let a = self_board.column(k).expect("validated above");
            let b = other.column(k).expect("validated above");
            ord = a.rows_cmp(i, b, j);
            if ord != Ordering::Equal {
                break;
            }
        }
        match ord {
            Ordering::Less => {
                picks.push(Pick::SelfRow(i));
                i += 1;
            }
            Ordering::Greater => {
                picks.push(Pick::OtherRow(j));
                j += 1;
            }
            Ordering::Equal => {
                picks.push(Pick::Both(i, j));
                i += 1;
                j += 1;
            }
        }
    }

    let out_len = picks.len();
    let mut new_columns: Vec<Column> = Vec::new();

    for k in keys {
        let a = self_board.column(k).expect("validated above");
        let b = other.column(k).expect("validated above");
        let ty = a.scalar_type();
        new_columns.push(combine_column(
            k.as_str(),
            ty,
            out_len,
            |row| match &picks[row] {
                Pick::SelfRow(i) => a.string_at(*i),
                Pick::OtherRow(j) => b.string_at(*j),
                // keys are equal on both sides when matched, so either works
                Pick::Both(i, _) => a.string_at(*i),
            },
            |row| match &picks[row] {
                Pick::SelfRow(i) => a.value_as_f64(*i).unwrap_or(f64::NAN),
                Pick::OtherRow(j) => b.value_as_f64(*j).unwrap_or(f64::NAN),
                Pick::Both(i, _) => a.value_as_f64(*i).unwrap_or(f64::NAN),
            },
        ));
    }

    for (name, kind) in values {
        let a = self_board.column(name).expect("validated above");
        let b = other.column(name).expect("validated above");
        let ty = a.scalar_type();
        new_columns.push(combine_column(
            name.as_str(),
            ty,
            out_len,
            |row| match &picks[row] {
                Pick::SelfRow(i) => a.string_at(*i),
                Pick::OtherRow(j) => b.string_at(*j),
                Pick::Both(i, j) => combine_string(*kind, a.string_at(*i), b.string_at(*j)),
            },
            |row| match &picks[row] {
                Pick::SelfRow(i) => a.value_as_f64(*i).unwrap_or(f64::NAN),
                Pick::OtherRow(j) => b.value_as_f64(*j).unwrap_or(f64::NAN),
                Pick::Both(i, j) => {
                    combine_f64(*kind, a.value_as_f64(*i).unwrap_or(f64::NAN), b.value_as_f64(*j).unwrap_or(f64::NAN))
                }
            },
        ));
    }

    let mut rebuilt = Board::new_under_construction(self_board.name().to_string());
    for col in new_columns {
        rebuilt.push_column(col)?;
    }
    *self_board = rebuilt;
    Ok(out_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::Bitmap;
    use crate::buffer::TypedBuffer;
    use crate::types::ScalarType;
    use std::sync::Arc;

    fn partial_board(keys: Vec<&str>, sums: Vec<f64>) -> Board {
        let k = Column::from_string_values("k", keys.into_iter().map(String::from).collect());
        let v = Column::from_parts(
            "v",
            ScalarType::F64,
            "",
            TypedBuffer::F64(Arc::new(sums.clone())),
            Bitmap::new_set(sums.len()),
            None,
        )
        .unwrap();
        Board::from_columns("p", "", vec![k, v]).unwrap()
    }

    #[test]
    fn merge_matches_scenario_3() {
        let mut sp = partial_board(vec!["a", "b"], vec![2.0, 5.0]);
        let tp = partial_board(vec!["a", "c"], vec![3.0, 1.0]);
        let clause = GroupClause(vec![
            ("k".to_string(), GroupTerm::Key("k".to_string())),
            ("v".to_string(), GroupTerm::Agg(AggKind::Sum, "v".to_string())),
        ]);
        let n = sp.merge(&tp, &clause).unwrap();
        assert_eq!(n, 3);
        assert_eq!(sp.column("k").unwrap().get_column_as_strings(0, 3), vec!["a", "b", "c"]);
        assert_eq!(sp.column("v").unwrap().get_column_as_f64(0, 3).unwrap(), vec![5.0, 5.0, 1.0]);
    }

    #[test]
    fn non_separable_aggregator_rejected() {
        let mut sp = partial_board(vec!["a"], vec![1.0]);
        let tp = partial_board(vec!["a"], vec![2.0]);
        let clause = GroupClause(vec![
            ("k".to_string(), GroupTerm::Key("k".to_string())),
            ("v".to_string(), GroupTerm::Agg(AggKind::Median, "v".to_string())),
        ]);
        assert!(sp.merge(&tp, &clause).is_err());
    }

    #[test]
    fn identical_keys_fold_in_place() {
        let mut sp = partial_board(vec!["a", "b"], vec![2.0, 5.0]);
        let tp = partial_board(vec!["a", "b"], vec![1.0, 1.0]);
        let clause = GroupClause(vec![
            ("k".to_string(), GroupTerm::Key("k".to_string())),
            ("v".to_string(), GroupTerm::Agg(AggKind::Max, "v".to_string())),
        ]);
        let n = sp.merge(&tp, &clause).unwrap();
        assert_eq!(n, 2);
        assert_eq!(sp.column("v").unwrap().get_column_as_f64(0, 2).unwrap(), vec![2.0, 5.0]);
    }

    fn category_column(values: &[&str]) -> Column {
        let mut dict = crate::dict::Dictionary::new();
        let codes: Vec<u32> = values.iter().map(|v| dict.intern(v)).collect();
        let len = codes.len();
        Column::from_parts("k", ScalarType::Category, "", TypedBuffer::U32(Arc::new(codes)), Bitmap::new_set(len), Some(dict)).unwrap()
    }

    #[test]
    fn category_key_keeps_dictionary_after_merge() {
        let sp_k = category_column(&["a", "b"]);
        let sp_v = Column::from_f64_values("v", vec![2.0, 5.0]);
        let mut sp = Board::from_columns("sp", "", vec![sp_k, sp_v]).unwrap();

        let tp_k = category_column(&["a", "c"]);
        let tp_v = Column::from_f64_values("v", vec![3.0, 1.0]);
        let tp = Board::from_columns("tp", "", vec![tp_k, tp_v]).unwrap();

        let clause = GroupClause(vec![
            ("k".to_string(), GroupTerm::Key("k".to_string())),
            ("v".to_string(), GroupTerm::Agg(AggKind::Sum, "v".to_string())),
        ]);
        let n = sp.merge(&tp, &clause).unwrap();

        assert_eq!(n, 3);
        let k = sp.column("k").unwrap();
        assert_eq!(k.scalar_type(), ScalarType::Category);
        assert!(k.dictionary().is_some(), "category key must keep a dictionary, not degrade to Text");
        assert_eq!(k.get_column_as_strings(0, 3), vec!["a", "b", "c"]);
        assert_eq!(sp.column("v").unwrap().get_column_as_f64(0, 3).unwrap(), vec![5.0, 5.0, 1.0]);
    }

    #[test]
    fn string_typed_min_max_value_survives_merge() {
        let sp_k = Column::from_string_values("k", vec!["a".to_string(), "b".to_string()]);
        let sp_v = Column::from_string_values("v", vec!["mango".to_string(), "apple".to_string()]);
        let mut sp = Board::from_columns("sp", "", vec![sp_k, sp_v]).unwrap();

        let tp_k = Column::from_string_values("k", vec!["a".to_string(), "c".to_string()]);
        let tp_v = Column::from_string_values("v", vec!["kiwi".to_string(), "pear".to_string()]);
        let tp = Board::from_columns("tp", "", vec![tp_k, tp_v]).unwrap();

        let clause = GroupClause(vec![
            ("k".to_string(), GroupTerm::Key("k".to_string())),
            ("v".to_string(), GroupTerm::Agg(AggKind::Min, "v".to_string())),
        ]);
        let n = sp.merge(&tp, &clause).unwrap();

        assert_eq!(n, 3);
        let v = sp.column("v").unwrap();
        assert_eq!(v.scalar_type(), ScalarType::Text, "MIN over a Text column must stay Text, not collapse to NaN/F64");
        assert_eq!(v.get_column_as_strings(0, 3), vec!["kiwi", "apple", "pear"]);
    }
}
