//! `GroupBy` engine: two-phase partial aggregation (spec §4.5).
//!
//! `groupby_a` materialises distinct key tuples via a [`Bundler`] and folds
//! each aggregator over its group's row list. `groupby_c` applies any
//! post-aggregation top-level expressions, or simply renames when every
//! term is a bare variable reference to an aggregate column.

use crate::bitmap::Bitmap;
use crate::board::{Board, GroupClause, GroupTerm, ProjectClause, ProjectTerm};
use crate::collab::{Bundler, Group};
use crate::column::Column;
use crate::error::{BoardError, BoardResult};
use crate::projector::Projector;
use crate::types::ScalarType;
use std::sync::Arc;

/// The ten aggregators named in spec §4.5 step 3 (nine named kinds, with
/// `CNT` split into its star and column forms).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggKind {
    CntStar,
    Cnt,
    Sum,
    Min,
    Max,
    Avg,
    Var,
    Stdev,
    Median,
    Distinct,
    Concat,
}

impl AggKind {
    /// Separable aggregators (spec glossary): combining two partial results
    /// with the same operator equals the single-pass result. Only these
    /// four are legal in `merge` (§4.6); `CntStar`/`Cnt` both separate as a
    /// plain sum-of-counts.
    pub fn is_separable(self) -> bool {
        matches!(self, AggKind::CntStar | AggKind::Cnt | AggKind::Sum | AggKind::Min | AggKind::Max)
    }
}

pub fn groupby_a(board: &Board, clause: &GroupClause, bundler: &dyn Bundler) -> BoardResult<Board> {
    let mut key_terms: Vec<(String, String)> = Vec::new();
    let mut agg_terms: Vec<(String, AggKind, String)> = Vec::new();
    for (output_name, term) in &clause.0 {
        match term {
            GroupTerm::Key(source_name) => key_terms.push((output_name.clone(), source_name.clone())),
            GroupTerm::Agg(kind, source_name) => agg_terms.push((output_name.clone(), *kind, source_name.clone())),
        }
    }

    let key_column_names: Vec<String> = key_terms.iter().map(|(_, n)| n.clone()).collect();
    let groups = bundler.bundle(board, &key_column_names)?;
    let reps: Vec<usize> = groups.iter().map(|g| g.rows[0]).collect();

    let mut out = Board::new_under_construction(format!("{}_groupby", board.name()));
    for (output_name, source_name) in &key_terms {
        let source = board
            .column(source_name)
            .ok_or_else(|| BoardError::UnknownColumn { name: source_name.clone() })?;
        out.push_column(source.permute(&reps).renamed(output_name.as_str()))?;
    }
    for (output_name, kind, source_name) in &agg_terms {
        let source = if *kind == AggKind::CntStar {
            None
        } else {
            Some(
                board
                    .column(source_name)
                    .ok_or_else(|| BoardError::UnknownColumn { name: source_name.clone() })?,
            )
        };
        out.push_column(aggregate_column(output_name, *kind, source, &groups)?)?;
    }
    Ok(out)
}

pub fn groupby_c(board: &Board, clause: &ProjectClause) -> BoardResult<Board> {
    let all_plain_variables = clause.0.iter().all(|(_, term)| matches!(term, ProjectTerm::Variable(_)));
    if all_plain_variables {
        let mut out = Board::new_under_construction(format!("{}_final", board.name()));
        for (output_name, term) in &clause.0 {
            let ProjectTerm::Variable(source_name) = term else {
                unreachable!("checked above")
            };
            let source = board
                .column(source_name)
                .ok_or_else(|| BoardError::UnknownColumn { name: source_name.clone() })?;
            out.push_column(source.renamed(output_name.as_str()))?;
        }
        Ok(out)
    } else {
        let mask = Bitmap::new_set(board.row_count());
        Projector::new(board).project(clause, &mask)
    }
}

fn group_numeric(col: &Column, rows: &[usize]) -> Vec<f64> {
    rows.iter().filter(|&&r| col.is_valid(r)).filter_map(|&r| col.value_as_f64(r)).collect()
}

fn group_strings(col: &Column, rows: &[usize]) -> Vec<String> {
    rows.iter().filter(|&&r| col.is_valid(r)).map(|&r| col.string_at(r)).collect()
}

fn aggregate_column(output_name: &str, kind: AggKind, source: Option<&Column>, groups: &[Group]) -> BoardResult<Column> {
    match kind {
        AggKind::CntStar => {
            let counts: Vec<u64> = groups.iter().map(|g| g.row_count as u64).collect();
            counts_column(output_name, counts)
        }
        AggKind::Cnt => {
            let col = require(source)?;
            let counts: Vec<u64> = groups
                .iter()
                .map(|g| g.rows.iter().filter(|&&r| col.is_valid(r)).count() as u64)
                .collect();
            counts_column(output_name, counts)
        }
        AggKind::Sum => {
            let col = require(source)?;
            let sums: Vec<f64> = groups.iter().map(|g| group_numeric(col, &g.rows).iter().sum()).collect();
            Ok(Column::from_f64_values(output_name, sums))
        }
        AggKind::Avg => {
            let col = require(source)?;
            let avgs: Vec<f64> = groups
                .iter()
                .map(|g| {
                    let values = group_numeric(col, &g.rows);
                    if values.is_empty() {
                        f64::NAN
                    } else {
                        values.iter().sum::<f64>() / values.len() as f64
                    }
                })
                .collect();
            Ok(Column::from_f64_values(output_name, avgs))
        }
        AggKind::Min => extreme_column(output_name, require(source)?, groups, true),
        AggKind::Max => extreme_column(output_name, require(source)?, groups, false),
        AggKind::Var => welford_column(output_name, require(source)?, groups, false),
        AggKind::Stdev => welford_column(output_name, require(source)?, groups, true),
        AggKind::Median => {
            let col = require(source)?;
            let medians: Vec<f64> = groups
                .iter()
                .map(|g| {
                    let mut values = group_numeric(col, &g.rows);
                    if values.is_empty() {
                        return f64::NAN;
                    }
                    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                    let mid = values.len() / 2;
                    if values.len() % 2 == 0 {
                        (values[mid - 1] + values[mid]) / 2.0
                    } else {
                        values[mid]
                    }
                })
                .collect();
            Ok(Column::from_f64_values(output_name, medians))
        }
        AggKind::Distinct => {
            let col = require(source)?;
            require_string_type(col)?;
            let counts: Vec<u64> = groups
                .iter()
                .map(|g| {
                    let values = group_strings(col, &g.rows);
                    let distinct: std::collections::HashSet<String> = values.into_iter().collect();
                    distinct.len() as u64
                })
                .collect();
            counts_column(output_name, counts)
        }
        AggKind::Concat => {
            let col = require(source)?;
            require_string_type(col)?;
            let joined: Vec<String> = groups
                .iter()
                .map(|g| group_strings(col, &g.rows).join(","))
                .collect();
            Ok(Column::from_string_values(output_name, joined))
        }
    }
}

fn require(source: Option<&Column>) -> BoardResult<&Column> {
    source.ok_or_else(|| BoardError::MissingBuffer { name: "aggregate argument".to_string() })
}

fn require_string_type(col: &Column) -> BoardResult<()> {
    if col.scalar_type().is_string() {
        Ok(())
    } else {
        Err(BoardError::UnsupportedColumnType { found: col.scalar_type() })
    }
}

fn counts_column(output_name: &str, counts: Vec<u64>) -> BoardResult<Column> {
    let len = counts.len();
    Column::from_parts(
        output_name,
        ScalarType::U64,
        "",
        crate::buffer::TypedBuffer::U64(Arc::new(counts)),
        Bitmap::new_set(len),
        None,
    )
}

fn extreme_column(output_name: &str, col: &Column, groups: &[Group], want_min: bool) -> BoardResult<Column> {
    if col.scalar_type().is_string() {
        let values: Vec<String> = groups
            .iter()
            .map(|g| {
                group_strings(col, &g.rows)
                    .into_iter()
                    .fold(None, |acc: Option<String>, s| match acc {
                        None => Some(s),
                        Some(cur) => {
                            let keep = if want_min { s < cur } else { s > cur };
                            Some(if keep { s } else { cur })
                        }
                    })
                    .unwrap_or_default()
            })
            .collect();
        Ok(Column::from_string_values(output_name, values))
    } else {
        let values: Vec<f64> = groups
            .iter()
            .map(|g| {
                group_numeric(col, &g.rows)
                    .into_iter()
                    .fold(None, |acc: Option<f64>, v| match acc {
                        None => Some(v),
                        Some(cur) => Some(if want_min { v.min(cur) } else { v.max(cur) }),
                    })
                    .unwrap_or(f64::NAN)
            })
            .collect();
        Ok(Column::from_f64_values(output_name, values))
    }
}

/// Single-pass population variance/stdev via Welford's online algorithm —
/// no second read of the group's row list.
fn welford_column(output_name: &str, col: &Column, groups: &[Group], stdev: bool) -> BoardResult<Column> {
    let results: Vec<f64> = groups
        .iter()
        .map(|g| {
            let mut mean = 0.0f64;
            let mut m2 = 0.0f64;
            let mut count = 0u64;
            for &row in &g.rows {
                if !col.is_valid(row) {
                    continue;
                }
                let Some(x) = col.value_as_f64(row) else { continue };
                count += 1;
                let delta = x - mean;
                mean += delta / count as f64;
                let delta2 = x - mean;
                m2 += delta * delta2;
            }
            if count == 0 {
                return f64::NAN;
            }
            let variance = m2 / count as f64;
            if stdev { variance.sqrt() } else { variance }
        })
        .collect();
    Ok(Column::from_f64_values(output_name, results))
}
