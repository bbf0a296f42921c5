//! `Ordering`: a multi-key stable sort that preserves equal-run
//! segmentation across passes (spec §4.7).
//!
//! Each key is applied as a separate pass, sorted only within the segments
//! the previous pass established — a continuation of the technique
//! `bundler.rs` reuses for GroupBy's key bundling. Descending order is a
//! stable forward sort followed by reversing the *order of equal-key
//! groups* (not the rows within a group), which keeps ties in their
//! pre-existing relative order exactly like a forward ascending sort would.

use crate::board::Board;
use crate::column::Column;
use crate::error::{BoardError, BoardResult};

/// Sorts one segment `[start, end)` of `permutation` by `col`, returning
/// the equal-key sub-ranges (as absolute offsets into `permutation`) in
/// their final output order — reversed group-order when `descending`.
fn sort_segment(permutation: &mut [usize], start: usize, end: usize, col: &Column, descending: bool) -> Vec<(usize, usize)> {
    let slice = &mut permutation[start..end];
    slice.sort_by(|&a, &b| col.cmp_rows(a, b));

    let mut runs: Vec<(usize, usize)> = Vec::new();
    let mut run_start = 0;
    for i in 1..slice.len() {
        if col.cmp_rows(slice[i - 1], slice[i]) != std::cmp::Ordering::Equal {
            runs.push((run_start, i));
            run_start = i;
        }
    }
    if !slice.is_empty() {
        runs.push((run_start, slice.len()));
    }

    if descending {
        let mut reordered = Vec::with_capacity(slice.len());
        for &(s, e) in runs.iter().rev() {
            reordered.extend_from_slice(&slice[s..e]);
        }
        slice.copy_from_slice(&reordered);
        let mut new_runs = Vec::with_capacity(runs.len());
        let mut pos = 0;
        for &(s, e) in runs.iter().rev() {
            let len = e - s;
            new_runs.push((start + pos, start + pos + len));
            pos += len;
        }
        new_runs
    } else {
        runs.into_iter().map(|(s, e)| (start + s, start + e)).collect()
    }
}

/// In-place multi-key stable sort (spec §4.7). An empty key list is a
/// no-op (spec §8 boundary behaviour).
pub fn orderby(board: &mut Board, keys: &[String], directions: &[bool]) -> BoardResult<()> {
    if keys.is_empty() {
        return Ok(());
    }
    let n = board.row_count();
    let mut permutation: Vec<usize> = (0..n).collect();
    let mut segments: Vec<(usize, usize)> = vec![(0, n)];

    for (idx, key) in keys.iter().enumerate() {
        let col = board
            .column(key)
            .ok_or_else(|| BoardError::UnknownColumn { name: key.clone() })?;
        let descending = !directions.get(idx).copied().unwrap_or(true);
        let mut next_segments = Vec::new();
        for &(start, end) in &segments {
            next_segments.extend(sort_segment(&mut permutation, start, end, col, descending));
        }
        segments = next_segments;
    }

    board.permute(&permutation);
    Ok(())
}

/// `reorder()` with no arguments: heuristic ordering by every integer
/// column whose value range exceeds zero, narrowest range first (spec
/// §4.7 — "maximises cache friendliness for subsequent scans").
pub fn reorder(board: &mut Board) -> BoardResult<()> {
    let mut candidates: Vec<(String, f64)> = Vec::new();
    for col in board.columns() {
        if !col.scalar_type().is_integer() {
            continue;
        }
        if let (Some(min), Some(max)) = (col.min(), col.max()) {
            let range = max.as_f64() - min.as_f64();
            if range > 0.0 {
                candidates.push((col.name().to_string(), range));
            }
        }
    }
    candidates.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    let keys: Vec<String> = candidates.into_iter().map(|(name, _)| name).collect();
    let directions = vec![true; keys.len()];
    orderby(board, &keys, &directions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::Bitmap;
    use crate::buffer::TypedBuffer;
    use crate::types::ScalarType;
    use std::sync::Arc;

    fn scenario_4_board() -> Board {
        let x = Column::from_parts(
            "x",
            ScalarType::I32,
            "",
            TypedBuffer::I32(Arc::new(vec![3, 1, 4, 1, 5, 9, 2, 6])),
            Bitmap::new_set(8),
            None,
        )
        .unwrap();
        let y = Column::from_string_values(
            "y",
            vec!["c", "a", "d", "b", "e", "f", "a", "g"].into_iter().map(String::from).collect(),
        );
        Board::from_columns("t", "", vec![x, y]).unwrap()
    }

    #[test]
    fn multi_key_orderby_matches_scenario_4() {
        let mut board = scenario_4_board();
        orderby(&mut board, &["x".to_string(), "y".to_string()], &[true, true]).unwrap();
        assert_eq!(
            board.column("x").unwrap().get_column_as_i32(0, 8).unwrap(),
            vec![1, 1, 2, 3, 4, 5, 6, 9]
        );
        assert_eq!(
            board.column("y").unwrap().get_column_as_strings(0, 8),
            vec!["a", "b", "a", "c", "d", "e", "g", "f"]
        );
    }

    #[test]
    fn orderby_is_idempotent() {
        let mut board = scenario_4_board();
        orderby(&mut board, &["x".to_string()], &[true]).unwrap();
        let first = board.column("x").unwrap().get_column_as_i32(0, 8).unwrap();
        orderby(&mut board, &["x".to_string()], &[true]).unwrap();
        let second = board.column("x").unwrap().get_column_as_i32(0, 8).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_key_list_is_noop() {
        let mut board = scenario_4_board();
        let before = board.column("x").unwrap().get_column_as_i32(0, 8).unwrap();
        orderby(&mut board, &[], &[]).unwrap();
        let after = board.column("x").unwrap().get_column_as_i32(0, 8).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn descending_reverses_group_order_not_ties() {
        let mut board = scenario_4_board();
        orderby(&mut board, &["x".to_string()], &[false]).unwrap();
        assert_eq!(
            board.column("x").unwrap().get_column_as_i32(0, 8).unwrap(),
            vec![9, 6, 5, 4, 3, 2, 1, 1]
        );
    }
}
