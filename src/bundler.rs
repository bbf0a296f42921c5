//! Default [`Bundler`] implementation: segmented sort, the same technique
//! `ordering.rs` uses for `orderby` (spec §4.5: "assumed to sort by the
//! keys and segment equal runs"). Reusing the sort-then-segment approach
//! here keeps GroupBy's key order consistent with Ordering's, which
//! `merge` (§4.6) depends on.

use crate::board::Board;
use crate::collab::{Bundler, Group};
use crate::column::Column;
use crate::error::{BoardError, BoardResult};

pub struct SortBundler;

impl Bundler for SortBundler {
    fn bundle(&self, board: &Board, key_columns: &[String]) -> BoardResult<Vec<Group>> {
        sort_bundle(board, key_columns)
    }
}

/// Groups `board`'s rows by equal tuples of `key_columns`, returning groups
/// in ascending lexicographic key order.
pub fn sort_bundle(board: &Board, key_columns: &[String]) -> BoardResult<Vec<Group>> {
    let cols: Vec<&Column> = key_columns
        .iter()
        .map(|name| {
            board
                .column(name)
                .ok_or_else(|| BoardError::UnknownColumn { name: name.clone() })
        })
        .collect::<BoardResult<_>>()?;

    let n = board.row_count();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        for col in &cols {
            let ord = col.cmp_rows(a, b);
            if ord != std::cmp::Ordering::Equal {
                return ord;
            }
        }
        std::cmp::Ordering::Equal
    });

    let mut groups = Vec::new();
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && cols.iter().all(|c| c.cmp_rows(order[i], order[j]) == std::cmp::Ordering::Equal) {
            j += 1;
        }
        groups.push(Group {
            row_count: j - i,
            rows: order[i..j].to_vec(),
        });
        i = j;
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::Bitmap;
    use crate::buffer::TypedBuffer;
    use crate::types::ScalarType;
    use std::sync::Arc;

    #[test]
    fn groups_equal_keys_into_one_bundle() {
        let mut dict = crate::dict::Dictionary::new();
        let a = dict.intern("a");
        let b = dict.intern("b");
        let k = Column::from_parts(
            "k",
            ScalarType::Category,
            "",
            TypedBuffer::U32(Arc::new(vec![a, b, a, a, b, a])),
            Bitmap::new_set(6),
            Some(dict),
        )
        .unwrap();
        let board = Board::from_columns("t", "", vec![k]).unwrap();
        let groups = sort_bundle(&board, &["k".to_string()]).unwrap();
        assert_eq!(groups.len(), 2);
        let sizes: Vec<usize> = groups.iter().map(|g| g.row_count).collect();
        assert_eq!(sizes, vec![4, 2]);
    }
}
