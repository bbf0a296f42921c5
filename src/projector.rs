//! `Projector`: evaluates select-clause terms under a mask, materialising a
//! new Board (spec §4.4).

use crate::bitmap::Bitmap;
use crate::board::{Board, ProjectClause, ProjectTerm};
use crate::column::Column;
use crate::error::BoardResult;
use crate::scalar::Literal;

pub struct Projector<'a> {
    board: &'a Board,
}

impl<'a> Projector<'a> {
    pub fn new(board: &'a Board) -> Self {
        Self { board }
    }

    /// Produces a Board with one column per clause term, containing the
    /// rows at `mask`'s set bits, in ascending row order.
    pub fn project(&self, clause: &ProjectClause, mask: &Bitmap) -> BoardResult<Board> {
        let row_count = mask.count_ones();
        let mut out = Board::new_under_construction(format!("{}_projected", self.board.name()));
        for (output_name, term) in &clause.0 {
            let col = self.project_term(output_name, term, mask, row_count)?;
            out.push_column(col)?;
        }
        Ok(out)
    }

    fn project_term(&self, output_name: &str, term: &ProjectTerm, mask: &Bitmap, row_count: usize) -> BoardResult<Column> {
        match term {
            ProjectTerm::Variable(name) => {
                let source = self
                    .board
                    .column(name)
                    .ok_or_else(|| crate::error::BoardError::UnknownColumn { name: name.clone() })?;
                Ok(source.filtered(mask).renamed(output_name))
            }
            ProjectTerm::NumLiteral(n) => Ok(Column::constant_f64(output_name, *n, row_count)),
            ProjectTerm::StrLiteral(s) => Ok(Column::constant_category(output_name, s, row_count)),
            ProjectTerm::CountStar => Ok(Column::ones(output_name, row_count)),
            ProjectTerm::Arith(expr) => {
                let values = crate::expr::eval_rows(expr, self.board, mask)?;
                if values.iter().any(|v| matches!(v, Literal::Str(_))) {
                    let strings = values
                        .into_iter()
                        .map(|v| match v {
                            Literal::Str(s) => s,
                            Literal::Num(n) => n.to_string(),
                        })
                        .collect();
                    Ok(Column::from_string_values(output_name, strings))
                } else {
                    let numbers = values.into_iter().map(|v| v.as_f64().unwrap_or(f64::NAN)).collect();
                    Ok(Column::from_f64_values(output_name, numbers))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::TypedBuffer;
    use crate::types::ScalarType;
    use std::sync::Arc;

    fn board() -> Board {
        let v = Column::from_parts(
            "v",
            ScalarType::I32,
            "",
            TypedBuffer::I32(Arc::new(vec![10, 20, 30])),
            Bitmap::new_set(3),
            None,
        )
        .unwrap();
        Board::from_columns("t", "", vec![v]).unwrap()
    }

    #[test]
    fn variable_projection_filters_by_mask() {
        let board = board();
        let mask = Bitmap::from_bools(&[true, false, true]);
        let clause = ProjectClause(vec![("v".to_string(), ProjectTerm::Variable("v".to_string()))]);
        let result = Projector::new(&board).project(&clause, &mask).unwrap();
        assert_eq!(result.row_count(), 2);
        assert_eq!(result.column("v").unwrap().get_column_as_i32(0, 2).unwrap(), vec![10, 30]);
    }

    #[test]
    fn count_star_materializes_ones() {
        let board = board();
        let clause = ProjectClause(vec![("cnt".to_string(), ProjectTerm::CountStar)]);
        let result = Projector::new(&board).project(&clause, &Bitmap::new_set(3)).unwrap();
        assert_eq!(result.column("cnt").unwrap().get_column_as_u32(0, 3).unwrap(), vec![1, 1, 1]);
    }

    #[test]
    fn string_literal_becomes_one_entry_category() {
        let board = board();
        let clause = ProjectClause(vec![("lbl".to_string(), ProjectTerm::StrLiteral("x".to_string()))]);
        let result = Projector::new(&board).project(&clause, &Bitmap::new_set(3)).unwrap();
        let col = result.column("lbl").unwrap();
        assert_eq!(col.scalar_type(), ScalarType::Category);
        assert_eq!(col.string_at(0), "x");
    }
}
