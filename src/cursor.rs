//! Row-wise `Cursor` over a Board (spec §4.9). A thin positional wrapper:
//! all typed reads reuse the single-value range form of `Column`'s existing
//! widening accessors rather than duplicating the widening table here.

use crate::board::Board;
use crate::column::{Column, ReadError};
use crate::error::{BoardError, BoardResult};
use crate::scalar::Literal;
use std::io::{self, Write};

/// One fetched row: output column name paired with its value in the
/// Board's display order.
pub struct Row(pub Vec<(String, Literal)>);

pub struct Cursor<'a> {
    board: &'a Board,
    pos: Option<usize>,
}

impl<'a> Cursor<'a> {
    pub fn new(board: &'a Board) -> Self {
        Self { board, pos: None }
    }

    pub fn position(&self) -> Option<usize> {
        self.pos
    }

    /// Advances by one row. Returns the new row index, or `-1` at end
    /// (spec §4.9 literal contract).
    pub fn fetch(&mut self) -> i64 {
        let next = match self.pos {
            None => 0,
            Some(p) => p + 1,
        };
        if next >= self.board.row_count() {
            self.pos = None;
            -1
        } else {
            self.pos = Some(next);
            next as i64
        }
    }

    /// Random access to a specific row index.
    pub fn fetch_at(&mut self, row_index: usize) -> BoardResult<()> {
        if row_index >= self.board.row_count() {
            return Err(BoardError::RowIndexOutOfRange { row: row_index, len: self.board.row_count() });
        }
        self.pos = Some(row_index);
        Ok(())
    }

    /// Advances by one row and materialises it as a [`Row`] record.
    pub fn fetch_row(&mut self) -> Option<Row> {
        if self.fetch() < 0 {
            return None;
        }
        let row = self.pos.expect("fetch() returned non-negative");
        let mut fields = Vec::new();
        for name in self.board.effective_order() {
            let col = self.board.column(&name).expect("effective_order names only existing columns");
            let value = if col.scalar_type().is_string() {
                Literal::Str(col.string_at(row))
            } else {
                Literal::Num(col.value_as_f64(row).unwrap_or(f64::NAN))
            };
            fields.push((name, value));
        }
        Some(Row(fields))
    }

    fn current(&self) -> BoardResult<usize> {
        self.pos.ok_or(BoardError::CursorNotPositioned)
    }

    fn column(&self, name: &str) -> BoardResult<&Column> {
        self.board.column(name).ok_or_else(|| BoardError::UnknownColumn { name: name.to_string() })
    }

    pub fn get_column_as_i64(&self, name: &str) -> BoardResult<i64> {
        let row = self.current()?;
        self.column(name)?.get_column_as_i64(row, row + 1).map(|v| v[0]).map_err(read_error)
    }

    pub fn get_column_as_u64(&self, name: &str) -> BoardResult<u64> {
        let row = self.current()?;
        self.column(name)?.get_column_as_u64(row, row + 1).map(|v| v[0]).map_err(read_error)
    }

    pub fn get_column_as_f64(&self, name: &str) -> BoardResult<f64> {
        let row = self.current()?;
        self.column(name)?.get_column_as_f64(row, row + 1).map(|v| v[0]).map_err(read_error)
    }

    pub fn get_column_as_string(&self, name: &str) -> BoardResult<String> {
        let row = self.current()?;
        Ok(self.column(name)?.string_at(row))
    }

    /// `dump(writer, delimiter)` for the current row only (spec §4.9).
    pub fn dump(&self, writer: &mut dyn Write, delimiter: &str) -> BoardResult<()> {
        let row = self.current()?;
        let names = self.board.effective_order();
        for (i, name) in names.iter().enumerate() {
            if i > 0 {
                write!(writer, "{delimiter}").map_err(io_error)?;
            }
            let col = self.column(name)?;
            write!(writer, "{}", col.string_at(row)).map_err(io_error)?;
        }
        writeln!(writer).map_err(io_error)?;
        Ok(())
    }
}

fn read_error(e: ReadError) -> BoardError {
    match e {
        ReadError::TypeMismatch => BoardError::TypeMismatch {
            name: "<cursor read>".to_string(),
            expected: crate::types::ScalarType::F64,
            found: crate::types::ScalarType::Text,
        },
        ReadError::MissingBuffer => BoardError::MissingBuffer { name: "<cursor read>".to_string() },
    }
}

fn io_error(e: io::Error) -> BoardError {
    BoardError::Io(e.to_string())
}
