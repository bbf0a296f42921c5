//! `Column`: a named, typed sequence of values with an attached validity
//! bitmap (spec §3, §4.1).
//!
//! A single concrete struct carries a type tag (`ScalarType`); there is no
//! per-type struct hierarchy (design note: "single concrete Column struct
//! with a type tag, plus free functions dispatching on the tag").

use crate::bitmap::Bitmap;
use crate::buffer::TypedBuffer;
use crate::dict::Dictionary;
use crate::error::{BoardError, BoardResult};
use crate::scalar::{CompareOp, ExtremeValue, Literal};
use crate::sentinel::*;
use crate::types::{ScalarType, can_widen};
use smol_str::SmolStr;
use std::io::{self, Write};

/// Negative-code read error for the widening-read family of operations
/// (spec §4.1, §7): `-1` unknown column (not applicable at the `Column`
/// level — reserved for `Board`), `-2` type mismatch, `-3` missing buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    #[error("type mismatch")]
    TypeMismatch,
    #[error("missing buffer")]
    MissingBuffer,
}

impl ReadError {
    pub fn code(self) -> i64 {
        match self {
            ReadError::TypeMismatch => -2,
            ReadError::MissingBuffer => -3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Column {
    name: SmolStr,
    description: String,
    ty: ScalarType,
    /// Present only for `Category` and dictionary-backed `U32` columns.
    dict: Option<Dictionary>,
    validity: Bitmap,
    buffer: TypedBuffer,
}

/// Internal 64-bit-wide carrier used to implement every widening read from
/// a single conversion site per destination type, instead of one bespoke
/// conversion per (source, destination) pair.
#[derive(Debug, Clone, Copy)]
enum Raw {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

macro_rules! impl_raw_to {
    ($fn_name:ident, $t:ty) => {
        fn $fn_name(r: Raw) -> $t {
            match r {
                Raw::Signed(v) => v as $t,
                Raw::Unsigned(v) => v as $t,
                Raw::Float(v) => v as $t,
            }
        }
    };
}
impl_raw_to!(raw_to_i8, i8);
impl_raw_to!(raw_to_i16, i16);
impl_raw_to!(raw_to_i32, i32);
impl_raw_to!(raw_to_i64, i64);
impl_raw_to!(raw_to_u8, u8);
impl_raw_to!(raw_to_u16, u16);
impl_raw_to!(raw_to_u32, u32);
impl_raw_to!(raw_to_u64, u64);
impl_raw_to!(raw_to_f32, f32);
impl_raw_to!(raw_to_f64, f64);

impl Column {
    /// Constructs an empty column of the given type. `Category` and
    /// dictionary-backed `U32` columns start with an empty dictionary.
    pub fn new_empty(name: impl Into<SmolStr>, ty: ScalarType, description: impl Into<String>) -> Self {
        let dict = matches!(ty, ScalarType::Category).then(Dictionary::new);
        Self {
            name: name.into(),
            description: description.into(),
            ty,
            dict,
            validity: Bitmap::new_clear(0),
            buffer: TypedBuffer::new(ty),
        }
    }

    /// Constructs a column from an already-materialized buffer and
    /// validity bitmap. Fails (Shape error) if their lengths disagree, or
    /// (Schema error) if a `Category` code is out of range.
    pub fn from_parts(
        name: impl Into<SmolStr>,
        ty: ScalarType,
        description: impl Into<String>,
        buffer: TypedBuffer,
        validity: Bitmap,
        dict: Option<Dictionary>,
    ) -> BoardResult<Self> {
        if buffer.len() != validity.len() {
            return Err(BoardError::RowCountMismatch {
                board_rows: validity.len(),
                data_rows: buffer.len(),
            });
        }
        let col = Self {
            name: name.into(),
            description: description.into(),
            ty,
            dict,
            validity,
            buffer,
        };
        col.check_category_codes()?;
        Ok(col)
    }

    fn check_category_codes(&self) -> BoardResult<()> {
        if self.ty != ScalarType::Category {
            return Ok(());
        }
        let dict_size = self.dict.as_ref().map(|d| d.size()).unwrap_or(0) as u32;
        if let TypedBuffer::U32(codes) = &self.buffer {
            for &c in codes.iter() {
                if c != 0 && c > dict_size {
                    return Err(BoardError::TypeMismatch {
                        name: self.name.to_string(),
                        expected: ScalarType::Category,
                        found: ScalarType::Category,
                    });
                }
            }
        }
        Ok(())
    }

    /// A constant `F64` column of `len` identical valid values (Projector's
    /// "numeric literal" term, spec §4.4).
    pub fn constant_f64(name: impl Into<SmolStr>, value: f64, len: usize) -> Column {
        Column {
            name: name.into(),
            description: String::new(),
            ty: ScalarType::F64,
            dict: None,
            validity: Bitmap::new_set(len),
            buffer: TypedBuffer::F64(std::sync::Arc::new(vec![value; len])),
        }
    }

    /// A constant `Category` column with a one-entry dictionary (Projector's
    /// "string literal" term, spec §4.4).
    pub fn constant_category(name: impl Into<SmolStr>, value: &str, len: usize) -> Column {
        let mut dict = Dictionary::new();
        let code = dict.intern(value);
        Column {
            name: name.into(),
            description: String::new(),
            ty: ScalarType::Category,
            dict: Some(dict),
            validity: Bitmap::new_set(len),
            buffer: TypedBuffer::U32(std::sync::Arc::new(vec![code; len])),
        }
    }

    /// A constant `U32` column of all ones (`count(*)`'s per-row unit,
    /// later summed by group-by).
    pub fn ones(name: impl Into<SmolStr>, len: usize) -> Column {
        Column {
            name: name.into(),
            description: String::new(),
            ty: ScalarType::U32,
            dict: None,
            validity: Bitmap::new_set(len),
            buffer: TypedBuffer::U32(std::sync::Arc::new(vec![1u32; len])),
        }
    }

    /// Builds a `F64` column directly from row values, with `NaN` entries
    /// treated as invalid (arithmetic's null-propagation convention, §9).
    pub fn from_f64_values(name: impl Into<SmolStr>, values: Vec<f64>) -> Column {
        let validity = Bitmap::from_bools(&values.iter().map(|v| !v.is_nan()).collect::<Vec<_>>());
        Column {
            name: name.into(),
            description: String::new(),
            ty: ScalarType::F64,
            dict: None,
            validity,
            buffer: TypedBuffer::F64(std::sync::Arc::new(values)),
        }
    }

    /// Builds a `Text` column directly from row values.
    pub fn from_string_values(name: impl Into<SmolStr>, values: Vec<String>) -> Column {
        let len = values.len();
        Column {
            name: name.into(),
            description: String::new(),
            ty: ScalarType::Text,
            dict: None,
            validity: Bitmap::new_set(len),
            buffer: TypedBuffer::Str(std::sync::Arc::new(values)),
        }
    }

    /// Builds a column of `ty`'s exact physical representation from `f64`
    /// values, `NaN` treated as invalid per `from_f64_values`'s convention.
    /// Used by the Merger and JoinEngine so a rebuilt non-string column
    /// keeps its original width (e.g. `I32`) instead of widening to `F64`
    /// (spec §4.6/§4.8: merged/joined output must keep "the same column
    /// types").
    pub fn from_f64_values_as(name: impl Into<SmolStr>, ty: ScalarType, values: Vec<f64>) -> Column {
        let validity = Bitmap::from_bools(&values.iter().map(|v| !v.is_nan()).collect::<Vec<_>>());
        let buffer = match ty {
            ScalarType::I8 => TypedBuffer::I8(std::sync::Arc::new(values.iter().map(|&v| v as i8).collect())),
            ScalarType::I16 => TypedBuffer::I16(std::sync::Arc::new(values.iter().map(|&v| v as i16).collect())),
            ScalarType::I32 => TypedBuffer::I32(std::sync::Arc::new(values.iter().map(|&v| v as i32).collect())),
            ScalarType::I64 => TypedBuffer::I64(std::sync::Arc::new(values.iter().map(|&v| v as i64).collect())),
            ScalarType::U8 => TypedBuffer::U8(std::sync::Arc::new(values.iter().map(|&v| v as u8).collect())),
            ScalarType::U16 => TypedBuffer::U16(std::sync::Arc::new(values.iter().map(|&v| v as u16).collect())),
            ScalarType::U32 => TypedBuffer::U32(std::sync::Arc::new(values.iter().map(|&v| v as u32).collect())),
            ScalarType::U64 => TypedBuffer::U64(std::sync::Arc::new(values.iter().map(|&v| v as u64).collect())),
            ScalarType::F32 => TypedBuffer::F32(std::sync::Arc::new(values.iter().map(|&v| v as f32).collect())),
            _ => TypedBuffer::F64(std::sync::Arc::new(values)),
        };
        Column {
            name: name.into(),
            description: String::new(),
            ty,
            dict: None,
            validity,
            buffer,
        }
    }

    /// Builds a `Category` column from decoded strings, interning a fresh
    /// dictionary — the dictionary-preserving counterpart of
    /// `from_f64_values_as` for string-backed output (a `Category` column
    /// gathered by the Merger/JoinEngine must keep its dictionary, not
    /// degrade to plain `Text`).
    pub fn category_from_strings(name: impl Into<SmolStr>, values: Vec<String>) -> Column {
        let mut dict = Dictionary::new();
        let codes: Vec<u32> = values.iter().map(|s| dict.intern(s)).collect();
        let len = codes.len();
        Column {
            name: name.into(),
            description: String::new(),
            ty: ScalarType::Category,
            dict: Some(dict),
            validity: Bitmap::new_set(len),
            buffer: TypedBuffer::U32(std::sync::Arc::new(codes)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn scalar_type(&self) -> ScalarType {
        self.ty
    }

    pub fn dictionary(&self) -> Option<&Dictionary> {
        self.dict.as_ref()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn validity(&self) -> &Bitmap {
        &self.validity
    }

    /// Reserves capacity for `additional` more rows without changing `len`
    /// (spec §5: "Board exposes reserveSpace(n) and capacity() so ingesters
    /// can batch rows... before the Board is frozen").
    pub fn reserve(&mut self, additional: usize) {
        self.buffer.reserve(additional);
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn buffer(&self) -> &TypedBuffer {
        &self.buffer
    }

    pub fn is_valid(&self, row: usize) -> bool {
        self.validity.get(row)
    }

    /// Decodes row `row` into a [`Raw`] 64-bit carrier for numeric widening.
    /// Returns `None` for string-backed columns (`Text`; `Category` and the
    /// dictionary-backed `U32` form are numeric at the storage level and do
    /// decode).
    fn raw_at(&self, row: usize) -> Option<Raw> {
        match &self.buffer {
            TypedBuffer::I8(v) => Some(Raw::Signed(v[row] as i64)),
            TypedBuffer::I16(v) => Some(Raw::Signed(v[row] as i64)),
            TypedBuffer::I32(v) => Some(Raw::Signed(v[row] as i64)),
            TypedBuffer::I64(v) => Some(Raw::Signed(v[row])),
            TypedBuffer::U8(v) => Some(Raw::Unsigned(v[row] as u64)),
            TypedBuffer::U16(v) => Some(Raw::Unsigned(v[row] as u64)),
            TypedBuffer::U32(v) => Some(Raw::Unsigned(v[row] as u64)),
            TypedBuffer::U64(v) => Some(Raw::Unsigned(v[row])),
            TypedBuffer::F32(v) => Some(Raw::Float(v[row] as f64)),
            TypedBuffer::F64(v) => Some(Raw::Float(v[row])),
            TypedBuffer::Oid(_) | TypedBuffer::Str(_) => None,
        }
    }

    /// Public numeric accessor used by aggregation/ordering code that needs
    /// a single row's value as `f64` without going through a read-range
    /// call. Returns `None` for string-backed columns.
    pub fn value_as_f64(&self, row: usize) -> Option<f64> {
        self.as_f64_at(row)
    }

    fn as_f64_at(&self, row: usize) -> Option<f64> {
        self.raw_at(row).map(|r| match r {
            Raw::Signed(v) => v as f64,
            Raw::Unsigned(v) => v as f64,
            Raw::Float(v) => v,
        })
    }

    /// Canonical string form of row `row`, decoding `Category` through the
    /// dictionary and formatting everything else textually. Matches the
    /// rules `dump` uses, minus quoting.
    pub fn string_at(&self, row: usize) -> String {
        if !self.is_valid(row) {
            return "(no data in memory)".to_string();
        }
        match &self.buffer {
            TypedBuffer::Str(v) => v[row].clone(),
            TypedBuffer::U32(codes) if self.ty == ScalarType::Category => {
                let code = codes[row];
                self.dict
                    .as_ref()
                    .and_then(|d| d.str_of(code))
                    .unwrap_or("")
                    .to_string()
            }
            TypedBuffer::Oid(v) => {
                let (hi, lo) = v[row];
                format!("{hi:016x}{lo:016x}")
            }
            TypedBuffer::F32(v) => format_float(v[row] as f64, 7),
            TypedBuffer::F64(v) => format_float(v[row], 15),
            _ => self
                .raw_at(row)
                .map(|r| match r {
                    Raw::Signed(v) => v.to_string(),
                    Raw::Unsigned(v) => v.to_string(),
                    Raw::Float(v) => format_float(v, 15),
                })
                .unwrap_or_default(),
        }
    }

    // ---- Typed read-range (spec §4.1) ----

    fn read_range_numeric<T>(
        &self,
        begin: usize,
        end: usize,
        dst: ScalarType,
        sentinel: T,
        convert: impl Fn(Raw) -> T,
    ) -> Result<Vec<T>, ReadError>
    where
        T: Copy,
    {
        if !can_widen(self.ty, dst) || self.ty == ScalarType::Text {
            return Err(ReadError::TypeMismatch);
        }
        let mut out = Vec::with_capacity(end.saturating_sub(begin));
        for row in begin..end.min(self.len()) {
            if !self.is_valid(row) {
                out.push(sentinel);
                continue;
            }
            match self.raw_at(row) {
                Some(raw) => out.push(convert(raw)),
                None => return Err(ReadError::MissingBuffer),
            }
        }
        Ok(out)
    }

    pub fn get_column_as_i8(&self, begin: usize, end: usize) -> Result<Vec<i8>, ReadError> {
        self.read_range_numeric(begin, end, ScalarType::I8, I8_NULL, raw_to_i8)
    }
    pub fn get_column_as_i16(&self, begin: usize, end: usize) -> Result<Vec<i16>, ReadError> {
        self.read_range_numeric(begin, end, ScalarType::I16, I16_NULL, raw_to_i16)
    }
    pub fn get_column_as_i32(&self, begin: usize, end: usize) -> Result<Vec<i32>, ReadError> {
        self.read_range_numeric(begin, end, ScalarType::I32, I32_NULL, raw_to_i32)
    }
    pub fn get_column_as_i64(&self, begin: usize, end: usize) -> Result<Vec<i64>, ReadError> {
        self.read_range_numeric(begin, end, ScalarType::I64, I64_NULL, raw_to_i64)
    }
    pub fn get_column_as_u8(&self, begin: usize, end: usize) -> Result<Vec<u8>, ReadError> {
        self.read_range_numeric(begin, end, ScalarType::U8, U8_NULL, raw_to_u8)
    }
    pub fn get_column_as_u16(&self, begin: usize, end: usize) -> Result<Vec<u16>, ReadError> {
        self.read_range_numeric(begin, end, ScalarType::U16, U16_NULL, raw_to_u16)
    }
    pub fn get_column_as_u32(&self, begin: usize, end: usize) -> Result<Vec<u32>, ReadError> {
        self.read_range_numeric(begin, end, ScalarType::U32, U32_NULL, raw_to_u32)
    }
    pub fn get_column_as_u64(&self, begin: usize, end: usize) -> Result<Vec<u64>, ReadError> {
        self.read_range_numeric(begin, end, ScalarType::U64, U64_NULL, raw_to_u64)
    }
    pub fn get_column_as_f32(&self, begin: usize, end: usize) -> Result<Vec<f32>, ReadError> {
        self.read_range_numeric(begin, end, ScalarType::F32, F32_NULL, raw_to_f32)
    }
    pub fn get_column_as_f64(&self, begin: usize, end: usize) -> Result<Vec<f64>, ReadError> {
        self.read_range_numeric(begin, end, ScalarType::F64, F64_NULL, raw_to_f64)
    }

    /// Universal: every column type can stringify (spec §4.1).
    pub fn get_column_as_strings(&self, begin: usize, end: usize) -> Vec<String> {
        (begin..end.min(self.len())).map(|r| self.string_at(r)).collect()
    }

    // ---- select-by-mask (spec §4.1) ----

    pub fn select_as_f64(&self, mask: &Bitmap) -> Result<Vec<f64>, ReadError> {
        if self.ty == ScalarType::Text || self.ty == ScalarType::Oid {
            return Err(ReadError::TypeMismatch);
        }
        Ok(mask
            .iter_ones()
            .map(|row| {
                if self.is_valid(row) {
                    self.as_f64_at(row).unwrap_or(F64_NULL)
                } else {
                    F64_NULL
                }
            })
            .collect())
    }

    pub fn select_as_i64(&self, mask: &Bitmap) -> Result<Vec<i64>, ReadError> {
        if !can_widen(self.ty, ScalarType::I64) {
            return Err(ReadError::TypeMismatch);
        }
        Ok(mask
            .iter_ones()
            .map(|row| {
                if !self.is_valid(row) {
                    I64_NULL
                } else {
                    self.raw_at(row).map(raw_to_i64).unwrap_or(I64_NULL)
                }
            })
            .collect())
    }

    /// Universal select: strings for every column type.
    pub fn select_strings(&self, mask: &Bitmap) -> Vec<String> {
        mask.iter_ones().map(|row| self.string_at(row)).collect()
    }

    /// Returns a new `Column` containing only the masked rows, in row
    /// order — the form the Projector uses for a plain variable reference
    /// (shallow-copies the underlying buffer via `TypedBuffer::select`,
    /// which allocates a fresh dense buffer so the result is independent of
    /// `self`).
    pub fn filtered(&self, mask: &Bitmap) -> Column {
        let positions: Vec<usize> = mask.iter_ones().collect();
        let buffer = self.buffer.select(&positions);
        let validity = Bitmap::from_bools(
            &positions.iter().map(|&r| self.is_valid(r)).collect::<Vec<_>>(),
        );
        Column {
            name: self.name.clone(),
            description: self.description.clone(),
            ty: self.ty,
            dict: self.dict.clone(),
            validity,
            buffer,
        }
    }

    // ---- min/max (spec §4.1) ----

    pub fn min(&self) -> Option<ExtremeValue> {
        self.extreme(true)
    }

    pub fn max(&self) -> Option<ExtremeValue> {
        self.extreme(false)
    }

    fn extreme(&self, want_min: bool) -> Option<ExtremeValue> {
        if self.ty.is_string() {
            return (0..self.len())
                .filter(|&r| self.is_valid(r))
                .map(|r| self.string_at(r))
                .fold(None, |acc: Option<String>, s| match acc {
                    None => Some(s),
                    Some(cur) => {
                        let keep = if want_min { s < cur } else { s > cur };
                        Some(if keep { s } else { cur })
                    }
                })
                .map(ExtremeValue::Str);
        }
        if self.ty.is_float() {
            let val = (0..self.len())
                .filter(|&r| self.is_valid(r))
                .filter_map(|r| self.as_f64_at(r))
                .fold(None, |acc: Option<f64>, v| match acc {
                    None => Some(v),
                    Some(cur) => Some(if want_min { v.min(cur) } else { v.max(cur) }),
                });
            return val.map(ExtremeValue::Float);
        }
        if self.ty.is_signed() {
            let val = (0..self.len())
                .filter(|&r| self.is_valid(r))
                .filter_map(|r| self.raw_at(r))
                .map(raw_to_i64)
                .fold(None, |acc: Option<i64>, v| match acc {
                    None => Some(v),
                    Some(cur) => Some(if want_min { v.min(cur) } else { v.max(cur) }),
                });
            return val.map(ExtremeValue::Signed);
        }
        // Unsigned (includes Category codes, though min/max over codes is
        // rarely meaningful; callers decode through the dictionary first).
        let val = (0..self.len())
            .filter(|&r| self.is_valid(r))
            .filter_map(|r| self.raw_at(r))
            .map(raw_to_u64)
            .fold(None, |acc: Option<u64>, v| match acc {
                None => Some(v),
                Some(cur) => Some(if want_min { v.min(cur) } else { v.max(cur) }),
            });
        val.map(ExtremeValue::Unsigned)
    }

    // ---- scan (spec §4.3/§4.1) ----

    /// Range-predicate scan: `op column value`, intersected with `input`.
    /// The input mask is first intersected with the column's own validity.
    pub fn scan_compare(&self, op: CompareOp, value: &Literal, input: &Bitmap) -> Bitmap {
        let candidates = input.and(&self.validity);
        if op == CompareOp::NotNull {
            return input.and(&self.validity);
        }
        let mut out = Bitmap::new_clear(self.len());
        if self.ty.is_string() {
            let Some(target) = value.as_str() else {
                return out;
            };
            for row in candidates.iter_ones() {
                let ord = self.string_at(row).as_str().cmp(target);
                if op.apply_ord(ord) {
                    out.set(row, true);
                }
            }
        } else {
            let Some(target) = value.as_f64() else {
                return out;
            };
            for row in candidates.iter_ones() {
                if let Some(v) = self.as_f64_at(row)
                    && op.apply_f64(v, target)
                {
                    out.set(row, true);
                }
            }
        }
        out
    }

    /// `DiscreteRange`: numeric IN list.
    pub fn scan_discrete(&self, values: &[f64], input: &Bitmap) -> Bitmap {
        let candidates = input.and(&self.validity);
        let mut out = Bitmap::new_clear(self.len());
        for row in candidates.iter_ones() {
            if let Some(v) = self.as_f64_at(row)
                && values.iter().any(|&target| target == v)
            {
                out.set(row, true);
            }
        }
        out
    }

    // ---- string search (spec §4.1) ----

    /// `AnyString`: exact match against any of `values`.
    pub fn scan_any_string(&self, values: &[String], input: &Bitmap) -> Bitmap {
        let candidates = input.and(&self.validity);
        let mut out = Bitmap::new_clear(self.len());
        if self.ty == ScalarType::Category {
            let codes: Vec<u32> = values
                .iter()
                .filter_map(|v| self.dict.as_ref().and_then(|d| d.code_of(v)))
                .collect();
            if let TypedBuffer::U32(buf) = &self.buffer {
                for row in candidates.iter_ones() {
                    if codes.contains(&buf[row]) {
                        out.set(row, true);
                    }
                }
            }
            return out;
        }
        for row in candidates.iter_ones() {
            let s = self.string_at(row);
            if values.iter().any(|v| v == &s) {
                out.set(row, true);
            }
        }
        out
    }

    /// `Like`: simple glob with `%` (any run) and `_` (single char).
    pub fn scan_like(&self, pattern: &str, input: &Bitmap) -> Bitmap {
        let candidates = input.and(&self.validity);
        let mut out = Bitmap::new_clear(self.len());
        for row in candidates.iter_ones() {
            if glob_match(pattern, &self.string_at(row)) {
                out.set(row, true);
            }
        }
        out
    }

    /// `Keyword`: single full-text token match (case-insensitive, tokenized
    /// on non-alphanumeric boundaries).
    pub fn scan_keyword(&self, token: &str, input: &Bitmap) -> Bitmap {
        let needle = token.to_lowercase();
        let candidates = input.and(&self.validity);
        let mut out = Bitmap::new_clear(self.len());
        for row in candidates.iter_ones() {
            if tokenize(&self.string_at(row)).contains(&needle) {
                out.set(row, true);
            }
        }
        out
    }

    /// `AllWords`: conjunction of keyword matches.
    pub fn scan_all_words(&self, tokens: &[String], input: &Bitmap) -> Bitmap {
        let needles: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();
        let candidates = input.and(&self.validity);
        let mut out = Bitmap::new_clear(self.len());
        for row in candidates.iter_ones() {
            let present = tokenize(&self.string_at(row));
            if needles.iter().all(|n| present.contains(n)) {
                out.set(row, true);
            }
        }
        out
    }

    // ---- append (spec §4.1) ----

    /// Widening append from another column, restricted to `mask`'s set
    /// rows, in row order. Fails if `other`'s type cannot widen to `self`'s.
    pub fn append_from(&mut self, other: &Column, mask: &Bitmap) -> Result<usize, ReadError> {
        if !can_widen(other.ty, self.ty) {
            return Err(ReadError::TypeMismatch);
        }
        let rows: Vec<usize> = mask.iter_ones().collect();
        let n = rows.len();
        self.buffer.make_unique();
        for &row in &rows {
            self.push_value(other, row)?;
        }
        let mut new_validity_bits: Vec<bool> = (0..self.validity.len()).map(|i| self.validity.get(i)).collect();
        new_validity_bits.extend(rows.iter().map(|&r| other.is_valid(r)));
        self.validity = Bitmap::from_bools(&new_validity_bits);
        Ok(n)
    }

    fn push_value(&mut self, other: &Column, row: usize) -> Result<(), ReadError> {
        macro_rules! push_numeric {
            ($variant:ident, $conv:ident, $sentinel:expr) => {{
                if let TypedBuffer::$variant(v) = &mut self.buffer {
                    let value = if other.is_valid(row) {
                        other.raw_at(row).map($conv).unwrap_or($sentinel)
                    } else {
                        $sentinel
                    };
                    std::sync::Arc::get_mut(v).expect("just uniquified").push(value);
                    return Ok(());
                }
            }};
        }
        push_numeric!(I8, raw_to_i8, I8_NULL);
        push_numeric!(I16, raw_to_i16, I16_NULL);
        push_numeric!(I32, raw_to_i32, I32_NULL);
        push_numeric!(I64, raw_to_i64, I64_NULL);
        push_numeric!(U8, raw_to_u8, U8_NULL);
        push_numeric!(U16, raw_to_u16, U16_NULL);
        push_numeric!(U32, raw_to_u32, U32_NULL);
        push_numeric!(U64, raw_to_u64, U64_NULL);
        push_numeric!(F32, raw_to_f32, F32_NULL);
        push_numeric!(F64, raw_to_f64, F64_NULL);
        match &mut self.buffer {
            TypedBuffer::Str(v) => {
                let s = other.string_at(row);
                std::sync::Arc::get_mut(v).expect("just uniquified").push(s);
                Ok(())
            }
            TypedBuffer::Oid(v) => {
                let value = if other.is_valid(row) {
                    match &other.buffer {
                        TypedBuffer::Oid(ov) => ov[row],
                        _ => return Err(ReadError::TypeMismatch),
                    }
                } else {
                    (u64::MAX, u64::MAX)
                };
                std::sync::Arc::get_mut(v).expect("just uniquified").push(value);
                Ok(())
            }
            _ => Err(ReadError::TypeMismatch),
        }
    }

    /// Appends raw values from a literal typed buffer, respecting `valid`.
    pub fn append_literal(&mut self, values: &TypedBuffer, valid: &Bitmap) -> Result<usize, ReadError> {
        if values.len() != valid.len() {
            return Err(ReadError::TypeMismatch);
        }
        self.buffer.make_unique();
        let n = values.len();
        match (&mut self.buffer, values) {
            (TypedBuffer::I8(v), TypedBuffer::I8(s)) => std::sync::Arc::get_mut(v).unwrap().extend_from_slice(s),
            (TypedBuffer::I16(v), TypedBuffer::I16(s)) => std::sync::Arc::get_mut(v).unwrap().extend_from_slice(s),
            (TypedBuffer::I32(v), TypedBuffer::I32(s)) => std::sync::Arc::get_mut(v).unwrap().extend_from_slice(s),
            (TypedBuffer::I64(v), TypedBuffer::I64(s)) => std::sync::Arc::get_mut(v).unwrap().extend_from_slice(s),
            (TypedBuffer::U8(v), TypedBuffer::U8(s)) => std::sync::Arc::get_mut(v).unwrap().extend_from_slice(s),
            (TypedBuffer::U16(v), TypedBuffer::U16(s)) => std::sync::Arc::get_mut(v).unwrap().extend_from_slice(s),
            (TypedBuffer::U32(v), TypedBuffer::U32(s)) => std::sync::Arc::get_mut(v).unwrap().extend_from_slice(s),
            (TypedBuffer::U64(v), TypedBuffer::U64(s)) => std::sync::Arc::get_mut(v).unwrap().extend_from_slice(s),
            (TypedBuffer::F32(v), TypedBuffer::F32(s)) => std::sync::Arc::get_mut(v).unwrap().extend_from_slice(s),
            (TypedBuffer::F64(v), TypedBuffer::F64(s)) => std::sync::Arc::get_mut(v).unwrap().extend_from_slice(s),
            (TypedBuffer::Oid(v), TypedBuffer::Oid(s)) => std::sync::Arc::get_mut(v).unwrap().extend_from_slice(s),
            (TypedBuffer::Str(v), TypedBuffer::Str(s)) => {
                std::sync::Arc::get_mut(v).unwrap().extend_from_slice(s)
            }
            _ => return Err(ReadError::TypeMismatch),
        }
        let mut bits: Vec<bool> = (0..self.validity.len()).map(|i| self.validity.get(i)).collect();
        bits.extend((0..valid.len()).map(|i| valid.get(i)));
        self.validity = Bitmap::from_bools(&bits);
        Ok(n)
    }

    // ---- reverseRows / limit (spec §4.1) ----

    pub fn reverse_rows(&mut self) {
        self.buffer.reverse();
        let bits: Vec<bool> = (0..self.validity.len()).rev().map(|i| self.validity.get(i)).collect();
        self.validity = Bitmap::from_bools(&bits);
    }

    pub fn limit(&mut self, n: usize) {
        if n >= self.len() {
            return;
        }
        self.buffer.truncate(n);
        let bits: Vec<bool> = (0..n).map(|i| self.validity.get(i)).collect();
        self.validity = Bitmap::from_bools(&bits);
    }

    /// Reorders rows according to `permutation` (same convention as
    /// `TypedBuffer::permute`: `result[i] = self[permutation[i]]`).
    pub fn permute(&self, permutation: &[usize]) -> Column {
        let buffer = self.buffer.select(permutation);
        let bits: Vec<bool> = permutation.iter().map(|&i| self.validity.get(i)).collect();
        Column {
            name: self.name.clone(),
            description: self.description.clone(),
            ty: self.ty,
            dict: self.dict.clone(),
            validity: Bitmap::from_bools(&bits),
            buffer,
        }
    }

    // ---- dump (spec §4.1) ----

    /// A shallow copy under a new name (GroupBy's "rename in place" path,
    /// spec §4.5 groupbyC).
    pub fn renamed(&self, new_name: impl Into<SmolStr>) -> Column {
        let mut c = self.clone();
        c.name = new_name.into();
        c
    }

    /// Orders row `i` against row `j` within the same column — the
    /// primitive the segmented sort in `ordering.rs` drives. Invalid rows
    /// sort after all valid rows (nulls last).
    pub fn cmp_rows(&self, i: usize, j: usize) -> std::cmp::Ordering {
        use std::cmp::Ordering::*;
        match (self.is_valid(i), self.is_valid(j)) {
            (false, false) => Equal,
            (false, true) => Greater,
            (true, false) => Less,
            (true, true) => {
                if self.ty.is_string() {
                    self.string_at(i).cmp(&self.string_at(j))
                } else {
                    let a = self.as_f64_at(i).unwrap_or(f64::NAN);
                    let b = self.as_f64_at(j).unwrap_or(f64::NAN);
                    a.partial_cmp(&b).unwrap_or(Equal)
                }
            }
        }
    }

    /// Value equality between row `i` of `self` and row `j` of `other`,
    /// used by the Merger's key-match test (spec §4.6). Both columns are
    /// assumed to share a type.
    pub fn rows_equal(&self, i: usize, other: &Column, j: usize) -> bool {
        match (self.is_valid(i), other.is_valid(j)) {
            (false, false) => true,
            (false, true) | (true, false) => false,
            (true, true) => {
                if self.ty.is_string() {
                    self.string_at(i) == other.string_at(j)
                } else {
                    self.as_f64_at(i) == other.as_f64_at(j)
                }
            }
        }
    }

    /// Value ordering of row `i` of `self` against row `j` of `other`.
    pub fn rows_cmp(&self, i: usize, other: &Column, j: usize) -> std::cmp::Ordering {
        use std::cmp::Ordering::*;
        match (self.is_valid(i), other.is_valid(j)) {
            (false, false) => Equal,
            (false, true) => Greater,
            (true, false) => Less,
            (true, true) => {
                if self.ty.is_string() {
                    self.string_at(i).cmp(&other.string_at(j))
                } else {
                    let a = self.as_f64_at(i).unwrap_or(f64::NAN);
                    let b = other.as_f64_at(j).unwrap_or(f64::NAN);
                    a.partial_cmp(&b).unwrap_or(Equal)
                }
            }
        }
    }

    pub fn dump(&self, writer: &mut dyn Write, row: usize) -> io::Result<()> {
        if !self.is_valid(row) {
            return write!(writer, "(no data in memory)");
        }
        match self.ty {
            ScalarType::Text | ScalarType::Category => {
                write!(writer, "\"{}\"", self.string_at(row))
            }
            _ => write!(writer, "{}", self.string_at(row)),
        }
    }
}

/// Formats `v` to `sig_digits` significant digits (7 for `F32`, 15 for
/// `F64`, spec §4.1 dump contract), trimming trailing fractional zeros the
/// way `%g`-style formatting does.
fn format_float(v: f64, sig_digits: usize) -> String {
    if v.is_nan() {
        return "(no data in memory)".to_string();
    }
    if !v.is_finite() || v == 0.0 {
        return format!("{v}");
    }
    let magnitude = v.abs().log10().floor() as i32;
    let decimals = (sig_digits as i32 - 1 - magnitude).max(0) as usize;
    let formatted = format!("{:.*}", decimals, v);
    if formatted.contains('.') {
        let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
        if trimmed.is_empty() || trimmed == "-" {
            "0".to_string()
        } else {
            trimmed.to_string()
        }
    } else {
        formatted
    }
}

fn tokenize(s: &str) -> Vec<String> {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// Minimal glob matcher: `%` matches any run (including empty), `_`
/// matches exactly one character. Case-sensitive (callers lowercase both
/// sides first if case-insensitive LIKE is desired).
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    glob_match_rec(&p, &t)
}

fn glob_match_rec(p: &[char], t: &[char]) -> bool {
    match p.first() {
        None => t.is_empty(),
        Some('%') => {
            glob_match_rec(&p[1..], t) || (!t.is_empty() && glob_match_rec(p, &t[1..]))
        }
        Some('_') => !t.is_empty() && glob_match_rec(&p[1..], &t[1..]),
        Some(&c) => !t.is_empty() && t[0] == c && glob_match_rec(&p[1..], &t[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn int_col(name: &str, values: Vec<i32>) -> Column {
        let len = values.len();
        Column::from_parts(
            name,
            ScalarType::I32,
            "",
            TypedBuffer::I32(Arc::new(values)),
            Bitmap::new_set(len),
            None,
        )
        .unwrap()
    }

    #[test]
    fn widening_read_i32_as_i64() {
        let col = int_col("id", vec![1, 2, 3]);
        let out = col.get_column_as_i64(0, 3).unwrap();
        assert_eq!(out, vec![1, 2, 3]);
    }

    #[test]
    fn narrowing_read_rejected() {
        let col = Column::from_parts(
            "v",
            ScalarType::I64,
            "",
            TypedBuffer::I64(Arc::new(vec![1, 2])),
            Bitmap::new_set(2),
            None,
        )
        .unwrap();
        assert_eq!(col.get_column_as_i32(0, 2), Err(ReadError::TypeMismatch));
    }

    #[test]
    fn null_rows_widen_to_sentinel() {
        let mut validity = Bitmap::new_set(3);
        validity.set(1, false);
        let col = Column::from_parts(
            "v",
            ScalarType::I32,
            "",
            TypedBuffer::I32(Arc::new(vec![1, 2, 3])),
            validity,
            None,
        )
        .unwrap();
        let out = col.get_column_as_i64(0, 3).unwrap();
        assert_eq!(out, vec![1, I64_NULL, 3]);
    }

    #[test]
    fn min_max_respect_validity() {
        let mut validity = Bitmap::new_set(4);
        validity.set(0, false); // hide the true minimum
        let col = Column::from_parts(
            "v",
            ScalarType::I32,
            "",
            TypedBuffer::I32(Arc::new(vec![-100, 5, 2, 9])),
            validity,
            None,
        )
        .unwrap();
        assert_eq!(col.min(), Some(ExtremeValue::Signed(2)));
        assert_eq!(col.max(), Some(ExtremeValue::Signed(9)));
    }

    #[test]
    fn scan_compare_intersects_validity() {
        let mut validity = Bitmap::new_set(3);
        validity.set(2, false);
        let col = Column::from_parts(
            "v",
            ScalarType::I32,
            "",
            TypedBuffer::I32(Arc::new(vec![1, 5, 9])),
            validity,
            None,
        )
        .unwrap();
        let mask = col.scan_compare(CompareOp::Ge, &Literal::Num(1.0), &Bitmap::new_set(3));
        assert_eq!(mask.iter_ones().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn glob_like_matches() {
        assert!(glob_match("a%c", "abc"));
        assert!(glob_match("a_c", "abc"));
        assert!(!glob_match("a_c", "abbc"));
        assert!(glob_match("%", "anything"));
    }

    #[test]
    fn category_round_trips_through_dictionary() {
        let mut dict = Dictionary::new();
        let ca = dict.intern("a");
        let cb = dict.intern("b");
        let col = Column::from_parts(
            "k",
            ScalarType::Category,
            "",
            TypedBuffer::U32(Arc::new(vec![ca, cb, ca])),
            Bitmap::new_set(3),
            Some(dict),
        )
        .unwrap();
        assert_eq!(col.string_at(0), "a");
        assert_eq!(col.string_at(1), "b");
        let out = col.get_column_as_strings(0, 3);
        assert_eq!(out, vec!["a", "b", "a"]);
    }

    #[test]
    fn reverse_rows_reverses_buffer_and_validity() {
        let mut col = int_col("v", vec![1, 2, 3]);
        col.reverse_rows();
        assert_eq!(col.get_column_as_i32(0, 3).unwrap(), vec![3, 2, 1]);
    }

    #[test]
    fn limit_truncates() {
        let mut col = int_col("v", vec![1, 2, 3, 4]);
        col.limit(2);
        assert_eq!(col.len(), 2);
        assert_eq!(col.get_column_as_i32(0, 2).unwrap(), vec![1, 2]);
    }

    #[test]
    fn limit_noop_when_n_exceeds_len() {
        let mut col = int_col("v", vec![1, 2]);
        col.limit(10);
        assert_eq!(col.len(), 2);
    }
}
