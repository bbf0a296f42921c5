//! Scalar type system and widening-read compatibility rules.
//!
//! The engine recognises a closed set of logical column types (spec §3) plus
//! a transient `Unknown` placeholder used only during construction. `Oid` is
//! a 128-bit opaque identifier split into two `u64` halves.

use std::fmt;

/// A logical column type. Determines physical layout; there is no runtime
/// type coercion except at the widening boundaries in [`can_widen`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Text,
    /// Low-cardinality string, physically a `u32` dictionary code.
    Category,
    /// 128-bit opaque record id, stored as two `u64` halves.
    Oid,
    /// Placeholder used transiently while a column is being constructed.
    Unknown,
}

impl ScalarType {
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ScalarType::I8
                | ScalarType::I16
                | ScalarType::I32
                | ScalarType::I64
                | ScalarType::U8
                | ScalarType::U16
                | ScalarType::U32
                | ScalarType::U64
        )
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            ScalarType::I8 | ScalarType::I16 | ScalarType::I32 | ScalarType::I64
        )
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            ScalarType::U8 | ScalarType::U16 | ScalarType::U32 | ScalarType::U64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, ScalarType::F32 | ScalarType::F64)
    }

    pub fn is_string(self) -> bool {
        matches!(self, ScalarType::Text | ScalarType::Category)
    }

    /// Bit width of the physical storage for integer/float types. Strings,
    /// `Oid` and `Unknown` have no fixed width and return `None`.
    pub fn bit_width(self) -> Option<u32> {
        match self {
            ScalarType::I8 | ScalarType::U8 => Some(8),
            ScalarType::I16 | ScalarType::U16 => Some(16),
            ScalarType::I32 | ScalarType::U32 | ScalarType::F32 => Some(32),
            ScalarType::I64 | ScalarType::U64 | ScalarType::F64 => Some(64),
            ScalarType::Text | ScalarType::Category | ScalarType::Oid | ScalarType::Unknown => {
                None
            }
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScalarType::I8 => "int8",
            ScalarType::I16 => "int16",
            ScalarType::I32 => "int32",
            ScalarType::I64 => "int64",
            ScalarType::U8 => "uint8",
            ScalarType::U16 => "uint16",
            ScalarType::U32 => "uint32",
            ScalarType::U64 => "uint64",
            ScalarType::F32 => "float",
            ScalarType::F64 => "double",
            ScalarType::Text => "text",
            ScalarType::Category => "category",
            ScalarType::Oid => "oid",
            ScalarType::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Table 1: can a column of type `src` be requested (widening-read) as
/// type `dst`? No narrowing conversion is ever performed silently.
pub fn can_widen(src: ScalarType, dst: ScalarType) -> bool {
    use ScalarType::*;

    if dst == Text {
        // Strings are universally producible from any type via textual
        // formatting.
        return true;
    }

    if src == dst {
        return true;
    }

    match (src, dst) {
        // Any signed integer is requestable as any wider signed integer.
        (I8, I16 | I32 | I64) => true,
        (I16, I32 | I64) => true,
        (I32, I64) => true,

        // Same for unsigned.
        (U8, U16 | U32 | U64) => true,
        (U16, U32 | U64) => true,
        (U32, U64) => true,

        // An integer type can be requested as a larger-or-equal unsigned
        // type (values are reinterpreted losslessly bit-for-bit if they
        // don't fit; the caller is responsible for that).
        (I8, U16 | U32 | U64) => true,
        (I16, U32 | U64) => true,
        (I32, U64) => true,
        (U8, I16 | I32 | I64) => true,
        (U16, I32 | I64) => true,
        (U32, I64) => true,

        // Floats accept any integer narrower than their mantissa.
        (I8 | I16 | U8 | U16, F32) => true,
        (I8 | I16 | I32 | U8 | U16 | U32, F64) => true,

        // Doubles accept all integers up to 32-bit losslessly (restated
        // explicitly per spec, already covered by the arm above).
        (F32, F64) => true,

        _ => false,
    }
}
