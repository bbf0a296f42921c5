//! `TypedBuffer`: a type-tagged contiguous buffer with copy-on-write
//! semantics (spec §2, design note "unsafe casts over a type-erased
//! pointer").
//!
//! Rather than a `void*` plus a runtime type tag, `TypedBuffer` is a sum
//! type over the scalar storage kinds: one `Arc<Vec<T>>` variant per
//! physical representation, plus a string-vector variant for `Text`
//! columns. `Category` and dictionary-backed `u32` columns reuse the `U32`
//! variant — the logical/physical distinction lives one level up, on
//! `Column`.
//!
//! Buffers may be shared between `Column`s (a shallow `Arc` clone) until a
//! write occurs, at which point [`TypedBuffer::make_unique`] clones the
//! underlying vector so the write cannot be observed by other holders.

use crate::types::ScalarType;
use std::sync::Arc;

/// Dispatches a macro invocation over every scalar (non-string) variant of
/// `TypedBuffer`, binding the variant constructor to `$ctor` and the
/// element type to `$ty`. Used to avoid writing the same match arm twelve
/// times for length/capacity/reserve/etc.
macro_rules! for_each_numeric_variant {
    ($macro_name:ident) => {
        $macro_name!(I8, i8);
        $macro_name!(I16, i16);
        $macro_name!(I32, i32);
        $macro_name!(I64, i64);
        $macro_name!(U8, u8);
        $macro_name!(U16, u16);
        $macro_name!(U32, u32);
        $macro_name!(U64, u64);
        $macro_name!(F32, f32);
        $macro_name!(F64, f64);
    };
}

#[derive(Debug, Clone)]
pub enum TypedBuffer {
    I8(Arc<Vec<i8>>),
    I16(Arc<Vec<i16>>),
    I32(Arc<Vec<i32>>),
    I64(Arc<Vec<i64>>),
    U8(Arc<Vec<u8>>),
    U16(Arc<Vec<u16>>),
    U32(Arc<Vec<u32>>),
    U64(Arc<Vec<u64>>),
    F32(Arc<Vec<f32>>),
    F64(Arc<Vec<f64>>),
    /// 128-bit opaque record ids, stored as (hi, lo) `u64` halves.
    Oid(Arc<Vec<(u64, u64)>>),
    /// Variable-length strings, used by `Text` columns.
    Str(Arc<Vec<String>>),
}

impl TypedBuffer {
    pub fn new(ty: ScalarType) -> Self {
        match ty {
            ScalarType::I8 => TypedBuffer::I8(Arc::new(Vec::new())),
            ScalarType::I16 => TypedBuffer::I16(Arc::new(Vec::new())),
            ScalarType::I32 => TypedBuffer::I32(Arc::new(Vec::new())),
            ScalarType::I64 => TypedBuffer::I64(Arc::new(Vec::new())),
            ScalarType::U8 => TypedBuffer::U8(Arc::new(Vec::new())),
            ScalarType::U16 => TypedBuffer::U16(Arc::new(Vec::new())),
            ScalarType::U32 | ScalarType::Category => TypedBuffer::U32(Arc::new(Vec::new())),
            ScalarType::U64 => TypedBuffer::U64(Arc::new(Vec::new())),
            ScalarType::F32 => TypedBuffer::F32(Arc::new(Vec::new())),
            ScalarType::F64 => TypedBuffer::F64(Arc::new(Vec::new())),
            ScalarType::Oid => TypedBuffer::Oid(Arc::new(Vec::new())),
            ScalarType::Text => TypedBuffer::Str(Arc::new(Vec::new())),
            ScalarType::Unknown => TypedBuffer::Str(Arc::new(Vec::new())),
        }
    }

    pub fn len(&self) -> usize {
        macro_rules! arm {
            ($variant:ident, $t:ty) => {
                if let TypedBuffer::$variant(v) = self {
                    return v.len();
                }
            };
        }
        for_each_numeric_variant!(arm);
        match self {
            TypedBuffer::Oid(v) => v.len(),
            TypedBuffer::Str(v) => v.len(),
            _ => unreachable!(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        macro_rules! arm {
            ($variant:ident, $t:ty) => {
                if let TypedBuffer::$variant(v) = self {
                    return v.capacity();
                }
            };
        }
        for_each_numeric_variant!(arm);
        match self {
            TypedBuffer::Oid(v) => v.capacity(),
            TypedBuffer::Str(v) => v.capacity(),
            _ => unreachable!(),
        }
    }

    /// Ensures the backing vector is uniquely owned, cloning it first if
    /// another `Column` is sharing this buffer. Must be called by every
    /// mutating entry point before touching the vector in place.
    pub fn make_unique(&mut self) {
        macro_rules! arm {
            ($variant:ident, $t:ty) => {
                if let TypedBuffer::$variant(v) = self {
                    Arc::make_mut(v);
                    return;
                }
            };
        }
        for_each_numeric_variant!(arm);
        match self {
            TypedBuffer::Oid(v) => {
                Arc::make_mut(v);
            }
            TypedBuffer::Str(v) => {
                Arc::make_mut(v);
            }
        }
    }

    pub fn reserve(&mut self, additional: usize) {
        self.make_unique();
        macro_rules! arm {
            ($variant:ident, $t:ty) => {
                if let TypedBuffer::$variant(v) = self {
                    Arc::get_mut(v).expect("just uniquified").reserve(additional);
                    return;
                }
            };
        }
        for_each_numeric_variant!(arm);
        match self {
            TypedBuffer::Oid(v) => Arc::get_mut(v).expect("just uniquified").reserve(additional),
            TypedBuffer::Str(v) => Arc::get_mut(v).expect("just uniquified").reserve(additional),
        }
    }

    pub fn truncate(&mut self, len: usize) {
        self.make_unique();
        macro_rules! arm {
            ($variant:ident, $t:ty) => {
                if let TypedBuffer::$variant(v) = self {
                    Arc::get_mut(v).expect("just uniquified").truncate(len);
                    return;
                }
            };
        }
        for_each_numeric_variant!(arm);
        match self {
            TypedBuffer::Oid(v) => Arc::get_mut(v).expect("just uniquified").truncate(len),
            TypedBuffer::Str(v) => Arc::get_mut(v).expect("just uniquified").truncate(len),
        }
    }

    pub fn reverse(&mut self) {
        self.make_unique();
        macro_rules! arm {
            ($variant:ident, $t:ty) => {
                if let TypedBuffer::$variant(v) = self {
                    Arc::get_mut(v).expect("just uniquified").reverse();
                    return;
                }
            };
        }
        for_each_numeric_variant!(arm);
        match self {
            TypedBuffer::Oid(v) => Arc::get_mut(v).expect("just uniquified").reverse(),
            TypedBuffer::Str(v) => Arc::get_mut(v).expect("just uniquified").reverse(),
        }
    }

    /// Reorders the buffer's elements according to `permutation`:
    /// `result[i] = self[permutation[i]]`.
    pub fn permute(&self, permutation: &[usize]) -> TypedBuffer {
        macro_rules! arm {
            ($variant:ident, $t:ty) => {
                if let TypedBuffer::$variant(v) = self {
                    let out: Vec<$t> = permutation.iter().map(|&i| v[i]).collect();
                    return TypedBuffer::$variant(Arc::new(out));
                }
            };
        }
        for_each_numeric_variant!(arm);
        match self {
            TypedBuffer::Oid(v) => {
                let out: Vec<(u64, u64)> = permutation.iter().map(|&i| v[i]).collect();
                TypedBuffer::Oid(Arc::new(out))
            }
            TypedBuffer::Str(v) => {
                let out: Vec<String> = permutation.iter().map(|&i| v[i].clone()).collect();
                TypedBuffer::Str(Arc::new(out))
            }
        }
    }

    /// Dense select-by-mask: returns a new buffer containing only the
    /// elements at set bit positions, in row order.
    pub fn select(&self, positions: &[usize]) -> TypedBuffer {
        self.permute(positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_buffer_is_empty() {
        let buf = TypedBuffer::new(ScalarType::I32);
        assert!(buf.is_empty());
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn make_unique_detaches_clone() {
        let mut buf = TypedBuffer::I32(Arc::new(vec![1, 2, 3]));
        let mut clone = buf.clone();
        clone.make_unique();
        if let TypedBuffer::I32(v) = &mut clone {
            Arc::get_mut(v).unwrap().push(4);
        }
        assert_eq!(buf.len(), 3, "original must be unaffected by clone's write");
        assert_eq!(clone.len(), 4);
    }

    #[test]
    fn permute_reorders_values() {
        let buf = TypedBuffer::I32(Arc::new(vec![10, 20, 30]));
        let out = buf.permute(&[2, 0, 1]);
        if let TypedBuffer::I32(v) = out {
            assert_eq!(*v, vec![30, 10, 20]);
        } else {
            panic!("wrong variant");
        }
    }

    #[test]
    fn category_type_maps_to_u32_storage() {
        let buf = TypedBuffer::new(ScalarType::Category);
        assert!(matches!(buf, TypedBuffer::U32(_)));
    }
}
