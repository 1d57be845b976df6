//! Concrete run-time values and the zero-value factory.
//!
//! Pointers own their pointee outright: a non-nil pointer is a box holding
//! the referenced value, and writes through the pointer replace the owned
//! box content. This deliberately loses aliasing precision (two pointers
//! never share a pointee) in exchange for a model with no heap identity.

use serde::{Deserialize, Serialize};

use crate::ssa::{FuncId, Module, Type, TypeId};

/// Target ABI sizing. The word width is resolved once per run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub(crate) struct Sizing {
    pub word_bits: u32,
}

impl Default for Sizing {
    fn default() -> Self {
        Self { word_bits: 64 }
    }
}

/// Fixed-width two's-complement integer. `raw` always stays masked to
/// `bits`; signedness only affects division, comparison, shift-right and
/// printing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(crate) struct IntValue {
    pub signed: bool,
    pub bits: u32,
    pub raw: u64,
}

impl IntValue {
    pub(crate) fn new(signed: bool, bits: u32, raw: u64) -> Self {
        Self {
            signed,
            bits,
            raw: mask(raw, bits),
        }
    }

    pub(crate) fn from_i64(signed: bool, bits: u32, v: i64) -> Self {
        Self::new(signed, bits, v as u64)
    }

    pub(crate) fn as_u64(&self) -> u64 {
        self.raw
    }

    /// Sign-extends the stored pattern when the value is signed.
    pub(crate) fn as_i64(&self) -> i64 {
        if self.signed && self.bits < 64 {
            let shift = 64 - self.bits;
            ((self.raw << shift) as i64) >> shift
        } else {
            self.raw as i64
        }
    }

    pub(crate) fn is_zero(&self) -> bool {
        self.raw == 0
    }

    fn with(&self, raw: u64) -> Self {
        Self::new(self.signed, self.bits, raw)
    }

    pub(crate) fn wrapping_add(&self, rhs: &Self) -> Self {
        self.with(self.raw.wrapping_add(rhs.raw))
    }

    pub(crate) fn wrapping_sub(&self, rhs: &Self) -> Self {
        self.with(self.raw.wrapping_sub(rhs.raw))
    }

    pub(crate) fn wrapping_mul(&self, rhs: &Self) -> Self {
        self.with(self.raw.wrapping_mul(rhs.raw))
    }

    pub(crate) fn wrapping_neg(&self) -> Self {
        self.with(self.raw.wrapping_neg())
    }

    /// Division truncates toward zero; `None` on a zero divisor.
    pub(crate) fn div(&self, rhs: &Self) -> Option<Self> {
        if rhs.is_zero() {
            return None;
        }
        let raw = if self.signed {
            self.as_i64().wrapping_div(rhs.as_i64()) as u64
        } else {
            self.raw / rhs.raw
        };
        Some(self.with(raw))
    }

    pub(crate) fn rem(&self, rhs: &Self) -> Option<Self> {
        if rhs.is_zero() {
            return None;
        }
        let raw = if self.signed {
            self.as_i64().wrapping_rem(rhs.as_i64()) as u64
        } else {
            self.raw % rhs.raw
        };
        Some(self.with(raw))
    }

    pub(crate) fn bit_and(&self, rhs: &Self) -> Self {
        self.with(self.raw & rhs.raw)
    }

    pub(crate) fn bit_or(&self, rhs: &Self) -> Self {
        self.with(self.raw | rhs.raw)
    }

    pub(crate) fn bit_xor(&self, rhs: &Self) -> Self {
        self.with(self.raw ^ rhs.raw)
    }

    /// Shifts past the width produce 0 (or the sign fill for `shr` on
    /// signed values), matching the target language semantics.
    pub(crate) fn shl(&self, amount: u64) -> Self {
        if amount >= self.bits as u64 {
            self.with(0)
        } else {
            self.with(self.raw << amount)
        }
    }

    pub(crate) fn shr(&self, amount: u64) -> Self {
        if self.signed {
            let v = self.as_i64();
            let amount = amount.min(63) as u32;
            self.with((v >> amount) as u64)
        } else if amount >= self.bits as u64 {
            self.with(0)
        } else {
            self.with(self.raw >> amount)
        }
    }

    pub(crate) fn lt(&self, rhs: &Self) -> bool {
        if self.signed {
            self.as_i64() < rhs.as_i64()
        } else {
            self.raw < rhs.raw
        }
    }

    pub(crate) fn le(&self, rhs: &Self) -> bool {
        if self.signed {
            self.as_i64() <= rhs.as_i64()
        } else {
            self.raw <= rhs.raw
        }
    }
}

fn mask(raw: u64, bits: u32) -> u64 {
    if bits >= 64 {
        raw
    } else {
        raw & ((1u64 << bits) - 1)
    }
}

/// The run-time carrier: a tagged sum mirroring [`Type`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum ConcreteValue {
    Bool(bool),
    Int(IntValue),
    Float32(f32),
    Float64(f64),
    Str(String),
    /// `None` is the nil pointer; `Some` owns the pointee.
    Pointer(Option<Box<ConcreteValue>>),
    Struct(Vec<ConcreteValue>),
    Tuple(Vec<ConcreteValue>),
    Array(Vec<ConcreteValue>),
    Slice(Option<Vec<ConcreteValue>>),
    Func(Option<FuncId>),
    Chan,
    Map,
    UnsafePointer,
}

impl ConcreteValue {
    pub(crate) fn as_bool(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            other => panic!("as_bool on {other:?}"),
        }
    }

    pub(crate) fn as_int(&self) -> &IntValue {
        match self {
            Self::Int(v) => v,
            other => panic!("as_int on {other:?}"),
        }
    }

    pub(crate) fn as_str(&self) -> &str {
        match self {
            Self::Str(s) => s,
            other => panic!("as_str on {other:?}"),
        }
    }

    /// Whether the value structurally inhabits `ty`. Used by the type
    /// assertions in driver functions.
    pub(crate) fn has_type(&self, ty: TypeId, module: &Module, sizing: &Sizing) -> bool {
        match (self, module.resolve(ty).1) {
            (Self::Bool(_), Type::Bool) => true,
            (Self::Int(v), Type::Int { signed, width }) => {
                v.signed == *signed && v.bits == width.bits(sizing.word_bits)
            }
            (Self::Float32(_), Type::Float { width: 32 }) => true,
            (Self::Float64(_), Type::Float { width: 64 }) => true,
            (Self::Str(_), Type::Str) => true,
            (Self::Pointer(None), Type::Pointer(_)) => true,
            (Self::Pointer(Some(p)), Type::Pointer(elem)) => p.has_type(*elem, module, sizing),
            (Self::Struct(vs), Type::Struct { fields, .. }) => {
                vs.len() == fields.len()
                    && vs
                        .iter()
                        .zip(fields)
                        .all(|(v, f)| v.has_type(f.ty, module, sizing))
            }
            (Self::Tuple(vs), Type::Tuple(parts)) => {
                vs.len() == parts.len()
                    && vs
                        .iter()
                        .zip(parts)
                        .all(|(v, t)| v.has_type(*t, module, sizing))
            }
            (Self::Array(vs), Type::Array(n, elem)) => {
                vs.len() as u64 == *n && vs.iter().all(|v| v.has_type(*elem, module, sizing))
            }
            (Self::Slice(_), Type::Slice(_)) => true,
            (Self::Func(_), Type::Func) => true,
            (Self::Chan, Type::Chan(_)) => true,
            (Self::Map, Type::Map(..)) => true,
            (Self::UnsafePointer, Type::UnsafePointer) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ConcreteValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(v) => {
                if v.signed {
                    write!(f, "{}", v.as_i64())
                } else {
                    write!(f, "{}", v.as_u64())
                }
            }
            Self::Float32(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Str(s) => write!(f, "{s}"),
            Self::Pointer(None) => write!(f, "<nil>"),
            Self::Pointer(Some(p)) => write!(f, "&{p}"),
            Self::Struct(vs) | Self::Tuple(vs) | Self::Array(vs) => {
                write!(f, "{{")?;
                for (i, v) in vs.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "}}")
            }
            Self::Slice(None) | Self::Func(None) | Self::Chan | Self::Map | Self::UnsafePointer => {
                write!(f, "<nil>")
            }
            Self::Slice(Some(vs)) => {
                write!(f, "[")?;
                for (i, v) in vs.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Self::Func(Some(id)) => write!(f, "func#{}", id.0),
        }
    }
}

/// Recursive zero value. Total on supported types; `UntypedNil` and bare
/// interfaces have no zero inhabitant and are a host bug if reached.
pub(crate) fn zero(ty: TypeId, module: &Module, sizing: &Sizing) -> ConcreteValue {
    match module.resolve(ty).1 {
        Type::Bool => ConcreteValue::Bool(false),
        Type::Int { signed, width } => {
            ConcreteValue::Int(IntValue::new(*signed, width.bits(sizing.word_bits), 0))
        }
        Type::Float { width: 32 } => ConcreteValue::Float32(0.0),
        Type::Float { width: _ } => ConcreteValue::Float64(0.0),
        Type::Str => ConcreteValue::Str(String::new()),
        Type::Pointer(_) => ConcreteValue::Pointer(None),
        Type::Array(n, elem) => {
            ConcreteValue::Array(vec![zero(*elem, module, sizing); *n as usize])
        }
        Type::Slice(_) => ConcreteValue::Slice(None),
        Type::Struct { fields, .. } => ConcreteValue::Struct(
            fields
                .iter()
                .map(|f| zero(f.ty, module, sizing))
                .collect(),
        ),
        Type::Named { .. } => unreachable!("resolve chases named types"),
        Type::Tuple(parts) => {
            ConcreteValue::Tuple(parts.iter().map(|&t| zero(t, module, sizing)).collect())
        }
        Type::Func => ConcreteValue::Func(None),
        Type::Chan(_) => ConcreteValue::Chan,
        Type::Map(..) => ConcreteValue::Map,
        Type::UnsafePointer => ConcreteValue::UnsafePointer,
        Type::Interface => panic!("bare interface has no zero value"),
        Type::UntypedNil => panic!("untyped nil has no zero value"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::{Field, IntWidth, Type};

    #[test]
    fn int_wraps_at_declared_width() {
        let a = IntValue::new(false, 8, 238);
        let b = IntValue::new(false, 8, 50);
        assert_eq!(a.wrapping_add(&b).as_u64(), 32);

        let a = IntValue::from_i64(true, 8, 127);
        let one = IntValue::from_i64(true, 8, 1);
        assert_eq!(a.wrapping_add(&one).as_i64(), -128);
    }

    #[test]
    fn signed_comparison_uses_sign_extension() {
        let neg = IntValue::from_i64(true, 32, -3);
        let pos = IntValue::from_i64(true, 32, 2);
        assert!(neg.lt(&pos));
        // Same bit patterns compare the other way around unsigned.
        let neg = IntValue::new(false, 32, neg.raw);
        let pos = IntValue::new(false, 32, pos.raw);
        assert!(pos.lt(&neg));
    }

    #[test]
    fn division_truncates_and_flags_zero() {
        let a = IntValue::from_i64(true, 32, -7);
        let b = IntValue::from_i64(true, 32, 2);
        assert_eq!(a.div(&b).unwrap().as_i64(), -3);
        assert!(a.div(&IntValue::from_i64(true, 32, 0)).is_none());
    }

    #[test]
    fn zero_is_total_on_supported_types() {
        let mut module = Module::new("t");
        let sizing = Sizing::default();
        let int = module.intern_type(Type::Int {
            signed: true,
            width: IntWidth::Word,
        });
        let ptr = module.intern_type(Type::Pointer(int));
        let st = module.intern_type(Type::Struct {
            name: "pair".into(),
            fields: vec![
                Field {
                    name: "a".into(),
                    ty: int,
                },
                Field {
                    name: "b".into(),
                    ty: ptr,
                },
            ],
        });
        let named = module.intern_type(Type::Named {
            path: "t.Pair".into(),
            underlying: st,
        });
        let s = module.intern_type(Type::Str);
        assert_eq!(
            zero(int, &module, &sizing),
            ConcreteValue::Int(IntValue::new(true, 64, 0))
        );
        assert_eq!(zero(s, &module, &sizing), ConcreteValue::Str(String::new()));
        assert_eq!(zero(ptr, &module, &sizing), ConcreteValue::Pointer(None));
        assert_eq!(
            zero(named, &module, &sizing),
            ConcreteValue::Struct(vec![
                ConcreteValue::Int(IntValue::new(true, 64, 0)),
                ConcreteValue::Pointer(None),
            ])
        );
    }
}
