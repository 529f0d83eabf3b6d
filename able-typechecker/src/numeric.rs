//! Numeric promotion rules for binary operators
//!
//! Integers of equal signedness promote to the wider operand. Mixed
//! signedness needs one extra bit so both ranges fit in a signed result; when
//! no signed type is wide enough the wider unsigned operand is used if it
//! already covers both widths. Floats promote to `f64` when either side is
//! `f64`, and `Ratio` absorbs any numeric operand.

use crate::error::TypecheckError;
use crate::types::{FloatKind, IntegerKind, PrimitiveKind, Type};
use lazy_static::lazy_static;
use std::collections::HashMap;

/// Width, signedness and value range of a sized integer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegerBounds {
    pub bits: u32,
    pub signed: bool,
    pub min: i128,
    pub max: u128,
}

impl IntegerBounds {
    fn signed(bits: u32) -> Self {
        Self {
            bits,
            signed: true,
            min: i128::MIN >> (128 - bits),
            max: (u128::MAX >> (128 - bits + 1)),
        }
    }

    fn unsigned(bits: u32) -> Self {
        Self {
            bits,
            signed: false,
            min: 0,
            max: u128::MAX >> (128 - bits),
        }
    }

    /// Whether `value` is representable
    pub fn contains(&self, value: i128) -> bool {
        if value < self.min {
            return false;
        }
        value < 0 || (value as u128) <= self.max
    }
}

const SIGNED_ORDER: [IntegerKind; 5] = [
    IntegerKind::I8,
    IntegerKind::I16,
    IntegerKind::I32,
    IntegerKind::I64,
    IntegerKind::I128,
];

const UNSIGNED_ORDER: [IntegerKind; 5] = [
    IntegerKind::U8,
    IntegerKind::U16,
    IntegerKind::U32,
    IntegerKind::U64,
    IntegerKind::U128,
];

lazy_static! {
    static ref INTEGER_BOUNDS: HashMap<IntegerKind, IntegerBounds> = {
        let mut table = HashMap::new();
        for (kind, bits) in SIGNED_ORDER.iter().zip([8, 16, 32, 64, 128]) {
            table.insert(*kind, IntegerBounds::signed(bits));
        }
        for (kind, bits) in UNSIGNED_ORDER.iter().zip([8, 16, 32, 64, 128]) {
            table.insert(*kind, IntegerBounds::unsigned(bits));
        }
        table
    };
}

pub fn integer_bounds(kind: IntegerKind) -> IntegerBounds {
    match INTEGER_BOUNDS.get(&kind) {
        Some(bounds) => *bounds,
        None => IntegerBounds::signed(32),
    }
}

pub fn smallest_signed_for(bits: u32) -> Option<IntegerKind> {
    SIGNED_ORDER
        .iter()
        .copied()
        .find(|kind| integer_bounds(*kind).bits >= bits)
}

pub fn smallest_unsigned_for(bits: u32) -> Option<IntegerKind> {
    UNSIGNED_ORDER
        .iter()
        .copied()
        .find(|kind| integer_bounds(*kind).bits >= bits)
}

/// Result kind of an integer operation, or a width error message
pub fn promote_integers(left: IntegerKind, right: IntegerKind) -> Result<IntegerKind, String> {
    let l = integer_bounds(left);
    let r = integer_bounds(right);
    let exceeded = |bits: u32| {
        format!(
            "integer operands {} and {} require {} bits, exceeding available widths",
            left.name(),
            right.name(),
            bits
        )
    };

    if l.signed == r.signed {
        let bits = l.bits.max(r.bits);
        let promoted = if l.signed {
            smallest_signed_for(bits)
        } else {
            smallest_unsigned_for(bits)
        };
        return promoted.ok_or_else(|| exceeded(bits));
    }

    let needed = l.bits.max(r.bits) + 1;
    if let Some(kind) = smallest_signed_for(needed) {
        return Ok(kind);
    }
    let (unsigned_kind, unsigned) = if l.signed { (right, r) } else { (left, l) };
    if unsigned.bits >= l.bits.max(r.bits) {
        return Ok(unsigned_kind);
    }
    Err(exceeded(needed))
}

pub fn promote_floats(left: &Type, right: &Type) -> FloatKind {
    let is_f64 = |t: &Type| matches!(t, Type::Float(FloatKind::F64));
    if is_f64(left) || is_f64(right) {
        FloatKind::F64
    } else {
        FloatKind::F32
    }
}

pub fn is_ratio(t: &Type) -> bool {
    match t.resolve_alias() {
        Type::Struct { name, .. } | Type::StructInstance { name, .. } => name == "Ratio",
        _ => false,
    }
}

pub fn is_numeric(t: &Type) -> bool {
    matches!(t.resolve_alias(), Type::Integer(_) | Type::Float(_)) || is_ratio(t)
}

/// Result type of a numeric binary operator (`+ - * / %`)
pub fn binary_result_type(operator: &str, left: &Type, right: &Type) -> Result<Type, TypecheckError> {
    let (l, r) = (left.resolve_alias(), right.resolve_alias());
    if l.is_unknown() || r.is_unknown() || l.is_type_parameter() || r.is_type_parameter() {
        return Ok(Type::Unknown);
    }
    if operator == "+"
        && l == &Type::Primitive(PrimitiveKind::String)
        && r == &Type::Primitive(PrimitiveKind::String)
    {
        return Ok(Type::string());
    }
    if !is_numeric(l) || !is_numeric(r) {
        return Err(TypecheckError::NumericOperands {
            operator: operator.to_string(),
            left: left.to_string(),
            right: right.to_string(),
            span: None,
        });
    }

    if is_ratio(l) || is_ratio(r) {
        return Ok(Type::Struct {
            name: "Ratio".to_string(),
            type_params: Vec::new(),
        });
    }
    if matches!(l, Type::Float(_)) || matches!(r, Type::Float(_)) {
        return Ok(Type::Float(promote_floats(l, r)));
    }
    if operator == "/" {
        return Ok(Type::Float(FloatKind::F64));
    }
    match (l, r) {
        (Type::Integer(a), Type::Integer(b)) => {
            promote_integers(*a, *b)
                .map(Type::Integer)
                .map_err(|message| TypecheckError::IntegerWidth {
                    operator: operator.to_string(),
                    message,
                    span: None,
                })
        }
        _ => Ok(Type::Unknown),
    }
}
