//! # Runtime Value Representation
//!
//! `Value` is the tagged variant carried between the registry, the
//! serializer and the live update path. Compatibility with a metric's
//! declared [`MetricType`] is a pure check over the tag and range:
//!
//! - signed targets accept any integer variant whose value fits the signed
//!   range, unsigned targets reject negatives
//! - integer values are narrowed to the target width on write
//! - `Float` widens losslessly into `Double`; the reverse is rejected
//! - `Str` matches only the `String` type
//!
//! [`payload_bits`] produces the 8-byte little-endian cell representation:
//! sub-64-bit integers occupy the low bytes, floats are their IEEE-754 bit
//! patterns, strings store zero (their content lives in a string slot).

use std::fmt;

use crate::error::{MmvError, Result};
use crate::types::MetricType;

/// A metric value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int32(i32),
    Uint32(u32),
    Int64(i64),
    Uint64(u64),
    Float(f32),
    Double(f64),
    Str(String),
}

impl From<i32> for Value {
    fn from(v: i32) -> Value {
        Value::Int32(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Value {
        Value::Uint32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Value {
        Value::Int64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Value {
        Value::Uint64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Value {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::Str(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int32(v) => write!(f, "{v}"),
            Value::Uint32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Uint64(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Str(v) => f.write_str(v),
        }
    }
}

/// Whether `value` may be assigned to a metric of type `ty`.
pub fn is_compatible(ty: MetricType, value: &Value) -> bool {
    narrowed(ty, value.clone()).is_ok()
}

/// Narrows `value` to the representation stored for a metric of type `ty`.
///
/// The returned value is what a subsequent `get` observes.
pub(crate) fn narrowed(ty: MetricType, value: Value) -> Result<Value> {
    let mismatch = || MmvError::TypeMismatch { ty };
    let out_of_range = || MmvError::ValueOutOfRange { ty };

    // Integer variants are funneled through i128 so one range check covers
    // every source width.
    let int = |v: &Value| -> Option<i128> {
        match v {
            Value::Int32(n) => Some(i128::from(*n)),
            Value::Uint32(n) => Some(i128::from(*n)),
            Value::Int64(n) => Some(i128::from(*n)),
            Value::Uint64(n) => Some(i128::from(*n)),
            _ => None,
        }
    };

    match ty {
        MetricType::Int32 => {
            let n = int(&value).ok_or_else(mismatch)?;
            let n = i32::try_from(n).map_err(|_| out_of_range())?;
            Ok(Value::Int32(n))
        }
        MetricType::Uint32 => {
            let n = int(&value).ok_or_else(mismatch)?;
            let n = u32::try_from(n).map_err(|_| out_of_range())?;
            Ok(Value::Uint32(n))
        }
        MetricType::Int64 => {
            let n = int(&value).ok_or_else(mismatch)?;
            let n = i64::try_from(n).map_err(|_| out_of_range())?;
            Ok(Value::Int64(n))
        }
        MetricType::Uint64 => {
            let n = int(&value).ok_or_else(mismatch)?;
            let n = u64::try_from(n).map_err(|_| out_of_range())?;
            Ok(Value::Uint64(n))
        }
        MetricType::Float => match value {
            Value::Float(v) => Ok(Value::Float(v)),
            _ => Err(mismatch()),
        },
        MetricType::Double => match value {
            Value::Double(v) => Ok(Value::Double(v)),
            Value::Float(v) => Ok(Value::Double(f64::from(v))),
            _ => Err(mismatch()),
        },
        MetricType::String => match value {
            Value::Str(s) => Ok(Value::Str(s)),
            _ => Err(mismatch()),
        },
        _ => Err(mismatch()),
    }
}

/// The 8-byte payload word for an already-narrowed value.
///
/// Callers must pass the result of [`narrowed`] for the same `ty`.
pub(crate) fn payload_bits(ty: MetricType, value: &Value) -> u64 {
    match (ty, value) {
        (MetricType::Int32, Value::Int32(v)) => u64::from(*v as u32),
        (MetricType::Uint32, Value::Uint32(v)) => u64::from(*v),
        (MetricType::Int64, Value::Int64(v)) => *v as u64,
        (MetricType::Uint64, Value::Uint64(v)) => *v,
        (MetricType::Float, Value::Float(v)) => u64::from(v.to_bits()),
        (MetricType::Double, Value::Double(v)) => v.to_bits(),
        (MetricType::String, Value::Str(_)) => 0,
        _ => unreachable!("payload_bits called with un-narrowed value"),
    }
}

/// The zero value stored for instances with no explicit initial value.
pub(crate) fn default_value(ty: MetricType) -> Value {
    match ty {
        MetricType::Int32 => Value::Int32(0),
        MetricType::Uint32 => Value::Uint32(0),
        MetricType::Int64 => Value::Int64(0),
        MetricType::Uint64 => Value::Uint64(0),
        MetricType::Float => Value::Float(0.0),
        MetricType::Double => Value::Double(0.0),
        MetricType::String => Value::Str(String::new()),
        _ => unreachable!("default_value for non-writable type"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_cross_accept_by_range() {
        assert!(is_compatible(MetricType::Int32, &Value::Int64(7)));
        assert!(is_compatible(MetricType::Uint64, &Value::Int32(7)));
        assert!(is_compatible(MetricType::Int64, &Value::Uint32(u32::MAX)));
        assert!(!is_compatible(MetricType::Uint32, &Value::Int32(-1)));
        assert!(!is_compatible(
            MetricType::Int32,
            &Value::Int64(i64::from(i32::MAX) + 1)
        ));
        assert!(!is_compatible(MetricType::Int64, &Value::Uint64(u64::MAX)));
    }

    #[test]
    fn narrowing_keeps_the_numeric_value() {
        assert_eq!(
            narrowed(MetricType::Int32, Value::Int64(42)).unwrap(),
            Value::Int32(42)
        );
        assert_eq!(
            narrowed(MetricType::Uint64, Value::Int32(1)).unwrap(),
            Value::Uint64(1)
        );
        assert!(matches!(
            narrowed(MetricType::Uint32, Value::Int64(-3)),
            Err(MmvError::ValueOutOfRange { .. })
        ));
    }

    #[test]
    fn floats_widen_but_never_narrow() {
        assert_eq!(
            narrowed(MetricType::Double, Value::Float(1.5)).unwrap(),
            Value::Double(1.5)
        );
        assert!(matches!(
            narrowed(MetricType::Float, Value::Double(1.5)),
            Err(MmvError::TypeMismatch { .. })
        ));
        assert!(!is_compatible(MetricType::Float, &Value::Int32(1)));
    }

    #[test]
    fn strings_match_only_the_string_type() {
        assert!(is_compatible(MetricType::String, &Value::from("hi")));
        assert!(!is_compatible(MetricType::Int32, &Value::from("hi")));
        assert!(!is_compatible(MetricType::String, &Value::Int32(0)));
    }

    #[test]
    fn payload_bits_are_little_endian_scalars() {
        let bits = payload_bits(MetricType::Int32, &Value::Int32(7));
        assert_eq!(bits.to_le_bytes(), [7, 0, 0, 0, 0, 0, 0, 0]);

        let bits = payload_bits(MetricType::Uint64, &Value::Uint64(1 << 40));
        assert_eq!(bits.to_le_bytes(), [0, 0, 0, 0, 0, 1, 0, 0]);

        let bits = payload_bits(MetricType::Int32, &Value::Int32(-1));
        assert_eq!(bits, 0xffff_ffff);

        let bits = payload_bits(MetricType::Double, &Value::Double(1.0));
        assert_eq!(bits, 1.0_f64.to_bits());
    }
}
