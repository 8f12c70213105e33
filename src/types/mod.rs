//! # Metric Type Model
//!
//! The closed sets of metric types, semantics and units defined by the PCP
//! MMV v1 format, plus the tagged [`Value`] variant carried through the
//! registry and live update path.
//!
//! The full on-disk tag set is enumerated for format compatibility, but only
//! the six numeric types and `String` are writable through this crate;
//! `Aggregate`, `Event` and friends exist so a decoder can name what it finds
//! in a foreign file.

mod unit;
mod value;

pub use unit::{CountUnit, SpaceUnit, TimeUnit, Unit};
pub use value::{is_compatible, Value};

pub(crate) use value::{default_value, narrowed, payload_bits};

use crate::error::MmvError;

/// On-disk metric type tags.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricType {
    NoSupport = -1,
    Int32 = 0,
    Uint32 = 1,
    Int64 = 2,
    Uint64 = 3,
    Float = 4,
    Double = 5,
    String = 6,
    Aggregate = 7,
    AggregateStatic = 8,
    Event = 9,
    HighresEvent = 10,
    Unknown = 255,
}

impl MetricType {
    /// Types a metric registered through this crate may carry.
    pub fn is_writable(self) -> bool {
        matches!(
            self,
            MetricType::Int32
                | MetricType::Uint32
                | MetricType::Int64
                | MetricType::Uint64
                | MetricType::Float
                | MetricType::Double
                | MetricType::String
        )
    }

    pub(crate) fn as_i32(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for MetricType {
    type Error = MmvError;

    fn try_from(tag: i32) -> Result<Self, MmvError> {
        Ok(match tag {
            -1 => MetricType::NoSupport,
            0 => MetricType::Int32,
            1 => MetricType::Uint32,
            2 => MetricType::Int64,
            3 => MetricType::Uint64,
            4 => MetricType::Float,
            5 => MetricType::Double,
            6 => MetricType::String,
            7 => MetricType::Aggregate,
            8 => MetricType::AggregateStatic,
            9 => MetricType::Event,
            10 => MetricType::HighresEvent,
            255 => MetricType::Unknown,
            _ => return Err(MmvError::TypeMismatch { ty: MetricType::Unknown }),
        })
    }
}

/// On-disk metric semantics tags.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricSemantics {
    None = 0,
    Counter = 1,
    Instant = 2,
    Discrete = 3,
}

impl MetricSemantics {
    pub(crate) fn as_i32(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for MetricSemantics {
    type Error = MmvError;

    fn try_from(tag: i32) -> Result<Self, MmvError> {
        Ok(match tag {
            0 => MetricSemantics::None,
            1 => MetricSemantics::Counter,
            2 => MetricSemantics::Instant,
            3 => MetricSemantics::Discrete,
            _ => return Err(MmvError::TypeMismatch { ty: MetricType::Unknown }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_tags_round_trip_through_i32() {
        for ty in [
            MetricType::NoSupport,
            MetricType::Int32,
            MetricType::Uint32,
            MetricType::Int64,
            MetricType::Uint64,
            MetricType::Float,
            MetricType::Double,
            MetricType::String,
            MetricType::Aggregate,
            MetricType::AggregateStatic,
            MetricType::Event,
            MetricType::HighresEvent,
            MetricType::Unknown,
        ] {
            assert_eq!(MetricType::try_from(ty.as_i32()).unwrap(), ty);
        }
        assert!(MetricType::try_from(42).is_err());
    }

    #[test]
    fn only_numeric_and_string_types_are_writable() {
        assert!(MetricType::Int32.is_writable());
        assert!(MetricType::Double.is_writable());
        assert!(MetricType::String.is_writable());
        assert!(!MetricType::Aggregate.is_writable());
        assert!(!MetricType::NoSupport.is_writable());
        assert!(!MetricType::Unknown.is_writable());
    }
}
