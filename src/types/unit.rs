//! # Unit Words
//!
//! PCP packs a metric's unit into a single 32-bit PMAPI word holding three
//! dimension exponents and three 4-bit scales:
//!
//! ```text
//! bit 28: space dimension    bits 16-19: space scale
//! bit 24: time dimension     bits 12-15: time scale
//! bit 20: count dimension    bits  8-11: count scale
//! ```
//!
//! Each concrete unit below sets exactly one dimension bit and one scale
//! field. Composite units (bytes/second) are the bitwise-or of the packed
//! words; [`Unit`] is closed under `|` to preserve that algebra.

use std::ops::BitOr;

/// A packed 32-bit PMAPI unit word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Unit(u32);

impl Unit {
    /// The dimensionless unit (all bits zero).
    pub const NONE: Unit = Unit(0);

    /// Wraps a raw PMAPI word. Useful for units this crate has no named
    /// constant for, such as negative dimension exponents.
    pub fn from_raw(word: u32) -> Unit {
        Unit(word)
    }

    /// The PMAPI representation of this unit.
    pub fn pmapi(self) -> u32 {
        self.0
    }
}

impl BitOr for Unit {
    type Output = Unit;

    fn bitor(self, rhs: Unit) -> Unit {
        Unit(self.0 | rhs.0)
    }
}

/// Units of space, scale encoded in bits 16-19.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpaceUnit {
    Byte = 1 << 28,
    Kilobyte = 1 << 28 | 1 << 16,
    Megabyte = 1 << 28 | 2 << 16,
    Gigabyte = 1 << 28 | 3 << 16,
    Terabyte = 1 << 28 | 4 << 16,
    Petabyte = 1 << 28 | 5 << 16,
    Exabyte = 1 << 28 | 6 << 16,
}

/// Units of time, scale encoded in bits 12-15.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Nanosecond = 1 << 24,
    Microsecond = 1 << 24 | 1 << 12,
    Millisecond = 1 << 24 | 2 << 12,
    Second = 1 << 24 | 3 << 12,
    Minute = 1 << 24 | 4 << 12,
    Hour = 1 << 24 | 5 << 12,
}

/// Units of count, scale encoded in bits 8-11.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CountUnit {
    One = 1 << 20,
}

impl From<SpaceUnit> for Unit {
    fn from(u: SpaceUnit) -> Unit {
        Unit(u as u32)
    }
}

impl From<TimeUnit> for Unit {
    fn from(u: TimeUnit) -> Unit {
        Unit(u as u32)
    }
}

impl From<CountUnit> for Unit {
    fn from(u: CountUnit) -> Unit {
        Unit(u as u32)
    }
}
