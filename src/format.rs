//! # MMV v1 On-Disk Records
//!
//! Type-safe, zerocopy-based definitions of every record in an MMV v1 file.
//! The file is a single contiguous region laid out as:
//!
//! ```text
//! +--------------------------+ 0
//! | Header (40 bytes)        |
//! +--------------------------+ 40
//! | TOC entries (16 each)    |  one per non-empty section, in section order
//! +--------------------------+
//! | Instance domains (32)    |
//! +--------------------------+
//! | Instances (80)           |
//! +--------------------------+
//! | Metrics (104)            |
//! +--------------------------+
//! | Values (32)              |  one per (metric, instance?) pair
//! +--------------------------+
//! | Strings (256 each)       |
//! +--------------------------+
//! ```
//!
//! Every record length is a multiple of 8 and the header is 40 bytes, so all
//! 64-bit fields, in particular the value payloads and the two generation
//! words, are naturally aligned in the mapping.
//!
//! ## Generation words
//!
//! `g1` (offset 8) and `g2` (offset 16) carry the lock-free consistency
//! marker: a reader treats the file as valid iff `g1 == g2 != 0`. The writer
//! publishes by storing content first, then `g1`, then `g2`.
//!
//! ## Zerocopy safety
//!
//! All records use `FromBytes + IntoBytes + Immutable + KnownLayout +
//! Unaligned` with `little_endian` field wrappers, so they can be read from
//! and written to arbitrary byte offsets without copies or alignment faults.

use zerocopy::little_endian::{I32, I64, U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::error::MmvError;

pub const MAGIC: [u8; 4] = *b"MMV\0";
pub const VERSION: u32 = 1;

pub const HEADER_LEN: usize = 40;
pub const TOC_LEN: usize = 16;
pub const INDOM_LEN: usize = 32;
pub const INSTANCE_LEN: usize = 80;
pub const METRIC_LEN: usize = 104;
pub const VALUE_LEN: usize = 32;

/// Default string slot size; `MMV_MAXSTRSIZE` overrides it per process.
pub const STRING_BLOCK_LEN: usize = 256;

/// Width of the fixed name field in metric and instance records.
pub const NAME_LEN: usize = 64;

/// Byte offsets of the generation words within the header.
pub const G1_OFFSET: usize = 8;
pub const G2_OFFSET: usize = 16;

/// Indom serial stored for metrics without an instance domain.
pub const NO_INDOM: i32 = -1;

/// TOC section tags, in file section order.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TocType {
    Indoms = 1,
    Instances = 2,
    Metrics = 3,
    Values = 4,
    Strings = 5,
}

impl TryFrom<u32> for TocType {
    type Error = MmvError;

    fn try_from(tag: u32) -> Result<Self, MmvError> {
        Ok(match tag {
            1 => TocType::Indoms,
            2 => TocType::Instances,
            3 => TocType::Metrics,
            4 => TocType::Values,
            5 => TocType::Strings,
            _ => return Err(MmvError::Platform(format!("unknown TOC type {tag}"))),
        })
    }
}

fn fixed_name(name: &str) -> [u8; NAME_LEN] {
    debug_assert!(name.len() < NAME_LEN);
    let mut buf = [0u8; NAME_LEN];
    buf[..name.len()].copy_from_slice(name.as_bytes());
    buf
}

fn name_str(buf: &[u8; NAME_LEN]) -> &str {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
    std::str::from_utf8(&buf[..end]).unwrap_or("")
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct HeaderBlock {
    magic: [u8; 4],
    version: U32,
    g1: U64,
    g2: U64,
    tocs: U32,
    flags: U32,
    process: I32,
    cluster: U32,
}

const _: () = assert!(std::mem::size_of::<HeaderBlock>() == HEADER_LEN);

impl HeaderBlock {
    /// A fresh header with both generation words zeroed, marking the file
    /// invalid for readers until publication.
    pub fn new(tocs: u32, flags: u32, process: i32, cluster: u32) -> Self {
        Self {
            magic: MAGIC,
            version: U32::new(VERSION),
            g1: U64::new(0),
            g2: U64::new(0),
            tocs: U32::new(tocs),
            flags: U32::new(flags),
            process: I32::new(process),
            cluster: U32::new(cluster),
        }
    }

    pub fn magic(&self) -> [u8; 4] {
        self.magic
    }

    pub fn version(&self) -> u32 {
        self.version.get()
    }

    pub fn g1(&self) -> u64 {
        self.g1.get()
    }

    pub fn g2(&self) -> u64 {
        self.g2.get()
    }

    pub fn toc_count(&self) -> u32 {
        self.tocs.get()
    }

    pub fn flags(&self) -> u32 {
        self.flags.get()
    }

    pub fn process(&self) -> i32 {
        self.process.get()
    }

    pub fn cluster(&self) -> u32 {
        self.cluster.get()
    }

    #[cfg(test)]
    pub(crate) fn set_generation(&mut self, g1: u64, g2: u64) {
        self.g1 = U64::new(g1);
        self.g2 = U64::new(g2);
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct TocBlock {
    typ: U32,
    count: U32,
    offset: U64,
}

const _: () = assert!(std::mem::size_of::<TocBlock>() == TOC_LEN);

impl TocBlock {
    pub fn new(typ: TocType, count: u32, offset: u64) -> Self {
        Self {
            typ: U32::new(typ as u32),
            count: U32::new(count),
            offset: U64::new(offset),
        }
    }

    pub fn type_tag(&self) -> u32 {
        self.typ.get()
    }

    pub fn count(&self) -> u32 {
        self.count.get()
    }

    pub fn offset(&self) -> u64 {
        self.offset.get()
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct IndomBlock {
    serial: U32,
    count: U32,
    offset: U64,
    shorttext: U64,
    longtext: U64,
}

const _: () = assert!(std::mem::size_of::<IndomBlock>() == INDOM_LEN);

impl IndomBlock {
    pub fn new(serial: u32, count: u32, offset: u64, shorttext: u64, longtext: u64) -> Self {
        Self {
            serial: U32::new(serial),
            count: U32::new(count),
            offset: U64::new(offset),
            shorttext: U64::new(shorttext),
            longtext: U64::new(longtext),
        }
    }

    pub fn serial(&self) -> u32 {
        self.serial.get()
    }

    pub fn instance_count(&self) -> u32 {
        self.count.get()
    }

    /// Offset of the first instance record owned by this indom.
    pub fn instances_offset(&self) -> u64 {
        self.offset.get()
    }

    pub fn shorttext(&self) -> u64 {
        self.shorttext.get()
    }

    pub fn longtext(&self) -> u64 {
        self.longtext.get()
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct InstanceBlock {
    indom: U64,
    padding: U32,
    internal: I32,
    external: [u8; NAME_LEN],
}

const _: () = assert!(std::mem::size_of::<InstanceBlock>() == INSTANCE_LEN);

impl InstanceBlock {
    pub fn new(indom: u64, internal: i32, external: &str) -> Self {
        Self {
            indom: U64::new(indom),
            padding: U32::new(0),
            internal: I32::new(internal),
            external: fixed_name(external),
        }
    }

    /// Offset of the owning indom record.
    pub fn indom_offset(&self) -> u64 {
        self.indom.get()
    }

    pub fn internal_id(&self) -> i32 {
        self.internal.get()
    }

    pub fn name(&self) -> &str {
        name_str(&self.external)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct MetricBlock {
    name: [u8; NAME_LEN],
    item: U32,
    typ: I32,
    semantics: I32,
    unit: U32,
    indom: I32,
    padding: U32,
    shorttext: U64,
    longtext: U64,
}

const _: () = assert!(std::mem::size_of::<MetricBlock>() == METRIC_LEN);

impl MetricBlock {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: &str,
        item: u32,
        typ: i32,
        semantics: i32,
        unit: u32,
        indom: i32,
        shorttext: u64,
        longtext: u64,
    ) -> Self {
        Self {
            name: fixed_name(name),
            item: U32::new(item),
            typ: I32::new(typ),
            semantics: I32::new(semantics),
            unit: U32::new(unit),
            indom: I32::new(indom),
            padding: U32::new(0),
            shorttext: U64::new(shorttext),
            longtext: U64::new(longtext),
        }
    }

    pub fn name(&self) -> &str {
        name_str(&self.name)
    }

    pub fn item(&self) -> u32 {
        self.item.get()
    }

    pub fn type_tag(&self) -> i32 {
        self.typ.get()
    }

    pub fn semantics_tag(&self) -> i32 {
        self.semantics.get()
    }

    pub fn unit(&self) -> u32 {
        self.unit.get()
    }

    /// Serial of the metric's indom, or [`NO_INDOM`].
    pub fn indom_serial(&self) -> i32 {
        self.indom.get()
    }

    pub fn shorttext(&self) -> u64 {
        self.shorttext.get()
    }

    pub fn longtext(&self) -> u64 {
        self.longtext.get()
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct ValueBlock {
    payload: U64,
    extra: I64,
    metric: U64,
    instance: U64,
}

const _: () = assert!(std::mem::size_of::<ValueBlock>() == VALUE_LEN);

impl ValueBlock {
    pub fn new(payload: u64, extra: i64, metric: u64, instance: u64) -> Self {
        Self {
            payload: U64::new(payload),
            extra: I64::new(extra),
            metric: U64::new(metric),
            instance: U64::new(instance),
        }
    }

    /// The 8-byte scalar payload word; zero for string-valued metrics.
    pub fn payload(&self) -> u64 {
        self.payload.get()
    }

    /// Offset of the backing string slot for string-valued metrics, else 0.
    pub fn extra(&self) -> i64 {
        self.extra.get()
    }

    /// Offset of the metric descriptor this value belongs to.
    pub fn metric_offset(&self) -> u64 {
        self.metric.get()
    }

    /// Offset of the instance record, or 0 for singular metrics.
    pub fn instance_offset(&self) -> u64 {
        self.instance.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_sizes_match_the_v1_format() {
        assert_eq!(std::mem::size_of::<HeaderBlock>(), 40);
        assert_eq!(std::mem::size_of::<TocBlock>(), 16);
        assert_eq!(std::mem::size_of::<IndomBlock>(), 32);
        assert_eq!(std::mem::size_of::<InstanceBlock>(), 80);
        assert_eq!(std::mem::size_of::<MetricBlock>(), 104);
        assert_eq!(std::mem::size_of::<ValueBlock>(), 32);
    }

    #[test]
    fn generation_words_sit_at_their_published_offsets() {
        let mut header = HeaderBlock::new(2, 0, 0, 0);
        header.set_generation(0x1111_2222_3333_4444, 0x5555_6666_7777_8888);
        let bytes = header.as_bytes();

        assert_eq!(
            u64::from_le_bytes(bytes[G1_OFFSET..G1_OFFSET + 8].try_into().unwrap()),
            0x1111_2222_3333_4444
        );
        assert_eq!(
            u64::from_le_bytes(bytes[G2_OFFSET..G2_OFFSET + 8].try_into().unwrap()),
            0x5555_6666_7777_8888
        );
    }

    #[test]
    fn header_round_trips_through_bytes() {
        let header = HeaderBlock::new(3, 2, 4242, 99);
        let parsed = HeaderBlock::read_from_bytes(header.as_bytes()).unwrap();

        assert_eq!(parsed.magic(), MAGIC);
        assert_eq!(parsed.version(), VERSION);
        assert_eq!(parsed.toc_count(), 3);
        assert_eq!(parsed.flags(), 2);
        assert_eq!(parsed.process(), 4242);
        assert_eq!(parsed.cluster(), 99);
        assert_eq!(parsed.g1(), 0);
        assert_eq!(parsed.g2(), 0);
    }

    #[test]
    fn fixed_names_are_nul_terminated_and_padded() {
        let inst = InstanceBlock::new(40, 7, "Goroutines");
        assert_eq!(inst.name(), "Goroutines");

        let bytes = inst.as_bytes();
        // name field starts after indom (8) + padding (4) + internal (4)
        assert_eq!(&bytes[16..26], b"Goroutines");
        assert!(bytes[26..80].iter().all(|&b| b == 0));
    }

    #[test]
    fn metric_block_records_no_indom_as_minus_one() {
        let m = MetricBlock::new("http.requests", 175, 0, 1, 1 << 20, NO_INDOM, 0, 0);
        assert_eq!(m.indom_serial(), NO_INDOM);
        assert_eq!(m.name(), "http.requests");
        assert_eq!(m.item(), 175);
    }
}
