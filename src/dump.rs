//! # MMV File Decoder
//!
//! The inverse of the serializer: [`dump`] parses a mapped region (or any
//! byte slice holding one) back into typed records, validating structural
//! integrity as it goes. Records are keyed by their byte offset, which is
//! the identity the format itself uses: values point at their metric and
//! instance records by offset, descriptors point at string slots by offset.
//!
//! The decoder matches TOC entries by type, not position, so it tolerates
//! sections appearing in any order and sections being absent entirely. It
//! decodes sequentially; section records are independent, so parallel
//! decoding would be a latency affordance with identical results.
//!
//! Decode errors short-circuit: the first structural problem abandons the
//! parse. Truncation anywhere yields [`MmvError::Truncated`], never a panic.

use hashbrown::HashMap;
use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::config;
use crate::error::{MmvError, Result};
use crate::format::{
    HeaderBlock, IndomBlock, InstanceBlock, MetricBlock, TocBlock, TocType, ValueBlock,
    HEADER_LEN, INDOM_LEN, INSTANCE_LEN, MAGIC, METRIC_LEN, TOC_LEN, VALUE_LEN, VERSION,
};
use crate::types::{MetricType, Value};

/// The decoded object graph of one MMV file.
#[derive(Debug)]
pub struct Dump {
    pub header: HeaderBlock,
    pub tocs: Vec<TocBlock>,
    pub indoms: HashMap<u64, IndomBlock>,
    pub instances: HashMap<u64, InstanceBlock>,
    pub metrics: HashMap<u64, MetricBlock>,
    pub values: HashMap<u64, ValueBlock>,
    /// String slot contents, NUL-trimmed.
    pub strings: HashMap<u64, String>,
}

fn read_block<T: FromBytes + KnownLayout + Immutable + Copy>(
    data: &[u8],
    offset: u64,
    len: usize,
) -> Result<T> {
    let start = usize::try_from(offset).map_err(|_| MmvError::Truncated {
        offset,
        need: len as u64,
    })?;
    let end = start.checked_add(len).filter(|&e| e <= data.len());
    let Some(end) = end else {
        return Err(MmvError::Truncated {
            offset,
            need: len as u64,
        });
    };

    T::read_from_bytes(&data[start..end])
        .map_err(|_| MmvError::Platform(format!("unreadable record at offset {offset}")))
}

fn read_header(data: &[u8]) -> Result<HeaderBlock> {
    let header: HeaderBlock = read_block(data, 0, HEADER_LEN)?;

    if header.magic() != MAGIC {
        return Err(MmvError::BadMagic(header.magic()));
    }
    if header.version() != VERSION {
        return Err(MmvError::VersionSkew(header.version()));
    }
    if header.g1() != header.g2() || header.g1() == 0 {
        return Err(MmvError::GenerationMismatch {
            g1: header.g1(),
            g2: header.g2(),
        });
    }

    Ok(header)
}

/// Offset of the `index`-th record in a section. TOC offsets and counts
/// come straight from the file, so the arithmetic itself can overflow on a
/// hostile buffer; that reads as truncation, not a panic.
fn record_offset(offset: u64, index: u64, stride: usize) -> Result<u64> {
    index
        .checked_mul(stride as u64)
        .and_then(|d| offset.checked_add(d))
        .ok_or(MmvError::Truncated {
            offset,
            need: stride as u64,
        })
}

fn read_section<T: FromBytes + KnownLayout + Immutable + Copy>(
    data: &[u8],
    offset: u64,
    count: u32,
    stride: usize,
) -> Result<HashMap<u64, T>> {
    let mut records = HashMap::with_capacity(count as usize);
    for i in 0..u64::from(count) {
        let at = record_offset(offset, i, stride)?;
        records.insert(at, read_block(data, at, stride)?);
    }
    Ok(records)
}

fn read_strings(
    data: &[u8],
    offset: u64,
    count: u32,
    stride: usize,
) -> Result<HashMap<u64, String>> {
    let mut strings = HashMap::with_capacity(count as usize);
    for i in 0..u64::from(count) {
        let at = record_offset(offset, i, stride)?;
        let start = usize::try_from(at).ok();
        let slot = start
            .and_then(|s| s.checked_add(stride).map(|e| (s, e)))
            .and_then(|(s, e)| data.get(s..e))
            .ok_or(MmvError::Truncated {
                offset: at,
                need: stride as u64,
            })?;
        let end = slot.iter().position(|&b| b == 0).unwrap_or(stride);
        strings.insert(at, String::from_utf8_lossy(&slot[..end]).into_owned());
    }
    Ok(strings)
}

/// Parses and validates a full MMV region.
pub fn dump(data: &[u8]) -> Result<Dump> {
    let header = read_header(data)?;

    let mut tocs = Vec::with_capacity(header.toc_count() as usize);
    for i in 0..u64::from(header.toc_count()) {
        let at = HEADER_LEN as u64 + i * TOC_LEN as u64;
        tocs.push(read_block::<TocBlock>(data, at, TOC_LEN)?);
    }

    let string_size = config::max_string_size();

    let mut out = Dump {
        header,
        tocs,
        indoms: HashMap::new(),
        instances: HashMap::new(),
        metrics: HashMap::new(),
        values: HashMap::new(),
        strings: HashMap::new(),
    };

    for toc in &out.tocs {
        let (offset, count) = (toc.offset(), toc.count());
        match TocType::try_from(toc.type_tag()) {
            Ok(TocType::Indoms) => {
                out.indoms = read_section(data, offset, count, INDOM_LEN)?;
            }
            Ok(TocType::Instances) => {
                out.instances = read_section(data, offset, count, INSTANCE_LEN)?;
            }
            Ok(TocType::Metrics) => {
                out.metrics = read_section(data, offset, count, METRIC_LEN)?;
            }
            Ok(TocType::Values) => {
                out.values = read_section(data, offset, count, VALUE_LEN)?;
            }
            Ok(TocType::Strings) => {
                out.strings = read_strings(data, offset, count, string_size)?;
            }
            // Unknown section types are skipped rather than rejected.
            Err(_) => {}
        }
    }

    Ok(out)
}

/// Reinterprets an 8-byte value payload word per the metric type: integer
/// narrowing for sub-64-bit types, IEEE-754 bit casts for floats.
pub fn fixed_val(bits: u64, ty: MetricType) -> Result<Value> {
    Ok(match ty {
        MetricType::Int32 => Value::Int32(bits as i32),
        MetricType::Uint32 => Value::Uint32(bits as u32),
        MetricType::Int64 => Value::Int64(bits as i64),
        MetricType::Uint64 => Value::Uint64(bits),
        MetricType::Float => Value::Float(f32::from_bits(bits as u32)),
        MetricType::Double => Value::Double(f64::from_bits(bits)),
        _ => return Err(MmvError::TypeMismatch { ty }),
    })
}
