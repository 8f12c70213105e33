//! # File Serializer
//!
//! Emits a planned layout into the mapped region and runs the generation
//! protocol that publishes it to readers:
//!
//! 1. Header written with `g1 = g2 = 0`, so a reader that maps the file
//!    mid-write treats it as invalid.
//! 2. TOCs, indoms, instances, metrics, values and strings written through
//!    the exclusive `&mut` borrow.
//! 3. A `SeqCst` fence, then the generation token stored to `g1` and `g2`
//!    as `SeqCst` atomics. The fence plus the atomic stores keep the
//!    content stores from being observed after the generation words on any
//!    supported target.
//!
//! Retraction (on stop) zeroes both generation words, marking the region
//! invalid before the file is unlinked.

use std::sync::atomic::{fence, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use zerocopy::IntoBytes;

use crate::client::layout::LayoutPlan;
use crate::error::Result;
use crate::format::{
    HeaderBlock, IndomBlock, InstanceBlock, MetricBlock, ValueBlock, G1_OFFSET, G2_OFFSET,
    HEADER_LEN, NO_INDOM, TOC_LEN,
};
use crate::indom::InstanceDomain;
use crate::metric::MetricInner;
use crate::storage::{MappedRegion, RegionWriter};
use crate::types::{payload_bits, Value};

/// Fills the region from the plan. Generation words stay zero; call
/// [`publish`] afterwards.
pub(crate) fn write_file(
    region: &mut MappedRegion,
    plan: &LayoutPlan,
    header: HeaderBlock,
    metrics: &[Arc<MetricInner>],
    indoms: &[InstanceDomain],
) -> Result<()> {
    let string_size = plan.pool.slot_size();
    let mut w = RegionWriter::new(region.bytes_mut());

    w.write_at(0, header.as_bytes())?;

    for (i, toc) in plan.toc.iter().enumerate() {
        w.write_at(HEADER_LEN + i * TOC_LEN, toc.as_bytes())?;
    }

    for (indom, iplan) in indoms.iter().zip(&plan.indoms) {
        let block = IndomBlock::new(
            indom.serial(),
            indom.instance_count() as u32,
            iplan.instance_offsets.first().copied().unwrap_or(0) as u64,
            iplan.short,
            iplan.long,
        );
        w.write_at(iplan.offset, block.as_bytes())?;

        for (desc, &offset) in indom.instances().iter().zip(&iplan.instance_offsets) {
            let block = InstanceBlock::new(iplan.offset as u64, desc.id, &desc.name);
            w.write_at(offset, block.as_bytes())?;
        }
    }

    for (metric, mplan) in metrics.iter().zip(&plan.metrics) {
        let desc = &metric.desc;
        let block = MetricBlock::new(
            &desc.name,
            desc.item,
            desc.ty.as_i32(),
            desc.sem.as_i32(),
            desc.unit.pmapi(),
            desc.indom
                .as_ref()
                .map_or(NO_INDOM, |indom| indom.serial() as i32),
            mplan.short,
            mplan.long,
        );
        w.write_at(mplan.offset, block.as_bytes())?;

        for cell in &mplan.cells {
            let payload = match &cell.initial {
                Value::Str(_) => 0,
                value => payload_bits(desc.ty, value),
            };
            let block = ValueBlock::new(
                payload,
                cell.string_offset as i64,
                mplan.offset as u64,
                cell.instance_offset as u64,
            );
            w.write_at(cell.value_offset, block.as_bytes())?;
        }
    }

    let string_base = plan
        .toc
        .iter()
        .find(|t| t.type_tag() == crate::format::TocType::Strings as u32)
        .map(|t| t.offset() as usize);
    if let Some(base) = string_base {
        for (idx, content) in plan.pool.slots() {
            w.write_string_at(base + idx * string_size, content, string_size)?;
        }
    }

    Ok(())
}

/// A nonzero token for the generation words: wall-clock seconds, clamped
/// away from zero.
fn generation_token() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(1)
        .max(1)
}

/// Publishes the region: content must already be fully written.
pub(crate) fn publish(region: &MappedRegion) -> Result<()> {
    // Orders the serializer's plain stores before the generation stores.
    fence(Ordering::SeqCst);

    let token = generation_token();
    region.atomic_u64(G1_OFFSET).store(token, Ordering::SeqCst);
    region.atomic_u64(G2_OFFSET).store(token, Ordering::SeqCst);

    region.flush()
}

/// Marks the region invalid for readers ahead of unmap and removal.
pub(crate) fn retract(region: &MappedRegion) -> Result<()> {
    region.atomic_u64(G1_OFFSET).store(0, Ordering::SeqCst);
    region.atomic_u64(G2_OFFSET).store(0, Ordering::SeqCst);
    region.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_tokens_are_never_zero() {
        assert_ne!(generation_token(), 0);
    }
}
