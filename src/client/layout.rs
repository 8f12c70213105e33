//! # Layout Planner
//!
//! Turns registry contents into the exact byte geometry of the file: the
//! TOC, the base of every section, and the offset of every record. All
//! cross-references in the format (indom → instances, value → metric,
//! value → string slot) are file offsets, so the plan is computed in full
//! before a single byte is written.
//!
//! Record sizes are all multiples of 8, which keeps every value payload
//! 8-aligned for the live update path.

use smallvec::SmallVec;
use std::sync::Arc;

use hashbrown::HashMap;

use crate::error::Result;
use crate::format::{
    TocBlock, TocType, HEADER_LEN, INDOM_LEN, INSTANCE_LEN, METRIC_LEN, TOC_LEN, VALUE_LEN,
};
use crate::indom::InstanceDomain;
use crate::metric::MetricInner;
use crate::strings::StringPool;
use crate::types::{MetricType, Value};

pub(crate) struct CellPlan {
    pub(crate) value_offset: usize,
    /// Backing string slot offset, or 0 for numeric cells.
    pub(crate) string_offset: usize,
    /// Instance record offset, or 0 for singular metrics.
    pub(crate) instance_offset: usize,
    /// Snapshot of the value the file is seeded with.
    pub(crate) initial: Value,
}

pub(crate) struct MetricPlan {
    pub(crate) offset: usize,
    pub(crate) short: u64,
    pub(crate) long: u64,
    pub(crate) cells: Vec<CellPlan>,
}

pub(crate) struct IndomPlan {
    pub(crate) offset: usize,
    pub(crate) instance_offsets: Vec<usize>,
    pub(crate) short: u64,
    pub(crate) long: u64,
}

pub(crate) struct LayoutPlan {
    pub(crate) total_size: usize,
    pub(crate) toc: SmallVec<[TocBlock; 5]>,
    pub(crate) indoms: Vec<IndomPlan>,
    pub(crate) metrics: Vec<MetricPlan>,
    pub(crate) pool: StringPool,
}

/// Slot indexes recorded while interning, resolved to offsets once the
/// string section base is known.
struct PendingStrings {
    indoms: Vec<(Option<usize>, Option<usize>)>,
    metrics: Vec<(Option<usize>, Option<usize>)>,
    cells: Vec<Vec<Option<usize>>>,
}

pub(crate) fn plan(
    metrics: &[Arc<MetricInner>],
    indoms: &[InstanceDomain],
    string_size: usize,
) -> Result<LayoutPlan> {
    let mut pool = StringPool::new(string_size);
    let mut pending = PendingStrings {
        indoms: Vec::with_capacity(indoms.len()),
        metrics: Vec::with_capacity(metrics.len()),
        cells: Vec::with_capacity(metrics.len()),
    };

    let intern_help = |pool: &mut StringPool, s: &str| -> Result<Option<usize>> {
        if s.is_empty() {
            Ok(None)
        } else {
            pool.intern(s).map(Some)
        }
    };

    for indom in indoms {
        let short = intern_help(&mut pool, indom.short_help())?;
        let long = intern_help(&mut pool, indom.long_help())?;
        pending.indoms.push((short, long));
    }

    // Initial values are snapshotted here; sets that land after planning
    // reach the file through the live path instead.
    let mut initials: Vec<Vec<Value>> = Vec::with_capacity(metrics.len());

    for metric in metrics {
        let short = intern_help(&mut pool, &metric.desc.short_help)?;
        let long = intern_help(&mut pool, &metric.desc.long_help)?;
        pending.metrics.push((short, long));

        let values = metric.state.read().values.clone();
        let mut slots = Vec::with_capacity(values.len());
        for value in &values {
            if metric.desc.ty == MetricType::String {
                let Value::Str(s) = value else {
                    unreachable!("string metric holds a non-string value")
                };
                slots.push(Some(pool.reserve(s)?));
            } else {
                slots.push(None);
            }
        }
        pending.cells.push(slots);
        initials.push(values);
    }

    let instance_total: usize = indoms.iter().map(|i| i.instance_count()).sum();
    let value_total: usize = initials.iter().map(|v| v.len()).sum();

    let mut toc: SmallVec<[TocBlock; 5]> = SmallVec::new();
    let toc_count = usize::from(!indoms.is_empty()) * 2
        + usize::from(!metrics.is_empty())
        + usize::from(value_total > 0)
        + usize::from(!pool.is_empty());

    let indom_base = HEADER_LEN + toc_count * TOC_LEN;
    let instance_base = indom_base + indoms.len() * INDOM_LEN;
    let metric_base = instance_base + instance_total * INSTANCE_LEN;
    let value_base = metric_base + metrics.len() * METRIC_LEN;
    let string_base = value_base + value_total * VALUE_LEN;
    let total_size = string_base + pool.len() * string_size;

    if !indoms.is_empty() {
        toc.push(TocBlock::new(
            TocType::Indoms,
            indoms.len() as u32,
            indom_base as u64,
        ));
        toc.push(TocBlock::new(
            TocType::Instances,
            instance_total as u32,
            instance_base as u64,
        ));
    }
    if !metrics.is_empty() {
        toc.push(TocBlock::new(
            TocType::Metrics,
            metrics.len() as u32,
            metric_base as u64,
        ));
    }
    if value_total > 0 {
        toc.push(TocBlock::new(
            TocType::Values,
            value_total as u32,
            value_base as u64,
        ));
    }
    if !pool.is_empty() {
        toc.push(TocBlock::new(
            TocType::Strings,
            pool.len() as u32,
            string_base as u64,
        ));
    }
    debug_assert_eq!(toc.len(), toc_count);

    let slot_offset = |idx: Option<usize>| -> u64 {
        idx.map_or(0, |i| (string_base + i * string_size) as u64)
    };

    let mut indom_plans = Vec::with_capacity(indoms.len());
    let mut serial_to_plan: HashMap<u32, usize> = HashMap::with_capacity(indoms.len());
    let mut instance_cursor = instance_base;

    for (i, indom) in indoms.iter().enumerate() {
        let offsets: Vec<usize> = (0..indom.instance_count())
            .map(|n| instance_cursor + n * INSTANCE_LEN)
            .collect();
        instance_cursor += indom.instance_count() * INSTANCE_LEN;

        serial_to_plan.insert(indom.serial(), i);
        indom_plans.push(IndomPlan {
            offset: indom_base + i * INDOM_LEN,
            instance_offsets: offsets,
            short: slot_offset(pending.indoms[i].0),
            long: slot_offset(pending.indoms[i].1),
        });
    }

    let mut metric_plans = Vec::with_capacity(metrics.len());
    let mut value_cursor = value_base;

    for (i, metric) in metrics.iter().enumerate() {
        let instance_offsets: &[usize] = match &metric.desc.indom {
            Some(indom) => {
                let plan_idx = serial_to_plan[&indom.serial()];
                &indom_plans[plan_idx].instance_offsets
            }
            None => &[],
        };

        let mut cells = Vec::with_capacity(initials[i].len());
        for (n, initial) in initials[i].iter().enumerate() {
            cells.push(CellPlan {
                value_offset: value_cursor,
                string_offset: slot_offset(pending.cells[i][n]) as usize,
                instance_offset: instance_offsets.get(n).copied().unwrap_or(0),
                initial: initial.clone(),
            });
            value_cursor += VALUE_LEN;
        }

        metric_plans.push(MetricPlan {
            offset: metric_base + i * METRIC_LEN,
            short: slot_offset(pending.metrics[i].0),
            long: slot_offset(pending.metrics[i].1),
            cells,
        });
    }

    Ok(LayoutPlan {
        total_size,
        toc,
        indoms: indom_plans,
        metrics: metric_plans,
        pool,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::STRING_BLOCK_LEN;
    use crate::metric::{InstanceMetric, Metric};
    use crate::types::{CountUnit, MetricSemantics};

    fn simple_metric(name: &str, short: &str) -> Arc<MetricInner> {
        Metric::new(
            name,
            0_i32,
            MetricType::Int32,
            MetricSemantics::Counter,
            CountUnit::One,
            short,
            "",
        )
        .unwrap()
        .inner
    }

    #[test]
    fn total_size_is_the_sum_of_all_sections() {
        let indom = InstanceDomain::new("runtime", &["a", "b", "c"], "an indom", "").unwrap();
        let im = InstanceMetric::new(
            &indom,
            "runtime.counts",
            &[],
            MetricType::Int32,
            MetricSemantics::Instant,
            CountUnit::One,
            "per-instance",
            "",
        )
        .unwrap();

        let metrics = vec![simple_metric("one", "a metric"), im.inner.clone()];
        let indoms = vec![indom];
        let p = plan(&metrics, &indoms, STRING_BLOCK_LEN).unwrap();

        // indoms, instances, metrics, values, strings
        assert_eq!(p.toc.len(), 5);
        // "an indom", "a metric", "per-instance"
        assert_eq!(p.pool.len(), 3);

        let expected = HEADER_LEN
            + 5 * TOC_LEN
            + INDOM_LEN
            + 3 * INSTANCE_LEN
            + 2 * METRIC_LEN
            + 4 * VALUE_LEN
            + 3 * STRING_BLOCK_LEN;
        assert_eq!(p.total_size, expected);
    }

    #[test]
    fn sections_absent_from_the_registry_get_no_toc_entry() {
        let metrics = vec![simple_metric("solo", "")];
        let p = plan(&metrics, &[], STRING_BLOCK_LEN).unwrap();

        // metrics and values only: no indoms, no strings
        assert_eq!(p.toc.len(), 2);
        assert_eq!(p.toc[0].type_tag(), TocType::Metrics as u32);
        assert_eq!(p.toc[1].type_tag(), TocType::Values as u32);
        assert_eq!(p.total_size, HEADER_LEN + 2 * TOC_LEN + METRIC_LEN + VALUE_LEN);
    }

    #[test]
    fn help_text_is_deduplicated_across_metrics() {
        let metrics = vec![
            simple_metric("first", "shared help"),
            simple_metric("second", "shared help"),
        ];
        let p = plan(&metrics, &[], STRING_BLOCK_LEN).unwrap();

        assert_eq!(p.pool.len(), 1);
        assert_eq!(p.metrics[0].short, p.metrics[1].short);
    }

    #[test]
    fn value_cells_stay_eight_aligned() {
        let indom = InstanceDomain::new("pairs", &["x", "y"], "", "").unwrap();
        let im = InstanceMetric::new(
            &indom,
            "paired",
            &[],
            MetricType::Double,
            MetricSemantics::Instant,
            CountUnit::One,
            "",
            "",
        )
        .unwrap();
        let metrics = vec![simple_metric("first", ""), im.inner.clone()];
        let p = plan(&metrics, &[indom], STRING_BLOCK_LEN).unwrap();

        for m in &p.metrics {
            assert_eq!(m.offset % 8, 0);
            for c in &m.cells {
                assert_eq!(c.value_offset % 8, 0);
            }
        }
    }

    #[test]
    fn instance_cells_point_at_their_instance_records() {
        let indom = InstanceDomain::new("duo", &["left", "right"], "", "").unwrap();
        let im = InstanceMetric::new(
            &indom,
            "duo.metric",
            &[],
            MetricType::Int64,
            MetricSemantics::Instant,
            CountUnit::One,
            "",
            "",
        )
        .unwrap();
        let p = plan(&[im.inner.clone()], &[indom], STRING_BLOCK_LEN).unwrap();

        let cells = &p.metrics[0].cells;
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].instance_offset, p.indoms[0].instance_offsets[0]);
        assert_eq!(cells[1].instance_offset, p.indoms[0].instance_offsets[1]);
        assert_eq!(
            cells[1].instance_offset - cells[0].instance_offset,
            INSTANCE_LEN
        );
    }
}
