//! # Metrics and the Live Update Path
//!
//! [`Metric`] and [`InstanceMetric`] are cheap clonable handles around a
//! shared descriptor plus one value cell per instance (singular metrics have
//! exactly one cell). Before the owning client starts, `set` only updates
//! the cached value that will seed the file; after start it additionally
//! stores the 8-byte payload into the mapped region.
//!
//! ## Concurrency
//!
//! Each metric carries one `parking_lot::RwLock`, so the compatibility check
//! and the underlying store happen as one logical step for in-process
//! callers. The payload store itself is a Release `AtomicU64` store on a
//! naturally-aligned cell; the external reader is only synchronized through
//! the file's generation protocol, which bounds what it may observe to
//! "values that existed at some point in the recent past". String cells
//! rewrite their backing slot under the same lock; a torn read of a string
//! slot is accepted by PCP for the same reason.

use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{MmvError, Result};
use crate::format::NAME_LEN;
use crate::hash::{masked, METRIC_ITEM_BITS};
use crate::indom::InstanceDomain;
use crate::storage::MappedRegion;
use crate::types::{default_value, narrowed, payload_bits, MetricSemantics, MetricType, Unit, Value};

#[derive(Debug)]
pub(crate) struct MetricDesc {
    pub(crate) name: String,
    pub(crate) item: u32,
    pub(crate) ty: MetricType,
    pub(crate) sem: MetricSemantics,
    pub(crate) unit: Unit,
    pub(crate) indom: Option<InstanceDomain>,
    pub(crate) short_help: String,
    pub(crate) long_help: String,
}

/// A live cell inside the mapped region. Holding the region `Arc` keeps the
/// mapping alive for as long as any metric can still store into it.
#[derive(Debug)]
pub(crate) struct LiveCell {
    pub(crate) region: Arc<MappedRegion>,
    pub(crate) payload_offset: usize,
    /// String slot offset, or 0 for numeric cells.
    pub(crate) string_offset: usize,
    pub(crate) string_size: usize,
}

#[derive(Debug)]
pub(crate) struct MetricState {
    /// Narrowed current value per cell; what `get` returns.
    pub(crate) values: Vec<Value>,
    /// Empty until the client starts, then one entry per cell.
    pub(crate) cells: Vec<LiveCell>,
}

#[derive(Debug)]
pub(crate) struct MetricInner {
    pub(crate) desc: MetricDesc,
    pub(crate) state: RwLock<MetricState>,
}

impl MetricInner {
    #[allow(clippy::too_many_arguments)]
    fn new(
        name: &str,
        values: Vec<Value>,
        ty: MetricType,
        sem: MetricSemantics,
        unit: Unit,
        indom: Option<InstanceDomain>,
        short_help: &str,
        long_help: &str,
    ) -> Result<Arc<Self>> {
        if name.len() >= NAME_LEN {
            return Err(MmvError::StringTooLong {
                len: name.len(),
                max: NAME_LEN - 1,
            });
        }
        if !ty.is_writable() {
            return Err(MmvError::TypeMismatch { ty });
        }

        Ok(Arc::new(Self {
            desc: MetricDesc {
                name: name.to_owned(),
                item: masked(name, METRIC_ITEM_BITS),
                ty,
                sem,
                unit,
                indom,
                short_help: short_help.to_owned(),
                long_help: long_help.to_owned(),
            },
            state: RwLock::new(MetricState {
                values,
                cells: Vec::new(),
            }),
        }))
    }

    pub(crate) fn set_at(&self, idx: usize, value: Value) -> Result<()> {
        let value = narrowed(self.desc.ty, value)?;

        let mut state = self.state.write();
        if let Some(cell) = state.cells.get(idx) {
            if let Value::Str(s) = &value {
                // content plus trailing NUL must fit the backing slot
                if s.len() >= cell.string_size {
                    return Err(MmvError::ValueTooLarge {
                        len: s.len(),
                        max: cell.string_size - 1,
                    });
                }
                cell.region.zero(cell.string_offset, cell.string_size);
                cell.region.store_bytes(cell.string_offset, s.as_bytes());
            } else {
                let bits = payload_bits(self.desc.ty, &value);
                cell.region
                    .atomic_u64(cell.payload_offset)
                    .store(bits, Ordering::Release);
            }
        }
        state.values[idx] = value;
        Ok(())
    }

    pub(crate) fn get_at(&self, idx: usize) -> Value {
        self.state.read().values[idx].clone()
    }

    fn description(&self) -> String {
        if self.desc.long_help.is_empty() {
            self.desc.short_help.clone()
        } else {
            format!("{}\n\n{}", self.desc.short_help, self.desc.long_help)
        }
    }
}

/// A singular metric with one value cell.
#[derive(Debug, Clone)]
pub struct Metric {
    pub(crate) inner: Arc<MetricInner>,
}

impl Metric {
    /// Creates a metric. The initial value must be compatible with `ty` and
    /// is narrowed to it.
    pub fn new(
        name: &str,
        initial: impl Into<Value>,
        ty: MetricType,
        sem: MetricSemantics,
        unit: impl Into<Unit>,
        short_help: &str,
        long_help: &str,
    ) -> Result<Self> {
        let initial = narrowed(ty, initial.into())?;
        let inner = MetricInner::new(
            name,
            vec![initial],
            ty,
            sem,
            unit.into(),
            None,
            short_help,
            long_help,
        )?;
        Ok(Self { inner })
    }

    /// Sets the value, writing through to the mapped file once the owning
    /// client has started.
    pub fn set(&self, value: impl Into<Value>) -> Result<()> {
        self.inner.set_at(0, value.into())
    }

    /// The most recent successfully set value, narrowed to the metric type.
    pub fn get(&self) -> Value {
        self.inner.get_at(0)
    }

    pub fn name(&self) -> &str {
        &self.inner.desc.name
    }

    /// The 10-bit item id derived from the name.
    pub fn id(&self) -> u32 {
        self.inner.desc.item
    }

    pub fn type_of(&self) -> MetricType {
        self.inner.desc.ty
    }

    pub fn semantics(&self) -> MetricSemantics {
        self.inner.desc.sem
    }

    pub fn unit(&self) -> Unit {
        self.inner.desc.unit
    }

    /// Short and long help text joined the way PCP presents them.
    pub fn description(&self) -> String {
        self.inner.description()
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Val: {}\n{}", self.get(), self.description())
    }
}

/// A metric dimensioned by an instance domain, one value cell per instance.
#[derive(Debug, Clone)]
pub struct InstanceMetric {
    pub(crate) inner: Arc<MetricInner>,
}

impl InstanceMetric {
    /// Creates an instance metric over `indom`. `initial` maps instance
    /// names to starting values; instances not named start at the zero value
    /// of `ty`. Naming an instance outside the domain fails with
    /// `UnknownInstance`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        indom: &InstanceDomain,
        name: &str,
        initial: &[(&str, Value)],
        ty: MetricType,
        sem: MetricSemantics,
        unit: impl Into<Unit>,
        short_help: &str,
        long_help: &str,
    ) -> Result<Self> {
        if !ty.is_writable() {
            return Err(MmvError::TypeMismatch { ty });
        }

        let mut values = vec![default_value(ty); indom.instance_count()];
        for (instance, value) in initial {
            let idx = indom
                .position(instance)
                .ok_or_else(|| MmvError::UnknownInstance((*instance).to_owned()))?;
            values[idx] = narrowed(ty, value.clone())?;
        }

        let inner = MetricInner::new(
            name,
            values,
            ty,
            sem,
            unit.into(),
            Some(indom.clone()),
            short_help,
            long_help,
        )?;
        Ok(Self { inner })
    }

    fn position(&self, instance: &str) -> Result<usize> {
        self.indom()
            .position(instance)
            .ok_or_else(|| MmvError::UnknownInstance(instance.to_owned()))
    }

    /// Sets the value cell of one instance.
    pub fn set(&self, instance: &str, value: impl Into<Value>) -> Result<()> {
        let idx = self.position(instance)?;
        self.inner.set_at(idx, value.into())
    }

    /// The most recent value set for one instance.
    pub fn get(&self, instance: &str) -> Result<Value> {
        let idx = self.position(instance)?;
        Ok(self.inner.get_at(idx))
    }

    pub fn indom(&self) -> &InstanceDomain {
        self.inner
            .desc
            .indom
            .as_ref()
            .expect("instance metric always carries an indom")
    }

    pub fn name(&self) -> &str {
        &self.inner.desc.name
    }

    pub fn id(&self) -> u32 {
        self.inner.desc.item
    }

    pub fn type_of(&self) -> MetricType {
        self.inner.desc.ty
    }

    pub fn semantics(&self) -> MetricSemantics {
        self.inner.desc.sem
    }

    pub fn unit(&self) -> Unit {
        self.inner.desc.unit
    }

    pub fn description(&self) -> String {
        self.inner.description()
    }
}
