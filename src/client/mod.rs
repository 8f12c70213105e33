//! # Client
//!
//! The registry and lifecycle owner. A [`Client`] collects metrics and
//! instance domains, validates uniqueness of names and derived ids, and on
//! [`start`](Client::start) plans the file layout, creates and maps the file
//! under `$PCP_TMP_DIR/mmv/`, serializes every record, and publishes the
//! generation words. From then on only value cells mutate, through the
//! metric handles. [`stop`](Client::stop) retracts the generation words,
//! detaches every live cell, and removes the file.
//!
//! ```no_run
//! use mmvkit::{Client, CountUnit, Metric, MetricSemantics, MetricType};
//!
//! # fn main() -> mmvkit::Result<()> {
//! let mut client = Client::new("example")?;
//! let requests = Metric::new(
//!     "http.requests",
//!     0_i32,
//!     MetricType::Int32,
//!     MetricSemantics::Counter,
//!     CountUnit::One,
//!     "requests served",
//!     "",
//! )?;
//! client.register_metric(&requests)?;
//! client.start()?;
//! requests.set(7_i32)?;
//! # Ok(())
//! # }
//! ```

pub(crate) mod layout;
pub(crate) mod serialize;

use std::ops::BitOr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hashbrown::HashMap;

use crate::config;
use crate::error::{MmvError, Result};
use crate::format::HeaderBlock;
use crate::hash::{masked, CLUSTER_ID_BITS};
use crate::indom::InstanceDomain;
use crate::metric::{InstanceMetric, LiveCell, Metric, MetricInner};
use crate::storage::MappedRegion;

/// Header flag bits. Bit 0 is the v1 no-prefix flag, which this crate
/// never sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MmvFlags(u32);

impl MmvFlags {
    pub const NONE: MmvFlags = MmvFlags(0);
    /// Record the writing process id in the header.
    pub const PROCESS: MmvFlags = MmvFlags(1 << 1);
    /// Reserved by the format; carried but unused.
    pub const SENTINEL: MmvFlags = MmvFlags(1 << 2);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: MmvFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for MmvFlags {
    type Output = MmvFlags;

    fn bitor(self, rhs: MmvFlags) -> MmvFlags {
        MmvFlags(self.0 | rhs.0)
    }
}

pub struct Client {
    name: String,
    flags: MmvFlags,
    cluster: u32,
    string_size: usize,
    path: PathBuf,
    metrics: Vec<Arc<MetricInner>>,
    metric_index: HashMap<String, usize>,
    items: HashMap<u32, String>,
    indoms: Vec<InstanceDomain>,
    indom_index: HashMap<String, usize>,
    serials: HashMap<u32, String>,
    region: Option<Arc<MappedRegion>>,
    started: bool,
}

impl Client {
    /// A client whose header records the writing process id.
    pub fn new(name: &str) -> Result<Self> {
        Self::with_flags(name, MmvFlags::PROCESS)
    }

    pub fn with_flags(name: &str, flags: MmvFlags) -> Result<Self> {
        if name.is_empty() || name.contains(std::path::MAIN_SEPARATOR) {
            return Err(MmvError::Platform(format!("invalid client name '{name}'")));
        }

        Ok(Self {
            name: name.to_owned(),
            flags,
            cluster: masked(name, CLUSTER_ID_BITS),
            string_size: config::max_string_size(),
            path: config::mmv_path(name),
            metrics: Vec::new(),
            metric_index: HashMap::new(),
            items: HashMap::new(),
            indoms: Vec::new(),
            indom_index: HashMap::new(),
            serials: HashMap::new(),
            region: None,
            started: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flags(&self) -> MmvFlags {
        self.flags
    }

    /// The 12-bit cluster id derived from the client name.
    pub fn cluster(&self) -> u32 {
        self.cluster
    }

    /// Path of the mapped file the PMDA samples.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn metric_count(&self) -> usize {
        self.metrics.len()
    }

    pub fn indom_count(&self) -> usize {
        self.indoms.len()
    }

    fn ensure_registering(&self) -> Result<()> {
        if self.started {
            return Err(MmvError::AlreadyStarted);
        }
        Ok(())
    }

    fn register_inner(&mut self, inner: Arc<MetricInner>) -> Result<()> {
        self.ensure_registering()?;

        let name = &inner.desc.name;
        if self.metric_index.contains_key(name) {
            return Err(MmvError::AlreadyRegistered(name.clone()));
        }
        if let Some(existing) = self.items.get(&inner.desc.item) {
            return Err(MmvError::IdCollision {
                name: name.clone(),
                existing: existing.clone(),
                id: inner.desc.item,
            });
        }

        self.items.insert(inner.desc.item, name.clone());
        self.metric_index.insert(name.clone(), self.metrics.len());
        self.metrics.push(inner);
        Ok(())
    }

    /// Registers a singular metric.
    pub fn register_metric(&mut self, metric: &Metric) -> Result<()> {
        self.register_inner(metric.inner.clone())
    }

    /// Registers an instance metric, registering its instance domain first
    /// if this client has not seen it yet.
    pub fn register_instance_metric(&mut self, metric: &InstanceMetric) -> Result<()> {
        self.ensure_registering()?;

        let indom = metric.indom();
        match self.indom_index.get(indom.name()) {
            Some(&idx) if self.indoms[idx].same_domain(indom) => {}
            Some(_) => return Err(MmvError::AlreadyRegistered(indom.name().to_owned())),
            None => self.add_indom(indom)?,
        }

        self.register_inner(metric.inner.clone())
    }

    /// Registers an instance domain ahead of the metrics that use it.
    pub fn register_indom(&mut self, indom: &InstanceDomain) -> Result<()> {
        self.ensure_registering()?;

        if self.indom_index.contains_key(indom.name()) {
            return Err(MmvError::AlreadyRegistered(indom.name().to_owned()));
        }
        self.add_indom(indom)
    }

    fn add_indom(&mut self, indom: &InstanceDomain) -> Result<()> {
        if let Some(existing) = self.serials.get(&indom.serial()) {
            return Err(MmvError::IdCollision {
                name: indom.name().to_owned(),
                existing: existing.clone(),
                id: indom.serial(),
            });
        }

        self.serials.insert(indom.serial(), indom.name().to_owned());
        self.indom_index
            .insert(indom.name().to_owned(), self.indoms.len());
        self.indoms.push(indom.clone());
        Ok(())
    }

    /// Looks up a registered singular metric by name.
    pub fn metric(&self, name: &str) -> Option<Metric> {
        let inner = &self.metrics[*self.metric_index.get(name)?];
        inner.desc.indom.is_none().then(|| Metric {
            inner: inner.clone(),
        })
    }

    /// Looks up a registered instance metric by name.
    pub fn instance_metric(&self, name: &str) -> Option<InstanceMetric> {
        let inner = &self.metrics[*self.metric_index.get(name)?];
        inner.desc.indom.is_some().then(|| InstanceMetric {
            inner: inner.clone(),
        })
    }

    /// Plans the layout, creates and maps the file, writes every record,
    /// publishes the generation words, and attaches live cells to all
    /// registered metrics. Registration is rejected from here on.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(MmvError::AlreadyStarted);
        }

        let plan = layout::plan(&self.metrics, &self.indoms, self.string_size)?;

        let process = if self.flags.contains(MmvFlags::PROCESS) {
            std::process::id() as i32
        } else {
            0
        };
        let header = HeaderBlock::new(
            plan.toc.len() as u32,
            self.flags.bits(),
            process,
            self.cluster,
        );

        let mut region = MappedRegion::create(&self.path, plan.total_size)?;
        serialize::write_file(&mut region, &plan, header, &self.metrics, &self.indoms)?;
        serialize::publish(&region)?;

        let region = Arc::new(region);
        for (metric, mplan) in self.metrics.iter().zip(&plan.metrics) {
            let cells = mplan
                .cells
                .iter()
                .map(|cell| LiveCell {
                    region: region.clone(),
                    payload_offset: cell.value_offset,
                    string_offset: cell.string_offset,
                    string_size: self.string_size,
                })
                .collect();
            metric.state.write().cells = cells;
        }

        self.region = Some(region);
        self.started = true;
        Ok(())
    }

    /// Retracts the generation words, detaches every live cell (waiting out
    /// in-flight sets), unmaps, and removes the file. Io failures are
    /// reported but the client still transitions to stopped.
    pub fn stop(&mut self) -> Result<()> {
        if !self.started {
            return Err(MmvError::NotStarted);
        }
        self.started = false;

        // Taking each metric's write lock drains any set() in progress
        // before its cell goes away.
        for metric in &self.metrics {
            metric.state.write().cells.clear();
        }

        let mut result = Ok(());
        if let Some(region) = self.region.take() {
            if let Err(e) = serialize::retract(&region) {
                result = Err(e);
            }
            if let Err(e) = region.remove_file() {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if self.started {
            // Errors here have nowhere to go; the file is best-effort
            // removed so the PMDA stops sampling a dead writer.
            let _ = self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::Metric;
    use crate::types::{CountUnit, MetricSemantics, MetricType};

    fn counter(name: &str) -> Metric {
        Metric::new(
            name,
            0_i32,
            MetricType::Int32,
            MetricSemantics::Counter,
            CountUnit::One,
            "",
            "",
        )
        .unwrap()
    }

    #[test]
    fn duplicate_metric_names_are_rejected() {
        let mut client = Client::new("test.dup").unwrap();
        client.register_metric(&counter("a.metric")).unwrap();

        let err = client.register_metric(&counter("a.metric")).unwrap_err();
        assert!(matches!(err, MmvError::AlreadyRegistered(name) if name == "a.metric"));
    }

    #[test]
    fn ten_bit_item_collisions_are_rejected() {
        let mut client = Client::new("test.collide").unwrap();
        client.register_metric(&counter("mem.misses")).unwrap();

        let err = client.register_metric(&counter("mem.ops")).unwrap_err();
        assert!(matches!(
            err,
            MmvError::IdCollision { name, existing, .. }
                if name == "mem.ops" && existing == "mem.misses"
        ));
    }

    #[test]
    fn lookups_distinguish_singular_and_instance_metrics() {
        let mut client = Client::new("test.lookup").unwrap();
        client.register_metric(&counter("plain")).unwrap();

        assert!(client.metric("plain").is_some());
        assert!(client.instance_metric("plain").is_none());
        assert!(client.metric("absent").is_none());
    }

    #[test]
    fn cluster_id_is_a_twelve_bit_hash_of_the_name() {
        let client = Client::new("test.cluster").unwrap();
        assert!(client.cluster() < 1 << 12);
        assert_eq!(client.cluster(), masked("test.cluster", CLUSTER_ID_BITS));
    }

    #[test]
    fn flags_combine_bitwise() {
        let flags = MmvFlags::PROCESS | MmvFlags::SENTINEL;
        assert_eq!(flags.bits(), 0b110);
        assert!(flags.contains(MmvFlags::PROCESS));
        assert!(flags.contains(MmvFlags::SENTINEL));
        assert!(!MmvFlags::NONE.contains(MmvFlags::PROCESS));
    }

    #[test]
    fn stop_before_start_reports_not_started() {
        let mut client = Client::new("test.stop").unwrap();
        assert!(matches!(client.stop(), Err(MmvError::NotStarted)));
    }
}
