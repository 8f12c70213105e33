//! # mmvkit - PCP MMV Instrumentation
//!
//! mmvkit lets an application publish its own metrics to Performance
//! Co-Pilot through the MMV (Memory-Mapped Value) file format. The library
//! writes a specifically-formatted file under `$PCP_TMP_DIR/mmv/` that both
//! the application (writer) and the PCP MMV PMDA (reader) map; after start,
//! updating a metric is a single atomic store into the shared mapping, with
//! no syscalls and no cooperation with the reader.
//!
//! ## Quick Start
//!
//! ```no_run
//! use mmvkit::{Client, CountUnit, Metric, MetricSemantics, MetricType};
//!
//! # fn main() -> mmvkit::Result<()> {
//! let mut client = Client::new("myapp")?;
//!
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
//!
//! client.start()?;
//! requests.set(7_i32)?;          // visible to pminfo/pmval immediately
//! client.stop()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   Client (registry + lifecycle)     │
//! ├─────────────────────────────────────┤
//! │  Layout Planner │ Serializer        │
//! ├─────────────────┴───────────────────┤
//! │  Record Layer (zerocopy MMV v1)     │
//! ├─────────────────────────────────────┤
//! │  Storage (RegionWriter / mmap)      │
//! └─────────────────────────────────────┘
//!       ▲ live updates        ▼ inverse
//!  Metric / InstanceMetric   dump() decoder
//! ```
//!
//! Data flows registry → planner → serializer → mapped region; after start
//! the metric handles mutate value cells in place. [`dump`] is the inverse
//! direction, parsing a region back into typed records for inspection.
//!
//! ## Consistency
//!
//! The file carries two generation words. The writer publishes content
//! before setting them equal and nonzero; a reader that observes them
//! unequal (or zero) retries. That is the only cross-process contract:
//! readers may see values from "some point in the recent past", which PCP
//! accepts by design.
//!
//! ## Module Overview
//!
//! - [`client`]: registry, lifecycle, layout and serialization
//! - [`dump`]: the MMV file decoder
//! - [`format`]: byte-exact MMV v1 record definitions
//! - [`storage`]: mapped region provider and positioned byte writer
//! - [`types`]: metric types, semantics, units, values
//! - [`config`]: environment knobs and the PMDA path contract

pub mod client;
pub mod config;
pub mod dump;
pub mod error;
pub mod format;
pub mod indom;
pub mod metric;
pub mod storage;
pub mod types;

mod hash;
mod strings;

pub use client::{Client, MmvFlags};
pub use dump::{dump, fixed_val, Dump};
pub use error::{MmvError, Result};
pub use indom::InstanceDomain;
pub use metric::{InstanceMetric, Metric};
pub use types::{
    is_compatible, CountUnit, MetricSemantics, MetricType, SpaceUnit, TimeUnit, Unit, Value,
};
