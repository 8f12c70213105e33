//! # Instance Domains
//!
//! An instance domain is a named, immutable set of named instances that a
//! metric can be dimensioned by. The domain's serial and each instance's
//! internal id are masked hashes of their names; collisions inside one
//! domain are rejected at construction so the registry never has to alias
//! two instances onto one id.

use std::sync::Arc;

use hashbrown::HashMap;

use crate::error::{MmvError, Result};
use crate::format::NAME_LEN;
use crate::hash::{masked, INDOM_SERIAL_BITS, INSTANCE_ID_BITS};

#[derive(Debug)]
pub(crate) struct InstanceDesc {
    pub(crate) name: String,
    pub(crate) id: i32,
}

#[derive(Debug)]
pub(crate) struct IndomInner {
    name: String,
    serial: u32,
    instances: Vec<InstanceDesc>,
    index: HashMap<String, usize>,
    short_help: String,
    long_help: String,
}

/// A named set of instances, shared cheaply between metrics and the client.
#[derive(Debug, Clone)]
pub struct InstanceDomain {
    pub(crate) inner: Arc<IndomInner>,
}

impl InstanceDomain {
    /// Builds a domain over `instances`. Instance names must be unique,
    /// fit the 64-byte on-disk name field, and hash to distinct ids.
    pub fn new(name: &str, instances: &[&str], short_help: &str, long_help: &str) -> Result<Self> {
        let mut descs: Vec<InstanceDesc> = Vec::with_capacity(instances.len());
        let mut index = HashMap::with_capacity(instances.len());
        let mut ids: HashMap<u32, usize> = HashMap::with_capacity(instances.len());

        for instance in instances {
            if instance.len() >= NAME_LEN {
                return Err(MmvError::StringTooLong {
                    len: instance.len(),
                    max: NAME_LEN - 1,
                });
            }
            if index.contains_key(*instance) {
                return Err(MmvError::AlreadyRegistered((*instance).to_owned()));
            }

            let id = masked(instance, INSTANCE_ID_BITS);
            if let Some(&other) = ids.get(&id) {
                return Err(MmvError::IdCollision {
                    name: (*instance).to_owned(),
                    existing: descs[other].name.clone(),
                    id,
                });
            }

            ids.insert(id, descs.len());
            index.insert((*instance).to_owned(), descs.len());
            descs.push(InstanceDesc {
                name: (*instance).to_owned(),
                id: id as i32,
            });
        }

        Ok(Self {
            inner: Arc::new(IndomInner {
                name: name.to_owned(),
                serial: masked(name, INDOM_SERIAL_BITS),
                instances: descs,
                index,
                short_help: short_help.to_owned(),
                long_help: long_help.to_owned(),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The 22-bit serial derived from the domain name.
    pub fn serial(&self) -> u32 {
        self.inner.serial
    }

    pub fn instance_count(&self) -> usize {
        self.inner.instances.len()
    }

    pub fn has_instance(&self, name: &str) -> bool {
        self.inner.index.contains_key(name)
    }

    pub fn instance_names(&self) -> impl Iterator<Item = &str> {
        self.inner.instances.iter().map(|i| i.name.as_str())
    }

    pub fn short_help(&self) -> &str {
        &self.inner.short_help
    }

    pub fn long_help(&self) -> &str {
        &self.inner.long_help
    }

    pub(crate) fn position(&self, instance: &str) -> Option<usize> {
        self.inner.index.get(instance).copied()
    }

    pub(crate) fn instances(&self) -> &[InstanceDesc] {
        &self.inner.instances
    }

    pub(crate) fn same_domain(&self, other: &InstanceDomain) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
