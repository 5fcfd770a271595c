//! Snapshot routing table.
//!
//! The published table is an immutable [`RouteSnapshot`] behind an
//! [`ArcSwap`]. A refresh builds a complete replacement off to the side and
//! swaps the pointer in one step, so readers never take a lock and never see
//! a half-built map.
use std::{collections::HashMap, sync::Arc, time::SystemTime};

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

/// A named backend as reported by the service directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub name: String,
    /// Base address requests for this service are forwarded to
    pub url: String,
}

impl ServiceRecord {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// One published generation of the routing table.
#[derive(Debug)]
pub struct RouteSnapshot {
    routes: HashMap<String, Arc<str>>,
    generation: u64,
    published_at: SystemTime,
}

impl RouteSnapshot {
    fn empty() -> Self {
        Self {
            routes: HashMap::new(),
            generation: 0,
            published_at: SystemTime::UNIX_EPOCH,
        }
    }

    fn from_records(records: Vec<ServiceRecord>, generation: u64) -> Self {
        let mut routes = HashMap::with_capacity(records.len());
        for record in records {
            // later duplicates win
            routes.insert(record.name, Arc::from(record.url));
        }
        Self {
            routes,
            generation,
            published_at: SystemTime::now(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<str>> {
        self.routes.get(name)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn published_at(&self) -> SystemTime {
        self.published_at
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Iterate over `(service name, target)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.routes.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }
}

/// Atomically replaceable service name → target mapping.
///
/// The refresher is the only writer; every request handler reads.
pub struct RouteTable {
    current: ArcSwap<RouteSnapshot>,
}

impl RouteTable {
    /// An empty table at generation 0.
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(RouteSnapshot::empty()),
        }
    }

    /// Resolve a service name to its base target.
    ///
    /// Lock-free; the returned handle is a refcount bump on the stored string.
    pub fn lookup(&self, name: &str) -> Option<Arc<str>> {
        self.current.load().get(name).cloned()
    }

    /// Replace the whole table with one built from `records`.
    ///
    /// Names missing from `records` disappear. Returns the new generation.
    pub fn publish(&self, records: Vec<ServiceRecord>) -> u64 {
        let generation = self.current.load().generation + 1;
        let snapshot = Arc::new(RouteSnapshot::from_records(records, generation));
        self.current.store(snapshot);
        generation
    }

    /// The currently published snapshot, for several reads against one generation.
    pub fn snapshot(&self) -> Arc<RouteSnapshot> {
        self.current.load_full()
    }

    pub fn generation(&self) -> u64 {
        self.current.load().generation
    }

    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}
