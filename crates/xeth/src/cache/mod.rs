//! Interface state cache.
//!
//! Entries are keyed by [`Xid`]. Only physical front-panel ports are also
//! reachable by name, since names of other device kinds are neither unique
//! nor stable. All mutation happens under one cache-wide write lock, so a
//! two-sided update such as an upper join is never observed half-applied.
//! Readers get cloned snapshots.
//!
//! # Example
//!
//! ```ignore
//! use xeth::cache::{InterfaceCache, Update};
//! use xeth::Xid;
//!
//! let cache = InterfaceCache::new();
//! cache.apply(Xid(3), Update::Flags(1));
//! cache.iterate(|entry| {
//!     println!("{}", entry);
//!     Ok::<_, std::convert::Infallible>(())
//! })?;
//! ```

mod associates;
mod entry;

pub use associates::Associates;
pub use entry::{
    EthtoolSettings, HardwareAddr, IFF_UP, InterfaceEntry, IpNetwork, LinkModeSet, LinkModes,
    NetNs, SystemInterface,
};

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::trace;

use crate::message::{DevKind, InterfaceInfo, Reason};
use crate::util::SysClassNet;
use crate::xid::Xid;

/// Best-effort lookup of host interfaces the driver has not described.
pub trait SystemLookup: Send + Sync + fmt::Debug {
    /// Describe the interface with kernel `ifindex`, if it exists.
    fn by_index(&self, ifindex: i32) -> Option<SystemInterface>;
}

/// Looks interfaces up under `/sys/class/net`.
#[derive(Debug, Clone, Default)]
pub struct SysfsLookup {
    sys: SysClassNet,
}

impl SysfsLookup {
    /// Look interfaces up under `sys`.
    pub fn new(sys: SysClassNet) -> Self {
        Self { sys }
    }
}

impl SystemLookup for SysfsLookup {
    fn by_index(&self, ifindex: i32) -> Option<SystemInterface> {
        self.sys.interface(ifindex).ok()
    }
}

/// A change merged into one entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Host snapshot; resets driver-only fields.
    System(SystemInterface),
    /// Full driver record.
    IfInfo(InterfaceInfo),
    /// `Up` and `Down` also set or clear `IFF_UP`.
    Reason(Reason),
    HardwareAddr(HardwareAddr),
    Kind(DevKind),
    Flags(u32),
    NetNs(NetNs),
    Ifindex(i32),
    Features(u64),
    AddrAdd(IpNetwork),
    /// Removes the first network with the same address, whatever its prefix.
    AddrDel(IpNetwork),
    EthtoolFlags(u32),
    EthtoolSettings(EthtoolSettings),
    LinkModes(LinkModeSet, u64),
    Carrier(bool),
}

/// How the target of an update was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Already cached.
    Cached,
    /// Seeded from a system lookup.
    Seeded,
    /// Unknown to both; a blank entry was created.
    Created,
}

impl Resolution {
    /// False when the xid was unknown to both the cache and the host.
    pub fn is_known(self) -> bool {
        !matches!(self, Self::Created)
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<Xid, InterfaceEntry>,
    names: HashMap<String, Xid>,
    order: Vec<Xid>,
}

impl Inner {
    /// Get or create the entry for `xid`, seeding it from `seed` when new.
    fn slot(
        &mut self,
        xid: Xid,
        seed: Option<&SystemInterface>,
    ) -> (Resolution, &mut InterfaceEntry) {
        match self.entries.entry(xid) {
            Entry::Occupied(o) => (Resolution::Cached, o.into_mut()),
            Entry::Vacant(v) => {
                self.order.push(xid);
                let (res, entry) = match seed {
                    Some(sys) => (Resolution::Seeded, InterfaceEntry::from_system(xid, sys)),
                    None => (Resolution::Created, InterfaceEntry::new(xid)),
                };
                (res, v.insert(entry))
            }
        }
    }

    fn reindex(&mut self, xid: Xid, old_name: &str, was_port: bool) {
        let Some(entry) = self.entries.get(&xid) else {
            return;
        };
        if was_port
            && (old_name != entry.name || !entry.is_port())
            && self.names.get(old_name) == Some(&xid)
        {
            self.names.remove(old_name);
        }
        if entry.is_port() && !entry.name.is_empty() {
            self.names.insert(entry.name.clone(), xid);
        }
    }
}

/// Concurrent store of interface state.
pub struct InterfaceCache {
    inner: RwLock<Inner>,
    lookup: Arc<dyn SystemLookup>,
}

impl fmt::Debug for InterfaceCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterfaceCache")
            .field("len", &self.len())
            .field("lookup", &self.lookup)
            .finish()
    }
}

impl Default for InterfaceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl InterfaceCache {
    /// Create an empty cache backed by sysfs lookups.
    pub fn new() -> Self {
        Self::with_lookup(Arc::new(SysfsLookup::default()))
    }

    /// Create an empty cache with a custom system lookup.
    pub fn with_lookup(lookup: Arc<dyn SystemLookup>) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            lookup,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Host snapshot for an uncached ifindex-range xid, taken outside the lock.
    fn seed(&self, xid: Xid) -> Option<SystemInterface> {
        if self.contains(xid) || !xid.is_ifindex() || xid.get() == 0 {
            return None;
        }
        self.lookup.by_index(xid.get() as i32)
    }

    /// Cached entry for `xid`, or one seeded from a system lookup.
    pub fn resolve(&self, xid: Xid) -> Option<InterfaceEntry> {
        if let Some(entry) = self.get(xid) {
            return Some(entry);
        }
        let sys = self.seed(xid)?;
        let mut inner = self.write();
        let (_, entry) = inner.slot(xid, Some(&sys));
        trace!(%xid, name = %entry.name, "seeded from system lookup");
        Some(entry.clone())
    }

    /// A copy of the cached entry for `xid`, without consulting the host.
    pub fn get(&self, xid: Xid) -> Option<InterfaceEntry> {
        self.read().entries.get(&xid).cloned()
    }

    /// Port entry named `name`.
    pub fn by_name(&self, name: &str) -> Option<InterfaceEntry> {
        let inner = self.read();
        let xid = inner.names.get(name)?;
        inner.entries.get(xid).cloned()
    }

    /// Whether `xid` is cached.
    pub fn contains(&self, xid: Xid) -> bool {
        self.read().entries.contains_key(&xid)
    }

    /// Number of cached entries, of every kind.
    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Merge `update` into the entry for `xid`, creating it if needed.
    pub fn apply(&self, xid: Xid, update: Update) -> Resolution {
        self.apply_all(xid, [update])
    }

    /// Merge several updates into one entry under a single lock.
    pub fn apply_all<I>(&self, xid: Xid, updates: I) -> Resolution
    where
        I: IntoIterator<Item = Update>,
    {
        let seed = self.seed(xid);
        let mut inner = self.write();
        let (res, entry) = inner.slot(xid, seed.as_ref());
        let old_name = entry.name.clone();
        let was_port = entry.is_port();
        for update in updates {
            merge(entry, update);
        }
        inner.reindex(xid, &old_name, was_port);
        res
    }

    /// Merge `update` only if `xid` is already cached.
    pub fn update(&self, xid: Xid, update: Update) -> bool {
        let mut inner = self.write();
        let Some(entry) = inner.entries.get_mut(&xid) else {
            return false;
        };
        let old_name = entry.name.clone();
        let was_port = entry.is_port();
        merge(entry, update);
        inner.reindex(xid, &old_name, was_port);
        true
    }

    /// Record `lower` as stacked below `upper`, on both entries.
    pub fn join(&self, lower: Xid, upper: Xid) -> Resolution {
        self.associate(lower, upper, true)
    }

    /// Undo [`join`](Self::join) on both entries.
    pub fn quit(&self, lower: Xid, upper: Xid) -> Resolution {
        self.associate(lower, upper, false)
    }

    fn associate(&self, lower: Xid, upper: Xid, linking: bool) -> Resolution {
        let lower_seed = self.seed(lower);
        let upper_seed = self.seed(upper);
        let mut inner = self.write();
        let (lower_res, entry) = inner.slot(lower, lower_seed.as_ref());
        if linking {
            entry.uppers.insert(upper);
        } else {
            entry.uppers.remove(upper);
        }
        let (upper_res, entry) = inner.slot(upper, upper_seed.as_ref());
        if linking {
            entry.lowers.insert(lower);
        } else {
            entry.lowers.remove(lower);
        }
        if lower_res.is_known() {
            upper_res
        } else {
            lower_res
        }
    }

    /// Drop the entry for `xid` from every index.
    ///
    /// References to `xid` held in other entries' uppers or lowers remain.
    pub fn remove(&self, xid: Xid) -> Option<InterfaceEntry> {
        let mut inner = self.write();
        let mut entry = inner.entries.remove(&xid)?;
        entry.ipnets.clear();
        if inner.names.get(&entry.name) == Some(&xid) {
            inner.names.remove(&entry.name);
        }
        inner.order.retain(|x| *x != xid);
        Some(entry)
    }

    /// Entries in ascending xid order.
    pub fn snapshot(&self) -> Vec<InterfaceEntry> {
        let inner = self.read();
        let mut order = inner.order.clone();
        order.sort_unstable();
        order
            .iter()
            .filter_map(|xid| inner.entries.get(xid).cloned())
            .collect()
    }

    /// Visit entries in ascending xid order, stopping at the first error.
    pub fn iterate<F, E>(&self, mut visit: F) -> Result<(), E>
    where
        F: FnMut(&InterfaceEntry) -> Result<(), E>,
    {
        for entry in self.snapshot() {
            visit(&entry)?;
        }
        Ok(())
    }
}

fn merge(entry: &mut InterfaceEntry, update: Update) {
    match update {
        Update::System(sys) => {
            entry.ifindex = sys.ifindex;
            entry.name = sys.name;
            entry.link = None;
            entry.netns = NetNs::DEFAULT;
            entry.addr = sys.addr;
            entry.flags = sys.flags;
            entry.kind = DevKind::Unspec;
            entry.reason = Reason::New;
            entry.id = 0;
            entry.port = -1;
            entry.subport = -1;
        }
        Update::IfInfo(info) => {
            entry.ifindex = info.ifindex;
            entry.name = info.name;
            entry.link = info.link;
            entry.netns = info.netns;
            entry.addr = info.addr;
            entry.flags = info.flags;
            entry.kind = info.kind;
            entry.reason = info.reason;
            entry.features = info.features;
            entry.id = info.id;
            entry.port = info.port;
            entry.subport = info.subport;
        }
        Update::Reason(reason) => {
            match reason {
                Reason::Up => entry.flags |= IFF_UP,
                Reason::Down => entry.flags &= !IFF_UP,
                _ => {}
            }
            entry.reason = reason;
        }
        Update::HardwareAddr(addr) => entry.addr = addr,
        Update::Kind(kind) => entry.kind = kind,
        Update::Flags(flags) => entry.flags = flags,
        Update::NetNs(netns) => entry.netns = netns,
        Update::Ifindex(ifindex) => entry.ifindex = ifindex,
        Update::Features(features) => entry.features = features,
        Update::AddrAdd(net) => entry.ipnets.push(net),
        Update::AddrDel(net) => {
            if let Some(i) = entry.ipnets.iter().position(|n| n.addr == net.addr) {
                entry.ipnets.remove(i);
            }
        }
        Update::EthtoolFlags(flags) => entry.ethtool_flags = flags,
        Update::EthtoolSettings(settings) => entry.ethtool_settings = settings,
        Update::LinkModes(which, modes) => entry.link_modes.set(which, modes),
        Update::Carrier(on) => entry.carrier = Some(on),
    }
}
