use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

pub mod breakpoint_site;

pub use breakpoint_site::BreakpointSite;

/// The `int3` trap byte spliced into the inferior at an enabled site.
pub const TRAP_INSTRUCTION: u8 = 0xCC;

/// A virtual address in the inferior's address space.
///
/// Arithmetic is explicit; there is no `Add`/`Sub` operator sugar so every
/// address adjustment is visible at the call site.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct VirtAddr(u64);

impl VirtAddr {
    pub const fn new(address: u64) -> Self {
        Self(address)
    }

    pub const fn addr(self) -> u64 {
        self.0
    }

    pub const fn add(self, delta: u64) -> Self {
        Self(self.0.wrapping_add(delta))
    }

    pub const fn sub(self, delta: u64) -> Self {
        Self(self.0.wrapping_sub(delta))
    }
}

impl From<u64> for VirtAddr {
    fn from(address: u64) -> Self {
        Self(address)
    }
}

impl fmt::Display for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Identity of a stoppoint, unique within its owning `Process`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct StoppointId(pub u32);

impl fmt::Display for StoppointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The set of software-breakpoint sites installed on one inferior.
///
/// Sites are indexed both by id and by address. Ids come from a counter owned
/// by the table, so they stay monotonic across removals, and id order equals
/// insertion order.
pub struct BreakpointSiteTable {
    sites: BTreeMap<StoppointId, BreakpointSite>,
    by_address: BTreeMap<VirtAddr, StoppointId>,
    next_id: u32,
}

impl BreakpointSiteTable {
    pub(crate) fn new() -> Self {
        Self {
            sites: BTreeMap::new(),
            by_address: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub(crate) fn allocate_id(&mut self) -> StoppointId {
        let id = StoppointId(self.next_id);
        self.next_id += 1;
        id
    }

    pub(crate) fn push(&mut self, site: BreakpointSite) -> Result<&mut BreakpointSite> {
        if self.by_address.contains_key(&site.address()) {
            return Err(Error::DuplicateBreakpoint(site.address()));
        }
        let id = site.id();
        self.by_address.insert(site.address(), id);
        Ok(self.sites.entry(id).or_insert(site))
    }

    /// Disable the site, then drop it from both indices.
    pub fn remove_by_id(&mut self, id: StoppointId) -> Result<()> {
        let site = self.sites.get_mut(&id).ok_or(Error::NoSuchBreakpoint)?;
        site.disable()?;
        let address = site.address();
        self.sites.remove(&id);
        self.by_address.remove(&address);
        Ok(())
    }

    pub fn remove_by_address(&mut self, address: VirtAddr) -> Result<()> {
        let id = *self
            .by_address
            .get(&address)
            .ok_or(Error::NoSuchBreakpoint)?;
        self.remove_by_id(id)
    }

    pub fn contains_id(&self, id: StoppointId) -> bool {
        self.sites.contains_key(&id)
    }

    pub fn contains_address(&self, address: VirtAddr) -> bool {
        self.by_address.contains_key(&address)
    }

    /// Whether an enabled site sits at `address`. Checked on every resume and
    /// single step.
    pub fn enabled_stoppoint_at_address(&self, address: VirtAddr) -> bool {
        self.site_at_address(&address)
            .is_some_and(BreakpointSite::is_enabled)
    }

    pub fn get_by_id(&self, id: StoppointId) -> Result<&BreakpointSite> {
        self.sites.get(&id).ok_or(Error::NoSuchBreakpoint)
    }

    pub fn get_by_id_mut(&mut self, id: StoppointId) -> Result<&mut BreakpointSite> {
        self.sites.get_mut(&id).ok_or(Error::NoSuchBreakpoint)
    }

    pub fn get_by_address(&self, address: VirtAddr) -> Result<&BreakpointSite> {
        self.site_at_address(&address).ok_or(Error::NoSuchBreakpoint)
    }

    pub fn get_by_address_mut(&mut self, address: VirtAddr) -> Result<&mut BreakpointSite> {
        match self.by_address.get(&address) {
            Some(id) => self.sites.get_mut(id).ok_or(Error::NoSuchBreakpoint),
            None => Err(Error::NoSuchBreakpoint),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn size(&self) -> usize {
        self.sites.len()
    }

    /// Sites in insertion (id) order.
    pub fn iter(&self) -> impl Iterator<Item = &BreakpointSite> {
        self.sites.values()
    }

    /// Sites in ascending address order.
    pub fn iter_by_address(&self) -> impl Iterator<Item = &BreakpointSite> {
        self.by_address.values().filter_map(|id| self.sites.get(id))
    }

    fn site_at_address(&self, address: &VirtAddr) -> Option<&BreakpointSite> {
        self.by_address
            .get(address)
            .and_then(|id| self.sites.get(id))
    }
}
