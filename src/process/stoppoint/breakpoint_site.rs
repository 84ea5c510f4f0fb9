use nix::sys::ptrace;
use nix::unistd::Pid;

use crate::error::{Error, Result};
use crate::process::stoppoint::{StoppointId, VirtAddr, TRAP_INSTRUCTION};

/// A single software breakpoint.
///
/// Enabling splices the trap byte into the word at the target address and
/// remembers the byte it displaced; disabling splices that byte back. The pid
/// is the site's poke capability into the inferior, handed over by the
/// `Process` that created it.
pub struct BreakpointSite {
    id: StoppointId,
    pid: Pid,
    address: VirtAddr,
    is_enabled: bool,
    saved_data: u8,
}

impl BreakpointSite {
    pub(crate) fn new(id: StoppointId, pid: Pid, address: VirtAddr) -> Self {
        Self {
            id,
            pid,
            address,
            is_enabled: false,
            saved_data: 0,
        }
    }

    pub fn id(&self) -> StoppointId {
        self.id
    }

    pub fn address(&self) -> VirtAddr {
        self.address
    }

    pub fn is_enabled(&self) -> bool {
        self.is_enabled
    }

    pub fn at_address(&self, address: VirtAddr) -> bool {
        self.address == address
    }

    pub fn in_range(&self, low: VirtAddr, high: VirtAddr) -> bool {
        low <= self.address && self.address < high
    }

    /// Install the trap byte. Enabling an enabled site is a no-op.
    pub fn enable(&mut self) -> Result<()> {
        if self.is_enabled {
            return Ok(());
        }

        let word = ptrace::read(self.pid, self.address.addr() as _)
            .map_err(Error::MemoryAccess)?;
        self.saved_data = (word & 0xff) as u8;

        let patched = (word & !0xff) | i64::from(TRAP_INSTRUCTION);
        ptrace::write(self.pid, self.address.addr() as _, patched)
            .map_err(Error::MemoryAccess)?;

        self.is_enabled = true;
        Ok(())
    }

    /// Restore the displaced byte. Disabling a disabled site is a no-op.
    pub fn disable(&mut self) -> Result<()> {
        if !self.is_enabled {
            return Ok(());
        }

        let word = ptrace::read(self.pid, self.address.addr() as _)
            .map_err(Error::MemoryAccess)?;
        let restored = (word & !0xff) | i64::from(self.saved_data);
        ptrace::write(self.pid, self.address.addr() as _, restored)
            .map_err(Error::MemoryAccess)?;

        self.is_enabled = false;
        Ok(())
    }
}

impl Drop for BreakpointSite {
    fn drop(&mut self) {
        // Best effort; the inferior may already be gone by teardown.
        if self.is_enabled {
            let _ = self.disable();
        }
    }
}
