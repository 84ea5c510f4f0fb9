use std::ffi::CString;
use std::os::fd::BorrowedFd;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use nix::errno::Errno;
use nix::sys::personality::{self, Persona};
use nix::sys::ptrace;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{dup2_stdout, execvp, fork, ForkResult, Pid};
use tracing::trace;

use crate::error::{Error, Result};
use crate::pipe::Pipe;

pub mod register_info;
pub mod registers;
pub mod stoppoint;

use register_info::{RegisterId, RegisterValue};
use registers::Registers;
use stoppoint::{BreakpointSite, BreakpointSiteTable, VirtAddr};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ProcessState {
    Running,
    Stopped,
    /// The inferior exited normally.
    Exited,
    /// The inferior was killed by a signal.
    Terminated,
}

/// A decoded wait status: what the inferior did and the associated 8-bit
/// code (exit status, terminating signal, or stopping signal).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StopReason {
    pub reason: ProcessState,
    pub info: u8,
}

impl From<WaitStatus> for StopReason {
    fn from(status: WaitStatus) -> Self {
        match status {
            WaitStatus::Exited(_, code) => Self {
                reason: ProcessState::Exited,
                info: code as u8,
            },
            WaitStatus::Signaled(_, signal, _) => Self {
                reason: ProcessState::Terminated,
                info: signal as u8,
            },
            WaitStatus::Stopped(_, signal) => Self {
                reason: ProcessState::Stopped,
                info: signal as u8,
            },
            // Not produced by a plain waitpid; the inferior keeps running.
            _ => Self {
                reason: ProcessState::Running,
                info: 0,
            },
        }
    }
}

/// The traced inferior: lifecycle, state machine, register synchronization
/// and breakpoint orchestration.
pub struct Process {
    pid: Pid,
    state: ProcessState,
    is_attached: bool,
    /// Whether this handle owns the inferior's lifetime and must kill and
    /// reap it on drop. True for launched processes, false for attached ones.
    terminate_on_end: bool,
    registers: Registers,
    breakpoint_sites: BreakpointSiteTable,
}

fn exit_with_perror(channel: &mut Pipe, prefix: &str, errno: Errno) -> ! {
    let message = format!("{prefix}: {errno}");
    let _ = channel.write(message.as_bytes());
    std::process::exit(-1)
}

impl Process {
    /// Fork and exec `path` as a traced inferior.
    ///
    /// Child-side failures are marshaled back through a close-on-exec pipe;
    /// an empty read (EOF from the exec closing the write end) is the success
    /// signal. With `debug` the child requests tracing before exec and the
    /// returned process has already consumed the initial stop. The child's
    /// stdout can be redirected onto `stdout_replacement`.
    pub fn launch(
        path: &Path,
        debug: bool,
        stdout_replacement: Option<BorrowedFd<'_>>,
    ) -> Result<Self> {
        let mut channel = Pipe::new(/*close_on_exec=*/ true)?;

        let child = match unsafe { fork() }.map_err(Error::Fork)? {
            ForkResult::Child => {
                let _ = personality::set(Persona::ADDR_NO_RANDOMIZE);
                channel.close_read();
                if let Some(fd) = stdout_replacement {
                    if let Err(errno) = dup2_stdout(fd) {
                        exit_with_perror(&mut channel, "stdout replacement failed", errno);
                    }
                }
                if debug {
                    if let Err(errno) = ptrace::traceme() {
                        exit_with_perror(&mut channel, "tracing failed", errno);
                    }
                }
                let program = match CString::new(path.as_os_str().as_bytes()) {
                    Ok(program) => program,
                    Err(_) => exit_with_perror(&mut channel, "bad program path", Errno::EINVAL),
                };
                if let Err(errno) = execvp(&program, &[program.as_c_str()]) {
                    exit_with_perror(&mut channel, "exec failed", errno);
                }
                unreachable!("execvp returned without error")
            }
            ForkResult::Parent { child } => child,
        };

        channel.close_write();
        let data = channel.read()?;
        channel.close_read();
        if !data.is_empty() {
            let _ = waitpid(child, None);
            return Err(Error::Exec(String::from_utf8_lossy(&data).into_owned()));
        }

        let mut process = Self {
            pid: child,
            state: ProcessState::Stopped,
            is_attached: debug,
            terminate_on_end: true,
            registers: Registers::new(child),
            breakpoint_sites: BreakpointSiteTable::new(),
        };
        trace!(pid = %child, path = %path.display(), "launched inferior");
        if debug {
            process.wait_on_signal()?;
        }
        Ok(process)
    }

    /// Attach to an already-running process. The attached inferior is not
    /// owned: dropping the handle detaches and lets it continue.
    pub fn attach(pid: Pid) -> Result<Self> {
        if pid.as_raw() == 0 {
            return Err(Error::InvalidPid);
        }
        ptrace::attach(pid).map_err(Error::Attach)?;

        let mut process = Self {
            pid,
            state: ProcessState::Stopped,
            is_attached: true,
            terminate_on_end: false,
            registers: Registers::new(pid),
            breakpoint_sites: BreakpointSiteTable::new(),
        };
        trace!(pid = %pid, "attached to inferior");
        process.wait_on_signal()?;
        Ok(process)
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }

    pub fn breakpoint_sites(&self) -> &BreakpointSiteTable {
        &self.breakpoint_sites
    }

    pub fn breakpoint_sites_mut(&mut self) -> &mut BreakpointSiteTable {
        &mut self.breakpoint_sites
    }

    pub fn get_pc(&self) -> Result<VirtAddr> {
        self.registers
            .read_by_id_as::<u64>(RegisterId::rip)
            .map(VirtAddr::new)
    }

    pub fn set_pc(&mut self, address: VirtAddr) -> Result<()> {
        self.registers
            .write_by_id(RegisterId::rip, RegisterValue::U64(address.addr()))
    }

    /// Continue the inferior. If the program counter sits on an enabled
    /// breakpoint site, step over it first so the trap byte is neither
    /// executed nor lost.
    pub fn resume(&mut self) -> Result<()> {
        if self.state != ProcessState::Stopped {
            return Err(Error::NotStopped);
        }

        let pc = self.get_pc()?;
        if self.breakpoint_sites.enabled_stoppoint_at_address(pc) {
            let site = self.breakpoint_sites.get_by_address_mut(pc)?;
            site.disable()?;
            ptrace::step(self.pid, None).map_err(Error::SingleStep)?;
            waitpid(self.pid, None).map_err(Error::Wait)?;
            site.enable()?;
        }

        ptrace::cont(self.pid, None).map_err(Error::Resume)?;
        self.state = ProcessState::Running;
        trace!(pid = %self.pid, "resumed inferior");
        Ok(())
    }

    /// Execute one instruction, stepping over an enabled breakpoint site at
    /// the program counter if there is one.
    pub fn step_instruction(&mut self) -> Result<StopReason> {
        if self.state != ProcessState::Stopped {
            return Err(Error::NotStopped);
        }

        let mut to_reenable = None;
        let pc = self.get_pc()?;
        if self.breakpoint_sites.enabled_stoppoint_at_address(pc) {
            self.breakpoint_sites.get_by_address_mut(pc)?.disable()?;
            to_reenable = Some(pc);
        }

        ptrace::step(self.pid, None).map_err(Error::SingleStep)?;
        let reason = self.wait_on_signal();

        if let Some(address) = to_reenable {
            self.breakpoint_sites
                .get_by_address_mut(address)?
                .enable()?;
        }
        reason
    }

    /// Block until the inferior changes state and decode the result.
    ///
    /// On a stop of an attached inferior the register mirror is refreshed;
    /// if the stop is a SIGTRAP landing one byte past an enabled site, the
    /// program counter is rewound onto the site so a later resume re-executes
    /// the displaced instruction.
    pub fn wait_on_signal(&mut self) -> Result<StopReason> {
        let status = waitpid(self.pid, None).map_err(Error::Wait)?;
        let reason = StopReason::from(status);
        self.state = reason.reason;
        trace!(pid = %self.pid, state = ?self.state, info = reason.info, "inferior changed state");

        if self.is_attached && self.state == ProcessState::Stopped {
            self.registers.read_all()?;

            let instr_begin = self.get_pc()?.sub(1);
            if reason.info == Signal::SIGTRAP as u8
                && self
                    .breakpoint_sites
                    .enabled_stoppoint_at_address(instr_begin)
            {
                self.set_pc(instr_begin)?;
            }
        }
        Ok(reason)
    }

    /// Register a software-breakpoint site at `address`. The site starts
    /// disabled; ids are consecutive for the lifetime of this process.
    pub fn create_breakpoint_site(&mut self, address: VirtAddr) -> Result<&mut BreakpointSite> {
        if self.breakpoint_sites.contains_address(address) {
            return Err(Error::DuplicateBreakpoint(address));
        }
        let id = self.breakpoint_sites.allocate_id();
        self.breakpoint_sites
            .push(BreakpointSite::new(id, self.pid, address))
    }

    /// Read `num_bytes` from the inferior, a word at a time.
    pub fn read_memory(&self, address: VirtAddr, num_bytes: usize) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(num_bytes);
        let mut offset = 0usize;
        while offset < num_bytes {
            let word = ptrace::read(self.pid, address.add(offset as u64).addr() as _)
                .map_err(Error::MemoryAccess)?;
            let bytes = word.to_le_bytes();
            let take = usize::min(bytes.len(), num_bytes - offset);
            data.extend_from_slice(&bytes[..take]);
            offset += take;
        }
        Ok(data)
    }

    /// Write bytes into the inferior, splicing a partial trailing word over
    /// the existing memory contents.
    pub fn write_memory(&mut self, address: VirtAddr, bytes: &[u8]) -> Result<()> {
        let mut written = 0usize;
        while written < bytes.len() {
            let remaining = &bytes[written..];
            let target = address.add(written as u64);
            let word = if remaining.len() >= 8 {
                let mut chunk = [0u8; 8];
                chunk.copy_from_slice(&remaining[..8]);
                i64::from_le_bytes(chunk)
            } else {
                let existing = ptrace::read(self.pid, target.addr() as _)
                    .map_err(Error::MemoryAccess)?;
                let mut chunk = existing.to_le_bytes();
                chunk[..remaining.len()].copy_from_slice(remaining);
                i64::from_le_bytes(chunk)
            };
            ptrace::write(self.pid, target.addr() as _, word).map_err(Error::MemoryAccess)?;
            written += 8;
        }
        Ok(())
    }

    /// Poke a single word in the inferior's user area.
    pub fn write_user_area(&mut self, offset: usize, data: u64) -> Result<()> {
        self.registers.write_user_area(offset, data)
    }
}

impl Drop for Process {
    /// Reconcile tracer state: a running attached inferior is stopped before
    /// detach and continued afterwards; an owned inferior is killed and
    /// reaped. Failures are ignored since the inferior may already be gone.
    fn drop(&mut self) {
        if self.pid.as_raw() == 0 {
            return;
        }
        if self.is_attached {
            if self.state == ProcessState::Running {
                let _ = kill(self.pid, Signal::SIGSTOP);
                let _ = waitpid(self.pid, None);
            }
            let _ = ptrace::detach(self.pid, None);
            let _ = kill(self.pid, Signal::SIGCONT);
        }
        if self.terminate_on_end {
            let _ = kill(self.pid, Signal::SIGKILL);
            let _ = waitpid(self.pid, None);
        }
    }
}
