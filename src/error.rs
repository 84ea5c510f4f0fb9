use nix::errno::Errno;

use crate::process::stoppoint::VirtAddr;

/// Failure kinds surfaced by the debugger core.
///
/// Syscall-backed variants keep the OS errno as their source so callers see
/// the kernel's reason appended to the message.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("fork failed: {0}")]
    Fork(#[source] Errno),

    /// Child-side launch failure (exec, trace-me, stdout redirection),
    /// marshaled back through the launch pipe.
    #[error("{0}")]
    Exec(String),

    #[error("could not attach: {0}")]
    Attach(#[source] Errno),

    #[error("invalid PID")]
    InvalidPid,

    #[error("waitpid failed: {0}")]
    Wait(#[source] Errno),

    #[error("could not resume: {0}")]
    Resume(#[source] Errno),

    #[error("could not single step: {0}")]
    SingleStep(#[source] Errno),

    #[error("could not read registers: {0}")]
    RegisterRead(#[source] Errno),

    #[error("could not write registers: {0}")]
    RegisterWrite(#[source] Errno),

    #[error("no such register: {0}")]
    InvalidRegister(String),

    #[error("invalid register value format")]
    InvalidFormat,

    #[error("breakpoint site already created at address {0}")]
    DuplicateBreakpoint(VirtAddr),

    #[error("no such breakpoint site")]
    NoSuchBreakpoint,

    #[error("memory access failed: {0}")]
    MemoryAccess(#[source] Errno),

    #[error("inferior is not stopped")]
    NotStopped,

    #[error("{context}: {errno}")]
    Pipe {
        context: &'static str,
        #[source]
        errno: Errno,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
