use extended::Extended;
use libc::user;
use nix::sys::ptrace::{self, regset};
use nix::unistd::Pid;

use crate::error::{Error, Result};
use crate::process::register_info::{
    register_info_by_id, RegisterFormat, RegisterId, RegisterInfo, RegisterType, RegisterValue,
};

/// In-memory mirror of the inferior's register banks.
///
/// The backing image is the kernel's `user` struct, so descriptor offsets
/// index straight into it. The mirror is only meaningful while the inferior
/// is stopped; `Process::wait_on_signal` refreshes it on every stop.
pub struct Registers {
    pid: Pid,
    data: user,
}

impl Registers {
    pub(crate) fn new(pid: Pid) -> Self {
        Self {
            pid,
            // SAFETY: `user` is plain old data; an all-zero image is a valid
            // starting state that is overwritten on the first stop.
            data: unsafe { std::mem::zeroed() },
        }
    }

    /// Interpret the mirrored bytes behind `info` according to its format.
    pub fn read(&self, info: &RegisterInfo) -> RegisterValue {
        let bytes = self.as_bytes();
        let slice = &bytes[info.offset..info.offset + info.size];

        match info.format {
            RegisterFormat::Uint => match info.size {
                1 => RegisterValue::U8(slice[0]),
                2 => {
                    let mut buf = [0u8; 2];
                    buf.copy_from_slice(slice);
                    RegisterValue::U16(u16::from_le_bytes(buf))
                }
                4 => {
                    let mut buf = [0u8; 4];
                    buf.copy_from_slice(slice);
                    RegisterValue::U32(u32::from_le_bytes(buf))
                }
                8 => {
                    let mut buf = [0u8; 8];
                    buf.copy_from_slice(slice);
                    RegisterValue::U64(u64::from_le_bytes(buf))
                }
                _ => unreachable!("uint registers are 1, 2, 4 or 8 bytes wide"),
            },
            RegisterFormat::DoubleFloat => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&slice[..8]);
                RegisterValue::Double(f64::from_le_bytes(buf))
            }
            RegisterFormat::LongDouble => {
                let mut buf = [0u8; 10];
                buf.copy_from_slice(&slice[..10]);
                RegisterValue::LongDouble(Extended::from_le_bytes(buf))
            }
            RegisterFormat::Vector => match info.size {
                8 => {
                    let mut buf = [0u8; 8];
                    buf.copy_from_slice(slice);
                    RegisterValue::Byte64(buf)
                }
                16 => {
                    let mut buf = [0u8; 16];
                    buf.copy_from_slice(slice);
                    RegisterValue::Byte128(buf)
                }
                _ => unreachable!("vector registers are 8 or 16 bytes wide"),
            },
        }
    }

    pub fn read_by_id(&self, id: RegisterId) -> RegisterValue {
        self.read(register_info_by_id(id))
    }

    /// Typed read; fails if the stored shape is not exactly `T`.
    pub fn read_by_id_as<T>(&self, id: RegisterId) -> Result<T>
    where
        T: TryFrom<RegisterValue, Error = Error>,
    {
        T::try_from(self.read_by_id(id))
    }

    /// Update the mirror, then flush the affected bank to the inferior.
    ///
    /// GPR and sub-GPR writes flush the whole general-purpose struct, FPR
    /// writes the whole i387 struct, and debug-register writes poke only the
    /// affected user-area slot. Sub-GPR writes leave the unaffected high
    /// bytes of the containing 64-bit register alone.
    pub fn write(&mut self, info: &RegisterInfo, value: RegisterValue) -> Result<()> {
        let widened = value.widen_to(info)?;
        let offset = info.offset;
        self.as_bytes_mut()[offset..offset + info.size].copy_from_slice(&widened[..info.size]);

        match info.register_type {
            RegisterType::Gpr | RegisterType::SubGpr => self.flush_gprs(),
            RegisterType::Fpr => self.flush_fprs(),
            RegisterType::Dr => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&self.as_bytes()[offset..offset + 8]);
                self.write_user_area(offset, u64::from_le_bytes(buf))
            }
        }
    }

    pub fn write_by_id(&mut self, id: RegisterId, value: RegisterValue) -> Result<()> {
        self.write(register_info_by_id(id), value)
    }

    /// Refresh the whole mirror from the kernel: one GPR regset read, one
    /// FPR regset read, then a user-area peek per debug register.
    pub(crate) fn read_all(&mut self) -> Result<()> {
        self.data.regs =
            ptrace::getregset::<regset::NT_PRSTATUS>(self.pid).map_err(Error::RegisterRead)?;
        self.data.i387 =
            ptrace::getregset::<regset::NT_PRFPREG>(self.pid).map_err(Error::RegisterRead)?;

        for index in 0..8 {
            let info = register_info_by_id(RegisterId::dr(index));
            // The peek clears errno first, so a stored value of -1 is not
            // mistaken for a failed read.
            let data =
                ptrace::read_user(self.pid, info.offset as _).map_err(Error::RegisterRead)?;
            self.data.u_debugreg[index] = data as u64;
        }
        Ok(())
    }

    pub(crate) fn write_user_area(&self, offset: usize, data: u64) -> Result<()> {
        ptrace::write_user(self.pid, offset as _, data as i64).map_err(Error::RegisterWrite)
    }

    fn flush_gprs(&self) -> Result<()> {
        ptrace::setregset::<regset::NT_PRSTATUS>(self.pid, self.data.regs)
            .map_err(Error::RegisterWrite)
    }

    fn flush_fprs(&self) -> Result<()> {
        ptrace::setregset::<regset::NT_PRFPREG>(self.pid, self.data.i387)
            .map_err(Error::RegisterWrite)
    }

    fn as_bytes(&self) -> &[u8] {
        // SAFETY: only reinterpreting the register image as bytes for reads.
        unsafe {
            std::slice::from_raw_parts(
                (&self.data as *const user).cast::<u8>(),
                std::mem::size_of::<user>(),
            )
        }
    }

    fn as_bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: `user` is plain old data; any byte pattern is a valid image.
        unsafe {
            std::slice::from_raw_parts_mut(
                (&mut self.data as *mut user).cast::<u8>(),
                std::mem::size_of::<user>(),
            )
        }
    }
}
