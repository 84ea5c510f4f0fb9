//! Register identities and the descriptor table mapping each one onto the
//! kernel's user-area image.

use extended::Extended;

use crate::error::{Error, Result};

#[cfg(target_arch = "x86_64")]
mod x86_64;
#[cfg(target_arch = "x86_64")]
pub use x86_64::{register_info_by_id, register_info_by_name, register_infos, RegisterId};

/// Static descriptor for one register: where it lives in the user area, how
/// wide it is, and how its bytes are interpreted.
#[derive(Clone, Debug)]
pub struct RegisterInfo {
    pub register: RegisterId,
    pub name: &'static str,
    pub dwarf_id: i32,
    /// Byte offset into the `user` struct, as consumed by the peek/poke
    /// user-area ptrace requests.
    pub offset: usize,
    pub size: usize,
    pub register_type: RegisterType,
    pub format: RegisterFormat,
}

/// Which bank a register belongs to; decides the flush strategy on write.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum RegisterType {
    Gpr,
    SubGpr,
    Fpr,
    Dr,
}

/// How a register's bytes are interpreted.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum RegisterFormat {
    Uint,
    DoubleFloat,
    LongDouble,
    Vector,
}

/// A register value in one of its native shapes.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RegisterValue {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    Double(f64),
    /// x87 80-bit extended precision, as held by `st0..st7`.
    LongDouble(Extended),
    Byte64([u8; 8]),
    Byte128([u8; 16]),
}

impl RegisterValue {
    /// Little-endian bytes of the value plus its natural width.
    pub(crate) fn to_le_bytes(self) -> ([u8; 16], usize) {
        let mut bytes = [0u8; 16];
        let len = match self {
            Self::U8(v) => {
                bytes[..1].copy_from_slice(&v.to_le_bytes());
                1
            }
            Self::U16(v) => {
                bytes[..2].copy_from_slice(&v.to_le_bytes());
                2
            }
            Self::U32(v) => {
                bytes[..4].copy_from_slice(&v.to_le_bytes());
                4
            }
            Self::U64(v) => {
                bytes[..8].copy_from_slice(&v.to_le_bytes());
                8
            }
            Self::Double(v) => {
                bytes[..8].copy_from_slice(&v.to_le_bytes());
                8
            }
            Self::LongDouble(v) => {
                bytes[..10].copy_from_slice(&v.to_le_bytes());
                10
            }
            Self::Byte64(v) => {
                bytes[..8].copy_from_slice(&v);
                8
            }
            Self::Byte128(v) => {
                bytes.copy_from_slice(&v);
                16
            }
        };
        (bytes, len)
    }

    /// Zero-pad the value on the right to the descriptor's width. A value
    /// wider than the target register is the one "wrong type" error on the
    /// write path.
    pub(crate) fn widen_to(self, info: &RegisterInfo) -> Result<[u8; 16]> {
        let (bytes, len) = self.to_le_bytes();
        if len > info.size {
            return Err(Error::InvalidFormat);
        }
        Ok(bytes)
    }
}

macro_rules! impl_try_from_register_value {
    ($target:ty, $variant:ident) => {
        impl TryFrom<RegisterValue> for $target {
            type Error = Error;

            fn try_from(value: RegisterValue) -> Result<Self> {
                match value {
                    RegisterValue::$variant(v) => Ok(v),
                    _ => Err(Error::InvalidFormat),
                }
            }
        }
    };
}

impl_try_from_register_value!(u8, U8);
impl_try_from_register_value!(u16, U16);
impl_try_from_register_value!(u32, U32);
impl_try_from_register_value!(u64, U64);
impl_try_from_register_value!(f64, Double);
impl_try_from_register_value!(Extended, LongDouble);
impl_try_from_register_value!([u8; 8], Byte64);
impl_try_from_register_value!([u8; 16], Byte128);
