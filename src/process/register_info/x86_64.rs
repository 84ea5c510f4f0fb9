//! The x86-64 register descriptor table.
//!
//! Offsets are computed against the libc `user` struct so they line up with
//! what the kernel's peek/poke user-area requests expect. `st` and `mm`
//! registers share storage: the MMX registers alias the low eight bytes of
//! the x87 stack slots.

use std::collections::HashMap;
use std::sync::LazyLock;

use libc::{user, user_fpregs_struct, user_regs_struct};
use memoffset::offset_of;
use strum::EnumIter;

use super::{RegisterFormat, RegisterInfo, RegisterType};
use crate::error::{Error, Result};

/// Every addressable register, including the sub-register views of the GPRs.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, EnumIter)]
#[allow(non_camel_case_types)]
#[rustfmt::skip]
pub enum RegisterId {
    // 64-bit general purpose
    rax, rdx, rcx, rbx, rsi, rdi, rbp, rsp,
    r8, r9, r10, r11, r12, r13, r14, r15,
    rip, eflags, cs, fs, gs, ss, ds, es,
    // exposed by ptrace for syscall identification; no DWARF id
    orig_rax,

    // 32-bit views
    eax, edx, ecx, ebx, esi, edi, ebp, esp,
    r8d, r9d, r10d, r11d, r12d, r13d, r14d, r15d,

    // 16-bit views
    ax, dx, cx, bx, si, di, bp, sp,
    r8w, r9w, r10w, r11w, r12w, r13w, r14w, r15w,

    // 8-bit high views
    ah, dh, ch, bh,

    // 8-bit low views
    al, dl, cl, bl, sil, dil, bpl, spl,
    r8b, r9b, r10b, r11b, r12b, r13b, r14b, r15b,

    // x87 control, status, tag and pointer words
    fcw, fsw, ftw, fop, frip, frdp, mxcsr, mxcsrmask,

    // x87 stack slots
    st0, st1, st2, st3, st4, st5, st6, st7,

    // MMX aliases of the x87 stack
    mm0, mm1, mm2, mm3, mm4, mm5, mm6, mm7,

    // SSE
    xmm0, xmm1, xmm2, xmm3, xmm4, xmm5, xmm6, xmm7,
    xmm8, xmm9, xmm10, xmm11, xmm12, xmm13, xmm14, xmm15,

    // debug registers
    dr0, dr1, dr2, dr3, dr4, dr5, dr6, dr7,
}

impl RegisterId {
    /// Debug register by index, used when walking DR0..DR7.
    pub(crate) fn dr(index: usize) -> RegisterId {
        match index {
            0 => RegisterId::dr0,
            1 => RegisterId::dr1,
            2 => RegisterId::dr2,
            3 => RegisterId::dr3,
            4 => RegisterId::dr4,
            5 => RegisterId::dr5,
            6 => RegisterId::dr6,
            7 => RegisterId::dr7,
            _ => panic!("no such debug register: dr{index}"),
        }
    }
}

macro_rules! gpr_offset {
    ($field:ident) => {
        offset_of!(user, regs) + offset_of!(user_regs_struct, $field)
    };
}

macro_rules! fpr_offset {
    ($field:ident) => {
        offset_of!(user, i387) + offset_of!(user_fpregs_struct, $field)
    };
}

static REGISTER_INFOS: LazyLock<Vec<RegisterInfo>> = LazyLock::new(|| {
    let mut infos: Vec<RegisterInfo> = Vec::with_capacity(128);

    macro_rules! push {
        ($id:ident, $dwarf:expr, $offset:expr, $size:expr, $type:ident, $format:ident) => {
            infos.push(RegisterInfo {
                register: RegisterId::$id,
                name: stringify!($id),
                dwarf_id: $dwarf,
                offset: $offset,
                size: $size,
                register_type: RegisterType::$type,
                format: RegisterFormat::$format,
            })
        };
    }
    macro_rules! gpr64 {
        ($id:ident, $dwarf:expr) => {
            push!($id, $dwarf, gpr_offset!($id), 8, Gpr, Uint)
        };
    }
    macro_rules! gpr32 {
        ($id:ident, $super:ident) => {
            push!($id, -1, gpr_offset!($super), 4, SubGpr, Uint)
        };
    }
    macro_rules! gpr16 {
        ($id:ident, $super:ident) => {
            push!($id, -1, gpr_offset!($super), 2, SubGpr, Uint)
        };
    }
    macro_rules! gpr8h {
        ($id:ident, $super:ident) => {
            push!($id, -1, gpr_offset!($super) + 1, 1, SubGpr, Uint)
        };
    }
    macro_rules! gpr8l {
        ($id:ident, $super:ident) => {
            push!($id, -1, gpr_offset!($super), 1, SubGpr, Uint)
        };
    }
    macro_rules! fpr {
        ($id:ident, $dwarf:expr, $field:ident, $size:expr) => {
            push!($id, $dwarf, fpr_offset!($field), $size, Fpr, Uint)
        };
    }
    macro_rules! fp_st {
        ($id:ident, $n:expr) => {
            push!($id, 33 + $n, fpr_offset!(st_space) + 16 * $n, 16, Fpr, LongDouble)
        };
    }
    macro_rules! fp_mm {
        ($id:ident, $n:expr) => {
            push!($id, 41 + $n, fpr_offset!(st_space) + 16 * $n, 8, Fpr, Vector)
        };
    }
    macro_rules! fp_xmm {
        ($id:ident, $n:expr) => {
            push!($id, 17 + $n, fpr_offset!(xmm_space) + 16 * $n, 16, Fpr, Vector)
        };
    }
    macro_rules! dr {
        ($id:ident, $n:expr) => {
            push!($id, -1, offset_of!(user, u_debugreg) + 8 * $n, 8, Dr, Uint)
        };
    }

    gpr64!(rax, 0);
    gpr64!(rdx, 1);
    gpr64!(rcx, 2);
    gpr64!(rbx, 3);
    gpr64!(rsi, 4);
    gpr64!(rdi, 5);
    gpr64!(rbp, 6);
    gpr64!(rsp, 7);
    gpr64!(r8, 8);
    gpr64!(r9, 9);
    gpr64!(r10, 10);
    gpr64!(r11, 11);
    gpr64!(r12, 12);
    gpr64!(r13, 13);
    gpr64!(r14, 14);
    gpr64!(r15, 15);
    gpr64!(rip, 16);
    gpr64!(eflags, 49);
    gpr64!(cs, 51);
    gpr64!(fs, 54);
    gpr64!(gs, 55);
    gpr64!(ss, 52);
    gpr64!(ds, 53);
    gpr64!(es, 50);
    gpr64!(orig_rax, -1);

    gpr32!(eax, rax);
    gpr32!(edx, rdx);
    gpr32!(ecx, rcx);
    gpr32!(ebx, rbx);
    gpr32!(esi, rsi);
    gpr32!(edi, rdi);
    gpr32!(ebp, rbp);
    gpr32!(esp, rsp);
    gpr32!(r8d, r8);
    gpr32!(r9d, r9);
    gpr32!(r10d, r10);
    gpr32!(r11d, r11);
    gpr32!(r12d, r12);
    gpr32!(r13d, r13);
    gpr32!(r14d, r14);
    gpr32!(r15d, r15);

    gpr16!(ax, rax);
    gpr16!(dx, rdx);
    gpr16!(cx, rcx);
    gpr16!(bx, rbx);
    gpr16!(si, rsi);
    gpr16!(di, rdi);
    gpr16!(bp, rbp);
    gpr16!(sp, rsp);
    gpr16!(r8w, r8);
    gpr16!(r9w, r9);
    gpr16!(r10w, r10);
    gpr16!(r11w, r11);
    gpr16!(r12w, r12);
    gpr16!(r13w, r13);
    gpr16!(r14w, r14);
    gpr16!(r15w, r15);

    gpr8h!(ah, rax);
    gpr8h!(dh, rdx);
    gpr8h!(ch, rcx);
    gpr8h!(bh, rbx);

    gpr8l!(al, rax);
    gpr8l!(dl, rdx);
    gpr8l!(cl, rcx);
    gpr8l!(bl, rbx);
    gpr8l!(sil, rsi);
    gpr8l!(dil, rdi);
    gpr8l!(bpl, rbp);
    gpr8l!(spl, rsp);
    gpr8l!(r8b, r8);
    gpr8l!(r9b, r9);
    gpr8l!(r10b, r10);
    gpr8l!(r11b, r11);
    gpr8l!(r12b, r12);
    gpr8l!(r13b, r13);
    gpr8l!(r14b, r14);
    gpr8l!(r15b, r15);

    fpr!(fcw, 65, cwd, 2);
    fpr!(fsw, 66, swd, 2);
    fpr!(ftw, -1, ftw, 2);
    fpr!(fop, -1, fop, 2);
    fpr!(frip, -1, rip, 8);
    fpr!(frdp, -1, rdp, 8);
    fpr!(mxcsr, 64, mxcsr, 4);
    fpr!(mxcsrmask, -1, mxcr_mask, 4);

    fp_st!(st0, 0);
    fp_st!(st1, 1);
    fp_st!(st2, 2);
    fp_st!(st3, 3);
    fp_st!(st4, 4);
    fp_st!(st5, 5);
    fp_st!(st6, 6);
    fp_st!(st7, 7);

    fp_mm!(mm0, 0);
    fp_mm!(mm1, 1);
    fp_mm!(mm2, 2);
    fp_mm!(mm3, 3);
    fp_mm!(mm4, 4);
    fp_mm!(mm5, 5);
    fp_mm!(mm6, 6);
    fp_mm!(mm7, 7);

    fp_xmm!(xmm0, 0);
    fp_xmm!(xmm1, 1);
    fp_xmm!(xmm2, 2);
    fp_xmm!(xmm3, 3);
    fp_xmm!(xmm4, 4);
    fp_xmm!(xmm5, 5);
    fp_xmm!(xmm6, 6);
    fp_xmm!(xmm7, 7);
    fp_xmm!(xmm8, 8);
    fp_xmm!(xmm9, 9);
    fp_xmm!(xmm10, 10);
    fp_xmm!(xmm11, 11);
    fp_xmm!(xmm12, 12);
    fp_xmm!(xmm13, 13);
    fp_xmm!(xmm14, 14);
    fp_xmm!(xmm15, 15);

    dr!(dr0, 0);
    dr!(dr1, 1);
    dr!(dr2, 2);
    dr!(dr3, 3);
    dr!(dr4, 4);
    dr!(dr5, 5);
    dr!(dr6, 6);
    dr!(dr7, 7);

    infos
});

static INFO_INDEX_BY_ID: LazyLock<HashMap<RegisterId, usize>> = LazyLock::new(|| {
    REGISTER_INFOS
        .iter()
        .enumerate()
        .map(|(index, info)| (info.register, index))
        .collect()
});

/// The full descriptor table.
pub fn register_infos() -> &'static [RegisterInfo] {
    &REGISTER_INFOS
}

pub fn register_info_by_id(id: RegisterId) -> &'static RegisterInfo {
    let index = INFO_INDEX_BY_ID
        .get(&id)
        .unwrap_or_else(|| panic!("missing register info: {id:?}"));
    &REGISTER_INFOS[*index]
}

/// Linear scan by user-visible name.
pub fn register_info_by_name(name: &str) -> Result<&'static RegisterInfo> {
    REGISTER_INFOS
        .iter()
        .find(|info| info.name == name)
        .ok_or_else(|| Error::InvalidRegister(name.to_string()))
}
