//! Set-and-trap inferior: loads known values into registers and traps so the
//! debugger can read them back.

use std::arch::asm;

fn main() {
    // r13 at full width
    unsafe { asm!("mov r13, 0xcafecafe", "int3", out("r13") _) };

    // only the low byte
    unsafe { asm!("mov r13b, 42", "int3", out("r13") _) };

    // mm0, loaded through a general-purpose register
    unsafe { asm!("movq mm0, {0}", "int3", "emms", in(reg) 0xba5eba11u64) };

    // xmm0 as a double
    unsafe { asm!("int3", in("xmm0") 64.125f64) };

    // st0, pushed from memory
    let st0 = 64.125f64;
    unsafe { asm!("fld qword ptr [{0}]", "int3", "fstp st(0)", in(reg) &st0 as *const f64) };
}
