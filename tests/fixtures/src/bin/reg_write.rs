//! Trap-and-print inferior: at each trap the debugger writes a register,
//! which this program then prints for verification.

use std::arch::asm;
use std::io::{self, Write};

fn emit(text: String) {
    print!("{text}");
    io::stdout().flush().expect("flush failed");
}

fn main() {
    // rsi, printed as hex
    let rsi: u64;
    unsafe { asm!("int3", out("rsi") rsi) };
    emit(format!("{rsi:#x}"));

    // mm0, moved out through a general-purpose register
    let mm0: u64;
    unsafe { asm!("int3", "movq {0}, mm0", "emms", out(reg) mm0) };
    emit(format!("{mm0:#x}"));

    // xmm0 as a double
    let xmm0: f64;
    unsafe { asm!("int3", out("xmm0") xmm0) };
    emit(format!("{xmm0}"));

    // st0, rounded through a double on the way out
    let mut st0 = 0.0f64;
    unsafe { asm!("int3", "fstp qword ptr [{0}]", in(reg) &mut st0 as *mut f64) };
    emit(format!("{st0}"));
}
