#![cfg(target_os = "linux")]


use extended::Extended;
use fixtures::fixture_path;
use rdbg::pipe::Pipe;
use rdbg::process::register_info::{RegisterId, RegisterValue};
use rdbg::process::Process;

fn read_stdout(channel: &mut Pipe) -> String {
    let chunk = channel.read().expect("pipe read failed");
    String::from_utf8(chunk).expect("fixture output should be UTF-8")
}

#[test]
fn written_registers_reach_the_inferior() {
    let mut channel = Pipe::new(false).expect("pipe creation failed");
    let mut proc = Process::launch(&fixture_path("reg_write"), true, channel.get_write())
        .expect("launch should succeed");
    channel.close_write();

    // First stop: the trap before the fixture samples rsi.
    proc.resume().expect("resume should succeed");
    proc.wait_on_signal().expect("wait should succeed");

    proc.registers_mut()
        .write_by_id(RegisterId::rsi, RegisterValue::U64(0xcafecafe))
        .expect("rsi write should succeed");
    proc.resume().expect("resume should succeed");
    proc.wait_on_signal().expect("wait should succeed");
    assert_eq!(read_stdout(&mut channel), "0xcafecafe");

    proc.registers_mut()
        .write_by_id(RegisterId::mm0, RegisterValue::U64(0xba5eba11))
        .expect("mm0 write should succeed");
    proc.resume().expect("resume should succeed");
    proc.wait_on_signal().expect("wait should succeed");
    assert_eq!(read_stdout(&mut channel), "0xba5eba11");

    proc.registers_mut()
        .write_by_id(RegisterId::xmm0, RegisterValue::Double(42.24))
        .expect("xmm0 write should succeed");
    proc.resume().expect("resume should succeed");
    proc.wait_on_signal().expect("wait should succeed");
    assert_eq!(read_stdout(&mut channel), "42.24");

    // st0 only becomes observable once the status word's TOP field and the
    // tag word mark the slot valid.
    proc.registers_mut()
        .write_by_id(
            RegisterId::st0,
            RegisterValue::LongDouble(Extended::from(42.24f64)),
        )
        .expect("st0 write should succeed");
    proc.registers_mut()
        .write_by_id(RegisterId::fsw, RegisterValue::U16(0b0011100000000000))
        .expect("fsw write should succeed");
    proc.registers_mut()
        .write_by_id(RegisterId::ftw, RegisterValue::U16(0b0011111111111111))
        .expect("ftw write should succeed");
    proc.resume().expect("resume should succeed");
    proc.wait_on_signal().expect("wait should succeed");
    assert_eq!(read_stdout(&mut channel), "42.24");
}

#[test]
fn registers_read_back_from_the_inferior() {
    let mut proc = Process::launch(&fixture_path("reg_read"), true, None)
        .expect("launch should succeed");

    proc.resume().expect("resume should succeed");
    proc.wait_on_signal().expect("wait should succeed");
    assert_eq!(
        proc.registers()
            .read_by_id_as::<u64>(RegisterId::r13)
            .unwrap(),
        0xcafecafe
    );

    proc.resume().expect("resume should succeed");
    proc.wait_on_signal().expect("wait should succeed");
    assert_eq!(
        proc.registers()
            .read_by_id_as::<u8>(RegisterId::r13b)
            .unwrap(),
        42
    );

    proc.resume().expect("resume should succeed");
    proc.wait_on_signal().expect("wait should succeed");
    assert_eq!(
        proc.registers()
            .read_by_id_as::<[u8; 8]>(RegisterId::mm0)
            .unwrap(),
        0xba5eba11u64.to_le_bytes()
    );

    proc.resume().expect("resume should succeed");
    proc.wait_on_signal().expect("wait should succeed");
    let xmm0 = proc
        .registers()
        .read_by_id_as::<[u8; 16]>(RegisterId::xmm0)
        .unwrap();
    assert_eq!(xmm0[..8], 64.125f64.to_le_bytes());

    proc.resume().expect("resume should succeed");
    proc.wait_on_signal().expect("wait should succeed");
    let st0 = proc
        .registers()
        .read_by_id_as::<Extended>(RegisterId::st0)
        .unwrap();
    assert_eq!(st0.to_f64(), 64.125);
}

#[test]
fn debug_register_writes_reach_the_kernel() {
    let mut proc = Process::launch(&fixture_path("run_endlessly"), true, None)
        .expect("launch should succeed");

    proc.registers_mut()
        .write_by_id(RegisterId::dr0, RegisterValue::U64(0x1000))
        .expect("dr0 write should succeed");

    // Stepping forces a full mirror refresh from the kernel.
    proc.step_instruction().expect("step should succeed");
    assert_eq!(
        proc.registers()
            .read_by_id_as::<u64>(RegisterId::dr0)
            .unwrap(),
        0x1000
    );
}
