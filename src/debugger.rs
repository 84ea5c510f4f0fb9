//! Line-oriented command front-end.
//!
//! Commands may be abbreviated to any unambiguous prefix, mirroring the
//! usual debugger convention (`c` for `continue`, `b s` for
//! `breakpoint set`, ...).

use anyhow::{anyhow, bail, Result};
use extended::Extended;
use nix::sys::signal::Signal;

use crate::parse::{parse_float, parse_integer, parse_vector};
use crate::process::register_info::{
    register_info_by_name, register_infos, RegisterFormat, RegisterInfo, RegisterType,
    RegisterValue,
};
use crate::process::stoppoint::{StoppointId, VirtAddr};
use crate::process::{Process, ProcessState, StopReason};

/// Whether the command loop should keep going after a command.
pub enum Outcome {
    KeepGoing,
    Exit,
}

pub fn handle_command(process: &mut Process, line: &str) -> Result<Outcome> {
    let args: Vec<&str> = line.split_whitespace().collect();
    let Some(&command) = args.first() else {
        return Ok(Outcome::KeepGoing);
    };

    if is_prefix(command, "continue") {
        process.resume()?;
        let reason = process.wait_on_signal()?;
        print_stop_reason(process, reason)?;
    } else if is_prefix(command, "step") {
        let reason = process.step_instruction()?;
        print_stop_reason(process, reason)?;
    } else if is_prefix(command, "register") {
        handle_register_command(process, &args)?;
    } else if is_prefix(command, "breakpoint") {
        handle_breakpoint_command(process, &args)?;
    } else if is_prefix(command, "help") {
        print_help(&args);
    } else if is_prefix(command, "quit") {
        return Ok(Outcome::Exit);
    } else {
        bail!("unknown command: {command}");
    }
    Ok(Outcome::KeepGoing)
}

fn is_prefix(candidate: &str, of: &str) -> bool {
    !candidate.is_empty() && of.starts_with(candidate)
}

fn print_stop_reason(process: &Process, reason: StopReason) -> Result<()> {
    let message = match reason.reason {
        ProcessState::Exited => format!("exited with status {}", reason.info),
        ProcessState::Terminated => {
            format!("terminated with signal {}", signal_name(reason.info))
        }
        ProcessState::Stopped => format!(
            "stopped with signal {} at {}",
            signal_name(reason.info),
            process.get_pc()?
        ),
        ProcessState::Running => bail!("process is not stopped"),
    };
    println!("Process {} {}", process.pid(), message);
    Ok(())
}

fn signal_name(signo: u8) -> &'static str {
    Signal::try_from(i32::from(signo))
        .map(Signal::as_str)
        .unwrap_or("UNKNOWN")
}

fn handle_register_command(process: &mut Process, args: &[&str]) -> Result<()> {
    if args.len() < 2 {
        print_help(&["help", "register"]);
        return Ok(());
    }
    if is_prefix(args[1], "read") {
        handle_register_read(process, args)
    } else if is_prefix(args[1], "write") {
        handle_register_write(process, args)
    } else {
        print_help(&["help", "register"]);
        Ok(())
    }
}

fn handle_register_read(process: &Process, args: &[&str]) -> Result<()> {
    if args.len() == 2 || (args.len() == 3 && args[2] == "all") {
        let all = args.len() == 3;
        for info in register_infos() {
            let should_print =
                (all || info.register_type == RegisterType::Gpr) && info.name != "orig_rax";
            if !should_print {
                continue;
            }
            let value = process.registers().read(info);
            println!("{}:\t{}", info.name, format_value(value));
        }
        Ok(())
    } else if args.len() == 3 {
        let info = register_info_by_name(args[2])?;
        let value = process.registers().read(info);
        println!("{}:\t{}", info.name, format_value(value));
        Ok(())
    } else {
        print_help(&["help", "register"]);
        Ok(())
    }
}

fn handle_register_write(process: &mut Process, args: &[&str]) -> Result<()> {
    if args.len() != 4 {
        print_help(&["help", "register"]);
        return Ok(());
    }
    let info = register_info_by_name(args[2])?;
    let value = parse_register_value(info, args[3])?;
    process.registers_mut().write(info, value)?;
    Ok(())
}

fn parse_register_value(info: &RegisterInfo, text: &str) -> Result<RegisterValue> {
    let value = match info.format {
        RegisterFormat::Uint => match info.size {
            1 => parse_integer::<u8>(text, 16).map(RegisterValue::U8),
            2 => parse_integer::<u16>(text, 16).map(RegisterValue::U16),
            4 => parse_integer::<u32>(text, 16).map(RegisterValue::U32),
            8 => parse_integer::<u64>(text, 16).map(RegisterValue::U64),
            _ => None,
        },
        RegisterFormat::DoubleFloat => parse_float::<f64>(text).map(RegisterValue::Double),
        RegisterFormat::LongDouble => {
            parse_float::<f64>(text).map(|v| RegisterValue::LongDouble(Extended::from(v)))
        }
        RegisterFormat::Vector => match info.size {
            8 => parse_vector::<8>(text).map(RegisterValue::Byte64),
            16 => parse_vector::<16>(text).map(RegisterValue::Byte128),
            _ => None,
        },
    };
    value.ok_or_else(|| anyhow!("invalid format for register {}", info.name))
}

fn format_value(value: RegisterValue) -> String {
    match value {
        RegisterValue::U8(v) => format!("{v:#04x}"),
        RegisterValue::U16(v) => format!("{v:#06x}"),
        RegisterValue::U32(v) => format!("{v:#010x}"),
        RegisterValue::U64(v) => format!("{v:#018x}"),
        RegisterValue::Double(v) => format!("{v}"),
        RegisterValue::LongDouble(v) => format!("{}", v.to_f64()),
        RegisterValue::Byte64(bytes) => format_vector(&bytes),
        RegisterValue::Byte128(bytes) => format_vector(&bytes),
    }
}

fn format_vector(bytes: &[u8]) -> String {
    let elements: Vec<String> = bytes.iter().map(|b| format!("{b:#04x}")).collect();
    format!("[{}]", elements.join(","))
}

fn handle_breakpoint_command(process: &mut Process, args: &[&str]) -> Result<()> {
    if args.len() < 2 {
        print_help(&["help", "breakpoint"]);
        return Ok(());
    }
    let command = args[1];

    if is_prefix(command, "list") {
        if process.breakpoint_sites().is_empty() {
            println!("No breakpoints set");
        } else {
            println!("Current breakpoints:");
            for site in process.breakpoint_sites().iter() {
                println!(
                    "{}: address = {}, {}",
                    site.id(),
                    site.address(),
                    if site.is_enabled() { "enabled" } else { "disabled" }
                );
            }
        }
        return Ok(());
    }

    if args.len() < 3 {
        print_help(&["help", "breakpoint"]);
        return Ok(());
    }

    if is_prefix(command, "set") {
        let address = parse_integer::<u64>(args[2], 16).ok_or_else(|| {
            anyhow!("breakpoint command expects an address in hexadecimal, prefixed with '0x'")
        })?;
        process
            .create_breakpoint_site(VirtAddr::new(address))?
            .enable()?;
        return Ok(());
    }

    let id = parse_integer::<u32>(args[2], 10)
        .map(StoppointId)
        .ok_or_else(|| anyhow!("command expects a breakpoint id"))?;
    if is_prefix(command, "enable") {
        process.breakpoint_sites_mut().get_by_id_mut(id)?.enable()?;
    } else if is_prefix(command, "disable") {
        process.breakpoint_sites_mut().get_by_id_mut(id)?.disable()?;
    } else if is_prefix(command, "delete") {
        process.breakpoint_sites_mut().remove_by_id(id)?;
    } else {
        print_help(&["help", "breakpoint"]);
    }
    Ok(())
}

fn print_help(args: &[&str]) {
    if args.len() == 1 {
        eprintln!(
            "Available commands:
breakpoint  - Commands for operating on breakpoints
continue    - Resume the process
register    - Commands for operating on registers
step        - Step over a single instruction
quit        - Exit the debugger"
        );
    } else if is_prefix(args[1], "register") {
        eprintln!(
            "Available commands:
read
read <register>
read all
write <register> <value>"
        );
    } else if is_prefix(args[1], "breakpoint") {
        eprintln!(
            "Available commands:
list
delete <id>
disable <id>
enable <id>
set <address>"
        );
    }
}
