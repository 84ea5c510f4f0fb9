#![cfg(target_os = "linux")]


use std::path::Path;

use elf::endian::AnyEndian;
use elf::ElfBytes;
use fixtures::fixture_path;
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use procfs::process::MMPermissions;
use rdbg::pipe::Pipe;
use rdbg::process::stoppoint::{StoppointId, VirtAddr};
use rdbg::process::{Process, ProcessState};
use rdbg::Error;

/// File offset of the ELF entry point: the entry address minus the load bias
/// of the section containing it.
fn entry_point_offset(path: &Path) -> u64 {
    let data = std::fs::read(path).expect("could not read fixture binary");
    let file = ElfBytes::<AnyEndian>::minimal_parse(&data).expect("could not parse ELF");
    let text = file
        .section_header_by_name(".text")
        .expect("could not walk section headers")
        .expect("fixture should have a .text section");
    let load_bias = text.sh_addr - text.sh_offset;
    file.ehdr.e_entry - load_bias
}

/// Where the entry point landed in the inferior's address space, from the
/// first executable mapping in /proc/<pid>/maps.
fn entry_load_address(pid: Pid, entry_offset: u64) -> VirtAddr {
    let maps = procfs::process::Process::new(pid.as_raw())
        .expect("could not open proc entry")
        .maps()
        .expect("could not read memory maps");
    let map = maps
        .iter()
        .find(|m| m.perms.contains(MMPermissions::EXECUTE))
        .expect("inferior should have an executable mapping");
    VirtAddr::new(map.address.0 + entry_offset - map.offset)
}

#[test]
fn creates_a_breakpoint_site() {
    let mut proc = Process::launch(&fixture_path("run_endlessly"), true, None)
        .expect("launch should succeed");
    let site = proc
        .create_breakpoint_site(VirtAddr::new(42))
        .expect("site creation should succeed");
    assert_eq!(site.address().addr(), 42);
}

#[test]
fn site_ids_increase() {
    let mut proc = Process::launch(&fixture_path("run_endlessly"), true, None)
        .expect("launch should succeed");

    let first = proc.create_breakpoint_site(VirtAddr::new(42)).unwrap().id();
    assert_eq!(proc.create_breakpoint_site(VirtAddr::new(43)).unwrap().id(), StoppointId(first.0 + 1));
    assert_eq!(proc.create_breakpoint_site(VirtAddr::new(44)).unwrap().id(), StoppointId(first.0 + 2));
    assert_eq!(proc.create_breakpoint_site(VirtAddr::new(45)).unwrap().id(), StoppointId(first.0 + 3));
}

#[test]
fn duplicate_address_is_rejected() {
    let mut proc = Process::launch(&fixture_path("run_endlessly"), true, None)
        .expect("launch should succeed");
    proc.create_breakpoint_site(VirtAddr::new(42)).unwrap();
    assert!(matches!(
        proc.create_breakpoint_site(VirtAddr::new(42)),
        Err(Error::DuplicateBreakpoint(_))
    ));
}

#[test]
fn finds_sites_by_id_and_address() {
    let mut proc = Process::launch(&fixture_path("run_endlessly"), true, None)
        .expect("launch should succeed");
    for address in [42, 43, 44, 45] {
        proc.create_breakpoint_site(VirtAddr::new(address)).unwrap();
    }

    let sites = proc.breakpoint_sites();
    assert!(sites.contains_address(VirtAddr::new(44)));
    let s1 = sites.get_by_address(VirtAddr::new(44)).unwrap();
    assert_eq!(s1.address().addr(), 44);

    let next = StoppointId(s1.id().0 + 1);
    assert!(sites.contains_id(next));
    let s2 = sites.get_by_id(next).unwrap();
    assert_eq!(s2.id(), next);
    assert_eq!(s2.address().addr(), 45);
}

#[test]
fn missing_sites_are_not_found() {
    let proc = Process::launch(&fixture_path("run_endlessly"), true, None)
        .expect("launch should succeed");
    assert!(matches!(
        proc.breakpoint_sites().get_by_address(VirtAddr::new(44)),
        Err(Error::NoSuchBreakpoint)
    ));
    assert!(matches!(
        proc.breakpoint_sites().get_by_id(StoppointId(44)),
        Err(Error::NoSuchBreakpoint)
    ));
}

#[test]
fn tracks_size_and_emptiness() {
    let mut proc = Process::launch(&fixture_path("run_endlessly"), true, None)
        .expect("launch should succeed");
    assert!(proc.breakpoint_sites().is_empty());
    assert_eq!(proc.breakpoint_sites().size(), 0);

    proc.create_breakpoint_site(VirtAddr::new(42)).unwrap();
    assert!(!proc.breakpoint_sites().is_empty());
    assert_eq!(proc.breakpoint_sites().size(), 1);

    proc.create_breakpoint_site(VirtAddr::new(43)).unwrap();
    assert_eq!(proc.breakpoint_sites().size(), 2);
}

#[test]
fn iterates_sites_in_insertion_order() {
    let mut proc = Process::launch(&fixture_path("run_endlessly"), true, None)
        .expect("launch should succeed");
    for address in [42, 43, 44, 45] {
        proc.create_breakpoint_site(VirtAddr::new(address)).unwrap();
    }

    let addresses: Vec<u64> = proc
        .breakpoint_sites()
        .iter()
        .map(|site| site.address().addr())
        .collect();
    assert_eq!(addresses, vec![42, 43, 44, 45]);
}

#[test]
fn removes_sites() {
    let mut proc = Process::launch(&fixture_path("run_endlessly"), true, None)
        .expect("launch should succeed");
    let id = proc.create_breakpoint_site(VirtAddr::new(42)).unwrap().id();
    proc.create_breakpoint_site(VirtAddr::new(43)).unwrap();
    assert_eq!(proc.breakpoint_sites().size(), 2);

    proc.breakpoint_sites_mut().remove_by_id(id).unwrap();
    proc.breakpoint_sites_mut()
        .remove_by_address(VirtAddr::new(43))
        .unwrap();
    assert!(proc.breakpoint_sites().is_empty());
}

#[test]
fn enable_then_disable_restores_the_original_byte() {
    let mut proc = Process::launch(&fixture_path("run_endlessly"), true, None)
        .expect("launch should succeed");
    let pc = proc.get_pc().expect("pc should be readable while stopped");
    let original = proc.read_memory(pc, 1).unwrap()[0];

    proc.create_breakpoint_site(pc).unwrap().enable().unwrap();
    assert_eq!(proc.read_memory(pc, 1).unwrap()[0], 0xCC);

    proc.breakpoint_sites_mut()
        .get_by_address_mut(pc)
        .unwrap()
        .disable()
        .unwrap();
    assert_eq!(proc.read_memory(pc, 1).unwrap()[0], original);
}

#[test]
fn breakpoint_on_entry_stops_and_resumes() {
    let path = fixture_path("hello_rdbg");
    let mut channel = Pipe::new(false).expect("pipe creation failed");
    let mut proc =
        Process::launch(&path, true, channel.get_write()).expect("launch should succeed");
    channel.close_write();

    let entry = entry_load_address(proc.pid(), entry_point_offset(&path));
    proc.create_breakpoint_site(entry).unwrap().enable().unwrap();

    proc.resume().expect("resume should succeed");
    let reason = proc.wait_on_signal().expect("wait should succeed");
    assert_eq!(reason.reason, ProcessState::Stopped);
    assert_eq!(reason.info, Signal::SIGTRAP as u8);
    assert_eq!(proc.get_pc().unwrap(), entry);

    proc.resume().expect("resume should succeed");
    let reason = proc.wait_on_signal().expect("wait should succeed");
    assert_eq!(reason.reason, ProcessState::Exited);
    assert_eq!(reason.info, 0);

    let output = channel.read().expect("pipe read failed");
    assert_eq!(String::from_utf8_lossy(&output), "Hello, rdbg!\n");
}

#[test]
fn step_over_a_breakpoint_keeps_it_enabled() {
    let path = fixture_path("hello_rdbg");
    let mut proc = Process::launch(&path, true, None).expect("launch should succeed");

    let entry = entry_load_address(proc.pid(), entry_point_offset(&path));
    proc.create_breakpoint_site(entry).unwrap().enable().unwrap();

    proc.resume().expect("resume should succeed");
    proc.wait_on_signal().expect("wait should succeed");
    assert_eq!(proc.get_pc().unwrap(), entry);

    let reason = proc.step_instruction().expect("step should succeed");
    assert_eq!(reason.reason, ProcessState::Stopped);
    assert_ne!(proc.get_pc().unwrap(), entry);
    assert!(proc
        .breakpoint_sites()
        .get_by_address(entry)
        .unwrap()
        .is_enabled());
}
