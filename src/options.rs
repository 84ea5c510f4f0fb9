use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use nix::unistd::Pid;

#[derive(Clone, Debug, Parser)]
#[command(version, about = "rdbg, a small native debugger")]
pub struct Options {
    /// Attach to an already running process.
    #[arg(short = 'p', long = "pid", conflicts_with = "program")]
    pub pid: Option<i32>,

    /// Program to launch under the debugger.
    pub program: Option<PathBuf>,
}

/// How the debugger should acquire its inferior.
#[derive(Clone, Debug)]
pub enum Target {
    Launch(PathBuf),
    Attach(Pid),
}

impl Options {
    pub fn target(&self) -> Result<Target> {
        match (&self.pid, &self.program) {
            (Some(pid), None) => Ok(Target::Attach(Pid::from_raw(*pid))),
            (None, Some(path)) => Ok(Target::Launch(path.clone())),
            _ => bail!("expected either a program path or --pid"),
        }
    }
}
