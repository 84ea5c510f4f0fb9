use std::io::{self, BufRead, Write};

use anyhow::Result;
use clap::Parser;
use rdbg::debugger::{self, Outcome};
use rdbg::options::{Options, Target};
use rdbg::process::Process;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let options = Options::parse();
    let mut process = match options.target()? {
        Target::Launch(path) => {
            let process = Process::launch(&path, true, None)?;
            println!("Launched process with PID {}", process.pid());
            process
        }
        Target::Attach(pid) => Process::attach(pid)?,
    };

    main_loop(&mut process)
}

fn main_loop(process: &mut Process) -> Result<()> {
    let mut last_line = String::new();
    let stdin = io::stdin();

    loop {
        print!("rdbg> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        // An empty line repeats the previous command.
        let command = match line.trim() {
            "" => last_line.clone(),
            entered => {
                last_line = entered.to_string();
                last_line.clone()
            }
        };
        if command.is_empty() {
            continue;
        }

        match debugger::handle_command(process, &command) {
            Ok(Outcome::KeepGoing) => {}
            Ok(Outcome::Exit) => break,
            Err(err) => eprintln!("{err:#}"),
        }
    }
    Ok(())
}
