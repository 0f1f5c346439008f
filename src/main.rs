mod builtin;
mod cli;
mod error;
mod eval;
mod global;
mod job;
mod parser;
mod policy;
mod redirect;
mod types;
mod ui;


use std::io;
use io::{BufRead, Write};

use anyhow::{Context, Result};
use clap::Parser;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use tracing::{debug, warn};

extern "C" fn on_signal(_: libc::c_int) {
	const NOTICE: &[u8] = b"\nReceived signal. Use 'exit' to quit.\n";
	// only write(2) is safe here
	unsafe {
		libc::write(libc::STDOUT_FILENO, NOTICE.as_ptr() as *const libc::c_void, NOTICE.len());
	}
}

fn install_signal_handlers() -> nix::Result<()> {
	let action = SigAction::new(SigHandler::Handler(on_signal), SaFlags::SA_RESTART, SigSet::empty());
	for sig in [Signal::SIGINT, Signal::SIGTSTP] {
		unsafe { sigaction(sig, &action) }?;
	}
	Ok(())
}

fn init_tracing(verbose: u8) -> Result<()> {
	use tracing_subscriber::{fmt, prelude::*, EnvFilter};

	let filter = match verbose {
		0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
		1 => EnvFilter::new("info"),
		2 => EnvFilter::new("debug"),
		_ => EnvFilter::new("trace"),
	};
	tracing_subscriber::registry()
		.with(fmt::layer().with_writer(io::stderr))
		.with(filter)
		.try_init()
		.context("Failed to initialize tracing subscriber")?;
	Ok(())
}

fn main() -> Result<()> {
	let cli = cli::Cli::parse();
	init_tracing(cli.verbose)?;
	debug!("Parsed CLI arguments: {:?}", cli);

	let mut state = global::State::new(cli.policy());
	if let Err(e) = state.policy.reload() {
		ui::error(&e.to_string());
	}
	install_signal_handlers().context("Failed to install signal handlers")?;

	let mut stdout = io::stdout();
	let stdin = io::stdin();
	let mut stdin_locked = stdin.lock();
	while state.running {
		state.reap_jobs();
		let _ = stdout.write_all(ui::prompt().as_bytes());
		let _ = stdout.flush();

		let mut line: Vec<u8> = vec![];
		match stdin_locked.read_until(b'\n', &mut line) {
			Ok(0) => break,
			Ok(_) => {},
			Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
			Err(e) => {
				warn!(error = %e, "failed to read input");
				break;
			},
		}
		while matches!(line.last(), Some(b'\n') | Some(b'\r')) {
			line.pop();
		}
		state.record_history(&String::from_utf8_lossy(&line));
		if let Err(e) = eval::eval(&mut state, &line) {
			ui::error(&e.to_string());
		}
	}
	Ok(())
}
