use std::path::PathBuf;

use clap::Parser;

use crate::policy::{self, SecurityPolicy};

/// A restricted interactive shell.
///
/// Only executables found directly inside one of the allowed directories may
/// run, and names listed in the blacklist file are refused even then.
#[derive(Parser, Debug)]
#[command(name = "secsh", version, about, long_about = None)]
pub struct Cli {
	/// Blacklist file, one command name per line.
	#[arg(short = 'b', long = "blacklist", value_name = "PATH", default_value = policy::DEFAULT_BLACKLIST_FILE)]
	pub blacklist: PathBuf,

	/// Directory executables may be run from (repeatable, checked in order).
	#[arg(short = 'a', long = "allow-dir", value_name = "DIR", default_values = policy::DEFAULT_ALLOWED_DIRS)]
	pub allow_dirs: Vec<PathBuf>,

	/// Increase log verbosity (-v info, -vv debug, -vvv trace).
	#[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
	pub verbose: u8,
}

impl Cli {
	pub fn policy(&self) -> SecurityPolicy {
		SecurityPolicy::new(self.allow_dirs.clone(), self.blacklist.clone())
	}
}
