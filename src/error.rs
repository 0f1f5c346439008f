use std::{ffi, fmt, io};
use std::ffi::OsStr;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DenyReason { Blacklisted, NotPermitted }

impl fmt::Display for DenyReason {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match *self {
			DenyReason::Blacklisted => write!(f, "Command is blacklisted"),
			DenyReason::NotPermitted => write!(f, "Command not permitted"),
		}
	}
}

/// Everything that can abort the evaluation of one input line.
/// None of these end the shell itself.
#[derive(Debug, Error)]
pub enum ShellError {
	#[error("{reason}: {command}")]
	SecurityDenied { command: String, reason: DenyReason },

	#[error("{0}")]
	Redirection(String),

	#[error("Failed to create pipe: {0}")]
	PipeAllocation(#[source] nix::Error),

	#[error("Fork failed: {0}")]
	Spawn(#[source] nix::Error),

	#[error("{0}")]
	CommandFailed(String),

	#[error("Wait failed: {0}")]
	Wait(#[source] nix::Error),

	#[error("Argument contains a NUL byte: {0}")]
	Nul(#[from] ffi::NulError),

	#[error("{0}")]
	Unsupported(&'static str),

	#[error("{0}")]
	Usage(String),

	#[error("{0}")]
	Builtin(String),

	#[error("I/O error: {0}")]
	Io(#[from] io::Error),

	#[error("Failed to open blacklist file {}: {source}", .path.display())]
	Blacklist { path: PathBuf, source: io::Error },
}

impl ShellError {
	pub fn denied<S: AsRef<OsStr>>(command: S, reason: DenyReason) -> ShellError {
		ShellError::SecurityDenied { command: command.as_ref().to_string_lossy().into_owned(), reason }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn messages_match_user_facing_wording() {
		assert_eq!(ShellError::denied("rm", DenyReason::Blacklisted).to_string(), "Command is blacklisted: rm");
		assert_eq!(ShellError::denied("nc", DenyReason::NotPermitted).to_string(), "Command not permitted: nc");
		assert_eq!(ShellError::PipeAllocation(nix::Error::EMFILE).to_string(),
			format!("Failed to create pipe: {}", nix::Error::EMFILE));
	}
}
