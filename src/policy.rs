use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use nix::unistd::{access, AccessFlags};
use tracing::{debug, info};

use crate::error::{DenyReason, ShellError};

pub const DEFAULT_ALLOWED_DIRS: [&str; 3] = ["/usr/bin/", "/bin/", "/opt/"];
pub const DEFAULT_BLACKLIST_FILE: &str = "blacklist.txt";

/// Execution gate: a command runs only if it is not blacklisted by name and
/// an executable of that name sits directly inside one of the allowed
/// directories.
#[derive(Debug, Clone)]
pub struct SecurityPolicy {
	allowed_dirs: Vec<PathBuf>,
	blacklist: HashSet<String>,
	blacklist_file: PathBuf,
}

pub fn load_blacklist(path: &Path) -> Result<HashSet<String>, ShellError> {
	let content = fs::read_to_string(path).map_err(|source| ShellError::Blacklist {
		path: path.to_path_buf(),
		source,
	})?;
	Ok(content.lines()
		.map(str::trim)
		.filter(|l| !l.is_empty())
		.map(str::to_string)
		.collect())
}

fn is_executable_file(path: &Path) -> bool {
	match fs::metadata(path) {
		Ok(meta) => meta.is_file() && access(path, AccessFlags::X_OK).is_ok(),
		Err(_) => false,
	}
}

impl SecurityPolicy {
	/// Policy with an empty blacklist; call `reload` to read the file.
	pub fn new(allowed_dirs: Vec<PathBuf>, blacklist_file: PathBuf) -> SecurityPolicy {
		SecurityPolicy { allowed_dirs, blacklist: HashSet::new(), blacklist_file }
	}

	/// Re-reads the blacklist file. On failure the blacklist is left empty
	/// and the error is returned for reporting.
	pub fn reload(&mut self) -> Result<usize, ShellError> {
		match load_blacklist(&self.blacklist_file) {
			Ok(names) => {
				info!(path = %self.blacklist_file.display(), entries = names.len(), "blacklist loaded");
				self.blacklist = names;
				Ok(self.blacklist.len())
			},
			Err(e) => {
				self.blacklist = HashSet::new();
				Err(e)
			},
		}
	}

	pub fn allowed_dirs(&self) -> &[PathBuf] {
		&self.allowed_dirs
	}

	pub fn blacklist_len(&self) -> usize {
		self.blacklist.len()
	}

	pub fn is_blacklisted(&self, name: &OsStr) -> bool {
		name.to_str().map_or(false, |n| self.blacklist.contains(n))
	}

	/// Returns the absolute path that will be executed for `name`.
	pub fn resolve<S: AsRef<OsStr>>(&self, name: S) -> Result<PathBuf, ShellError> {
		let name = name.as_ref();
		let command = name.to_string_lossy();
		if self.is_blacklisted(name) {
			debug!(command = %command, "denied: blacklisted");
			return Err(ShellError::denied(name, DenyReason::Blacklisted));
		}
		if name.is_empty() || name == "." || name == ".." || name.as_bytes().contains(&b'/') {
			debug!(command = %command, "denied: not a bare command name");
			return Err(ShellError::denied(name, DenyReason::NotPermitted));
		}
		for dir in &self.allowed_dirs {
			let candidate = dir.join(name);
			if is_executable_file(&candidate) {
				debug!(command = %command, path = %candidate.display(), "allowed");
				return Ok(candidate);
			}
		}
		debug!(command = %command, "denied: not found in allowed directories");
		Err(ShellError::denied(name, DenyReason::NotPermitted))
	}

	pub fn is_allowed<S: AsRef<OsStr>>(&self, name: S) -> bool {
		self.resolve(name).is_ok()
	}
}
