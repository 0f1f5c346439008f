use std::ffi::OsString;
use std::fs;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use crate::error::ShellError;
use crate::types::{Redirect, RedirectType, Stage};

const OUTPUT_MODE: u32 = 0o644;

/// A stage with its redirection tokens stripped and the targets opened.
/// Dropping it closes whichever files were opened.
#[derive(Debug)]
pub struct Resolved {
	pub args: Vec<OsString>,
	pub stdin: Option<fs::File>,
	pub stdout: Option<fs::File>,
}

fn take_redirect(args: &mut Vec<OsString>, typ: RedirectType) -> Result<Option<Redirect>, ShellError> {
	let pos = match args.iter().position(|a| a == typ.token()) {
		Some(pos) => pos,
		None => return Ok(None),
	};
	if pos + 1 >= args.len() {
		let side = if typ == RedirectType::Input { "input" } else { "output" };
		return Err(ShellError::Redirection(
			format!("Syntax error: No {} file specified for redirection.", side)));
	}
	let target = args.remove(pos + 1);
	args.remove(pos);
	Ok(Some(Redirect { target, typ }))
}

fn open(redirect: &Redirect) -> Result<fs::File, ShellError> {
	let mut oopt = fs::OpenOptions::new();
	let _ = match redirect.typ {
		RedirectType::Input => oopt.read(true),
		RedirectType::Output => oopt.write(true).create(true).truncate(true).mode(OUTPUT_MODE),
		RedirectType::Append => oopt.append(true).create(true).mode(OUTPUT_MODE),
	};
	oopt.open(&redirect.target).map_err(|e| {
		let side = if redirect.typ == RedirectType::Input { "input" } else { "output" };
		ShellError::Redirection(format!("Failed to open {} file: {} ({})", side, Path::new(&redirect.target).display(), e))
	})
}

pub fn resolve(stage: &Stage) -> Result<Resolved, ShellError> {
	let mut args = stage.args.clone();

	let stdin = match take_redirect(&mut args, RedirectType::Input)? {
		Some(r) => Some(open(&r)?),
		None => None,
	};

	// '>' is looked for first, so it wins when both forms are present
	let output = match take_redirect(&mut args, RedirectType::Output)? {
		Some(r) => Some(r),
		None => take_redirect(&mut args, RedirectType::Append)?,
	};
	// on any error below, `stdin` is dropped and its descriptor closed
	let stdout = match output {
		Some(r) => Some(open(&r)?),
		None => None,
	};

	Ok(Resolved { args, stdin, stdout })
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::{Read, Write};
	use std::os::unix::fs::PermissionsExt;
	use tempfile::TempDir;

	fn stage(args: &[&str]) -> Stage {
		Stage::new(args.iter().map(OsString::from).collect())
	}

	#[test]
	fn no_redirection_passes_through() {
		let r = resolve(&stage(&["ls", "-l"])).unwrap();
		assert_eq!(r.args, vec!["ls", "-l"]);
		assert!(r.stdin.is_none() && r.stdout.is_none());
	}

	#[test]
	fn input_and_output_are_opened_and_stripped() {
		let dir = TempDir::new().unwrap();
		let input = dir.path().join("in.txt");
		let output = dir.path().join("out.txt");
		fs::write(&input, "hello\n").unwrap();
		fs::write(&output, "old content that must go\n").unwrap();

		let r = resolve(&stage(&["cat", "<", input.to_str().unwrap(), ">", output.to_str().unwrap()])).unwrap();
		assert_eq!(r.args, vec!["cat"]);

		let mut s = String::new();
		r.stdin.unwrap().read_to_string(&mut s).unwrap();
		assert_eq!(s, "hello\n");

		r.stdout.unwrap().write_all(b"new\n").unwrap();
		assert_eq!(fs::read_to_string(&output).unwrap(), "new\n");
		let mode = fs::metadata(&output).unwrap().permissions().mode();
		assert_eq!(mode & 0o777 & !0o644, 0);
	}

	#[test]
	fn append_keeps_existing_content() {
		let dir = TempDir::new().unwrap();
		let output = dir.path().join("log.txt");
		fs::write(&output, "one\n").unwrap();

		let r = resolve(&stage(&["echo", "two", ">>", output.to_str().unwrap()])).unwrap();
		assert_eq!(r.args, vec!["echo", "two"]);
		r.stdout.unwrap().write_all(b"two\n").unwrap();
		assert_eq!(fs::read_to_string(&output).unwrap(), "one\ntwo\n");
	}

	#[test]
	fn truncate_wins_over_append() {
		let dir = TempDir::new().unwrap();
		let a = dir.path().join("a.txt");
		let b = dir.path().join("b.txt");
		fs::write(&a, "keep\n").unwrap();

		let r = resolve(&stage(&["echo", ">>", a.to_str().unwrap(), ">", b.to_str().unwrap()])).unwrap();
		assert_eq!(r.args, vec!["echo", ">>", a.to_str().unwrap()]);
		assert!(b.exists());
	}

	#[test]
	fn missing_target_is_an_error() {
		assert!(matches!(resolve(&stage(&["cat", "<"])), Err(ShellError::Redirection(_))));
		assert!(matches!(resolve(&stage(&["ls", ">"])), Err(ShellError::Redirection(_))));
		assert!(matches!(resolve(&stage(&["ls", ">>"])), Err(ShellError::Redirection(_))));
	}

	#[test]
	fn unopenable_input_is_an_error() {
		let dir = TempDir::new().unwrap();
		let missing = dir.path().join("missing.txt");
		let err = resolve(&stage(&["cat", "<", missing.to_str().unwrap()])).unwrap_err();
		assert!(err.to_string().starts_with("Failed to open input file"));
	}

	#[test]
	fn output_failure_after_input_opened() {
		let dir = TempDir::new().unwrap();
		let input = dir.path().join("in.txt");
		fs::write(&input, "x").unwrap();
		let bad = dir.path().join("no-such-dir").join("out.txt");
		let err = resolve(&stage(&["cat", "<", input.to_str().unwrap(), ">", bad.to_str().unwrap()])).unwrap_err();
		assert!(err.to_string().starts_with("Failed to open output file"));
	}

	#[test]
	fn non_utf8_target_is_opened_byte_for_byte() {
		use std::ffi::OsStr;
		use std::os::unix::ffi::{OsStrExt, OsStringExt};

		let dir = TempDir::new().unwrap();
		let input = dir.path().join(OsStr::from_bytes(b"\xffdata"));
		fs::write(&input, "raw\n").unwrap();
		let target = OsString::from_vec(input.as_os_str().as_bytes().to_vec());

		let r = resolve(&Stage::new(vec!["cat".into(), "<".into(), target])).unwrap();
		let mut s = String::new();
		r.stdin.unwrap().read_to_string(&mut s).unwrap();
		assert_eq!(s, "raw\n");
	}
}
