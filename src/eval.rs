use std::convert::Infallible;
use std::ffi::{CString, OsString};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::unistd::{self, ForkResult, Pid};
use tracing::{debug, warn};

use crate::builtin;
use crate::error::ShellError;
use crate::global::State;
use crate::job::{self, WaitStatusExt};
use crate::parser;
use crate::redirect;
use crate::types::{Pipeline, Stage};
use crate::ui;

/// Both ends of one inter-stage pipe. Created close-on-exec; each end is
/// closed when dropped.
#[derive(Debug)]
pub struct PipeEndpoint {
	pub read: OwnedFd,
	pub write: OwnedFd,
}

impl PipeEndpoint {
	pub fn new() -> Result<PipeEndpoint, ShellError> {
		let (read, write) = unistd::pipe2(OFlag::O_CLOEXEC).map_err(ShellError::PipeAllocation)?;
		Ok(PipeEndpoint { read, write })
	}
}

/// A stage that passed the gate: the exact file to exec and its argv.
#[derive(Debug)]
pub struct Program {
	name: String,
	path: CString,
	argv: Vec<CString>,
}

impl Program {
	pub fn new(path: &Path, args: &[OsString]) -> Result<Program, ShellError> {
		let argv = args.iter().map(|a| CString::new(a.as_bytes())).collect::<Result<Vec<_>, _>>()?;
		let path = CString::new(path.as_os_str().as_bytes())?;
		let name = args.first().map(|a| a.to_string_lossy().into_owned()).unwrap_or_default();
		Ok(Program { name, path, argv })
	}
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct PipelineSummary {
	pub pipes: usize,
	pub spawned: usize,
}

pub fn inject_arguments(args: &mut Vec<OsString>) {
	match args.first().and_then(|s| s.to_str()) {
		Some("grep") => {
			if !args.iter().any(|a| a.as_bytes().starts_with(b"--color")) {
				args.push("--color=always".into());
			}
		},
		Some("ls") => args.push("--color=auto".into()),
		_ => {},
	}
}

fn do_exec_child(program: &Program, stdin: Option<RawFd>, stdout: Option<RawFd>,
                 inherited: &[RawFd]) -> nix::Result<Infallible> {
	if let Some(fd) = stdin {
		unistd::dup2(fd, libc::STDIN_FILENO)?;
	}
	if let Some(fd) = stdout {
		unistd::dup2(fd, libc::STDOUT_FILENO)?;
	}
	for &fd in inherited {
		if fd > libc::STDERR_FILENO {
			let _ = unistd::close(fd);
		}
	}
	unistd::execv(&program.path, &program.argv)
}

fn exec_child(program: &Program, stdin: Option<RawFd>, stdout: Option<RawFd>, inherited: &[RawFd]) -> ! {
	let e = match do_exec_child(program, stdin, stdout, inherited) {
		Ok(never) => match never {},
		Err(e) => e,
	};
	// raw write(2): the stderr lock may have been held by another thread at fork time
	for part in [b"secsh: ".as_slice(), program.name.as_bytes(), b": Command execution failed: ".as_slice(),
	             e.desc().as_bytes(), b"\n".as_slice()] {
		unsafe { libc::write(libc::STDERR_FILENO, part.as_ptr() as *const libc::c_void, part.len()) };
	}
	let code = if e == Errno::ENOENT { 127 } else { 126 };
	unsafe { libc::_exit(code) }
}

/// Forks a child running `program`. `inherited` lists every descriptor of
/// the current evaluation; the child closes all of them after wiring its
/// stdin/stdout, so no stray pipe end survives into the new image.
pub fn spawn(program: &Program, stdin: Option<RawFd>, stdout: Option<RawFd>,
             inherited: &[RawFd]) -> Result<Pid, ShellError> {
	// Safety: the child only rewires descriptors, then execs or exits.
	match unsafe { unistd::fork() }.map_err(ShellError::Spawn)? {
		ForkResult::Parent { child } => {
			debug!(pid = %child, command = %program.name, ?stdin, ?stdout, "spawned");
			Ok(child)
		},
		ForkResult::Child => exec_child(program, stdin, stdout, inherited),
	}
}

fn run_command(state: &mut State, stage: &Stage, background: bool) -> Result<(), ShellError> {
	let name = stage.name();
	let path = state.policy.resolve(name)?;
	if name == "cat" && stage.args.len() == 1 {
		return Err(ShellError::Usage("Usage: cat <file>".to_string()));
	}

	let redirect::Resolved { mut args, stdin, stdout } = redirect::resolve(stage)?;
	inject_arguments(&mut args);
	let program = Program::new(&path, &args)?;

	let stdin_fd = stdin.as_ref().map(AsRawFd::as_raw_fd);
	let stdout_fd = stdout.as_ref().map(AsRawFd::as_raw_fd);
	let inherited: Vec<RawFd> = stdin_fd.into_iter().chain(stdout_fd).collect();
	let pid = spawn(&program, stdin_fd, stdout_fd, &inherited)?;
	drop(stdin);
	drop(stdout);

	let name = name.to_string_lossy();
	state.job_table.track(pid, &name);
	if background {
		ui::alert(&format!("[{}] {} running in background", pid, name));
		return Ok(());
	}

	let status = job::wait_for(pid);
	state.job_table.untrack(pid);
	match status.map_err(ShellError::Wait)?.describe_failure() {
		Some(msg) => Err(ShellError::CommandFailed(msg)),
		None => Ok(()),
	}
}

pub fn run_pipeline(state: &mut State, pipeline: &Pipeline) -> Result<PipelineSummary, ShellError> {
	let commands = &pipeline.commands;
	if pipeline.is_background {
		return Err(ShellError::Unsupported("Background execution is not supported for pipelines"));
	}
	if commands.iter().any(Stage::has_redirect_tokens) {
		return Err(ShellError::Unsupported("Redirection is not supported in pipelines"));
	}

	// every stage must pass the gate before anything is allocated
	let mut programs = Vec::with_capacity(commands.len());
	for stage in commands {
		let path = state.policy.resolve(stage.name())?;
		let mut args = stage.args.clone();
		inject_arguments(&mut args);
		programs.push(Program::new(&path, &args)?);
	}
	run_stages(&programs, spawn)
}

/// Connects `programs` with N-1 pipes and starts them in order through
/// `spawner`, then waits for every stage that was started. A spawn failure
/// stops the loop; the stages already running see their pipes close and are
/// still waited for.
pub fn run_stages<F>(programs: &[Program], mut spawner: F) -> Result<PipelineSummary, ShellError>
	where F: FnMut(&Program, Option<RawFd>, Option<RawFd>, &[RawFd]) -> Result<Pid, ShellError>
{
	let n = programs.len();
	let mut pipes: Vec<Option<PipeEndpoint>> = Vec::with_capacity(n.saturating_sub(1));
	for _ in 1..n {
		pipes.push(Some(PipeEndpoint::new()?));
	}
	let created = pipes.len();

	let mut children: Vec<Pid> = Vec::with_capacity(n);
	let mut spawn_error = None;
	for (i, program) in programs.iter().enumerate() {
		let stdin = if i > 0 { pipes[i - 1].as_ref().map(|p| p.read.as_raw_fd()) } else { None };
		let stdout = pipes.get(i).and_then(Option::as_ref).map(|p| p.write.as_raw_fd());
		let inherited: Vec<RawFd> = pipes.iter().flatten()
			.flat_map(|p| [p.read.as_raw_fd(), p.write.as_raw_fd()])
			.collect();
		match spawner(program, stdin, stdout, &inherited) {
			Ok(pid) => children.push(pid),
			Err(e) => {
				spawn_error = Some(e);
				break;
			},
		}
		// both neighbours of the previous pipe exist now
		if i > 0 {
			pipes[i - 1] = None;
		}
	}
	drop(pipes);

	// exit codes of piped stages are deliberately not reported
	for &pid in &children {
		if let Err(e) = job::wait_for(pid) {
			warn!(%pid, error = %e, "failed to wait for pipeline stage");
		}
	}

	match spawn_error {
		Some(e) => Err(e),
		None => Ok(PipelineSummary { pipes: created, spawned: children.len() }),
	}
}

pub fn eval(state: &mut State, line: &[u8]) -> Result<(), ShellError> {
	let pipeline = parser::parse(line);
	if pipeline.is_empty() {
		return Ok(());
	}
	if pipeline.is_piped() {
		return run_pipeline(state, &pipeline).map(|_| ());
	}

	let stage = &pipeline.commands[0];
	if let Some(func) = builtin::match_builtin(stage.name()) {
		return func(state, &stage.args);
	}
	run_command(state, stage, pipeline.is_background)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn args(v: &[&str]) -> Vec<OsString> {
		v.iter().map(OsString::from).collect()
	}

	#[test]
	fn grep_gets_color_unless_present() {
		let mut a = args(&["grep", "foo"]);
		inject_arguments(&mut a);
		assert_eq!(a, args(&["grep", "foo", "--color=always"]));

		let mut a = args(&["grep", "--color=never", "foo"]);
		inject_arguments(&mut a);
		assert_eq!(a, args(&["grep", "--color=never", "foo"]));
	}

	#[test]
	fn ls_always_gets_color_auto() {
		let mut a = args(&["ls", "--color=never"]);
		inject_arguments(&mut a);
		assert_eq!(a, args(&["ls", "--color=never", "--color=auto"]));

		let mut a = args(&["cat", "x"]);
		inject_arguments(&mut a);
		assert_eq!(a, args(&["cat", "x"]));
	}

	#[test]
	fn program_rejects_nul_bytes() {
		let err = Program::new(Path::new("/bin/echo"), &args(&["echo", "a\0b"])).unwrap_err();
		assert!(matches!(err, ShellError::Nul(_)));
		let p = Program::new(Path::new("/bin/echo"), &args(&["echo", "hi"])).unwrap();
		assert_eq!(p.argv.len(), 2);
		assert_eq!(p.path.to_str().unwrap(), "/bin/echo");
	}
}
