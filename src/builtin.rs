use std::env;
use std::ffi::{OsStr, OsString};
use std::io::{self, Write};
use std::os::unix::ffi::OsStrExt;
use std::process;

use crate::error::ShellError;
use crate::global;
use crate::ui;

pub type Builtin = fn(&mut global::State, &[OsString]) -> Result<(), ShellError>;

pub const SERVICE_ACTIONS: [&str; 5] = ["start", "stop", "restart", "status", "list"];

pub fn builtin_exit(state: &mut global::State, _: &[OsString]) -> Result<(), ShellError> {
	state.running = false;
	Ok(())
}

pub fn builtin_cd(_: &mut global::State, args: &[OsString]) -> Result<(), ShellError> {
	let dir = match args.get(1) {
		Some(dir) => dir.clone(),
		None => env::var_os("HOME").ok_or_else(||
			ShellError::Builtin("cd failed: HOME environment variable not set".to_string()))?,
	};
	env::set_current_dir(&dir).map_err(|e| ShellError::Builtin(format!("cd failed: {}", e)))
}

pub fn builtin_jobs(state: &mut global::State, _: &[OsString]) -> Result<(), ShellError> {
	state.reap_jobs();
	let mut out = io::stdout().lock();
	ui::title(&mut out, "Jobs")?;
	writeln!(out, "\x1b[33mActive Jobs:\x1b[0m")?;
	if state.job_table.is_empty() {
		writeln!(out, "No active jobs.")?;
	}
	for (pid, name) in state.job_table.list() {
		writeln!(out, "PID: {} - {}", pid, name)?;
	}
	Ok(())
}

pub fn builtin_help(state: &mut global::State, _: &[OsString]) -> Result<(), ShellError> {
	let mut out = io::stdout().lock();
	ui::title(&mut out, "secsh Help")?;
	ui::section(&mut out, "Built-in Commands")?;
	for (name, desc) in &[
		("help", "Show this help message"),
		("exit", "Exit the shell"),
		("services", "Manage system services\n               Usage: services <start|stop|restart|status|list> <service_name>"),
		("jobs", "List active background jobs"),
		("cd", "Change directory\n               Usage: cd [directory]"),
		("history", "Show command history"),
		("export", "Set an environment variable\n               Usage: export VAR=value"),
		("env", "List all environment variables"),
		("unset", "Unset an environment variable\n               Usage: unset VAR"),
		("reload", "Reload the blacklist of commands"),
	] {
		writeln!(out, "  \x1b[1m{:<10}\x1b[0m - {}", name, desc)?;
	}
	ui::section(&mut out, "Allowed Directories")?;
	for dir in state.policy.allowed_dirs() {
		writeln!(out, "  - {}", dir.display())?;
	}
	writeln!(out, "  ({} blacklisted commands)", state.policy.blacklist_len())?;
	ui::section(&mut out, "Security Features")?;
	for feature in &["Command whitelisting", "Command blacklisting", "Input sanitization",
	                 "Job tracking", "Background job execution", "Piped command execution",
	                 "Input/output redirection"] {
		writeln!(out, "  - {}", feature)?;
	}
	ui::section(&mut out, "Note")?;
	writeln!(out, "All commands are subject to security checks and sanitization.")?;
	writeln!(out, "Only executables from trusted directories are permitted.")?;
	Ok(())
}

pub fn builtin_history(state: &mut global::State, _: &[OsString]) -> Result<(), ShellError> {
	let mut out = io::stdout().lock();
	ui::title(&mut out, "Command History")?;
	if state.history.is_empty() {
		writeln!(out, "No command history available.")?;
	}
	for (i, line) in state.history.iter().enumerate() {
		writeln!(out, "  {}  {}", i + 1, line)?;
	}
	Ok(())
}

fn check_var_name(name: &OsStr) -> Result<(), ShellError> {
	if name.is_empty() || name.as_bytes().iter().any(|&c| c == b'=' || c == 0) {
		return Err(ShellError::Usage(format!("Invalid variable name: {:?}", name)));
	}
	Ok(())
}

pub fn builtin_export(_: &mut global::State, args: &[OsString]) -> Result<(), ShellError> {
	let assignment = args.get(1).ok_or_else(|| ShellError::Usage("Usage: export VAR=value".to_string()))?;
	let bytes = assignment.as_bytes();
	let eq = bytes.iter().position(|&c| c == b'=')
		.ok_or_else(|| ShellError::Usage("Invalid export syntax. Use VAR=value".to_string()))?;
	let (var, value) = (OsStr::from_bytes(&bytes[..eq]), OsStr::from_bytes(&bytes[eq + 1..]));
	check_var_name(var)?;
	if value.as_bytes().contains(&0) {
		return Err(ShellError::Usage("Invalid export value".to_string()));
	}
	env::set_var(var, value);
	ui::alert(&format!("Exported: {}={}", var.to_string_lossy(), value.to_string_lossy()));
	Ok(())
}

pub fn builtin_env(_: &mut global::State, _: &[OsString]) -> Result<(), ShellError> {
	let mut out = io::stdout().lock();
	for (k, v) in env::vars_os() {
		writeln!(out, "{}={}", k.to_string_lossy(), v.to_string_lossy())?;
	}
	Ok(())
}

pub fn builtin_unset(_: &mut global::State, args: &[OsString]) -> Result<(), ShellError> {
	let var = args.get(1).ok_or_else(|| ShellError::Usage("Usage: unset VAR".to_string()))?;
	check_var_name(var)?;
	env::remove_var(var);
	Ok(())
}

/// Builds the systemctl invocation for a `services` line.
pub fn service_command(args: &[OsString]) -> Result<Vec<String>, ShellError> {
	let args = args.iter()
		.map(|a| a.to_str().ok_or_else(|| ShellError::Usage(format!("Invalid service argument: {:?}", a))))
		.collect::<Result<Vec<&str>, _>>()?;
	let action = args.get(1).copied().ok_or_else(|| ShellError::Usage(
		"Usage: services <start|stop|restart|status|list> <service_name>".to_string()))?;
	if !SERVICE_ACTIONS.contains(&action) {
		return Err(ShellError::Usage("Invalid action. Use start, stop, restart, status, or list.".to_string()));
	}
	if action == "list" {
		return Ok(vec!["systemctl".into(), "list-units".into(), "--type=service".into()]);
	}
	let service = args.get(2).ok_or_else(|| ShellError::Usage(
		format!("Usage: services {} <service_name>", action)))?;
	let mut command: Vec<String> = vec![];
	if action != "status" {
		command.push("sudo".into());
	}
	command.extend(["systemctl".to_string(), action.to_string(), service.to_string()]);
	Ok(command)
}

pub fn builtin_services(_: &mut global::State, args: &[OsString]) -> Result<(), ShellError> {
	let command = service_command(args)?;
	{
		let mut out = io::stdout().lock();
		ui::title(&mut out, "Service Manager")?;
		writeln!(out, "Executing: {}", command.join(" "))?;
	}
	let status = process::Command::new(&command[0]).args(&command[1..]).status()?;
	if !status.success() {
		return Err(ShellError::Builtin("Failed to execute service command.".to_string()));
	}
	ui::alert("Service command executed successfully.");
	Ok(())
}

pub fn builtin_reload(state: &mut global::State, _: &[OsString]) -> Result<(), ShellError> {
	state.policy.reload()?;
	ui::alert("Blacklist reloaded.");
	Ok(())
}

pub fn match_builtin(name: &OsStr) -> Option<Builtin> {
	match name.to_str()? {
		"exit" => Some(builtin_exit),
		"cd" => Some(builtin_cd),
		"jobs" => Some(builtin_jobs),
		"help" => Some(builtin_help),
		"history" => Some(builtin_history),
		"export" => Some(builtin_export),
		"env" => Some(builtin_env),
		"unset" => Some(builtin_unset),
		"services" => Some(builtin_services),
		"reload" => Some(builtin_reload),
		_ => None,
	}
}
