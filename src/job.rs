use std::collections::HashMap;

use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use tracing::{debug, warn};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum State { Active, Stopped, Terminated }

pub trait WaitStatusExt {
	fn state(self) -> State;
	fn describe_failure(self) -> Option<String>;
}

impl WaitStatusExt for WaitStatus {
	fn state(self) -> State {
		match self {
			WaitStatus::Exited(..) | WaitStatus::Signaled(..) => State::Terminated,
			WaitStatus::Stopped(..) => State::Stopped,
			#[cfg(any(target_os = "linux", target_os = "android"))]
			WaitStatus::PtraceEvent(..) | WaitStatus::PtraceSyscall(..) => State::Stopped,
			WaitStatus::Continued(..) | WaitStatus::StillAlive => State::Active,
		}
	}

	fn describe_failure(self) -> Option<String> {
		match self {
			WaitStatus::Exited(_, 0) => None,
			WaitStatus::Exited(_, code) => Some(format!("Command exited with status: {}", code)),
			WaitStatus::Signaled(_, sig, _) => Some(format!("Command terminated by signal {}", sig.as_str())),
			_ => None,
		}
	}
}

/// Blocks until `pid` terminates, retrying on EINTR.
pub fn wait_for(pid: Pid) -> nix::Result<WaitStatus> {
	loop {
		match waitpid(pid, None) {
			Ok(status) if status.state() == State::Terminated => return Ok(status),
			Ok(_) => continue,
			Err(Errno::EINTR) => continue,
			Err(e) => return Err(e),
		}
	}
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct FinishedJob {
	pub pid: Pid,
	pub name: String,
	pub status: Option<WaitStatus>,
}

#[derive(Debug, Default)]
pub struct JobTable {
	jobs: HashMap<Pid, String>,
}

impl JobTable {
	pub fn new() -> JobTable {
		JobTable { jobs: HashMap::new() }
	}

	pub fn track(&mut self, pid: Pid, name: &str) {
		self.jobs.insert(pid, name.to_string());
	}

	pub fn untrack(&mut self, pid: Pid) -> Option<String> {
		self.jobs.remove(&pid)
	}

	pub fn list(&self) -> Vec<(Pid, String)> {
		self.jobs.iter().map(|(&pid, name)| (pid, name.clone())).collect()
	}

	pub fn is_empty(&self) -> bool {
		self.jobs.is_empty()
	}

	/// Polls every tracked pid without blocking and drops the ones that
	/// have terminated. A pid that is no longer our child (ECHILD) is
	/// dropped too, with no status.
	pub fn reap(&mut self) -> Vec<FinishedJob> {
		let mut finished = vec![];
		for &pid in self.jobs.keys() {
			match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
				Ok(status) if status.state() == State::Terminated => finished.push((pid, Some(status))),
				Ok(_) => {},
				Err(Errno::ECHILD) => finished.push((pid, None)),
				Err(e) => warn!(%pid, error = %e, "failed to poll background job"),
			}
		}
		finished.into_iter()
			.filter_map(|(pid, status)| self.jobs.remove(&pid).map(|name| {
				debug!(%pid, command = %name, "background job reaped");
				FinishedJob { pid, name, status }
			}))
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use nix::sys::signal::Signal;

	#[test]
	fn track_list_untrack() {
		let mut table = JobTable::new();
		table.track(Pid::from_raw(100), "sleep");
		table.track(Pid::from_raw(200), "ping");
		let mut listed = table.list();
		listed.sort();
		assert_eq!(listed, vec![(Pid::from_raw(100), "sleep".to_string()), (Pid::from_raw(200), "ping".to_string())]);
		assert_eq!(table.untrack(Pid::from_raw(100)).as_deref(), Some("sleep"));
		assert_eq!(table.untrack(Pid::from_raw(100)), None);
		assert_eq!(table.list().len(), 1);
	}

	#[test]
	fn wait_status_descriptions() {
		let pid = Pid::from_raw(1);
		assert_eq!(WaitStatus::Exited(pid, 0).describe_failure(), None);
		assert_eq!(WaitStatus::Exited(pid, 3).describe_failure().as_deref(), Some("Command exited with status: 3"));
		assert!(WaitStatus::Signaled(pid, Signal::SIGKILL, false).describe_failure().unwrap().contains("SIGKILL"));
		assert_eq!(WaitStatus::StillAlive.state(), State::Active);
		assert_eq!(WaitStatus::Stopped(pid, Signal::SIGTSTP).state(), State::Stopped);
	}

	#[test]
	fn reap_drops_pids_that_are_not_our_children() {
		let mut table = JobTable::new();
		// pid 1 is never a child of the test process
		table.track(Pid::from_raw(1), "init");
		let reaped = table.reap();
		assert_eq!(reaped.len(), 1);
		assert_eq!(reaped[0].status, None);
		assert_eq!(reaped[0].name, "init");
		assert!(table.is_empty());
	}
}
