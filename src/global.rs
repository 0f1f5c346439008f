use tracing::debug;

use crate::job;
use crate::policy::SecurityPolicy;
use crate::ui;

/// Everything that outlives a single input line.
pub struct State {
	pub policy: SecurityPolicy,
	pub job_table: job::JobTable,
	pub history: Vec<String>,
	pub running: bool,
}

impl State {
	pub fn new(policy: SecurityPolicy) -> State {
		State { policy, job_table: job::JobTable::new(), history: vec![], running: true }
	}

	pub fn record_history(&mut self, line: &str) {
		if !line.trim().is_empty() {
			self.history.push(line.to_string());
		}
	}

	/// Removes finished background jobs and tells the user about each one.
	pub fn reap_jobs(&mut self) -> usize {
		let finished = self.job_table.reap();
		for job in &finished {
			debug!(pid = %job.pid, status = ?job.status, "background job finished");
			ui::alert(&format!("Background job {} ({}) completed.", job.pid, job.name));
		}
		finished.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::path::PathBuf;

	#[test]
	fn history_skips_blank_lines() {
		let mut state = State::new(SecurityPolicy::new(vec![], PathBuf::from("missing")));
		state.record_history("ls -l");
		state.record_history("   ");
		state.record_history("echo 'x; y'");
		assert_eq!(state.history, vec!["ls -l", "echo 'x; y'"]);
		assert!(state.running);
	}
}
