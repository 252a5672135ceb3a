// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! Query futures: the caller-facing handle on a submitted query. The
//! runtime pushes an update after every group; the first failure marks
//! the query cancelled and terminates further updates. Cancellation is
//! a terminal state of its own, never an error.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use femtocode_engine::{Progress, Tally};
use femtocode_type::error::Diagnostic;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
	Pending,
	Loading,
	Computing,
	Done,
	Failed,
	Cancelled,
}

impl QueryStatus {
	pub fn terminal(&self) -> bool {
		matches!(self, QueryStatus::Done | QueryStatus::Failed | QueryStatus::Cancelled)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UpdateData {
	None,
	Tally(Tally),
	Failure {
		failure: Diagnostic,
	},
}

/// The result-update payload pushed to the caller after every group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultUpdate {
	pub loads_done: f64,
	pub computes_done: f64,
	pub done: bool,
	pub wall_time: f64,
	pub compute_time: f64,
	pub last_update: String,
	pub data: UpdateData,
}

#[derive(Debug)]
struct FutureState {
	status: QueryStatus,
	latest: Option<ResultUpdate>,
}

#[derive(Debug)]
pub struct QueryFuture {
	started: Instant,
	state: Mutex<FutureState>,
	wakeup: Condvar,
}

impl Default for QueryFuture {
	fn default() -> Self {
		Self::new()
	}
}

impl QueryFuture {
	pub fn new() -> Self {
		Self {
			started: Instant::now(),
			state: Mutex::new(FutureState {
				status: QueryStatus::Pending,
				latest: None,
			}),
			wakeup: Condvar::new(),
		}
	}

	pub fn status(&self) -> QueryStatus {
		self.state.lock().status
	}

	pub fn latest(&self) -> Option<ResultUpdate> {
		self.state.lock().latest.clone()
	}

	pub fn loading(&self) {
		let mut state = self.state.lock();
		if state.status == QueryStatus::Pending {
			state.status = QueryStatus::Loading;
		}
	}

	pub fn cancel(&self) {
		let mut state = self.state.lock();
		if !state.status.terminal() {
			state.status = QueryStatus::Cancelled;
			self.wakeup.notify_all();
		}
	}

	/// Push a progress snapshot; ignored once the future is terminal.
	pub fn update(&self, progress: &Progress) {
		let mut state = self.state.lock();
		if state.status.terminal() {
			return;
		}
		let data = match &progress.failure {
			Some(failure) => UpdateData::Failure {
				failure: failure.diagnostic().clone(),
			},
			None => UpdateData::Tally(progress.tally.clone()),
		};
		state.latest = Some(ResultUpdate {
			loads_done: progress.loads_done,
			computes_done: progress.computes_done,
			done: progress.done,
			wall_time: self.started.elapsed().as_secs_f64(),
			compute_time: progress.compute_time,
			last_update: iso8601_now(),
			data,
		});
		state.status = if progress.failure.is_some() {
			QueryStatus::Failed
		} else if progress.done {
			QueryStatus::Done
		} else {
			QueryStatus::Computing
		};
		if state.status.terminal() {
			self.wakeup.notify_all();
		}
	}

	/// Block until the future is terminal (or the timeout passes);
	/// returns the final status.
	pub fn wait(&self, timeout: Duration) -> QueryStatus {
		let deadline = Instant::now() + timeout;
		let mut state = self.state.lock();
		while !state.status.terminal() {
			if self.wakeup.wait_until(&mut state, deadline).timed_out() {
				break;
			}
		}
		state.status
	}

	pub fn tally(&self) -> Option<Tally> {
		match self.latest() {
			Some(ResultUpdate {
				data: UpdateData::Tally(tally),
				..
			}) => Some(tally),
			_ => None,
		}
	}
}

/// Compact ISO-8601 UTC timestamp without a calendar dependency.
fn iso8601_now() -> String {
	let since_epoch = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
	let seconds = since_epoch.as_secs();
	let (days, rem) = (seconds / 86_400, seconds % 86_400);
	let (hour, minute, second) = (rem / 3_600, (rem % 3_600) / 60, rem % 60);

	// civil-from-days (Howard Hinnant's algorithm)
	let z = days as i64 + 719_468;
	let era = z.div_euclid(146_097);
	let doe = z.rem_euclid(146_097);
	let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
	let y = yoe + era * 400;
	let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
	let mp = (5 * doy + 2) / 153;
	let day = doy - (153 * mp + 2) / 5 + 1;
	let month = if mp < 10 { mp + 3 } else { mp - 9 };
	let year = if month <= 2 { y + 1 } else { y };

	format!(
		"{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
		year, month, day, hour, minute, second
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn progress(done: bool, failed: bool) -> Progress {
		Progress {
			loads_done: 1.0,
			computes_done: if done { 1.0 } else { 0.5 },
			done,
			compute_time: 0.25,
			tally: Tally::Count(3),
			failure: failed.then(|| femtocode_type::internal_error!("boom")),
			cancelled: false,
		}
	}

	#[test]
	fn test_state_machine() {
		let future = QueryFuture::new();
		assert_eq!(future.status(), QueryStatus::Pending);
		future.loading();
		assert_eq!(future.status(), QueryStatus::Loading);
		future.update(&progress(false, false));
		assert_eq!(future.status(), QueryStatus::Computing);
		future.update(&progress(true, false));
		assert_eq!(future.status(), QueryStatus::Done);
		// terminal: further updates are ignored
		future.update(&progress(false, false));
		assert_eq!(future.status(), QueryStatus::Done);
		assert_eq!(future.tally(), Some(Tally::Count(3)));
	}

	#[test]
	fn test_first_failure_terminates() {
		let future = QueryFuture::new();
		future.update(&progress(false, true));
		assert_eq!(future.status(), QueryStatus::Failed);
		match future.latest().unwrap().data {
			UpdateData::Failure {
				failure,
			} => assert!(failure.message.contains("boom")),
			other => panic!("unexpected {:?}", other),
		}
	}

	#[test]
	fn test_cancellation_is_terminal_but_not_a_failure() {
		let future = QueryFuture::new();
		future.cancel();
		assert_eq!(future.status(), QueryStatus::Cancelled);
		future.update(&progress(true, false));
		assert_eq!(future.status(), QueryStatus::Cancelled);
	}

	#[test]
	fn test_update_payload_shape() {
		let future = QueryFuture::new();
		future.update(&progress(true, false));
		let json = serde_json::to_string(&future.latest().unwrap()).unwrap();
		assert!(json.contains("\"loadsDone\""));
		assert!(json.contains("\"computeTime\""));
		assert!(json.contains("\"lastUpdate\""));
	}

	#[test]
	fn test_wait_times_out() {
		let future = QueryFuture::new();
		assert_eq!(future.wait(Duration::from_millis(10)), QueryStatus::Pending);
		future.update(&progress(true, false));
		assert_eq!(future.wait(Duration::from_millis(10)), QueryStatus::Done);
	}
}
