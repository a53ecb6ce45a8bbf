//! User-facing notifications.
//!
//! The sink is fire-and-forget: the coordinator never looks at what happens
//! to a notification after handing it over.

use dapp_types::TransactionHash;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Whether a notification reports success or failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyKind {
	Success,
	Error,
}

/// Sink for short-lived, human-readable messages.
pub trait Notifier: Send + Sync {
	fn notify(&self, kind: NotifyKind, title: &str, detail: &str);
}

/// Notifier writing messages to the log.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
	fn notify(&self, kind: NotifyKind, title: &str, detail: &str) {
		match kind {
			NotifyKind::Success => tracing::info!(title, detail, "Notification"),
			NotifyKind::Error => tracing::error!(title, detail, "Notification"),
		}
	}
}

/// Remembers transactions whose outcome was already reported.
///
/// Bounded to the most recent `capacity` hashes.
pub(crate) struct ReportLedger {
	reported: Mutex<VecDeque<TransactionHash>>,
	capacity: usize,
}

impl ReportLedger {
	pub(crate) fn new(capacity: usize) -> Self {
		Self {
			reported: Mutex::new(VecDeque::with_capacity(capacity)),
			capacity: capacity.max(1),
		}
	}

	/// Records `hash` and returns true the first time it is seen.
	pub(crate) fn first_report(&self, hash: &TransactionHash) -> bool {
		let mut reported = self.reported.lock().unwrap_or_else(|e| e.into_inner());
		if reported.contains(hash) {
			return false;
		}
		if reported.len() == self.capacity {
			reported.pop_front();
		}
		reported.push_back(*hash);
		true
	}
}
