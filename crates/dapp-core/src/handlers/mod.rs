//! Caller-level conventions built on the coordinator.

mod approval;

pub use approval::{ApprovalPlanner, DEFAULT_APPROVAL_HEADROOM_PERCENT};
