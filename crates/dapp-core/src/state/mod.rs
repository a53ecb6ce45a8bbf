//! Pending action state.

mod action;

pub use action::PendingAction;
