//! Utility functions for display formatting and timestamps.

pub mod formatting;
pub mod helpers;

pub use formatting::{format_units, truncate_id};
pub use helpers::current_timestamp;
