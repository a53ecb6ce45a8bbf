//! Confirmation monitoring for submitted transactions.

mod receipt;

pub use receipt::ReceiptMonitor;
