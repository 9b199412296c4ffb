/// Availability calculation for session slots
pub mod availability;

/// Credit balances and the append-only credit transaction log
pub mod credit;

/// Registration ledger: booking, cancellation and reactivation
pub mod registration;

/// Weekday sets, the studio clock and occurrence expansion
pub mod schedule;

/// Session templates, class offerings and their links
pub mod session;

/// Administrative status transitions with credit policy
pub mod status;
