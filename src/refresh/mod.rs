//! Refresh coordination
//!
//! At most one token refresh is outstanding at a time. Every caller that
//! needs a fresh token while a refresh is running waits for that refresh and
//! receives its result, success or failure.

mod coordinator;

pub use coordinator::{FailureSignal, RefreshCoordinator};
