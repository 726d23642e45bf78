//! Integration tests for remsync-sync
//!
//! Runs complete sessions between two temporary directories and verifies
//! the resulting trees: initial reconciliation, live observation in both
//! directions, retry exhaustion and shutdown.

mod common;

mod test_lifecycle;
mod test_pull;
mod test_push;
mod test_retry;
