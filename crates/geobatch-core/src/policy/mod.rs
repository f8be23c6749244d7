//! Submission policies.
//!
//! Only retry for now: a failed transport call is repeated after a fixed
//! pause until the budget runs out.

pub mod retry;

pub use retry::{RetryConfig, RetryPolicy};
