//! Backend test support utilities
//!
//! Shared helpers for backend tests: unified logging initialization,
//! Problem Details response assertions and Telegram initData fixtures.

pub mod logging;
pub mod problem_details;
pub mod telegram;
