//! ui
//!
//! User interaction utilities.
//!
//! # Modules
//!
//! - [`output`] - Output formatting and display
//! - [`progress`] - Terminal progress bar for workflows
//!
//! # Design
//!
//! All user-facing output goes through this module so quiet mode and
//! stream choice (stdout for results, stderr for progress and errors) are
//! handled in one place.

pub mod output;
pub mod progress;
