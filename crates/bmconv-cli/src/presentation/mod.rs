//! Shared CLI presentation utilities.
//!
//! This module provides reusable display and formatting functions
//! for consistent CLI output across commands.
//!
//! # Guidelines
//!
//! - Keep this module format-only: no domain transforms
//! - Domain transforms belong in core services

pub mod progress;
pub mod report;
pub mod tables;

// Re-export commonly used items
pub use progress::ConversionProgress;
pub use report::{print_config, print_conversion_report, print_validation_report};
pub use tables::{format_bytes, print_separator, truncate_string};
