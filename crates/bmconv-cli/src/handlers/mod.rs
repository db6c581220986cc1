//! Command handlers.
//!
//! Handlers follow the canonical pattern:
//! - Signature: `pub fn execute(args: &...Args) -> Result<(), CliError>`
//!   (convert also takes a `quiet` flag for its progress bar)
//! - Thin wrappers that:
//!   1. Resolve settings from flags and files
//!   2. Call core services
//!   3. Format output for the terminal
//!
//! Handlers should NOT contain conversion logic.

pub mod convert;
pub mod inspect;
pub mod upgrade;
pub mod validate;
