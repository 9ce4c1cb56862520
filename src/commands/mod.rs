//! CLI command implementations.
//!
//! Each command is implemented in its own module.
//! Commands orchestrate the various library components to perform user tasks.

pub mod models;
pub mod profile;
pub mod utils;

// Re-export main command functions
pub use models::ProfileArgs;
pub use profile::{analyze, execute_profile, validate_args, Analysis};
pub use utils::{display_schema, display_version, validate_profile_file};
