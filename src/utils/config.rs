//! Configuration and constants for the CLI.

/// Current output schema version
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Version tag written into every serialized tree envelope
pub const ENVELOPE_VERSION: &str = "1";

// Simulated analysis processes used to partition trace locations
pub const DEFAULT_ANALYSIS_PROCESSES: usize = 1;
pub const MAX_ANALYSIS_PROCESSES: usize = 1024;

// Hot path reporting limits
pub const DEFAULT_TOP_PATHS: usize = 20;
pub const MAX_TOP_PATHS: usize = 1000;

/// Separator between region names in a rendered call path
pub const PATH_SEPARATOR: &str = ";";
