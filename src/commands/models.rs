use crate::utils::config::{DEFAULT_ANALYSIS_PROCESSES, DEFAULT_TOP_PATHS};
use std::path::PathBuf;

/// Arguments for the profile command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone)]
pub struct ProfileArgs {
    /// JSON-lines trace files to replay
    pub traces: Vec<PathBuf>,

    /// Output path for JSON profile
    pub output_json: PathBuf,

    /// Number of simulated analysis processes
    pub processes: usize,

    /// Number of top hot paths to include in profile
    pub top_paths: usize,

    /// Print text summary to stdout
    pub print_summary: bool,
}

impl Default for ProfileArgs {
    fn default() -> Self {
        Self {
            traces: Vec::new(),
            output_json: PathBuf::from("profile.json"),
            processes: DEFAULT_ANALYSIS_PROCESSES,
            top_paths: DEFAULT_TOP_PATHS,
            print_summary: false,
        }
    }
}
