//! Profile command implementation.
//!
//! The profile command:
//! 1. Reads JSON-lines event traces
//! 2. Partitions locations across simulated analysis processes
//! 3. Replays each partition into its own call tree
//! 4. Reduces the trees through serialize → envelope → merge
//! 5. Calculates hot paths and the system tree
//! 6. Writes the profile JSON

use crate::aggregator::metrics::{calculate_hot_paths, calculate_time_distribution};
use crate::aggregator::{CallTree, ReplaySession, SystemTree};
use crate::commands::models::ProfileArgs;
use crate::merge::{reduce_trees, TreeEnvelope};
use crate::output::write_profile;
use crate::parser::schema::{HotPath, LocationFailure, LocationId, Profile};
use crate::parser::{read_trace, Definitions, TraceEvent};
use crate::utils::config::{MAX_ANALYSIS_PROCESSES, MAX_TOP_PATHS, PATH_SEPARATOR, SCHEMA_VERSION};
use crate::utils::error::MergeError;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::time::Instant;

/// Result of replaying and reducing a whole trace
#[derive(Debug)]
pub struct Analysis {
    pub tree: CallTree,
    pub definitions: Definitions,
    pub failures: Vec<LocationFailure>,
    pub unclosed: Vec<(LocationId, usize)>,
    pub orphan_events: usize,
    pub metric_conflicts: usize,
}

/// Split events across `processes` partitions
///
/// Location events go to partition `location % processes`; definitions are
/// copied into every partition.
pub fn partition_events(events: &[TraceEvent], processes: usize) -> Vec<Vec<&TraceEvent>> {
    let processes = processes.max(1);
    let mut partitions: Vec<Vec<&TraceEvent>> = vec![Vec::new(); processes];

    for event in events {
        match event.location() {
            Some(location) => partitions[(location % processes as u64) as usize].push(event),
            None => partitions.iter_mut().for_each(|p| p.push(event)),
        }
    }
    partitions
}

/// Replay every partition independently and reduce the trees into one
///
/// **Public** - library entry point behind the profile command
pub fn analyze(events: &[TraceEvent], processes: usize) -> Result<Analysis, MergeError> {
    let partitions = partition_events(events, processes);

    let mut trees = Vec::with_capacity(partitions.len());
    let mut analysis = Analysis {
        tree: CallTree::new(),
        definitions: Definitions::new(),
        failures: Vec::new(),
        unclosed: Vec::new(),
        orphan_events: 0,
        metric_conflicts: 0,
    };

    for (rank, partition) in partitions.into_iter().enumerate() {
        let mut session = ReplaySession::new();
        let rejected = session.replay(partition);
        let outcome = session.finish();
        debug!(
            "Analysis process {}: {} call paths, {} rejected events",
            rank,
            outcome.tree.len(),
            rejected
        );

        trees.push(outcome.tree);
        analysis.definitions.extend(outcome.definitions);
        analysis.failures.extend(outcome.failures);
        analysis.unclosed.extend(outcome.unclosed);
        analysis.orphan_events += outcome.orphan_events;
        analysis.metric_conflicts += outcome.metric_conflicts;
    }

    if let Some(reduced) = reduce_trees(trees)? {
        analysis.tree = reduced.tree;
        analysis.metric_conflicts += reduced.metric_conflicts;
    }
    analysis.failures.sort_by_key(|f| f.location);
    analysis.unclosed.sort_unstable();
    Ok(analysis)
}

/// Assemble the profile document from an analysis
pub fn to_profile(analysis: &Analysis, processes: usize, top_paths: usize) -> Profile {
    let hot_paths = calculate_hot_paths(&analysis.tree, &analysis.definitions, top_paths);
    let system_tree = SystemTree::build(&analysis.definitions, &analysis.tree.locations());

    Profile {
        version: SCHEMA_VERSION.to_string(),
        generated_at: chrono::Utc::now().to_rfc3339(),
        analysis_processes: processes,
        definitions: analysis.definitions.clone(),
        system_tree,
        hot_paths,
        failures: analysis.failures.clone(),
        tree: TreeEnvelope::seal(analysis.tree.serialize_data()),
    }
}

/// Execute the profile command
///
/// **Public** - main entry point called from main.rs
///
/// # Errors
/// * Trace files that cannot be read or parsed
/// * Corrupt trees during reduction
/// * File write errors
pub fn execute_profile(args: ProfileArgs) -> Result<Profile> {
    let start_time = Instant::now();

    let mut events = Vec::new();
    for path in &args.traces {
        info!("Reading trace: {}", path.display());
        let trace = read_trace(path)
            .with_context(|| format!("Failed to read trace {}", path.display()))?;
        events.extend(trace);
    }
    info!(
        "Replaying {} events across {} analysis processes...",
        events.len(),
        args.processes
    );

    let analysis = analyze(&events, args.processes).context("Failed to merge call trees")?;

    for failure in &analysis.failures {
        warn!("Location {} failed: {}", failure.location, failure.reason);
    }
    if analysis.metric_conflicts > 0 {
        warn!("{} metric updates refused", analysis.metric_conflicts);
    }

    let distribution = calculate_time_distribution(&analysis.tree);
    info!("Time distribution: {}", distribution.summary());

    let profile = to_profile(&analysis, args.processes, args.top_paths);
    write_profile(&profile, &args.output_json).context("Failed to write profile JSON")?;
    info!("✓ Profile written to: {}", args.output_json.display());

    if args.print_summary {
        println!("{}", generate_text_summary(&analysis, &profile.hot_paths));
    }

    info!(
        "Profile completed in {:.2}s",
        start_time.elapsed().as_secs_f64()
    );
    Ok(profile)
}

/// Human-readable summary of an analysis
pub fn generate_text_summary(analysis: &Analysis, hot_paths: &[HotPath]) -> String {
    let mut out = String::new();
    out.push_str("Call-path profile summary\n");
    out.push_str(&format!("  Call paths:      {}\n", analysis.tree.len()));
    out.push_str(&format!(
        "  Locations:       {}\n",
        analysis.tree.locations().len()
    ));
    out.push_str(&format!("  Failed locations: {}\n", analysis.failures.len()));
    if analysis.orphan_events > 0 {
        out.push_str(&format!(
            "  Orphan events:   {}\n",
            analysis.orphan_events
        ));
    }
    out.push('\n');
    out.push_str("  Hot paths (exclusive time):\n");
    for (rank, path) in hot_paths.iter().enumerate() {
        let leaf = path.stack.rsplit(PATH_SEPARATOR).next().unwrap_or(&path.stack);
        out.push_str(&format!(
            "  {:>3}. {:>12} {:>6.2}%  {}  ({})\n",
            rank + 1,
            path.exclusive_time,
            path.percentage,
            leaf,
            path.stack
        ));
    }
    out
}

/// Validate profile arguments
///
/// **Public** - can be called before execute_profile for early validation
pub fn validate_args(args: &ProfileArgs) -> Result<()> {
    if args.traces.is_empty() {
        anyhow::bail!("At least one trace file is required");
    }

    for path in &args.traces {
        if !path.is_file() {
            anyhow::bail!("Trace file not found: {}", path.display());
        }
    }

    if args.processes == 0 {
        anyhow::bail!("processes must be greater than 0");
    }

    if args.processes > MAX_ANALYSIS_PROCESSES {
        anyhow::bail!("processes is too large (max {})", MAX_ANALYSIS_PROCESSES);
    }

    if args.top_paths == 0 {
        anyhow::bail!("top_paths must be greater than 0");
    }

    if args.top_paths > MAX_TOP_PATHS {
        anyhow::bail!("top_paths is too large (max {})", MAX_TOP_PATHS);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::FunctionData;

    fn call(location: LocationId, region: u32, start: u64, end: u64) -> [TraceEvent; 2] {
        [
            TraceEvent::Enter {
                location,
                region,
                time: start,
            },
            TraceEvent::Leave {
                location,
                time: end,
            },
        ]
    }

    #[test]
    fn test_partition_by_location() {
        let mut events: Vec<TraceEvent> = Vec::new();
        for location in 0..4 {
            events.extend(call(location, 1, 0, 10));
        }
        let partitions = partition_events(&events, 3);

        assert_eq!(partitions.len(), 3);
        assert_eq!(partitions[0].len(), 4); // locations 0 and 3
        assert_eq!(partitions[1].len(), 2);
        assert_eq!(partitions[2].len(), 2);
    }

    #[test]
    fn test_analyze_merges_partitions() {
        let mut events: Vec<TraceEvent> = Vec::new();
        for location in 0..5 {
            events.extend(call(location, 1, 0, 10 + location));
        }

        let analysis = analyze(&events, 4).unwrap();
        let root = analysis.tree.root_nodes()[&1];
        let node = analysis.tree.node(root);
        assert_eq!(node.node_data().len(), 5);
        assert_eq!(node.total_function(), FunctionData::new(5, 60, 60));
    }

    #[test]
    fn test_validate_args_requires_traces() {
        assert!(validate_args(&ProfileArgs::default()).is_err());
    }
}
