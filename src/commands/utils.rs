use crate::aggregator::CallTree;
use crate::output::read_profile;
use crate::utils::config::SCHEMA_VERSION;
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Validate a profile JSON file and rebuild its call tree
pub fn validate_profile_file(file_path: PathBuf) -> Result<CallTree> {
    println!("Validating profile: {}", file_path.display());

    let profile = read_profile(&file_path)?;
    let serialized = profile
        .tree
        .clone()
        .open()
        .context("Profile holds a corrupt call tree")?;
    let tree = CallTree::from_serialized(&serialized).context("Failed to rebuild call tree")?;
    let metric_ids: BTreeSet<_> = serialized.metrics.iter().map(|r| r.metric).collect();

    println!("✓ Valid profile JSON");
    println!("  Version: {}", profile.version);
    println!("  Generated: {}", profile.generated_at);
    println!("  Analysis processes: {}", profile.analysis_processes);
    println!("  Call paths: {}", tree.len());
    println!("  Locations: {}", tree.locations().len());
    println!("  Failed locations: {}", profile.failures.len());
    println!("  Hot Paths: {}", profile.hot_paths.len());

    for id in metric_ids {
        match profile.definitions.metric(id) {
            Ok(def) => println!(
                "  Metric {}: {} ({}{})",
                id,
                def.name,
                def.value_type,
                def.unit.as_deref().map(|u| format!(", {}", u)).unwrap_or_default()
            ),
            Err(err) => println!("  Metric {}: {}", id, err),
        }
    }

    Ok(tree)
}

/// Display schema information
pub fn display_schema(show_details: bool) {
    println!("Call-Path Profile Schema");
    println!("Current Version: {}", SCHEMA_VERSION);
    println!();

    if show_details {
        println!("Schema Structure:");
        println!("  version: string             - Schema version (e.g., '1.0.0')");
        println!("  generated_at: string        - ISO 8601 timestamp");
        println!("  analysis_processes: number  - Processes the trace was split across");
        println!("  definitions: object         - Region, metric and location tables");
        println!("  system_tree: object         - machine → node → process → locations");
        println!("  hot_paths: array            - Top call paths by exclusive time");
        println!("    stack: string             - Call path (e.g., 'main;solve')");
        println!("    exclusive_time: number    - Time excluding sub-calls");
        println!("    percentage: number        - Share of total exclusive time");
        println!("  failures: array             - Locations whose replay stopped");
        println!("  tree: object                - Sealed call tree envelope");
        println!("    counts: object            - Records per sequence");
        println!("    tree.mapping: array       - (node_id, region_id, parent)");
        println!("    tree.functions: array     - Timing per node and location");
        println!("    tree.messages: array      - Point-to-point transfers");
        println!("    tree.collops: array       - Collective transfers");
        println!("    tree.metrics: array       - Typed metric values");
    } else {
        println!("Use --show for detailed schema information");
    }
}

/// Display version information
pub fn display_version() {
    println!("Callpath Profile v{}", env!("CARGO_PKG_VERSION"));
    println!("Profile Schema: v{}", SCHEMA_VERSION);
    println!();
    println!("Call-path aggregation of parallel execution traces.");
}
