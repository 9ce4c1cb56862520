use callpath_profile::commands::{validate_args, ProfileArgs};
use callpath_profile::utils::config::{MAX_ANALYSIS_PROCESSES, MAX_TOP_PATHS};
use std::fs;
use tempfile::tempdir;

fn args_with_trace() -> (tempfile::TempDir, ProfileArgs) {
    let dir = tempdir().unwrap();
    let trace = dir.path().join("trace.jsonl");
    fs::write(&trace, "").unwrap();
    let args = ProfileArgs {
        traces: vec![trace],
        ..ProfileArgs::default()
    };
    (dir, args)
}

#[test]
fn test_validate_args_accepts_defaults() {
    let (_dir, args) = args_with_trace();
    assert!(validate_args(&args).is_ok());
}

#[test]
fn test_validate_args_missing_trace() {
    let args = ProfileArgs {
        traces: vec!["does/not/exist.jsonl".into()],
        ..ProfileArgs::default()
    };
    assert!(validate_args(&args).is_err());
}

#[test]
fn test_validate_args_process_bounds() {
    let (_dir, mut args) = args_with_trace();

    args.processes = 0;
    assert!(validate_args(&args).is_err());

    args.processes = MAX_ANALYSIS_PROCESSES;
    assert!(validate_args(&args).is_ok());

    args.processes = MAX_ANALYSIS_PROCESSES + 1;
    assert!(validate_args(&args).is_err());
}

#[test]
fn test_validate_args_top_paths_bounds() {
    let (_dir, mut args) = args_with_trace();

    args.top_paths = 0;
    assert!(validate_args(&args).is_err());

    args.top_paths = MAX_TOP_PATHS + 1;
    assert!(validate_args(&args).is_err());
}
