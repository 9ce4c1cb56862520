//! Callpath Profile
//!
//! Aggregates event traces of parallel programs (MPI, OpenMP, threads)
//! into a call-path profile with per-location timing, message, collective
//! and metric statistics.
//!
//! The engine replays each location's enter/leave stream into a call-path
//! tree, and trees built by independent analysis processes are merged
//! through a serialized, transport-agnostic form.
//!
//! ```no_run
//! use callpath_profile::aggregator::ReplaySession;
//! use callpath_profile::parser::read_trace;
//!
//! let events = read_trace("trace.jsonl")?;
//! let mut session = ReplaySession::new();
//! session.replay(&events);
//! let outcome = session.finish();
//! println!("{} call paths", outcome.tree.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod aggregator;
pub mod commands;
pub mod merge;
pub mod output;
pub mod parser;
pub mod utils;
