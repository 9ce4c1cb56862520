//! Binomial reduction over analysis processes.
//!
//! In round `k` (step `2^k`) every rank that is a multiple of `2 * step`
//! receives from `rank ^ step`; a rank that has sent is done. `n` inputs are
//! reduced to rank 0 in `ceil(log2 n)` rounds. Any associative, commutative
//! merge function gives the same result regardless of the pairing.

use super::envelope::TreeEnvelope;
use crate::aggregator::call_tree::CallTree;
use crate::utils::error::MergeError;
use log::debug;

/// `(receiver, sender)` pairs of every round
pub fn reduction_schedule(participants: usize) -> Vec<Vec<(usize, usize)>> {
    let mut rounds = Vec::new();
    let mut step = 1;
    while step < participants {
        let round: Vec<(usize, usize)> = (0..participants)
            .step_by(step * 2)
            .map(|receiver| (receiver, receiver ^ step))
            .filter(|&(_, sender)| sender < participants)
            .collect();
        rounds.push(round);
        step <<= 1;
    }
    rounds
}

/// Reduce `items` to one with `merge(receiver, sent)` along the schedule
///
/// Returns `None` for an empty input.
pub fn reduce<T, E, F>(items: Vec<T>, mut merge: F) -> Result<Option<T>, E>
where
    F: FnMut(&mut T, T) -> Result<(), E>,
{
    let participants = items.len();
    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();

    for (round, pairs) in reduction_schedule(participants).into_iter().enumerate() {
        for (receiver, sender) in pairs {
            let sent = slots.get_mut(sender).and_then(Option::take);
            let target = slots.get_mut(receiver).and_then(Option::as_mut);
            if let (Some(target), Some(sent)) = (target, sent) {
                debug!("Round {}: rank {} receives from rank {}", round, receiver, sender);
                merge(target, sent)?;
            }
        }
    }

    Ok(slots.into_iter().next().flatten())
}

/// A reduced tree with what its merges reported along the way
#[derive(Debug, Clone, Default)]
pub struct ReducedTree {
    pub tree: CallTree,

    /// Pairwise merges performed
    pub merges: usize,

    /// Metric records refused by any receiver
    pub metric_conflicts: usize,
}

/// Reduce per-process trees to one, passing every tree through an envelope
/// and its byte encoding as a peer would receive it
pub fn reduce_trees(trees: Vec<CallTree>) -> Result<Option<ReducedTree>, MergeError> {
    let mut merges = 0;
    let mut metric_conflicts = 0;

    let tree = reduce(trees, |receiver, sender| {
        let bytes = TreeEnvelope::seal(sender.serialize_data()).to_bytes()?;
        let foreign = TreeEnvelope::from_bytes(&bytes)?.open()?;
        let report = receiver.merge_tree(&foreign)?;
        merges += 1;
        metric_conflicts += report.metric_conflicts.len();
        Ok::<(), MergeError>(())
    })?;

    Ok(tree.map(|tree| ReducedTree {
        tree,
        merges,
        metric_conflicts,
    }))
}
