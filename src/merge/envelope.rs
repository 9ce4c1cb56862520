//! Transport envelope for serialized trees.
//!
//! The envelope announces the length of each record sequence; the receiver
//! checks every count once when opening it, so truncated or padded payloads
//! are rejected before any merge starts.

use super::serialize::SerializedTree;
use crate::utils::config::ENVELOPE_VERSION;
use crate::utils::error::MergeError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCounts {
    pub mapping: usize,
    pub functions: usize,
    pub messages: usize,
    pub collops: usize,
    pub metrics: usize,
}

impl RecordCounts {
    pub fn of(tree: &SerializedTree) -> Self {
        Self {
            mapping: tree.mapping.len(),
            functions: tree.functions.len(),
            messages: tree.messages.len(),
            collops: tree.collops.len(),
            metrics: tree.metrics.len(),
        }
    }
}

/// A serialized tree sealed for transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnvelope {
    pub version: String,
    pub counts: RecordCounts,
    pub tree: SerializedTree,
}

impl TreeEnvelope {
    pub fn seal(tree: SerializedTree) -> Self {
        Self {
            version: ENVELOPE_VERSION.to_string(),
            counts: RecordCounts::of(&tree),
            tree,
        }
    }

    /// Check version and record counts
    pub fn verify(&self) -> Result<(), MergeError> {
        if self.version != ENVELOPE_VERSION {
            return Err(MergeError::UnsupportedVersion(self.version.clone()));
        }

        let found = RecordCounts::of(&self.tree);
        let checks = [
            ("mapping", self.counts.mapping, found.mapping),
            ("functions", self.counts.functions, found.functions),
            ("messages", self.counts.messages, found.messages),
            ("collops", self.counts.collops, found.collops),
            ("metrics", self.counts.metrics, found.metrics),
        ];
        for (sequence, expected, found) in checks {
            if expected != found {
                return Err(MergeError::RecordCountMismatch {
                    sequence,
                    expected,
                    found,
                });
            }
        }
        Ok(())
    }

    /// Verify and unwrap the tree
    pub fn open(self) -> Result<SerializedTree, MergeError> {
        self.verify()?;
        Ok(self.tree)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, MergeError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MergeError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
