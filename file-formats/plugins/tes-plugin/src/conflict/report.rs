//! What a merge run did and what it skipped

use crate::Error;
use crate::formid::{FormId, GlobalFormId, PluginName};
use crate::signature::Signature;
use std::fmt;

/// How a record in the merged set was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Only one contributor after the last deletion
    ConflictFree,
    /// The last contributor won outright
    Override,
    /// At least one field group was merged
    Selective,
}

/// A plugin left out of the merge
#[derive(Debug)]
pub struct RejectedPlugin {
    /// Plugin name
    pub plugin: PluginName,
    /// Why; [`Error::UnresolvedMaster`] for resolution failures
    pub error: Error,
    /// Records of the plugin that took no part in the merge
    pub skipped_records: usize,
}

/// Identity of a record an issue refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKey {
    /// Raw id as stored in the plugin, before resolution
    Local(FormId),
    /// Resolved id
    Global(GlobalFormId),
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Local(id) => write!(f, "{id}"),
            RecordKey::Global(id) => write!(f, "{id}"),
        }
    }
}

/// A single record that was skipped or left out of the patch
#[derive(Debug)]
pub struct RecordIssue {
    /// Plugin the record was read from
    pub plugin: PluginName,
    /// Record signature
    pub signature: Signature,
    /// Record id
    pub record: RecordKey,
    /// Cause
    pub error: Error,
}

impl fmt::Display for RecordIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}]: {}",
            self.plugin, self.signature, self.record, self.error
        )
    }
}

/// Summary of a merge run
#[derive(Debug, Default)]
pub struct MergeReport {
    /// Plugins excluded from the run
    pub rejected: Vec<RejectedPlugin>,
    /// Records skipped individually
    pub issues: Vec<RecordIssue>,
    /// Records whose latest contribution is a deletion
    pub deleted: Vec<GlobalFormId>,
    /// Records with a single contributor
    pub conflict_free: usize,
    /// Records decided by plain override
    pub overridden: usize,
    /// Records with at least one merged field group
    pub merged: usize,
}

impl MergeReport {
    /// Record a rejected plugin
    pub fn reject(&mut self, plugin: PluginName, error: Error, skipped_records: usize) {
        log::warn!("Skipping {skipped_records} records of {plugin}: {error}");
        self.rejected.push(RejectedPlugin {
            plugin,
            error,
            skipped_records,
        });
    }

    /// Record a per-record issue
    pub fn issue(&mut self, issue: RecordIssue) {
        log::warn!("Skipping record {issue}");
        self.issues.push(issue);
    }

    /// Count a resolution
    pub(crate) fn count(&mut self, strategy: Strategy) {
        match strategy {
            Strategy::ConflictFree => self.conflict_free += 1,
            Strategy::Override => self.overridden += 1,
            Strategy::Selective => self.merged += 1,
        }
    }

    /// Whether a plugin was rejected
    pub fn is_rejected(&self, plugin: &PluginName) -> bool {
        self.rejected.iter().any(|r| r.plugin == *plugin)
    }

    /// Records that ended up in the merged set
    pub fn resolved(&self) -> usize {
        self.conflict_free + self.overridden + self.merged
    }

    /// Whether nothing was skipped
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty() && self.issues.is_empty()
    }
}
