//! Cross-plugin conflict resolution
//!
//! Every record of every resolved plugin is grouped by its [`GlobalFormId`].
//! The contributions of one id, in load order, form its chain:
//!
//! - a deletion ends the chain; only contributions after the latest deleted
//!   one count, and a chain ending in a deletion drops the record
//! - in plain override mode the last contribution wins outright
//! - in selective mode the configured field groups take each contributor's
//!   changes relative to its baseline, the latest earlier contribution from
//!   one of its masters; other fields come from the winner
//!
//! ```no_run
//! use tes_plugin::conflict::{MergeConfig, merge_plugins};
//! use tes_plugin::records::FieldGroup;
//! use tes_plugin::signature::sigs;
//! # fn example(load_order: &tes_plugin::LoadOrder, plugins: &[tes_plugin::Plugin]) {
//! let config = MergeConfig::new().selective(sigs::LVLI, [FieldGroup::Entries]);
//! let outcome = merge_plugins(load_order, plugins, &config);
//! for merged in &outcome.records {
//!     println!("{} won by {}", merged.record.id, merged.winner);
//! }
//! # }
//! ```

mod merge;
pub mod policy;
pub mod report;

pub use policy::{BashTags, CategoryPolicy, MergeConfig, TagMode};
pub use report::{MergeReport, RecordIssue, RecordKey, RejectedPlugin, Strategy};

use crate::formid::{FormIdContext, GlobalFormId, PluginName};
use crate::load_order::LoadOrder;
use crate::plugin::Plugin;
use crate::records::{self, FieldContext, FieldGroup, TypedRecord};
use crate::resolver::{Resolution, normalize};
use crate::{Error, Result};
use merge::{Layer, merge_chain};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A resolved plugin with its records decoded
#[derive(Debug)]
pub struct PreparedPlugin {
    /// Plugin name
    pub name: PluginName,
    /// Position in the load order
    pub load_index: usize,
    /// Tags from the header description
    pub tags: BashTags,
    /// Records in file order
    pub records: Vec<TypedRecord>,
    /// Records that could not be resolved
    pub issues: Vec<RecordIssue>,
}

impl PreparedPlugin {
    /// Decode every record of `plugin` against its resolved master list
    ///
    /// A record whose ids do not resolve is skipped and listed in `issues`;
    /// a field layout violation fails the whole plugin.
    pub fn prepare(plugin: &Plugin, load_index: usize, ids: &FormIdContext) -> Result<Self> {
        let ctx = FieldContext {
            ids,
            localized: plugin.is_localized(),
        };
        let mut records = Vec::new();
        let mut issues = Vec::new();
        for raw in plugin.records() {
            match TypedRecord::decode(raw, &ctx) {
                Ok(record) => records.push(record),
                Err(error) if error.is_recoverable() => issues.push(RecordIssue {
                    plugin: plugin.name.clone(),
                    signature: raw.signature(),
                    record: RecordKey::Local(raw.form_id()),
                    error,
                }),
                Err(error) => return Err(error.in_plugin(&plugin.name)),
            }
        }
        log::debug!(
            "Prepared {}: {} records, {} skipped",
            plugin.name,
            records.len(),
            issues.len()
        );
        Ok(Self {
            name: plugin.name.clone(),
            load_index,
            tags: BashTags::parse(plugin.header.description.as_deref().unwrap_or_default()),
            records,
            issues,
        })
    }
}

/// One record of the merged set
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRecord {
    /// Resulting record
    pub record: TypedRecord,
    /// How it was produced
    pub strategy: Strategy,
    /// Plugins in the live part of the chain, in load order
    pub contributors: Vec<PluginName>,
    /// Plugin whose contribution wins in plain override mode
    pub winner: PluginName,
    /// Whether the record differs from that plain-override contribution
    pub changed: bool,
}

/// Merged records and the report of how they were produced
#[derive(Debug, Default)]
pub struct MergeOutcome {
    /// Surviving records, ordered by global id
    pub records: Vec<MergedRecord>,
    /// What was merged, skipped and rejected
    pub report: MergeReport,
}

#[derive(Debug, Clone, Copy)]
struct Contribution<'a> {
    plugin: &'a PreparedPlugin,
    record: &'a TypedRecord,
}

/// Resolve, decode and merge `plugins` under `load_order`
///
/// Plugins of the load order missing from `plugins` are rejected with
/// [`Error::PluginNotFound`] as the cause, which also rejects their
/// dependents. Plugins outside the load order are ignored.
pub fn merge_plugins(load_order: &LoadOrder, plugins: &[Plugin], config: &MergeConfig) -> MergeOutcome {
    let by_name: HashMap<&PluginName, &Plugin> = plugins.iter().map(|p| (&p.name, p)).collect();
    let master_lists: HashMap<PluginName, Vec<PluginName>> = by_name
        .values()
        .map(|p| (p.name.clone(), p.masters()))
        .collect();
    let mut resolution = normalize(load_order, &master_lists);

    let mut report = MergeReport::default();
    for (name, cause) in std::mem::take(&mut resolution.rejected) {
        let skipped = by_name.get(&name).map_or(0, |p| p.records().count());
        let error = Error::UnresolvedMaster {
            plugin: name.clone(),
            cause: Box::new(cause),
        };
        report.reject(name, error, skipped);
    }

    let jobs: Vec<(usize, &Plugin, &FormIdContext)> = load_order
        .iter()
        .enumerate()
        .filter_map(|(index, name)| Some((index, *by_name.get(name)?, resolution.context(name)?)))
        .collect();
    let results: Vec<(&Plugin, Result<PreparedPlugin>)> = jobs
        .par_iter()
        .map(|&(index, plugin, ids)| (plugin, PreparedPlugin::prepare(plugin, index, ids)))
        .collect();

    let mut prepared = Vec::with_capacity(results.len());
    for (plugin, result) in results {
        match result {
            Ok(p) => prepared.push(p),
            Err(error) => report.reject(plugin.name.clone(), error, plugin.records().count()),
        }
    }
    merge_into(prepared, &resolution, config, report)
}

/// Merge already prepared plugins
///
/// The order of `plugins` does not matter; contributions are sequenced by
/// [`PreparedPlugin::load_index`].
pub fn merge_prepared(
    plugins: Vec<PreparedPlugin>,
    resolution: &Resolution,
    config: &MergeConfig,
) -> MergeOutcome {
    merge_into(plugins, resolution, config, MergeReport::default())
}

fn merge_into(
    mut plugins: Vec<PreparedPlugin>,
    resolution: &Resolution,
    config: &MergeConfig,
    mut report: MergeReport,
) -> MergeOutcome {
    plugins.sort_by_key(|p| p.load_index);
    for plugin in &mut plugins {
        for issue in plugin.issues.drain(..) {
            report.issue(issue);
        }
    }

    let mut chains: BTreeMap<&GlobalFormId, Vec<Contribution<'_>>> = BTreeMap::new();
    for plugin in &plugins {
        for record in &plugin.records {
            chains
                .entry(&record.id)
                .or_default()
                .push(Contribution { plugin, record });
        }
    }

    let mut records = Vec::with_capacity(chains.len());
    for (id, chain) in chains {
        let start = chain
            .iter()
            .rposition(|c| c.record.is_deleted())
            .map_or(0, |i| i + 1);
        let live = &chain[start..];
        let Some(winner) = live.last() else {
            log::debug!("{id} is deleted by {}", chain[chain.len() - 1].plugin.name);
            report.deleted.push(id.clone());
            continue;
        };
        if let Some(merged) = resolve_chain(id, live, winner, resolution, config, &mut report) {
            report.count(merged.strategy);
            records.push(merged);
        }
    }
    log::info!(
        "Merged {} records: {} conflict-free, {} overridden, {} merged, {} deleted",
        records.len(),
        report.conflict_free,
        report.overridden,
        report.merged,
        report.deleted.len()
    );
    MergeOutcome { records, report }
}

fn resolve_chain(
    id: &GlobalFormId,
    live: &[Contribution<'_>],
    winner: &Contribution<'_>,
    resolution: &Resolution,
    config: &MergeConfig,
    report: &mut MergeReport,
) -> Option<MergedRecord> {
    let plain = |strategy| MergedRecord {
        record: winner.record.clone(),
        strategy,
        contributors: live.iter().map(|c| c.plugin.name.clone()).collect(),
        winner: winner.plugin.name.clone(),
        changed: false,
    };
    if live.len() == 1 {
        return Some(plain(Strategy::ConflictFree));
    }

    let signature = winner.record.signature;
    if live
        .iter()
        .any(|c| c.record.is_opaque() || c.record.signature != signature)
    {
        return Some(plain(Strategy::Override));
    }

    let groups = match merge_groups(id, live, config) {
        Ok(groups) => groups,
        Err(error) => {
            report.issue(RecordIssue {
                plugin: winner.plugin.name.clone(),
                signature,
                record: RecordKey::Global(id.clone()),
                error,
            });
            return None;
        }
    };
    if groups.is_empty() {
        return Some(plain(Strategy::Override));
    }

    let layers: Vec<Layer<'_>> = live
        .iter()
        .map(|c| Layer {
            plugin: &c.plugin.name,
            fields: c.record.fields().unwrap_or_default(),
        })
        .collect();
    let is_master = |plugin: &PluginName, candidate: &PluginName| {
        resolution.depends_on(plugin, candidate)
    };
    let in_scope = |name: &str| {
        records::field_group(signature, name).is_some_and(|group| groups.contains(&group))
    };
    let fields = merge_chain(&layers, &is_master, &in_scope);

    match winner.record.with_fields(&fields) {
        Ok(record) => {
            let changed = record.data != winner.record.data;
            log::debug!("{id}: merged {groups:?} from {} contributors", live.len());
            Some(MergedRecord {
                changed,
                record,
                ..plain(Strategy::Selective)
            })
        }
        Err(error) => {
            // keep the plain winner, the fields do not form a valid record
            log::warn!("{id}: merged fields rejected, using {}: {error}", winner.plugin.name);
            Some(plain(Strategy::Override))
        }
    }
}

/// Field groups to merge for one chain
fn merge_groups(
    id: &GlobalFormId,
    live: &[Contribution<'_>],
    config: &MergeConfig,
) -> Result<BTreeSet<FieldGroup>> {
    let signature = live[live.len() - 1].record.signature;
    let mut groups = config.policy(signature).groups();
    if config.tags == TagMode::Ignore {
        return Ok(groups);
    }

    let present: BTreeSet<FieldGroup> = live
        .iter()
        .filter_map(|c| c.record.fields())
        .flat_map(|fields| {
            fields
                .keys()
                .filter_map(|name| records::field_group(signature, name))
                .collect::<Vec<_>>()
        })
        .collect();
    for group in present {
        let merge = live.iter().find(|c| c.plugin.tags.merge.contains(&group));
        let replace = live.iter().find(|c| c.plugin.tags.replace.contains(&group));
        match (merge, replace) {
            (Some(merge), Some(replace)) => {
                return Err(Error::IncompatibleMergePolicy {
                    id: id.clone(),
                    group,
                    merge: merge.plugin.name.clone(),
                    replace: replace.plugin.name.clone(),
                });
            }
            (Some(_), None) => {
                groups.insert(group);
            }
            (None, Some(_)) => {
                groups.remove(&group);
            }
            (None, None) => {}
        }
    }
    Ok(groups)
}
