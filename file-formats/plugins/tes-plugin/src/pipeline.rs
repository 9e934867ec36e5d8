//! End-to-end patch build
//!
//! [`build_patch`] reads the active plugins from a [`PluginSource`], decodes
//! them in parallel, resolves and merges their records and assembles the
//! patch. Nothing is written to disk; pass the result to
//! [`write_patch`](crate::builder::write_patch) to persist it.
//!
//! ```no_run
//! use tes_plugin::builder::{PatchOptions, write_patch};
//! use tes_plugin::conflict::MergeConfig;
//! use tes_plugin::pipeline::build_patch;
//! use tes_plugin::source::DirectorySource;
//! use tes_plugin::LoadOrder;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let load_order = LoadOrder::read_plugins_txt("plugins.txt")?;
//! let options = PatchOptions::new();
//! let outcome = build_patch(
//!     &load_order,
//!     &DirectorySource::new("Data"),
//!     &MergeConfig::new(),
//!     &options,
//! )?;
//! for rejected in &outcome.merge.rejected {
//!     eprintln!("skipped {}: {}", rejected.plugin, rejected.error);
//! }
//! write_patch(&outcome.patch, "Data/Bashed Patch, 0.esp", &options.encode)?;
//! # Ok(())
//! # }
//! ```

use crate::builder::{BuildReport, PatchBuilder, PatchOptions};
use crate::conflict::{MergeConfig, MergeOutcome, MergeReport, merge_plugins};
use crate::limits::{CancellationToken, DecodeLimits};
use crate::load_order::LoadOrder;
use crate::parallel::decode_plugins;
use crate::plugin::Plugin;
use crate::source::PluginSource;
use crate::Result;

/// Result of a patch build
#[derive(Debug)]
pub struct PatchOutcome {
    /// The patch, ready to write
    pub patch: Plugin,
    /// Rejected plugins, skipped records and resolution counts
    pub merge: MergeReport,
    /// Masters and per-record build results
    pub build: BuildReport,
}

/// Read, resolve and merge the plugins of `load_order`
///
/// A plugin that cannot be read or decoded is rejected with that error, and
/// its dependents with [`Error::UnresolvedMaster`](crate::Error::UnresolvedMaster).
pub fn merge_from_source(
    load_order: &LoadOrder,
    source: &dyn PluginSource,
    config: &MergeConfig,
    limits: &DecodeLimits,
    cancellation: &CancellationToken,
) -> Result<MergeOutcome> {
    let decoded = decode_plugins(load_order.plugins(), source, limits, cancellation)?;
    let mut plugins = Vec::with_capacity(decoded.len());
    let mut failures = Vec::new();
    for (name, result) in decoded {
        match result {
            Ok(plugin) => plugins.push(plugin),
            Err(error) => failures.push((name, error)),
        }
    }

    let mut outcome = merge_plugins(load_order, &plugins, config);
    for (name, error) in failures {
        let report = &mut outcome.report;
        match report.rejected.iter_mut().find(|r| r.plugin == name) {
            Some(rejected) => rejected.error = error,
            None => report.reject(name, error, 0),
        }
    }
    Ok(outcome)
}

/// Build a patch from the plugins of `load_order`
///
/// A plugin that cannot be read or decoded is rejected together with its
/// dependents and the build goes on. Fails on an invalid `config`, on
/// cancellation, or when the patch would need too many masters.
pub fn build_patch(
    load_order: &LoadOrder,
    source: &dyn PluginSource,
    config: &MergeConfig,
    options: &PatchOptions,
) -> Result<PatchOutcome> {
    config.validate()?;

    // a previous patch in the load order is replaced, not merged
    let order = if load_order.contains(&options.name) {
        log::info!("Leaving {} out of its own build", options.name);
        LoadOrder::new(load_order.iter().filter(|p| **p != options.name).cloned())?
    } else {
        load_order.clone()
    };

    let MergeOutcome { records, report } = merge_from_source(
        &order,
        source,
        config,
        &options.limits,
        &options.cancellation,
    )?;
    let (patch, build) = PatchBuilder::new(&order, options.clone()).build(&records)?;
    log::info!(
        "{}: {} conflict free, {} overridden, {} merged, {} plugins rejected",
        patch.name,
        report.conflict_free,
        report.overridden,
        report.merged,
        report.rejected.len()
    );
    Ok(PatchOutcome {
        patch,
        merge: report,
        build,
    })
}
