//! Patch assembly and atomic writing
//!
//! [`PatchBuilder`] turns a merged record set into a [`Plugin`] whose master
//! list holds exactly the plugins its records reference, ordered by load
//! order. [`write_patch`] persists a plugin through a temporary file in the
//! destination directory and only replaces the target once the written bytes
//! decode again.
//!
//! ```no_run
//! use tes_plugin::builder::{ContainerKind, PatchBuilder, PatchOptions, write_patch};
//! # fn example(load_order: &tes_plugin::LoadOrder, merged: &[tes_plugin::conflict::MergedRecord]) -> tes_plugin::Result<()> {
//! let options = PatchOptions::new()
//!     .author("me")
//!     .kind(ContainerKind::Light)
//!     .skip_redundant(true);
//! let (patch, report) = PatchBuilder::new(load_order, options.clone()).build(merged)?;
//! println!("{} records, {} masters", report.records_written, report.masters.len());
//! write_patch(&patch, "Data/Bashed Patch, 0.esp", &options.encode)?;
//! # Ok(())
//! # }
//! ```

use crate::conflict::MergedRecord;
use crate::formid::{FormIdContext, GlobalFormId, PluginName};
use crate::group::{Entry, Group};
use crate::header::RecordFlags;
use crate::limits::{CancellationToken, DecodeLimits, EncodeOptions};
use crate::load_order::LoadOrder;
use crate::plugin::{DEFAULT_HEADER_VERSION, FIRST_OBJECT_INDEX, MasterEntry, Plugin};
use crate::signature::top_group_rank;
use crate::{Error, Result};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Highest number of masters a plugin may declare; 0xFE and 0xFF are reserved
pub const MAX_MASTERS: usize = 253;

/// File name used when none is configured
pub const DEFAULT_PATCH_NAME: &str = "Bashed Patch, 0.esp";

/// Kind of container the patch is written as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ContainerKind {
    /// Regular plugin
    #[default]
    Full,
    /// Light plugin, header flag `0x200`
    Light,
}

impl ContainerKind {
    /// Master count limit for this kind
    pub fn max_masters(self) -> usize {
        match self {
            ContainerKind::Full | ContainerKind::Light => MAX_MASTERS,
        }
    }
}

/// Settings for the generated patch
#[derive(Debug, Clone)]
pub struct PatchOptions {
    /// Output plugin name
    pub name: PluginName,
    /// `CNAM`
    pub author: Option<String>,
    /// `SNAM`
    pub description: Option<String>,
    /// `HEDR` version
    pub version: f32,
    /// Container kind
    pub kind: ContainerKind,
    /// Leave out records identical to their plain-override winner
    pub skip_redundant: bool,
    /// Encoding settings used when writing
    pub encode: EncodeOptions,
    /// Limits for decoding the source plugins
    pub limits: DecodeLimits,
    /// Checked before each source plugin is decoded
    pub cancellation: CancellationToken,
}

impl Default for PatchOptions {
    fn default() -> Self {
        Self {
            name: PluginName::new(DEFAULT_PATCH_NAME),
            author: None,
            description: None,
            version: DEFAULT_HEADER_VERSION,
            kind: ContainerKind::Full,
            skip_redundant: false,
            encode: EncodeOptions::default(),
            limits: DecodeLimits::default(),
            cancellation: CancellationToken::default(),
        }
    }
}

impl PatchOptions {
    /// Default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output plugin name
    pub fn name(mut self, name: impl Into<PluginName>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the author
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Set the description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the header version
    pub fn version(mut self, version: f32) -> Self {
        self.version = version;
        self
    }

    /// Set the container kind
    pub fn kind(mut self, kind: ContainerKind) -> Self {
        self.kind = kind;
        self
    }

    /// Skip records the patch does not change
    pub fn skip_redundant(mut self, skip: bool) -> Self {
        self.skip_redundant = skip;
        self
    }

    /// Set the encoding options
    pub fn encode(mut self, encode: EncodeOptions) -> Self {
        self.encode = encode;
        self
    }

    /// Set the decode limits for source plugins
    pub fn limits(mut self, limits: DecodeLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Share a cancellation token with the caller
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}

/// What went into the patch
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Masters of the patch, in load order
    pub masters: Vec<PluginName>,
    /// Records written
    pub records_written: usize,
    /// Opaque records left to plain override
    pub skipped_opaque: usize,
    /// Records with string-table ids, which only mean something in their source plugin
    pub skipped_localized: usize,
    /// Records identical to their plain-override winner
    pub skipped_redundant: usize,
    /// Records whose encoding failed
    pub failed: Vec<(GlobalFormId, Error)>,
}

/// Assembles a patch plugin from merged records
#[derive(Debug)]
pub struct PatchBuilder<'a> {
    load_order: &'a LoadOrder,
    options: PatchOptions,
}

impl<'a> PatchBuilder<'a> {
    /// Create a builder ordering masters by `load_order`
    pub fn new(load_order: &'a LoadOrder, options: PatchOptions) -> Self {
        Self {
            load_order,
            options,
        }
    }

    fn load_index(&self, plugin: &PluginName) -> usize {
        self.load_order.position(plugin).unwrap_or(usize::MAX)
    }

    /// Build the patch
    ///
    /// Fails with [`Error::TooManyMasters`] when the records reference more
    /// plugins than the container kind allows.
    pub fn build(&self, merged: &[MergedRecord]) -> Result<(Plugin, BuildReport)> {
        let mut report = BuildReport::default();
        let mut selected = Vec::with_capacity(merged.len());
        for item in merged {
            let record = &item.record;
            if record.is_opaque() {
                log::debug!("{} {} is opaque, left to {}", record.signature, record.id, item.winner);
                report.skipped_opaque += 1;
            } else if record.has_localized_strings() {
                log::debug!("{} {} has localized strings, left to {}", record.signature, record.id, item.winner);
                report.skipped_localized += 1;
            } else if self.options.skip_redundant && !item.changed {
                report.skipped_redundant += 1;
            } else {
                selected.push(record);
            }
        }

        let referenced: BTreeSet<PluginName> = selected
            .iter()
            .flat_map(|record| record.references())
            .map(|id| id.plugin)
            .filter(|plugin| *plugin != self.options.name)
            .collect();
        let mut masters: Vec<PluginName> = referenced.into_iter().collect();
        masters.sort_by_key(|plugin| self.load_index(plugin));

        let limit = self.options.kind.max_masters();
        if masters.len() > limit {
            return Err(Error::TooManyMasters {
                count: masters.len(),
                limit,
            });
        }
        let ids = FormIdContext::new(self.options.name.clone(), masters.clone());

        selected.sort_by_key(|record| {
            (
                top_group_rank(record.signature),
                record.signature,
                self.load_index(&record.id.plugin),
                record.id.object_index,
            )
        });

        let mut plugin = Plugin::new(self.options.name.clone());
        for record in selected {
            let raw = match record.encode(&ids) {
                Ok(raw) => raw,
                Err(error) => {
                    log::warn!("Cannot write {} {}: {error}", record.signature, record.id);
                    report.failed.push((record.id.clone(), error));
                    continue;
                }
            };
            if plugin.groups.last().map(Group::label) != Some(record.signature) {
                plugin.groups.push(Group::top(record.signature));
            }
            if let Some(group) = plugin.groups.last_mut() {
                group.entries.push(Entry::Record(raw));
                report.records_written += 1;
            }
        }

        let header = &mut plugin.header;
        header.version = self.options.version;
        header.author = self.options.author.clone();
        header.description = self.options.description.clone();
        header.next_object_id = FIRST_OBJECT_INDEX;
        header.masters = masters.iter().cloned().map(MasterEntry::new).collect();
        if self.options.kind == ContainerKind::Light {
            header.flags |= RecordFlags::LIGHT;
        }
        plugin.header.record_count = u32::try_from(plugin.count_records())
            .map_err(|_| Error::resource_limit("patch holds more than 4G records"))?;

        log::info!(
            "Built {} with {} records and {} masters",
            plugin.name,
            report.records_written,
            masters.len()
        );
        report.masters = masters;
        Ok((plugin, report))
    }
}

/// Write `plugin` to `path` atomically
///
/// The bytes go to a temporary file next to `path` and are decoded again
/// before the temporary file replaces `path`; on any failure `path` is left
/// untouched.
pub fn write_patch<P: AsRef<Path>>(plugin: &Plugin, path: P, options: &EncodeOptions) -> Result<()> {
    let path = path.as_ref();
    let bytes = plugin.encode(options)?;

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp_file = NamedTempFile::new_in(dir)?;
    temp_file.write_all(&bytes)?;
    temp_file.flush()?;

    let written = std::fs::read(temp_file.path())?;
    let limits = DecodeLimits::new()
        .max_decompressed_size(u64::from(u32::MAX))
        .max_compression_ratio(u32::MAX);
    let check = Plugin::decode(plugin.name.clone(), &written, &limits)?;
    if check.count_records() != plugin.count_records() {
        return Err(Error::malformed(format!(
            "{} re-read with {} records and groups, wrote {}",
            plugin.name,
            check.count_records(),
            plugin.count_records()
        )));
    }

    temp_file.persist(path).map_err(|e| Error::Io(e.error))?;
    log::debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}
