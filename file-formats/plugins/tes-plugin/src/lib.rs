//! # tes_plugin - Plugin codec and patch builder
//!
//! Reads and writes TES4-family game plugins (`.esm`, `.esp`, `.esl`) and
//! builds a merged "bashed" patch from an active load order.
//!
//! ## Features
//!
//! - Lossless codec for groups, records and sub-records, including zlib
//!   compressed records and `XXXX` extended sizes
//! - Bounded decompression and group nesting for untrusted input
//! - Master resolution over a load order into load-order independent ids
//! - Typed layouts for `GMST`, `GLOB`, `KYWD`, `FLST`, `MISC` and `LVLI`,
//!   with every other category kept as raw sub-records
//! - Per-category selective merging of field groups, optionally steered by
//!   bash tags in plugin descriptions
//! - Patch assembly with a minimal master list and an atomic write
//!
//! ## Examples
//!
//! ### Reading a plugin
//!
//! ```no_run
//! use tes_plugin::{DecodeLimits, Plugin, PluginName};
//!
//! # fn main() -> Result<(), tes_plugin::Error> {
//! let bytes = std::fs::read("Data/Update.esm")?;
//! let plugin = Plugin::decode(PluginName::new("Update.esm"), &bytes, &DecodeLimits::default())?;
//!
//! println!("masters: {:?}", plugin.masters());
//! for record in plugin.records() {
//!     println!("{} {}", record.signature(), record.form_id());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Building a patch
//!
//! ```no_run
//! use tes_plugin::builder::write_patch;
//! use tes_plugin::records::FieldGroup;
//! use tes_plugin::signature::sigs;
//! use tes_plugin::{DirectorySource, LoadOrder, MergeConfig, PatchOptions, build_patch};
//!
//! # fn main() -> Result<(), tes_plugin::Error> {
//! let load_order = LoadOrder::read_plugins_txt("plugins.txt")?;
//! let config = MergeConfig::new().selective(sigs::LVLI, [FieldGroup::Entries]);
//! let options = PatchOptions::new();
//!
//! let outcome = build_patch(&load_order, &DirectorySource::new("Data"), &config, &options)?;
//! write_patch(&outcome.patch, "Data/Bashed Patch, 0.esp", &options.encode)?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

mod compression;

pub mod builder;
pub mod conflict;
pub mod error;
pub mod formid;
pub mod group;
pub mod header;
pub mod limits;
pub mod load_order;
pub mod parallel;
pub mod pipeline;
pub mod plugin;
pub mod record;
pub mod records;
pub mod resolver;
pub mod signature;
pub mod source;
pub mod subrecord;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export commonly used types
pub use builder::{BuildReport, ContainerKind, PatchBuilder, PatchOptions, write_patch};
pub use conflict::{
    MergeConfig, MergeOutcome, MergeReport, MergedRecord, Strategy, TagMode, merge_plugins,
};
pub use error::{Error, Result};
pub use formid::{FormId, FormIdContext, GlobalFormId, PluginName};
pub use group::{Entry, Group};
pub use header::{GroupHeader, GroupType, RecordFlags, RecordHeader};
pub use limits::{CancellationToken, CompressionPolicy, DecodeLimits, EncodeOptions};
pub use load_order::LoadOrder;
pub use pipeline::{PatchOutcome, build_patch, merge_from_source};
pub use plugin::{MasterEntry, Plugin, PluginHeader};
pub use record::RawRecord;
pub use records::{FieldGroup, FieldValue, RecordData, TypedRecord};
pub use resolver::{Resolution, normalize};
pub use signature::Signature;
pub use source::{DirectorySource, MemorySource, PluginSource};
pub use subrecord::Subrecord;
