//! Fixture plugins for tests, benchmarks and the CLI test suite
//!
//! [`PluginFixture`] writes records the way the game's editor lays them out,
//! with form ids given raw (master index in the high byte), so tests can
//! describe override chains without going through the typed model.
//!
//! ```
//! use tes_plugin::test_utils::PluginFixture;
//!
//! let bytes = PluginFixture::new("Gems.esp")
//!     .master("Skyrim.esm")
//!     .global(0x0000_0800, "GemRate", 2.0)
//!     .misc_item(0x0100_0801, "Ruby", 40, 0.1, &[0x0000_0900])
//!     .to_bytes()
//!     .unwrap();
//! assert_eq!(&bytes[..4], b"TES4");
//! ```

use crate::Result;
use crate::formid::{FormId, PluginName};
use crate::group::{Entry, Group};
use crate::header::RecordFlags;
use crate::limits::EncodeOptions;
use crate::plugin::{MasterEntry, Plugin};
use crate::record::RawRecord;
use crate::signature::{Signature, sigs};
use crate::subrecord::Subrecord;

/// Builder for a synthetic plugin
#[derive(Debug, Clone)]
pub struct PluginFixture {
    plugin: Plugin,
}

impl PluginFixture {
    /// Start an empty plugin
    pub fn new(name: impl Into<PluginName>) -> Self {
        Self {
            plugin: Plugin::new(name.into()),
        }
    }

    /// Append a master
    pub fn master(mut self, name: impl Into<PluginName>) -> Self {
        self.plugin.header.masters.push(MasterEntry::new(name.into()));
        self
    }

    /// Set the header description
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.plugin.header.description = Some(text.into());
        self
    }

    /// Append a header sub-record written verbatim after the masters
    pub fn header_field(mut self, field: Subrecord) -> Self {
        self.plugin.header.extra.push(field);
        self
    }

    /// Add header flags
    pub fn flags(mut self, flags: RecordFlags) -> Self {
        self.plugin.header.flags |= flags;
        self
    }

    /// Append a record to the top group of its signature
    pub fn record(mut self, record: RawRecord) -> Self {
        let signature = record.signature();
        let index = match self.plugin.groups.iter().position(|g| g.label() == signature) {
            Some(index) => index,
            None => {
                self.plugin.groups.push(Group::top(signature));
                self.plugin.groups.len() - 1
            }
        };
        self.plugin.groups[index].entries.push(Entry::Record(record));
        self
    }

    /// Append a record from its sub-records
    pub fn raw(self, signature: Signature, form_id: u32, subrecords: Vec<Subrecord>) -> Self {
        self.record(RawRecord::new(
            signature,
            FormId::new(form_id),
            RecordFlags::empty(),
            subrecords,
        ))
    }

    /// Append a float `GLOB`
    pub fn global(self, form_id: u32, editor_id: &str, value: f32) -> Self {
        self.raw(
            sigs::GLOB,
            form_id,
            vec![
                Subrecord::from_zstring(sigs::EDID, editor_id),
                Subrecord::from_u8(sigs::FNAM, b'f'),
                Subrecord::from_f32(sigs::FLTV, value),
            ],
        )
    }

    /// Append a `KYWD` with only an editor id
    pub fn keyword(self, form_id: u32, editor_id: &str) -> Self {
        self.raw(
            sigs::KYWD,
            form_id,
            vec![Subrecord::from_zstring(sigs::EDID, editor_id)],
        )
    }

    /// Append a `MISC` with value, weight and keywords
    pub fn misc_item(
        self,
        form_id: u32,
        editor_id: &str,
        value: i32,
        weight: f32,
        keywords: &[u32],
    ) -> Self {
        let mut subrecords = vec![Subrecord::from_zstring(sigs::EDID, editor_id)];
        if !keywords.is_empty() {
            subrecords.push(Subrecord::from_u32(sigs::KSIZ, keywords.len() as u32));
            let kwda = keywords.iter().flat_map(|k| k.to_le_bytes()).collect();
            subrecords.push(Subrecord::new(sigs::KWDA, kwda));
        }
        let mut data = value.to_le_bytes().to_vec();
        data.extend_from_slice(&weight.to_le_bytes());
        subrecords.push(Subrecord::new(sigs::DATA, data));
        self.raw(sigs::MISC, form_id, subrecords)
    }

    /// Append an `LVLI` from `(level, reference, count)` entries
    pub fn leveled_item(self, form_id: u32, editor_id: &str, entries: &[(u16, u32, u16)]) -> Self {
        let mut subrecords = vec![
            Subrecord::from_zstring(sigs::EDID, editor_id),
            Subrecord::from_u8(sigs::LVLD, 0),
            Subrecord::from_u8(sigs::LVLF, 1),
            Subrecord::from_u8(sigs::LLCT, entries.len() as u8),
        ];
        for &(level, reference, count) in entries {
            let mut data = Vec::with_capacity(12);
            data.extend_from_slice(&level.to_le_bytes());
            data.extend_from_slice(&[0, 0]);
            data.extend_from_slice(&reference.to_le_bytes());
            data.extend_from_slice(&count.to_le_bytes());
            data.extend_from_slice(&[0, 0]);
            subrecords.push(Subrecord::new(sigs::LVLO, data));
        }
        self.raw(sigs::LVLI, form_id, subrecords)
    }

    /// Append a deleted record with no payload
    pub fn deleted(self, signature: Signature, form_id: u32) -> Self {
        self.record(RawRecord::new(
            signature,
            FormId::new(form_id),
            RecordFlags::DELETED,
            Vec::new(),
        ))
    }

    /// Finish, filling in the `HEDR` record count
    pub fn build(mut self) -> Plugin {
        self.plugin.header.record_count = self.plugin.count_records() as u32;
        self.plugin
    }

    /// Finish and encode
    pub fn to_bytes(self) -> Result<Vec<u8>> {
        self.build().encode(&EncodeOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::DecodeLimits;

    #[test]
    fn test_fixture_decodes() {
        let bytes = PluginFixture::new("Gems.esp")
            .master("Skyrim.esm")
            .global(0x0100_0800, "GemRate", 2.0)
            .leveled_item(0x0100_0801, "LItemGems", &[(1, 0x0100_0802, 1)])
            .misc_item(0x0100_0802, "Ruby", 40, 0.1, &[])
            .deleted(sigs::MISC, 0x0000_0010)
            .to_bytes()
            .unwrap();
        let plugin =
            Plugin::decode(PluginName::new("Gems.esp"), &bytes, &DecodeLimits::default()).unwrap();
        assert_eq!(plugin.masters(), vec![PluginName::new("Skyrim.esm")]);
        assert_eq!(plugin.groups.len(), 3);
        assert_eq!(plugin.records().count(), 4);
        assert_eq!(plugin.header.record_count, 7);
        assert!(plugin.records().last().unwrap().is_deleted());
    }
}
