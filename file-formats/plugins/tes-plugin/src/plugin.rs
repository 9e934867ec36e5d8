//! Whole-plugin decode and encode
//!
//! A plugin is a `TES4` file header record followed by top-level groups, one
//! per record category.

use crate::formid::{FormId, FormIdContext, PluginName};
use crate::group::{Entry, Group, decode_entry};
use crate::header::{GroupType, HEADER_SIZE, RecordFlags, RecordHeader};
use crate::limits::{DecodeLimits, EncodeOptions};
use crate::record::RawRecord;
use crate::signature::{Signature, sigs};
use crate::subrecord::Subrecord;
use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

/// Lowest object index a plugin may allocate for its own records
pub const FIRST_OBJECT_INDEX: u32 = 0x800;

/// Highest object index usable by a light plugin
pub const LIGHT_MAX_OBJECT_INDEX: u32 = 0xFFF;

/// Header version written by current Skyrim Special Edition tools
pub const DEFAULT_HEADER_VERSION: f32 = 1.71;

/// One declared master: its name and the recorded file size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterEntry {
    /// Master file name
    pub name: PluginName,
    /// Value of the `DATA` field following `MAST`, usually 0
    pub data: u64,
}

impl MasterEntry {
    /// Create an entry with a zero `DATA` value
    pub fn new(name: PluginName) -> Self {
        Self { name, data: 0 }
    }
}

/// Decoded `TES4` file header
///
/// A decoded header remembers its sub-records as read. Encoding writes them
/// back unchanged while the `HEDR`, `CNAM`, `SNAM`, `MAST` and extra fields
/// still describe them, which keeps field order, missing terminators and
/// non-UTF-8 text intact. Once any of those fields is edited the header is
/// written in canonical order.
#[derive(Debug, Clone)]
pub struct PluginHeader {
    /// Header record flags (master, localized, light)
    pub flags: RecordFlags,
    /// `HEDR` format version
    pub version: f32,
    /// `HEDR` count of records and groups
    pub record_count: u32,
    /// `HEDR` next free object index
    pub next_object_id: u32,
    /// `CNAM` author
    pub author: Option<String>,
    /// `SNAM` description
    pub description: Option<String>,
    /// `MAST`/`DATA` pairs in file order
    pub masters: Vec<MasterEntry>,
    /// Remaining sub-records (`ONAM`, `INTV`, `INCC`...), kept verbatim
    pub extra: Vec<Subrecord>,
    /// Header version control stamp
    pub version_control: u32,
    /// Header form version
    pub form_version: u16,
    /// Header unknown field
    pub unknown: u16,
    source: Option<Vec<Subrecord>>,
}

impl PartialEq for PluginHeader {
    fn eq(&self, other: &Self) -> bool {
        self.flags == other.flags
            && self.version_control == other.version_control
            && self.form_version == other.form_version
            && self.unknown == other.unknown
            && self.same_fields(other)
    }
}

impl Default for PluginHeader {
    fn default() -> Self {
        Self {
            flags: RecordFlags::empty(),
            version: DEFAULT_HEADER_VERSION,
            record_count: 0,
            next_object_id: FIRST_OBJECT_INDEX,
            author: None,
            description: None,
            masters: Vec::new(),
            extra: Vec::new(),
            version_control: 0,
            form_version: 44,
            unknown: 0,
            source: None,
        }
    }
}

impl PluginHeader {
    fn from_record(record: &RawRecord) -> Result<Self> {
        let raw = record.header();
        let mut header = Self {
            flags: raw.flags,
            version_control: raw.version_control,
            form_version: raw.form_version,
            unknown: raw.unknown,
            ..Self::default()
        };
        header.read_fields(record.subrecords())?;
        header.source = Some(record.subrecords().to_vec());
        Ok(header)
    }

    fn read_fields(&mut self, fields: &[Subrecord]) -> Result<()> {
        let mut saw_hedr = false;
        let mut subrecords = fields.iter().peekable();
        while let Some(sub) = subrecords.next() {
            match sub.signature {
                sigs::HEDR => {
                    sub.expect_len(sigs::TES4, 12)?;
                    let mut cursor = Cursor::new(&sub.data);
                    self.version = cursor.read_f32::<LittleEndian>()?;
                    self.record_count = cursor.read_u32::<LittleEndian>()?;
                    self.next_object_id = cursor.read_u32::<LittleEndian>()?;
                    saw_hedr = true;
                }
                sigs::CNAM => self.author = Some(sub.read_zstring_lossy()),
                sigs::SNAM => self.description = Some(sub.read_zstring_lossy()),
                sigs::MAST => {
                    let name = sub.read_zstring().unwrap_or_else(|| {
                        let name = sub.read_zstring_lossy();
                        log::warn!("Master name {name:?} is not valid UTF-8");
                        name
                    });
                    let mut entry = MasterEntry::new(PluginName::new(name));
                    if let Some(data) = subrecords.next_if(|s| s.signature == sigs::DATA) {
                        data.expect_len(sigs::TES4, 8)?;
                        entry.data = (&data.data[..]).read_u64::<LittleEndian>()?;
                    }
                    self.masters.push(entry);
                }
                _ => self.extra.push(sub.clone()),
            }
        }
        if !saw_hedr {
            return Err(Error::malformed("TES4 header has no HEDR field"));
        }
        Ok(())
    }

    /// Whether the sub-record backed fields agree, comparing `version` bitwise
    fn same_fields(&self, other: &Self) -> bool {
        self.version.to_bits() == other.version.to_bits()
            && self.record_count == other.record_count
            && self.next_object_id == other.next_object_id
            && self.author == other.author
            && self.description == other.description
            && self.masters == other.masters
            && self.extra == other.extra
    }

    /// Sub-records as read, while the fields still describe them
    fn unchanged_source(&self) -> Option<&[Subrecord]> {
        let source = self.source.as_deref()?;
        let mut read = Self::default();
        read.read_fields(source).ok()?;
        read.same_fields(self).then_some(source)
    }

    fn canonical_subrecords(&self) -> Result<Vec<Subrecord>> {
        let mut subrecords = Vec::with_capacity(4 + 2 * self.masters.len() + self.extra.len());

        let mut hedr = Vec::with_capacity(12);
        hedr.write_f32::<LittleEndian>(self.version)?;
        hedr.write_u32::<LittleEndian>(self.record_count)?;
        hedr.write_u32::<LittleEndian>(self.next_object_id)?;
        subrecords.push(Subrecord::new(sigs::HEDR, hedr));

        if let Some(author) = &self.author {
            subrecords.push(Subrecord::from_zstring(sigs::CNAM, author));
        }
        if let Some(description) = &self.description {
            subrecords.push(Subrecord::from_zstring(sigs::SNAM, description));
        }
        for master in &self.masters {
            subrecords.push(Subrecord::from_zstring(sigs::MAST, master.name.as_str()));
            subrecords.push(Subrecord::new(sigs::DATA, master.data.to_le_bytes().to_vec()));
        }
        subrecords.extend(self.extra.iter().cloned());
        Ok(subrecords)
    }

    fn to_record(&self) -> Result<RawRecord> {
        let subrecords = match self.unchanged_source() {
            Some(source) => source.to_vec(),
            None => self.canonical_subrecords()?,
        };
        let header = RecordHeader {
            signature: sigs::TES4,
            data_size: 0,
            flags: self.flags - RecordFlags::COMPRESSED,
            form_id: FormId::NULL,
            version_control: self.version_control,
            form_version: self.form_version,
            unknown: self.unknown,
        };
        Ok(RawRecord::from_header(header, subrecords))
    }

    /// Declared master names in file order
    pub fn master_names(&self) -> Vec<PluginName> {
        self.masters.iter().map(|m| m.name.clone()).collect()
    }
}

/// A decoded plugin file
#[derive(Debug, Clone, PartialEq)]
pub struct Plugin {
    /// File name
    pub name: PluginName,
    /// File header
    pub header: PluginHeader,
    /// Top-level groups in file order
    pub groups: Vec<Group>,
}

impl Plugin {
    /// Create an empty plugin
    pub fn new(name: PluginName) -> Self {
        Self {
            name,
            header: PluginHeader::default(),
            groups: Vec::new(),
        }
    }

    /// Decode a plugin from its bytes
    ///
    /// Errors are tagged with the plugin name.
    pub fn decode(name: PluginName, bytes: &[u8], limits: &DecodeLimits) -> Result<Self> {
        Self::decode_inner(name.clone(), bytes, limits).map_err(|e| e.in_plugin(&name))
    }

    fn decode_inner(name: PluginName, bytes: &[u8], limits: &DecodeLimits) -> Result<Self> {
        if bytes.len() < HEADER_SIZE || bytes[..4] != *sigs::TES4.as_bytes() {
            return Err(Error::malformed("file does not start with a TES4 record"));
        }
        let (entry, mut rest) = decode_entry(bytes, 0, limits)?;
        let Entry::Record(tes4) = entry else {
            return Err(Error::malformed("file does not start with a TES4 record"));
        };
        if tes4.header().is_compressed() {
            return Err(Error::malformed("TES4 header must not be compressed"));
        }
        let header = PluginHeader::from_record(&tes4)?;

        let mut groups = Vec::new();
        while !rest.is_empty() {
            let (entry, tail) = decode_entry(rest, 0, limits)?;
            match entry {
                Entry::Group(group) if group.group_type() == GroupType::Top => groups.push(group),
                Entry::Group(group) => {
                    return Err(Error::malformed(format!(
                        "group {} of type {:?} at top level",
                        group.label(),
                        group.group_type()
                    )));
                }
                Entry::Record(record) => {
                    return Err(Error::malformed(format!(
                        "{} record {} outside of any group",
                        record.signature(),
                        record.form_id()
                    )));
                }
            }
            rest = tail;
        }

        log::debug!(
            "Decoded {name}: {} masters, {} top groups",
            header.masters.len(),
            groups.len()
        );
        Ok(Self { name, header, groups })
    }

    /// Encode the plugin to bytes
    pub fn encode(&self, options: &EncodeOptions) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.header.to_record()?.write(&mut out, options)?;
        for group in &self.groups {
            group.write(&mut out, options)?;
        }
        Ok(out)
    }

    /// Declared masters in file order
    pub fn masters(&self) -> Vec<PluginName> {
        self.header.master_names()
    }

    /// Context for resolving this plugin's raw form ids
    pub fn form_id_context(&self) -> FormIdContext {
        FormIdContext::new(self.name.clone(), self.masters())
    }

    /// Whether the master flag is set or the file is named `.esm`/`.esl`
    pub fn is_master(&self) -> bool {
        self.header.flags.contains(RecordFlags::MASTER)
            || matches!(self.name.extension(), Some("esm" | "esl"))
    }

    /// Whether the light flag is set or the file is named `.esl`
    pub fn is_light(&self) -> bool {
        self.header.flags.contains(RecordFlags::LIGHT) || self.name.extension() == Some("esl")
    }

    /// Whether string fields hold string-table ids
    pub fn is_localized(&self) -> bool {
        self.header.flags.contains(RecordFlags::LOCALIZED)
    }

    /// All records of all groups, depth first
    pub fn records(&self) -> impl Iterator<Item = &RawRecord> {
        self.groups.iter().flat_map(Group::records)
    }

    /// Top groups for a record category
    pub fn top_groups(&self, signature: Signature) -> impl Iterator<Item = &Group> {
        self.groups.iter().filter(move |g| g.label() == signature)
    }

    /// Number of records and groups, the value `HEDR` stores
    pub fn count_records(&self) -> usize {
        self.groups.iter().map(Group::count).sum()
    }

    /// Whether every record this plugin authors fits the light object range
    pub fn light_eligible(&self) -> bool {
        let own_index = self.header.masters.len();
        self.records()
            .filter(|r| r.form_id().master_index() as usize >= own_index)
            .all(|r| {
                (FIRST_OBJECT_INDEX..=LIGHT_MAX_OBJECT_INDEX).contains(&r.form_id().object_index())
            })
    }
}
