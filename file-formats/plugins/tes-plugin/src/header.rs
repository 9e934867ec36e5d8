//! Record and group headers
//!
//! Both headers are 24 bytes and start with a signature, so a reader can peek
//! four bytes to decide which one follows.

use crate::formid::FormId;
use crate::signature::{Signature, sigs};
use crate::{Error, Result};
use bitflags::bitflags;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Size of a record or group header in bytes
pub const HEADER_SIZE: usize = 24;

bitflags! {
    /// Record header flags
    ///
    /// Several bits are reused with category-specific meanings; only the
    /// ones the engine acts on are named. Unknown bits are kept.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RecordFlags: u32 {
        /// File header: plugin is a master
        const MASTER = 0x0000_0001;
        /// Record is deleted
        const DELETED = 0x0000_0020;
        /// File header: strings live in external string tables
        const LOCALIZED = 0x0000_0080;
        /// File header: light plugin
        const LIGHT = 0x0000_0200;
        /// Record is ignored by the game
        const IGNORED = 0x0000_1000;
        /// Payload is zlib-compressed
        const COMPRESSED = 0x0004_0000;

        const _ = !0;
    }
}

/// Header of a single record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Category signature
    pub signature: Signature,
    /// Payload size in bytes, excluding this header
    pub data_size: u32,
    /// Flag bits
    pub flags: RecordFlags,
    /// Raw, plugin-scoped form id
    pub form_id: FormId,
    /// Version control stamp
    pub version_control: u32,
    /// Form version
    pub form_version: u16,
    /// Unused field, preserved
    pub unknown: u16,
}

impl RecordHeader {
    /// Create a header with zeroed bookkeeping fields
    pub fn new(signature: Signature, form_id: FormId, flags: RecordFlags) -> Self {
        Self {
            signature,
            data_size: 0,
            flags,
            form_id,
            version_control: 0,
            form_version: 44,
            unknown: 0,
        }
    }

    /// Read a header, including its signature
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut sig = [0u8; 4];
        reader.read_exact(&mut sig)?;
        Self::read_after_signature(reader, Signature::new(sig))
    }

    /// Read the remaining 20 bytes once the signature has been consumed
    pub fn read_after_signature<R: Read>(reader: &mut R, signature: Signature) -> Result<Self> {
        Ok(Self {
            signature,
            data_size: reader.read_u32::<LittleEndian>()?,
            flags: RecordFlags::from_bits_retain(reader.read_u32::<LittleEndian>()?),
            form_id: FormId::new(reader.read_u32::<LittleEndian>()?),
            version_control: reader.read_u32::<LittleEndian>()?,
            form_version: reader.read_u16::<LittleEndian>()?,
            unknown: reader.read_u16::<LittleEndian>()?,
        })
    }

    /// Write the header
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(self.signature.as_bytes())?;
        writer.write_u32::<LittleEndian>(self.data_size)?;
        writer.write_u32::<LittleEndian>(self.flags.bits())?;
        writer.write_u32::<LittleEndian>(self.form_id.raw())?;
        writer.write_u32::<LittleEndian>(self.version_control)?;
        writer.write_u16::<LittleEndian>(self.form_version)?;
        writer.write_u16::<LittleEndian>(self.unknown)?;
        Ok(())
    }

    /// Whether the record carries the deleted flag
    pub fn is_deleted(&self) -> bool {
        self.flags.contains(RecordFlags::DELETED)
    }

    /// Whether the payload is compressed
    pub fn is_compressed(&self) -> bool {
        self.flags.contains(RecordFlags::COMPRESSED)
    }
}

/// Kind of a group, as stored in the `group_type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupType {
    /// Top-level group; label is a record signature
    Top,
    /// Children of a worldspace
    WorldChildren,
    /// Interior cell block
    InteriorCellBlock,
    /// Interior cell sub-block
    InteriorCellSubBlock,
    /// Exterior cell block
    ExteriorCellBlock,
    /// Exterior cell sub-block
    ExteriorCellSubBlock,
    /// Children of a cell
    CellChildren,
    /// Children of a dialogue topic
    TopicChildren,
    /// Persistent children of a cell
    CellPersistentChildren,
    /// Temporary children of a cell
    CellTemporaryChildren,
    /// Visible distant children of a cell
    CellVisibleDistantChildren,
}

impl GroupType {
    /// Convert from the raw `group_type` field
    pub fn from_raw(raw: i32) -> Option<Self> {
        Some(match raw {
            0 => Self::Top,
            1 => Self::WorldChildren,
            2 => Self::InteriorCellBlock,
            3 => Self::InteriorCellSubBlock,
            4 => Self::ExteriorCellBlock,
            5 => Self::ExteriorCellSubBlock,
            6 => Self::CellChildren,
            7 => Self::TopicChildren,
            8 => Self::CellPersistentChildren,
            9 => Self::CellTemporaryChildren,
            10 => Self::CellVisibleDistantChildren,
            _ => return None,
        })
    }

    /// Raw `group_type` value
    pub fn to_raw(self) -> i32 {
        match self {
            Self::Top => 0,
            Self::WorldChildren => 1,
            Self::InteriorCellBlock => 2,
            Self::InteriorCellSubBlock => 3,
            Self::ExteriorCellBlock => 4,
            Self::ExteriorCellSubBlock => 5,
            Self::CellChildren => 6,
            Self::TopicChildren => 7,
            Self::CellPersistentChildren => 8,
            Self::CellTemporaryChildren => 9,
            Self::CellVisibleDistantChildren => 10,
        }
    }

    /// Whether the label holds the form id of a parent record
    pub fn label_is_form_id(self) -> bool {
        matches!(
            self,
            Self::WorldChildren
                | Self::CellChildren
                | Self::TopicChildren
                | Self::CellPersistentChildren
                | Self::CellTemporaryChildren
                | Self::CellVisibleDistantChildren
        )
    }
}

/// Header of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupHeader {
    /// Total group size, including this header
    pub group_size: u32,
    /// Signature, parent form id or block number depending on the type
    pub label: [u8; 4],
    /// Group kind
    pub group_type: GroupType,
    /// Version control stamp
    pub version_control: u32,
    /// Unused field, preserved
    pub unknown: u32,
}

impl GroupHeader {
    /// Create a top group header for a record category
    pub fn top(signature: Signature) -> Self {
        Self {
            group_size: HEADER_SIZE as u32,
            label: *signature.as_bytes(),
            group_type: GroupType::Top,
            version_control: 0,
            unknown: 0,
        }
    }

    /// Read the remaining 20 bytes once `GRUP` has been consumed
    pub fn read_after_signature<R: Read>(reader: &mut R) -> Result<Self> {
        let group_size = reader.read_u32::<LittleEndian>()?;
        let mut label = [0u8; 4];
        reader.read_exact(&mut label)?;
        let raw_type = reader.read_i32::<LittleEndian>()?;
        let group_type = GroupType::from_raw(raw_type)
            .ok_or_else(|| Error::malformed(format!("unknown group type {raw_type}")))?;
        Ok(Self {
            group_size,
            label,
            group_type,
            version_control: reader.read_u32::<LittleEndian>()?,
            unknown: reader.read_u32::<LittleEndian>()?,
        })
    }

    /// Write the header, including the `GRUP` signature
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(sigs::GRUP.as_bytes())?;
        writer.write_u32::<LittleEndian>(self.group_size)?;
        writer.write_all(&self.label)?;
        writer.write_i32::<LittleEndian>(self.group_type.to_raw())?;
        writer.write_u32::<LittleEndian>(self.version_control)?;
        writer.write_u32::<LittleEndian>(self.unknown)?;
        Ok(())
    }

    /// Label read as a record signature (top groups)
    pub fn label_signature(&self) -> Signature {
        Signature::new(self.label)
    }

    /// Label read as a parent form id, for group types that carry one
    pub fn label_form_id(&self) -> Option<FormId> {
        self.group_type
            .label_is_form_id()
            .then(|| FormId::new(u32::from_le_bytes(self.label)))
    }
}
