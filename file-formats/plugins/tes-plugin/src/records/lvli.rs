//! `LVLI` leveled item lists

use super::fields::{
    EntryExtra, FieldGroup, FieldMap, FieldReader, FieldValue, FieldWriter, LeveledEntry,
    ObjectBounds, put, read_reference,
};
use super::{Category, FieldContext};
use crate::formid::{FormId, FormIdContext, GlobalFormId};
use crate::signature::{Signature, sigs};
use crate::subrecord::Subrecord;
use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

/// `LVLO` payload size
const ENTRY_SIZE: usize = 12;

/// `COED` payload size
const EXTRA_SIZE: usize = 12;

/// A leveled item list
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LeveledItem {
    /// Editor id
    pub editor_id: Option<String>,
    /// `OBND`
    pub bounds: Option<ObjectBounds>,
    /// `LVLD` chance that nothing is picked, in percent
    pub chance_none: Option<u8>,
    /// `LVLF` list flags
    pub flags: Option<u8>,
    /// `LVLG` global overriding the chance
    pub global: Option<GlobalFormId>,
    /// `LLCT` and its `LVLO`/`COED` entries; `None` without `LLCT`
    pub entries: Option<Vec<LeveledEntry>>,
}

/// `LVLO`; `None` for a null reference
fn decode_entry(sub: &Subrecord, ids: &FormIdContext) -> Result<Option<LeveledEntry>> {
    sub.expect_len(sigs::LVLI, ENTRY_SIZE)?;
    let mut cursor = &sub.data[..];
    let level = cursor.read_u16::<LittleEndian>()?;
    let _pad = cursor.read_u16::<LittleEndian>()?;
    let reference = ids.resolve(FormId::new(cursor.read_u32::<LittleEndian>()?))?;
    let count = cursor.read_u16::<LittleEndian>()?;
    Ok(reference.map(|reference| LeveledEntry {
        level,
        reference,
        count,
        extra: None,
    }))
}

/// `COED`; `None` when the rank looks like a global reference
fn decode_extra(sub: &Subrecord, ids: &FormIdContext) -> Result<Option<EntryExtra>> {
    sub.expect_len(sigs::LVLI, EXTRA_SIZE)?;
    let mut cursor = &sub.data[..];
    let owner = ids.resolve(FormId::new(cursor.read_u32::<LittleEndian>()?))?;
    let rank = cursor.read_u32::<LittleEndian>()?;
    let condition = cursor.read_f32::<LittleEndian>()?;
    // an NPC owner stores a global form id in the rank slot
    if owner.is_some() && !(-1..0x800).contains(&(rank as i32)) {
        return Ok(None);
    }
    Ok(Some(EntryExtra {
        owner,
        rank,
        condition,
    }))
}

impl Category for LeveledItem {
    const SIGNATURE: Signature = sigs::LVLI;

    fn decode(subrecords: &[Subrecord], ctx: &FieldContext<'_>) -> Result<Option<Self>> {
        let mut list = LeveledItem::default();
        let mut declared = None;
        let mut entries: Vec<LeveledEntry> = Vec::new();
        for sub in subrecords {
            let fresh = match sub.signature {
                sigs::EDID => sub.read_zstring().is_some_and(|s| put(&mut list.editor_id, s)),
                sigs::OBND => put(&mut list.bounds, ObjectBounds::decode(sub, Self::SIGNATURE)?),
                sigs::LVLD => put(&mut list.chance_none, sub.read_u8(Self::SIGNATURE)?),
                sigs::LVLF => put(&mut list.flags, sub.read_u8(Self::SIGNATURE)?),
                sigs::LVLG => match read_reference(sub, Self::SIGNATURE, ctx.ids)? {
                    Some(global) => put(&mut list.global, global),
                    None => false,
                },
                sigs::LLCT => put(&mut declared, sub.read_u8(Self::SIGNATURE)?),
                sigs::LVLO => match decode_entry(sub, ctx.ids)? {
                    Some(entry) => {
                        entries.push(entry);
                        true
                    }
                    None => false,
                },
                sigs::COED => match (entries.last_mut(), decode_extra(sub, ctx.ids)?) {
                    (Some(entry), Some(extra)) => put(&mut entry.extra, extra),
                    _ => false,
                },
                _ => false,
            };
            if !fresh {
                return Ok(None);
            }
        }

        match declared {
            Some(count) if usize::from(count) == entries.len() => list.entries = Some(entries),
            None if entries.is_empty() => {}
            _ => return Ok(None),
        }
        Ok(Some(list))
    }

    fn encode(&self, ids: &FormIdContext) -> Result<Vec<Subrecord>> {
        let mut out = Vec::with_capacity(6);
        if let Some(editor_id) = &self.editor_id {
            out.push(Subrecord::from_zstring(sigs::EDID, editor_id));
        }
        if let Some(bounds) = &self.bounds {
            out.push(bounds.encode(sigs::OBND));
        }
        if let Some(chance) = self.chance_none {
            out.push(Subrecord::from_u8(sigs::LVLD, chance));
        }
        if let Some(flags) = self.flags {
            out.push(Subrecord::from_u8(sigs::LVLF, flags));
        }
        if let Some(global) = &self.global {
            out.push(Subrecord::from_form_id(sigs::LVLG, ids.localize(global)?));
        }
        if let Some(entries) = &self.entries {
            let count = u8::try_from(entries.len()).map_err(|_| {
                Error::resource_limit(format!(
                    "{} entries do not fit a leveled list of at most 255",
                    entries.len()
                ))
            })?;
            out.push(Subrecord::from_u8(sigs::LLCT, count));
            for entry in entries {
                let mut data = Vec::with_capacity(ENTRY_SIZE);
                data.write_u16::<LittleEndian>(entry.level)?;
                data.write_u16::<LittleEndian>(0)?;
                data.write_u32::<LittleEndian>(ids.localize(&entry.reference)?.raw())?;
                data.write_u16::<LittleEndian>(entry.count)?;
                data.write_u16::<LittleEndian>(0)?;
                out.push(Subrecord::new(sigs::LVLO, data));

                if let Some(extra) = &entry.extra {
                    let mut data = Vec::with_capacity(EXTRA_SIZE);
                    data.write_u32::<LittleEndian>(ids.localize_opt(extra.owner.as_ref())?.raw())?;
                    data.write_u32::<LittleEndian>(extra.rank)?;
                    data.write_f32::<LittleEndian>(extra.condition)?;
                    out.push(Subrecord::new(sigs::COED, data));
                }
            }
        }
        Ok(out)
    }

    fn field_group(field: &str) -> Option<FieldGroup> {
        match field {
            "editor_id" => Some(FieldGroup::Identity),
            "bounds" => Some(FieldGroup::Bounds),
            "chance_none" | "global" => Some(FieldGroup::Values),
            "flags" => Some(FieldGroup::Flags),
            "entries" => Some(FieldGroup::Entries),
            _ => None,
        }
    }

    fn to_fields(&self) -> FieldMap {
        let entries = self.entries.as_ref().map(|entries| {
            FieldValue::Array(entries.iter().cloned().map(FieldValue::Entry).collect())
        });
        let mut fields = FieldWriter::default();
        fields
            .set("editor_id", self.editor_id.clone().map(FieldValue::Text))
            .set("bounds", self.bounds.map(FieldValue::Bounds))
            .set("chance_none", self.chance_none.map(FieldValue::UInt8))
            .set("flags", self.flags.map(FieldValue::UInt8))
            .set("global", self.global.clone().map(FieldValue::FormId))
            .set("entries", entries);
        fields.finish()
    }

    fn from_fields(fields: &FieldMap) -> Result<Self> {
        let reader = FieldReader::new(Self::SIGNATURE, fields, Self::field_group)?;
        Ok(Self {
            editor_id: reader.text("editor_id")?,
            bounds: reader.bounds("bounds")?,
            chance_none: reader.uint8("chance_none")?,
            flags: reader.uint8("flags")?,
            global: reader.form_id("global")?,
            entries: reader.entries("entries")?,
        })
    }
}
