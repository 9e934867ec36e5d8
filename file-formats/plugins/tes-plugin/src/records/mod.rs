//! Typed record model
//!
//! Each supported category decodes its sub-records into a struct whose
//! form-id-valued fields are [`GlobalFormId`]s, so values read from different
//! plugins compare directly. A record whose layout is not fully understood
//! stays [`RecordData::Opaque`] and keeps its sub-records verbatim.
//!
//! ```no_run
//! use tes_plugin::records::{FieldContext, FieldValue, TypedRecord};
//! # fn example(plugin: &tes_plugin::Plugin) -> tes_plugin::Result<()> {
//! let ids = plugin.form_id_context();
//! let ctx = FieldContext { ids: &ids, localized: plugin.is_localized() };
//! for raw in plugin.records() {
//!     let mut record = TypedRecord::decode(raw, &ctx)?;
//!     if record.field("weight").is_some() {
//!         record.set_field("weight", Some(FieldValue::Float32(0.0)))?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod fields;
pub mod flst;
pub mod glob;
pub mod gmst;
pub mod kywd;
pub mod lvli;
pub mod misc;

pub use fields::{
    EntryExtra, FieldGroup, FieldMap, FieldValue, LString, LeveledEntry, ObjectBounds,
};
pub use flst::FormList;
pub use glob::Global;
pub use gmst::{GameSetting, SettingValue};
pub use kywd::Keyword;
pub use lvli::LeveledItem;
pub use misc::MiscItem;

use crate::formid::{FormIdContext, GlobalFormId};
use crate::header::{RecordFlags, RecordHeader};
use crate::record::RawRecord;
use crate::signature::{Signature, sigs};
use crate::subrecord::Subrecord;
use crate::{Error, Result};

/// What a category decoder needs besides the bytes
#[derive(Debug, Clone, Copy)]
pub struct FieldContext<'a> {
    /// Master list the record was read against
    pub ids: &'a FormIdContext,
    /// Whether the source plugin keeps its strings in string tables
    pub localized: bool,
}

/// A record category with a typed field layout
pub trait Category: Sized {
    /// Record signature
    const SIGNATURE: Signature;

    /// Decode sub-records; `None` when the layout is not fully understood
    fn decode(subrecords: &[Subrecord], ctx: &FieldContext<'_>) -> Result<Option<Self>>;

    /// Encode into sub-records in canonical order, localized to `ids`
    fn encode(&self, ids: &FormIdContext) -> Result<Vec<Subrecord>>;

    /// Group a field belongs to; `None` for unknown names
    fn field_group(field: &str) -> Option<FieldGroup>;

    /// Present fields by name
    fn to_fields(&self) -> FieldMap;

    /// Rebuild from named fields; missing names mean absent fields
    fn from_fields(fields: &FieldMap) -> Result<Self>;
}

/// Decoded payload of a record
#[derive(Debug, Clone, PartialEq)]
pub enum RecordData {
    /// `GMST`
    GameSetting(GameSetting),
    /// `GLOB`
    Global(Global),
    /// `KYWD`
    Keyword(Keyword),
    /// `FLST`
    FormList(FormList),
    /// `MISC`
    MiscItem(MiscItem),
    /// `LVLI`
    LeveledItem(LeveledItem),
    /// Anything else, sub-records kept as read
    Opaque(Vec<Subrecord>),
}

fn decode_as<C: Category>(
    subrecords: &[Subrecord],
    ctx: &FieldContext<'_>,
    wrap: fn(C) -> RecordData,
) -> Result<RecordData> {
    let Some(data) = C::decode(subrecords, ctx)? else {
        log::trace!("{} record kept opaque", C::SIGNATURE);
        return Ok(RecordData::Opaque(subrecords.to_vec()));
    };
    // Only layouts the encoder reproduces exactly are typed
    match data.encode(ctx.ids) {
        Ok(written) if written == subrecords => Ok(wrap(data)),
        _ => {
            log::trace!("{} record is not in canonical layout, kept opaque", C::SIGNATURE);
            Ok(RecordData::Opaque(subrecords.to_vec()))
        }
    }
}

impl RecordData {
    /// Decode by signature
    pub fn decode(
        signature: Signature,
        subrecords: &[Subrecord],
        ctx: &FieldContext<'_>,
    ) -> Result<Self> {
        match signature {
            sigs::GMST => decode_as(subrecords, ctx, RecordData::GameSetting),
            sigs::GLOB => decode_as(subrecords, ctx, RecordData::Global),
            sigs::KYWD => decode_as(subrecords, ctx, RecordData::Keyword),
            sigs::FLST => decode_as(subrecords, ctx, RecordData::FormList),
            sigs::MISC => decode_as(subrecords, ctx, RecordData::MiscItem),
            sigs::LVLI => decode_as(subrecords, ctx, RecordData::LeveledItem),
            _ => Ok(RecordData::Opaque(subrecords.to_vec())),
        }
    }

    /// Encode; opaque data comes back unchanged and is only valid in its source plugin
    pub fn encode(&self, ids: &FormIdContext) -> Result<Vec<Subrecord>> {
        match self {
            RecordData::GameSetting(r) => r.encode(ids),
            RecordData::Global(r) => r.encode(ids),
            RecordData::Keyword(r) => r.encode(ids),
            RecordData::FormList(r) => r.encode(ids),
            RecordData::MiscItem(r) => r.encode(ids),
            RecordData::LeveledItem(r) => r.encode(ids),
            RecordData::Opaque(subrecords) => Ok(subrecords.clone()),
        }
    }

    /// Named fields; `None` for opaque data
    pub fn to_fields(&self) -> Option<FieldMap> {
        Some(match self {
            RecordData::GameSetting(r) => r.to_fields(),
            RecordData::Global(r) => r.to_fields(),
            RecordData::Keyword(r) => r.to_fields(),
            RecordData::FormList(r) => r.to_fields(),
            RecordData::MiscItem(r) => r.to_fields(),
            RecordData::LeveledItem(r) => r.to_fields(),
            RecordData::Opaque(_) => return None,
        })
    }

    /// Rebuild typed data of category `signature` from named fields
    pub fn from_fields(signature: Signature, fields: &FieldMap) -> Result<Self> {
        Ok(match signature {
            sigs::GMST => RecordData::GameSetting(GameSetting::from_fields(fields)?),
            sigs::GLOB => RecordData::Global(Global::from_fields(fields)?),
            sigs::KYWD => RecordData::Keyword(Keyword::from_fields(fields)?),
            sigs::FLST => RecordData::FormList(FormList::from_fields(fields)?),
            sigs::MISC => RecordData::MiscItem(MiscItem::from_fields(fields)?),
            sigs::LVLI => RecordData::LeveledItem(LeveledItem::from_fields(fields)?),
            other => return Err(Error::OpaqueRecord(other)),
        })
    }

    /// Whether the layout was not understood
    pub fn is_opaque(&self) -> bool {
        matches!(self, RecordData::Opaque(_))
    }
}

/// Whether `signature` has a typed layout
pub fn is_supported(signature: Signature) -> bool {
    matches!(
        signature,
        sigs::GMST | sigs::GLOB | sigs::KYWD | sigs::FLST | sigs::MISC | sigs::LVLI
    )
}

/// Field group of `field` in category `signature`
pub fn field_group(signature: Signature, field: &str) -> Option<FieldGroup> {
    match signature {
        sigs::GMST => GameSetting::field_group(field),
        sigs::GLOB => Global::field_group(field),
        sigs::KYWD => Keyword::field_group(field),
        sigs::FLST => FormList::field_group(field),
        sigs::MISC => MiscItem::field_group(field),
        sigs::LVLI => LeveledItem::field_group(field),
        _ => None,
    }
}

/// A record identified globally, with its payload decoded
#[derive(Debug, Clone, PartialEq)]
pub struct TypedRecord {
    /// Global identity
    pub id: GlobalFormId,
    /// Category signature
    pub signature: Signature,
    /// Header flags, without the compression bit
    pub flags: RecordFlags,
    /// Version control stamp
    pub version_control: u32,
    /// Form version
    pub form_version: u16,
    /// Payload
    pub data: RecordData,
}

impl TypedRecord {
    /// Decode a raw record read against `ctx`
    pub fn decode(raw: &RawRecord, ctx: &FieldContext<'_>) -> Result<Self> {
        let header = raw.header();
        Ok(Self {
            id: ctx.ids.resolve_record_id(header.form_id)?,
            signature: header.signature,
            flags: header.flags - RecordFlags::COMPRESSED,
            version_control: header.version_control,
            form_version: header.form_version,
            data: RecordData::decode(header.signature, raw.subrecords(), ctx)?,
        })
    }

    /// Encode against the master list of the plugin it will be written to
    pub fn encode(&self, ids: &FormIdContext) -> Result<RawRecord> {
        let mut header = RecordHeader::new(self.signature, ids.localize(&self.id)?, self.flags);
        header.version_control = self.version_control;
        header.form_version = self.form_version;
        Ok(RawRecord::from_header(header, self.data.encode(ids)?))
    }

    /// Named fields; `None` when opaque
    pub fn fields(&self) -> Option<FieldMap> {
        self.data.to_fields()
    }

    /// Value of one field, if present
    pub fn field(&self, name: &str) -> Option<FieldValue> {
        self.fields()?.remove(name)
    }

    /// Set or clear one field
    pub fn set_field(&mut self, name: &str, value: Option<FieldValue>) -> Result<()> {
        let mut fields = self.fields().ok_or(Error::OpaqueRecord(self.signature))?;
        if self.field_group(name).is_none() {
            return Err(Error::UnknownField {
                record: self.signature,
                field: name.to_string(),
            });
        }
        match value {
            Some(value) => fields.insert(name.to_string(), value),
            None => fields.remove(name),
        };
        self.data = RecordData::from_fields(self.signature, &fields)?;
        Ok(())
    }

    /// Copy of this record with its fields replaced
    pub fn with_fields(&self, fields: &FieldMap) -> Result<Self> {
        Ok(Self {
            data: RecordData::from_fields(self.signature, fields)?,
            ..self.clone()
        })
    }

    /// Group of a field in this record's category
    pub fn field_group(&self, name: &str) -> Option<FieldGroup> {
        field_group(self.signature, name)
    }

    /// Editor id, typed or raw
    pub fn editor_id(&self) -> Option<String> {
        match &self.data {
            RecordData::Opaque(subrecords) => subrecords
                .iter()
                .find(|s| s.signature == sigs::EDID)
                .map(Subrecord::read_zstring_lossy),
            _ => match self.field("editor_id")? {
                FieldValue::Text(text) => Some(text),
                _ => None,
            },
        }
    }

    /// Record id followed by every id referenced from its fields
    pub fn references(&self) -> Vec<GlobalFormId> {
        let mut refs = vec![self.id.clone()];
        if let Some(fields) = self.fields() {
            for value in fields.values() {
                refs.extend(value.references().into_iter().cloned());
            }
        }
        refs
    }

    /// Whether any field holds a string-table id
    pub fn has_localized_strings(&self) -> bool {
        self.fields()
            .is_some_and(|fields| fields.values().any(FieldValue::is_localized))
    }

    /// Whether the payload was not understood
    pub fn is_opaque(&self) -> bool {
        self.data.is_opaque()
    }

    /// Whether the record is flagged deleted
    pub fn is_deleted(&self) -> bool {
        self.flags.contains(RecordFlags::DELETED)
    }
}
