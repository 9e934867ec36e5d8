//! `MISC` miscellaneous items

use super::fields::{
    FieldGroup, FieldMap, FieldReader, FieldValue, FieldWriter, LString, ObjectBounds, put,
};
use super::{Category, FieldContext};
use crate::formid::{FormId, FormIdContext, GlobalFormId};
use crate::signature::{Signature, sigs};
use crate::subrecord::Subrecord;
use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

/// A miscellaneous item
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MiscItem {
    /// Editor id
    pub editor_id: Option<String>,
    /// `OBND`
    pub bounds: Option<ObjectBounds>,
    /// `FULL` display name
    pub name: Option<LString>,
    /// `MODL` model path
    pub model: Option<String>,
    /// `MODT` texture hashes, uninterpreted
    pub model_data: Option<Vec<u8>>,
    /// `ICON` inventory icon
    pub icon: Option<String>,
    /// `KSIZ`/`KWDA` keywords
    pub keywords: Vec<GlobalFormId>,
    /// Gold value, first half of `DATA`
    ///
    /// `DATA` is written when either half is set, with the other half as 0.
    pub value: Option<i32>,
    /// Weight, second half of `DATA`
    pub weight: Option<f32>,
}

/// Decode a `KSIZ`/`KWDA` pair; `None` when the two disagree or an entry is null
pub(crate) fn decode_keywords(
    count: Option<&Subrecord>,
    data: Option<&Subrecord>,
    record: Signature,
    ids: &FormIdContext,
) -> Result<Option<Vec<GlobalFormId>>> {
    let (count, data) = match (count, data) {
        (None, None) => return Ok(Some(Vec::new())),
        (Some(count), Some(data)) => (count.read_u32(record)? as usize, data),
        _ => return Ok(None),
    };
    data.expect_len(record, count.saturating_mul(4))?;
    let mut keywords = Vec::with_capacity(count);
    let mut cursor = &data.data[..];
    for _ in 0..count {
        let raw = FormId::new(cursor.read_u32::<LittleEndian>()?);
        match ids.resolve(raw)? {
            Some(id) => keywords.push(id),
            None => return Ok(None),
        }
    }
    Ok(Some(keywords))
}

/// Encode keywords as `KSIZ`/`KWDA`; nothing for an empty list
pub(crate) fn encode_keywords(
    keywords: &[GlobalFormId],
    ids: &FormIdContext,
    out: &mut Vec<Subrecord>,
) -> Result<()> {
    if keywords.is_empty() {
        return Ok(());
    }
    let count = u32::try_from(keywords.len())
        .map_err(|_| Error::malformed("more than 4G keywords"))?;
    let mut data = Vec::with_capacity(keywords.len() * 4);
    for keyword in keywords {
        data.write_u32::<LittleEndian>(ids.localize(keyword)?.raw())?;
    }
    out.push(Subrecord::from_u32(sigs::KSIZ, count));
    out.push(Subrecord::new(sigs::KWDA, data));
    Ok(())
}

impl Category for MiscItem {
    const SIGNATURE: Signature = sigs::MISC;

    fn decode(subrecords: &[Subrecord], ctx: &FieldContext<'_>) -> Result<Option<Self>> {
        let mut item = MiscItem::default();
        let mut ksiz = None;
        let mut kwda = None;
        let mut data = None;
        for sub in subrecords {
            let fresh = match sub.signature {
                sigs::EDID => sub.read_zstring().is_some_and(|s| put(&mut item.editor_id, s)),
                sigs::OBND => put(&mut item.bounds, ObjectBounds::decode(sub, Self::SIGNATURE)?),
                sigs::FULL => match LString::decode(sub, Self::SIGNATURE, ctx.localized)? {
                    Some(name) => put(&mut item.name, name),
                    None => false,
                },
                sigs::MODL => sub.read_zstring().is_some_and(|s| put(&mut item.model, s)),
                sigs::MODT => put(&mut item.model_data, sub.data.clone()),
                sigs::ICON => sub.read_zstring().is_some_and(|s| put(&mut item.icon, s)),
                sigs::KSIZ => put(&mut ksiz, sub),
                sigs::KWDA => put(&mut kwda, sub),
                sigs::DATA => put(&mut data, sub),
                _ => false,
            };
            if !fresh {
                return Ok(None);
            }
        }

        match decode_keywords(ksiz, kwda, Self::SIGNATURE, ctx.ids)? {
            Some(keywords) => item.keywords = keywords,
            None => return Ok(None),
        }
        if let Some(data) = data {
            data.expect_len(Self::SIGNATURE, 8)?;
            let mut cursor = &data.data[..];
            item.value = Some(cursor.read_i32::<LittleEndian>()?);
            item.weight = Some(cursor.read_f32::<LittleEndian>()?);
        }
        Ok(Some(item))
    }

    fn encode(&self, ids: &FormIdContext) -> Result<Vec<Subrecord>> {
        let mut out = Vec::with_capacity(9);
        if let Some(editor_id) = &self.editor_id {
            out.push(Subrecord::from_zstring(sigs::EDID, editor_id));
        }
        if let Some(bounds) = &self.bounds {
            out.push(bounds.encode(sigs::OBND));
        }
        if let Some(name) = &self.name {
            out.push(name.encode(sigs::FULL));
        }
        if let Some(model) = &self.model {
            out.push(Subrecord::from_zstring(sigs::MODL, model));
        }
        if let Some(model_data) = &self.model_data {
            out.push(Subrecord::new(sigs::MODT, model_data.clone()));
        }
        if let Some(icon) = &self.icon {
            out.push(Subrecord::from_zstring(sigs::ICON, icon));
        }
        encode_keywords(&self.keywords, ids, &mut out)?;
        if self.value.is_some() || self.weight.is_some() {
            let mut data = Vec::with_capacity(8);
            data.write_i32::<LittleEndian>(self.value.unwrap_or(0))?;
            data.write_f32::<LittleEndian>(self.weight.unwrap_or(0.0))?;
            out.push(Subrecord::new(sigs::DATA, data));
        }
        Ok(out)
    }

    fn field_group(field: &str) -> Option<FieldGroup> {
        match field {
            "editor_id" => Some(FieldGroup::Identity),
            "bounds" => Some(FieldGroup::Bounds),
            "name" => Some(FieldGroup::Names),
            "model" | "model_data" | "icon" => Some(FieldGroup::Graphics),
            "keywords" => Some(FieldGroup::Keywords),
            "value" | "weight" => Some(FieldGroup::Stats),
            _ => None,
        }
    }

    fn to_fields(&self) -> FieldMap {
        let keywords = (!self.keywords.is_empty()).then(|| {
            FieldValue::Array(self.keywords.iter().cloned().map(FieldValue::FormId).collect())
        });
        let mut fields = FieldWriter::default();
        fields
            .set("editor_id", self.editor_id.clone().map(FieldValue::Text))
            .set("bounds", self.bounds.map(FieldValue::Bounds))
            .set("name", self.name.clone().map(FieldValue::LString))
            .set("model", self.model.clone().map(FieldValue::Text))
            .set("model_data", self.model_data.clone().map(FieldValue::Bytes))
            .set("icon", self.icon.clone().map(FieldValue::Text))
            .set("keywords", keywords)
            .set("value", self.value.map(FieldValue::Int32))
            .set("weight", self.weight.map(FieldValue::Float32));
        fields.finish()
    }

    fn from_fields(fields: &FieldMap) -> Result<Self> {
        let reader = FieldReader::new(Self::SIGNATURE, fields, Self::field_group)?;
        let value = reader.int32("value")?;
        let weight = reader.float32("weight")?;
        // DATA holds both halves, one cannot be cleared on its own
        if value.is_some() != weight.is_some() {
            let missing = if value.is_none() { "value" } else { "weight" };
            return Err(Error::FieldType {
                record: Self::SIGNATURE,
                field: missing.to_string(),
                expected: "a value while the other half of DATA is set",
            });
        }
        Ok(Self {
            editor_id: reader.text("editor_id")?,
            bounds: reader.bounds("bounds")?,
            name: reader.lstring("name")?,
            model: reader.text("model")?,
            model_data: reader.bytes("model_data")?,
            icon: reader.text("icon")?,
            keywords: reader.form_ids("keywords")?.unwrap_or_default(),
            value,
            weight,
        })
    }
}
