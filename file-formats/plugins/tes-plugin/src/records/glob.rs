//! `GLOB` global variables

use super::fields::{FieldGroup, FieldMap, FieldReader, FieldValue, FieldWriter, put};
use super::{Category, FieldContext};
use crate::Result;
use crate::formid::FormIdContext;
use crate::signature::{Signature, sigs};
use crate::subrecord::Subrecord;

/// A global variable
#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    /// Editor id
    pub editor_id: Option<String>,
    /// `FNAM` type: `s` short, `l` long, `f` float
    pub kind: Option<u8>,
    /// `FLTV` value, always stored as a float
    pub value: Option<f32>,
}

impl Category for Global {
    const SIGNATURE: Signature = sigs::GLOB;

    fn decode(subrecords: &[Subrecord], _ctx: &FieldContext<'_>) -> Result<Option<Self>> {
        let mut editor_id = None;
        let mut kind = None;
        let mut value = None;
        for sub in subrecords {
            let fresh = match sub.signature {
                sigs::EDID => sub.read_zstring().is_some_and(|s| put(&mut editor_id, s)),
                sigs::FNAM => put(&mut kind, sub.read_u8(Self::SIGNATURE)?),
                sigs::FLTV => put(&mut value, sub.read_f32(Self::SIGNATURE)?),
                _ => false,
            };
            if !fresh {
                return Ok(None);
            }
        }
        Ok(Some(Self {
            editor_id,
            kind,
            value,
        }))
    }

    fn encode(&self, _ids: &FormIdContext) -> Result<Vec<Subrecord>> {
        let mut out = Vec::with_capacity(3);
        if let Some(editor_id) = &self.editor_id {
            out.push(Subrecord::from_zstring(sigs::EDID, editor_id));
        }
        if let Some(kind) = self.kind {
            out.push(Subrecord::from_u8(sigs::FNAM, kind));
        }
        if let Some(value) = self.value {
            out.push(Subrecord::from_f32(sigs::FLTV, value));
        }
        Ok(out)
    }

    fn field_group(field: &str) -> Option<FieldGroup> {
        match field {
            "editor_id" => Some(FieldGroup::Identity),
            "type" | "value" => Some(FieldGroup::Values),
            _ => None,
        }
    }

    fn to_fields(&self) -> FieldMap {
        let mut fields = FieldWriter::default();
        fields
            .set("editor_id", self.editor_id.clone().map(FieldValue::Text))
            .set("type", self.kind.map(FieldValue::UInt8))
            .set("value", self.value.map(FieldValue::Float32));
        fields.finish()
    }

    fn from_fields(fields: &FieldMap) -> Result<Self> {
        let reader = FieldReader::new(Self::SIGNATURE, fields, Self::field_group)?;
        Ok(Self {
            editor_id: reader.text("editor_id")?,
            kind: reader.uint8("type")?,
            value: reader.float32("value")?,
        })
    }
}
