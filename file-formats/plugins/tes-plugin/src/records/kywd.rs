//! `KYWD` keywords

use super::fields::{FieldGroup, FieldMap, FieldReader, FieldValue, FieldWriter, put};
use super::{Category, FieldContext};
use crate::Result;
use crate::formid::FormIdContext;
use crate::signature::{Signature, sigs};
use crate::subrecord::Subrecord;

/// A keyword
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyword {
    /// Editor id
    pub editor_id: Option<String>,
    /// `CNAM` editor colour, packed RGBA
    pub color: Option<u32>,
}

impl Category for Keyword {
    const SIGNATURE: Signature = sigs::KYWD;

    fn decode(subrecords: &[Subrecord], _ctx: &FieldContext<'_>) -> Result<Option<Self>> {
        let mut editor_id = None;
        let mut color = None;
        for sub in subrecords {
            let fresh = match sub.signature {
                sigs::EDID => sub.read_zstring().is_some_and(|s| put(&mut editor_id, s)),
                sigs::CNAM => put(&mut color, sub.read_u32(Self::SIGNATURE)?),
                _ => false,
            };
            if !fresh {
                return Ok(None);
            }
        }
        Ok(Some(Self { editor_id, color }))
    }

    fn encode(&self, _ids: &FormIdContext) -> Result<Vec<Subrecord>> {
        let mut out = Vec::with_capacity(2);
        if let Some(editor_id) = &self.editor_id {
            out.push(Subrecord::from_zstring(sigs::EDID, editor_id));
        }
        if let Some(color) = self.color {
            out.push(Subrecord::from_u32(sigs::CNAM, color));
        }
        Ok(out)
    }

    fn field_group(field: &str) -> Option<FieldGroup> {
        match field {
            "editor_id" => Some(FieldGroup::Identity),
            "color" => Some(FieldGroup::Graphics),
            _ => None,
        }
    }

    fn to_fields(&self) -> FieldMap {
        let mut fields = FieldWriter::default();
        fields
            .set("editor_id", self.editor_id.clone().map(FieldValue::Text))
            .set("color", self.color.map(FieldValue::UInt32));
        fields.finish()
    }

    fn from_fields(fields: &FieldMap) -> Result<Self> {
        let reader = FieldReader::new(Self::SIGNATURE, fields, Self::field_group)?;
        Ok(Self {
            editor_id: reader.text("editor_id")?,
            color: reader.uint32("color")?,
        })
    }
}
