//! `FLST` form lists

use super::fields::{FieldGroup, FieldMap, FieldReader, FieldValue, FieldWriter, put, read_reference};
use super::{Category, FieldContext};
use crate::Result;
use crate::formid::{FormIdContext, GlobalFormId};
use crate::signature::{Signature, sigs};
use crate::subrecord::Subrecord;

/// An ordered list of records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormList {
    /// Editor id
    pub editor_id: Option<String>,
    /// `LNAM` items in list order
    pub entries: Vec<GlobalFormId>,
}

impl Category for FormList {
    const SIGNATURE: Signature = sigs::FLST;

    fn decode(subrecords: &[Subrecord], ctx: &FieldContext<'_>) -> Result<Option<Self>> {
        let mut editor_id = None;
        let mut entries = Vec::new();
        for sub in subrecords {
            let fresh = match sub.signature {
                sigs::EDID => sub.read_zstring().is_some_and(|s| put(&mut editor_id, s)),
                sigs::LNAM => match read_reference(sub, Self::SIGNATURE, ctx.ids)? {
                    Some(id) => {
                        entries.push(id);
                        true
                    }
                    None => false,
                },
                _ => false,
            };
            if !fresh {
                return Ok(None);
            }
        }
        Ok(Some(Self { editor_id, entries }))
    }

    fn encode(&self, ids: &FormIdContext) -> Result<Vec<Subrecord>> {
        let mut out = Vec::with_capacity(1 + self.entries.len());
        if let Some(editor_id) = &self.editor_id {
            out.push(Subrecord::from_zstring(sigs::EDID, editor_id));
        }
        for entry in &self.entries {
            out.push(Subrecord::from_form_id(sigs::LNAM, ids.localize(entry)?));
        }
        Ok(out)
    }

    fn field_group(field: &str) -> Option<FieldGroup> {
        match field {
            "editor_id" => Some(FieldGroup::Identity),
            "entries" => Some(FieldGroup::Entries),
            _ => None,
        }
    }

    fn to_fields(&self) -> FieldMap {
        let entries = (!self.entries.is_empty()).then(|| {
            FieldValue::Array(self.entries.iter().cloned().map(FieldValue::FormId).collect())
        });
        let mut fields = FieldWriter::default();
        fields
            .set("editor_id", self.editor_id.clone().map(FieldValue::Text))
            .set("entries", entries);
        fields.finish()
    }

    fn from_fields(fields: &FieldMap) -> Result<Self> {
        let reader = FieldReader::new(Self::SIGNATURE, fields, Self::field_group)?;
        Ok(Self {
            editor_id: reader.text("editor_id")?,
            entries: reader.form_ids("entries")?.unwrap_or_default(),
        })
    }
}
