//! `GMST` game settings

use super::fields::{FieldGroup, FieldMap, FieldReader, FieldValue, FieldWriter, LString, put};
use super::{Category, FieldContext};
use crate::formid::FormIdContext;
use crate::signature::{Signature, sigs};
use crate::subrecord::Subrecord;
use crate::{Error, Result};

/// Value of a game setting; the kind follows the editor id prefix
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    /// `b` prefix, stored as u32
    Bool(bool),
    /// `i` prefix
    Int(i32),
    /// `u` prefix
    UInt(u32),
    /// `f` prefix
    Float(f32),
    /// `s` prefix
    String(LString),
}

/// A game setting
#[derive(Debug, Clone, PartialEq)]
pub struct GameSetting {
    /// Editor id, whose first letter selects the value kind
    pub editor_id: String,
    /// Setting value
    pub value: Option<SettingValue>,
}

fn value_kind(editor_id: &str) -> Option<char> {
    editor_id
        .chars()
        .next()
        .map(|c| c.to_ascii_lowercase())
        .filter(|c| matches!(c, 'b' | 'i' | 'u' | 'f' | 's'))
}

impl Category for GameSetting {
    const SIGNATURE: Signature = sigs::GMST;

    fn decode(subrecords: &[Subrecord], ctx: &FieldContext<'_>) -> Result<Option<Self>> {
        let mut editor_id = None;
        let mut data = None;
        for sub in subrecords {
            let fresh = match sub.signature {
                sigs::EDID => sub.read_zstring().is_some_and(|s| put(&mut editor_id, s)),
                sigs::DATA => put(&mut data, sub),
                _ => false,
            };
            if !fresh {
                return Ok(None);
            }
        }
        let Some(editor_id) = editor_id else {
            return Ok(None);
        };
        let Some(kind) = value_kind(&editor_id) else {
            return Ok(None);
        };

        let value = match data {
            None => None,
            Some(sub) => Some(match kind {
                'b' => match sub.read_u32(Self::SIGNATURE)? {
                    0 => SettingValue::Bool(false),
                    1 => SettingValue::Bool(true),
                    _ => return Ok(None),
                },
                'i' => SettingValue::Int(sub.read_i32(Self::SIGNATURE)?),
                'u' => SettingValue::UInt(sub.read_u32(Self::SIGNATURE)?),
                'f' => SettingValue::Float(sub.read_f32(Self::SIGNATURE)?),
                _ => match LString::decode(sub, Self::SIGNATURE, ctx.localized)? {
                    Some(text) => SettingValue::String(text),
                    None => return Ok(None),
                },
            }),
        };
        Ok(Some(Self { editor_id, value }))
    }

    fn encode(&self, _ids: &FormIdContext) -> Result<Vec<Subrecord>> {
        let mut out = vec![Subrecord::from_zstring(sigs::EDID, &self.editor_id)];
        if let Some(value) = &self.value {
            out.push(match value {
                SettingValue::Bool(b) => Subrecord::from_u32(sigs::DATA, u32::from(*b)),
                SettingValue::Int(n) => Subrecord::from_i32(sigs::DATA, *n),
                SettingValue::UInt(n) => Subrecord::from_u32(sigs::DATA, *n),
                SettingValue::Float(n) => Subrecord::from_f32(sigs::DATA, *n),
                SettingValue::String(s) => s.encode(sigs::DATA),
            });
        }
        Ok(out)
    }

    fn field_group(field: &str) -> Option<FieldGroup> {
        match field {
            "editor_id" => Some(FieldGroup::Identity),
            "value" => Some(FieldGroup::Values),
            _ => None,
        }
    }

    fn to_fields(&self) -> FieldMap {
        let value = self.value.as_ref().map(|v| match v {
            SettingValue::Bool(b) => FieldValue::Bool(*b),
            SettingValue::Int(n) => FieldValue::Int32(*n),
            SettingValue::UInt(n) => FieldValue::UInt32(*n),
            SettingValue::Float(n) => FieldValue::Float32(*n),
            SettingValue::String(s) => FieldValue::LString(s.clone()),
        });
        let mut fields = FieldWriter::default();
        fields
            .set("editor_id", Some(FieldValue::Text(self.editor_id.clone())))
            .set("value", value);
        fields.finish()
    }

    fn from_fields(fields: &FieldMap) -> Result<Self> {
        let reader = FieldReader::new(Self::SIGNATURE, fields, Self::field_group)?;
        let mismatch = |expected| Error::FieldType {
            record: Self::SIGNATURE,
            field: "value".into(),
            expected,
        };
        let bad_editor_id = || Error::FieldType {
            record: Self::SIGNATURE,
            field: "editor_id".into(),
            expected: "text with a b/i/u/f/s prefix",
        };
        let editor_id = reader.text("editor_id")?.ok_or_else(bad_editor_id)?;
        let kind = value_kind(&editor_id).ok_or_else(bad_editor_id)?;

        let value = match fields.get("value") {
            None => None,
            Some(value) => Some(match (kind, value) {
                ('b', FieldValue::Bool(b)) => SettingValue::Bool(*b),
                ('b', _) => return Err(mismatch("a boolean")),
                ('i', FieldValue::Int32(n)) => SettingValue::Int(*n),
                ('i', _) => return Err(mismatch("a 32-bit signed integer")),
                ('u', FieldValue::UInt32(n)) => SettingValue::UInt(*n),
                ('u', _) => return Err(mismatch("a 32-bit unsigned integer")),
                ('f', FieldValue::Float32(n)) => SettingValue::Float(*n),
                ('f', _) => return Err(mismatch("a float")),
                (_, _) => {
                    let text = reader.lstring("value")?;
                    SettingValue::String(text.ok_or_else(|| mismatch("a string"))?)
                }
            }),
        };
        Ok(Self { editor_id, value })
    }
}
