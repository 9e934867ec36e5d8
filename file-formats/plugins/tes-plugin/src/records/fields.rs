//! Field values shared by the record categories

use crate::formid::{FormIdContext, GlobalFormId};
use crate::signature::Signature;
use crate::subrecord::Subrecord;
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Named fields of a typed record
pub type FieldMap = BTreeMap<String, FieldValue>;

/// Fields that are merged together
///
/// Names follow the patchers of the bashed-patch tradition, so they double
/// as tag names in plugin descriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FieldGroup {
    /// Editor id
    Identity,
    /// Object bounds
    Bounds,
    /// Display names
    Names,
    /// Models, icons and colours
    Graphics,
    /// Value and weight
    Stats,
    /// Keyword lists
    Keywords,
    /// Scalar settings: game setting and global values, leveled chance
    Values,
    /// List entries: form list items, leveled list entries
    Entries,
    /// Record-specific flag fields
    Flags,
}

impl FieldGroup {
    /// Every group, in declaration order
    pub const ALL: [FieldGroup; 9] = [
        FieldGroup::Identity,
        FieldGroup::Bounds,
        FieldGroup::Names,
        FieldGroup::Graphics,
        FieldGroup::Stats,
        FieldGroup::Keywords,
        FieldGroup::Values,
        FieldGroup::Entries,
        FieldGroup::Flags,
    ];

    /// Canonical name
    pub fn name(self) -> &'static str {
        match self {
            FieldGroup::Identity => "Identity",
            FieldGroup::Bounds => "Bounds",
            FieldGroup::Names => "Names",
            FieldGroup::Graphics => "Graphics",
            FieldGroup::Stats => "Stats",
            FieldGroup::Keywords => "Keywords",
            FieldGroup::Values => "Values",
            FieldGroup::Entries => "Entries",
            FieldGroup::Flags => "Flags",
        }
    }
}

impl fmt::Display for FieldGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FieldGroup {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        FieldGroup::ALL
            .into_iter()
            .find(|g| g.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidConfig(format!("unknown field group {s:?}")))
    }
}

/// A string field that may live in an external string table
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LString {
    /// Text stored in the record
    Inline(String),
    /// String table id of a localized plugin
    Localized(u32),
}

impl LString {
    /// Decode; `None` when an inline string is not a clean zstring
    pub fn decode(sub: &Subrecord, record: Signature, localized: bool) -> Result<Option<Self>> {
        if localized {
            sub.read_u32(record).map(|id| Some(LString::Localized(id)))
        } else {
            Ok(sub.read_zstring().map(LString::Inline))
        }
    }

    /// Encode into a sub-record
    pub fn encode(&self, signature: Signature) -> Subrecord {
        match self {
            LString::Inline(text) => Subrecord::from_zstring(signature, text),
            LString::Localized(id) => Subrecord::from_u32(signature, *id),
        }
    }
}

impl fmt::Display for LString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LString::Inline(text) => write!(f, "{text:?}"),
            LString::Localized(id) => write!(f, "<string {id:#010x}>"),
        }
    }
}

/// `OBND` object bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ObjectBounds {
    /// Corner one
    pub min: [i16; 3],
    /// Corner two
    pub max: [i16; 3],
}

impl ObjectBounds {
    /// Decode a 12-byte `OBND`
    pub fn decode(sub: &Subrecord, record: Signature) -> Result<Self> {
        sub.expect_len(record, 12)?;
        let v: Vec<i16> = sub
            .data
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect();
        Ok(Self {
            min: [v[0], v[1], v[2]],
            max: [v[3], v[4], v[5]],
        })
    }

    /// Encode into an `OBND` sub-record
    pub fn encode(&self, signature: Signature) -> Subrecord {
        let data = self
            .min
            .iter()
            .chain(&self.max)
            .flat_map(|v| v.to_le_bytes())
            .collect();
        Subrecord::new(signature, data)
    }
}

/// Ownership and condition data attached to a leveled entry (`COED`)
#[derive(Debug, Clone)]
pub struct EntryExtra {
    /// Owner: an actor or faction
    pub owner: Option<GlobalFormId>,
    /// Required faction rank
    pub rank: u32,
    /// Item condition
    pub condition: f32,
}

impl PartialEq for EntryExtra {
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner
            && self.rank == other.rank
            && self.condition.to_bits() == other.condition.to_bits()
    }
}

impl Eq for EntryExtra {}

/// One `LVLO` entry of a leveled list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeveledEntry {
    /// Minimum player level
    pub level: u16,
    /// Item or nested list
    pub reference: GlobalFormId,
    /// Stack size
    pub count: u16,
    /// Optional `COED`
    pub extra: Option<EntryExtra>,
}

impl fmt::Display for LeveledEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} @{}", self.count, self.reference, self.level)
    }
}

/// A decoded field value
#[derive(Debug, Clone)]
pub enum FieldValue {
    /// Boolean
    Bool(bool),
    /// 8-bit unsigned integer
    UInt8(u8),
    /// 32-bit unsigned integer
    UInt32(u32),
    /// 32-bit signed integer
    Int32(i32),
    /// 32-bit floating point number, compared bitwise
    Float32(f32),
    /// Plain string
    Text(String),
    /// Possibly localized string
    LString(LString),
    /// Uninterpreted bytes
    Bytes(Vec<u8>),
    /// Reference to another record
    FormId(GlobalFormId),
    /// Object bounds
    Bounds(ObjectBounds),
    /// Leveled list entry
    Entry(LeveledEntry),
    /// List of values, merged element-wise
    Array(Vec<FieldValue>),
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
            (FieldValue::UInt8(a), FieldValue::UInt8(b)) => a == b,
            (FieldValue::UInt32(a), FieldValue::UInt32(b)) => a == b,
            (FieldValue::Int32(a), FieldValue::Int32(b)) => a == b,
            (FieldValue::Float32(a), FieldValue::Float32(b)) => a.to_bits() == b.to_bits(),
            (FieldValue::Text(a), FieldValue::Text(b)) => a == b,
            (FieldValue::LString(a), FieldValue::LString(b)) => a == b,
            (FieldValue::Bytes(a), FieldValue::Bytes(b)) => a == b,
            (FieldValue::FormId(a), FieldValue::FormId(b)) => a == b,
            (FieldValue::Bounds(a), FieldValue::Bounds(b)) => a == b,
            (FieldValue::Entry(a), FieldValue::Entry(b)) => a == b,
            (FieldValue::Array(a), FieldValue::Array(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for FieldValue {}

impl FieldValue {
    /// Every record referenced by this value
    pub fn references(&self) -> Vec<&GlobalFormId> {
        match self {
            FieldValue::FormId(id) => vec![id],
            FieldValue::Entry(entry) => {
                let mut refs = vec![&entry.reference];
                if let Some(owner) = entry.extra.as_ref().and_then(|e| e.owner.as_ref()) {
                    refs.push(owner);
                }
                refs
            }
            FieldValue::Array(items) => items.iter().flat_map(FieldValue::references).collect(),
            _ => Vec::new(),
        }
    }

    /// Whether this value holds a string-table id
    pub fn is_localized(&self) -> bool {
        matches!(self, FieldValue::LString(LString::Localized(_)))
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(v) => write!(f, "{v}"),
            FieldValue::UInt8(v) => write!(f, "{v}"),
            FieldValue::UInt32(v) => write!(f, "{v}"),
            FieldValue::Int32(v) => write!(f, "{v}"),
            FieldValue::Float32(v) => write!(f, "{v}"),
            FieldValue::Text(v) => write!(f, "{v:?}"),
            FieldValue::LString(v) => write!(f, "{v}"),
            FieldValue::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            FieldValue::FormId(v) => write!(f, "{v}"),
            FieldValue::Bounds(b) => write!(f, "{:?}..{:?}", b.min, b.max),
            FieldValue::Entry(e) => write!(f, "{e}"),
            FieldValue::Array(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Store `value` unless the slot is already filled; `false` on a duplicate
pub(crate) fn put<T>(slot: &mut Option<T>, value: T) -> bool {
    if slot.is_some() {
        return false;
    }
    *slot = Some(value);
    true
}

/// Resolve a non-null form id field; `None` for the null reference
pub(crate) fn read_reference(
    sub: &Subrecord,
    record: Signature,
    ids: &FormIdContext,
) -> Result<Option<GlobalFormId>> {
    ids.resolve(sub.read_form_id(record)?)
}

/// Typed access to a [`FieldMap`] while rebuilding a record
pub(crate) struct FieldReader<'a> {
    record: Signature,
    fields: &'a FieldMap,
}

impl<'a> FieldReader<'a> {
    /// Wrap `fields`, rejecting names the category does not know
    pub(crate) fn new(
        record: Signature,
        fields: &'a FieldMap,
        known: impl Fn(&str) -> Option<FieldGroup>,
    ) -> Result<Self> {
        if let Some(name) = fields.keys().find(|name| known(name).is_none()) {
            return Err(Error::UnknownField {
                record,
                field: name.clone(),
            });
        }
        Ok(Self { record, fields })
    }

    fn get<T>(
        &self,
        name: &str,
        expected: &'static str,
        extract: impl Fn(&'a FieldValue) -> Option<T>,
    ) -> Result<Option<T>> {
        match self.fields.get(name) {
            None => Ok(None),
            Some(value) => extract(value).map(Some).ok_or_else(|| Error::FieldType {
                record: self.record,
                field: name.to_string(),
                expected,
            }),
        }
    }

    pub(crate) fn text(&self, name: &str) -> Result<Option<String>> {
        self.get(name, "text", |v| match v {
            FieldValue::Text(s) => Some(s.clone()),
            _ => None,
        })
    }

    pub(crate) fn lstring(&self, name: &str) -> Result<Option<LString>> {
        self.get(name, "a string", |v| match v {
            FieldValue::LString(s) => Some(s.clone()),
            FieldValue::Text(s) => Some(LString::Inline(s.clone())),
            _ => None,
        })
    }

    pub(crate) fn bytes(&self, name: &str) -> Result<Option<Vec<u8>>> {
        self.get(name, "bytes", |v| match v {
            FieldValue::Bytes(b) => Some(b.clone()),
            _ => None,
        })
    }

    pub(crate) fn uint8(&self, name: &str) -> Result<Option<u8>> {
        self.get(name, "an 8-bit unsigned integer", |v| match v {
            FieldValue::UInt8(n) => Some(*n),
            _ => None,
        })
    }

    pub(crate) fn uint32(&self, name: &str) -> Result<Option<u32>> {
        self.get(name, "a 32-bit unsigned integer", |v| match v {
            FieldValue::UInt32(n) => Some(*n),
            _ => None,
        })
    }

    pub(crate) fn int32(&self, name: &str) -> Result<Option<i32>> {
        self.get(name, "a 32-bit signed integer", |v| match v {
            FieldValue::Int32(n) => Some(*n),
            _ => None,
        })
    }

    pub(crate) fn float32(&self, name: &str) -> Result<Option<f32>> {
        self.get(name, "a float", |v| match v {
            FieldValue::Float32(n) => Some(*n),
            _ => None,
        })
    }

    pub(crate) fn form_id(&self, name: &str) -> Result<Option<GlobalFormId>> {
        self.get(name, "a form id", |v| match v {
            FieldValue::FormId(id) => Some(id.clone()),
            _ => None,
        })
    }

    pub(crate) fn bounds(&self, name: &str) -> Result<Option<ObjectBounds>> {
        self.get(name, "object bounds", |v| match v {
            FieldValue::Bounds(b) => Some(*b),
            _ => None,
        })
    }

    pub(crate) fn form_ids(&self, name: &str) -> Result<Option<Vec<GlobalFormId>>> {
        self.get(name, "a list of form ids", |v| match v {
            FieldValue::Array(items) => items
                .iter()
                .map(|item| match item {
                    FieldValue::FormId(id) => Some(id.clone()),
                    _ => None,
                })
                .collect(),
            _ => None,
        })
    }

    pub(crate) fn entries(&self, name: &str) -> Result<Option<Vec<LeveledEntry>>> {
        self.get(name, "a list of leveled entries", |v| match v {
            FieldValue::Array(items) => items
                .iter()
                .map(|item| match item {
                    FieldValue::Entry(entry) => Some(entry.clone()),
                    _ => None,
                })
                .collect(),
            _ => None,
        })
    }
}

/// Helper for building a [`FieldMap`] from optional values
#[derive(Debug, Default)]
pub(crate) struct FieldWriter(FieldMap);

impl FieldWriter {
    pub(crate) fn set(&mut self, name: &str, value: Option<FieldValue>) -> &mut Self {
        if let Some(value) = value {
            self.0.insert(name.to_string(), value);
        }
        self
    }

    pub(crate) fn finish(self) -> FieldMap {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::sigs;

    #[test]
    fn test_field_group_parse() {
        assert_eq!("names".parse::<FieldGroup>().unwrap(), FieldGroup::Names);
        assert_eq!(" Stats ".parse::<FieldGroup>().unwrap(), FieldGroup::Stats);
        assert!("Sounds".parse::<FieldGroup>().is_err());
    }

    #[test]
    fn test_float_equality_is_bitwise() {
        assert_eq!(FieldValue::Float32(f32::NAN), FieldValue::Float32(f32::NAN));
        assert_ne!(FieldValue::Float32(0.0), FieldValue::Float32(-0.0));
        assert_ne!(FieldValue::UInt32(1), FieldValue::Int32(1));
    }

    #[test]
    fn test_bounds_round_trip() {
        let bounds = ObjectBounds {
            min: [-3, -2, -1],
            max: [4, 5, 600],
        };
        let sub = bounds.encode(sigs::OBND);
        assert_eq!(sub.data.len(), 12);
        assert_eq!(ObjectBounds::decode(&sub, sigs::MISC).unwrap(), bounds);
        let short = Subrecord::new(sigs::OBND, vec![0; 6]);
        assert!(ObjectBounds::decode(&short, sigs::MISC).is_err());
    }

    #[test]
    fn test_lstring_modes() {
        let inline = Subrecord::from_zstring(sigs::FULL, "Gold");
        assert_eq!(
            LString::decode(&inline, sigs::MISC, false).unwrap(),
            Some(LString::Inline("Gold".into()))
        );
        let id = Subrecord::from_u32(sigs::FULL, 0x1234);
        assert_eq!(
            LString::decode(&id, sigs::MISC, true).unwrap(),
            Some(LString::Localized(0x1234))
        );
        assert!(LString::decode(&inline, sigs::MISC, true).is_err());
    }

    #[test]
    fn test_reader_type_errors() {
        let mut map = FieldMap::new();
        map.insert("value".into(), FieldValue::Text("ten".into()));
        let known = |name: &str| (name == "value").then_some(FieldGroup::Stats);
        let reader = FieldReader::new(sigs::MISC, &map, known).unwrap();
        assert!(matches!(
            reader.int32("value"),
            Err(Error::FieldType { .. })
        ));
        assert_eq!(reader.int32("missing").unwrap(), None);

        map.insert("bogus".into(), FieldValue::Bool(true));
        assert!(matches!(
            FieldReader::new(sigs::MISC, &map, known),
            Err(Error::UnknownField { .. })
        ));
    }
}
