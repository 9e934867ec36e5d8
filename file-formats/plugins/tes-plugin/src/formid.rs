//! Plugin-scoped and global form identifiers
//!
//! A raw [`FormId`] only means something relative to the master list of the
//! plugin it was read from: the high byte indexes that list, and an index
//! equal to the list length refers to the plugin itself. A [`FormIdContext`]
//! carries that master list and converts between raw ids and
//! [`GlobalFormId`]s, which name the originating plugin explicitly.

use crate::{Error, Result};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Mask selecting the object index of a raw form id
pub const OBJECT_INDEX_MASK: u32 = 0x00FF_FFFF;

/// A plugin file name, compared case-insensitively
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "String", into = "String"))]
pub struct PluginName {
    display: Arc<str>,
    key: Arc<str>,
}

impl PluginName {
    /// Create a plugin name from its file name
    pub fn new(name: impl AsRef<str>) -> Self {
        let name = name.as_ref().trim();
        Self {
            display: Arc::from(name),
            key: Arc::from(name.to_lowercase()),
        }
    }

    /// Name as written in the load order or master list
    pub fn as_str(&self) -> &str {
        &self.display
    }

    /// Lower-cased comparison key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// File extension, lower-cased (`esm`, `esp`, `esl`)
    pub fn extension(&self) -> Option<&str> {
        self.key.rsplit_once('.').map(|(_, ext)| ext)
    }
}

impl PartialEq for PluginName {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for PluginName {}

impl Hash for PluginName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for PluginName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PluginName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Display for PluginName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

impl fmt::Debug for PluginName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.display)
    }
}

impl From<&str> for PluginName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PluginName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<PluginName> for String {
    fn from(value: PluginName) -> Self {
        value.display.to_string()
    }
}

/// A raw, plugin-scoped form id as stored in the file
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FormId(u32);

impl FormId {
    /// The null reference
    pub const NULL: FormId = FormId(0);

    /// Wrap a raw value
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Compose from a master index and an object index
    pub const fn from_parts(master_index: u8, object_index: u32) -> Self {
        Self(((master_index as u32) << 24) | (object_index & OBJECT_INDEX_MASK))
    }

    /// Raw value
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// High byte: index into the declaring plugin's master list
    pub const fn master_index(self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Low 24 bits: locally scoped object index
    pub const fn object_index(self) -> u32 {
        self.0 & OBJECT_INDEX_MASK
    }

    /// Whether this is the null reference
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for FormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}

impl fmt::Debug for FormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FormId({:08X})", self.0)
    }
}

/// A load-order independent record identity
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GlobalFormId {
    /// Plugin that authored the record
    pub plugin: PluginName,
    /// Object index within that plugin
    pub object_index: u32,
}

impl GlobalFormId {
    /// Create a global id, masking the object index to 24 bits
    pub fn new(plugin: impl Into<PluginName>, object_index: u32) -> Self {
        Self {
            plugin: plugin.into(),
            object_index: object_index & OBJECT_INDEX_MASK,
        }
    }
}

impl fmt::Display for GlobalFormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:06X}", self.plugin, self.object_index)
    }
}

impl fmt::Debug for GlobalFormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GlobalFormId({self})")
    }
}

/// The master list a raw form id must be read against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormIdContext {
    plugin: PluginName,
    masters: Vec<PluginName>,
}

impl FormIdContext {
    /// Create a context for `plugin` declaring `masters` in file order
    pub fn new(plugin: PluginName, masters: Vec<PluginName>) -> Self {
        Self { plugin, masters }
    }

    /// The plugin owning the ids
    pub fn plugin(&self) -> &PluginName {
        &self.plugin
    }

    /// Declared masters in file order
    pub fn masters(&self) -> &[PluginName] {
        &self.masters
    }

    /// Resolve a raw id; the null id resolves to `None`
    pub fn resolve(&self, id: FormId) -> Result<Option<GlobalFormId>> {
        if id.is_null() {
            return Ok(None);
        }
        self.resolve_record_id(id).map(Some)
    }

    /// Resolve the id found in a record header
    ///
    /// Unlike [`resolve`](Self::resolve) this never yields `None`: a record
    /// header with id 0 is owned by the plugin itself.
    pub fn resolve_record_id(&self, id: FormId) -> Result<GlobalFormId> {
        let index = id.master_index() as usize;
        let owner = match index.cmp(&self.masters.len()) {
            Ordering::Less => &self.masters[index],
            Ordering::Equal => &self.plugin,
            Ordering::Greater => {
                return Err(Error::MasterIndexOutOfRange {
                    plugin: self.plugin.clone(),
                    index: id.master_index(),
                    masters: self.masters.len(),
                });
            }
        };
        Ok(GlobalFormId {
            plugin: owner.clone(),
            object_index: id.object_index(),
        })
    }

    /// Express a global id in this context's master list
    pub fn localize(&self, id: &GlobalFormId) -> Result<FormId> {
        let index = if id.plugin == self.plugin {
            self.masters.len()
        } else {
            self.masters
                .iter()
                .position(|m| *m == id.plugin)
                .ok_or_else(|| Error::UnknownMaster {
                    plugin: self.plugin.clone(),
                    master: id.plugin.clone(),
                    id: id.clone(),
                })?
        };
        let index = u8::try_from(index).map_err(|_| Error::TooManyMasters {
            count: self.masters.len(),
            limit: u8::MAX as usize,
        })?;
        Ok(FormId::from_parts(index, id.object_index))
    }

    /// Localize an optional reference, mapping `None` to the null id
    pub fn localize_opt(&self, id: Option<&GlobalFormId>) -> Result<FormId> {
        id.map_or(Ok(FormId::NULL), |id| self.localize(id))
    }
}
