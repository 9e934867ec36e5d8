//! Active plugin load order

use crate::formid::PluginName;
use crate::{Error, Result};
use std::collections::HashMap;
use std::path::Path;

/// Ordered list of active plugins; later entries take precedence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOrder {
    plugins: Vec<PluginName>,
    positions: HashMap<PluginName, usize>,
}

impl LoadOrder {
    /// Create a load order, rejecting duplicate names
    pub fn new<I, N>(plugins: I) -> Result<Self>
    where
        I: IntoIterator<Item = N>,
        N: Into<PluginName>,
    {
        let mut order = Self::default();
        for name in plugins {
            let name = name.into();
            if order.positions.contains_key(&name) {
                return Err(Error::DuplicatePlugin(name));
            }
            order.positions.insert(name.clone(), order.plugins.len());
            order.plugins.push(name);
        }
        Ok(order)
    }

    /// Parse the game's `plugins.txt` format
    ///
    /// Lines starting with `#` and blank lines are skipped. When any entry
    /// carries a `*` prefix, only prefixed entries are active; otherwise every
    /// listed plugin is.
    pub fn parse_plugins_txt(text: &str) -> Result<Self> {
        let entries: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .collect();
        let starred = entries.iter().any(|line| line.starts_with('*'));

        let active = entries.into_iter().filter_map(|line| match line.strip_prefix('*') {
            Some(name) => Some(name.trim()),
            None if starred => None,
            None => Some(line),
        });
        Self::new(active)
    }

    /// Read and parse a `plugins.txt` file
    pub fn read_plugins_txt<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse_plugins_txt(&text)
    }

    /// Plugins in load order
    pub fn plugins(&self) -> &[PluginName] {
        &self.plugins
    }

    /// Iterate plugins in load order
    pub fn iter(&self) -> std::slice::Iter<'_, PluginName> {
        self.plugins.iter()
    }

    /// Number of active plugins
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether no plugin is active
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Load index of a plugin
    pub fn position(&self, name: &PluginName) -> Option<usize> {
        self.positions.get(name).copied()
    }

    /// Whether a plugin is active
    pub fn contains(&self, name: &PluginName) -> bool {
        self.positions.contains_key(name)
    }
}

impl<'a> IntoIterator for &'a LoadOrder {
    type Item = &'a PluginName;
    type IntoIter = std::slice::Iter<'a, PluginName>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
