//! Where plugin bytes come from

use crate::formid::PluginName;
use crate::{Error, Result};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Supplies the bytes of a plugin by name
///
/// Implementations are shared between decode workers.
pub trait PluginSource: Send + Sync {
    /// Read the whole file; [`Error::PluginNotFound`] when there is none
    fn read_plugin(&self, name: &PluginName) -> Result<Vec<u8>>;
}

/// Plugins stored as files in one directory
///
/// Names are matched case-insensitively when the exact file is missing.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    /// Read plugins from `root`
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Directory plugins are read from
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn find(&self, name: &PluginName) -> Result<Option<PathBuf>> {
        let exact = self.root.join(name.as_str());
        if exact.is_file() {
            return Ok(Some(exact));
        }
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_name().to_str().map(PluginName::new).as_ref() == Some(name)
                && entry.file_type()?.is_file()
            {
                return Ok(Some(entry.path()));
            }
        }
        Ok(None)
    }
}

impl PluginSource for DirectorySource {
    fn read_plugin(&self, name: &PluginName) -> Result<Vec<u8>> {
        let path = self
            .find(name)?
            .ok_or_else(|| Error::PluginNotFound(name.clone()))?;
        log::trace!("Reading {}", path.display());
        fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::PluginNotFound(name.clone()),
            _ => Error::Io(e),
        })
    }
}

/// Plugins held in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: HashMap<PluginName, Vec<u8>>,
}

impl MemorySource {
    /// Empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a plugin
    pub fn insert(&mut self, name: impl Into<PluginName>, bytes: Vec<u8>) {
        self.files.insert(name.into(), bytes);
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with(mut self, name: impl Into<PluginName>, bytes: Vec<u8>) -> Self {
        self.insert(name, bytes);
        self
    }
}

impl PluginSource for MemorySource {
    fn read_plugin(&self, name: &PluginName) -> Result<Vec<u8>> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| Error::PluginNotFound(name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_source_ignores_case() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Skyrim.esm"), b"bytes").unwrap();
        let source = DirectorySource::new(dir.path());

        assert_eq!(source.read_plugin(&PluginName::new("Skyrim.esm")).unwrap(), b"bytes");
        assert_eq!(source.read_plugin(&PluginName::new("SKYRIM.ESM")).unwrap(), b"bytes");
        assert!(matches!(
            source.read_plugin(&PluginName::new("Update.esm")),
            Err(Error::PluginNotFound(_))
        ));
    }

    #[test]
    fn test_memory_source() {
        let source = MemorySource::new().with("Gems.esp", vec![1, 2, 3]);
        assert_eq!(source.read_plugin(&PluginName::new("gems.esp")).unwrap(), vec![1, 2, 3]);
        assert!(source.read_plugin(&PluginName::new("Other.esp")).is_err());
    }
}
