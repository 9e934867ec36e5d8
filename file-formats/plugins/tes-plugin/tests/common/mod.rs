//! Shared helpers for the test suite
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tes_plugin::test_utils::PluginFixture;
use tes_plugin::{DecodeLimits, LoadOrder, MemorySource, Plugin, PluginName};

/// Route library logs through the test harness
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Create a fresh temporary directory
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

/// Build a fixture and decode it again, as a reader would see it
pub fn decoded(fixture: PluginFixture) -> Plugin {
    let plugin = fixture.build();
    let bytes = plugin
        .encode(&Default::default())
        .expect("Failed to encode fixture");
    Plugin::decode(plugin.name.clone(), &bytes, &DecodeLimits::default())
        .expect("Failed to decode fixture")
}

/// Load order from plugin names
pub fn order(names: &[&str]) -> LoadOrder {
    LoadOrder::new(names.iter().copied()).expect("Invalid load order")
}

/// Memory source holding the encoded fixtures
pub fn source(fixtures: Vec<PluginFixture>) -> MemorySource {
    let mut source = MemorySource::new();
    for fixture in fixtures {
        let plugin = fixture.build();
        let bytes = plugin
            .encode(&Default::default())
            .expect("Failed to encode fixture");
        source.insert(plugin.name.clone(), bytes);
    }
    source
}

/// Write encoded fixtures into `dir`, returning their paths
pub fn write_fixtures(dir: &Path, fixtures: Vec<PluginFixture>) -> Vec<PathBuf> {
    fixtures
        .into_iter()
        .map(|fixture| {
            let plugin = fixture.build();
            let path = dir.join(plugin.name.as_str());
            let bytes = plugin
                .encode(&Default::default())
                .expect("Failed to encode fixture");
            std::fs::write(&path, bytes).expect("Failed to write fixture");
            path
        })
        .collect()
}

/// Name helper
pub fn name(name: &str) -> PluginName {
    PluginName::new(name)
}
