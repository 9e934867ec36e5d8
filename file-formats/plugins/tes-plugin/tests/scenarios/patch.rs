//! Bashed patch builds from a data directory on disk

use crate::common::{init_logging, name, temp_dir, write_fixtures};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tes_plugin::builder::DEFAULT_PATCH_NAME;
use tes_plugin::records::MiscItem;
use tes_plugin::signature::sigs;
use tes_plugin::test_utils::PluginFixture;
use tes_plugin::{
    ContainerKind, DecodeLimits, DirectorySource, EncodeOptions, FieldGroup, LoadOrder,
    MergeConfig, PatchOptions, Plugin, PluginName, TypedRecord, build_patch, write_patch,
};

/// Three plugins and a `plugins.txt` that also lists the patch itself
fn populate(dir: &Path, patch: &str) {
    write_fixtures(
        dir,
        vec![
            PluginFixture::new("Base.esm")
                .global(0x800, "OreRate", 1.0)
                .misc_item(0x801, "Ore", 10, 1.0, &[])
                .keyword(0x802, "OreKeyword"),
            PluginFixture::new("Prices.esp")
                .master("Base.esm")
                .misc_item(0x801, "Ore", 2, 1.0, &[]),
            PluginFixture::new("Weights.esp")
                .master("Base.esm")
                .misc_item(0x801, "Ore", 10, 3.0, &[0x802])
                .global(0x800, "OreRate", 4.0),
        ],
    );
    fs::write(
        dir.join("plugins.txt"),
        format!("*Base.esm\n*Prices.esp\n*Weights.esp\n*{patch}\n"),
    )
    .unwrap();
}

fn build_and_write(dir: &Path, options: &PatchOptions) -> Vec<u8> {
    init_logging();
    let load_order = LoadOrder::read_plugins_txt(dir.join("plugins.txt")).unwrap();
    let config = MergeConfig::new().selective(sigs::MISC, [FieldGroup::Stats]);
    let outcome = build_patch(&load_order, &DirectorySource::new(dir), &config, options).unwrap();
    assert!(outcome.merge.is_clean(), "{:?}", outcome.merge);

    let path = dir.join(options.name.as_str());
    write_patch(&outcome.patch, &path, &options.encode).unwrap();
    fs::read(&path).unwrap()
}

fn misc_of(plugin: &Plugin) -> MiscItem {
    let raw = plugin
        .records()
        .find(|r| r.signature() == sigs::MISC)
        .unwrap();
    let ids = plugin.form_id_context();
    let ctx = tes_plugin::records::FieldContext {
        ids: &ids,
        localized: false,
    };
    match TypedRecord::decode(raw, &ctx).unwrap().data {
        tes_plugin::RecordData::MiscItem(item) => item,
        other => panic!("expected a typed MISC record, got {other:?}"),
    }
}

#[test]
fn test_patch_replaces_previous_patch() {
    let dir = temp_dir();
    populate(dir.path(), DEFAULT_PATCH_NAME);
    // a stale, unreadable patch from an earlier run
    fs::write(dir.path().join(DEFAULT_PATCH_NAME), b"stale").unwrap();

    let options = PatchOptions::new().author("Tester");
    let first = build_and_write(dir.path(), &options);
    let patch = Plugin::decode(name(DEFAULT_PATCH_NAME), &first, &DecodeLimits::default()).unwrap();

    assert_eq!(patch.masters(), vec![name("Base.esm")]);
    assert_eq!(patch.header.author.as_deref(), Some("Tester"));
    assert_eq!(patch.header.record_count as usize, patch.count_records());
    assert!(!patch.is_light());

    let labels: Vec<String> = patch.groups.iter().map(|g| g.label().to_string()).collect();
    assert_eq!(labels, vec!["KYWD", "GLOB", "MISC"]);

    let ore = misc_of(&patch);
    assert_eq!(ore.value, Some(2));
    assert_eq!(ore.weight, Some(3.0));
    assert_eq!(ore.keywords, vec![tes_plugin::GlobalFormId::new("Base.esm", 0x802)]);

    // the fresh patch is in the load order now, and still left out of its own build
    let second = build_and_write(dir.path(), &options);
    assert_eq!(first, second);
}

#[test]
fn test_written_patch_reencodes_identically() {
    let dir = temp_dir();
    populate(dir.path(), "Merged.esp");
    let options = PatchOptions::new()
        .name("Merged.esp")
        .encode(EncodeOptions::new().compression(tes_plugin::CompressionPolicy::Always));
    let bytes = build_and_write(dir.path(), &options);

    let patch = Plugin::decode(PluginName::new("Merged.esp"), &bytes, &DecodeLimits::default()).unwrap();
    assert!(patch.records().all(|r| r.header().is_compressed()));
    assert_eq!(patch.encode(&EncodeOptions::default()).unwrap(), bytes);
}

#[test]
fn test_light_patch() {
    let dir = temp_dir();
    populate(dir.path(), "Bashed Patch.esl");
    let options = PatchOptions::new()
        .name("Bashed Patch.esl")
        .kind(ContainerKind::Light)
        .skip_redundant(true);
    let bytes = build_and_write(dir.path(), &options);

    let patch = Plugin::decode(name("Bashed Patch.esl"), &bytes, &DecodeLimits::default()).unwrap();
    assert!(patch.is_light());
    // only the merged MISC differs from its winner
    assert_eq!(patch.records().count(), 1);
    assert_eq!(misc_of(&patch).value, Some(2));
}
