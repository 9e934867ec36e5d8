//! Selective merging of field groups

use crate::common::{decoded, name, order};
use pretty_assertions::assert_eq;
use tes_plugin::records::LeveledItem;
use tes_plugin::signature::sigs;
use tes_plugin::test_utils::PluginFixture;
use tes_plugin::{
    FieldGroup, FieldValue, GlobalFormId, MergeConfig, Plugin, RecordData, Strategy,
    merge_plugins,
};

fn stats() -> MergeConfig {
    MergeConfig::new().selective(sigs::MISC, [FieldGroup::Stats])
}

fn base() -> Plugin {
    decoded(
        PluginFixture::new("Base.esm")
            .misc_item(0x801, "Ingot", 10, 1.0, &[])
            .leveled_item(0x802, "IngotList", &[(1, 0x801, 1)]),
    )
}

#[test]
fn test_independent_edits_combine() {
    let plugins = vec![
        base(),
        decoded(
            PluginFixture::new("Prices.esp")
                .master("Base.esm")
                .misc_item(0x801, "Ingot", 2, 1.0, &[]),
        ),
        decoded(
            PluginFixture::new("Weights.esp")
                .master("Base.esm")
                .misc_item(0x801, "Ingot", 10, 3.0, &[]),
        ),
    ];
    let load_order = order(&["Base.esm", "Prices.esp", "Weights.esp"]);

    let outcome = merge_plugins(&load_order, &plugins, &stats());
    let merged = &outcome.records[0];
    assert_eq!(merged.strategy, Strategy::Selective);
    assert_eq!(merged.winner, name("Weights.esp"));
    assert!(merged.changed);
    assert_eq!(merged.record.field("value"), Some(FieldValue::Int32(2)));
    assert_eq!(merged.record.field("weight"), Some(FieldValue::Float32(3.0)));

    // plain override keeps only the last plugin's edit
    let outcome = merge_plugins(&load_order, &plugins, &MergeConfig::new());
    let merged = &outcome.records[0];
    assert_eq!(merged.strategy, Strategy::Override);
    assert_eq!(merged.record.field("value"), Some(FieldValue::Int32(10)));
}

#[test]
fn test_baseline_follows_masters() {
    // Revert.esp depends on Prices.esp, so going back to 10 is its own edit
    let plugins = vec![
        base(),
        decoded(
            PluginFixture::new("Prices.esp")
                .master("Base.esm")
                .misc_item(0x801, "Ingot", 2, 1.0, &[]),
        ),
        decoded(
            PluginFixture::new("Revert.esp")
                .master("Base.esm")
                .master("Prices.esp")
                .misc_item(0x801, "Ingot", 10, 1.0, &[]),
        ),
    ];
    let outcome = merge_plugins(
        &order(&["Base.esm", "Prices.esp", "Revert.esp"]),
        &plugins,
        &stats(),
    );
    let merged = &outcome.records[0];
    assert_eq!(merged.record.field("value"), Some(FieldValue::Int32(10)));
    assert!(!merged.changed);

    // without the dependency, 10 is just the value Revert.esp started from
    let plugins = vec![
        base(),
        decoded(
            PluginFixture::new("Prices.esp")
                .master("Base.esm")
                .misc_item(0x801, "Ingot", 2, 1.0, &[]),
        ),
        decoded(
            PluginFixture::new("Revert.esp")
                .master("Base.esm")
                .misc_item(0x801, "Ingot", 10, 1.0, &[]),
        ),
    ];
    let outcome = merge_plugins(
        &order(&["Base.esm", "Prices.esp", "Revert.esp"]),
        &plugins,
        &stats(),
    );
    let merged = &outcome.records[0];
    assert_eq!(merged.record.field("value"), Some(FieldValue::Int32(2)));
    assert!(merged.changed);
}

#[test]
fn test_leveled_entries_union() {
    let plugins = vec![
        base(),
        decoded(
            PluginFixture::new("Swords.esp")
                .master("Base.esm")
                .leveled_item(0x802, "IngotList", &[(1, 0x801, 1), (5, 0x803, 1)]),
        ),
        decoded(
            PluginFixture::new("Axes.esp")
                .master("Base.esm")
                .leveled_item(0x802, "IngotList", &[(1, 0x801, 1), (10, 0x804, 2)]),
        ),
    ];
    let config = MergeConfig::new().selective(sigs::LVLI, [FieldGroup::Entries]);
    let outcome = merge_plugins(
        &order(&["Base.esm", "Swords.esp", "Axes.esp"]),
        &plugins,
        &config,
    );
    let merged = outcome
        .records
        .iter()
        .find(|m| m.record.signature == sigs::LVLI)
        .unwrap();
    let RecordData::LeveledItem(LeveledItem {
        entries: Some(entries),
        ..
    }) = &merged.record.data
    else {
        panic!("expected a typed leveled list, got {:?}", merged.record.data);
    };

    let mut references: Vec<(u16, u32)> = entries
        .iter()
        .map(|e| (e.level, e.reference.object_index))
        .collect();
    references.sort_unstable();
    assert_eq!(references, vec![(1, 0x801), (5, 0x803), (10, 0x804)]);
    assert!(
        entries
            .iter()
            .all(|e| e.reference.plugin == name("Base.esm"))
    );
}

#[test]
fn test_unrelated_plugins_do_not_change_the_result() {
    let prices = || {
        decoded(
            PluginFixture::new("Prices.esp")
                .master("Base.esm")
                .misc_item(0x801, "Ingot", 2, 1.0, &[]),
        )
    };
    let weights = || {
        decoded(
            PluginFixture::new("Weights.esp")
                .master("Base.esm")
                .misc_item(0x801, "Ingot", 10, 3.0, &[]),
        )
    };
    let unrelated = || decoded(PluginFixture::new("Other.esp").keyword(0x800, "Other"));

    let first = merge_plugins(
        &order(&["Base.esm", "Prices.esp", "Weights.esp", "Other.esp"]),
        &[base(), prices(), weights(), unrelated()],
        &stats(),
    );
    let second = merge_plugins(
        &order(&["Other.esp", "Base.esm", "Prices.esp", "Weights.esp"]),
        &[unrelated(), weights(), base(), prices()],
        &stats(),
    );

    let ingot = GlobalFormId::new("Base.esm", 0x801);
    let pick = |records: &[tes_plugin::MergedRecord]| {
        records
            .iter()
            .find(|m| m.record.id == ingot)
            .cloned()
            .unwrap()
    };
    assert_eq!(pick(&first.records), pick(&second.records));
    assert_eq!(first.records.len(), second.records.len());
}
