//! Plain override resolution across decoded plugins

use crate::common::{decoded, name, order};
use pretty_assertions::assert_eq;
use tes_plugin::signature::sigs;
use tes_plugin::test_utils::PluginFixture;
use tes_plugin::{
    Error, FieldValue, GlobalFormId, MergeConfig, MergedRecord, Plugin, Strategy, merge_plugins,
};

fn find<'a>(records: &'a [MergedRecord], id: &GlobalFormId) -> &'a MergedRecord {
    records
        .iter()
        .find(|m| m.record.id == *id)
        .unwrap_or_else(|| panic!("{id} missing from the merge"))
}

/// `A.esm` <- `B.esp` <- `C.esp`, each overriding the previous one
fn chain() -> Vec<Plugin> {
    vec![
        decoded(PluginFixture::new("A.esm").global(0x800, "ChainRate", 1.0)),
        decoded(
            PluginFixture::new("B.esp")
                .master("A.esm")
                .global(0x0000_0800, "ChainRate", 2.0)
                .keyword(0x0100_0800, "ChainKeyword"),
        ),
        decoded(
            PluginFixture::new("C.esp")
                .master("A.esm")
                .master("B.esp")
                .global(0x0000_0800, "ChainRate", 3.0)
                .keyword(0x0100_0800, "ChainKeywordRenamed"),
        ),
    ]
}

#[test]
fn test_override_chain() {
    let outcome = merge_plugins(
        &order(&["A.esm", "B.esp", "C.esp"]),
        &chain(),
        &MergeConfig::new(),
    );
    assert!(outcome.report.is_clean());
    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.report.overridden, 2);

    let rate = find(&outcome.records, &GlobalFormId::new("A.esm", 0x800));
    assert_eq!(rate.strategy, Strategy::Override);
    assert_eq!(rate.winner, name("C.esp"));
    assert_eq!(
        rate.contributors,
        vec![name("A.esm"), name("B.esp"), name("C.esp")]
    );
    assert_eq!(rate.record.field("value"), Some(FieldValue::Float32(3.0)));
    assert!(!rate.changed);

    // the keyword originates in B, and C reaches it through its second master
    let keyword = find(&outcome.records, &GlobalFormId::new("B.esp", 0x800));
    assert_eq!(keyword.winner, name("C.esp"));
    assert_eq!(keyword.record.editor_id().as_deref(), Some("ChainKeywordRenamed"));
}

#[test]
fn test_input_order_does_not_matter() {
    let load_order = order(&["A.esm", "B.esp", "C.esp"]);
    let forward = merge_plugins(&load_order, &chain(), &MergeConfig::new());
    let mut reversed = chain();
    reversed.reverse();
    let backward = merge_plugins(&load_order, &reversed, &MergeConfig::new());
    assert_eq!(forward.records, backward.records);
}

#[test]
fn test_deletion_precedence() {
    let plugins = vec![
        decoded(
            PluginFixture::new("A.esm")
                .global(0x800, "Revived", 1.0)
                .global(0x801, "Removed", 1.0),
        ),
        decoded(
            PluginFixture::new("B.esp")
                .master("A.esm")
                .deleted(sigs::GLOB, 0x800)
                .global(0x801, "Removed", 2.0),
        ),
        decoded(
            PluginFixture::new("C.esp")
                .master("A.esm")
                .global(0x800, "Revived", 5.0)
                .deleted(sigs::GLOB, 0x801),
        ),
    ];
    let outcome = merge_plugins(
        &order(&["A.esm", "B.esp", "C.esp"]),
        &plugins,
        &MergeConfig::new(),
    );

    assert_eq!(outcome.report.deleted, vec![GlobalFormId::new("A.esm", 0x801)]);
    assert_eq!(outcome.records.len(), 1);
    let revived = &outcome.records[0];
    assert_eq!(revived.strategy, Strategy::ConflictFree);
    assert_eq!(revived.contributors, vec![name("C.esp")]);
    assert_eq!(revived.record.field("value"), Some(FieldValue::Float32(5.0)));
}

#[test]
fn test_broken_master_rejects_dependents() {
    let plugins = vec![
        decoded(PluginFixture::new("A.esm").global(0x800, "Kept", 1.0)),
        decoded(
            PluginFixture::new("Child.esp")
                .master("Gone.esm")
                .global(0x0000_0800, "Orphan", 1.0),
        ),
        decoded(
            PluginFixture::new("Grandchild.esp")
                .master("Child.esp")
                .global(0x0000_0800, "Orphan", 2.0),
        ),
    ];
    let outcome = merge_plugins(
        &order(&["A.esm", "Child.esp", "Grandchild.esp"]),
        &plugins,
        &MergeConfig::new(),
    );

    let rejected: Vec<_> = outcome
        .report
        .rejected
        .iter()
        .map(|r| r.plugin.as_str())
        .collect();
    assert_eq!(rejected, vec!["Child.esp", "Grandchild.esp"]);
    assert!(matches!(
        &outcome.report.rejected[0].error,
        Error::UnresolvedMaster { cause, .. } if matches!(**cause, Error::MissingMaster { .. })
    ));
    assert_eq!(outcome.report.rejected[1].skipped_records, 1);
    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.records[0].winner, name("A.esm"));
}
