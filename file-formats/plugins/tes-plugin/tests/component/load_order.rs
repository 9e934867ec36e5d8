//! Load order files and plugin sources on disk

use crate::common::{temp_dir, write_fixtures};
use pretty_assertions::assert_eq;
use tes_plugin::parallel::decode_plugins;
use tes_plugin::test_utils::PluginFixture;
use tes_plugin::{
    CancellationToken, DecodeLimits, DirectorySource, Error, LoadOrder, PluginName, PluginSource,
};

#[test]
fn test_plugins_txt_from_disk() {
    let dir = temp_dir();
    let path = dir.path().join("plugins.txt");
    std::fs::write(
        &path,
        "# written by a launcher\r\n*Skyrim.esm\r\nDisabled.esp\r\n*Mod.esp\r\n\r\n",
    )
    .unwrap();

    let order = LoadOrder::read_plugins_txt(&path).unwrap();
    let names: Vec<&str> = order.iter().map(PluginName::as_str).collect();
    assert_eq!(names, vec!["Skyrim.esm", "Mod.esp"]);

    let missing = LoadOrder::read_plugins_txt(dir.path().join("absent.txt")).unwrap_err();
    assert!(matches!(missing, Error::Io(_)));
}

#[test]
fn test_directory_source_lookup() {
    let dir = temp_dir();
    write_fixtures(
        dir.path(),
        vec![PluginFixture::new("MixedCase.esp").keyword(0x800, "Mixed")],
    );
    let source = DirectorySource::new(dir.path());

    let exact = source.read_plugin(&PluginName::new("MixedCase.esp")).unwrap();
    let folded = source.read_plugin(&PluginName::new("mixedcase.ESP")).unwrap();
    assert_eq!(exact, folded);

    let err = source
        .read_plugin(&PluginName::new("Absent.esp"))
        .unwrap_err();
    assert!(matches!(err, Error::PluginNotFound(name) if name.as_str() == "Absent.esp"));
}

#[test]
fn test_parallel_decode_from_directory() {
    let dir = temp_dir();
    write_fixtures(
        dir.path(),
        (0..8)
            .map(|i| {
                PluginFixture::new(format!("Part{i}.esp"))
                    .global(0x800, &format!("Part{i}Rate"), i as f32)
            })
            .collect(),
    );
    let mut names: Vec<PluginName> = (0..8).map(|i| PluginName::new(format!("Part{i}.esp"))).collect();
    names.push(PluginName::new("Missing.esp"));

    let decoded = decode_plugins(
        &names,
        &DirectorySource::new(dir.path()),
        &DecodeLimits::default(),
        &CancellationToken::new(),
    )
    .unwrap();

    assert_eq!(decoded.len(), 9);
    for (i, (name, result)) in decoded.iter().take(8).enumerate() {
        assert_eq!(name, &names[i]);
        let plugin = result.as_ref().unwrap();
        assert_eq!(
            plugin.records().next().unwrap().editor_id(),
            Some(format!("Part{i}Rate"))
        );
    }
    assert!(matches!(decoded[8].1, Err(Error::PluginNotFound(_))));
}
