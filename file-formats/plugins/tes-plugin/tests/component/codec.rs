//! Plugin codec: round trips, compression, extended sizes and hostile input

use crate::common::decoded;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use tes_plugin::records::FieldContext;
use tes_plugin::signature::sigs;
use tes_plugin::test_utils::PluginFixture;
use tes_plugin::{
    CompressionPolicy, DecodeLimits, EncodeOptions, Error, Plugin, PluginName, Signature,
    Subrecord, TypedRecord,
};

fn fixture() -> PluginFixture {
    PluginFixture::new("Codec.esp")
        .master("Skyrim.esm")
        .global(0x0100_0800, "CodecRate", 1.5)
        .misc_item(0x0100_0801, "CodecGem", 40, 0.25, &[0x0000_0801])
        .leveled_item(0x0100_0802, "CodecList", &[(1, 0x0100_0801, 2)])
}

/// Plugin header followed by one top group holding a single compressed
/// `MISC` record whose length prefix claims `declared` bytes
fn compressed_bomb(declared: u32) -> Vec<u8> {
    let mut bytes = PluginFixture::new("Bomb.esp").to_bytes().unwrap();

    let mut payload = declared.to_le_bytes().to_vec();
    payload.extend_from_slice(&[0x78, 0x9C, 0x03, 0x00]);

    let mut record = Vec::new();
    record.extend_from_slice(b"MISC");
    record.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    record.extend_from_slice(&0x0004_0000u32.to_le_bytes());
    record.extend_from_slice(&0x0000_0800u32.to_le_bytes());
    record.extend_from_slice(&0u32.to_le_bytes());
    record.extend_from_slice(&44u16.to_le_bytes());
    record.extend_from_slice(&0u16.to_le_bytes());
    record.extend_from_slice(&payload);

    bytes.extend_from_slice(b"GRUP");
    bytes.extend_from_slice(&(24 + record.len() as u32).to_le_bytes());
    bytes.extend_from_slice(b"MISC");
    bytes.extend_from_slice(&0i32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&record);
    bytes
}

fn root_cause(error: &Error) -> &Error {
    match error {
        Error::Plugin { source, .. } => root_cause(source),
        other => other,
    }
}

#[test]
fn test_compressed_round_trip() {
    let plugin = fixture().build();
    let always = EncodeOptions::new().compression(CompressionPolicy::Always);
    let packed = plugin.encode(&always).unwrap();

    let decoded = Plugin::decode(plugin.name.clone(), &packed, &DecodeLimits::default()).unwrap();
    assert!(
        decoded
            .records()
            .filter(|r| r.signature() != sigs::TES4)
            .all(|r| r.header().is_compressed())
    );
    let expected: Vec<_> = plugin.records().map(|r| r.subrecords().to_vec()).collect();
    let actual: Vec<_> = decoded.records().map(|r| r.subrecords().to_vec()).collect();
    assert_eq!(actual, expected);

    // untouched compressed records are written back as they were read
    assert_eq!(decoded.encode(&EncodeOptions::default()).unwrap(), packed);

    let unpacked = decoded
        .encode(&EncodeOptions::new().compression(CompressionPolicy::Never))
        .unwrap();
    assert_eq!(unpacked, plugin.encode(&EncodeOptions::default()).unwrap());
}

#[test]
fn test_extended_subrecord_size() {
    let model = vec![0xAB; usize::from(u16::MAX) + 100];
    let fixture = PluginFixture::new("Large.esp").raw(
        Signature::new(*b"STAT"),
        0x800,
        vec![
            Subrecord::from_zstring(sigs::EDID, "LargeStatic"),
            Subrecord::new(sigs::MODT, model.clone()),
        ],
    );
    let bytes = fixture.to_bytes().unwrap();
    assert!(bytes.windows(4).any(|w| w == b"XXXX"));

    let plugin = Plugin::decode(PluginName::new("Large.esp"), &bytes, &DecodeLimits::default())
        .unwrap();
    let record = plugin
        .records()
        .find(|r| r.signature() == Signature::new(*b"STAT"))
        .unwrap();
    assert_eq!(record.get(sigs::MODT).unwrap().data, model);
    assert_eq!(record.editor_id().as_deref(), Some("LargeStatic"));
    assert_eq!(plugin.encode(&EncodeOptions::default()).unwrap(), bytes);
}

#[test]
fn test_decompression_bomb_is_refused() {
    let name = PluginName::new("Bomb.esp");

    let oversized = compressed_bomb(0xC000_0000);
    let err = Plugin::decode(name.clone(), &oversized, &DecodeLimits::default()).unwrap_err();
    assert!(matches!(root_cause(&err), Error::ResourceLimit(_)), "{err}");

    // small enough in absolute terms, but far beyond what deflate can reach
    let ratio = compressed_bomb(100_000);
    let err = Plugin::decode(name.clone(), &ratio, &DecodeLimits::default()).unwrap_err();
    assert!(matches!(root_cause(&err), Error::ResourceLimit(_)), "{err}");

    let strict = DecodeLimits::new().max_decompressed_size(8);
    let err = Plugin::decode(name, &compressed_bomb(16), &strict).unwrap_err();
    assert!(matches!(root_cause(&err), Error::ResourceLimit(_)), "{err}");
}

#[test]
fn test_truncated_input_is_corruption() {
    let bytes = fixture().to_bytes().unwrap();
    for cut in [3, 10, 30, bytes.len() - 1] {
        let err = Plugin::decode(
            PluginName::new("Codec.esp"),
            &bytes[..cut],
            &DecodeLimits::default(),
        )
        .unwrap_err();
        assert!(!matches!(root_cause(&err), Error::ResourceLimit(_)), "{err}");
    }
}

#[test]
fn test_decoded_fixture_matches_build() {
    let plugin = decoded(fixture());
    let built = fixture().build();
    assert_eq!(
        plugin.records().collect::<Vec<_>>(),
        built.records().collect::<Vec<_>>()
    );
    assert_eq!(plugin.header, built.header);
    assert_eq!(plugin.masters(), vec![PluginName::new("Skyrim.esm")]);
    assert_eq!(plugin.header.record_count as usize, plugin.count_records());
}

/// Header text as stored: any bytes, with or without a terminator
fn header_text() -> impl Strategy<Value = Vec<u8>> {
    (prop::collection::vec(any::<u8>(), 0..24), any::<bool>()).prop_map(|(mut text, terminated)| {
        if terminated {
            text.push(0);
        }
        text
    })
}

/// Sub-records of a category the typed model does not cover
fn opaque_fields() -> impl Strategy<Value = Vec<Subrecord>> {
    let field = (
        prop::sample::select(vec![sigs::EDID, sigs::MODL, sigs::DATA, Signature::new(*b"DNAM")]),
        prop::collection::vec(any::<u8>(), 0..48),
    )
        .prop_map(|(signature, data)| Subrecord::new(signature, data));
    prop::collection::vec(field, 0..6)
}

/// `MISC` sub-records in any order, some valid and some not
fn misc_fields() -> impl Strategy<Value = Vec<Subrecord>> {
    let field = prop_oneof![
        "[A-Za-z]{1,12}".prop_map(|id| Subrecord::from_zstring(sigs::EDID, &id)),
        any::<[u8; 8]>().prop_map(|data| Subrecord::new(sigs::DATA, data.to_vec())),
        (0u32..3).prop_map(|count| Subrecord::from_u32(sigs::KSIZ, count)),
        prop::collection::vec(0u32..0x0200_0000, 0..3).prop_map(|ids| {
            Subrecord::new(sigs::KWDA, ids.iter().flat_map(|id| id.to_le_bytes()).collect())
        }),
        prop::collection::vec(any::<u8>(), 0..16)
            .prop_map(|data| Subrecord::new(sigs::MODT, data)),
    ];
    prop::collection::vec(field, 0..6)
}

fn generated_plugin(
    author: Vec<u8>,
    description: Vec<u8>,
    statics: Vec<Vec<Subrecord>>,
    items: Vec<Vec<Subrecord>>,
) -> Vec<u8> {
    let mut fixture = PluginFixture::new("Generated.esp")
        .master("Skyrim.esm")
        .header_field(Subrecord::new(sigs::CNAM, author))
        .header_field(Subrecord::new(sigs::SNAM, description));
    let mut next = 0x0100_0800;
    for fields in statics {
        fixture = fixture.raw(Signature::new(*b"STAT"), next, fields);
        next += 1;
    }
    for fields in items {
        fixture = fixture.raw(sigs::MISC, next, fields);
        next += 1;
    }
    fixture.to_bytes().unwrap()
}

fn record_contents(plugin: &Plugin) -> Vec<(Signature, u32, Vec<Subrecord>)> {
    plugin
        .records()
        .map(|r| (r.signature(), r.form_id().raw(), r.subrecords().to_vec()))
        .collect()
}

proptest! {
    #[test]
    fn uncompressed_plugins_round_trip_byte_for_byte(
        author in header_text(),
        description in header_text(),
        statics in prop::collection::vec(opaque_fields(), 0..3),
        items in prop::collection::vec(misc_fields(), 0..3),
    ) {
        let bytes = generated_plugin(author, description, statics, items);
        let name = PluginName::new("Generated.esp");
        let plugin = Plugin::decode(name, &bytes, &DecodeLimits::default()).unwrap();
        prop_assert_eq!(plugin.encode(&EncodeOptions::default()).unwrap(), bytes);
    }

    #[test]
    fn compressed_plugins_decode_to_the_same_content(
        author in header_text(),
        statics in prop::collection::vec(opaque_fields(), 0..3),
        items in prop::collection::vec(misc_fields(), 0..3),
    ) {
        let bytes = generated_plugin(author, b"{{BASH:Stats}}\0".to_vec(), statics, items);
        let name = PluginName::new("Generated.esp");
        let plugin = Plugin::decode(name.clone(), &bytes, &DecodeLimits::default()).unwrap();

        let always = EncodeOptions::new().compression(CompressionPolicy::Always);
        let packed = plugin.encode(&always).unwrap();
        let again = Plugin::decode(name, &packed, &DecodeLimits::default()).unwrap();
        prop_assert_eq!(&again.header, &plugin.header);
        prop_assert_eq!(record_contents(&again), record_contents(&plugin));
    }

    #[test]
    fn typed_records_encode_to_what_was_read(items in prop::collection::vec(misc_fields(), 1..4)) {
        let bytes = generated_plugin(Vec::new(), Vec::new(), Vec::new(), items);
        let name = PluginName::new("Generated.esp");
        let plugin = Plugin::decode(name, &bytes, &DecodeLimits::default()).unwrap();
        let ids = plugin.form_id_context();
        let ctx = FieldContext { ids: &ids, localized: plugin.is_localized() };
        for raw in plugin.records() {
            let Ok(record) = TypedRecord::decode(raw, &ctx) else {
                continue;
            };
            if !record.is_opaque() {
                prop_assert_eq!(&record.encode(&ids).unwrap(), raw);
            }
        }
    }

    #[test]
    fn decoding_random_bytes_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = Plugin::decode(PluginName::new("Random.esp"), &bytes, &DecodeLimits::default());
    }

    #[test]
    fn decoding_damaged_plugin_never_panics(index in 0usize..4096, value in any::<u8>()) {
        let mut bytes = fixture().to_bytes().unwrap();
        let index = index % bytes.len();
        bytes[index] = value;
        if let Ok(plugin) = Plugin::decode(PluginName::new("Codec.esp"), &bytes, &DecodeLimits::default()) {
            prop_assert!(plugin.encode(&EncodeOptions::default()).is_ok());
        }
    }
}
