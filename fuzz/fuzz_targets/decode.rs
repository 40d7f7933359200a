#![no_main]

use std::sync::OnceLock;

use libfuzzer_sys::fuzz_target;
use parcelscope::{
    codec::{AndroidVersion, MessageKind, ParcelCodec},
    schema::json,
    Loader,
};

/// An interface whose arguments reach every read operation, including a self-referencing
/// parcelable.
const SCHEMAS: [&str; 2] = [
    r#"{
        "name": "fuzz.Node",
        "kind": "parcelable",
        "structured": true,
        "fields": [
            {"name": "tag", "call": "readInt"},
            {"name": "label", "call": "readString", "condition": {"field": "tag", "op": "!=", "value": 0}},
            {"name": "next", "call": "readParcelable:fuzz.Node"},
            {"name": "children", "call": "readParcelableVector:fuzz.Node"}
        ]
    }"#,
    r#"{
        "name": "fuzz.IService",
        "kind": "binder",
        "methods": [{
            "name": "call",
            "tc": 1,
            "oneway": false,
            "retval": {"call": "readValue"},
            "arguments": [
                {"name": "node", "call": "readParcelable:fuzz.Node", "direction": "inout"},
                {"name": "binder", "call": "readStrongBinder", "direction": "in"},
                {"name": "extras", "call": "readBundle", "direction": "in"},
                {"name": "map", "call": "readMap", "direction": "in"},
                {"name": "bytes", "call": "readByteVector", "direction": "in"},
                {"name": "names", "call": "readString8Vector", "direction": "out"},
                {"name": "any", "call": "readValue", "direction": "in"}
            ]
        }]
    }"#,
];

fn loader() -> &'static Loader {
    static LOADER: OnceLock<Loader> = OnceLock::new();
    LOADER.get_or_init(|| {
        let loader = Loader::new();
        for schema in SCHEMAS {
            let class = json::from_json(schema).expect("fuzz schema is valid");
            loader.insert(class).expect("fuzz schema is valid");
        }
        loader
    })
}

fuzz_target!(|data: &[u8]| {
    let Some((&selector, payload)) = data.split_first() else {
        return;
    };
    let version = AndroidVersion(u32::from(selector & 0x0f) + 4);
    let kind = if selector & 0x10 == 0 {
        MessageKind::Request
    } else {
        MessageKind::Reply
    };

    let codec = ParcelCodec::new(loader(), version);
    let _ = codec.decode(payload, 1, kind, Some("fuzz.IService"));
    let _ = codec.decode_parcelable(payload, "fuzz.Node");
});
