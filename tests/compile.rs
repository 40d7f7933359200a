//! Integration tests for compiling AIDL source trees into schemas.
//!
//! Every test builds its own source roots in temporary directories.

use std::{fs, path::Path};

use parcelscope::{
    prelude::*,
    schema::{json, CompareOp},
};
use tempfile::TempDir;

fn write(root: &Path, relative: &str, text: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

fn device_root() -> TempDir {
    let root = TempDir::new().unwrap();
    write(
        root.path(),
        "dev/IDevice.aidl",
        r#"
        package dev;

        import dev.types.Config;
        import dev.types.Mode;

        interface IDevice {
            const int VERSION = 3;

            Config configure(in Config config, int flags, out int[] result);
            oneway void notify(IBinder token, in Bundle extras) = 10;
            @nullable String name(Mode mode);
            void attach(IDeviceCallback callback);
        }
        "#,
    );
    write(
        root.path(),
        "dev/IDeviceCallback.aidl",
        "package dev; oneway interface IDeviceCallback { void changed(in List<String> keys); }",
    );
    write(
        root.path(),
        "dev/types/Config.aidl",
        r#"
        package dev.types;

        parcelable Config {
            int id;
            @nullable String label;
            long[] stamps;
            Mode mode;
            @nullable Config parent;
            Config[] children;
            CharSequence summary;
        }
        "#,
    );
    write(
        root.path(),
        "dev/types/Mode.aidl",
        r#"package dev.types; @Backing(type="int") enum Mode { OFF, ON }"#,
    );
    root
}

#[test]
fn interface_dispatch_table() -> Result<()> {
    let root = device_root();
    let loader = Loader::new().with_root(root.path())?;

    let class = loader.get_or_compile("dev.IDevice")?;
    assert_eq!(class.descriptor(), "dev.IDevice");
    let binder = class.as_binder().unwrap();

    let codes: Vec<_> = binder.methods.iter().map(|m| (m.name.as_str(), m.tc)).collect();
    assert_eq!(
        codes,
        [("configure", 1), ("notify", 10), ("name", 11), ("attach", 12)]
    );

    let configure = binder.method(1).unwrap();
    assert_eq!(
        configure.retval.as_ref().unwrap().call,
        ReadOp::Parcelable("dev.types.Config".into())
    );
    let directions: Vec<_> = configure.arguments.iter().map(|a| a.direction).collect();
    assert_eq!(directions, [Direction::In, Direction::In, Direction::Out]);
    assert_eq!(
        configure.arguments[2].call,
        ReadOp::repeated(ReadOp::Primitive(PrimitiveKind::Int))
    );

    let notify = binder.method_by_name("notify").unwrap();
    assert!(notify.oneway);
    assert_eq!(notify.arguments[0].call, ReadOp::StrongBinder);
    assert_eq!(notify.arguments[1].call, ReadOp::Bundle);

    // enums read as their backing type
    let name = binder.method(11).unwrap();
    assert_eq!(name.arguments[0].call, ReadOp::Primitive(PrimitiveKind::Int));
    assert_eq!(
        name.retval.as_ref().unwrap().call,
        ReadOp::Primitive(PrimitiveKind::String)
    );

    // interfaces passed as arguments are binders
    assert_eq!(binder.method(12).unwrap().arguments[0].call, ReadOp::StrongBinder);
    Ok(())
}

#[test]
fn referenced_classes_compile_lazily() -> Result<()> {
    let root = device_root();
    let loader = Loader::new().with_root(root.path())?;

    loader.get_or_compile("dev.IDevice")?;
    assert!(!loader.is_compiled(&"dev.types.Config".into())?);

    let config = loader.get_or_compile("dev.types.Config")?;
    let def = config.as_parcelable().unwrap();
    assert!(def.structured);

    let calls: Vec<String> = def.fields.iter().map(|f| f.call.to_string()).collect();
    assert_eq!(
        calls,
        [
            "readInt",
            "readString",
            "readLongVector",
            "readInt",
            "readParcelable:dev.types.Config",
            "readParcelableVector:dev.types.Config",
            "unsupported:CharSequence",
        ]
    );
    assert_eq!(def.fields[6].ty.as_deref(), Some("CharSequence"));
    Ok(())
}

#[test]
fn persisted_schemas_round_trip() -> Result<()> {
    let root = device_root();
    let out = TempDir::new().unwrap();
    let loader = Loader::new().with_root(root.path())?;

    let classes = loader.compile_file("dev.IDevice")?;
    assert_eq!(classes.len(), 1);
    for name in ["dev.IDevice", "dev.types.Config", "dev.IDeviceCallback"] {
        let class = loader.get_or_compile(name)?;
        let path = json::save(&class, out.path(), false)?.unwrap();
        assert_eq!(json::load(&path)?, *class);
        // an existing schema is kept unless forced
        assert!(json::save(&class, out.path(), false)?.is_none());
        assert!(json::save(&class, out.path(), true)?.is_some());
    }
    assert!(out.path().join("dev/types/Config.json").is_file());

    // a loader with only the schemas resolves the same classes
    let replay = Loader::new().with_root(out.path())?;
    let config = replay.get_or_compile("dev.types.Config")?;
    assert_eq!(
        config.as_parcelable(),
        loader.get_or_compile("dev.types.Config")?.as_parcelable()
    );
    assert!(config.location.is_some());
    Ok(())
}

#[test]
fn union_members_are_conditional() -> Result<()> {
    let root = TempDir::new().unwrap();
    write(
        root.path(),
        "u/Choice.aidl",
        "package u; union Choice { int number; String text; Choice inner; }",
    );
    let loader = Loader::new().with_root(root.path())?;

    let class = loader.get_or_compile("u.Choice")?;
    let fields = &class.as_parcelable().unwrap().fields;
    assert_eq!(fields[0].name, "_tag");
    for (tag, field) in fields[1..].iter().enumerate() {
        let condition = field.condition.as_ref().unwrap();
        assert_eq!(condition.field, "_tag");
        assert_eq!(condition.op, CompareOp::Eq);
        assert_eq!(condition.value, tag as i64);
    }
    assert_eq!(fields[3].call, ReadOp::Parcelable("u.Choice".into()));
    Ok(())
}

#[test]
fn earlier_roots_take_precedence() -> Result<()> {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    write(first.path(), "p/Item.aidl", "package p; parcelable Item { int a; }");
    write(second.path(), "p/Item.aidl", "package p; parcelable Item { long a; long b; }");
    write(second.path(), "p/Other.aidl", "package p; parcelable Other { Item item; }");

    let loader = Loader::new()
        .with_root(first.path())?
        .with_root(second.path())?;
    let item = loader.get_or_compile("p.Item")?;
    assert_eq!(item.as_parcelable().unwrap().fields.len(), 1);

    // files found in a later root still resolve their references through every root
    let other = loader.get_or_compile("p.Other")?;
    assert_eq!(
        other.as_parcelable().unwrap().fields[0].call,
        ReadOp::Parcelable("p.Item".into())
    );
    Ok(())
}

#[test]
fn missing_references_stay_in_the_schema() -> Result<()> {
    let root = TempDir::new().unwrap();
    write(
        root.path(),
        "m/IThing.aidl",
        "package m; import x.y.Gone; interface IThing { void f(in Gone gone, int after); }",
    );
    let loader = Loader::new().with_root(root.path())?;

    let class = loader.get_or_compile("m.IThing")?;
    let arguments = &class.as_binder().unwrap().methods[0].arguments;
    assert_eq!(arguments.len(), 2);
    assert!(!arguments[0].call.is_supported());
    assert_eq!(arguments[1].call, ReadOp::Primitive(PrimitiveKind::Int));

    assert!(matches!(
        loader.get_or_compile("x.y.Gone"),
        Err(Error::NotFound(_))
    ));
    Ok(())
}

#[test]
fn syntax_errors_name_the_file() -> Result<()> {
    let root = TempDir::new().unwrap();
    write(root.path(), "bad/IBroken.aidl", "package bad;\ninterface IBroken {\n  void f(\n");
    let loader = Loader::new().with_root(root.path())?;

    match loader.get_or_compile("bad.IBroken") {
        Err(Error::Syntax { path, .. }) => assert!(path.ends_with("bad/IBroken.aidl")),
        other => panic!("expected a syntax error, got {other:?}"),
    }
    Ok(())
}
