//! Fixed tables of Parcel primitives and framework types with a dedicated wire format.

use crate::schema::{PrimitiveKind, ReadOp};

/// Wire properties of a primitive keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimitiveInfo {
    /// Keyword as written in source
    pub keyword: &'static str,
    /// Bytes occupied on the wire, the minimum for strings
    pub width: usize,
    /// Signed interpretation
    pub signed: bool,
    /// Read routine
    pub kind: PrimitiveKind,
}

const fn primitive(
    keyword: &'static str,
    width: usize,
    signed: bool,
    kind: PrimitiveKind,
) -> PrimitiveInfo {
    PrimitiveInfo {
        keyword,
        width,
        signed,
        kind,
    }
}

/// Every keyword that maps straight to a `Parcel.read*` primitive.
pub const PRIMITIVES: &[PrimitiveInfo] = &[
    primitive("boolean", 4, true, PrimitiveKind::Boolean),
    primitive("byte", 4, true, PrimitiveKind::Byte),
    primitive("char", 4, false, PrimitiveKind::Char),
    primitive("short", 4, true, PrimitiveKind::Short),
    primitive("int", 4, true, PrimitiveKind::Int),
    primitive("long", 8, true, PrimitiveKind::Long),
    primitive("float", 4, true, PrimitiveKind::Float),
    primitive("double", 8, true, PrimitiveKind::Double),
    primitive("String", 4, false, PrimitiveKind::String),
    primitive("java.lang.String", 4, false, PrimitiveKind::String),
];

/// Look up a primitive keyword.
#[must_use]
pub fn lookup(keyword: &str) -> Option<&'static PrimitiveInfo> {
    PRIMITIVES.iter().find(|info| info.keyword == keyword)
}

/// Framework types with their own marshaling, by simple or qualified name.
#[must_use]
pub fn builtin(name: &str) -> Option<ReadOp> {
    Some(match name {
        "IBinder" | "android.os.IBinder" => ReadOp::StrongBinder,
        "Bundle" | "android.os.Bundle" | "PersistableBundle" | "android.os.PersistableBundle" => {
            ReadOp::Bundle
        }
        "Map" | "HashMap" | "java.util.Map" | "java.util.HashMap" => ReadOp::Map,
        "Object" | "java.lang.Object" => ReadOp::Value,
        "CharSequence" | "java.lang.CharSequence" => ReadOp::Unsupported(name.to_string()),
        "ParcelFileDescriptor" | "android.os.ParcelFileDescriptor" | "FileDescriptor" => {
            ReadOp::Unsupported(name.to_string())
        }
        _ => return None,
    })
}

/// Container types that read as an `i32` count followed by elements.
#[must_use]
pub fn is_list(name: &str) -> bool {
    matches!(
        name,
        "List" | "ArrayList" | "java.util.List" | "java.util.ArrayList"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_table() {
        let int = lookup("int").unwrap();
        assert_eq!(int.width, 4);
        assert!(int.signed);
        assert_eq!(int.kind, PrimitiveKind::Int);

        assert_eq!(lookup("long").unwrap().width, 8);
        assert!(!lookup("char").unwrap().signed);
        assert_eq!(
            lookup("java.lang.String").unwrap().kind,
            PrimitiveKind::String
        );
        assert!(lookup("void").is_none());
        assert!(lookup("Integer").is_none());
    }

    #[test]
    fn test_builtins() {
        assert_eq!(builtin("android.os.IBinder"), Some(ReadOp::StrongBinder));
        assert_eq!(builtin("PersistableBundle"), Some(ReadOp::Bundle));
        assert!(!builtin("CharSequence").unwrap().is_supported());
        assert_eq!(builtin("Parcel"), None);
        assert!(is_list("ArrayList"));
    }
}
