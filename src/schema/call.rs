//! Symbolic read operations.
//!
//! Every field, parameter and return value in a compiled schema carries a [`ReadOp`]: the exact
//! `Parcel` call a Binder peer performs to unmarshal it. Read operations are persisted as short
//! identifiers such as `readInt`, `readStringVector` or `readParcelable:android.os.Foo`, and are
//! parsed back with [`std::str::FromStr`].

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::{schema::QualifiedName, Error, Result};

/// Parcel primitives with a fixed read routine.
///
/// The [`Display`] form is the suffix of the matching `Parcel.read*` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum PrimitiveKind {
    /// 32-bit signed integer
    Int,
    /// 64-bit signed integer
    Long,
    /// Boolean widened to a 32-bit slot
    Boolean,
    /// Byte widened to a 32-bit slot
    Byte,
    /// UTF-16 code unit widened to a 32-bit slot
    Char,
    /// 16-bit integer widened to a 32-bit slot
    Short,
    /// IEEE-754 single precision
    Float,
    /// IEEE-754 double precision
    Double,
    /// Length-prefixed UTF-16 string
    String,
    /// Length-prefixed UTF-8 string
    String8,
}

impl PrimitiveKind {
    /// Smallest number of bytes a value of this kind occupies on the wire.
    #[must_use]
    pub fn min_wire_size(self) -> usize {
        match self {
            PrimitiveKind::Long | PrimitiveKind::Double => 8,
            _ => 4,
        }
    }

    /// Whether the value has a numeric reading usable in a [`crate::schema::ConditionDef`].
    #[must_use]
    pub fn is_integral(self) -> bool {
        !matches!(
            self,
            PrimitiveKind::Float
                | PrimitiveKind::Double
                | PrimitiveKind::String
                | PrimitiveKind::String8
        )
    }
}

/// How a single value is read from a Parcel.
///
/// `Unsupported` keeps the original type name so the field stays in the schema and decoding can
/// report exactly which type stopped it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ReadOp {
    /// A fixed-layout primitive or string.
    Primitive(PrimitiveKind),
    /// A `flat_binder_object`.
    StrongBinder,
    /// A nullable, strongly-typed parcelable (`readTypedObject`).
    Parcelable(QualifiedName),
    /// An `i32` count followed by that many elements.
    Repeated(Box<ReadOp>),
    /// A `Bundle`, kept as raw bytes.
    Bundle,
    /// An untyped `Map` of [`ReadOp::Value`] pairs.
    Map,
    /// A value prefixed by its `writeValue` type tag.
    Value,
    /// A type without a known wire mapping.
    Unsupported(String),
}

impl ReadOp {
    /// Wrap `element` in a repeated container.
    #[must_use]
    pub fn repeated(element: ReadOp) -> Self {
        ReadOp::Repeated(Box::new(element))
    }

    /// `true` unless this operation, or an element it contains, is [`ReadOp::Unsupported`].
    #[must_use]
    pub fn is_supported(&self) -> bool {
        match self {
            ReadOp::Unsupported(_) => false,
            ReadOp::Repeated(inner) => inner.is_supported(),
            _ => true,
        }
    }

    /// Smallest number of bytes one value read by this operation occupies.
    ///
    /// Used to reject element counts that cannot fit in what is left of a buffer.
    #[must_use]
    pub fn min_wire_size(&self) -> usize {
        match self {
            ReadOp::Primitive(kind) => kind.min_wire_size(),
            // type + flags + handle + cookie
            ReadOp::StrongBinder => 24,
            _ => 4,
        }
    }

    /// The class this operation reads, if it reads a parcelable.
    #[must_use]
    pub fn parcelable(&self) -> Option<&QualifiedName> {
        match self {
            ReadOp::Parcelable(name) => Some(name),
            ReadOp::Repeated(inner) => inner.parcelable(),
            _ => None,
        }
    }
}

impl fmt::Display for ReadOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadOp::Primitive(kind) => write!(f, "read{kind}"),
            ReadOp::StrongBinder => f.write_str("readStrongBinder"),
            ReadOp::Parcelable(name) => write!(f, "readParcelable:{name}"),
            ReadOp::Repeated(inner) => match inner.as_ref() {
                ReadOp::Primitive(kind) => write!(f, "read{kind}Vector"),
                ReadOp::StrongBinder => f.write_str("readStrongBinderVector"),
                ReadOp::Parcelable(name) => write!(f, "readParcelableVector:{name}"),
                other => write!(f, "readList:{other}"),
            },
            ReadOp::Bundle => f.write_str("readBundle"),
            ReadOp::Map => f.write_str("readMap"),
            ReadOp::Value => f.write_str("readValue"),
            ReadOp::Unsupported(name) => write!(f, "unsupported:{name}"),
        }
    }
}

impl FromStr for ReadOp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(name) = s.strip_prefix("unsupported:") {
            return Ok(ReadOp::Unsupported(name.to_string()));
        }
        if let Some(name) = s.strip_prefix("readParcelableVector:") {
            return Ok(ReadOp::repeated(ReadOp::Parcelable(qualified(s, name)?)));
        }
        if let Some(name) = s.strip_prefix("readParcelable:") {
            return Ok(ReadOp::Parcelable(qualified(s, name)?));
        }
        if let Some(inner) = s.strip_prefix("readList:") {
            // Older schemas store the element class name directly
            let element = if inner.starts_with("read") || inner.starts_with("unsupported:") {
                inner.parse()?
            } else {
                ReadOp::Parcelable(qualified(s, inner)?)
            };
            return Ok(ReadOp::repeated(element));
        }

        match s {
            "readStrongBinder" => return Ok(ReadOp::StrongBinder),
            "readStrongBinderVector" => return Ok(ReadOp::repeated(ReadOp::StrongBinder)),
            "readBundle" => return Ok(ReadOp::Bundle),
            "readMap" => return Ok(ReadOp::Map),
            "readValue" => return Ok(ReadOp::Value),
            _ => {}
        }

        let Some(rest) = s.strip_prefix("read") else {
            return Err(Error::InvalidCall(s.to_string()));
        };
        if let Some(kind) = rest.strip_suffix("Vector") {
            if let Ok(kind) = PrimitiveKind::from_str(kind) {
                return Ok(ReadOp::repeated(ReadOp::Primitive(kind)));
            }
        }
        PrimitiveKind::from_str(rest)
            .map(ReadOp::Primitive)
            .map_err(|_| Error::InvalidCall(s.to_string()))
    }
}

fn qualified(call: &str, name: &str) -> Result<QualifiedName> {
    if name.is_empty() {
        return Err(Error::InvalidCall(call.to_string()));
    }
    Ok(QualifiedName::new(name))
}

impl TryFrom<String> for ReadOp {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ReadOp> for String {
    fn from(value: ReadOp) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_primitive_identifiers() {
        for kind in PrimitiveKind::iter() {
            let op = ReadOp::Primitive(kind);
            assert_eq!(op.to_string().parse::<ReadOp>().unwrap(), op);

            let vector = ReadOp::repeated(ReadOp::Primitive(kind));
            assert!(vector.to_string().ends_with("Vector"));
            assert_eq!(vector.to_string().parse::<ReadOp>().unwrap(), vector);
        }
        assert_eq!(ReadOp::Primitive(PrimitiveKind::Int).to_string(), "readInt");
        assert_eq!(
            ReadOp::Primitive(PrimitiveKind::String8).to_string(),
            "readString8"
        );
    }

    #[test]
    fn test_class_identifiers() {
        let op: ReadOp = "readParcelable:android.os.WorkSource".parse().unwrap();
        assert_eq!(
            op,
            ReadOp::Parcelable(QualifiedName::new("android.os.WorkSource"))
        );

        let op: ReadOp = "readParcelableVector:a.B".parse().unwrap();
        assert_eq!(op.parcelable().unwrap().as_str(), "a.B");
    }

    #[test]
    fn test_nested_lists() {
        let op = ReadOp::repeated(ReadOp::repeated(ReadOp::Primitive(PrimitiveKind::Int)));
        assert_eq!(op.to_string(), "readList:readIntVector");
        assert_eq!(op.to_string().parse::<ReadOp>().unwrap(), op);

        // Element class names without a read prefix
        let op: ReadOp = "readList:com.example.Item".parse().unwrap();
        assert_eq!(
            op,
            ReadOp::repeated(ReadOp::Parcelable(QualifiedName::new("com.example.Item")))
        );
    }

    #[test]
    fn test_unsupported() {
        let op = ReadOp::repeated(ReadOp::Unsupported("CharSequence".into()));
        assert!(!op.is_supported());
        assert_eq!(op.to_string(), "readList:unsupported:CharSequence");
        assert_eq!(op.to_string().parse::<ReadOp>().unwrap(), op);
    }

    #[test]
    fn test_invalid() {
        assert!(matches!(
            "writeInt".parse::<ReadOp>(),
            Err(Error::InvalidCall(_))
        ));
        assert!("readWhatever".parse::<ReadOp>().is_err());
        assert!("readParcelable:".parse::<ReadOp>().is_err());
    }

    #[test]
    fn test_serde() {
        let op = ReadOp::repeated(ReadOp::StrongBinder);
        let json = serde_json::to_string(&op).unwrap();
        assert_eq!(json, "\"readStrongBinderVector\"");
        assert_eq!(serde_json::from_str::<ReadOp>(&json).unwrap(), op);
        assert!(serde_json::from_str::<ReadOp>("\"bogus\"").is_err());
    }
}
