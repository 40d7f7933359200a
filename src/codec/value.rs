use std::fmt;

use serde::{ser::SerializeMap, Serialize, Serializer};

use crate::schema::QualifiedName;

/// A decoded Parcel value.
///
/// Serializes untagged, so a decoded message prints as plain JSON: integers as numbers,
/// strings as strings, objects as maps of their fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// A null string, array, object or dynamically-typed value
    Null,
    /// `readBoolean`
    Bool(bool),
    /// `readByte`
    Byte(i8),
    /// `readChar`, one UTF-16 unit
    Char(u16),
    /// `readShort`
    Short(i16),
    /// `readInt`
    Int(i32),
    /// `readLong`
    Long(i64),
    /// `readFloat`
    Float(f32),
    /// `readDouble`
    Double(f64),
    /// `readString` or `readString8`
    String(String),
    /// A packed byte array
    Bytes(Vec<u8>),
    /// A flattened binder object
    Binder(BinderObject),
    /// A repeated value
    List(Vec<Value>),
    /// Key/value pairs of a `readMap`, in wire order
    Map(Vec<(Value, Value)>),
    /// A strongly-typed object
    Object {
        /// Class the fields were read with
        class: QualifiedName,
        /// Fields in wire order
        fields: Fields,
    },
    /// A bundle, kept as raw bytes
    Bundle {
        /// `BNDL` for Java bundles, `BNDN` for native ones, absent for an empty bundle
        magic: Option<u32>,
        /// Payload following the magic
        raw: Vec<u8>,
    },
}

impl Value {
    /// The value as an integer, for condition evaluation.
    ///
    /// Booleans count as `0` / `1`. Non-integral values have no integer form.
    #[must_use]
    pub fn as_integral(&self) -> Option<i64> {
        match *self {
            Value::Bool(v) => Some(i64::from(v)),
            Value::Byte(v) => Some(i64::from(v)),
            Value::Char(v) => Some(i64::from(v)),
            Value::Short(v) => Some(i64::from(v)),
            Value::Int(v) => Some(i64::from(v)),
            Value::Long(v) => Some(v),
            _ => None,
        }
    }

    /// `true` for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// `struct flat_binder_object`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BinderObject {
    /// `BINDER_TYPE_*` tag
    #[serde(rename = "type")]
    pub kind: u32,
    /// `FLAT_BINDER_FLAG_*` bits
    pub flags: u32,
    /// Local binder pointer or remote handle
    pub handle: u64,
    /// Local cookie
    pub cookie: u64,
    /// Stability level, written from Android 10 on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stability: Option<u32>,
}

/// Named values in wire order.
///
/// Serializes as a JSON object whose keys keep the wire order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(Vec<(String, Value)>);

impl Fields {
    /// An empty field set.
    #[must_use]
    pub fn new() -> Self {
        Fields(Vec::new())
    }

    /// Append a value.
    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.0.push((name.into(), value));
    }

    /// The last value stored under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0
            .iter()
            .rev()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Whether a value is stored under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` if nothing was stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Names in wire order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    /// Name/value pairs in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl Serialize for Fields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Why decoding stopped before the end of the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HaltReason {
    /// The schema has no wire mapping for this value
    Unsupported {
        /// The read operation or dynamic tag that cannot be decoded
        call: String,
    },
    /// The buffer ended early, or a length prefix points past its end
    Truncated {
        /// What went wrong
        message: String,
    },
    /// The interface has no method with this transaction code
    UnknownTransaction {
        /// Transaction code of the message
        code: u32,
    },
    /// A referenced class could not be compiled
    UnknownClass {
        /// The qualified name that failed
        name: String,
        /// Why the loader failed
        message: String,
    },
    /// The reply carries an exception instead of a result
    RemoteException {
        /// Exception code from the reply header
        code: i32,
        /// Exception message, if any
        message: Option<String>,
    },
    /// The schema does not fit the message
    Schema {
        /// What is inconsistent
        message: String,
    },
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::Unsupported { call } => write!(f, "unsupported read '{call}'"),
            HaltReason::Truncated { message } => write!(f, "truncated: {message}"),
            HaltReason::UnknownTransaction { code } => {
                write!(f, "no method with transaction code {code}")
            }
            HaltReason::UnknownClass { name, message } => {
                write!(f, "cannot load class {name}: {message}")
            }
            HaltReason::RemoteException { code, message } => match message {
                Some(message) => write!(f, "remote exception {code}: {message}"),
                None => write!(f, "remote exception {code}"),
            },
            HaltReason::Schema { message } => write!(f, "schema mismatch: {message}"),
        }
    }
}

/// Where and why decoding of a message stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeHalt {
    /// Buffer offset at which the failing value starts
    pub offset: usize,
    /// Dotted path of the failing value, with `[i]` for list elements; empty for the envelope
    pub path: String,
    /// Cause
    pub reason: HaltReason,
}

impl fmt::Display for DecodeHalt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{} at offset {}", self.reason, self.offset)
        } else {
            write!(f, "{} at {} (offset {})", self.reason, self.path, self.offset)
        }
    }
}

/// Header fields preceding the interface token of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Envelope {
    /// Strict-mode policy mask
    pub policy: Option<u32>,
    /// Work-source uid, Android 10 and later
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_source: Option<u32>,
    /// Environment header (`SYST` on system builds), Android 11 and later
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<u32>,
    /// Interface descriptor
    pub descriptor: Option<String>,
}

/// A decoded transaction request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncomingMessage {
    /// Transaction code
    pub code: u32,
    /// Envelope fields read before the payload
    pub envelope: Envelope,
    /// Name of the called method, when the code matched one
    pub method: Option<String>,
    /// `in` and `inout` arguments in wire order
    pub arguments: Fields,
    /// Bytes left after the last argument
    pub trailing: usize,
    /// Set when decoding stopped early
    pub halt: Option<DecodeHalt>,
}

/// A decoded transaction reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingMessage {
    /// Transaction code of the request this answers
    pub code: u32,
    /// Interface the reply belongs to
    pub descriptor: String,
    /// Reply status word, `0` when no exception was written
    pub status: Option<i32>,
    /// Name of the answered method, when the code matched one
    pub method: Option<String>,
    /// `return` followed by the `out` and `inout` arguments, in wire order
    pub values: Fields,
    /// Bytes left after the last value
    pub trailing: usize,
    /// Set when decoding stopped early
    pub halt: Option<DecodeHalt>,
}

/// Either side of a transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "direction", rename_all = "lowercase")]
pub enum Message {
    /// A request
    Incoming(IncomingMessage),
    /// A reply
    Outgoing(OutgoingMessage),
}

impl Message {
    /// Transaction code of the message.
    #[must_use]
    pub fn code(&self) -> u32 {
        match self {
            Message::Incoming(message) => message.code,
            Message::Outgoing(message) => message.code,
        }
    }

    /// Halt marker of the message.
    #[must_use]
    pub fn halt(&self) -> Option<&DecodeHalt> {
        match self {
            Message::Incoming(message) => message.halt.as_ref(),
            Message::Outgoing(message) => message.halt.as_ref(),
        }
    }
}

/// A standalone parcelable read with [`crate::codec::ParcelCodec::decode_parcelable`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedObject {
    /// Class the fields were read with
    pub class: QualifiedName,
    /// Fields in wire order
    pub fields: Fields,
    /// Bytes left after the object
    pub trailing: usize,
    /// Set when decoding stopped early
    pub halt: Option<DecodeHalt>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_serialize_in_wire_order() {
        let mut fields = Fields::new();
        fields.push("z", Value::Int(1));
        fields.push("a", Value::String("x".into()));
        fields.push("m", Value::Null);

        let json = serde_json::to_string(&fields).unwrap();
        assert_eq!(json, r#"{"z":1,"a":"x","m":null}"#);
        assert_eq!(fields.names().collect::<Vec<_>>(), ["z", "a", "m"]);
    }

    #[test]
    fn test_integral_values() {
        assert_eq!(Value::Bool(true).as_integral(), Some(1));
        assert_eq!(Value::Byte(-2).as_integral(), Some(-2));
        assert_eq!(Value::Long(i64::MAX).as_integral(), Some(i64::MAX));
        assert_eq!(Value::Float(1.0).as_integral(), None);
        assert_eq!(Value::Null.as_integral(), None);
    }

    #[test]
    fn test_message_json() {
        let message = Message::Outgoing(OutgoingMessage {
            code: 3,
            descriptor: "a.IFoo".into(),
            status: Some(-1),
            method: Some("f".into()),
            values: Fields::new(),
            trailing: 0,
            halt: Some(DecodeHalt {
                offset: 4,
                path: String::new(),
                reason: HaltReason::RemoteException {
                    code: -1,
                    message: Some("denied".into()),
                },
            }),
        });

        let json: serde_json::Value = serde_json::to_value(&message).unwrap();
        assert_eq!(json["direction"], "outgoing");
        assert_eq!(json["halt"]["reason"]["kind"], "remote_exception");
        assert_eq!(json["halt"]["reason"]["message"], "denied");
        assert_eq!(
            message.halt().unwrap().to_string(),
            "remote exception -1: denied at offset 4"
        );
    }
}
