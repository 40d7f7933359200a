//! Schema-driven decoding of Binder transaction buffers.
//!
//! [`ParcelCodec`] turns the raw bytes of a transaction into a [`Message`], using the compiled
//! schemas of a [`Loader`] to know what to read. Requests are matched against the `in` and
//! `inout` parameters of the method selected by the transaction code, replies against its
//! return value and the `out` and `inout` parameters.
//!
//! # Key Components
//!
//! - [`ParcelCodec`] - Decoder bound to a loader and an [`AndroidVersion`]
//! - [`Message`] - [`IncomingMessage`] or [`OutgoingMessage`]
//! - [`Value`] / [`Fields`] - Decoded values, in wire order
//! - [`DecodeHalt`] - Where and why decoding stopped early
//! - [`Layout`] - Per-release wire differences
//!
//! # Partial Results
//!
//! Decoding never fails as a whole. A truncated buffer, an unsupported field or an unknown
//! transaction code produce a message that holds everything decoded before the problem, with
//! [`Message::halt`] describing it.
//!
//! # Examples
//!
//! ```rust,no_run
//! use parcelscope::{codec::{AndroidVersion, ParcelCodec}, Loader};
//!
//! let loader = Loader::new().with_root("aidl")?;
//! let codec = ParcelCodec::new(&loader, AndroidVersion(13));
//!
//! let data = std::fs::read("transaction.bin")?;
//! let message = codec.decode_request(&data, 3, None);
//! println!("{}", serde_json::to_string_pretty(&message).unwrap());
//! if let Some(halt) = &message.halt {
//!     eprintln!("incomplete: {halt}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod decoder;
mod envelope;
mod value;

use std::{fmt, sync::Arc};

use log::debug;
use serde::Serialize;
use strum::{Display, EnumString};

pub use envelope::Layout;
pub use value::{
    BinderObject, DecodeHalt, DecodedObject, Envelope, Fields, HaltReason, IncomingMessage,
    Message, OutgoingMessage, Value,
};

use crate::{
    codec::decoder::{Decoder, FieldSource},
    schema::{ClassDef, FieldDef, MethodDef, QualifiedName},
    Loader,
};

/// Android API level, as reported by `ro.build.version.release`'s major number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct AndroidVersion(pub u32);

impl AndroidVersion {
    /// Newest release with a known layout.
    pub const LATEST: AndroidVersion = AndroidVersion(14);
}

impl Default for AndroidVersion {
    fn default() -> Self {
        AndroidVersion::LATEST
    }
}

impl From<u32> for AndroidVersion {
    fn from(value: u32) -> Self {
        AndroidVersion(value)
    }
}

impl fmt::Display for AndroidVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Android {}", self.0)
    }
}

/// Which side of a transaction a buffer holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum MessageKind {
    /// The caller's data, starting with the interface token
    Request,
    /// The callee's answer, starting with the status word
    Reply,
}

/// Decodes transaction buffers against the schemas of a [`Loader`].
///
/// The codec itself holds no mutable state; one instance can decode from many threads at once.
/// Classes referenced by a message are compiled on first use through
/// [`Loader::get_or_compile`].
pub struct ParcelCodec<'l> {
    loader: &'l Loader,
    version: AndroidVersion,
    layout: Layout,
}

impl<'l> ParcelCodec<'l> {
    /// Create a codec for buffers captured on `version`.
    #[must_use]
    pub fn new(loader: &'l Loader, version: AndroidVersion) -> Self {
        ParcelCodec {
            loader,
            version,
            layout: Layout::for_version(version),
        }
    }

    /// The Android release this codec decodes for.
    #[must_use]
    pub fn version(&self) -> AndroidVersion {
        self.version
    }

    /// The wire layout of [`ParcelCodec::version`].
    #[must_use]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Decode either side of a transaction.
    ///
    /// Requests take the descriptor from their envelope and fall back to `descriptor`. Replies
    /// carry no envelope, so without a descriptor the result only reports the missing
    /// interface.
    #[must_use]
    pub fn decode(
        &self,
        data: &[u8],
        code: u32,
        kind: MessageKind,
        descriptor: Option<&str>,
    ) -> Message {
        match (kind, descriptor) {
            (MessageKind::Request, hint) => Message::Incoming(self.decode_request(data, code, hint)),
            (MessageKind::Reply, Some(descriptor)) => {
                Message::Outgoing(self.decode_reply(data, code, descriptor))
            }
            (MessageKind::Reply, None) => Message::Outgoing(OutgoingMessage {
                code,
                descriptor: String::new(),
                status: None,
                method: None,
                values: Fields::new(),
                trailing: data.len(),
                halt: Some(DecodeHalt {
                    offset: 0,
                    path: String::new(),
                    reason: HaltReason::Schema {
                        message: "a reply cannot be decoded without its interface descriptor"
                            .to_string(),
                    },
                }),
            }),
        }
    }

    /// Decode a request buffer: envelope, then the `in` and `inout` arguments.
    ///
    /// `hint` names the interface when the envelope carries no descriptor.
    #[must_use]
    pub fn decode_request(&self, data: &[u8], code: u32, hint: Option<&str>) -> IncomingMessage {
        let mut decoder = Decoder::new(data, self.loader, self.layout);
        let mut message = IncomingMessage {
            code,
            envelope: Envelope::default(),
            method: None,
            arguments: Fields::new(),
            trailing: 0,
            halt: None,
        };

        if let Err(error) = self
            .layout
            .read_envelope(decoder.parser(), &mut message.envelope)
        {
            message.halt = Some(decoder.halt(error.into()));
            message.trailing = decoder.remaining();
            return message;
        }

        let descriptor = message
            .envelope
            .descriptor
            .clone()
            .or_else(|| hint.map(str::to_string));

        let method = descriptor
            .ok_or_else(|| HaltReason::Schema {
                message: "no interface descriptor in the envelope".to_string(),
            })
            .and_then(|descriptor| self.method(&descriptor, code));

        match method {
            Ok((interface, method)) => {
                debug!("{interface}: request {code} -> {}", method.name);
                let parameters = method
                    .arguments
                    .iter()
                    .filter(|parameter| parameter.direction.is_incoming())
                    .map(|parameter| FieldDef {
                        name: parameter.name.clone(),
                        ty: parameter.ty.clone(),
                        call: parameter.call.clone(),
                        condition: None,
                    })
                    .collect();

                let (arguments, halt) =
                    decoder.read_fields(interface, FieldSource::Owned(parameters), None);
                message.method = Some(method.name);
                message.arguments = arguments;
                message.halt = halt;
            }
            Err(reason) => message.halt = Some(decoder.halt(reason)),
        }

        message.trailing = decoder.remaining();
        message
    }

    /// Decode a reply buffer: status word, then the return value and the `out` and `inout`
    /// arguments.
    #[must_use]
    pub fn decode_reply(&self, data: &[u8], code: u32, descriptor: &str) -> OutgoingMessage {
        let mut decoder = Decoder::new(data, self.loader, self.layout);
        let method = self.method(descriptor, code);
        let mut message = OutgoingMessage {
            code,
            descriptor: descriptor.to_string(),
            status: None,
            method: method.as_ref().ok().map(|(_, method)| method.name.clone()),
            values: Fields::new(),
            trailing: 0,
            halt: None,
        };

        let status = match decoder.parser().read_i32() {
            Ok(status) => status,
            Err(error) => {
                message.halt = Some(decoder.halt(error.into()));
                message.trailing = decoder.remaining();
                return message;
            }
        };
        message.status = Some(status);

        if status != 0 {
            let exception = decoder.parser().read_string16().ok().flatten();
            message.halt = Some(DecodeHalt {
                offset: 0,
                path: String::new(),
                reason: HaltReason::RemoteException {
                    code: status,
                    message: exception,
                },
            });
            message.trailing = decoder.remaining();
            return message;
        }

        match method {
            Ok((interface, method)) => {
                debug!("{interface}: reply {code} <- {}", method.name);
                let values = method
                    .retval
                    .iter()
                    .map(|retval| FieldDef {
                        name: "return".to_string(),
                        ty: retval.ty.clone(),
                        call: retval.call.clone(),
                        condition: None,
                    })
                    .chain(
                        method
                            .arguments
                            .iter()
                            .filter(|parameter| parameter.direction.is_outgoing())
                            .map(|parameter| FieldDef {
                                name: parameter.name.clone(),
                                ty: parameter.ty.clone(),
                                call: parameter.call.clone(),
                                condition: None,
                            }),
                    )
                    .collect();

                let (values, halt) =
                    decoder.read_fields(interface, FieldSource::Owned(values), None);
                message.values = values;
                message.halt = halt;
            }
            Err(reason) => message.halt = Some(decoder.halt(reason)),
        }

        message.trailing = decoder.remaining();
        message
    }

    /// Decode a standalone parcelable of class `name`, as written by `writeToParcel`.
    #[must_use]
    pub fn decode_parcelable(&self, data: &[u8], name: impl Into<QualifiedName>) -> DecodedObject {
        let name = name.into();
        let mut decoder = Decoder::new(data, self.loader, self.layout);

        let (fields, halt) = match self.parcelable(&name) {
            Ok(class) => decoder.read_class(class),
            Err(reason) => (Fields::new(), Some(decoder.halt(reason))),
        };

        DecodedObject {
            class: name,
            fields,
            trailing: decoder.remaining(),
            halt,
        }
    }

    fn interface(&self, descriptor: &str) -> Result<Arc<ClassDef>, HaltReason> {
        let class = self
            .loader
            .get_or_compile(descriptor)
            .map_err(|error| HaltReason::UnknownClass {
                name: descriptor.to_string(),
                message: error.to_string(),
            })?;

        if class.is_binder() {
            Ok(class)
        } else {
            Err(HaltReason::Schema {
                message: format!("{descriptor} is not an interface"),
            })
        }
    }

    fn method(
        &self,
        descriptor: &str,
        code: u32,
    ) -> Result<(QualifiedName, MethodDef), HaltReason> {
        let class = self.interface(descriptor)?;
        class
            .as_binder()
            .and_then(|binder| binder.method(code))
            .map(|method| (class.name.clone(), method.clone()))
            .ok_or(HaltReason::UnknownTransaction { code })
    }

    fn parcelable(&self, name: &QualifiedName) -> Result<Arc<ClassDef>, HaltReason> {
        let class = self
            .loader
            .get_or_compile(name)
            .map_err(|error| HaltReason::UnknownClass {
                name: name.to_string(),
                message: error.to_string(),
            })?;

        if class.is_binder() {
            return Err(HaltReason::Schema {
                message: format!("{name} is an interface, not a parcelable"),
            });
        }
        Ok(class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        schema::{
            BinderDef, ClassKind, Direction, ParameterDef, ParcelableDef, PrimitiveKind, ReadOp,
            ReturnDef,
        },
        test::ParcelBuilder,
    };

    const SYST: u32 = 0x5359_5354;

    fn parameter(name: &str, call: ReadOp, direction: Direction) -> ParameterDef {
        ParameterDef {
            name: name.into(),
            ty: None,
            call,
            direction,
        }
    }

    fn int() -> ReadOp {
        ReadOp::Primitive(PrimitiveKind::Int)
    }

    /// `a.IStore` with `int put(String key, in int[] values, out Entry entry, inout int[] io)`
    fn loader() -> Loader {
        let loader = Loader::new();
        loader
            .insert(ClassDef {
                kind: ClassKind::Parcelable(ParcelableDef {
                    fields: vec![FieldDef::new("id", int())],
                    ..ParcelableDef::default()
                }),
                ..ClassDef::empty("a.Entry".into())
            })
            .unwrap();
        loader
            .insert(ClassDef {
                kind: ClassKind::Binder(BinderDef {
                    methods: vec![MethodDef {
                        name: "put".into(),
                        tc: 1,
                        oneway: false,
                        retval: Some(ReturnDef { ty: None, call: int() }),
                        arguments: vec![
                            parameter(
                                "key",
                                ReadOp::Primitive(PrimitiveKind::String),
                                Direction::In,
                            ),
                            parameter("values", ReadOp::repeated(int()), Direction::In),
                            parameter(
                                "entry",
                                ReadOp::Parcelable("a.Entry".into()),
                                Direction::Out,
                            ),
                            parameter("io", ReadOp::repeated(int()), Direction::InOut),
                        ],
                    }],
                }),
                ..ClassDef::empty("a.IStore".into())
            })
            .unwrap();
        loader
    }

    fn payload(builder: ParcelBuilder) -> ParcelBuilder {
        builder
            .string16(Some("k"))
            .int(1)
            .int(5)
            .int(2)
            .int(7)
            .int(8)
    }

    #[test]
    fn test_request_per_version() {
        let loader = loader();
        let old = payload(ParcelBuilder::new().int(0x10).string16(Some("a.IStore"))).build();
        let new = payload(
            ParcelBuilder::new()
                .int(0x10)
                .int(-1)
                .uint(SYST)
                .string16(Some("a.IStore")),
        )
        .build();

        let pie = ParcelCodec::new(&loader, AndroidVersion(9)).decode_request(&old, 1, None);
        let r = ParcelCodec::new(&loader, AndroidVersion(11)).decode_request(&new, 1, None);

        for message in [&pie, &r] {
            assert!(message.halt.is_none(), "{:?}", message.halt);
            assert_eq!(message.method.as_deref(), Some("put"));
            assert_eq!(
                message.arguments.names().collect::<Vec<_>>(),
                ["key", "values", "io"]
            );
            assert_eq!(message.trailing, 0);
        }
        assert_eq!(pie.arguments, r.arguments);
        assert_eq!(pie.envelope.work_source, None);
        assert_eq!(r.envelope.environment, Some(SYST));

        // the Android 11 buffer read with the Android 9 layout takes the work-source uid as the
        // descriptor length
        let wrong = ParcelCodec::new(&loader, AndroidVersion(9)).decode_request(&new, 1, None);
        assert!(wrong.halt.is_some());
        assert!(wrong.arguments.is_empty());
    }

    #[test]
    fn test_unknown_transaction_keeps_envelope() {
        let loader = loader();
        let data = ParcelBuilder::new()
            .int(0)
            .string16(Some("a.IStore"))
            .int(1)
            .build();

        let message = ParcelCodec::new(&loader, AndroidVersion(9)).decode_request(&data, 99, None);
        assert_eq!(message.envelope.descriptor.as_deref(), Some("a.IStore"));
        assert!(message.method.is_none());
        assert!(message.arguments.is_empty());
        let halt = message.halt.unwrap();
        assert_eq!(halt.reason, HaltReason::UnknownTransaction { code: 99 });
        assert_eq!(message.trailing, 4);
    }

    #[test]
    fn test_descriptor_hint() {
        let loader = loader();
        let data = payload(ParcelBuilder::new().int(0).string16(None)).build();
        let codec = ParcelCodec::new(&loader, AndroidVersion(9));

        let message = codec.decode_request(&data, 1, Some("a.IStore"));
        assert!(message.halt.is_none());
        assert_eq!(message.arguments.len(), 3);

        let message = codec.decode_request(&data, 1, None);
        assert!(matches!(
            message.halt.unwrap().reason,
            HaltReason::Schema { .. }
        ));
    }

    #[test]
    fn test_truncated_envelope() {
        let loader = loader();
        let data = ParcelBuilder::new().int(0).int(12).build();
        let message = ParcelCodec::new(&loader, AndroidVersion(9)).decode_request(&data, 1, None);

        assert_eq!(message.envelope.policy, Some(0));
        let halt = message.halt.unwrap();
        assert!(halt.path.is_empty());
        assert!(matches!(halt.reason, HaltReason::Truncated { .. }));
    }

    #[test]
    fn test_reply() {
        let loader = loader();
        let codec = ParcelCodec::new(&loader, AndroidVersion(11));
        let data = ParcelBuilder::new()
            .int(0)
            .int(42)
            .int(1)
            .int(3)
            .int(1)
            .int(9)
            .build();

        let message = codec.decode_reply(&data, 1, "a.IStore");
        assert!(message.halt.is_none());
        assert_eq!(message.status, Some(0));
        assert_eq!(
            message.values.names().collect::<Vec<_>>(),
            ["return", "entry", "io"]
        );
        assert_eq!(message.values.get("return"), Some(&Value::Int(42)));
        assert_eq!(
            message.values.get("io"),
            Some(&Value::List(vec![Value::Int(9)]))
        );
    }

    #[test]
    fn test_reply_exception() {
        let loader = loader();
        let codec = ParcelCodec::new(&loader, AndroidVersion(11));
        let data = ParcelBuilder::new()
            .int(-1)
            .string16(Some("denied"))
            .build();

        let message = codec.decode(&data, 1, MessageKind::Reply, Some("a.IStore"));
        let Message::Outgoing(message) = message else {
            panic!("expected a reply");
        };
        assert_eq!(message.method.as_deref(), Some("put"));
        assert!(message.values.is_empty());
        assert_eq!(
            message.halt.unwrap().reason,
            HaltReason::RemoteException {
                code: -1,
                message: Some("denied".into())
            }
        );
    }

    #[test]
    fn test_reply_without_descriptor() {
        let loader = loader();
        let codec = ParcelCodec::new(&loader, AndroidVersion(11));
        let message = codec.decode(&[0, 0, 0, 0], 1, MessageKind::Reply, None);
        assert!(matches!(
            message.halt().unwrap().reason,
            HaltReason::Schema { .. }
        ));
        assert_eq!(message.code(), 1);
    }

    #[test]
    fn test_decode_parcelable() {
        let loader = loader();
        let codec = ParcelCodec::new(&loader, AndroidVersion(11));

        let object = codec.decode_parcelable(&[5, 0, 0, 0, 1, 2], "a.Entry");
        assert!(object.halt.is_none());
        assert_eq!(object.fields.get("id"), Some(&Value::Int(5)));
        assert_eq!(object.trailing, 2);

        let object = codec.decode_parcelable(&[], "a.IStore");
        assert!(matches!(
            object.halt.unwrap().reason,
            HaltReason::Schema { .. }
        ));
    }

    #[test]
    fn test_message_kind_names() {
        assert_eq!(MessageKind::Reply.to_string(), "reply");
        assert_eq!("request".parse::<MessageKind>().unwrap(), MessageKind::Request);
        assert_eq!(AndroidVersion::default(), AndroidVersion::LATEST);
    }
}
