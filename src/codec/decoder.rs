//! Schema-driven Parcel reader.
//!
//! The decoder replays the read calls of a field list against a buffer. Nested objects, lists
//! and maps are not decoded by recursion: each open container is a [`Frame`] on an explicit
//! stack, so nesting depth is limited by the buffer (every frame consumes at least four bytes
//! before it is pushed) and never by the native call stack. This is what keeps cyclic schemas
//! (`A` holding a `B` holding an `A`) finite.
//!
//! When a read fails, the frames above the outermost one are dropped and the outermost field
//! list is returned as far as it was completely decoded, together with a [`DecodeHalt`].

use std::sync::Arc;

use crate::{
    codec::{envelope::Layout, BinderObject, DecodeHalt, Fields, HaltReason, Value},
    file::{parser::PARCEL_ALIGNMENT, Parser},
    schema::{ClassDef, FieldDef, PrimitiveKind, QualifiedName, ReadOp},
    Error, Loader,
};

/// `Parcel.writeValue` type tags.
mod tag {
    pub const NULL: i32 = -1;
    pub const STRING: i32 = 0;
    pub const INTEGER: i32 = 1;
    pub const MAP: i32 = 2;
    pub const BUNDLE: i32 = 3;
    pub const PARCELABLE: i32 = 4;
    pub const SHORT: i32 = 5;
    pub const LONG: i32 = 6;
    pub const FLOAT: i32 = 7;
    pub const DOUBLE: i32 = 8;
    pub const BOOLEAN: i32 = 9;
    pub const LIST: i32 = 11;
    pub const BYTEARRAY: i32 = 13;
    pub const STRINGARRAY: i32 = 14;
    pub const IBINDER: i32 = 15;
    pub const INTARRAY: i32 = 18;
    pub const LONGARRAY: i32 = 19;
    pub const BYTE: i32 = 20;
    pub const BOOLEANARRAY: i32 = 23;
}

impl From<Error> for HaltReason {
    fn from(error: Error) -> Self {
        HaltReason::Truncated {
            message: error.to_string(),
        }
    }
}

/// Field list driving an object frame.
pub(crate) enum FieldSource {
    /// Synthesized list, such as the parameters of a method
    Owned(Vec<FieldDef>),
    /// The fields of a compiled parcelable
    Class(Arc<ClassDef>),
}

impl FieldSource {
    fn fields(&self) -> &[FieldDef] {
        match self {
            FieldSource::Owned(fields) => fields,
            FieldSource::Class(class) => class
                .as_parcelable()
                .map_or(&[][..], |def| def.fields.as_slice()),
        }
    }
}

/// One open container.
enum Frame {
    Object {
        class: QualifiedName,
        source: FieldSource,
        index: usize,
        fields: Fields,
        /// End of a structured parcelable: no field starts at or after it, the rest is skipped
        size: Option<usize>,
        /// End given by a `writeValue` length prefix, reached exactly
        length: Option<usize>,
    },
    List {
        element: ReadOp,
        remaining: usize,
        values: Vec<Value>,
        length: Option<usize>,
    },
    Map {
        remaining: usize,
        key: Option<Value>,
        entries: Vec<(Value, Value)>,
        length: Option<usize>,
    },
}

enum Step {
    Read(ReadOp),
    Finished,
}

/// Outcome of starting a read: a finished value or a container to fill.
enum Start {
    Value(Value),
    Frame(Frame),
}

impl Frame {
    fn object(
        class: QualifiedName,
        source: FieldSource,
        size: Option<usize>,
        length: Option<usize>,
    ) -> Self {
        Frame::Object {
            class,
            source,
            index: 0,
            fields: Fields::new(),
            size,
            length,
        }
    }

    /// Attach the `writeValue` length prefix of a list or map.
    fn with_length(mut self, end: Option<usize>) -> Self {
        match &mut self {
            Frame::List { length, .. } | Frame::Map { length, .. } => *length = end,
            Frame::Object { .. } => {}
        }
        self
    }

    /// The next read of this frame, skipping fields whose condition does not hold.
    ///
    /// A structured object finishes once `pos` reaches its declared size, as a reader built
    /// against a newer declaration does with data from an older writer.
    fn next(&mut self, pos: usize) -> Step {
        match self {
            Frame::Object {
                source,
                index,
                fields,
                size,
                ..
            } => loop {
                if size.is_some_and(|end| pos >= end) {
                    return Step::Finished;
                }
                let Some(field) = source.fields().get(*index) else {
                    return Step::Finished;
                };
                if let Some(condition) = &field.condition {
                    let prior = fields.get(&condition.field).and_then(Value::as_integral);
                    if !condition.evaluate(prior) {
                        *index += 1;
                        continue;
                    }
                }
                return Step::Read(field.call.clone());
            },
            Frame::List {
                element, remaining, ..
            } => {
                if *remaining == 0 {
                    Step::Finished
                } else {
                    Step::Read(element.clone())
                }
            }
            Frame::Map { remaining, key, .. } => {
                if *remaining == 0 && key.is_none() {
                    Step::Finished
                } else {
                    Step::Read(ReadOp::Value)
                }
            }
        }
    }

    fn accept(&mut self, value: Value) {
        match self {
            Frame::Object {
                source,
                index,
                fields,
                ..
            } => {
                if let Some(field) = source.fields().get(*index) {
                    fields.push(field.name.clone(), value);
                }
                *index += 1;
            }
            Frame::List {
                remaining, values, ..
            } => {
                values.push(value);
                *remaining = remaining.saturating_sub(1);
            }
            Frame::Map {
                remaining,
                key,
                entries,
                ..
            } => match key.take() {
                None => *key = Some(value),
                Some(key) => {
                    entries.push((key, value));
                    *remaining = remaining.saturating_sub(1);
                }
            },
        }
    }

    fn into_value(self) -> Value {
        match self {
            Frame::Object { class, fields, .. } => Value::Object { class, fields },
            Frame::List { values, .. } => Value::List(values),
            Frame::Map { entries, .. } => Value::Map(entries),
        }
    }

    fn into_fields(self) -> Fields {
        match self {
            Frame::Object { fields, .. } => fields,
            _ => Fields::new(),
        }
    }

    /// Path segment of the value this frame is currently reading.
    fn segment(&self, path: &mut String) {
        match self {
            Frame::Object { source, index, .. } => {
                if let Some(field) = source.fields().get(*index) {
                    if !path.is_empty() {
                        path.push('.');
                    }
                    path.push_str(&field.name);
                }
            }
            Frame::List { values, .. } => path.push_str(&format!("[{}]", values.len())),
            Frame::Map { entries, .. } => path.push_str(&format!("[{}]", entries.len())),
        }
    }
}

/// Reads schema-described values from one buffer.
pub(crate) struct Decoder<'a, 'l> {
    parser: Parser<'a>,
    loader: &'l Loader,
    layout: Layout,
}

impl<'a, 'l> Decoder<'a, 'l> {
    pub(crate) fn new(data: &'a [u8], loader: &'l Loader, layout: Layout) -> Self {
        Decoder {
            parser: Parser::new(data),
            loader,
            layout,
        }
    }

    pub(crate) fn parser(&mut self) -> &mut Parser<'a> {
        &mut self.parser
    }

    pub(crate) fn pos(&self) -> usize {
        self.parser.pos()
    }

    pub(crate) fn remaining(&self) -> usize {
        self.parser.remaining()
    }

    pub(crate) fn halt(&self, reason: HaltReason) -> DecodeHalt {
        DecodeHalt {
            offset: self.parser.pos(),
            path: String::new(),
            reason,
        }
    }

    /// Decode a field list from the current position.
    ///
    /// Returns the fields decoded completely, and the halt marker if decoding stopped early.
    ///
    /// `size` is the end of the list's own structured parcelable, if it has one.
    pub(crate) fn read_fields(
        &mut self,
        owner: QualifiedName,
        source: FieldSource,
        size: Option<usize>,
    ) -> (Fields, Option<DecodeHalt>) {
        let mut stack = vec![Frame::object(owner, source, size, None)];

        loop {
            let offset = self.parser.pos();
            let step = match stack.last_mut() {
                Some(top) => top.next(offset),
                None => return (Fields::new(), None),
            };

            match step {
                Step::Read(op) => match self.start(&op) {
                    Ok(Start::Value(value)) => {
                        if let Some(top) = stack.last_mut() {
                            top.accept(value);
                        }
                    }
                    Ok(Start::Frame(frame)) => stack.push(frame),
                    Err(reason) => return unwind(stack, offset, reason),
                },
                Step::Finished => {
                    let Some(frame) = stack.pop() else {
                        return (Fields::new(), None);
                    };
                    if stack.is_empty() {
                        return (frame.into_fields(), None);
                    }
                    if let Err(reason) = self.close(&frame) {
                        stack.push(frame);
                        return unwind(stack, offset, reason);
                    }
                    if let Some(parent) = stack.last_mut() {
                        parent.accept(frame.into_value());
                    }
                }
            }
        }
    }

    /// Decode a standalone parcelable, honouring its size prefix when structured.
    pub(crate) fn read_class(&mut self, class: Arc<ClassDef>) -> (Fields, Option<DecodeHalt>) {
        let name = class.name.clone();
        if class.as_parcelable().is_some_and(|def| def.opaque) {
            return (Fields::new(), Some(self.halt(opaque(&name))));
        }
        let structured = class.as_parcelable().is_some_and(|def| def.structured);

        let end = if structured {
            let start = self.parser.pos();
            match self.structured_end(start) {
                Ok(end) => Some(end),
                Err(reason) => return (Fields::new(), Some(self.halt(reason))),
            }
        } else {
            None
        };

        let (fields, halt) = self.read_fields(name, FieldSource::Class(class), end);
        if halt.is_some() {
            return (fields, halt);
        }
        match end {
            Some(end) if self.parser.pos() > end => {
                let reason = overrun(self.parser.pos(), end);
                (fields, Some(self.halt(reason)))
            }
            Some(end) => match self.parser.seek(end) {
                Ok(()) => (fields, None),
                Err(error) => (fields, Some(self.halt(error.into()))),
            },
            None => (fields, None),
        }
    }

    /// Skip to the end of a size-prefixed object and check length-prefixed values.
    fn close(&mut self, frame: &Frame) -> Result<(), HaltReason> {
        let length = match frame {
            Frame::Object { size, length, .. } => {
                if let Some(end) = *size {
                    let pos = self.parser.pos();
                    if pos > end {
                        return Err(overrun(pos, end));
                    }
                    self.parser.seek(end)?;
                }
                *length
            }
            Frame::List { length, .. } | Frame::Map { length, .. } => *length,
        };
        match length {
            Some(end) => self.check_length(end),
            None => Ok(()),
        }
    }

    /// A `writeValue` payload must end exactly where its length prefix says.
    fn check_length(&self, end: usize) -> Result<(), HaltReason> {
        let pos = self.parser.pos();
        if pos == end {
            Ok(())
        } else {
            Err(HaltReason::Schema {
                message: format!("value ends at {pos}, its length prefix says {end}"),
            })
        }
    }

    /// Apply a length prefix to a started list or map.
    fn bounded(&mut self, start: Start, end: Option<usize>) -> Result<Start, HaltReason> {
        match start {
            Start::Frame(frame) => Ok(Start::Frame(frame.with_length(end))),
            Start::Value(value) => {
                if let Some(end) = end {
                    self.check_length(end)?;
                }
                Ok(Start::Value(value))
            }
        }
    }

    fn start(&mut self, op: &ReadOp) -> Result<Start, HaltReason> {
        match op {
            ReadOp::Primitive(kind) => Ok(Start::Value(self.primitive(*kind)?)),
            ReadOp::StrongBinder => Ok(Start::Value(self.binder()?)),
            ReadOp::Parcelable(name) => {
                // readTypedObject: anything but 1 is a null reference
                if self.parser.read_i32()? != 1 {
                    return Ok(Start::Value(Value::Null));
                }
                self.object(name, None)
            }
            ReadOp::Repeated(element) => self.repeated(element),
            ReadOp::Bundle => Ok(Start::Value(self.bundle()?)),
            ReadOp::Map => self.map(),
            ReadOp::Value => self.value(),
            ReadOp::Unsupported(name) => Err(HaltReason::Unsupported { call: name.clone() }),
        }
    }

    fn primitive(&mut self, kind: PrimitiveKind) -> Result<Value, HaltReason> {
        let parser = &mut self.parser;
        Ok(match kind {
            PrimitiveKind::Int => Value::Int(parser.read_i32()?),
            PrimitiveKind::Long => Value::Long(parser.read_i64()?),
            PrimitiveKind::Boolean => Value::Bool(parser.read_bool()?),
            PrimitiveKind::Byte => Value::Byte(parser.read_byte()?),
            PrimitiveKind::Char => Value::Char(parser.read_char()?),
            PrimitiveKind::Short => Value::Short(parser.read_short()?),
            PrimitiveKind::Float => Value::Float(parser.read_f32()?),
            PrimitiveKind::Double => Value::Double(parser.read_f64()?),
            PrimitiveKind::String => parser.read_string16()?.map_or(Value::Null, Value::String),
            PrimitiveKind::String8 => parser.read_string8()?.map_or(Value::Null, Value::String),
        })
    }

    fn binder(&mut self) -> Result<Value, HaltReason> {
        let parser = &mut self.parser;
        let object = BinderObject {
            kind: parser.read_u32()?,
            flags: parser.read_u32()?,
            handle: parser.read_u64()?,
            cookie: parser.read_u64()?,
            stability: if self.layout.binder_stability {
                Some(parser.read_u32()?)
            } else {
                None
            },
        };
        Ok(Value::Binder(object))
    }

    fn object(&mut self, name: &QualifiedName, length: Option<usize>) -> Result<Start, HaltReason> {
        let class = self
            .loader
            .get_or_compile(name)
            .map_err(|error| HaltReason::UnknownClass {
                name: name.to_string(),
                message: error.to_string(),
            })?;

        let Some(def) = class.as_parcelable() else {
            return Err(HaltReason::Schema {
                message: format!("{name} is an interface, not a parcelable"),
            });
        };

        if def.opaque {
            return Err(opaque(name));
        }

        let size = if def.structured {
            let start = self.parser.pos();
            Some(self.structured_end(start)?)
        } else {
            None
        };

        Ok(Start::Frame(Frame::object(
            name.clone(),
            FieldSource::Class(class),
            size,
            length,
        )))
    }

    /// Read the `i32` size of a structured parcelable, which counts itself.
    fn structured_end(&mut self, start: usize) -> Result<usize, HaltReason> {
        let size = self.parser.read_i32()?;
        let end = usize::try_from(size)
            .ok()
            .filter(|size| *size >= 4)
            .and_then(|size| start.checked_add(size))
            .filter(|end| *end <= self.parser.len());

        end.ok_or_else(|| HaltReason::Truncated {
            message: format!(
                "parcelable size {size} at {start} does not fit the {} byte buffer",
                self.parser.len()
            ),
        })
    }

    fn repeated(&mut self, element: &ReadOp) -> Result<Start, HaltReason> {
        if *element == ReadOp::Primitive(PrimitiveKind::Byte) {
            let bytes = self.parser.read_byte_array()?;
            return Ok(Start::Value(bytes.map_or(Value::Null, Value::Bytes)));
        }

        Ok(match self.parser.read_count(element.min_wire_size())? {
            None => Start::Value(Value::Null),
            Some(0) => Start::Value(Value::List(Vec::new())),
            Some(count) => Start::Frame(Frame::List {
                element: element.clone(),
                remaining: count,
                values: Vec::with_capacity(count),
                length: None,
            }),
        })
    }

    fn bundle(&mut self) -> Result<Value, HaltReason> {
        let length = self.parser.read_i32()?;
        let Ok(length) = usize::try_from(length) else {
            return Ok(Value::Null);
        };
        if length == 0 {
            return Ok(Value::Bundle {
                magic: None,
                raw: Vec::new(),
            });
        }

        let magic = self.parser.read_u32()?;
        let raw = self.parser.read_bytes(length)?.to_vec();
        self.parser.align(PARCEL_ALIGNMENT)?;
        Ok(Value::Bundle {
            magic: Some(magic),
            raw,
        })
    }

    fn map(&mut self) -> Result<Start, HaltReason> {
        // smallest entry: two null values
        Ok(match self.parser.read_count(8)? {
            None => Start::Value(Value::Null),
            Some(0) => Start::Value(Value::Map(Vec::new())),
            Some(count) => Start::Frame(Frame::Map {
                remaining: count,
                key: None,
                entries: Vec::with_capacity(count),
                length: None,
            }),
        })
    }

    /// The byte length Android 13 writes after the tag of some `writeValue` types.
    fn value_length(&mut self) -> Result<Option<usize>, HaltReason> {
        if !self.layout.value_length_prefix {
            return Ok(None);
        }
        let length = self.parser.read_i32()?;
        let start = self.parser.pos();
        usize::try_from(length)
            .ok()
            .filter(|length| *length <= self.parser.remaining())
            .map(|length| Some(start + length))
            .ok_or_else(|| HaltReason::Truncated {
                message: format!("value length {length} at {start} exceeds the buffer"),
            })
    }

    fn value(&mut self) -> Result<Start, HaltReason> {
        let value = match self.parser.read_i32()? {
            tag::NULL => Value::Null,
            tag::STRING => self.primitive(PrimitiveKind::String)?,
            tag::INTEGER => Value::Int(self.parser.read_i32()?),
            tag::MAP => {
                let end = self.value_length()?;
                let start = self.map()?;
                return self.bounded(start, end);
            }
            tag::BUNDLE => self.bundle()?,
            tag::PARCELABLE => {
                let end = self.value_length()?;
                let Some(name) = self.parser.read_string16()? else {
                    return self.bounded(Start::Value(Value::Null), end);
                };
                return self.object(&QualifiedName::new(name), end);
            }
            tag::SHORT => Value::Short(self.parser.read_short()?),
            tag::LONG => Value::Long(self.parser.read_i64()?),
            tag::FLOAT => Value::Float(self.parser.read_f32()?),
            tag::DOUBLE => Value::Double(self.parser.read_f64()?),
            tag::BOOLEAN => Value::Bool(self.parser.read_bool()?),
            tag::LIST => {
                let end = self.value_length()?;
                let start = self.repeated(&ReadOp::Value)?;
                return self.bounded(start, end);
            }
            tag::BYTEARRAY => return self.repeated(&ReadOp::Primitive(PrimitiveKind::Byte)),
            tag::STRINGARRAY => {
                return self.repeated(&ReadOp::Primitive(PrimitiveKind::String))
            }
            tag::IBINDER => self.binder()?,
            tag::INTARRAY => return self.repeated(&ReadOp::Primitive(PrimitiveKind::Int)),
            tag::LONGARRAY => return self.repeated(&ReadOp::Primitive(PrimitiveKind::Long)),
            tag::BYTE => Value::Byte(self.parser.read_byte()?),
            tag::BOOLEANARRAY => {
                return self.repeated(&ReadOp::Primitive(PrimitiveKind::Boolean))
            }
            other => {
                return Err(HaltReason::Unsupported {
                    call: format!("readValue:{other}"),
                })
            }
        };
        Ok(Start::Value(value))
    }
}

fn opaque(name: &QualifiedName) -> HaltReason {
    HaltReason::Unsupported {
        call: format!("{}, no declaration gives its layout", ReadOp::Parcelable(name.clone())),
    }
}

fn overrun(pos: usize, end: usize) -> HaltReason {
    HaltReason::Schema {
        message: format!("object read up to {pos}, past its declared end at {end}"),
    }
}

/// Drop every open container and keep the outermost fields.
fn unwind(stack: Vec<Frame>, offset: usize, reason: HaltReason) -> (Fields, Option<DecodeHalt>) {
    let mut path = String::new();
    for frame in &stack {
        frame.segment(&mut path);
    }
    let fields = stack
        .into_iter()
        .next()
        .map(Frame::into_fields)
        .unwrap_or_default();

    (
        fields,
        Some(DecodeHalt {
            offset,
            path,
            reason,
        }),
    )
}
