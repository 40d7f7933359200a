//! Hooks for live transaction capture.
//!
//! A capture backend (an instrumentation agent, a binder tracer, a replay tool) reports every
//! transaction it observes through [`TransactionListener`]. [`DecodingListener`] is the
//! standard implementation: it decodes each buffer on the calling thread and hands the
//! resulting [`Message`] to a sink.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use parcelscope::{capture::{DecodingListener, TransactionListener}, codec::AndroidVersion, Loader};
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//! let listener = DecodingListener::new(Arc::new(Loader::new()), AndroidVersion(11), move |message| {
//!     sink.lock().unwrap().push(message);
//! });
//!
//! listener.on_transaction(1, &[0, 0, 0, 0]);
//! assert_eq!(seen.lock().unwrap().len(), 1);
//! ```

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use log::debug;

use crate::{
    codec::{AndroidVersion, Message, ParcelCodec},
    Loader,
};

/// Receives transactions from a capture backend.
///
/// Callbacks may arrive concurrently from several threads.
pub trait TransactionListener: Send + Sync {
    /// A call was made with transaction `code` and request buffer `data`.
    fn on_transaction(&self, code: u32, data: &[u8]);

    /// The call with transaction `code` on interface `descriptor` returned `data`.
    fn on_reply(&self, code: u32, descriptor: &str, data: &[u8]);
}

/// Decodes every captured buffer and forwards the message to a sink.
pub struct DecodingListener<F> {
    loader: Arc<Loader>,
    version: AtomicU32,
    sink: F,
}

impl<F> DecodingListener<F>
where
    F: Fn(Message) + Send + Sync,
{
    /// Create a listener decoding for `version`.
    pub fn new(loader: Arc<Loader>, version: AndroidVersion, sink: F) -> Self {
        DecodingListener {
            loader,
            version: AtomicU32::new(version.0),
            sink,
        }
    }

    /// Switch the Android version used for subsequent buffers.
    pub fn configure(&self, version: AndroidVersion) {
        debug!("capture decoding switched to {version}");
        self.version.store(version.0, Ordering::Relaxed);
    }

    /// The Android version currently used.
    pub fn version(&self) -> AndroidVersion {
        AndroidVersion(self.version.load(Ordering::Relaxed))
    }

    /// The loader schemas are resolved with.
    pub fn loader(&self) -> &Arc<Loader> {
        &self.loader
    }

    fn codec(&self) -> ParcelCodec<'_> {
        ParcelCodec::new(&self.loader, self.version())
    }
}

impl<F> TransactionListener for DecodingListener<F>
where
    F: Fn(Message) + Send + Sync,
{
    fn on_transaction(&self, code: u32, data: &[u8]) {
        let message = self.codec().decode_request(data, code, None);
        (self.sink)(Message::Incoming(message));
    }

    fn on_reply(&self, code: u32, descriptor: &str, data: &[u8]) {
        let message = self.codec().decode_reply(data, code, descriptor);
        (self.sink)(Message::Outgoing(message));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{
        codec::HaltReason,
        schema::{
            BinderDef, ClassDef, ClassKind, Direction, MethodDef, ParameterDef, PrimitiveKind,
            ReadOp,
        },
        test::ParcelBuilder,
    };

    fn loader() -> Arc<Loader> {
        let loader = Loader::new();
        loader
            .insert(ClassDef {
                kind: ClassKind::Binder(BinderDef {
                    methods: vec![MethodDef {
                        name: "ping".into(),
                        tc: 1,
                        oneway: false,
                        retval: None,
                        arguments: vec![ParameterDef {
                            name: "value".into(),
                            ty: Some("int".into()),
                            call: ReadOp::Primitive(PrimitiveKind::Int),
                            direction: Direction::In,
                        }],
                    }],
                }),
                ..ClassDef::empty("t.IPing".into())
            })
            .unwrap();
        Arc::new(loader)
    }

    #[test]
    fn test_forwards_requests_and_replies() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener = DecodingListener::new(loader(), AndroidVersion(9), move |message| {
            sink.lock().unwrap().push(message);
        });

        let request = ParcelBuilder::new()
            .int(0)
            .string16(Some("t.IPing"))
            .int(17)
            .build();
        listener.on_transaction(1, &request);
        listener.on_reply(1, "t.IPing", &[0, 0, 0, 0]);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        let Message::Incoming(first) = &seen[0] else {
            panic!("expected a request");
        };
        assert!(first.halt.is_none());
        assert_eq!(first.arguments.len(), 1);
        let Message::Outgoing(second) = &seen[1] else {
            panic!("expected a reply");
        };
        assert!(second.halt.is_none());
        assert!(second.values.is_empty());
    }

    #[test]
    fn test_configure_switches_layout() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener = DecodingListener::new(loader(), AndroidVersion(9), move |message| {
            sink.lock().unwrap().push(message);
        });

        let request = ParcelBuilder::new()
            .int(0)
            .int(-1)
            .uint(0x5359_5354)
            .string16(Some("t.IPing"))
            .int(17)
            .build();

        listener.on_transaction(1, &request);
        listener.configure(AndroidVersion(12));
        assert_eq!(listener.version(), AndroidVersion(12));
        listener.on_transaction(1, &request);

        let seen = seen.lock().unwrap();
        assert!(matches!(
            seen[0].halt().map(|halt| &halt.reason),
            Some(HaltReason::Schema { .. })
        ));
        assert!(seen[1].halt().is_none());
    }
}
