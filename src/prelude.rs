//! # parcelscope Prelude
//!
//! Convenient re-exports of the types needed for compiling schemas and decoding transactions.
//! Import this module to get quick access to the essentials.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all parcelscope operations
pub use crate::Error;

/// The result type used throughout parcelscope
pub use crate::Result;

// ================================================================================================
// Loading and Compilation
// ================================================================================================

/// Schema loader and its reports
pub use crate::loader::{CompileReport, Discovery, Loader, UnitInfo};

/// Direction assignment for method parameters
pub use crate::compiler::{DirectionPolicy, ModifierPolicy};

/// Source readers
pub use crate::source::{AidlParser, DeclUnit, SourceParser, UnitKind};

// ================================================================================================
// Schemas
// ================================================================================================

/// Compiled schema types
pub use crate::schema::{
    BinderDef, ClassDef, ClassKind, ConditionDef, Direction, FieldDef, MethodDef, ParameterDef,
    ParcelableDef, PrimitiveKind, QualifiedName, ReadOp,
};

// ================================================================================================
// Decoding
// ================================================================================================

/// Transaction decoding
pub use crate::codec::{
    AndroidVersion, DecodeHalt, DecodedObject, Fields, HaltReason, IncomingMessage, Message,
    MessageKind, OutgoingMessage, ParcelCodec, Value,
};

/// Live capture hooks
pub use crate::capture::{DecodingListener, TransactionListener};

/// Low-level Parcel reader
pub use crate::Parser;
