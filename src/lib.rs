// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]
#![deny(unsafe_code)]

//! # parcelscope
//!
//! A toolkit for reverse engineering Android Binder traffic. `parcelscope` reads AIDL (and other)
//! declarations from source roots, compiles them into Parcel schemas, and uses those schemas to
//! decode raw transaction buffers into structured messages.
//!
//! ## Features
//!
//! - **Lazy, cycle-safe compilation** - Classes are compiled on first reference; recursive and
//!   mutually recursive parcelables resolve without loops
//! - **Persisted schemas** - Every compiled class round-trips through JSON, so schemas can be
//!   shipped without the sources they came from
//! - **Version-aware decoding** - Envelope and binder layouts follow the Android release the
//!   buffer was captured on
//! - **Partial results** - Truncated or unsupported data yields everything decoded so far plus a
//!   marker of where and why decoding stopped
//! - **Thread safe** - One [`Loader`] serves concurrent capture callbacks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use parcelscope::prelude::*;
//!
//! let loader = Loader::new().with_root("aidl")?;
//! let class = loader.get_or_compile("android.os.IServiceManager")?;
//! println!("{} has {} methods", class.name, class.as_binder().map_or(0, |b| b.methods.len()));
//!
//! let data = std::fs::read("checkService.bin")?;
//! let message = ParcelCodec::new(&loader, AndroidVersion(13)).decode_request(&data, 1, None);
//! println!("{}", serde_json::to_string_pretty(&message)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - [`source`] - Declaration units and the [`source::SourceParser`] trait, with the built-in AIDL reader
//! - [`typesystem`] - Maps type references to read operations
//! - [`compiler`] - Turns a declaration unit into a [`schema::ClassDef`]
//! - [`loader`] - Locates, parses, compiles and caches classes
//! - [`schema`] - Compiled schemas and their JSON form
//! - [`codec`] - Decodes transaction buffers
//! - [`capture`] - Hooks for live capture backends
//!
//! ## Error Handling
//!
//! Operations that cannot produce anything return [`Result<T, Error>`](Result). Compilation and
//! decoding are best-effort: unsupported types are recorded in the schema, and decoding problems
//! are reported through [`codec::DecodeHalt`] next to the partial result.
//!
//! ## Development and Testing
//!
//! ```bash
//! cargo test
//! cargo bench
//! cargo +nightly fuzz run decode --release
//! ```
#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust,no_run
/// use parcelscope::prelude::*;
///
/// let loader = Loader::new().with_root("aidl")?;
/// let class: std::sync::Arc<ClassDef> = loader.get_or_compile("android.os.IServiceManager")?;
/// # Ok::<(), parcelscope::Error>(())
/// ```
pub mod prelude;

pub mod capture;
pub mod codec;
pub mod compiler;
pub mod file;
pub mod loader;
pub mod schema;
pub mod source;
pub mod typesystem;

/// `parcelscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `parcelscope` Error type
///
/// The variants describe failures that prevent an operation from producing a result.
pub use error::Error;

/// Locates, compiles and caches schemas.
///
/// See [`loader::Loader`] for configuration and the resolution order.
pub use loader::Loader;

/// Decodes transaction buffers.
pub use codec::{AndroidVersion, Message, ParcelCodec};

/// Low-level Parcel reader.
///
/// # Example
///
/// ```rust
/// use parcelscope::Parser;
///
/// let data = [0x2A, 0x00, 0x00, 0x00];
/// let mut parser = Parser::new(&data);
/// assert_eq!(parser.read_i32()?, 42);
/// # Ok::<(), parcelscope::Error>(())
/// ```
pub use file::Parser;
