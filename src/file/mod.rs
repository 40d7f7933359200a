//! Bounds-checked access to raw Parcel data.
//!
//! Captured transaction buffers are handed to the crate as plain byte slices. This module holds
//! the primitive readers the [`crate::codec`] module is built on:
//!
//! - [`io`] - Endian-aware primitive reads from byte slices
//! - [`parser`] - The [`Parser`] cursor with Parcel string, array and alignment rules

pub mod io;
pub mod parser;

pub use parser::Parser;
