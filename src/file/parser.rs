//! Cursor-based reader for Android Parcel buffers.
//!
//! This module provides the [`crate::file::parser::Parser`] type, a bounds-checked cursor over a
//! captured Parcel. A Parcel is a flat little-endian byte stream in which every value starts on a
//! 4-byte boundary. Narrow primitives (`boolean`, `byte`, `char`, `short`) are widened to a full
//! 32-bit slot, strings carry a length prefix and a NUL terminator, and the whole value is padded
//! up to the next 4-byte boundary.
//!
//! # Architecture
//!
//! The parser is a position inside a borrowed byte slice. Every read validates the remaining
//! length first, so a truncated or hostile buffer surfaces as
//! [`crate::Error::OutOfBounds`] or [`crate::Error::Malformed`] rather than a panic.
//!
//! # Key Components
//!
//! ## Navigation Methods
//! - [`crate::file::parser::Parser::seek`] - Move to a specific position
//! - [`crate::file::parser::Parser::advance_by`] - Move forward by a number of bytes
//! - [`crate::file::parser::Parser::align`] - Align to a byte boundary
//! - [`crate::file::parser::Parser::transactional`] - Roll the cursor back if a closure fails
//!
//! ## Parcel Primitive Methods
//! - [`crate::file::parser::Parser::read_i32`], [`crate::file::parser::Parser::read_i64`] and friends
//! - [`crate::file::parser::Parser::read_string16`] - Length-prefixed UTF-16 string
//! - [`crate::file::parser::Parser::read_string8`] - Length-prefixed UTF-8 string
//! - [`crate::file::parser::Parser::read_byte_array`] - Packed, padded byte array
//!
//! # Usage Examples
//!
//! ```rust
//! use parcelscope::Parser;
//!
//! // writeInt(7); writeString16("hi")
//! let data = [
//!     0x07, 0x00, 0x00, 0x00,
//!     0x02, 0x00, 0x00, 0x00, b'h', 0x00, b'i', 0x00, 0x00, 0x00, 0x00, 0x00,
//! ];
//! let mut parser = Parser::new(&data);
//!
//! assert_eq!(parser.read_i32()?, 7);
//! assert_eq!(parser.read_string16()?.as_deref(), Some("hi"));
//! assert!(!parser.has_more_data());
//! # Ok::<(), parcelscope::Error>(())
//! ```

use widestring::U16Str;

use crate::{
    file::io::{read_le_at, ParcelIO},
    Result,
};

/// Every Parcel value starts on this boundary.
pub const PARCEL_ALIGNMENT: usize = 4;

/// A cursor over a Parcel byte buffer.
///
/// The parser never owns the data; it is cheap to create one per decode. Positions are absolute
/// offsets from the start of the slice.
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`crate::file::parser::Parser`] from a byte slice.
    ///
    /// # Arguments
    /// * `data` - The byte slice to read from
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if the cursor has not reached the end of the buffer.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Number of bytes between the cursor and the end of the buffer.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Move the current position to the specified index.
    ///
    /// Unlike a plain slice index, seeking to exactly `len()` is allowed: a size-prefixed
    /// parcelable that ends the buffer leaves the cursor there.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if position is beyond the data length.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        self.position = pos;
        Ok(())
    }

    /// Move the position forward by `step` bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if advancing would exceed the data length.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        if step > self.remaining() {
            return Err(out_of_bounds_error!());
        }

        self.position += step;
        Ok(())
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Get access to the underlying data buffer.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Peek at a value of type `T` without advancing the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading `T` would exceed the data length.
    pub fn peek_le<T: ParcelIO>(&self) -> Result<T> {
        let mut offset = self.position;
        read_le_at::<T>(self.data, &mut offset)
    }

    /// Run `f` and restore the cursor if it returns an error.
    ///
    /// # Errors
    /// Returns whatever error `f` produced.
    pub fn transactional<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let saved_position = self.position;
        let result = f(self);
        if result.is_err() {
            self.position = saved_position;
        }
        result
    }

    /// Align the position to a specific boundary.
    ///
    /// # Arguments
    /// * `alignment` - The boundary to align to (must be a power of 2)
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if aligning would exceed the data length.
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        let padding = (alignment - (self.position % alignment)) % alignment;
        self.advance_by(padding)
    }

    /// Read a type `T` from the current position in little-endian format and advance the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length.
    pub fn read_le<T: ParcelIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Borrow the next `len` bytes and advance past them.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `len` bytes remain.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(out_of_bounds_error!());
        }

        let slice = &self.data[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    /// `Parcel::readInt32`
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] on a truncated buffer.
    pub fn read_i32(&mut self) -> Result<i32> {
        self.read_le::<i32>()
    }

    /// `Parcel::readUint32`
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] on a truncated buffer.
    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_le::<u32>()
    }

    /// `Parcel::readInt64`
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] on a truncated buffer.
    pub fn read_i64(&mut self) -> Result<i64> {
        self.read_le::<i64>()
    }

    /// `Parcel::readUint64`
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] on a truncated buffer.
    pub fn read_u64(&mut self) -> Result<u64> {
        self.read_le::<u64>()
    }

    /// `Parcel::readFloat`
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] on a truncated buffer.
    pub fn read_f32(&mut self) -> Result<f32> {
        self.read_le::<f32>()
    }

    /// `Parcel::readDouble`
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] on a truncated buffer.
    pub fn read_f64(&mut self) -> Result<f64> {
        self.read_le::<f64>()
    }

    /// `Parcel::readBool`, stored as a full 32-bit slot.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] on a truncated buffer.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_i32()? != 0)
    }

    /// `Parcel::readByte`, stored as a full 32-bit slot.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] on a truncated buffer.
    pub fn read_byte(&mut self) -> Result<i8> {
        #[allow(clippy::cast_possible_truncation)]
        Ok(self.read_i32()? as i8)
    }

    /// `Parcel::readChar`, a UTF-16 code unit stored as a full 32-bit slot.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] on a truncated buffer.
    pub fn read_char(&mut self) -> Result<u16> {
        #[allow(clippy::cast_possible_truncation)]
        Ok(self.read_u32()? as u16)
    }

    /// A Java `short` marshalled through `writeInt`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] on a truncated buffer.
    pub fn read_short(&mut self) -> Result<i16> {
        #[allow(clippy::cast_possible_truncation)]
        Ok(self.read_i32()? as i16)
    }

    /// Read an `i32` element count where `-1` encodes a null container.
    ///
    /// `min_element_size` is the smallest number of bytes one element can occupy. A count that
    /// could not possibly fit into the remaining buffer is rejected before anything is allocated.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for negative counts other than `-1` and for counts
    /// that exceed the remaining buffer.
    pub fn read_count(&mut self, min_element_size: usize) -> Result<Option<usize>> {
        let start = self.position;
        let count = self.read_i32()?;
        if count == -1 {
            return Ok(None);
        }

        let Ok(count) = usize::try_from(count) else {
            return Err(malformed_error!("Negative element count {} at {}", count, start));
        };

        if count.saturating_mul(min_element_size) > self.remaining() {
            return Err(malformed_error!(
                "Element count {} at {} exceeds the remaining {} bytes",
                count,
                start,
                self.remaining()
            ));
        }

        Ok(Some(count))
    }

    /// `Parcel::readString16`
    ///
    /// Layout: `i32` length in UTF-16 code units (`-1` = null), the code units, a NUL unit, then
    /// padding to 4 bytes. Unpaired surrogates are replaced rather than rejected, since captured
    /// data is not guaranteed to be well-formed.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] or [`crate::Error::Malformed`] on truncated or
    /// inconsistent data.
    pub fn read_string16(&mut self) -> Result<Option<String>> {
        let Some(units) = self.read_count(2)? else {
            return Ok(None);
        };

        let bytes = self.read_bytes((units + 1) * 2)?;
        let mut utf16 = Vec::with_capacity(units);
        let mut offset = 0_usize;
        for _ in 0..units {
            utf16.push(read_le_at::<u16>(bytes, &mut offset)?);
        }
        self.align(PARCEL_ALIGNMENT)?;

        Ok(Some(U16Str::from_slice(&utf16).to_string_lossy()))
    }

    /// `Parcel::readString8`
    ///
    /// Layout: `i32` byte length (`-1` = null), the UTF-8 bytes, a NUL byte, then padding.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] or [`crate::Error::Malformed`] on truncated or
    /// inconsistent data.
    pub fn read_string8(&mut self) -> Result<Option<String>> {
        let Some(len) = self.read_count(1)? else {
            return Ok(None);
        };

        let bytes = self.read_bytes(len + 1)?;
        self.align(PARCEL_ALIGNMENT)?;

        Ok(Some(String::from_utf8_lossy(&bytes[..len]).into_owned()))
    }

    /// `Parcel::readByteArray`, packed bytes padded to 4.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] or [`crate::Error::Malformed`] on truncated or
    /// inconsistent data.
    pub fn read_byte_array(&mut self) -> Result<Option<Vec<u8>>> {
        let Some(len) = self.read_count(1)? else {
            return Ok(None);
        };

        let bytes = self.read_bytes(len)?.to_vec();
        self.align(PARCEL_ALIGNMENT)?;
        Ok(Some(bytes))
    }
}
