//! Low-level byte order and safe reading utilities for Parcel buffers.
//!
//! Android's Parcel stores every primitive in host byte order, which is little-endian on every
//! device the Binder driver ships on. This module provides bounds-checked reads of primitive
//! values from byte slices, used by [`crate::file::parser::Parser`] and by code that needs to
//! peek at a buffer without a cursor.
//!
//! # Key Components
//!
//! - [`crate::file::io::ParcelIO`] - Trait implemented by every primitive a Parcel can hold
//! - [`crate::file::io::read_le`] - Read a value from the start of a buffer
//! - [`crate::file::io::read_le_at`] - Read a value at an offset and advance the offset
//!
//! # Examples
//!
//! ```rust
//! use parcelscope::file::io::{read_le, read_le_at};
//!
//! let data = [0x01, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF];
//! let value: u32 = read_le(&data)?;
//! assert_eq!(value, 1);
//!
//! let mut offset = 4;
//! let value: i32 = read_le_at(&data, &mut offset)?;
//! assert_eq!(value, -1);
//! assert_eq!(offset, 8);
//! # Ok::<(), parcelscope::Error>(())
//! ```

use crate::Result;

/// Trait for primitive types that can be decoded from a Parcel buffer.
///
/// Implemented for all integer widths Parcel uses plus `f32` and `f64`.
pub trait ParcelIO: Sized {
    /// Byte array type for this numeric type.
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
}

macro_rules! impl_parcel_io {
    ($($ty:ty => $len:literal),* $(,)?) => {
        $(
            impl ParcelIO for $ty {
                type Bytes = [u8; $len];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_parcel_io!(
    u8 => 1,
    i8 => 1,
    u16 => 2,
    i16 => 2,
    u32 => 4,
    i32 => 4,
    u64 => 8,
    i64 => 8,
    f32 => 4,
    f64 => 8,
);

/// Safely reads a value of type `T` in little-endian byte order from the start of a buffer.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the buffer is shorter than `T`.
pub fn read_le<T: ParcelIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Safely reads a value of type `T` in little-endian byte order at `offset`, advancing the
/// offset by the size of `T` on success.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if reading would exceed the buffer length. The offset
/// is left unchanged in that case.
pub fn read_le_at<T: ParcelIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(out_of_bounds_error!());
    };
    if end > data.len() {
        return Err(out_of_bounds_error!());
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(out_of_bounds_error!());
    };

    *offset = end;

    Ok(T::from_le_bytes(read))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    const TEST_BUFFER: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

    #[test]
    fn read_le_u32() {
        let result = read_le::<u32>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0403_0201);
    }

    #[test]
    fn read_le_i64() {
        let result = read_le::<i64>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0807_0605_0403_0201);
    }

    #[test]
    fn read_le_f32() {
        let data = 1.5_f32.to_le_bytes();
        assert_eq!(read_le::<f32>(&data).unwrap(), 1.5);
    }

    #[test]
    fn read_le_at_advances() {
        let mut offset = 2_usize;
        let result = read_le_at::<u16>(&TEST_BUFFER, &mut offset).unwrap();
        assert_eq!(result, 0x0403);
        assert_eq!(offset, 4);
    }

    #[test]
    fn errors() {
        let buffer = [0xFF, 0xFF, 0xFF];
        assert!(matches!(
            read_le::<u32>(&buffer),
            Err(Error::OutOfBounds { .. })
        ));

        let mut offset = 2_usize;
        assert!(read_le_at::<u16>(&buffer, &mut offset).is_err());
        assert_eq!(offset, 2);

        let mut offset = usize::MAX;
        assert!(read_le_at::<u8>(&buffer, &mut offset).is_err());
    }
}
