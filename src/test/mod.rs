//! Shared helpers for unit tests.
//!
//! - [`ParcelBuilder`] writes Parcel buffers the way `android::Parcel` lays them out
//! - [`source_root`] creates a temporary source tree of declaration files

use std::fs;

use tempfile::TempDir;

/// Writes little-endian Parcel data with 4-byte padding.
#[derive(Debug, Default, Clone)]
pub struct ParcelBuilder {
    data: Vec<u8>,
}

impl ParcelBuilder {
    pub fn new() -> Self {
        ParcelBuilder::default()
    }

    pub fn int(mut self, value: i32) -> Self {
        self.data.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn uint(mut self, value: u32) -> Self {
        self.data.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn repeat_int(self, value: i32, count: usize) -> Self {
        (0..count).fold(self, |builder, _| builder.int(value))
    }

    pub fn long(mut self, value: i64) -> Self {
        self.data.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn float(mut self, value: f32) -> Self {
        self.data.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn double(mut self, value: f64) -> Self {
        self.data.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn bool(self, value: bool) -> Self {
        self.int(i32::from(value))
    }

    /// `writeString16`: length in units, the units, a NUL unit, padding.
    pub fn string16(self, value: Option<&str>) -> Self {
        let Some(value) = value else {
            return self.int(-1);
        };
        let units: Vec<u16> = value.encode_utf16().collect();
        let mut builder = self.int(units.len() as i32);
        for unit in units.iter().chain(std::iter::once(&0)) {
            builder.data.extend_from_slice(&unit.to_le_bytes());
        }
        builder.pad()
    }

    /// `writeString8`: length in bytes, the bytes, a NUL byte, padding.
    pub fn string8(self, value: Option<&str>) -> Self {
        let Some(value) = value else {
            return self.int(-1);
        };
        let mut builder = self.int(value.len() as i32);
        builder.data.extend_from_slice(value.as_bytes());
        builder.data.push(0);
        builder.pad()
    }

    /// `writeByteArray`: length, packed bytes, padding.
    pub fn byte_array(self, value: &[u8]) -> Self {
        let mut builder = self.int(value.len() as i32);
        builder.data.extend_from_slice(value);
        builder.pad()
    }

    /// A `flat_binder_object`, with the stability word when given.
    pub fn binder(
        self,
        kind: u32,
        flags: u32,
        handle: u64,
        cookie: u64,
        stability: Option<u32>,
    ) -> Self {
        let mut builder = self.uint(kind).uint(flags);
        builder.data.extend_from_slice(&handle.to_le_bytes());
        builder.data.extend_from_slice(&cookie.to_le_bytes());
        match stability {
            Some(stability) => builder.uint(stability),
            None => builder,
        }
    }

    /// Bytes appended as-is, without padding.
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.data.extend_from_slice(bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }

    fn pad(mut self) -> Self {
        while self.data.len() % 4 != 0 {
            self.data.push(0);
        }
        self
    }
}

/// A temporary directory holding `files`, given as `(relative path, contents)`.
pub fn source_root(files: &[(&str, &str)]) -> TempDir {
    let root = TempDir::new().unwrap();
    for (relative, contents) in files {
        let path = root.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
    }
    root
}
