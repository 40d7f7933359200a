//! Version-dependent request header.
//!
//! Every request starts with the interface token written by `Parcel::writeInterfaceToken`.
//! Its shape changed twice: Android 10 added the work-source uid, Android 11 the environment
//! header. The same releases decide whether a flattened binder carries its stability word and
//! whether dynamically-typed containers are length-prefixed, so all of it is looked up from one
//! table.

use std::ops::RangeInclusive;

use crate::{
    codec::{AndroidVersion, Envelope},
    file::Parser,
    Result,
};

/// Wire features of one range of Android releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// The envelope carries the work-source uid after the policy
    pub work_source: bool,
    /// The envelope carries the environment header after the work-source uid
    pub environment: bool,
    /// `flat_binder_object` is followed by a stability word
    pub binder_stability: bool,
    /// `writeValue` prefixes maps, lists and parcelables with their byte length
    pub value_length_prefix: bool,
}

const LAYOUTS: [(RangeInclusive<u32>, Layout); 4] = [
    (
        0..=9,
        Layout {
            work_source: false,
            environment: false,
            binder_stability: false,
            value_length_prefix: false,
        },
    ),
    (
        10..=10,
        Layout {
            work_source: true,
            environment: false,
            binder_stability: true,
            value_length_prefix: false,
        },
    ),
    (
        11..=12,
        Layout {
            work_source: true,
            environment: true,
            binder_stability: true,
            value_length_prefix: false,
        },
    ),
    (
        13..=u32::MAX,
        Layout {
            work_source: true,
            environment: true,
            binder_stability: true,
            value_length_prefix: true,
        },
    ),
];

impl Layout {
    /// The layout used by `version`.
    #[must_use]
    pub fn for_version(version: AndroidVersion) -> Layout {
        LAYOUTS
            .iter()
            .find(|(range, _)| range.contains(&version.0))
            .map_or(LAYOUTS[LAYOUTS.len() - 1].1, |(_, layout)| *layout)
    }

    /// Read the interface token into `envelope`.
    ///
    /// Fields are stored as soon as they are read, so `envelope` keeps whatever preceded a
    /// failure.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] or [`crate::Error::Malformed`] when the buffer
    /// ends inside the header.
    pub fn read_envelope(self, parser: &mut Parser<'_>, envelope: &mut Envelope) -> Result<()> {
        envelope.policy = Some(parser.read_u32()?);
        if self.work_source {
            envelope.work_source = Some(parser.read_u32()?);
        }
        if self.environment {
            envelope.environment = Some(parser.read_u32()?);
        }
        envelope.descriptor = parser.read_string16()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::ParcelBuilder;

    /// `'SYST'` as written by system builds
    const SYST: u32 = 0x5359_5354;

    #[test]
    fn test_layout_table() {
        let pie = Layout::for_version(AndroidVersion(9));
        assert!(!pie.work_source && !pie.binder_stability);

        let q = Layout::for_version(AndroidVersion(10));
        assert!(q.work_source && !q.environment && q.binder_stability);

        let s = Layout::for_version(AndroidVersion(12));
        assert!(s.environment && !s.value_length_prefix);

        assert!(Layout::for_version(AndroidVersion(14)).value_length_prefix);
        assert_eq!(Layout::for_version(AndroidVersion(0)), pie);
    }

    #[test]
    fn test_descriptor_offset_per_version() {
        let old = ParcelBuilder::new().int(0x10).string16(Some("a.IFoo")).build();
        let new = ParcelBuilder::new()
            .int(0x10)
            .int(-1)
            .uint(SYST)
            .string16(Some("a.IFoo"))
            .build();

        let mut envelope = Envelope::default();
        let mut parser = Parser::new(&old);
        Layout::for_version(AndroidVersion(9))
            .read_envelope(&mut parser, &mut envelope)
            .unwrap();
        assert_eq!(envelope.descriptor.as_deref(), Some("a.IFoo"));
        assert_eq!(envelope.work_source, None);
        assert_eq!(parser.pos(), old.len());

        let mut envelope = Envelope::default();
        let mut parser = Parser::new(&new);
        Layout::for_version(AndroidVersion(11))
            .read_envelope(&mut parser, &mut envelope)
            .unwrap();
        assert_eq!(envelope.policy, Some(0x10));
        assert_eq!(envelope.work_source, Some(u32::MAX));
        assert_eq!(envelope.environment, Some(SYST));
        assert_eq!(envelope.descriptor.as_deref(), Some("a.IFoo"));
    }

    #[test]
    fn test_truncated_envelope_keeps_prefix() {
        let data = ParcelBuilder::new().int(7).int(1000).build();
        let mut envelope = Envelope::default();
        let result = Layout::for_version(AndroidVersion(11))
            .read_envelope(&mut Parser::new(&data), &mut envelope);

        assert!(result.is_err());
        assert_eq!(envelope.policy, Some(7));
        assert_eq!(envelope.work_source, Some(1000));
        assert_eq!(envelope.descriptor, None);
    }
}
