// SPDX-License-Identifier: MIT

//! Typed wrappers for the values carried by Global and Local items.
//! Each wraps the integer type the value is decoded into, signed only
//! where the HID standard says so.
//!
//! In this document and unless stated otherwise, a reference to "Section a.b.c" refers to the
//! [HID Device Class Definition for HID 1.11](https://www.usb.org/document-library/device-class-definition-hid-111).

/// Declares `pub struct $name(pub $inner)` with conversions from and into
/// `$inner` and a `Display` that prints the number.
macro_rules! hid_newtype {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub $inner);

        impl From<$name> for $inner {
            fn from(v: $name) -> $inner {
                v.0
            }
        }

        impl From<&$name> for $inner {
            fn from(v: &$name) -> $inner {
                v.0
            }
        }

        impl From<$inner> for $name {
            fn from(v: $inner) -> $name {
                $name(v)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// Global item values, Section 6.2.2.7

hid_newtype!(
    /// Together with a [UsageId] this forms a 32-bit HID Usage.
    UsagePage(u16)
);

impl UsagePage {
    /// The name of this Usage Page as listed in the HID Usage Tables,
    /// if the page is known.
    #[cfg(feature = "hut")]
    pub fn name(&self) -> Option<String> {
        hut::UsagePage::from_usage_page_value(self.0)
            .ok()
            .map(|up| up.name())
    }
}

hid_newtype!(LogicalMinimum(i32));
hid_newtype!(LogicalMaximum(i32));
hid_newtype!(PhysicalMinimum(i32));
hid_newtype!(PhysicalMaximum(i32));
hid_newtype!(Unit(u32));

hid_newtype!(
    /// The raw Unit Exponent value as found in the report descriptor,
    /// see [UnitExponent::exponent].
    UnitExponent(u32)
);

impl UnitExponent {
    /// The base-10 exponent. Devices encode this as a signed 4-bit
    /// nibble (Section 6.2.2.7 table, e.g. `0x0D` is `-3`).
    pub fn exponent(&self) -> i8 {
        let nibble = (self.0 & 0xF) as i8;
        if nibble > 7 {
            nibble - 16
        } else {
            nibble
        }
    }
}

hid_newtype!(
    /// Size of a single field in bits.
    ReportSize(usize)
);
hid_newtype!(ReportId(u8));
hid_newtype!(
    /// Number of fields of [ReportSize] bits each.
    ReportCount(usize)
);

// Local item values, Section 6.2.2.8

hid_newtype!(
    /// The lower 16 bits of a HID Usage. The Usage Page is
    /// either carried separately or taken from the global state.
    UsageId(u16)
);

hid_newtype!(
    /// Where the item was 4 bytes long the upper 16 bits are the
    /// Usage Page, see [UsageMinimum::usage_page].
    UsageMinimum(u32)
);
hid_newtype!(UsageMaximum(u32));

macro_rules! impl_extended_usage {
    ($tipo:ty) => {
        impl $tipo {
            /// The Usage Page encoded in the upper 16 bits, if any.
            pub fn usage_page(&self) -> Option<UsagePage> {
                match self.0 >> 16 {
                    0 => None,
                    page => Some(UsagePage(page as u16)),
                }
            }

            /// The Usage ID in the lower 16 bits.
            pub fn usage_id(&self) -> UsageId {
                UsageId((self.0 & 0xFFFF) as u16)
            }
        }
    };
}

impl_extended_usage!(UsageMinimum);
impl_extended_usage!(UsageMaximum);

hid_newtype!(StringIndex(u32));
hid_newtype!(StringMinimum(u32));
hid_newtype!(StringMaximum(u32));
hid_newtype!(DesignatorIndex(u32));
hid_newtype!(DesignatorMinimum(u32));
hid_newtype!(DesignatorMaximum(u32));
hid_newtype!(
    /// `1` opens a set of alternate usages, `0` closes it.
    Delimiter(u32)
);
