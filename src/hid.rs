// SPDX-License-Identifier: MIT

//! A wrapper around the HID Core items. This module handles splitting
//! a report descriptor byte stream into its individual components and
//! classifying each of them. Folding the resulting [ItemType]s into a
//! decode context is done by the [decoder](crate::decoder).
//!
//! In this document and unless stated otherwise, a reference to "Section a.b.c" refers to the
//! [HID Device Class Definition for HID 1.11](https://www.usb.org/document-library/device-class-definition-hid-111).
//!
//! # Tokenizing HID Report Descriptors
//!
//! The [Tokenizer] lazily splits the bytes into [RawItem]s. It stops after the
//! first error, all items yielded before the error remain valid.
//!
//! ```
//! # use hidrdesc::hid::*;
//! let bytes = [0x05, 0x01, 0x09, 0x02, 0xa1, 0x01, 0xc0];
//! for raw in Tokenizer::new(&bytes) {
//!     let raw = raw.unwrap();
//!     match ItemType::from(&raw) {
//!         ItemType::Global(GlobalItem::UsagePage(up)) => assert_eq!(u16::from(up), 0x01),
//!         _ => {}
//!     }
//! }
//! ```
//!
//! # Itemizing HID Report Descriptors
//!
//! Where all items are needed at once, use
//! [`ReportDescriptorItems::try_from(bytes)`](ReportDescriptorItems::try_from):
//!
//! ```
//! # use hidrdesc::hid::*;
//! # fn parse(bytes: &[u8]) {
//! let rdesc_items = ReportDescriptorItems::try_from(bytes).unwrap();
//! for rdesc_item in rdesc_items.iter() {
//!     println!("Item at offset {:02x}", rdesc_item.offset());
//!     match rdesc_item.item_type() {
//!         ItemType::Main(MainItem::Output(o)) => println!("This is an output item"),
//!         _ => {}
//!     }
//! }
//! # }
//! ```

use crate::types::*;
use crate::{ensure, ParserError};

use thiserror::Error;

/// True if bit `bit` is set in `bits`
fn bit(bits: u32, bit: u8) -> bool {
    bits & (1 << bit) != 0
}

/// Maps the two lowest bits of the item prefix to the number of data bytes,
/// Section 6.2.2.2.
const DATA_SIZES: [usize; 4] = [0, 1, 2, 4];

#[derive(Error, Debug, PartialEq)]
pub enum HidError {
    #[error("Invalid data: {message}")]
    InvalidData { message: String },
    #[error("Insufficient data")]
    InsufficientData,
}

type Result<T> = std::result::Result<T, HidError>;

/// The little-endian data of an item.
///
/// An item without data bytes has the value zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HidValue {
    value: u32,
    nbytes: usize,
}

impl HidValue {
    /// Number of data bytes the value was decoded from. Signed
    /// conversion sign-extends from this width.
    pub fn len(&self) -> usize {
        self.nbytes
    }

    pub fn is_empty(&self) -> bool {
        self.nbytes == 0
    }

    fn from_le(bytes: &[u8]) -> HidValue {
        let value = bytes
            .iter()
            .rev()
            .fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
        HidValue {
            value,
            nbytes: bytes.len(),
        }
    }
}

impl TryFrom<&[u8]> for HidValue {
    type Error = HidError;

    fn try_from(bytes: &[u8]) -> Result<HidValue> {
        match bytes.len() {
            0 | 1 | 2 | 4 => Ok(HidValue::from_le(bytes)),
            n => Err(HidError::InvalidData {
                message: format!("{n} data bytes cannot be a HID value"),
            }),
        }
    }
}

/// Unsigned conversions truncate to the target width.
macro_rules! impl_unsigned_value {
    ($to:ty) => {
        impl From<&HidValue> for $to {
            fn from(v: &HidValue) -> $to {
                v.value as $to
            }
        }
        impl From<HidValue> for $to {
            fn from(v: HidValue) -> $to {
                <$to>::from(&v)
            }
        }
    };
}

impl_unsigned_value!(usize);
impl_unsigned_value!(u32);
impl_unsigned_value!(u16);
impl_unsigned_value!(u8);

/// Two's complement at the width of the item's data.
impl From<&HidValue> for i32 {
    fn from(v: &HidValue) -> i32 {
        match v.len() {
            0 => 0,
            1 => i32::from(v.value as u8 as i8),
            2 => i32::from(v.value as u16 as i16),
            _ => v.value as i32,
        }
    }
}

impl From<HidValue> for i32 {
    fn from(v: HidValue) -> i32 {
        i32::from(&v)
    }
}

/// The item class encoded in bits 2 and 3 of the item prefix, Section 6.2.2.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemClass {
    Main,
    Global,
    Local,
    Reserved,
}

impl From<u8> for ItemClass {
    /// Converts from the item prefix byte
    fn from(header: u8) -> ItemClass {
        match (header >> 2) & 0b11 {
            0b00 => ItemClass::Main,
            0b01 => ItemClass::Global,
            0b10 => ItemClass::Local,
            _ => ItemClass::Reserved,
        }
    }
}

/// A single item as found in the report descriptor bytes, before
/// any interpretation. See Section 6.2.2.2.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawItem<'a> {
    offset: usize,
    header: u8,
    data: &'a [u8],
}

impl<'a> RawItem<'a> {
    /// The offset of this item's prefix byte in the report descriptor.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The prefix byte, comprising data size, class and tag.
    pub fn header(&self) -> u8 {
        self.header
    }

    /// The prefix byte without the two size bits. This uniquely
    /// identifies the item kind.
    pub fn prefix(&self) -> u8 {
        self.header & 0b11111100
    }

    pub fn class(&self) -> ItemClass {
        ItemClass::from(self.header)
    }

    /// The tag as shifted-down numeric value in the range 0..15.
    pub fn tag(&self) -> u8 {
        self.header >> 4
    }

    /// The data bytes of this item, 0, 1, 2 or 4 bytes long.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// The length of this item in bytes, inclusive of the prefix byte.
    pub fn size(&self) -> usize {
        self.data.len() + 1
    }

    pub fn value(&self) -> HidValue {
        HidValue::from_le(self.data)
    }
}

/// Splits a report descriptor into its [RawItem]s.
///
/// The tokenizer is lazy and can be cloned to restart from the current
/// position. Once an item is truncated it yields [ParserError::TruncatedItem]
/// and nothing after that.
#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
    bytes: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Tokenizer {
            bytes,
            offset: 0,
            done: false,
        }
    }

    /// Start again from the first byte.
    pub fn rewind(&mut self) {
        self.offset = 0;
        self.done = false;
    }

    /// The offset of the next item to be returned.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = std::result::Result<RawItem<'a>, ParserError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let offset = self.offset;
        let Some(&header) = self.bytes.get(offset) else {
            self.done = true;
            return None;
        };
        let needed = DATA_SIZES[(header & 0b11) as usize];
        let available = self.bytes.len() - offset - 1;
        if needed > available {
            self.done = true;
            return Some(Err(ParserError::TruncatedItem {
                offset,
                needed,
                available,
            }));
        }
        let data = &self.bytes[offset + 1..offset + 1 + needed];
        self.offset += 1 + needed;
        Some(Ok(RawItem {
            offset,
            header,
            data,
        }))
    }
}

impl std::iter::FusedIterator for Tokenizer<'_> {}

/// The type of a HID item may be one of [MainItem], [GlobalItem], or [LocalItem].
/// These items comprise the report descriptor and how the report descriptor should
/// be compiled.
///
/// [ItemType::Reserved] covers the reserved item class and Main items
/// with a reserved tag. These carry no meaning and are skipped by the decoder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ItemType {
    Main(MainItem),
    Global(GlobalItem),
    Local(LocalItem),
    Reserved,
}

impl ItemType {
    /// True for any item that triggers a reset of the local state.
    pub fn is_main(&self) -> bool {
        matches!(self, ItemType::Main(_))
    }
}

impl From<&RawItem<'_>> for ItemType {
    fn from(raw: &RawItem<'_>) -> ItemType {
        match raw.class() {
            ItemClass::Main => MainItem::interpret(raw)
                .map(ItemType::Main)
                .unwrap_or(ItemType::Reserved),
            ItemClass::Global => ItemType::Global(GlobalItem::from(raw)),
            ItemClass::Local => ItemType::Local(LocalItem::from(raw)),
            ItemClass::Reserved => ItemType::Reserved,
        }
    }
}

impl From<RawItem<'_>> for ItemType {
    fn from(raw: RawItem<'_>) -> ItemType {
        ItemType::from(&raw)
    }
}

impl TryFrom<&[u8]> for ItemType {
    type Error = HidError;

    /// Interprets the first item in the given bytes.
    fn try_from(bytes: &[u8]) -> Result<ItemType> {
        ensure!(!bytes.is_empty(), HidError::InsufficientData);
        match Tokenizer::new(bytes).next() {
            Some(Ok(raw)) => Ok(ItemType::from(&raw)),
            _ => Err(HidError::InsufficientData),
        }
    }
}

impl From<MainItem> for ItemType {
    fn from(item: MainItem) -> ItemType {
        ItemType::Main(item)
    }
}

impl From<GlobalItem> for ItemType {
    fn from(item: GlobalItem) -> ItemType {
        ItemType::Global(item)
    }
}

impl From<LocalItem> for ItemType {
    fn from(item: LocalItem) -> ItemType {
        ItemType::Local(item)
    }
}

/// Main Items, see Section 6.2.2.4.
///
/// Input, Output and Feature create fields in a report, Collection and
/// End Collection group them. Every Main item clears the local state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MainItem {
    Input(InputItem),
    Output(OutputItem),
    Feature(FeatureItem),
    Collection(CollectionItem),
    EndCollection,
}

impl MainItem {
    /// Returns `None` for a reserved Main item tag.
    fn interpret(raw: &RawItem<'_>) -> Option<MainItem> {
        let bits = u32::from(raw.value());
        let item = match raw.prefix() {
            0b10000000 => MainItem::Input(InputItem(bits)),
            0b10010000 => MainItem::Output(OutputItem(bits)),
            0b10110000 => MainItem::Feature(FeatureItem(bits)),
            0b10100000 => MainItem::Collection(CollectionItem::from(bits as u8)),
            0b11000000 => MainItem::EndCollection,
            _ => return None,
        };
        Some(item)
    }
}

/// The flags shared by Input, Output and Feature items, Section 6.2.2.5.
///
/// The flags are a bitfield over 32 bits, regardless of how many bytes the
/// item used in the report descriptor. For readability each bit has a
/// function for both of its states.
pub trait MainDataItem {
    /// The raw flag bits
    fn bits(&self) -> u32;

    /// Constant fields are usually padding.
    fn is_constant(&self) -> bool {
        bit(self.bits(), 0)
    }

    fn is_data(&self) -> bool {
        !self.is_constant()
    }

    /// True if the data is a variable field, false for an array field.
    fn is_variable(&self) -> bool {
        bit(self.bits(), 1)
    }

    fn is_array(&self) -> bool {
        !self.is_variable()
    }

    /// Relative to the previous report, e.g. mouse motion
    fn is_relative(&self) -> bool {
        bit(self.bits(), 2)
    }

    fn is_absolute(&self) -> bool {
        !self.is_relative()
    }

    /// The value rolls over past the logical extremes
    fn wraps(&self) -> bool {
        bit(self.bits(), 3)
    }

    fn is_nonlinear(&self) -> bool {
        bit(self.bits(), 4)
    }

    fn is_linear(&self) -> bool {
        !self.is_nonlinear()
    }

    fn has_no_preferred_state(&self) -> bool {
        bit(self.bits(), 5)
    }

    fn has_preferred_state(&self) -> bool {
        !self.has_no_preferred_state()
    }

    /// Values outside the logical range mean "no data", e.g. a centered hat switch
    fn has_null_state(&self) -> bool {
        bit(self.bits(), 6)
    }

    fn is_buffered_bytes(&self) -> bool {
        bit(self.bits(), 8)
    }

    fn is_bitfield(&self) -> bool {
        !self.is_buffered_bytes()
    }

    /// The flags in the notation commonly used in descriptor dumps,
    /// e.g. `Data,Var,Abs`.
    fn describe(&self) -> String {
        let mut flags = vec![
            if self.is_constant() { "Cnst" } else { "Data" },
            if self.is_variable() { "Var" } else { "Arr" },
            if self.is_relative() { "Rel" } else { "Abs" },
        ];
        if self.wraps() {
            flags.push("Wrap");
        }
        if self.is_nonlinear() {
            flags.push("NonLin");
        }
        if self.has_no_preferred_state() {
            flags.push("NoPref");
        }
        if self.has_null_state() {
            flags.push("Null");
        }
        if self.is_buffered_bytes() {
            flags.push("Buff");
        }
        flags.join(",")
    }
}

/// Data sent by the device, Section 6.2.2.4. Bit 7 is reserved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputItem(pub u32);

impl MainDataItem for InputItem {
    fn bits(&self) -> u32 {
        self.0
    }
}

/// See Section 6.2.2.5. Equivalent to the [InputItem] but for data sent
/// to the device, e.g. LED states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputItem(pub u32);

impl OutputItem {
    /// True if the control value may change without host interaction
    pub fn is_volatile(&self) -> bool {
        bit(self.0, 7)
    }

    pub fn is_nonvolatile(&self) -> bool {
        !self.is_volatile()
    }
}

impl MainDataItem for OutputItem {
    fn bits(&self) -> u32 {
        self.0
    }
}

/// See Section 6.2.2.5. Feature items describe device configuration
/// information that can be sent to the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureItem(pub u32);

impl FeatureItem {
    pub fn is_volatile(&self) -> bool {
        bit(self.0, 7)
    }

    pub fn is_nonvolatile(&self) -> bool {
        !self.is_volatile()
    }
}

impl MainDataItem for FeatureItem {
    fn bits(&self) -> u32 {
        self.0
    }
}

/// The kind of a Collection, Section 6.2.2.6. Collections nest and are
/// closed by [MainItem::EndCollection].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionItem {
    Physical,
    Application,
    Logical,
    Report,
    NamedArray,
    UsageSwitch,
    UsageModifier,
    Reserved { value: u8 },
    VendorDefined { value: u8 },
}

impl From<&CollectionItem> for u8 {
    fn from(c: &CollectionItem) -> u8 {
        match c {
            CollectionItem::Physical => 0x00,
            CollectionItem::Application => 0x01,
            CollectionItem::Logical => 0x02,
            CollectionItem::Report => 0x03,
            CollectionItem::NamedArray => 0x04,
            CollectionItem::UsageSwitch => 0x05,
            CollectionItem::UsageModifier => 0x06,
            CollectionItem::Reserved { value } => *value,
            CollectionItem::VendorDefined { value } => *value,
        }
    }
}

impl From<CollectionItem> for u8 {
    fn from(c: CollectionItem) -> u8 {
        u8::from(&c)
    }
}

impl From<u8> for CollectionItem {
    fn from(v: u8) -> CollectionItem {
        match v {
            0x00 => CollectionItem::Physical,
            0x01 => CollectionItem::Application,
            0x02 => CollectionItem::Logical,
            0x03 => CollectionItem::Report,
            0x04 => CollectionItem::NamedArray,
            0x05 => CollectionItem::UsageSwitch,
            0x06 => CollectionItem::UsageModifier,
            value @ 0x07..=0x7f => CollectionItem::Reserved { value },
            value @ 0x80..=0xff => CollectionItem::VendorDefined { value },
        }
    }
}

impl std::fmt::Display for CollectionItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectionItem::Physical => write!(f, "Physical"),
            CollectionItem::Application => write!(f, "Application"),
            CollectionItem::Logical => write!(f, "Logical"),
            CollectionItem::Report => write!(f, "Report"),
            CollectionItem::NamedArray => write!(f, "Named Array"),
            CollectionItem::UsageSwitch => write!(f, "Usage Switch"),
            CollectionItem::UsageModifier => write!(f, "Usage Modifier"),
            CollectionItem::Reserved { value } => write!(f, "Reserved {value:#04x}"),
            CollectionItem::VendorDefined { value } => write!(f, "Vendor Defined {value:#04x}"),
        }
    }
}

/// Global items, Section 6.2.2.7. Their values persist across Main items
/// until overwritten or restored by [GlobalItem::Pop].
///
/// Logical and Physical Minimum/Maximum are decoded as signed values at
/// the width of the item, everything else is unsigned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GlobalItem {
    UsagePage(UsagePage),
    LogicalMinimum(LogicalMinimum),
    LogicalMaximum(LogicalMaximum),
    PhysicalMinimum(PhysicalMinimum),
    PhysicalMaximum(PhysicalMaximum),
    UnitExponent(UnitExponent),
    Unit(Unit),
    ReportSize(ReportSize),
    ReportId(ReportId),
    ReportCount(ReportCount),
    Push,
    Pop,
    // The value of the upper 6 bits of the prefix (`byte[0] & 0xFC`).
    Reserved { value: u8 },
}

impl From<&RawItem<'_>> for GlobalItem {
    fn from(raw: &RawItem<'_>) -> GlobalItem {
        let value = raw.value();
        match raw.prefix() {
            0b00000100 => GlobalItem::UsagePage(UsagePage(value.into())),
            0b00010100 => GlobalItem::LogicalMinimum(LogicalMinimum(value.into())),
            0b00100100 => GlobalItem::LogicalMaximum(LogicalMaximum(value.into())),
            0b00110100 => GlobalItem::PhysicalMinimum(PhysicalMinimum(value.into())),
            0b01000100 => GlobalItem::PhysicalMaximum(PhysicalMaximum(value.into())),
            0b01010100 => GlobalItem::UnitExponent(UnitExponent(value.into())),
            0b01100100 => GlobalItem::Unit(Unit(value.into())),
            0b01110100 => GlobalItem::ReportSize(ReportSize(value.into())),
            0b10000100 => GlobalItem::ReportId(ReportId(value.into())),
            0b10010100 => GlobalItem::ReportCount(ReportCount(value.into())),
            0b10100100 => GlobalItem::Push,
            0b10110100 => GlobalItem::Pop,
            value => GlobalItem::Reserved { value },
        }
    }
}

/// Local items, Section 6.2.2.8. These only apply to the next [MainItem].
///
/// A Usage item carries its own Usage Page only if it is 4 bytes long.
/// Shorter Usage items are returned as [LocalItem::UsageId] and take the
/// Usage Page from the global state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocalItem {
    /// Usage Page in the upper, Usage ID in the lower 16 bits
    Usage(UsagePage, UsageId),
    UsageId(UsageId),
    UsageMinimum(UsageMinimum),
    UsageMaximum(UsageMaximum),
    DesignatorIndex(DesignatorIndex),
    DesignatorMinimum(DesignatorMinimum),
    DesignatorMaximum(DesignatorMaximum),
    StringIndex(StringIndex),
    StringMinimum(StringMinimum),
    StringMaximum(StringMaximum),
    Delimiter(Delimiter),
    // The value of the upper 6 bits of the prefix (`byte[0] & 0xFC`).
    Reserved { value: u8 },
}

impl From<&RawItem<'_>> for LocalItem {
    fn from(raw: &RawItem<'_>) -> LocalItem {
        let value = raw.value();
        match raw.prefix() {
            0b00001000 if value.len() == 4 => {
                let usage = u32::from(&value);
                LocalItem::Usage(UsagePage((usage >> 16) as u16), UsageId(usage as u16))
            }
            0b00001000 => LocalItem::UsageId(UsageId(value.into())),
            0b00011000 => LocalItem::UsageMinimum(UsageMinimum(value.into())),
            0b00101000 => LocalItem::UsageMaximum(UsageMaximum(value.into())),
            0b00111000 => LocalItem::DesignatorIndex(DesignatorIndex(value.into())),
            0b01001000 => LocalItem::DesignatorMinimum(DesignatorMinimum(value.into())),
            0b01011000 => LocalItem::DesignatorMaximum(DesignatorMaximum(value.into())),
            0b01111000 => LocalItem::StringIndex(StringIndex(value.into())),
            0b10001000 => LocalItem::StringMinimum(StringMinimum(value.into())),
            0b10011000 => LocalItem::StringMaximum(StringMaximum(value.into())),
            0b10101000 => LocalItem::Delimiter(Delimiter(value.into())),
            value => LocalItem::Reserved { value },
        }
    }
}

/// A single item in a tokenized (but not yet interpreted) report descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportDescriptorItem {
    offset: usize,
    size: usize,
    header: u8,
    item_type: ItemType,
}

impl ReportDescriptorItem {
    /// Byte offset of the item prefix
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The length of this item in bytes, inclusive of the prefix byte.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn header(&self) -> u8 {
        self.header
    }

    pub fn item_type(&self) -> &ItemType {
        &self.item_type
    }
}

impl From<&RawItem<'_>> for ReportDescriptorItem {
    fn from(raw: &RawItem<'_>) -> ReportDescriptorItem {
        ReportDescriptorItem {
            offset: raw.offset(),
            size: raw.size(),
            header: raw.header(),
            item_type: ItemType::from(raw),
        }
    }
}

/// All items of a report descriptor, classified but not folded into
/// any state. Mostly useful for dumping a report descriptor.
#[derive(Debug)]
pub struct ReportDescriptorItems {
    items: Vec<ReportDescriptorItem>,
}

impl std::ops::Deref for ReportDescriptorItems {
    type Target = [ReportDescriptorItem];

    fn deref(&self) -> &Self::Target {
        &self.items
    }
}

impl TryFrom<&[u8]> for ReportDescriptorItems {
    type Error = ParserError;

    /// Fails on the first truncated item.
    fn try_from(bytes: &[u8]) -> crate::Result<Self> {
        let items = Tokenizer::new(bytes)
            .map(|raw| raw.map(|r| ReportDescriptorItem::from(&r)))
            .collect::<crate::Result<Vec<_>>>()?;
        Ok(ReportDescriptorItems { items })
    }
}

impl TryFrom<&Vec<u8>> for ReportDescriptorItems {
    type Error = ParserError;

    fn try_from(bytes: &Vec<u8>) -> crate::Result<Self> {
        ReportDescriptorItems::try_from(bytes.as_slice())
    }
}
