// SPDX-License-Identifier: MIT

//! Decoding of a report descriptor into a sequence of [Record]s.
//!
//! The [Context] holds the state of a single decode: the Global item
//! state table and its Push/Pop stack, the Local item state that is reset
//! after every Main item, and the stack of open collections (Section 6.2.2).
//! Each interpreted item is folded into the context and may emit a
//! [Record]. Input, Output and Feature items emit a [FieldDescriptor] that
//! carries a snapshot of the context at that point.
//!
//! ```
//! # use hidrdesc::*;
//! let bytes = [0x05, 0x0d, 0x09, 0x04, 0xa1, 0x01, 0xc0];
//! let records = decode(&bytes).into_result().unwrap();
//! assert_eq!(records[0], Record::UsagePage(UsagePage(0x0d)));
//! assert_eq!(records.last(), Some(&Record::EndCollection));
//! ```
//!
//! Where only the device's top-level Usage Page and Usage are of interest,
//! [top_level_usage] skips all state tracking.

use crate::hid::*;
use crate::types::*;
use crate::{ParserError, Usage};

use log::{debug, trace, warn};

/// The Global item state table, Section 6.2.2.7. Only items that
/// have been seen in the report descriptor are `Some`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Globals {
    pub usage_page: Option<UsagePage>,
    pub logical_minimum: Option<LogicalMinimum>,
    pub logical_maximum: Option<LogicalMaximum>,
    pub physical_minimum: Option<PhysicalMinimum>,
    pub physical_maximum: Option<PhysicalMaximum>,
    pub unit_exponent: Option<UnitExponent>,
    pub unit: Option<Unit>,
    pub report_size: Option<ReportSize>,
    pub report_id: Option<ReportId>,
    pub report_count: Option<ReportCount>,
}

impl Globals {
    fn update(&mut self, item: &GlobalItem) {
        match *item {
            GlobalItem::UsagePage(v) => self.usage_page = Some(v),
            GlobalItem::LogicalMinimum(v) => self.logical_minimum = Some(v),
            GlobalItem::LogicalMaximum(v) => self.logical_maximum = Some(v),
            GlobalItem::PhysicalMinimum(v) => self.physical_minimum = Some(v),
            GlobalItem::PhysicalMaximum(v) => self.physical_maximum = Some(v),
            GlobalItem::UnitExponent(v) => self.unit_exponent = Some(v),
            GlobalItem::Unit(v) => self.unit = Some(v),
            GlobalItem::ReportSize(v) => self.report_size = Some(v),
            GlobalItem::ReportId(v) => self.report_id = Some(v),
            GlobalItem::ReportCount(v) => self.report_count = Some(v),
            GlobalItem::Push | GlobalItem::Pop | GlobalItem::Reserved { .. } => {}
        }
    }
}

/// A Usage as found in a Local item. The usage page is only present
/// for 4-byte Usage items, otherwise it comes from the [Globals].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocalUsage {
    pub usage_page: Option<UsagePage>,
    pub usage_id: UsageId,
}

/// The Local item state, Section 6.2.2.8.
///
/// A Main item may be preceded by several Usage items, all of them
/// are kept in order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Locals {
    pub usages: Vec<LocalUsage>,
    pub usage_minimum: Option<UsageMinimum>,
    pub usage_maximum: Option<UsageMaximum>,
    pub designator_index: Option<DesignatorIndex>,
    pub designator_minimum: Option<DesignatorMinimum>,
    pub designator_maximum: Option<DesignatorMaximum>,
    pub string_index: Option<StringIndex>,
    pub string_minimum: Option<StringMinimum>,
    pub string_maximum: Option<StringMaximum>,
    pub delimiter: Option<Delimiter>,
}

impl Locals {
    /// The most recent Usage
    pub fn usage(&self) -> Option<&LocalUsage> {
        self.usages.last()
    }

    pub fn is_empty(&self) -> bool {
        *self == Locals::default()
    }

    fn update(&mut self, item: &LocalItem) {
        match *item {
            LocalItem::Usage(usage_page, usage_id) => self.usages.push(LocalUsage {
                usage_page: Some(usage_page),
                usage_id,
            }),
            LocalItem::UsageId(usage_id) => self.usages.push(LocalUsage {
                usage_page: None,
                usage_id,
            }),
            LocalItem::UsageMinimum(v) => self.usage_minimum = Some(v),
            LocalItem::UsageMaximum(v) => self.usage_maximum = Some(v),
            LocalItem::DesignatorIndex(v) => self.designator_index = Some(v),
            LocalItem::DesignatorMinimum(v) => self.designator_minimum = Some(v),
            LocalItem::DesignatorMaximum(v) => self.designator_maximum = Some(v),
            LocalItem::StringIndex(v) => self.string_index = Some(v),
            LocalItem::StringMinimum(v) => self.string_minimum = Some(v),
            LocalItem::StringMaximum(v) => self.string_maximum = Some(v),
            LocalItem::Delimiter(v) => self.delimiter = Some(v),
            LocalItem::Reserved { .. } => {}
        }
    }
}

/// An Input, Output or Feature item combined with the Global and Local
/// state at the time the item was encountered.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDescriptor<F: MainDataItem> {
    /// Offset of the Main item in the report descriptor
    pub offset: usize,
    pub flags: F,
    pub globals: Globals,
    pub locals: Locals,
    /// The open collections, outermost first
    pub collections: Vec<CollectionItem>,
}

impl<F: MainDataItem> FieldDescriptor<F> {
    /// The usages of this field with their Usage Page resolved.
    ///
    /// A Usage Minimum/Maximum pair takes precedence over individual
    /// Usages. The range page comes from an extended Usage Minimum, then
    /// an extended Usage Maximum, then the global state. A Usage Minimum
    /// or Maximum without its counterpart is ignored. Usages without a
    /// Usage Page in either the item or the global state are dropped.
    pub fn usages(&self) -> Vec<Usage> {
        let globals = &self.globals;
        let locals = &self.locals;

        match (locals.usage_minimum, locals.usage_maximum) {
            (Some(min), Some(max)) => {
                let usage_page = min.usage_page().or(max.usage_page()).or(globals.usage_page);
                let max_page = max.usage_page();
                if max_page.is_some() && max_page != usage_page {
                    debug!("{:#06x}: ignoring the Usage Maximum page", self.offset);
                }
                let Some(usage_page) = usage_page else {
                    return vec![];
                };
                let min = u16::from(min.usage_id());
                let max = u16::from(max.usage_id());
                (min..=max)
                    .map(|usage_id| Usage {
                        usage_page,
                        usage_id: UsageId(usage_id),
                    })
                    .collect()
            }
            (min, max) => {
                if min.is_some() || max.is_some() {
                    debug!(
                        "{:#06x}: ignoring Usage Minimum/Maximum without its counterpart",
                        self.offset
                    );
                }
                locals
                    .usages
                    .iter()
                    .filter_map(|u| {
                        u.usage_page.or(globals.usage_page).map(|usage_page| Usage {
                            usage_page,
                            usage_id: u.usage_id,
                        })
                    })
                    .collect()
            }
        }
    }

    /// The number of bits this item occupies in its report, if both
    /// Report Size and Report Count are known and the product fits.
    pub fn bit_size(&self) -> Option<usize> {
        let size = usize::from(self.globals.report_size?);
        let count = usize::from(self.globals.report_count?);
        size.checked_mul(count)
    }
}

/// One element of the decoded report descriptor, in the order the
/// items appear in the bytes.
///
/// Global and Local items other than Usage Page and Usage are not emitted,
/// their values are available in each [FieldDescriptor].
#[derive(Clone, Debug, PartialEq)]
pub enum Record {
    UsagePage(UsagePage),
    Usage(LocalUsage),
    Collection(CollectionItem),
    EndCollection,
    Input(FieldDescriptor<InputItem>),
    Output(FieldDescriptor<OutputItem>),
    Feature(FieldDescriptor<FeatureItem>),
}

#[cfg(feature = "hut")]
fn usage_page_label(usage_page: UsagePage) -> String {
    usage_page
        .name()
        .unwrap_or_else(|| format!("{:#06x}", u16::from(usage_page)))
}

#[cfg(not(feature = "hut"))]
fn usage_page_label(usage_page: UsagePage) -> String {
    format!("{:#06x}", u16::from(usage_page))
}

#[cfg(feature = "hut")]
fn usage_label(usage: &LocalUsage) -> String {
    let name = usage.usage_page.and_then(|usage_page| {
        Usage {
            usage_page,
            usage_id: usage.usage_id,
        }
        .name()
    });
    name.unwrap_or_else(|| format!("{:#06x}", u16::from(usage.usage_id)))
}

#[cfg(not(feature = "hut"))]
fn usage_label(usage: &LocalUsage) -> String {
    format!("{:#06x}", u16::from(usage.usage_id))
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Record::UsagePage(up) => write!(f, "Usage Page ({})", usage_page_label(*up)),
            Record::Usage(u) => write!(f, "Usage ({})", usage_label(u)),
            Record::Collection(c) => write!(f, "Collection ({c})"),
            Record::EndCollection => write!(f, "End Collection"),
            Record::Input(field) => write!(f, "Input ({})", field.flags.describe()),
            Record::Output(field) => write!(f, "Output ({})", field.flags.describe()),
            Record::Feature(field) => write!(f, "Feature ({})", field.flags.describe()),
        }
    }
}

/// The state of a single decode. Create one per report descriptor.
#[derive(Debug, Default)]
pub struct Context {
    globals: Globals,
    global_stack: Vec<Globals>,
    locals: Locals,
    collections: Vec<CollectionItem>,
}

impl Context {
    pub fn new() -> Self {
        Context::default()
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    pub fn locals(&self) -> &Locals {
        &self.locals
    }

    /// The currently open collections, outermost first
    pub fn collections(&self) -> &[CollectionItem] {
        &self.collections
    }

    /// The number of Global state tables saved by Push
    pub fn push_depth(&self) -> usize {
        self.global_stack.len()
    }

    /// Fold one item into the context, returning the record it emits, if any.
    pub fn feed(&mut self, item: &ReportDescriptorItem) -> crate::Result<Option<Record>> {
        let offset = item.offset();
        trace!("{offset:#06x}: {:?}", item.item_type());

        let record = match *item.item_type() {
            ItemType::Main(main) => {
                let record = self.main_item(main, offset)?;
                self.locals = Locals::default();
                Some(record)
            }
            ItemType::Global(GlobalItem::Push) => {
                self.global_stack.push(self.globals);
                None
            }
            ItemType::Global(GlobalItem::Pop) => {
                self.globals = self
                    .global_stack
                    .pop()
                    .ok_or(ParserError::StackUnderflow { offset })?;
                None
            }
            ItemType::Global(GlobalItem::Reserved { value }) => {
                debug!("{offset:#06x}: skipping reserved global item {value:#04x}");
                None
            }
            ItemType::Global(global) => {
                self.globals.update(&global);
                match global {
                    GlobalItem::UsagePage(usage_page) => Some(Record::UsagePage(usage_page)),
                    _ => None,
                }
            }
            ItemType::Local(LocalItem::Reserved { value }) => {
                debug!("{offset:#06x}: skipping reserved local item {value:#04x}");
                None
            }
            ItemType::Local(local) => {
                self.locals.update(&local);
                match local {
                    LocalItem::Usage(usage_page, usage_id) => Some(Record::Usage(LocalUsage {
                        usage_page: Some(usage_page),
                        usage_id,
                    })),
                    LocalItem::UsageId(usage_id) => Some(Record::Usage(LocalUsage {
                        usage_page: None,
                        usage_id,
                    })),
                    _ => None,
                }
            }
            ItemType::Reserved => {
                debug!(
                    "{offset:#06x}: skipping reserved item {:#04x}",
                    item.header()
                );
                None
            }
        };

        Ok(record)
    }

    fn main_item(&mut self, item: MainItem, offset: usize) -> crate::Result<Record> {
        let record = match item {
            MainItem::Collection(collection) => {
                self.collections.push(collection);
                Record::Collection(collection)
            }
            MainItem::EndCollection => {
                self.collections
                    .pop()
                    .ok_or(ParserError::CollectionUnderflow { offset })?;
                Record::EndCollection
            }
            MainItem::Input(flags) => Record::Input(self.field(flags, offset)),
            MainItem::Output(flags) => Record::Output(self.field(flags, offset)),
            MainItem::Feature(flags) => Record::Feature(self.field(flags, offset)),
        };
        Ok(record)
    }

    fn field<F: MainDataItem>(&self, flags: F, offset: usize) -> FieldDescriptor<F> {
        FieldDescriptor {
            offset,
            flags,
            globals: self.globals,
            locals: self.locals.clone(),
            collections: self.collections.clone(),
        }
    }
}

/// The result of [decode]. Where decoding stopped on an error, `records`
/// holds everything emitted before the offending item.
#[derive(Clone, Debug, PartialEq)]
pub struct Decoded {
    pub records: Vec<Record>,
    pub error: Option<ParserError>,
}

impl Decoded {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// Discard the partial records if decoding failed.
    pub fn into_result(self) -> crate::Result<Vec<Record>> {
        match self.error {
            None => Ok(self.records),
            Some(e) => Err(e),
        }
    }
}

/// Decode the report descriptor into its [Record]s.
///
/// Decoding stops at the first error. The records emitted up to that
/// point are returned alongside the error.
pub fn decode(bytes: &[u8]) -> Decoded {
    let mut context = Context::new();
    let mut records = Vec::new();

    for raw in Tokenizer::new(bytes) {
        let step = raw.and_then(|raw| context.feed(&ReportDescriptorItem::from(&raw)));
        match step {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(e) => {
                warn!("Decoding stopped after {} records: {e}", records.len());
                return Decoded {
                    records,
                    error: Some(e),
                };
            }
        }
    }

    if !context.collections().is_empty() {
        debug!(
            "{} collection(s) still open at end of report descriptor",
            context.collections().len()
        );
    }

    Decoded {
        records,
        error: None,
    }
}

/// The first Usage Page and Usage of a report descriptor, typically
/// identifying what kind of device this is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TopLevelUsage {
    pub usage_page: UsagePage,
    pub usage_id: UsageId,
}

/// Extract the first Usage Page and first Usage without decoding
/// the whole report descriptor.
///
/// No Push/Pop or collection tracking is done and anything after the
/// two items is ignored, including errors. A 4-byte Usage supplies the
/// Usage Page if no Usage Page item precedes it. Returns `None` unless
/// both were found.
pub fn top_level_usage(bytes: &[u8]) -> Option<TopLevelUsage> {
    let mut usage_page: Option<UsagePage> = None;
    let mut usage_id: Option<UsageId> = None;

    for raw in Tokenizer::new(bytes) {
        let raw = match raw {
            Ok(raw) => raw,
            Err(e) => {
                debug!("Fast extraction stopped: {e}");
                break;
            }
        };
        match ItemType::from(&raw) {
            ItemType::Global(GlobalItem::UsagePage(up)) if usage_page.is_none() => {
                usage_page = Some(up)
            }
            ItemType::Local(LocalItem::UsageId(id)) if usage_id.is_none() => usage_id = Some(id),
            ItemType::Local(LocalItem::Usage(up, id)) if usage_id.is_none() => {
                usage_id = Some(id);
                usage_page.get_or_insert(up);
            }
            _ => {}
        }
        if let (Some(usage_page), Some(usage_id)) = (usage_page, usage_id) {
            return Some(TopLevelUsage {
                usage_page,
                usage_id,
            });
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rustfmt::skip]
    const MOUSE: [u8; 28] = [
        0x05, 0x01,  // Usage Page (Generic Desktop)
        0x09, 0x02,  // Usage (Mouse)
        0xa1, 0x01,  // Collection (Application)
        0x09, 0x01,  //   Usage (Pointer)
        0xa1, 0x00,  //   Collection (Physical)
        0x05, 0x09,  //     Usage Page (Button)
        0x19, 0x01,  //     Usage Minimum (1)
        0x29, 0x03,  //     Usage Maximum (3)
        0x15, 0x00,  //     Logical Minimum (0)
        0x25, 0x01,  //     Logical Maximum (1)
        0x95, 0x03,  //     Report Count (3)
        0x75, 0x01,  //     Report Size (1)
        0x81, 0x02,  //     Input (Data,Var,Abs)
        0xc0,        //   End Collection
        0xc0,        // End Collection
    ];

    fn feed_all(context: &mut Context, bytes: &[u8]) -> Vec<Record> {
        let items = ReportDescriptorItems::try_from(bytes).unwrap();
        items
            .iter()
            .filter_map(|item| context.feed(item).unwrap())
            .collect()
    }

    fn fields(records: &[Record]) -> Vec<&FieldDescriptor<InputItem>> {
        records
            .iter()
            .filter_map(|r| match r {
                Record::Input(f) => Some(f),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn mouse() {
        let decoded = decode(&MOUSE);
        assert!(decoded.is_complete());
        let records = decoded.records;

        assert_eq!(records.len(), 9);
        assert_eq!(records[0], Record::UsagePage(UsagePage(0x0001)));
        assert_eq!(
            records[1],
            Record::Usage(LocalUsage {
                usage_page: None,
                usage_id: UsageId(0x0002)
            })
        );
        assert_eq!(records[2], Record::Collection(CollectionItem::Application));
        assert_eq!(records[4], Record::Collection(CollectionItem::Physical));
        assert_eq!(records[5], Record::UsagePage(UsagePage(0x0009)));

        let collections = records
            .iter()
            .filter(|r| matches!(r, Record::Collection(_)))
            .count();
        let end_collections = records
            .iter()
            .filter(|r| matches!(r, Record::EndCollection))
            .count();
        assert_eq!(collections, 2);
        assert_eq!(end_collections, 2);

        let fields = fields(&records);
        assert_eq!(fields.len(), 1);
        let field = fields[0];
        assert_eq!(field.offset, 24);
        assert!(field.flags.is_variable());
        assert!(field.flags.is_data());
        assert_eq!(field.globals.usage_page, Some(UsagePage(0x09)));
        assert_eq!(field.globals.logical_minimum, Some(LogicalMinimum(0)));
        assert_eq!(field.globals.logical_maximum, Some(LogicalMaximum(1)));
        assert_eq!(field.globals.report_count, Some(ReportCount(3)));
        assert_eq!(field.globals.report_size, Some(ReportSize(1)));
        assert_eq!(field.globals.report_id, None);
        assert_eq!(field.locals.usage_minimum, Some(UsageMinimum(1)));
        assert_eq!(field.locals.usage_maximum, Some(UsageMaximum(3)));
        // Usage (Pointer) belongs to the Physical collection, not the field
        assert!(field.locals.usages.is_empty());
        assert_eq!(
            field.collections,
            vec![CollectionItem::Application, CollectionItem::Physical]
        );
        assert_eq!(field.bit_size(), Some(3));

        let usages = field.usages();
        assert_eq!(
            usages
                .iter()
                .map(|u| u16::from(u.usage_id))
                .collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(usages.iter().all(|u| u.usage_page == UsagePage(0x09)));
    }

    #[test]
    fn deterministic() {
        let truncated = &MOUSE[..MOUSE.len() - 5];
        for bytes in [&MOUSE[..], truncated, &[0xb4][..], &[][..]] {
            assert_eq!(decode(bytes), decode(bytes));
        }
    }

    #[test]
    fn signed_logical_minimum() {
        let bytes = [0x16, 0xff, 0xff, 0x75, 0x08, 0x95, 0x01, 0x81, 0x06];
        let records = decode(&bytes).into_result().unwrap();
        let fields = fields(&records);
        assert_eq!(fields[0].globals.logical_minimum, Some(LogicalMinimum(-1)));
        assert!(fields[0].flags.is_relative());
    }

    #[test]
    fn push_pop_restores_usage_page() {
        #[rustfmt::skip]
        let bytes = [
            0x05, 0x01,  // Usage Page (Generic Desktop)
            0xa4,        // Push
            0x05, 0x09,  //   Usage Page (Button)
            0x25, 0x01,  //   Logical Maximum (1)
            0xb4,        // Pop
            0x09, 0x30,  // Usage (X)
            0x75, 0x08,  // Report Size (8)
            0x95, 0x01,  // Report Count (1)
            0x81, 0x02,  // Input (Data,Var,Abs)
        ];
        let records = decode(&bytes).into_result().unwrap();
        let fields = fields(&records);
        assert_eq!(fields[0].globals.usage_page, Some(UsagePage(0x01)));
        // Logical Maximum was set after Push and is gone after Pop
        assert_eq!(fields[0].globals.logical_maximum, None);
        assert_eq!(
            fields[0].usages(),
            vec![Usage {
                usage_page: UsagePage(0x01),
                usage_id: UsageId(0x30)
            }]
        );
        // Usage Page items inside Push/Pop are still emitted
        let pages: Vec<_> = records
            .iter()
            .filter(|r| matches!(r, Record::UsagePage(_)))
            .collect();
        assert_eq!(pages.len(), 2);
    }

    #[test]
    fn push_depth() {
        let mut context = Context::new();
        feed_all(
            &mut context,
            &[0x05, 0x01, 0xa4, 0x05, 0x09, 0xa4, 0x05, 0x0c],
        );
        assert_eq!(context.push_depth(), 2);
        assert_eq!(context.globals().usage_page, Some(UsagePage(0x0c)));
        feed_all(&mut context, &[0xb4]);
        assert_eq!(context.push_depth(), 1);
        assert_eq!(context.globals().usage_page, Some(UsagePage(0x09)));
        feed_all(&mut context, &[0xb4]);
        assert_eq!(context.push_depth(), 0);
        assert_eq!(context.globals().usage_page, Some(UsagePage(0x01)));
    }

    #[test]
    fn pop_underflow() {
        let bytes = [0x05, 0x01, 0x09, 0x02, 0xb4, 0x09, 0x03];
        let decoded = decode(&bytes);
        assert_eq!(
            decoded.error,
            Some(ParserError::StackUnderflow { offset: 4 })
        );
        assert_eq!(decoded.records.len(), 2);
    }

    #[test]
    fn unbalanced_collection() {
        let decoded = decode(&[0x05, 0x01, 0xa1, 0x01]);
        assert!(decoded.is_complete());
        assert_eq!(
            decoded.records.last(),
            Some(&Record::Collection(CollectionItem::Application))
        );

        let decoded = decode(&[0xc0]);
        assert_eq!(
            decoded.error,
            Some(ParserError::CollectionUnderflow { offset: 0 })
        );
        assert!(decoded.records.is_empty());

        let decoded = decode(&[0xa1, 0x01, 0xc0, 0xc0]);
        assert_eq!(
            decoded.error,
            Some(ParserError::CollectionUnderflow { offset: 3 })
        );
        assert_eq!(decoded.records.len(), 2);
    }

    #[test]
    fn locals_reset_after_main_item() {
        #[rustfmt::skip]
        let bytes = [
            0x05, 0x01,  // Usage Page (Generic Desktop)
            0x09, 0x30,  // Usage (X)
            0x75, 0x08,  // Report Size (8)
            0x95, 0x01,  // Report Count (1)
            0x81, 0x02,  // Input (Data,Var,Abs)
            0x81, 0x02,  // Input (Data,Var,Abs)
        ];
        let records = decode(&bytes).into_result().unwrap();
        let fields = fields(&records);
        assert_eq!(fields.len(), 2);
        assert_eq!(
            fields[0].locals.usage().map(|u| u.usage_id),
            Some(UsageId(0x30))
        );
        assert!(fields[1].locals.is_empty());
        assert!(fields[1].usages().is_empty());
        // Globals survive
        assert_eq!(fields[1].globals, fields[0].globals);
    }

    #[test]
    fn locals_reset_after_collection() {
        let mut context = Context::new();
        feed_all(&mut context, &[0x09, 0x02, 0x79, 0x04]);
        assert_eq!(context.locals().string_index, Some(StringIndex(4)));
        feed_all(&mut context, &[0xa1, 0x01]);
        assert!(context.locals().is_empty());
        feed_all(&mut context, &[0x09, 0x01, 0xc0]);
        assert!(context.locals().is_empty());
        assert!(context.collections().is_empty());
    }

    #[test]
    fn multiple_usages() {
        #[rustfmt::skip]
        let bytes = [
            0x05, 0x01,                    // Usage Page (Generic Desktop)
            0x09, 0x30,                    // Usage (X)
            0x09, 0x31,                    // Usage (Y)
            0x0b, 0x38, 0x00, 0x01, 0x00,  // Usage (Generic Desktop, Wheel)
            0x0b, 0x38, 0x02, 0x0c, 0x00,  // Usage (Consumer, AC Pan)
            0x15, 0x81,                    // Logical Minimum (-127)
            0x25, 0x7f,                    // Logical Maximum (127)
            0x75, 0x08,                    // Report Size (8)
            0x95, 0x04,                    // Report Count (4)
            0x81, 0x06,                    // Input (Data,Var,Rel)
        ];
        let records = decode(&bytes).into_result().unwrap();
        let fields = fields(&records);
        assert_eq!(fields[0].locals.usages.len(), 4);
        assert_eq!(
            fields[0].locals.usage(),
            Some(&LocalUsage {
                usage_page: Some(UsagePage(0x0c)),
                usage_id: UsageId(0x0238)
            })
        );
        let usages = fields[0].usages();
        assert_eq!(usages.len(), 4);
        assert_eq!(usages[1].usage_page, UsagePage(0x01));
        assert_eq!(usages[3].usage_page, UsagePage(0x0c));
        assert_eq!(
            fields[0].globals.logical_minimum,
            Some(LogicalMinimum(-127))
        );
        assert_eq!(fields[0].bit_size(), Some(32));
    }

    #[test]
    fn usages_without_usage_page() {
        let bytes = [0x09, 0x30, 0x75, 0x08, 0x95, 0x01, 0x81, 0x02];
        let records = decode(&bytes).into_result().unwrap();
        let fields = fields(&records);
        assert_eq!(fields[0].locals.usages.len(), 1);
        assert!(fields[0].usages().is_empty());
    }

    #[test]
    fn extended_usage_range() {
        #[rustfmt::skip]
        let bytes = [
            0x1b, 0x01, 0x00, 0x09, 0x00,  // Usage Minimum (Button 1)
            0x2b, 0x02, 0x00, 0x09, 0x00,  // Usage Maximum (Button 2)
            0x75, 0x01,                    // Report Size (1)
            0x95, 0x02,                    // Report Count (2)
            0x81, 0x02,                    // Input (Data,Var,Abs)
        ];
        let records = decode(&bytes).into_result().unwrap();
        let usages = fields(&records)[0].usages();
        assert_eq!(usages.len(), 2);
        assert_eq!(usages[0].usage_page, UsagePage(0x09));
        assert_eq!(usages[1].usage_id, UsageId(0x02));
    }

    #[test]
    fn usage_range_page_from_maximum() {
        #[rustfmt::skip]
        let bytes = [
            0x05, 0x01,                    // Usage Page (Generic Desktop)
            0x19, 0x01,                    // Usage Minimum (1)
            0x2b, 0x03, 0x00, 0x09, 0x00,  // Usage Maximum (Button 3)
            0x75, 0x01,                    // Report Size (1)
            0x95, 0x03,                    // Report Count (3)
            0x81, 0x02,                    // Input (Data,Var,Abs)
        ];
        let records = decode(&bytes).into_result().unwrap();
        let usages = fields(&records)[0].usages();
        assert_eq!(usages.len(), 3);
        assert!(usages.iter().all(|u| u.usage_page == UsagePage(0x09)));
    }

    #[test]
    fn usage_range_page_conflict() {
        #[rustfmt::skip]
        let bytes = [
            0x1b, 0x01, 0x00, 0x09, 0x00,  // Usage Minimum (Button 1)
            0x2b, 0x02, 0x00, 0x0c, 0x00,  // Usage Maximum (Consumer 2)
            0x75, 0x01,                    // Report Size (1)
            0x95, 0x02,                    // Report Count (2)
            0x81, 0x02,                    // Input (Data,Var,Abs)
        ];
        let records = decode(&bytes).into_result().unwrap();
        let usages = fields(&records)[0].usages();
        assert_eq!(usages.len(), 2);
        assert!(usages.iter().all(|u| u.usage_page == UsagePage(0x09)));
    }

    #[test]
    fn half_open_usage_range() {
        #[rustfmt::skip]
        let bytes = [
            0x05, 0x09,  // Usage Page (Button)
            0x09, 0x05,  // Usage (Button 5)
            0x19, 0x01,  // Usage Minimum (Button 1)
            0x75, 0x01,  // Report Size (1)
            0x95, 0x01,  // Report Count (1)
            0x81, 0x02,  // Input (Data,Var,Abs)
            0x29, 0x08,  // Usage Maximum (Button 8)
            0x75, 0x01,  // Report Size (1)
            0x95, 0x08,  // Report Count (8)
            0x81, 0x02,  // Input (Data,Var,Abs)
        ];
        let records = decode(&bytes).into_result().unwrap();
        let fields = fields(&records);
        assert_eq!(
            fields[0].usages(),
            vec![Usage {
                usage_page: UsagePage(0x09),
                usage_id: UsageId(0x05)
            }]
        );
        assert!(fields[1].usages().is_empty());
    }

    #[test]
    fn output_and_feature_records() {
        #[rustfmt::skip]
        let bytes = [
            0x05, 0x08,  // Usage Page (LEDs)
            0x85, 0x03,  // Report ID (3)
            0x09, 0x01,  // Usage (Num Lock)
            0x75, 0x01,  // Report Size (1)
            0x95, 0x01,  // Report Count (1)
            0x91, 0x82,  // Output (Data,Var,Abs,Vol)
            0x09, 0x02,  // Usage (Caps Lock)
            0xb1, 0x03,  // Feature (Cnst,Var,Abs)
        ];
        let records = decode(&bytes).into_result().unwrap();
        match &records[2] {
            Record::Output(field) => {
                assert!(field.flags.is_volatile());
                assert_eq!(field.globals.report_id, Some(ReportId(3)));
                assert_eq!(field.locals.usages.len(), 1);
            }
            r => panic!("Unexpected record {r:?}"),
        }
        match &records[4] {
            Record::Feature(field) => {
                assert!(field.flags.is_constant());
                assert!(field.flags.is_nonvolatile());
                assert_eq!(
                    field.locals.usage().map(|u| u.usage_id),
                    Some(UsageId(0x02))
                );
            }
            r => panic!("Unexpected record {r:?}"),
        }
    }

    #[test]
    fn reserved_items_are_skipped() {
        #[rustfmt::skip]
        let bytes = [
            0x05, 0x01,  // Usage Page (Generic Desktop)
            0xc5, 0x01,  // Reserved global item
            0xf9, 0x01,  // Reserved local item
            0x0d, 0x01,  // Reserved item class
            0xd1, 0x00,  // Reserved main item
            0x09, 0x02,  // Usage (Mouse)
        ];
        let mut context = Context::new();
        let records = feed_all(&mut context, &bytes);
        assert_eq!(records.len(), 2);
        // A reserved main item does not reset the locals
        assert_eq!(context.locals().usages.len(), 1);
        assert_eq!(decode(&bytes).records, records);
    }

    #[test]
    fn truncated_keeps_prefix() {
        let mut bytes = MOUSE[..MOUSE.len() - 2].to_vec();
        let expected = decode(&bytes).records;
        // Logical Maximum with two data bytes, only one present
        bytes.extend_from_slice(&[0x26, 0xff]);
        let decoded = decode(&bytes);
        assert_eq!(
            decoded.error,
            Some(ParserError::TruncatedItem {
                offset: MOUSE.len() - 2,
                needed: 2,
                available: 1
            })
        );
        assert_eq!(decoded.records, expected);
        assert!(decoded.clone().into_result().is_err());
    }

    #[test]
    fn empty_descriptor() {
        let decoded = decode(&[]);
        assert!(decoded.is_complete());
        assert!(decoded.records.is_empty());
        assert_eq!(top_level_usage(&[]), None);
    }

    #[test]
    fn fast_extraction() {
        assert_eq!(
            top_level_usage(&MOUSE),
            Some(TopLevelUsage {
                usage_page: UsagePage(0x01),
                usage_id: UsageId(0x02)
            })
        );

        // FIDO authenticator, errors after the first two items are ignored
        #[rustfmt::skip]
        let bytes = [
            0x06, 0xd0, 0xf1,  // Usage Page (FIDO Alliance)
            0x09, 0x01,        // Usage (CTAPHID)
            0xc0,              // End Collection without Collection
            0x26,              // Truncated
        ];
        assert_eq!(
            top_level_usage(&bytes),
            Some(TopLevelUsage {
                usage_page: UsagePage(0xf1d0),
                usage_id: UsageId(0x01)
            })
        );
        assert!(decode(&bytes).error.is_some());

        // 4-byte usage supplies the page
        let bytes = [0x0b, 0x01, 0x00, 0xd0, 0xf1];
        assert_eq!(
            top_level_usage(&bytes),
            Some(TopLevelUsage {
                usage_page: UsagePage(0xf1d0),
                usage_id: UsageId(0x01)
            })
        );

        // No usage at all
        assert_eq!(top_level_usage(&[0x05, 0x01, 0xa1, 0x01, 0xc0]), None);
    }

    #[test]
    fn display() {
        let records = decode(&MOUSE).into_result().unwrap();
        assert_eq!(format!("{}", records[2]), "Collection (Application)");
        assert_eq!(format!("{}", records[6]), "Input (Data,Var,Abs)");
        assert_eq!(format!("{}", records[8]), "End Collection");
        #[cfg(not(feature = "hut"))]
        assert_eq!(format!("{}", records[0]), "Usage Page (0x0001)");
        #[cfg(feature = "hut")]
        assert!(format!("{}", records[0]).contains("Desktop"));
    }
}
