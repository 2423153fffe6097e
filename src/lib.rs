// SPDX-License-Identifier: MIT

//! A decoder for HID Report Descriptors.
//!
//! A report descriptor is the byte blob a HID device exposes to describe
//! the data it exchanges. This crate turns those bytes into a sequence of
//! [Record]s, folding the Global and Local item state into a field
//! descriptor for every Input, Output and Feature item.
//!
//! ```
//! use hidrdesc::*;
//!
//! let bytes = [
//!     0x05, 0x01, // Usage Page (Generic Desktop)
//!     0x09, 0x02, // Usage (Mouse)
//!     0xa1, 0x01, // Collection (Application)
//!     0x05, 0x09, //   Usage Page (Button)
//!     0x19, 0x01, //   Usage Minimum (1)
//!     0x29, 0x03, //   Usage Maximum (3)
//!     0x15, 0x00, //   Logical Minimum (0)
//!     0x25, 0x01, //   Logical Maximum (1)
//!     0x95, 0x03, //   Report Count (3)
//!     0x75, 0x01, //   Report Size (1)
//!     0x81, 0x02, //   Input (Data,Var,Abs)
//!     0xc0,       // End Collection
//! ];
//!
//! let decoded = decode(&bytes);
//! assert!(decoded.error.is_none());
//! for record in &decoded.records {
//!     if let Record::Input(field) = record {
//!         assert_eq!(field.usages().len(), 3);
//!     }
//! }
//!
//! let rdesc = ReportDescriptor::try_from(&bytes[..]).unwrap();
//! assert_eq!(rdesc.input_reports()[0].size, 3);
//! ```
//!
//! In this document and unless stated otherwise, a reference to "Section a.b.c" refers to the
//! [HID Device Class Definition for HID 1.11](https://www.usb.org/document-library/device-class-definition-hid-111).

use std::ops::RangeInclusive;
use thiserror::Error;

pub mod decoder;
pub mod device;
pub mod hid;
pub mod types;

pub use decoder::*;
use hid::*;
pub use types::*;

/// Return early with the given error if the condition does not hold.
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !$cond {
            return Err($err);
        }
    };
}

pub(crate) use ensure;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParserError {
    #[error("Truncated item at offset {offset}: needs {needed} data bytes, {available} available")]
    TruncatedItem {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("Pop without a matching Push at offset {offset}")]
    StackUnderflow { offset: usize },
    #[error("End Collection without an open Collection at offset {offset}")]
    CollectionUnderflow { offset: usize },
    #[error("Missing {name} for the item at offset {offset}")]
    MissingGlobal { offset: usize, name: &'static str },
    #[error("Data field without a usage at offset {offset}")]
    MissingUsage { offset: usize },
    #[error("Report exceeds {} bytes at offset {offset}", MAX_REPORT_SIZE)]
    ReportTooLarge { offset: usize },
}

/// The largest report in bytes, excluding the Report ID. This is the
/// buffer size of the Linux HID core.
pub const MAX_REPORT_SIZE: usize = 16384;

type Result<T> = std::result::Result<T, ParserError>;

/// A HID Usage with its Usage Page resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Usage {
    pub usage_page: UsagePage,
    pub usage_id: UsageId,
}

impl Usage {
    /// The name of this usage as listed in the HID Usage Tables, if known.
    #[cfg(feature = "hut")]
    pub fn name(&self) -> Option<String> {
        hut::Usage::new_from_page_and_id(self.usage_page.into(), self.usage_id.into())
            .ok()
            .map(|u| u.name())
    }
}

impl From<&Usage> for u32 {
    fn from(usage: &Usage) -> u32 {
        (u32::from(u16::from(usage.usage_page)) << 16) | u32::from(u16::from(usage.usage_id))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
    Feature,
}

/// The report layout of a report descriptor, grouped by [Direction]
/// and [ReportId].
#[derive(Debug, Default)]
pub struct ReportDescriptor {
    input_reports: Vec<Report>,
    output_reports: Vec<Report>,
    feature_reports: Vec<Report>,
}

impl ReportDescriptor {
    pub fn input_reports(&self) -> &[Report] {
        &self.input_reports
    }

    pub fn output_reports(&self) -> &[Report] {
        &self.output_reports
    }

    pub fn feature_reports(&self) -> &[Report] {
        &self.feature_reports
    }

    /// Find the input report with the given id, `None` for a
    /// descriptor without report IDs.
    pub fn find_input_report(&self, id: Option<ReportId>) -> Option<&Report> {
        self.input_reports.iter().find(|r| r.id == id)
    }

    pub fn find_output_report(&self, id: Option<ReportId>) -> Option<&Report> {
        self.output_reports.iter().find(|r| r.id == id)
    }

    pub fn find_feature_report(&self, id: Option<ReportId>) -> Option<&Report> {
        self.feature_reports.iter().find(|r| r.id == id)
    }

    /// Build the report layout from already decoded records.
    pub fn from_records(records: &[Record]) -> Result<ReportDescriptor> {
        let mut rdesc = ReportDescriptor::default();
        for record in records {
            match record {
                Record::Input(field) => rdesc.add_field(field, Direction::Input)?,
                Record::Output(field) => rdesc.add_field(field, Direction::Output)?,
                Record::Feature(field) => rdesc.add_field(field, Direction::Feature)?,
                _ => {}
            }
        }
        Ok(rdesc)
    }

    fn reports_mut(&mut self, direction: Direction) -> &mut Vec<Report> {
        match direction {
            Direction::Input => &mut self.input_reports,
            Direction::Output => &mut self.output_reports,
            Direction::Feature => &mut self.feature_reports,
        }
    }

    fn add_field<F: MainDataItem>(
        &mut self,
        item: &FieldDescriptor<F>,
        direction: Direction,
    ) -> Result<()> {
        let globals = &item.globals;
        let offset = item.offset;
        let report_id = globals.report_id;

        let report_size = globals.report_size.ok_or(ParserError::MissingGlobal {
            offset,
            name: "Report Size",
        })?;
        let report_count = globals.report_count.ok_or(ParserError::MissingGlobal {
            offset,
            name: "Report Count",
        })?;
        let report_size = usize::from(report_size);
        let report_count = usize::from(report_count);
        let nbits = report_size
            .checked_mul(report_count)
            .ok_or(ParserError::ReportTooLarge { offset })?;

        let reports = self.reports_mut(direction);
        let idx = match reports.iter().position(|r| r.id == report_id) {
            Some(idx) => idx,
            None => {
                reports.push(Report {
                    id: report_id,
                    size: 0,
                    fields: vec![],
                    direction,
                });
                reports.len() - 1
            }
        };
        let report = &mut reports[idx];

        if nbits == 0 {
            log::debug!("Skipping zero-sized field at offset {offset}");
            return Ok(());
        }

        let end = report.size.checked_add(nbits);
        ensure!(
            end.is_some_and(|end| end <= MAX_REPORT_SIZE * 8),
            ParserError::ReportTooLarge { offset }
        );

        if item.flags.is_constant() {
            let bits = report.reserve(nbits);
            report.fields.push(Field::Constant(ConstantField {
                bits,
                report_id,
                direction,
            }));
            return Ok(());
        }

        let logical_range = LogicalRange {
            minimum: globals.logical_minimum.ok_or(ParserError::MissingGlobal {
                offset,
                name: "Logical Minimum",
            })?,
            maximum: globals.logical_maximum.ok_or(ParserError::MissingGlobal {
                offset,
                name: "Logical Maximum",
            })?,
        };

        let physical_range = match (globals.physical_minimum, globals.physical_maximum) {
            (Some(minimum), Some(maximum)) => Some(PhysicalRange { minimum, maximum }),
            _ => None,
        };

        let usages = item.usages();
        ensure!(!usages.is_empty(), ParserError::MissingUsage { offset });

        if item.flags.is_variable() {
            for c in 0..report_count {
                let bits = report.reserve(report_size);
                let usage = *usages
                    .get(c)
                    .or_else(|| usages.last())
                    .ok_or(ParserError::MissingUsage { offset })?;
                report.fields.push(Field::Variable(VariableField {
                    usage,
                    bits,
                    logical_range,
                    physical_range,
                    unit: globals.unit,
                    unit_exponent: globals.unit_exponent,
                    collections: item.collections.clone(),
                    report_id,
                    direction,
                }));
            }
        } else {
            let bits = report.reserve(nbits);
            report.fields.push(Field::Array(ArrayField {
                usages,
                bits,
                logical_range,
                physical_range,
                unit: globals.unit,
                unit_exponent: globals.unit_exponent,
                collections: item.collections.clone(),
                report_id,
                direction,
            }));
        }

        Ok(())
    }
}

impl TryFrom<&[u8]> for ReportDescriptor {
    type Error = ParserError;

    fn try_from(bytes: &[u8]) -> Result<ReportDescriptor> {
        let records = decode(bytes).into_result()?;
        ReportDescriptor::from_records(&records)
    }
}

impl TryFrom<&Vec<u8>> for ReportDescriptor {
    type Error = ParserError;

    fn try_from(bytes: &Vec<u8>) -> Result<ReportDescriptor> {
        ReportDescriptor::try_from(bytes.as_slice())
    }
}

/// One report as exchanged with the device. Fields are in wire order.
#[derive(Debug)]
pub struct Report {
    /// `None` if the device does not use Report IDs
    pub id: Option<ReportId>,
    /// Payload size in bits, excluding the Report ID byte
    pub size: usize,
    pub fields: Vec<Field>,
    pub direction: Direction,
}

impl Report {
    /// The length of this report on the wire in bytes, including
    /// the leading report ID byte if the report has one.
    pub fn byte_size(&self) -> usize {
        let prefix = if self.id.is_some() { 1 } else { 0 };
        prefix + (self.size + 7) / 8
    }

    // The caller has checked that `nbits` is non-zero and fits the report.
    fn reserve(&mut self, nbits: usize) -> RangeInclusive<usize> {
        let start = self.size;
        self.size += nbits;
        RangeInclusive::new(start, self.size - 1)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LogicalRange {
    pub minimum: LogicalMinimum,
    pub maximum: LogicalMaximum,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhysicalRange {
    pub minimum: PhysicalMinimum,
    pub maximum: PhysicalMaximum,
}

#[derive(Clone, Debug)]
pub enum Field {
    Variable(VariableField),
    Array(ArrayField),
    Constant(ConstantField),
}

impl Field {
    /// The bits of this field within its report
    pub fn bits(&self) -> &RangeInclusive<usize> {
        match self {
            Field::Variable(f) => &f.bits,
            Field::Array(f) => &f.bits,
            Field::Constant(f) => &f.bits,
        }
    }

    pub fn report_id(&self) -> Option<ReportId> {
        match self {
            Field::Variable(f) => f.report_id,
            Field::Array(f) => f.report_id,
            Field::Constant(f) => f.report_id,
        }
    }
}

#[derive(Clone, Debug)]
pub struct VariableField {
    pub usage: Usage,
    pub bits: RangeInclusive<usize>,
    pub logical_range: LogicalRange,
    pub physical_range: Option<PhysicalRange>,
    pub unit: Option<Unit>,
    pub unit_exponent: Option<UnitExponent>,
    pub collections: Vec<CollectionItem>,
    pub report_id: Option<ReportId>,
    pub direction: Direction,
}

#[derive(Clone, Debug)]
pub struct ArrayField {
    pub usages: Vec<Usage>,
    pub bits: RangeInclusive<usize>,
    pub logical_range: LogicalRange,
    pub physical_range: Option<PhysicalRange>,
    pub unit: Option<Unit>,
    pub unit_exponent: Option<UnitExponent>,
    pub collections: Vec<CollectionItem>,
    pub report_id: Option<ReportId>,
    pub direction: Direction,
}

#[derive(Clone, Debug)]
pub struct ConstantField {
    pub bits: RangeInclusive<usize>,
    pub report_id: Option<ReportId>,
    pub direction: Direction,
}
