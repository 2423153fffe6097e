// SPDX-License-Identifier: MIT

//! Types shared with the platform code that finds HID devices, exchanges
//! reports with them and reports devices coming and going.
//!
//! This crate provides no platform implementation. A backend (hidraw,
//! the Windows HID API, ...) implements [Enumerate], [ReportChannel] and
//! [EventReceiver] and uses [DeviceInfo::apply_report_descriptor] to
//! identify each device by its top-level usage.
//!
//! ```
//! # use hidrdesc::device::*;
//! let mut info = DeviceInfo::new("/dev/hidraw3");
//! info.apply_report_descriptor(&[0x06, 0xd0, 0xf1, 0x09, 0x01, 0xa1, 0x01, 0xc0]);
//! assert!(DeviceFilter::fido().matches(&info));
//! ```

use crate::decoder::top_level_usage;
use crate::types::{UsageId, UsagePage};
use crate::ParserError;

use log::debug;
use thiserror::Error;

/// The FIDO Alliance usage page, used by CTAPHID authenticators.
pub const FIDO_USAGE_PAGE: UsagePage = UsagePage(0xf1d0);
/// The CTAPHID usage in the [FIDO_USAGE_PAGE].
pub const FIDO_USAGE_CTAPHID: UsageId = UsageId(0x01);

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid report descriptor: {0}")]
    Descriptor(#[from] ParserError),
    #[error("Short write: {written} of {expected} bytes")]
    ShortWrite { expected: usize, written: usize },
}

pub type Result<T> = std::result::Result<T, DeviceError>;

/// Identity of a HID device interface.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Platform-specific path used to open the device
    pub path: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub serial_number: Option<String>,
    pub release_number: u16,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    /// Top-level Usage Page, see [DeviceInfo::apply_report_descriptor]
    pub usage_page: Option<UsagePage>,
    /// Top-level Usage
    pub usage: Option<UsageId>,
    pub interface_number: Option<u32>,
}

impl DeviceInfo {
    pub fn new(path: impl Into<String>) -> Self {
        DeviceInfo {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Fill in the top-level Usage Page and Usage from the device's report
    /// descriptor. Values already present are kept.
    ///
    /// Returns true if the report descriptor provided both.
    pub fn apply_report_descriptor(&mut self, bytes: &[u8]) -> bool {
        match top_level_usage(bytes) {
            Some(top) => {
                self.usage_page.get_or_insert(top.usage_page);
                self.usage.get_or_insert(top.usage_id);
                true
            }
            None => {
                debug!("{}: no top-level usage in report descriptor", self.path);
                false
            }
        }
    }
}

/// Selects devices by their top-level usage and, optionally, by
/// vendor and product ID. Unset criteria match any device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceFilter {
    pub usage_page: Option<UsagePage>,
    pub usage: Option<UsageId>,
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
}

impl DeviceFilter {
    /// Matches every device.
    pub fn any() -> Self {
        DeviceFilter::default()
    }

    pub fn usage(usage_page: UsagePage, usage: UsageId) -> Self {
        DeviceFilter {
            usage_page: Some(usage_page),
            usage: Some(usage),
            ..Default::default()
        }
    }

    /// FIDO authenticators speaking CTAPHID.
    pub fn fido() -> Self {
        DeviceFilter::usage(FIDO_USAGE_PAGE, FIDO_USAGE_CTAPHID)
    }

    pub fn with_vendor_id(self, vendor_id: u16) -> Self {
        DeviceFilter {
            vendor_id: Some(vendor_id),
            ..self
        }
    }

    pub fn with_product_id(self, product_id: u16) -> Self {
        DeviceFilter {
            product_id: Some(product_id),
            ..self
        }
    }

    pub fn matches(&self, info: &DeviceInfo) -> bool {
        fn check<T: PartialEq>(want: Option<T>, have: Option<T>) -> bool {
            want.is_none() || want == have
        }

        check(self.usage_page, info.usage_page)
            && check(self.usage, info.usage)
            && check(self.vendor_id, Some(info.vendor_id))
            && check(self.product_id, Some(info.product_id))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceEvent {
    Connected(DeviceInfo),
    Disconnected(DeviceInfo),
}

impl DeviceEvent {
    pub fn info(&self) -> &DeviceInfo {
        match self {
            DeviceEvent::Connected(info) | DeviceEvent::Disconnected(info) => info,
        }
    }

    /// The device path, the key to correlate connect and disconnect.
    pub fn path(&self) -> &str {
        &self.info().path
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, DeviceEvent::Connected(_))
    }
}

/// Lists the HID devices currently present.
pub trait Enumerate {
    fn enumerate(&self) -> Result<Vec<DeviceInfo>>;

    /// The devices matching the given filter.
    fn find(&self, filter: &DeviceFilter) -> Result<Vec<DeviceInfo>> {
        Ok(self
            .enumerate()?
            .into_iter()
            .filter(|info| filter.matches(info))
            .collect())
    }
}

/// An opened device. Reports are fixed-length, the first byte is the
/// Report ID or zero if the device does not use Report IDs.
pub trait ReportChannel {
    /// Read one report into `buf`, returning the number of bytes read.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write one report, returning the number of bytes written.
    fn write(&mut self, report: &[u8]) -> Result<usize>;

    /// Write one report and fail unless it was written in full.
    fn write_all(&mut self, report: &[u8]) -> Result<()> {
        let written = self.write(report)?;
        if written < report.len() {
            return Err(DeviceError::ShortWrite {
                expected: report.len(),
                written,
            });
        }
        Ok(())
    }
}

/// A source of [DeviceEvent]s.
pub trait EventReceiver {
    /// Block until the next event. Returns `None` once the receiver
    /// is closed and all pending events were delivered.
    fn next_event(&mut self) -> Option<DeviceEvent>;

    /// Stop listening. Closing more than once is not an error.
    fn close(&mut self) -> Result<()>;
}
