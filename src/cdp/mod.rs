//! chromiumoxide による [`crate::Driver`] 実装

mod driver;

pub use driver::{CdpConfig, CdpDriver, CdpElement};
