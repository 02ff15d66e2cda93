//! Report output and delivery
//!
//! This module provides:
//! - An HTTP client posting reports to the Anchore inventory endpoint
//! - A dispatcher deciding per report whether to print, deliver or skip

mod client;
mod dispatcher;

pub use client::{build_url, DeliveryClient, DeliveryError, ACCOUNT_HEADER, REPORT_API_PATH};
pub use dispatcher::{DispatchError, DispatchOptions, DispatchOutcome, ReportDispatcher};
