//! exdiff Collector
//!
//! Drives a headless browser against the old and new deployment of each
//! comparison target and assembles per-target records. The browser itself is
//! reached through the [`driver::Browser`] / [`driver::Page`] traits; the
//! production implementation is a long-lived puppeteer sidecar process.

pub mod batch;
pub mod driver;
pub mod extract;
pub mod sidecar;

pub use batch::{collect, CollectorConfig};
pub use driver::{Browser, Locator, Page};
pub use extract::{Extractor, ExtractorConfig, RetryPolicy};
pub use sidecar::{BrowserKind, DriverConfig, PuppeteerBrowser};

#[cfg(test)]
pub(crate) mod testing;
