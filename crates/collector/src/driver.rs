//! Browser driver abstraction
//!
//! The extractor and batch collector only ever talk to these traits. The
//! production implementation lives in [`crate::sidecar`]; tests substitute an
//! in-memory fake so the pipeline logic runs without a browser.

use std::time::Duration;

use async_trait::async_trait;
use exdiff_common::Result;

/// Addresses an element on a page.
///
/// Selectors may contain `>>>` shadow-piercing combinators. When `frame` is
/// set, `css` is resolved inside the content document of the iframe matched
/// by `frame`; shadow-piercing does not cross iframe boundaries, so the two
/// scoping mechanisms are separate.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Locator {
    pub frame: Option<String>,
    pub css: String,
}

impl Locator {
    /// Selector resolved against the top document
    pub fn css(css: impl Into<String>) -> Self {
        Self {
            frame: None,
            css: css.into(),
        }
    }

    /// Selector resolved inside an iframe's content document
    pub fn in_frame(frame: impl Into<String>, css: impl Into<String>) -> Self {
        Self {
            frame: Some(frame.into()),
            css: css.into(),
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.frame {
            Some(frame) => write!(f, "{} | {}", frame, self.css),
            None => write!(f, "{}", self.css),
        }
    }
}

/// One isolated browsing context with a single page.
///
/// Contexts do not share cookies, storage or any other state; each is owned
/// exclusively by one collection task and must be released with
/// [`Page::close`] when that task finishes, successfully or not.
#[async_trait]
pub trait Page: Send {
    /// Load `url`, failing with `NavigationTimeout` if the page does not
    /// settle within `timeout`
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()>;

    /// Wait until `locator` matches, failing with `ContainerNotFound` if it
    /// never appears within `timeout`
    async fn wait_for(&mut self, locator: &Locator, timeout: Duration) -> Result<()>;

    /// Click the first match of `locator`
    async fn click(&mut self, locator: &Locator) -> Result<()>;

    /// Click the `index`-th match of `locator`
    async fn click_nth(&mut self, locator: &Locator, index: usize) -> Result<()>;

    /// Trimmed text content of every match of `locator`, joined with
    /// newlines; empty string when nothing matches
    async fn text(&mut self, locator: &Locator) -> Result<String>;

    /// Number of elements matching `locator`
    async fn count(&mut self, locator: &Locator) -> Result<usize>;

    /// PNG screenshot cropped to the bounding box of the first match
    async fn screenshot(&mut self, locator: &Locator) -> Result<Vec<u8>>;

    /// Release the browsing context
    async fn close(&mut self) -> Result<()>;
}

/// A running browser that can hand out isolated contexts.
///
/// One browser is opened per collection run and shared by every batch; it is
/// torn down once after the last batch completes.
#[async_trait]
pub trait Browser: Send + Sync {
    async fn open_context(&self) -> Result<Box<dyn Page>>;

    async fn close(&self) -> Result<()>;
}
