//! Extraction state machine
//!
//! One extraction drives a page through `Navigate → LocateContainer →
//! TriggerExecution → AwaitPopulation → Capture` (text mode) or `Navigate →
//! LocateContainer → settle → per-choice Capture` (visual mode). The two
//! renderer generations expose the example through different markup: the old
//! generation embeds a plain iframe, the new generation nests the runner and
//! output surface inside a shadow-DOM custom element.
//!
//! Everything that can go wrong inside the browser is converted to an
//! [`ExtractionResult::Error`] here; no error crosses this boundary.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use exdiff_common::{ExtractionResult, Mode, Result, Variant};

use crate::driver::{Locator, Page};

/// Bounded retry policy for polling the console surface.
///
/// Attempt `n` waits `n * base_delay` before reading, so the total wait grows
/// linearly while early output is picked up quickly. Tests inject a
/// zero-delay policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// Policy without delays, for tests
    pub fn immediate() -> Self {
        Self {
            max_attempts: 6,
            base_delay: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Configuration for the extractor
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Bound on page navigation
    pub nav_timeout: Duration,

    /// Bound on waiting for the embedding surface to appear
    pub wait_timeout: Duration,

    /// Fixed delay letting CSS transitions finish before a screenshot
    pub settle: Duration,

    /// Console polling policy
    pub retry: RetryPolicy,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            nav_timeout: Duration::from_secs(10),
            wait_timeout: Duration::from_secs(10),
            settle: Duration::from_millis(500),
            retry: RetryPolicy::default(),
        }
    }
}

/// Variant-specific DOM locations behind a shared polling/capture contract
fn container(variant: Variant) -> Locator {
    match variant {
        Variant::Old => Locator::css("iframe.interactive"),
        Variant::New => Locator::css("interactive-example"),
    }
}

fn run_button(variant: Variant) -> Locator {
    match variant {
        Variant::Old => Locator::in_frame("iframe.interactive", "#execute"),
        Variant::New => Locator::css("interactive-example >>> play-controller >>> #execute"),
    }
}

fn console_output(variant: Variant) -> Locator {
    match variant {
        Variant::Old => Locator::in_frame("iframe.interactive", "#console"),
        Variant::New => Locator::css("interactive-example >>> #console ul li"),
    }
}

fn output_surface(variant: Variant) -> Locator {
    match variant {
        Variant::Old => Locator::in_frame("iframe.interactive", "#output-iframe"),
        Variant::New => Locator::css("interactive-example >>> play-runner >>> iframe"),
    }
}

fn choices(variant: Variant) -> Locator {
    match variant {
        Variant::Old => Locator::in_frame("iframe.interactive", ".example-choice"),
        Variant::New => Locator::css("interactive-example >>> .example-choice"),
    }
}

/// Extracts console text or screenshots from one rendered example page
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    config: ExtractorConfig,
}

impl Extractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Run one extraction. Failures come back as data, never as `Err`.
    pub async fn extract(
        &self,
        page: &mut dyn Page,
        url: &str,
        variant: Variant,
        mode: Mode,
    ) -> ExtractionResult {
        match self.run(page, url, variant, mode).await {
            Ok(result) => result,
            Err(e) => {
                warn!("extraction failed for {}: {}", url, e);
                ExtractionResult::Error {
                    message: format!("{} ({})", e, url),
                }
            }
        }
    }

    async fn run(
        &self,
        page: &mut dyn Page,
        url: &str,
        variant: Variant,
        mode: Mode,
    ) -> Result<ExtractionResult> {
        debug!("extracting {} ({}, {:?})", url, variant, mode);
        page.navigate(url, self.config.nav_timeout).await?;
        page.wait_for(&container(variant), self.config.wait_timeout)
            .await?;

        match mode {
            Mode::Text => self.capture_console(page, variant).await,
            Mode::Visual => self.capture_screens(page, variant).await,
        }
    }

    /// Click the run control once, then poll the console surface until
    /// output appears or the retry budget is spent. Script completion time is
    /// unbounded in principle but practically small.
    async fn capture_console(
        &self,
        page: &mut dyn Page,
        variant: Variant,
    ) -> Result<ExtractionResult> {
        page.click(&run_button(variant)).await?;

        let surface = console_output(variant);
        for attempt in 1..=self.config.retry.max_attempts {
            sleep(self.config.retry.delay_for(attempt)).await;
            let text = page.text(&surface).await?;
            let text = text.trim();
            if !text.is_empty() {
                return Ok(ExtractionResult::Text {
                    text: text.to_string(),
                });
            }
            debug!(
                "console empty on attempt {}/{}",
                attempt, self.config.retry.max_attempts
            );
        }

        // Recorded as-is; an empty pair is not reported as a divergence
        Ok(ExtractionResult::Text {
            text: String::new(),
        })
    }

    /// Wait out CSS transitions, then capture the output surface once per UI
    /// choice variant (or once when the example has no choices).
    async fn capture_screens(
        &self,
        page: &mut dyn Page,
        variant: Variant,
    ) -> Result<ExtractionResult> {
        sleep(self.config.settle).await;

        let surface = output_surface(variant);
        page.wait_for(&surface, self.config.wait_timeout).await?;

        let choice_list = choices(variant);
        let n = page.count(&choice_list).await?;

        let mut buffers = Vec::new();
        if n == 0 {
            buffers.push(page.screenshot(&surface).await?);
        } else {
            debug!("capturing {} choice variants", n);
            for index in 0..n {
                page.click_nth(&choice_list, index).await?;
                sleep(self.config.settle).await;
                buffers.push(page.screenshot(&surface).await?);
            }
        }

        Ok(ExtractionResult::Images { buffers })
    }
}
