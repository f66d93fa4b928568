//! In-memory scripted fake of the driver traits for unit tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use exdiff_common::{Error, Result};

use crate::driver::{Browser, Locator, Page};

/// Scripted behavior for one URL
#[derive(Debug, Clone)]
pub struct PageScript {
    console: Option<String>,
    ready_after_polls: u32,
    missing_container: bool,
    nav_timeout: bool,
    choices: usize,
    delay: Duration,
}

impl Default for PageScript {
    fn default() -> Self {
        Self {
            console: Some("console-ok".to_string()),
            ready_after_polls: 0,
            missing_container: false,
            nav_timeout: false,
            choices: 0,
            delay: Duration::ZERO,
        }
    }
}

impl PageScript {
    pub fn console(text: &str) -> Self {
        Self {
            console: Some(text.to_string()),
            ..Self::default()
        }
    }

    pub fn screenshots(choices: usize) -> Self {
        Self {
            console: None,
            choices,
            ..Self::default()
        }
    }

    pub fn missing_container() -> Self {
        Self {
            missing_container: true,
            ..Self::default()
        }
    }

    pub fn navigation_timeout() -> Self {
        Self {
            nav_timeout: true,
            ..Self::default()
        }
    }

    /// Number of empty console polls before output appears
    pub fn ready_after_polls(mut self, polls: u32) -> Self {
        self.ready_after_polls = polls;
        self
    }

    /// Delay applied on navigation, to vary completion order inside a batch
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Observable lifecycle events, in the order they happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Opened,
    Navigated(String),
    Closed,
}

#[derive(Default)]
struct MockState {
    scripts: HashMap<String, PageScript>,
    events: Vec<Event>,
    open_failures: usize,
    open_count: usize,
    close_count: usize,
}

/// Browser fake handing out scripted pages
#[derive(Clone, Default)]
pub struct MockBrowser {
    state: Arc<Mutex<MockState>>,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, url: &str, script: PageScript) {
        self.state
            .lock()
            .unwrap()
            .scripts
            .insert(url.to_string(), script);
    }

    /// Make the next `n` open_context calls fail
    pub fn fail_next_opens(&self, n: usize) {
        self.state.lock().unwrap().open_failures = n;
    }

    /// A page outside any context bookkeeping, for extractor tests
    pub fn page(&self) -> Box<dyn Page> {
        Box::new(MockPage {
            state: Arc::clone(&self.state),
            current: None,
            current_url: String::new(),
            polls: 0,
            shots: 0,
        })
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().unwrap().open_count
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().unwrap().close_count
    }
}

#[async_trait]
impl Browser for MockBrowser {
    async fn open_context(&self) -> Result<Box<dyn Page>> {
        {
            let mut state = self.state.lock().unwrap();
            if state.open_failures > 0 {
                state.open_failures -= 1;
                return Err(Error::Driver("context open refused".to_string()));
            }
            state.open_count += 1;
            state.events.push(Event::Opened);
        }
        Ok(self.page())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

struct MockPage {
    state: Arc<Mutex<MockState>>,
    current: Option<PageScript>,
    current_url: String,
    polls: u32,
    shots: u8,
}

#[async_trait]
impl Page for MockPage {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
        let script = {
            let mut state = self.state.lock().unwrap();
            state.events.push(Event::Navigated(url.to_string()));
            state.scripts.get(url).cloned().unwrap_or_default()
        };

        if script.delay > Duration::ZERO {
            tokio::time::sleep(script.delay).await;
        }
        if script.nav_timeout {
            return Err(Error::NavigationTimeout {
                url: url.to_string(),
                seconds: timeout.as_secs(),
            });
        }

        self.current_url = url.to_string();
        self.current = Some(script);
        self.polls = 0;
        Ok(())
    }

    async fn wait_for(&mut self, locator: &Locator, _timeout: Duration) -> Result<()> {
        let script = self.current.as_ref().ok_or_else(not_navigated)?;
        if script.missing_container {
            return Err(Error::ContainerNotFound {
                selector: locator.to_string(),
                url: self.current_url.clone(),
            });
        }
        Ok(())
    }

    async fn click(&mut self, _locator: &Locator) -> Result<()> {
        self.current.as_ref().ok_or_else(not_navigated)?;
        Ok(())
    }

    async fn click_nth(&mut self, _locator: &Locator, _index: usize) -> Result<()> {
        self.current.as_ref().ok_or_else(not_navigated)?;
        Ok(())
    }

    async fn text(&mut self, _locator: &Locator) -> Result<String> {
        let script = self.current.as_ref().ok_or_else(not_navigated)?;
        self.polls += 1;
        if self.polls > script.ready_after_polls {
            Ok(script.console.clone().unwrap_or_default())
        } else {
            Ok(String::new())
        }
    }

    async fn count(&mut self, _locator: &Locator) -> Result<usize> {
        let script = self.current.as_ref().ok_or_else(not_navigated)?;
        Ok(script.choices)
    }

    async fn screenshot(&mut self, _locator: &Locator) -> Result<Vec<u8>> {
        self.current.as_ref().ok_or_else(not_navigated)?;
        self.shots += 1;
        Ok(vec![0x89, b'M', b'K', self.shots])
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.close_count += 1;
        state.events.push(Event::Closed);
        Ok(())
    }
}

fn not_navigated() -> Error {
    Error::Driver("page used before navigation".to_string())
}
