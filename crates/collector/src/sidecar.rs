//! Puppeteer sidecar driver
//!
//! Production implementation of the [`Browser`]/[`Page`] traits. A single
//! long-lived `node` process runs an embedded puppeteer driver script and is
//! spoken to over a JSON-lines protocol on stdin/stdout: every request carries
//! a monotonically increasing id, responses are routed back to the issuing
//! task through oneshot channels, so any number of contexts can be driven
//! concurrently over the one pipe. The puppeteer browser inside the sidecar
//! is launched once and shared by all contexts for the process lifetime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command as TokioCommand};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use exdiff_common::{Error, Result};

use crate::driver::{Browser, Locator, Page};

/// Browser engine run inside the sidecar
#[derive(Debug, Clone, Copy, Default)]
pub enum BrowserKind {
    #[default]
    Chrome,
    Firefox,
}

impl BrowserKind {
    fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Chrome => "chrome",
            BrowserKind::Firefox => "firefox",
        }
    }
}

/// Configuration for the sidecar driver
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Node binary used to run the driver script
    pub node_binary: String,

    /// Browser engine
    pub browser: BrowserKind,

    /// Run the browser headless
    pub headless: bool,

    /// Viewport dimensions
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Wait applied to element lookups that carry no explicit timeout
    pub default_timeout: Duration,

    /// How long to wait for the sidecar and its browser to come up
    pub startup_timeout: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            node_binary: "node".to_string(),
            browser: BrowserKind::Chrome,
            headless: true,
            viewport_width: 1250,
            viewport_height: 1300,
            default_timeout: Duration::from_secs(10),
            startup_timeout: Duration::from_secs(30),
        }
    }
}

/// A response line from the driver process
#[derive(Debug, Deserialize)]
struct DriverResponse {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// A failed driver call, before being mapped to a typed error
#[derive(Debug)]
struct DriverFailure {
    code: String,
    message: String,
}

impl DriverFailure {
    fn transport(message: impl Into<String>) -> Self {
        Self {
            code: "io".to_string(),
            message: message.into(),
        }
    }
}

type Pending = HashMap<u64, oneshot::Sender<DriverResponse>>;

struct DriverProcess {
    stdin: tokio::sync::Mutex<ChildStdin>,
    child: tokio::sync::Mutex<Child>,
    pid: Option<u32>,
    pending: Arc<Mutex<Pending>>,
    next_id: AtomicU64,
    default_timeout: Duration,
    // Holds the staged driver script for the process lifetime
    _stage_dir: tempfile::TempDir,
}

impl DriverProcess {
    async fn call(&self, op: &str, params: Value) -> std::result::Result<Value, DriverFailure> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .expect("pending map poisoned")
            .insert(id, tx);

        let line = json!({ "id": id, "op": op, "params": params }).to_string() + "\n";
        {
            let mut stdin = self.stdin.lock().await;
            if let Err(e) = stdin.write_all(line.as_bytes()).await {
                self.pending.lock().expect("pending map poisoned").remove(&id);
                return Err(DriverFailure::transport(format!(
                    "failed to write to driver: {}",
                    e
                )));
            }
        }

        match rx.await {
            Ok(resp) if resp.ok => Ok(resp.value),
            Ok(resp) => Err(DriverFailure {
                code: resp.code.unwrap_or_else(|| "driver".to_string()),
                message: resp.error.unwrap_or_else(|| "unknown driver error".to_string()),
            }),
            Err(_) => Err(DriverFailure::transport("driver process exited")),
        }
    }
}

/// Handle to the sidecar browser
pub struct PuppeteerBrowser {
    inner: Arc<DriverProcess>,
}

impl PuppeteerBrowser {
    /// Spawn the sidecar and wait until its browser is up
    pub async fn launch(config: DriverConfig) -> Result<Self> {
        Self::check_node_installed(&config.node_binary)?;

        let stage_dir = tempfile::tempdir()?;
        let script_path = stage_dir.path().join("driver.js");
        std::fs::write(&script_path, DRIVER_JS)?;

        let driver_config = json!({
            "browser": config.browser.as_str(),
            "headless": config.headless,
            "width": config.viewport_width,
            "height": config.viewport_height,
        });

        debug!("spawning sidecar: {} {}", config.node_binary, script_path.display());

        let mut child = TokioCommand::new(&config.node_binary)
            .arg(&script_path)
            .arg(driver_config.to_string())
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Driver(format!("failed to spawn {}: {}", config.node_binary, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Driver("driver stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Driver("driver stdout unavailable".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Driver("driver stderr unavailable".to_string()))?;

        let pending: Arc<Mutex<Pending>> = Arc::new(Mutex::new(HashMap::new()));

        // Response router: every stdout line is a reply keyed by request id
        let router = Arc::clone(&pending);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match serde_json::from_str::<DriverResponse>(&line) {
                    Ok(resp) => {
                        let tx = router.lock().expect("pending map poisoned").remove(&resp.id);
                        if let Some(tx) = tx {
                            let _ = tx.send(resp);
                        } else {
                            debug!("driver response for unknown id {}", resp.id);
                        }
                    }
                    Err(_) => debug!("driver: {}", line),
                }
            }
            // Pipe closed: fail everything still in flight
            router.lock().expect("pending map poisoned").clear();
        });

        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("driver stderr: {}", line);
            }
        });

        let pid = child.id();
        let inner = Arc::new(DriverProcess {
            stdin: tokio::sync::Mutex::new(stdin),
            child: tokio::sync::Mutex::new(child),
            pid,
            pending,
            next_id: AtomicU64::new(1),
            default_timeout: config.default_timeout,
            _stage_dir: stage_dir,
        });

        // The driver answers the first request only once its browser is up
        let ready = tokio::time::timeout(config.startup_timeout, inner.call("ping", json!({})));
        match ready.await {
            Ok(Ok(_)) => {
                info!("browser sidecar is up (pid: {:?})", pid);
                Ok(Self { inner })
            }
            Ok(Err(f)) => Err(Error::Driver(format!("browser failed to start: {}", f.message))),
            Err(_) => Err(Error::Driver(format!(
                "browser did not start within {:?}",
                config.startup_timeout
            ))),
        }
    }

    /// Check that node is available before doing any work
    fn check_node_installed(node_binary: &str) -> Result<()> {
        let status = std::process::Command::new(node_binary)
            .arg("--version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(Error::DriverNotFound),
        }
    }
}

#[async_trait]
impl Browser for PuppeteerBrowser {
    async fn open_context(&self) -> Result<Box<dyn Page>> {
        let value = self
            .inner
            .call("open_context", json!({}))
            .await
            .map_err(|f| Error::Driver(f.message))?;
        let ctx = value
            .as_str()
            .ok_or_else(|| Error::Driver("driver returned no context id".to_string()))?
            .to_string();

        Ok(Box::new(PuppeteerPage {
            driver: Arc::clone(&self.inner),
            ctx,
            url: String::new(),
        }))
    }

    async fn close(&self) -> Result<()> {
        if let Err(f) = self.inner.call("shutdown", json!({})).await {
            debug!("driver shutdown request failed: {}", f.message);
        }

        let mut child = self.inner.child.lock().await;
        match tokio::time::timeout(Duration::from_secs(5), child.wait()).await {
            Ok(Ok(status)) => {
                debug!("sidecar exited: {}", status);
                return Ok(());
            }
            Ok(Err(e)) => warn!("waiting for sidecar failed: {}", e),
            Err(_) => warn!("sidecar did not exit after shutdown request"),
        }

        // Graceful SIGTERM first, then force kill
        #[cfg(unix)]
        if let Some(pid) = self.inner.pid {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok() {
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }

        let _ = child.kill().await;
        Ok(())
    }
}

/// One isolated incognito context in the sidecar browser
struct PuppeteerPage {
    driver: Arc<DriverProcess>,
    ctx: String,
    url: String,
}

impl PuppeteerPage {
    fn timeout_ms(&self, timeout: Duration) -> u64 {
        timeout.as_millis() as u64
    }
}

#[async_trait]
impl Page for PuppeteerPage {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
        self.url = url.to_string();
        let params = json!({
            "ctx": self.ctx,
            "url": url,
            "timeout_ms": self.timeout_ms(timeout),
        });
        self.driver.call("navigate", params).await.map_err(|f| {
            if f.code == "timeout" {
                Error::NavigationTimeout {
                    url: url.to_string(),
                    seconds: timeout.as_secs(),
                }
            } else {
                Error::Driver(f.message)
            }
        })?;
        Ok(())
    }

    async fn wait_for(&mut self, locator: &Locator, timeout: Duration) -> Result<()> {
        let params = json!({
            "ctx": self.ctx,
            "locator": locator,
            "timeout_ms": self.timeout_ms(timeout),
        });
        self.driver.call("wait_for", params).await.map_err(|f| {
            if f.code == "timeout" || f.code == "not_found" {
                Error::ContainerNotFound {
                    selector: locator.to_string(),
                    url: self.url.clone(),
                }
            } else {
                Error::Driver(f.message)
            }
        })?;
        Ok(())
    }

    async fn click(&mut self, locator: &Locator) -> Result<()> {
        let params = json!({
            "ctx": self.ctx,
            "locator": locator,
            "timeout_ms": self.timeout_ms(self.driver.default_timeout),
        });
        self.driver
            .call("click", params)
            .await
            .map_err(|f| Error::Driver(f.message))?;
        Ok(())
    }

    async fn click_nth(&mut self, locator: &Locator, index: usize) -> Result<()> {
        let params = json!({
            "ctx": self.ctx,
            "locator": locator,
            "index": index,
            "timeout_ms": self.timeout_ms(self.driver.default_timeout),
        });
        self.driver
            .call("click_nth", params)
            .await
            .map_err(|f| Error::Driver(f.message))?;
        Ok(())
    }

    async fn text(&mut self, locator: &Locator) -> Result<String> {
        let params = json!({
            "ctx": self.ctx,
            "locator": locator,
            "timeout_ms": self.timeout_ms(self.driver.default_timeout),
        });
        let value = self
            .driver
            .call("text", params)
            .await
            .map_err(|f| Error::Driver(f.message))?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn count(&mut self, locator: &Locator) -> Result<usize> {
        let params = json!({
            "ctx": self.ctx,
            "locator": locator,
            "timeout_ms": self.timeout_ms(self.driver.default_timeout),
        });
        let value = self
            .driver
            .call("count", params)
            .await
            .map_err(|f| Error::Driver(f.message))?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn screenshot(&mut self, locator: &Locator) -> Result<Vec<u8>> {
        let params = json!({
            "ctx": self.ctx,
            "locator": locator,
            "timeout_ms": self.timeout_ms(self.driver.default_timeout),
        });
        let value = self
            .driver
            .call("screenshot", params)
            .await
            .map_err(|f| Error::Driver(f.message))?;
        let encoded = value
            .as_str()
            .ok_or_else(|| Error::Driver("driver returned no screenshot data".to_string()))?;
        BASE64
            .decode(encoded)
            .map_err(|e| Error::Driver(format!("invalid screenshot payload: {}", e)))
    }

    async fn close(&mut self) -> Result<()> {
        self.driver
            .call("close_context", json!({ "ctx": self.ctx }))
            .await
            .map_err(|f| Error::Driver(f.message))?;
        Ok(())
    }
}

/// The puppeteer program run by the sidecar. Requests arrive as JSON lines on
/// stdin and are answered on stdout; `>>>` combinators in selectors pierce
/// shadow roots, the optional `frame` field scopes a selector to an iframe's
/// content document.
const DRIVER_JS: &str = r##"
const puppeteer = require("puppeteer");
const readline = require("node:readline");

const cfg = JSON.parse(process.argv[2] || "{}");

const browserPromise = puppeteer.launch({
  browser: cfg.browser || "chrome",
  headless: cfg.headless !== false,
  defaultViewport: {
    width: cfg.width || 1250,
    height: cfg.height || 1300,
    isMobile: false,
    deviceScaleFactor: 1,
  },
});

const contexts = new Map();
let nextCtx = 1;

function tagged(code, message) {
  const err = new Error(message);
  err.code = code;
  return err;
}

function pageOf(ctx) {
  const entry = contexts.get(ctx);
  if (!entry) {
    throw tagged("driver", `unknown context ${ctx}`);
  }
  return entry.page;
}

// Resolve the document a locator addresses: the top document, or the content
// document of the iframe named by `locator.frame`.
async function scopeFor(page, locator, timeoutMs) {
  if (!locator.frame) {
    return page;
  }
  const frameEl = await page.waitForSelector(locator.frame, { timeout: timeoutMs });
  const frame = await frameEl.contentFrame();
  if (!frame) {
    throw tagged("not_found", `no content document for ${locator.frame}`);
  }
  return frame;
}

async function dispatch(op, params) {
  const browser = await browserPromise;

  switch (op) {
    case "ping":
      return "pong";

    case "open_context": {
      const context = await browser.createBrowserContext();
      const page = await context.newPage();
      const ctx = String(nextCtx++);
      contexts.set(ctx, { context, page });
      return ctx;
    }

    case "close_context": {
      const entry = contexts.get(params.ctx);
      if (entry) {
        contexts.delete(params.ctx);
        await entry.context.close();
      }
      return null;
    }

    case "navigate": {
      const page = pageOf(params.ctx);
      await page.goto(params.url, { timeout: params.timeout_ms });
      return null;
    }

    case "wait_for": {
      const page = pageOf(params.ctx);
      const scope = await scopeFor(page, params.locator, params.timeout_ms);
      await scope.waitForSelector(params.locator.css, { timeout: params.timeout_ms });
      return null;
    }

    case "click": {
      const page = pageOf(params.ctx);
      const scope = await scopeFor(page, params.locator, params.timeout_ms);
      const el = await scope.waitForSelector(params.locator.css, { timeout: params.timeout_ms });
      await el.click();
      return null;
    }

    case "click_nth": {
      const page = pageOf(params.ctx);
      const scope = await scopeFor(page, params.locator, params.timeout_ms);
      const els = await scope.$$(params.locator.css);
      if (params.index >= els.length) {
        throw tagged("not_found", `only ${els.length} matches for ${params.locator.css}`);
      }
      await els[params.index].click();
      return null;
    }

    case "text": {
      const page = pageOf(params.ctx);
      const scope = await scopeFor(page, params.locator, params.timeout_ms);
      const els = await scope.$$(params.locator.css);
      const parts = await Promise.all(
        els.map((el) => el.evaluate((node) => (node.textContent || "").trim()))
      );
      return parts.join("\n");
    }

    case "count": {
      const page = pageOf(params.ctx);
      const scope = await scopeFor(page, params.locator, params.timeout_ms);
      const els = await scope.$$(params.locator.css);
      return els.length;
    }

    case "screenshot": {
      const page = pageOf(params.ctx);
      const scope = await scopeFor(page, params.locator, params.timeout_ms);
      const el = await scope.waitForSelector(params.locator.css, { timeout: params.timeout_ms });
      const box = await el.boundingBox();
      if (!box) {
        throw tagged("not_found", `no bounding box for ${params.locator.css}`);
      }
      return await page.screenshot({
        clip: box,
        captureBeyondViewport: true,
        encoding: "base64",
      });
    }

    case "shutdown": {
      setImmediate(async () => {
        try {
          await browser.close();
        } finally {
          process.exit(0);
        }
      });
      return null;
    }

    default:
      throw tagged("driver", `unknown op ${op}`);
  }
}

function respond(obj) {
  process.stdout.write(JSON.stringify(obj) + "\n");
}

async function handle(line) {
  let msg;
  try {
    msg = JSON.parse(line);
  } catch {
    return;
  }
  try {
    const value = await dispatch(msg.op, msg.params || {});
    respond({ id: msg.id, ok: true, value });
  } catch (err) {
    const code = err.code || (err.name === "TimeoutError" ? "timeout" : "driver");
    respond({ id: msg.id, ok: false, code, error: String((err && err.message) || err) });
  }
}

const rl = readline.createInterface({ input: process.stdin });
rl.on("line", (line) => {
  handle(line);
});
rl.on("close", async () => {
  try {
    const browser = await browserPromise;
    await browser.close();
  } finally {
    process.exit(0);
  }
});
"##;
