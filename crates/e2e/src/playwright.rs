//! Playwright browser automation
//!
//! Each scenario gets its own `node` process running a small bridge script.
//! The bridge owns one browser context and page and answers JSON-line
//! requests on stdin:
//!
//! ```text
//! -> {"id":3,"op":"click","locator":[{"by":"css","css":"#continue"}]}
//! <- {"id":3,"ok":true,"value":null}
//! ```
//!
//! Locator chains are resolved on the JS side with Playwright's own
//! `getByRole`/`getByLabel`/... so labels stay data on the Rust side.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::driver::{Browser, BrowserLauncher, Clipboard, Locator, UiDriver};
use crate::error::{E2eError, E2eResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserEngine {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserEngine {
    fn as_str(&self) -> &'static str {
        match self {
            BrowserEngine::Chromium => "chromium",
            BrowserEngine::Firefox => "firefox",
            BrowserEngine::Webkit => "webkit",
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub engine: BrowserEngine,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// One HAR file per test id is recorded here
    pub har_dir: PathBuf,
    /// Playwright's own per-action timeout
    pub action_timeout: Duration,
    /// Where `require('playwright')` resolves from
    pub node_modules: PathBuf,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            engine: BrowserEngine::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            har_dir: PathBuf::from("har"),
            action_timeout: Duration::from_secs(10),
            node_modules: PathBuf::from("node_modules"),
        }
    }
}

/// Check if Playwright is installed
pub fn check_playwright_installed() -> E2eResult<()> {
    let output = Command::new("npx")
        .args(["playwright", "--version"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match output {
        Ok(status) if status.success() => Ok(()),
        _ => Err(E2eError::PlaywrightNotFound),
    }
}

/// Launches one bridge process per scenario
pub struct PlaywrightLauncher {
    config: PlaywrightConfig,
}

impl PlaywrightLauncher {
    pub fn new(config: PlaywrightConfig) -> E2eResult<Self> {
        check_playwright_installed()?;
        std::fs::create_dir_all(&config.har_dir)?;
        Ok(Self { config })
    }

    fn bridge_args(&self, test_id: &str) -> E2eResult<String> {
        let har = self.config.har_dir.join(format!("{}.har", test_id));
        let args = BridgeArgs {
            engine: self.config.engine.as_str(),
            headless: self.config.headless,
            width: self.config.viewport_width,
            height: self.config.viewport_height,
            har: har.to_string_lossy().to_string(),
            timeout_ms: self.config.action_timeout.as_millis() as u64,
        };
        Ok(serde_json::to_string(&args)?)
    }
}

#[derive(Serialize)]
struct BridgeArgs {
    engine: &'static str,
    headless: bool,
    width: u32,
    height: u32,
    har: String,
    timeout_ms: u64,
}

#[async_trait]
impl BrowserLauncher for PlaywrightLauncher {
    async fn launch(&self, test_id: &str) -> E2eResult<Arc<dyn Browser>> {
        let dir = tempfile::tempdir()?;
        let script_path = dir.path().join("bridge.js");
        tokio::fs::write(&script_path, BRIDGE_SCRIPT).await?;

        let node_path = std::env::current_dir()?.join(&self.config.node_modules);
        debug!("starting Playwright bridge: {}", script_path.display());
        let mut child = TokioCommand::new("node")
            .arg(&script_path)
            .arg(self.bridge_args(test_id)?)
            .env("NODE_PATH", node_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Driver("bridge stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Driver("bridge stdout unavailable".into()))?;
        if let Some(stderr) = child.stderr.take() {
            let id = test_id.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(test_id = %id, "playwright: {}", line);
                }
            });
        }

        let page = PlaywrightPage {
            io: Mutex::new(BridgeIo {
                stdin,
                stdout: BufReader::new(stdout).lines(),
            }),
            child: Mutex::new(child),
            next_id: AtomicU64::new(1),
            reply_timeout: self.config.action_timeout + Duration::from_secs(20),
            _dir: dir,
        };
        page.request(BridgeRequest::op("ready")).await?;
        info!("browser page opened for {}", test_id);
        Ok(Arc::new(page))
    }
}

struct BridgeIo {
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

#[derive(Debug, Serialize)]
struct BridgeRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    op: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    locator: Option<&'a Locator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<&'a str>,
}

impl<'a> BridgeRequest<'a> {
    fn op(op: &'a str) -> Self {
        Self {
            id: None,
            op,
            locator: None,
            value: None,
        }
    }

    fn on(op: &'a str, locator: &'a Locator) -> Self {
        Self {
            locator: Some(locator),
            ..Self::op(op)
        }
    }

    fn with_value(mut self, value: &'a str) -> Self {
        self.value = Some(value);
        self
    }
}

#[derive(Debug, Deserialize)]
struct BridgeReply {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    error: Option<String>,
}

/// A live page behind a bridge process
pub struct PlaywrightPage {
    io: Mutex<BridgeIo>,
    child: Mutex<Child>,
    next_id: AtomicU64,
    reply_timeout: Duration,
    /// Holds the bridge script for the life of the process
    _dir: TempDir,
}

impl PlaywrightPage {
    async fn request(&self, mut request: BridgeRequest<'_>) -> E2eResult<serde_json::Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        request.id = Some(id);
        let mut line = serde_json::to_string(&request)?;
        line.push('\n');

        let mut io = self.io.lock().await;
        io.stdin.write_all(line.as_bytes()).await?;
        io.stdin.flush().await?;

        let reply = tokio::time::timeout(self.reply_timeout, read_reply(&mut io.stdout, id))
            .await
            .map_err(|_| E2eError::Driver(format!("no reply to '{}' within {:?}", request.op, self.reply_timeout)))??;
        if reply.ok {
            Ok(reply.value)
        } else {
            Err(E2eError::Driver(format!(
                "{} failed: {}",
                request.op,
                reply.error.unwrap_or_else(|| "unknown error".into())
            )))
        }
    }

    async fn request_string(&self, request: BridgeRequest<'_>) -> E2eResult<String> {
        Ok(match self.request(request).await? {
            serde_json::Value::String(s) => s,
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        })
    }

    async fn request_bool(&self, request: BridgeRequest<'_>) -> E2eResult<bool> {
        Ok(self.request(request).await?.as_bool().unwrap_or(false))
    }

    async fn stop_process(&self) {
        let mut child = self.child.lock().await;
        if let Ok(Ok(_)) = tokio::time::timeout(Duration::from_secs(10), child.wait()).await {
            return;
        }

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = child.id() {
                if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
                    && tokio::time::timeout(Duration::from_secs(3), child.wait()).await.is_ok()
                {
                    return;
                }
            }
        }

        warn!("Playwright bridge did not exit, killing it");
        let _ = child.kill().await;
    }
}

async fn read_reply(lines: &mut Lines<BufReader<ChildStdout>>, id: u64) -> E2eResult<BridgeReply> {
    loop {
        let line = lines
            .next_line()
            .await?
            .ok_or_else(|| E2eError::Driver("Playwright bridge exited".into()))?;
        match serde_json::from_str::<BridgeReply>(&line) {
            Ok(reply) if reply.id == id => return Ok(reply),
            Ok(reply) => debug!("dropping stale bridge reply {}", reply.id),
            Err(_) => debug!("playwright: {}", line),
        }
    }
}

#[async_trait]
impl UiDriver for PlaywrightPage {
    async fn goto(&self, url: &str) -> E2eResult<u16> {
        let status = self.request(BridgeRequest::op("goto").with_value(url)).await?;
        Ok(status.as_u64().unwrap_or(0) as u16)
    }

    async fn reload(&self) -> E2eResult<()> {
        self.request(BridgeRequest::op("reload")).await.map(|_| ())
    }

    async fn click(&self, locator: &Locator) -> E2eResult<()> {
        self.request(BridgeRequest::on("click", locator)).await.map(|_| ())
    }

    async fn fill(&self, locator: &Locator, value: &str) -> E2eResult<()> {
        self.request(BridgeRequest::on("fill", locator).with_value(value))
            .await
            .map(|_| ())
    }

    async fn check(&self, locator: &Locator) -> E2eResult<()> {
        self.request(BridgeRequest::on("check", locator)).await.map(|_| ())
    }

    async fn is_visible(&self, locator: &Locator) -> E2eResult<bool> {
        self.request_bool(BridgeRequest::on("is_visible", locator)).await
    }

    async fn count(&self, locator: &Locator) -> E2eResult<usize> {
        let n = self.request(BridgeRequest::on("count", locator)).await?;
        Ok(n.as_u64().unwrap_or(0) as usize)
    }

    async fn text_content(&self, locator: &Locator) -> E2eResult<String> {
        self.request_string(BridgeRequest::on("text_content", locator)).await
    }

    async fn get_attribute(&self, locator: &Locator, name: &str) -> E2eResult<Option<String>> {
        match self
            .request(BridgeRequest::on("get_attribute", locator).with_value(name))
            .await?
        {
            serde_json::Value::String(s) => Ok(Some(s)),
            _ => Ok(None),
        }
    }

    async fn close(&self) -> E2eResult<()> {
        // closing the context flushes the HAR file
        let result = self.request(BridgeRequest::op("close")).await.map(|_| ());
        self.stop_process().await;
        result
    }
}

#[async_trait]
impl Clipboard for PlaywrightPage {
    async fn read_clipboard(&self) -> E2eResult<String> {
        self.request_string(BridgeRequest::op("clipboard")).await
    }
}

const BRIDGE_SCRIPT: &str = r#"
const playwright = require('playwright');
const readline = require('readline');

const args = JSON.parse(process.argv[2]);

function resolve(page, chain) {
  let loc = page;
  for (const s of chain || []) {
    switch (s.by) {
      case 'css': loc = loc.locator(s.css); break;
      case 'role':
        loc = s.name ? loc.getByRole(s.role, { name: s.name, exact: s.exact }) : loc.getByRole(s.role);
        break;
      case 'placeholder': loc = loc.getByPlaceholder(s.text); break;
      case 'label': loc = loc.getByLabel(s.text, { exact: s.exact }); break;
      case 'text': loc = loc.getByText(s.text, { exact: s.exact }); break;
      case 'has_text': loc = loc.filter({ hasText: s.text }); break;
      case 'row': {
        const name = s.name.replace(/[.*+?^${}()|[\]\\]/g, '\\$&');
        const cell = new RegExp('^\\s*(\\d+-)?' + name + '\\s*$');
        loc = loc.getByRole('row').filter({ has: page.locator('td').filter({ hasText: cell }) });
        break;
      }
      case 'cell': loc = loc.getByRole('cell').nth(s.index); break;
      case 'nth': loc = loc.nth(s.index); break;
      default: throw new Error('unknown selector ' + s.by);
    }
  }
  return loc;
}

(async () => {
  const browser = await playwright[args.engine].launch({ headless: args.headless });
  const context = await browser.newContext({
    viewport: { width: args.width, height: args.height },
    recordHar: { path: args.har },
  });
  if (args.engine === 'chromium') {
    await context.grantPermissions(['clipboard-read', 'clipboard-write']);
  }
  const page = await context.newPage();
  page.setDefaultTimeout(args.timeout_ms);

  const reply = (msg) => process.stdout.write(JSON.stringify(msg) + '\n');
  const rl = readline.createInterface({ input: process.stdin });

  for await (const line of rl) {
    let req;
    try {
      req = JSON.parse(line);
    } catch (e) {
      continue;
    }
    try {
      let value = null;
      const loc = () => resolve(page, req.locator);
      switch (req.op) {
        case 'ready': break;
        case 'goto': {
          const resp = await page.goto(req.value);
          value = resp ? resp.status() : 0;
          break;
        }
        case 'reload': await page.reload(); break;
        case 'click': await loc().first().click(); break;
        case 'fill': await loc().first().fill(req.value); break;
        case 'check': await loc().first().check(); break;
        case 'is_visible': value = await loc().first().isVisible(); break;
        case 'count': value = await loc().count(); break;
        case 'text_content': value = (await loc().first().textContent()) || ''; break;
        case 'get_attribute': value = await loc().first().getAttribute(req.value); break;
        case 'clipboard': value = await page.evaluate(() => navigator.clipboard.readText()); break;
        case 'close':
          await context.close();
          await browser.close();
          process.stdout.write(JSON.stringify({ id: req.id, ok: true, value: null }) + '\n', () => process.exit(0));
          return;
        default: throw new Error('unknown op ' + req.op);
      }
      reply({ id: req.id, ok: true, value });
    } catch (error) {
      reply({ id: req.id, ok: false, error: error.message });
    }
  }
  await browser.close();
})().catch((error) => {
  console.error(error.stack || error.message);
  process.exit(1);
});
"#;
