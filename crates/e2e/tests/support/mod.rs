//! In-memory console and shell doubles shared by the integration tests.
//!
//! `FakeConsole` interprets locator chains against a handful of listing
//! tables. Rows move Provisioning -> Ready on a timer and disappear a while
//! after a delete is confirmed with their rendered name. All timing uses the
//! tokio clock, so tests run with `start_paused`.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use cloudprobe_common::AccountTier;
use cloudprobe_e2e::driver::{Browser, BrowserLauncher, Clipboard, Locator, Selector, UiDriver};
use cloudprobe_e2e::session::{Identity, Session};
use cloudprobe_e2e::shell::{ShellCommand, ShellOutput, ShellRunner};
use cloudprobe_e2e::{E2eError, E2eResult, EnvironmentSpec, ScenarioContext};

pub const INSTANCES: &str = "Instances";
pub const KEYS: &str = "Keys";
pub const PREVIEW_INSTANCES: &str = "Preview Instances";
pub const PREVIEW_KEYS: &str = "Preview Keys";
pub const FILE_STORAGE: &str = "File Storage";
pub const OBJECT_STORAGE: &str = "Object Storage";
pub const PRINCIPALS: &str = "Manage principals and permissions";

const TABLES: [&str; 7] = [
    INSTANCES,
    KEYS,
    PREVIEW_INSTANCES,
    PREVIEW_KEYS,
    FILE_STORAGE,
    OBJECT_STORAGE,
    PRINCIPALS,
];

const SUBMIT_LABELS: [&str; 4] = ["Launch instance", "Request instance", "Launch", "Create"];

pub const CONNECT_LINE: &str = "ssh -J guest@146.152.232.8 ubuntu@100.80.195.99";

#[derive(Debug, Clone)]
struct FakeRow {
    name: String,
    rendered: String,
    ready_at: Instant,
    gone_at: Option<Instant>,
    /// Delete confirmed but the page keeps showing the old state
    stale: bool,
    /// Delete confirmed but the backend never finishes
    stuck: bool,
}

impl FakeRow {
    /// The name cell reads `name`, possibly behind a numeric account prefix
    fn is_named(&self, name: &str) -> bool {
        if self.name == name || self.rendered == name {
            return true;
        }
        self.rendered
            .strip_suffix(name)
            .and_then(|prefix| prefix.strip_suffix('-'))
            .map(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false)
    }
}

struct ConsoleState {
    tables: HashMap<String, Vec<FakeRow>>,
    current: Option<String>,
    hidden: HashSet<String>,
    fills: Vec<(String, String)>,
    clicks: Vec<String>,
    checks: Vec<String>,
    observed: Vec<(String, String)>,
    pending_delete: Option<(String, String)>,
    confirmations: Vec<String>,
    reloads: usize,
    closed: bool,
    clipboard: VecDeque<String>,
    texts: Vec<(String, String)>,
    prefixes: HashMap<String, String>,
    provision_delay: Duration,
    delete_delay: Duration,
    stale_deletes: bool,
    stuck_deletes: bool,
}

fn terminating_label(table: &str) -> &'static str {
    if table == INSTANCES || table == PREVIEW_INSTANCES {
        "Terminating"
    } else {
        "Deleting"
    }
}

impl ConsoleState {
    fn purge(&mut self) {
        let now = Instant::now();
        for rows in self.tables.values_mut() {
            rows.retain(|r| r.stuck || r.stale || r.gone_at.map(|t| t > now).unwrap_or(true));
        }
    }

    fn rows(&self) -> &[FakeRow] {
        self.current
            .as_ref()
            .and_then(|t| self.tables.get(t))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn find(&self, name: &str) -> Option<&FakeRow> {
        self.rows().iter().find(|r| r.is_named(name))
    }

    fn status_of(&self, row: &FakeRow) -> String {
        let table = self.current.clone().unwrap_or_default();
        if row.gone_at.is_some() && !row.stale {
            terminating_label(&table).to_string()
        } else if Instant::now() < row.ready_at {
            "Provisioning".to_string()
        } else {
            "Ready".to_string()
        }
    }

    fn last_fill(&self, pred: impl Fn(&str) -> bool) -> Option<String> {
        self.fills.iter().rev().find(|(loc, _)| pred(loc)).map(|(_, v)| v.clone())
    }

    fn add_row(&mut self, table: &str, name: String, ready_at: Instant) {
        let prefix = self.prefixes.get(table).cloned().unwrap_or_default();
        let row = FakeRow {
            rendered: format!("{}{}", prefix, name),
            name,
            ready_at,
            gone_at: None,
            stale: false,
            stuck: false,
        };
        self.tables.entry(table.to_string()).or_default().push(row);
    }

    fn confirm_delete(&mut self) {
        let Some((table, text)) = self.pending_delete.take() else {
            return;
        };
        let typed = self
            .last_fill(|loc| loc.starts_with("div.modal-body >> placeholder="))
            .unwrap_or_default();
        self.confirmations.push(typed.clone());

        let gone_at = Instant::now() + self.delete_delay;
        let (stale, stuck) = (self.stale_deletes, self.stuck_deletes);
        if let Some(row) = self
            .tables
            .get_mut(&table)
            .and_then(|rows| rows.iter_mut().find(|r| r.is_named(&text)))
        {
            // the console refuses a confirmation that is not the exact name
            if row.rendered == typed {
                row.gone_at = Some(gone_at);
                row.stale = stale;
                row.stuck = stuck;
            }
        }
    }
}

/// Scripted cloud console
pub struct FakeConsole {
    state: Mutex<ConsoleState>,
}

impl Default for FakeConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeConsole {
    pub fn new() -> Self {
        let tables = TABLES.iter().map(|t| (t.to_string(), Vec::new())).collect();
        let texts = vec![
            ("div.col-md-3 >> nth=2 >> span".to_string(), "Ready".to_string()),
            ("div.row >> nth=1 >> div.col-md-3 >> nth=1".to_string(), "Ubuntu 22.04 LTS".to_string()),
            ("Networking interfaces".to_string(), "100.80.195.99".to_string()),
            ("pre > span".to_string(), CONNECT_LINE.to_string()),
        ];
        Self {
            state: Mutex::new(ConsoleState {
                tables,
                current: None,
                hidden: HashSet::new(),
                fills: Vec::new(),
                clicks: Vec::new(),
                checks: Vec::new(),
                observed: Vec::new(),
                pending_delete: None,
                confirmations: Vec::new(),
                reloads: 0,
                closed: false,
                clipboard: VecDeque::new(),
                texts,
                prefixes: HashMap::new(),
                provision_delay: Duration::from_secs(5),
                delete_delay: Duration::from_secs(8),
                stale_deletes: false,
                stuck_deletes: false,
            }),
        }
    }

    fn with(self, f: impl FnOnce(&mut ConsoleState)) -> Self {
        f(&mut self.state.lock().unwrap());
        self
    }

    /// Server-side decoration of new names in `table`
    pub fn decorate(self, table: &str, prefix: &str) -> Self {
        self.with(|s| {
            s.prefixes.insert(table.to_string(), prefix.to_string());
        })
    }

    /// A Ready row that already exists
    pub fn seed_ready(self, table: &str, name: &str) -> Self {
        self.with(|s| s.add_row(table, name.to_string(), Instant::now()))
    }

    /// A row already being deleted, gone after `remaining`
    pub fn seed_terminating(self, table: &str, name: &str, remaining: Duration) -> Self {
        self.with(|s| {
            s.add_row(table, name.to_string(), Instant::now());
            if let Some(row) = s.tables.get_mut(table).and_then(|r| r.last_mut()) {
                row.gone_at = Some(Instant::now() + remaining);
            }
        })
    }

    /// Detail text for any locator whose display contains `pattern`.
    /// Earlier rules win.
    pub fn text(self, pattern: &str, value: &str) -> Self {
        self.with(|s| s.texts.insert(0, (pattern.to_string(), value.to_string())))
    }

    /// Values returned by successive clipboard reads
    pub fn clipboard(self, values: &[&str]) -> Self {
        self.with(|s| s.clipboard.extend(values.iter().map(|v| v.to_string())))
    }

    pub fn provision_delay(self, delay: Duration) -> Self {
        self.with(|s| s.provision_delay = delay)
    }

    pub fn delete_delay(self, delay: Duration) -> Self {
        self.with(|s| s.delete_delay = delay)
    }

    /// Confirmed deletes only show up after a page reload
    pub fn stale_deletes(self) -> Self {
        self.with(|s| s.stale_deletes = true)
    }

    /// Confirmed deletes stay in the terminating state forever
    pub fn stuck_deletes(self) -> Self {
        self.with(|s| s.stuck_deletes = true)
    }

    pub fn rendered_names(&self, table: &str) -> Vec<String> {
        let mut s = self.state.lock().unwrap();
        s.purge();
        s.tables
            .get(table)
            .map(|rows| rows.iter().map(|r| r.rendered.clone()).collect())
            .unwrap_or_default()
    }

    /// Status labels read for rows matching `name`, in order
    pub fn observed(&self, name: &str) -> Vec<String> {
        let s = self.state.lock().unwrap();
        s.observed
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, status)| status.clone())
            .collect()
    }

    /// Values typed into delete confirmation dialogs
    pub fn confirmations(&self) -> Vec<String> {
        self.state.lock().unwrap().confirmations.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().unwrap().clicks.clone()
    }

    pub fn fills(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().fills.clone()
    }

    pub fn reloads(&self) -> usize {
        self.state.lock().unwrap().reloads
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }
}

fn last(locator: &Locator) -> Option<&Selector> {
    locator.last()
}

fn cell_index(locator: &Locator) -> Option<usize> {
    locator.chain().iter().rev().find_map(|s| match s {
        Selector::Cell { index } => Some(*index),
        _ => None,
    })
}

fn starts_with_main(locator: &Locator) -> bool {
    matches!(locator.chain().first(), Some(Selector::Role { role, name, .. }) if role == "main" && name.is_empty())
}

fn page_label(text: &str) -> Option<&str> {
    text.strip_prefix("Go to ")?.strip_suffix(" Page")
}

#[async_trait]
impl UiDriver for FakeConsole {
    async fn goto(&self, _url: &str) -> E2eResult<u16> {
        Ok(200)
    }

    async fn reload(&self) -> E2eResult<()> {
        let mut s = self.state.lock().unwrap();
        s.reloads += 1;
        let gone_at = Instant::now() + s.delete_delay;
        for rows in s.tables.values_mut() {
            for row in rows.iter_mut().filter(|r| r.stale) {
                row.stale = false;
                row.gone_at = Some(gone_at);
            }
        }
        Ok(())
    }

    async fn click(&self, locator: &Locator) -> E2eResult<()> {
        let mut s = self.state.lock().unwrap();
        s.purge();
        let shown = locator.to_string();
        s.clicks.push(shown.clone());

        if let Some(text) = locator.row_name() {
            if matches!(last(locator), Some(Selector::Text { text: t, .. } | Selector::Label { text: t, .. }) if t == "Delete") {
                let row_exists = s.find(text).is_some();
                if !row_exists {
                    return Err(E2eError::Driver(format!("{} is not attached", shown)));
                }
                let table = s.current.clone().unwrap_or_default();
                s.pending_delete = Some((table, text.to_string()));
            }
            return Ok(());
        }

        match last(locator) {
            Some(Selector::Label { text, .. }) if page_label(text).map(|t| s.tables.contains_key(t)).unwrap_or(false) => {
                s.current = page_label(text).map(String::from);
            }
            Some(Selector::HasText { text }) if s.tables.contains_key(text) => {
                s.current = Some(text.clone());
            }
            Some(Selector::Role { role, name, .. }) if role == "link" && s.tables.contains_key(name) => {
                s.current = Some(name.clone());
            }
            Some(Selector::Label { text, .. }) if text == "Delete" && shown.starts_with("div.modal-footer") => {
                s.confirm_delete();
            }
            Some(Selector::Label { text, .. }) if text == "Upload key" => {
                let table = match s.current.as_deref() {
                    Some(t) if t.starts_with("Preview") => PREVIEW_KEYS,
                    _ => KEYS,
                };
                let name = s.last_fill(|loc| loc.contains("Key Name")).unwrap_or_default();
                s.add_row(table, name, Instant::now());
                s.hidden.insert(shown);
            }
            Some(Selector::Label { text, .. }) if starts_with_main(locator) && SUBMIT_LABELS.contains(&text.as_str()) => {
                let name = s
                    .last_fill(|loc| loc.starts_with("role=main >> placeholder="))
                    .unwrap_or_default();
                let table = s.current.clone().unwrap_or_default();
                let ready_at = Instant::now() + s.provision_delay;
                s.add_row(&table, name, ready_at);
            }
            _ if shown == "#continue" && s.fills.iter().any(|(loc, _)| loc == "#password") => {
                s.hidden.insert("#password".to_string());
            }
            _ if shown.ends_with("role=button[Sign-out]") => {
                s.hidden.insert("label=User Menu".to_string());
            }
            _ => {}
        }
        Ok(())
    }

    async fn fill(&self, locator: &Locator, value: &str) -> E2eResult<()> {
        self.state
            .lock()
            .unwrap()
            .fills
            .push((locator.to_string(), value.to_string()));
        Ok(())
    }

    async fn check(&self, locator: &Locator) -> E2eResult<()> {
        self.state.lock().unwrap().checks.push(locator.to_string());
        Ok(())
    }

    async fn is_visible(&self, locator: &Locator) -> E2eResult<bool> {
        let mut s = self.state.lock().unwrap();
        s.purge();
        let shown = locator.to_string();
        if s.hidden.contains(&shown) {
            return Ok(false);
        }
        if let Some(text) = locator.row_name() {
            return Ok(s.find(text).is_some());
        }
        Ok(match last(locator) {
            Some(Selector::Css { css }) if css == "table.table" => !s.rows().is_empty(),
            Some(Selector::Text { text, .. }) if text.starts_with("Your account currently has no") => s.rows().is_empty(),
            _ => true,
        })
    }

    async fn count(&self, locator: &Locator) -> E2eResult<usize> {
        let mut s = self.state.lock().unwrap();
        s.purge();
        if let Some(text) = locator.row_name() {
            return Ok(s.find(text).map(|_| 1).unwrap_or(0));
        }
        Ok(match last(locator) {
            Some(Selector::HasText { text }) if s.tables.contains_key(text) => {
                usize::from(s.current.as_deref() == Some(text.as_str()))
            }
            _ => 1,
        })
    }

    async fn text_content(&self, locator: &Locator) -> E2eResult<String> {
        let mut s = self.state.lock().unwrap();
        s.purge();
        let shown = locator.to_string();

        if let Some(text) = locator.row_name() {
            let row = s
                .find(text)
                .cloned()
                .ok_or_else(|| E2eError::Driver(format!("{} is not attached", shown)))?;
            let status = s.status_of(&row);
            return Ok(match cell_index(locator) {
                Some(0) => row.rendered,
                Some(_) => {
                    s.observed.push((row.name.clone(), status.clone()));
                    status
                }
                None => format!("{} {}", row.rendered, status),
            });
        }

        if shown.contains("Instance Public Keys") {
            let keys: Vec<String> = [KEYS, PREVIEW_KEYS]
                .iter()
                .filter_map(|t| s.tables.get(*t))
                .flatten()
                .map(|r| r.rendered.clone())
                .collect();
            return Ok(keys.join(" "));
        }

        Ok(s.texts
            .iter()
            .find(|(pattern, _)| shown.contains(pattern.as_str()))
            .map(|(_, value)| value.clone())
            .unwrap_or_default())
    }

    async fn get_attribute(&self, _locator: &Locator, _name: &str) -> E2eResult<Option<String>> {
        Ok(None)
    }

    async fn close(&self) -> E2eResult<()> {
        self.state.lock().unwrap().closed = true;
        Ok(())
    }
}

#[async_trait]
impl Clipboard for FakeConsole {
    async fn read_clipboard(&self) -> E2eResult<String> {
        Ok(self.state.lock().unwrap().clipboard.pop_front().unwrap_or_default())
    }
}

/// Hands out the same console to every scenario
pub struct FakeLauncher {
    pub console: Arc<FakeConsole>,
    pub launched: Mutex<Vec<String>>,
}

impl FakeLauncher {
    pub fn new(console: Arc<FakeConsole>) -> Self {
        Self {
            console,
            launched: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self, test_id: &str) -> E2eResult<Arc<dyn Browser>> {
        self.launched.lock().unwrap().push(test_id.to_string());
        Ok(self.console.clone())
    }
}

/// Scripted `ssh`: the bastion probe succeeds unless the bastion is down,
/// chained commands answer from the first rule matching the remote command.
pub struct FakeShell {
    rules: Vec<(String, ShellOutput)>,
    bastion_down: bool,
    calls: Mutex<Vec<ShellCommand>>,
}

impl Default for FakeShell {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeShell {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            bastion_down: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn stdout(mut self, command: &str, out: &str) -> Self {
        self.rules.push((
            command.to_string(),
            ShellOutput {
                stdout: out.to_string(),
                stderr: String::new(),
                code: Some(0),
            },
        ));
        self
    }

    pub fn stderr(mut self, command: &str, err: &str) -> Self {
        self.rules.push((
            command.to_string(),
            ShellOutput {
                stdout: String::new(),
                stderr: err.to_string(),
                code: Some(0),
            },
        ));
        self
    }

    pub fn bastion_down(mut self) -> Self {
        self.bastion_down = true;
        self
    }

    pub fn calls(&self) -> Vec<ShellCommand> {
        self.calls.lock().unwrap().clone()
    }

    /// Remote commands that went through the bastion, in order
    pub fn remote_commands(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter(|c| c.args.iter().any(|a| a == "-J"))
            .filter_map(|c| c.args.last().cloned())
            .collect()
    }

    pub fn probes(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.program == "ssh" && !c.args.iter().any(|a| a == "-J"))
            .count()
    }
}

#[async_trait]
impl ShellRunner for FakeShell {
    async fn run(&self, command: &ShellCommand) -> E2eResult<ShellOutput> {
        self.calls.lock().unwrap().push(command.clone());

        if !command.args.iter().any(|a| a == "-J") {
            if command.program == "ssh" && self.bastion_down {
                return Ok(ShellOutput {
                    stdout: String::new(),
                    stderr: "ssh: connect to host 146.152.232.8 port 22: Connection timed out".into(),
                    code: Some(255),
                });
            }
            return Ok(ShellOutput {
                code: Some(0),
                ..Default::default()
            });
        }

        let remote = command.args.last().cloned().unwrap_or_default();
        Ok(self
            .rules
            .iter()
            .find(|(pattern, _)| remote.contains(pattern.as_str()))
            .map(|(_, out)| out.clone())
            .unwrap_or(ShellOutput {
                code: Some(0),
                ..Default::default()
            }))
    }
}

/// Environment with a ready-made keypair under `dir`
pub fn test_env(dir: &Path, validate_ssh: bool) -> EnvironmentSpec {
    let key = dir.join("id_rsa");
    std::fs::write(&key, "PRIVATE").unwrap();
    std::fs::write(dir.join("id_rsa.pub"), "ssh-rsa AAAAB3NzaC1yc2E cloudprobe@localhost\n").unwrap();

    let yaml = format!(
        r#"
url: https://console.example.com
region: us-region-1
tier: Premium
ssh:
  validate: {}
  key_path: {}
  config_path: {}
preview:
  password: "pr3view!"
"#,
        validate_ssh,
        key.display(),
        dir.join("config").display()
    );
    EnvironmentSpec::from_yaml(&yaml).unwrap()
}

pub fn identity(test_id: &str) -> Identity {
    Identity {
        user: "qa@example.com".into(),
        password: "s3cret!".into(),
        tier: AccountTier::Premium,
        region: "us-region-1".into(),
        test_id: test_id.into(),
    }
}

/// A logged-out context on `console`
pub fn context(console: &Arc<FakeConsole>, shell: Arc<FakeShell>, env: EnvironmentSpec) -> ScenarioContext {
    let browser: Arc<dyn Browser> = console.clone();
    let session = Session::new(browser, identity("t-0001"), env.url.clone());
    ScenarioContext::new(session, shell, Arc::new(env))
}
