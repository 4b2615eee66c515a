//! CloudProbe resource-lifecycle verification harness
//!
//! Drives a cloud web console through create, verify and delete of real
//! resources, then proves them reachable over a bastion-hopped SSH channel.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                SuiteRunner (one session / scenario)         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  scenario::execute                                          │
//! │    └── lifecycle: pre_cleanup → create → verify → delete    │
//! │          ├── ResourceOps (kinds::*) + ResourceProfile        │
//! │          ├── Session  ── UiDriver / Clipboard (Playwright)  │
//! │          └── RemoteChannel ── ShellRunner (ssh, sshpass)    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  poll: wait_until / wait_until_gone (+ optional refresh)    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod keys;
pub mod kinds;
pub mod lifecycle;
pub mod playwright;
pub mod poll;
pub mod profile;
pub mod runner;
pub mod scenario;
pub mod session;
pub mod shell;
pub mod ssh;

pub use config::EnvironmentSpec;
pub use context::ScenarioContext;
pub use driver::{Browser, BrowserLauncher, Locator, UiDriver};
pub use error::{E2eError, E2eResult};
pub use lifecycle::{ResourceOps, Verification};
pub use runner::{Credentials, ScenarioRun, SuiteRunner, TestResult, TestSuiteResult};
pub use scenario::Scenario;
pub use shell::{ProcessShell, ShellRunner};
pub use ssh::{RemoteChannel, RemoteCommand};
