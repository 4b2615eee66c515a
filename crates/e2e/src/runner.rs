//! Suite runner: one isolated session per scenario, results to JSON

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, info_span, warn, Instrument};

use cloudprobe_common::AccountTier;

use crate::config::EnvironmentSpec;
use crate::context::ScenarioContext;
use crate::driver::BrowserLauncher;
use crate::error::{E2eError, E2eResult};
use crate::scenario::{self, Scenario, StepLog, StepResult};
use crate::session::{Identity, Session};
use crate::shell::ShellRunner;

/// Console account the suite runs as
#[derive(Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// One scenario to run, under the resource name it should use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioRun {
    pub scenario: Scenario,
    pub name: String,
}

impl ScenarioRun {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            name: scenario.default_name().to_string(),
        }
    }

    pub fn named(scenario: Scenario, name: impl Into<String>) -> Self {
        Self {
            scenario,
            name: name.into(),
        }
    }
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub scenario: Scenario,
    pub test_id: String,
    pub success: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub error: Option<String>,
}

/// Result of running all scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub started_at: DateTime<Utc>,
    pub region: String,
    pub tier: AccountTier,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<TestResult>,
}

impl TestSuiteResult {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// What a session is opened for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Full,
    CleanupOnly,
}

pub struct SuiteRunner {
    launcher: Arc<dyn BrowserLauncher>,
    shell: Arc<dyn ShellRunner>,
    env: Arc<EnvironmentSpec>,
    credentials: Credentials,
    output_dir: PathBuf,
}

impl SuiteRunner {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        shell: Arc<dyn ShellRunner>,
        env: EnvironmentSpec,
        credentials: Credentials,
    ) -> Self {
        Self {
            launcher,
            shell,
            env: Arc::new(env),
            credentials,
            output_dir: PathBuf::from("test-results"),
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn env(&self) -> &EnvironmentSpec {
        &self.env
    }

    /// Run scenarios one after another. A failed scenario does not stop the
    /// ones after it.
    pub async fn run_all(&self, runs: &[ScenarioRun]) -> TestSuiteResult {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut results = Vec::new();
        let mut passed = 0;
        let mut failed = 0;

        info!("Running {} scenario(s)...", runs.len());

        for run in runs {
            let result = self.run_scenario(run).await;
            if result.success {
                passed += 1;
                info!("✓ {} ({} ms)", result.name, result.duration_ms);
            } else {
                failed += 1;
                error!("✗ {} - {}", result.name, result.error.as_deref().unwrap_or("unknown error"));
            }
            results.push(result);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!("Test Results: {} passed, {} failed ({} ms)", passed, failed, duration_ms);

        TestSuiteResult {
            started_at,
            region: self.env.region.clone(),
            tier: self.env.tier,
            total: runs.len(),
            passed,
            failed,
            duration_ms,
            results,
        }
    }

    /// Run one scenario in its own session
    pub async fn run_scenario(&self, run: &ScenarioRun) -> TestResult {
        self.run_in_session(run, Mode::Full).await
    }

    /// Only remove leftovers of a scenario
    pub async fn cleanup(&self, run: &ScenarioRun) -> TestResult {
        self.run_in_session(run, Mode::CleanupOnly).await
    }

    async fn run_in_session(&self, run: &ScenarioRun, mode: Mode) -> TestResult {
        let test_id = format!("{}-{}", run.scenario, uuid::Uuid::new_v4().simple());
        let span = info_span!("scenario", test_id = %test_id, scenario = %run.scenario);
        let start = Instant::now();

        let mut log = StepLog::new();
        let outcome = self.drive(run, mode, &test_id, &mut log).instrument(span).await;

        TestResult {
            name: run.name.clone(),
            scenario: run.scenario,
            test_id,
            success: outcome.is_ok(),
            duration_ms: start.elapsed().as_millis() as u64,
            steps: log.into_steps(),
            error: outcome.err().map(|e| e.to_string()),
        }
    }

    async fn drive(&self, run: &ScenarioRun, mode: Mode, test_id: &str, log: &mut StepLog) -> E2eResult<()> {
        let browser = self.launcher.launch(test_id).await?;
        let identity = Identity {
            user: self.credentials.user.clone(),
            password: self.credentials.password.clone(),
            tier: self.env.tier,
            region: self.env.region.clone(),
            test_id: test_id.to_string(),
        };
        let session = Session::new(browser, identity, self.env.url.as_str());
        let mut cx = ScenarioContext::new(session, self.shell.clone(), self.env.clone());

        let outcome = async {
            scenario::sign_in(run.scenario, &mut cx, log).await?;
            match mode {
                Mode::Full => scenario::execute(run.scenario, &mut cx, &run.name, log).await,
                Mode::CleanupOnly => scenario::pre_cleanup(run.scenario, &mut cx, &run.name, log).await,
            }
        }
        .await;

        // always attempted, never masks the scenario's own error
        if cx.session.is_logged_in() {
            if let Err(e) = log.step("Sign out", cx.session.sign_out()).await {
                warn!("sign-out failed: {}", e);
            }
        }
        if let Err(e) = cx.session.close().await {
            warn!("closing the browser failed: {}", e);
        }

        outcome
    }

    /// Write test results to JSON file
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;

        let path = self.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

/// Parse `scenario` or `scenario=name`
pub fn parse_run(arg: &str) -> E2eResult<ScenarioRun> {
    match arg.split_once('=') {
        Some((scenario, name)) if !name.trim().is_empty() => Ok(ScenarioRun::named(scenario.parse()?, name.trim())),
        Some(_) => Err(E2eError::Config(format!("empty resource name in '{}'", arg))),
        None => Ok(ScenarioRun::new(arg.parse()?)),
    }
}
