//! Run Commands

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use serde::Serialize;

use cloudprobe_e2e::playwright::{BrowserEngine, PlaywrightConfig, PlaywrightLauncher};
use cloudprobe_e2e::runner::parse_run;
use cloudprobe_e2e::{Credentials, EnvironmentSpec, ProcessShell, ScenarioRun, SuiteRunner, TestResult};

use crate::output::{
    format_duration, print_document, print_error, print_info, print_list, print_success, OutputFormat, TableDisplay,
};

/// Browser engine driven by Playwright
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum Engine {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl From<Engine> for BrowserEngine {
    fn from(engine: Engine) -> Self {
        match engine {
            Engine::Chromium => BrowserEngine::Chromium,
            Engine::Firefox => BrowserEngine::Firefox,
            Engine::Webkit => BrowserEngine::Webkit,
        }
    }
}

/// Options shared by every command that opens console sessions
#[derive(Args, Debug)]
pub struct SuiteArgs {
    /// Environment file (YAML)
    #[arg(short, long, env = "CLOUDPROBE_ENV", default_value = "environment.yaml")]
    pub env: PathBuf,

    /// Override the environment's region
    #[arg(long)]
    pub region: Option<String>,

    /// Console user
    #[arg(short, long, env = "CLOUDPROBE_USER")]
    pub user: String,

    /// Console password
    #[arg(short, long, env = "CLOUDPROBE_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Directory for test-results.json
    #[arg(short, long, default_value = "test-results")]
    pub output: PathBuf,

    /// Directory for per-test HAR recordings
    #[arg(long, default_value = "har")]
    pub har_dir: PathBuf,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Browser engine
    #[arg(long, value_enum, default_value_t = Engine::Chromium)]
    pub browser: Engine,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Scenarios to run, as `scenario` or `scenario=resource-name`
    #[arg(required = true)]
    pub scenarios: Vec<String>,

    #[command(flatten)]
    pub suite: SuiteArgs,
}

impl SuiteArgs {
    pub fn build_runner(&self) -> Result<SuiteRunner> {
        let mut env = EnvironmentSpec::from_file(&self.env)
            .with_context(|| format!("failed to load environment {}", self.env.display()))?;
        if let Some(region) = &self.region {
            env.region = region.clone();
        }

        let config = PlaywrightConfig {
            engine: self.browser.into(),
            headless: !self.headed,
            har_dir: self.har_dir.clone(),
            ..Default::default()
        };
        let launcher = PlaywrightLauncher::new(config)?;
        let credentials = Credentials {
            user: self.user.clone(),
            password: self.password.clone(),
        };

        Ok(SuiteRunner::new(Arc::new(launcher), Arc::new(ProcessShell), env, credentials)
            .with_output_dir(&self.output))
    }
}

pub fn parse_runs(args: &[String]) -> Result<Vec<ScenarioRun>> {
    args.iter()
        .map(|arg| parse_run(arg).with_context(|| format!("invalid scenario argument '{}'", arg)))
        .collect()
}

/// One line of the results table
#[derive(Debug, Serialize)]
pub struct ResultRow {
    pub scenario: String,
    pub name: String,
    pub status: String,
    pub steps: usize,
    pub duration: String,
    pub error: String,
}

impl From<&TestResult> for ResultRow {
    fn from(result: &TestResult) -> Self {
        Self {
            scenario: result.scenario.to_string(),
            name: result.name.clone(),
            status: if result.success { "passed" } else { "failed" }.to_string(),
            steps: result.steps.len(),
            duration: format_duration(result.duration_ms),
            error: result.error.clone().unwrap_or_default(),
        }
    }
}

impl TableDisplay for ResultRow {
    fn headers() -> Vec<&'static str> {
        vec!["Scenario", "Name", "Status", "Steps", "Duration", "Error"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.scenario.clone(),
            self.name.clone(),
            self.status.clone(),
            self.steps.to_string(),
            self.duration.clone(),
            self.error.clone(),
        ]
    }
}

/// Show which step of each failed scenario broke
pub fn print_failed_steps(results: &[TestResult]) {
    for result in results.iter().filter(|r| !r.success) {
        if let Some(step) = result.steps.iter().find(|s| !s.success) {
            print_error(&format!(
                "{} ({}): step '{}' failed: {}",
                result.name,
                result.test_id,
                step.step_name,
                step.error.as_deref().unwrap_or("unknown error")
            ));
        }
    }
}

/// Returns whether every scenario passed
pub async fn execute(args: RunArgs, format: OutputFormat) -> Result<bool> {
    let runs = parse_runs(&args.scenarios)?;
    let runner = args.suite.build_runner()?;

    print_info(&format!(
        "Running {} scenario(s) against {} ({})",
        runs.len(),
        runner.env().url,
        runner.env().region
    ));
    let suite = runner.run_all(&runs).await;
    let path = runner.write_results(&suite)?;

    if !print_document(&suite, format) {
        let rows: Vec<ResultRow> = suite.results.iter().map(ResultRow::from).collect();
        print_list(&rows, format);
        print_failed_steps(&suite.results);
        println!(
            "\n{} passed, {} failed in {}",
            suite.passed,
            suite.failed,
            format_duration(suite.duration_ms)
        );
    }

    if suite.success() {
        print_success(&format!("All scenarios passed, results in {}", path.display()));
    } else {
        print_error(&format!("{} scenario(s) failed, results in {}", suite.failed, path.display()));
    }
    Ok(suite.success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudprobe_e2e::Scenario;

    #[test]
    fn test_parse_runs() {
        let runs = parse_runs(&["vmaas".to_string(), "staas-fs=vol-x".to_string()]).unwrap();
        assert_eq!(runs[0], ScenarioRun::new(Scenario::Vmaas));
        assert_eq!(runs[1], ScenarioRun::named(Scenario::StaasFs, "vol-x"));

        let err = parse_runs(&["bogus".to_string()]).unwrap_err();
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn test_result_row() {
        let result = TestResult {
            name: "cp01-vmaas".into(),
            scenario: Scenario::Vmaas,
            test_id: "vmaas-1".into(),
            success: false,
            duration_ms: 61_000,
            steps: Vec::new(),
            error: Some("Timeout waiting for: x".into()),
        };
        let row = ResultRow::from(&result);
        assert_eq!(row.status, "failed");
        assert_eq!(row.duration, "1m 01.0s");
        assert_eq!(row.row().len(), ResultRow::headers().len());
    }
}
