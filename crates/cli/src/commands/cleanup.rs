//! Cleanup Commands

use anyhow::Result;
use clap::Args;

use super::run::{parse_runs, print_failed_steps, ResultRow, SuiteArgs};
use crate::output::{print_document, print_list, print_success, OutputFormat};

#[derive(Args, Debug)]
pub struct CleanupArgs {
    /// Scenarios whose leftovers to remove, as `scenario` or `scenario=resource-name`
    #[arg(required = true)]
    pub scenarios: Vec<String>,

    #[command(flatten)]
    pub suite: SuiteArgs,
}

/// Returns whether every cleanup succeeded
pub async fn execute(args: CleanupArgs, format: OutputFormat) -> Result<bool> {
    let runs = parse_runs(&args.scenarios)?;
    let runner = args.suite.build_runner()?;

    let mut results = Vec::with_capacity(runs.len());
    for run in &runs {
        results.push(runner.cleanup(run).await);
    }

    if !print_document(&results, format) {
        let rows: Vec<ResultRow> = results.iter().map(ResultRow::from).collect();
        print_list(&rows, format);
        print_failed_steps(&results);
    }

    let passed = results.iter().all(|r| r.success);
    if passed {
        print_success("No leftovers remain");
    }
    Ok(passed)
}
