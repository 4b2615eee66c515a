//! CloudProbe CLI - Main Entry Point
//!
//! Runs lifecycle scenarios against a cloud console, cleans up their
//! leftovers, and exposes the remote command channel on its own.

use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{cleanup, run, scenarios, ssh};

/// CloudProbe - resource-lifecycle verification harness
#[derive(Parser)]
#[command(name = "cloudprobe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scenarios end to end
    Run(run::RunArgs),

    /// Only remove leftovers of scenarios
    Cleanup(cleanup::CleanupArgs),

    /// Run one command over the bastion chain
    Ssh(ssh::SshArgs),

    /// List available scenarios
    Scenarios,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let passed = match cli.command {
        Commands::Run(args) => run::execute(args, cli.format).await?,
        Commands::Cleanup(args) => cleanup::execute(args, cli.format).await?,
        Commands::Ssh(args) => ssh::execute(args).await?,
        Commands::Scenarios => {
            scenarios::execute(cli.format);
            true
        }
        Commands::Version => {
            println!("CloudProbe CLI v{}", cloudprobe_common::VERSION);
            true
        }
    };

    if !passed {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "cloudprobe", "run", "vmaas", "staas-os=b1", "-u", "qa@example.com", "-p", "pw", "--headed",
        ])
        .unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.scenarios, vec!["vmaas", "staas-os=b1"]);
                assert!(args.suite.headed);
                assert_eq!(args.suite.user, "qa@example.com");
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_ssh_trailing_command() {
        let cli = Cli::try_parse_from([
            "cloudprobe", "ssh", "--connect", "ssh -J guest@1.2.3.4 ubuntu@10.0.0.5", "--expect", "^Linux", "uname", "-a",
        ])
        .unwrap();
        match cli.command {
            Commands::Ssh(args) => {
                assert_eq!(args.command, vec!["uname", "-a"]);
                assert_eq!(args.expect, "^Linux");
            }
            _ => panic!("expected ssh"),
        }
    }
}
