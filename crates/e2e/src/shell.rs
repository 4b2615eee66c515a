//! OS command execution seam

use std::fmt;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::error::{E2eError, E2eResult};

/// A program invocation with an argv, never a shell string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Kill the process after this long
    pub timeout: Option<Duration>,
    /// Argument positions that must not appear in logs
    secret_args: Vec<usize>,
    /// Substrings of any argument that must not appear in logs
    redactions: Vec<String>,
}

impl ShellCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
            secret_args: Vec::new(),
            redactions: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append an argument that is masked in [`fmt::Display`]
    pub fn secret_arg(mut self, arg: impl Into<String>) -> Self {
        self.secret_args.push(self.args.len());
        self.args.push(arg.into());
        self
    }

    /// Mask every occurrence of `secret` inside arguments in [`fmt::Display`]
    pub fn redact(mut self, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        if !secret.is_empty() && !self.redactions.contains(&secret) {
            self.redactions.push(secret);
        }
        self
    }

    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    fn masked(&self, arg: &str) -> String {
        // longest first so a secret containing another is masked whole
        let mut secrets: Vec<&String> = self.redactions.iter().collect();
        secrets.sort_by_key(|s| std::cmp::Reverse(s.len()));
        secrets
            .into_iter()
            .fold(arg.to_string(), |acc, secret| acc.replace(secret.as_str(), "***"))
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for (i, arg) in self.args.iter().enumerate() {
            if self.secret_args.contains(&i) {
                write!(f, " ***")?;
                continue;
            }
            let arg = self.masked(arg);
            if arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code; `None` when killed by a signal
    pub code: Option<i32>,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs local processes on behalf of the harness
#[async_trait]
pub trait ShellRunner: Send + Sync {
    async fn run(&self, command: &ShellCommand) -> E2eResult<ShellOutput>;
}

/// [`ShellRunner`] backed by `tokio::process`
#[derive(Debug, Clone, Default)]
pub struct ProcessShell;

#[async_trait]
impl ShellRunner for ProcessShell {
    async fn run(&self, command: &ShellCommand) -> E2eResult<ShellOutput> {
        debug!("exec: {}", command);

        let child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| E2eError::Shell(format!("failed to spawn {}: {}", command.program, e)))?;

        let output = match command.timeout {
            Some(limit) => timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| {
                    E2eError::Shell(format!(
                        "{} timed out after {} s",
                        command.program,
                        limit.as_secs()
                    ))
                })??,
            None => child.wait_with_output().await?,
        };

        Ok(ShellOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            code: output.status.code(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_masks_secrets() {
        let cmd = ShellCommand::new("sshpass")
            .arg("-p")
            .secret_arg("hunter2")
            .arg("ssh")
            .arg("uname -a");
        let shown = cmd.to_string();
        assert_eq!(shown, "sshpass -p *** ssh 'uname -a'");
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn test_display_redacts_secrets_inside_arguments() {
        let cmd = ShellCommand::new("ssh")
            .arg("ubuntu@10.0.0.5")
            .arg("AWS_SECRET_ACCESS_KEY=\"s3cr3t\" aws s3 ls")
            .redact("s3cr3t")
            .redact("");
        let shown = cmd.to_string();
        assert_eq!(shown, "ssh ubuntu@10.0.0.5 'AWS_SECRET_ACCESS_KEY=\"***\" aws s3 ls'");
        assert_eq!(cmd.args[1], "AWS_SECRET_ACCESS_KEY=\"s3cr3t\" aws s3 ls");
    }

    #[tokio::test]
    async fn test_process_shell_captures_streams() {
        let out = ProcessShell
            .run(&ShellCommand::new("sh").arg("-c").arg("echo out; echo err >&2; exit 3"))
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");
        assert_eq!(out.code, Some(3));
        assert!(!out.success());
    }

    #[tokio::test]
    async fn test_process_shell_timeout() {
        let err = ProcessShell
            .run(&ShellCommand::new("sleep").arg("5").timeout(Duration::from_millis(100)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_missing_program_is_error() {
        let err = ProcessShell
            .run(&ShellCommand::new("definitely-not-a-real-binary-xyz"))
            .await
            .unwrap_err();
        assert!(matches!(err, E2eError::Shell(_)));
    }
}
