//! Remote command channel
//!
//! Runs shell commands on instances that are only reachable through a
//! bastion. The console reveals a literal connect line such as
//! `ssh -J guest@146.152.232.8 ubuntu@100.80.195.99`; the channel parses it,
//! proves the bastion hop once per scenario, and then runs each command
//! through the full chain, classifying the output against a pattern.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, error, info, warn};

use cloudprobe_common::Error as CommonError;

use crate::error::{E2eError, E2eResult};
use crate::shell::{ShellCommand, ShellOutput, ShellRunner};

const JUMP_MARKER: &str = "ssh -J";

/// Parsed `ssh -J jump-user@bastion target-user@target` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectLine {
    pub jump_user: String,
    pub jump_host: String,
    pub target_user: String,
    pub target_host: String,
    /// Any trailing ssh arguments shown by the console
    pub extra: Vec<String>,
}

fn split_user_host(token: &str, raw: &str) -> Result<(String, String), CommonError> {
    match token.split_once('@') {
        Some((user, host)) if !user.is_empty() && !host.is_empty() => {
            Ok((user.to_string(), host.to_string()))
        }
        _ => Err(CommonError::InvalidConnectLine(raw.to_string())),
    }
}

impl FromStr for ConnectLine {
    type Err = CommonError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        // Preview instances prefix the line with e.g. "ssh-keygen -R 192.168.12.2;"
        let start = raw
            .find(JUMP_MARKER)
            .ok_or_else(|| CommonError::InvalidConnectLine(raw.to_string()))?;
        let mut tokens = raw[start + JUMP_MARKER.len()..].split_whitespace();

        let jump = tokens
            .next()
            .ok_or_else(|| CommonError::InvalidConnectLine(raw.to_string()))?;
        let target = tokens
            .next()
            .ok_or_else(|| CommonError::InvalidConnectLine(raw.to_string()))?;
        let (jump_user, jump_host) = split_user_host(jump, raw)?;
        let (target_user, target_host) = split_user_host(target, raw)?;

        Ok(Self {
            jump_user,
            jump_host,
            target_user,
            target_host,
            extra: tokens.map(String::from).collect(),
        })
    }
}

impl ConnectLine {
    pub fn jump(&self) -> String {
        format!("{}@{}", self.jump_user, self.jump_host)
    }

    pub fn target(&self) -> String {
        format!("{}@{}", self.target_user, self.target_host)
    }
}

/// Client-side ssh settings for one environment
#[derive(Debug, Clone)]
pub struct SshSettings {
    /// `host:port` of a SOCKS proxy in front of the bastions
    pub socks_proxy: Option<String>,
    /// ssh client config file that receives the proxy directive
    pub config_path: PathBuf,
    pub connect_timeout: Duration,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            socks_proxy: None,
            config_path: cloudprobe_common::default_ssh_config_path(),
            connect_timeout: Duration::from_secs(12),
        }
    }
}

/// Negotiated hop state, reused across the commands of one scenario
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub line: ConnectLine,
    pub socks_proxy: Option<String>,
    pub initialized: bool,
}

/// One command to run on the target host
#[derive(Debug, Clone)]
pub struct RemoteCommand {
    pub command: String,
    /// stdout, or failing that stderr, must match
    pub expect: Regex,
    /// Target host password, passed through `sshpass`
    pub password: Option<String>,
    pub timeout: Option<Duration>,
    /// Spans of `command` masked wherever the command is logged
    secrets: Vec<String>,
}

impl RemoteCommand {
    /// A command expected to print nothing on stdout or stderr
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            expect: empty_output(),
            password: None,
            timeout: None,
            secrets: Vec::new(),
        }
    }

    pub fn expecting(mut self, pattern: &str) -> E2eResult<Self> {
        self.expect = Regex::new(pattern)?;
        Ok(self)
    }

    pub fn password(mut self, password: Option<&str>) -> Self {
        self.password = password.map(String::from);
        self
    }

    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// Mark a span of the command text as secret
    pub fn secret(mut self, span: &str) -> Self {
        if !span.is_empty() {
            self.secrets.push(span.to_string());
        }
        self
    }

    /// The command text with secret spans masked
    pub fn masked(&self) -> String {
        self.secrets
            .iter()
            .fold(self.command.clone(), |acc, span| acc.replace(span.as_str(), "***"))
    }
}

fn empty_output() -> Regex {
    Regex::new("^$").unwrap_or_else(|_| unreachable!("literal pattern"))
}

/// Chained bastion command channel
pub struct RemoteChannel {
    shell: Arc<dyn ShellRunner>,
    settings: SshSettings,
    context: Option<ConnectionContext>,
}

impl RemoteChannel {
    pub fn new(shell: Arc<dyn ShellRunner>, settings: SshSettings) -> Self {
        Self {
            shell,
            settings,
            context: None,
        }
    }

    /// Point the channel at the host behind a freshly copied connect line.
    ///
    /// The bastion hop is kept if the jump host is unchanged.
    pub fn set_connect_line(&mut self, raw: &str) -> E2eResult<()> {
        let line: ConnectLine = raw.parse()?;
        let initialized = self
            .context
            .as_ref()
            .map(|ctx| ctx.initialized && ctx.line.jump() == line.jump())
            .unwrap_or(false);
        info!("ssh connect line: {}", raw.trim());
        self.context = Some(ConnectionContext {
            line,
            socks_proxy: self.settings.socks_proxy.clone(),
            initialized,
        });
        Ok(())
    }

    pub fn context(&self) -> Option<&ConnectionContext> {
        self.context.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.context.as_ref().map(|c| c.initialized).unwrap_or(false)
    }

    /// Run a command and report whether its output matched.
    ///
    /// Connection problems are expected events here: they are logged and
    /// reported as `false`, never raised.
    pub async fn run(&mut self, command: &RemoteCommand) -> bool {
        let preview: String = command.masked().chars().take(50).collect();
        info!("run remote ssh command: {}", preview);
        match self.try_run(command).await {
            Ok(matched) => matched,
            Err(e) => {
                error!("SSH connection error: {}", e);
                false
            }
        }
    }

    async fn try_run(&mut self, command: &RemoteCommand) -> E2eResult<bool> {
        let ctx = self
            .context
            .as_mut()
            .ok_or_else(|| E2eError::Shell("no connect line captured yet".into()))?;

        if !ctx.initialized {
            if let Some(proxy) = &ctx.socks_proxy {
                write_proxy_directive(&self.settings.config_path, &ctx.line.jump_host, proxy).await?;
            }

            let probe = ShellCommand::new("ssh")
                .arg(ctx.line.jump())
                .args(connect_options(&self.settings, ctx.socks_proxy.is_some()))
                .timeout(self.settings.connect_timeout * 2);
            let out = self.shell.run(&probe).await?;
            if !out.success() {
                error!("failed to connect to ssh proxy {}: {}", ctx.line.jump(), out.stderr.trim());
                return Ok(false);
            }
            debug!("bastion {} reachable", ctx.line.jump_host);
            ctx.initialized = true;
        }

        let mut cmd = match &command.password {
            Some(password) => ShellCommand::new("sshpass")
                .arg("-p")
                .secret_arg(password.clone())
                .arg("ssh"),
            None => ShellCommand::new("ssh"),
        };
        cmd = cmd
            .arg("-J")
            .arg(ctx.line.jump())
            .arg(ctx.line.target())
            .args(ctx.line.extra.iter().cloned())
            .args(connect_options(&self.settings, ctx.socks_proxy.is_some()))
            .arg(command.command.clone());
        for span in &command.secrets {
            cmd = cmd.redact(span.clone());
        }
        if let Some(limit) = command.timeout {
            cmd = cmd.timeout(limit);
        }

        let out = self.shell.run(&cmd).await?;
        Ok(classify(&out, &command.expect))
    }
}

fn connect_options(settings: &SshSettings, with_config: bool) -> Vec<String> {
    let mut opts = vec![
        "-o".to_string(),
        format!("ConnectTimeout={}", settings.connect_timeout.as_secs()),
        "-o".to_string(),
        "StrictHostKeyChecking=no".to_string(),
    ];
    if with_config {
        opts.push("-F".to_string());
        opts.push(settings.config_path.display().to_string());
    }
    opts
}

/// Match stdout first; some tools print their success banner on stderr.
fn classify(out: &ShellOutput, expect: &Regex) -> bool {
    if !out.success() {
        error!(
            "ssh command exited with {:?}: {} (err: {})",
            out.code,
            out.stdout.trim(),
            out.stderr.trim()
        );
        return false;
    }
    if expect.is_match(&out.stdout) {
        info!("SSH command ran successfully, output verified");
        return true;
    }
    if expect.is_match(&out.stderr) {
        info!("SSH command ran successfully, but output pattern is in stderr");
        return true;
    }
    error!(
        "ssh command issued but output is not as expected: {} (err: {})",
        out.stdout.trim(),
        out.stderr.trim()
    );
    false
}

/// Route a bastion through the SOCKS proxy, once per host.
async fn write_proxy_directive(path: &PathBuf, jump_host: &str, proxy: &str) -> E2eResult<()> {
    let host_line = format!("Host {}", jump_host);
    let existing = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    if existing.lines().any(|l| l.trim() == host_line) {
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut content = existing;
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content.push_str(&format!("{}\n    ProxyCommand nc -x {} %h %p\n", host_line, proxy));
    tokio::fs::write(path, content).await?;
    warn!("routing ssh to {} through SOCKS proxy {}", jump_host, proxy);
    Ok(())
}

/// Escape a secret for use inside a double-quoted remote shell word
pub fn escape_double_quoted(secret: &str) -> String {
    let mut out = String::with_capacity(secret.len());
    for c in secret.chars() {
        if matches!(c, '\\' | '`' | '"' | '$') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_connect_line() {
        let line: ConnectLine = "ssh -J guest@146.152.232.8 ubuntu@100.80.195.99".parse().unwrap();
        assert_eq!(line.jump(), "guest@146.152.232.8");
        assert_eq!(line.target(), "ubuntu@100.80.195.99");
        assert!(line.extra.is_empty());
    }

    #[test]
    fn test_parse_connect_line_with_prefix() {
        let raw = "ssh-keygen -R 192.168.12.2; ssh -J guest@10.0.0.1 devcloud@192.168.12.2";
        let line: ConnectLine = raw.parse().unwrap();
        assert_eq!(line.jump_host, "10.0.0.1");
        assert_eq!(line.target_user, "devcloud");
    }

    #[test]
    fn test_parse_connect_line_rejects_garbage() {
        assert!("ssh ubuntu@1.2.3.4".parse::<ConnectLine>().is_err());
        assert!("ssh -J guest@1.2.3.4".parse::<ConnectLine>().is_err());
        assert!("ssh -J bastion ubuntu@1.2.3.4".parse::<ConnectLine>().is_err());
    }

    #[test]
    fn test_classify_prefers_stdout_then_stderr() {
        let linux = Regex::new("^Linux").unwrap();
        let out = ShellOutput { stdout: "Linux\n".into(), stderr: String::new(), code: Some(0) };
        assert!(classify(&out, &linux));

        let mount = Regex::new("Mount completed successfully").unwrap();
        let out = ShellOutput {
            stdout: String::new(),
            stderr: "Mount completed successfully\n".into(),
            code: Some(0),
        };
        assert!(classify(&out, &mount));

        let out = ShellOutput { stdout: "Darwin\n".into(), stderr: String::new(), code: Some(0) };
        assert!(!classify(&out, &linux));
    }

    #[test]
    fn test_classify_nonzero_exit_fails() {
        let out = ShellOutput {
            stdout: "Linux\n".into(),
            stderr: "Connection refused".into(),
            code: Some(255),
        };
        assert!(!classify(&out, &Regex::new("^Linux").unwrap()));
    }

    #[test]
    fn test_empty_pattern_default() {
        let cmd = RemoteCommand::new("sudo mkdir /mnt/test");
        let out = ShellOutput { stdout: String::new(), stderr: String::new(), code: Some(0) };
        assert!(classify(&out, &cmd.expect));
    }

    #[test]
    fn test_secret_spans_are_masked() {
        let cmd = RemoteCommand::new("AWS_SECRET_ACCESS_KEY=\"k\\$y\" aws s3 ls")
            .secret(&escape_double_quoted("k$y"))
            .secret("");
        assert_eq!(cmd.masked(), "AWS_SECRET_ACCESS_KEY=\"***\" aws s3 ls");
        assert!(cmd.command.contains("k\\$y"));
    }

    #[test]
    fn test_escape_double_quoted() {
        assert_eq!(escape_double_quoted(r#"a`b"c$d\e"#), r#"a\`b\"c\$d\\e"#);
        assert_eq!(escape_double_quoted("plain"), "plain");
    }

    #[tokio::test]
    async fn test_proxy_directive_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ssh").join("config");
        write_proxy_directive(&path, "146.152.232.8", "proxy.example:1080").await.unwrap();
        write_proxy_directive(&path, "146.152.232.8", "proxy.example:1080").await.unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("Host 146.152.232.8").count(), 1);
        assert!(content.contains("ProxyCommand nc -x proxy.example:1080 %h %p"));
    }
}
