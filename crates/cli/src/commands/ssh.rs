//! SSH Commands

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use cloudprobe_e2e::ssh::SshSettings;
use cloudprobe_e2e::{ProcessShell, RemoteChannel, RemoteCommand};

use crate::output::{print_error, print_success};

#[derive(Args, Debug)]
pub struct SshArgs {
    /// Connect line as shown by the console, e.g. "ssh -J guest@bastion ubuntu@10.0.0.5"
    #[arg(short, long)]
    pub connect: String,

    /// Pattern stdout (or else stderr) must match
    #[arg(short, long, default_value = "^$")]
    pub expect: String,

    /// Target host password, sent with sshpass
    #[arg(long, env = "CLOUDPROBE_SSH_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// SOCKS proxy (host:port) in front of the bastion
    #[arg(long, env = "CLOUDPROBE_SOCKS_PROXY")]
    pub socks_proxy: Option<String>,

    /// ssh client config receiving the proxy directive
    #[arg(long)]
    pub ssh_config: Option<PathBuf>,

    /// Connect timeout in seconds
    #[arg(long, default_value = "12")]
    pub connect_timeout: u64,

    /// Command timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Command to run on the target host
    #[arg(required = true, trailing_var_arg = true)]
    pub command: Vec<String>,
}

/// Returns whether the command's output matched
pub async fn execute(args: SshArgs) -> Result<bool> {
    let settings = SshSettings {
        socks_proxy: args.socks_proxy.filter(|p| !p.is_empty()),
        config_path: args
            .ssh_config
            .unwrap_or_else(cloudprobe_common::default_ssh_config_path),
        connect_timeout: Duration::from_secs(args.connect_timeout),
    };

    let mut channel = RemoteChannel::new(Arc::new(ProcessShell), settings);
    channel
        .set_connect_line(&args.connect)
        .with_context(|| format!("cannot use connect line '{}'", args.connect))?;

    let mut command = RemoteCommand::new(args.command.join(" "))
        .expecting(&args.expect)
        .with_context(|| format!("invalid pattern '{}'", args.expect))?
        .password(args.password.as_deref());
    if let Some(secs) = args.timeout {
        command = command.timeout(Duration::from_secs(secs));
    }

    let matched = channel.run(&command).await;
    if matched {
        print_success("Remote command output matched");
    } else {
        print_error(&format!("Remote command did not match /{}/", args.expect));
    }
    Ok(matched)
}
