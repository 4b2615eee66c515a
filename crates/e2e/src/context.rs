//! Per-scenario state shared by the lifecycle steps

use std::fmt;
use std::sync::Arc;

use crate::config::EnvironmentSpec;
use crate::session::Session;
use crate::shell::ShellRunner;
use crate::ssh::{RemoteChannel, RemoteCommand};

/// Values copied out of the console during a scenario
#[derive(Clone, Default)]
pub struct Secrets {
    pub volume_user: Option<String>,
    pub volume_password: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |v: &Option<String>| v.as_ref().map(|_| "***");
        f.debug_struct("Secrets")
            .field("volume_user", &self.volume_user)
            .field("volume_password", &mask(&self.volume_password))
            .field("access_key", &mask(&self.access_key))
            .field("secret_key", &mask(&self.secret_key))
            .finish()
    }
}

/// Everything one scenario owns. Nothing in here is shared across scenarios.
pub struct ScenarioContext {
    pub session: Session,
    pub channel: RemoteChannel,
    pub shell: Arc<dyn ShellRunner>,
    pub env: Arc<EnvironmentSpec>,
    /// Public key uploaded with instances
    pub ssh_public_key: Option<String>,
    pub secrets: Secrets,
    /// Server-decorated name of the bucket under test
    pub bucket_name: Option<String>,
}

impl ScenarioContext {
    pub fn new(session: Session, shell: Arc<dyn ShellRunner>, env: Arc<EnvironmentSpec>) -> Self {
        let channel = RemoteChannel::new(shell.clone(), env.ssh.settings());
        Self {
            session,
            channel,
            shell,
            env,
            ssh_public_key: None,
            secrets: Secrets::default(),
            bucket_name: None,
        }
    }

    /// Remote checks are skipped when the environment disables them
    pub fn ssh_enabled(&self) -> bool {
        self.env.ssh.validate
    }

    /// Run a remote command, returning whether its output matched
    pub async fn remote(&mut self, command: &RemoteCommand) -> bool {
        self.channel.run(command).await
    }
}
