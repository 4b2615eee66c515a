//! Local SSH key preparation

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{E2eError, E2eResult};
use crate::shell::{ShellCommand, ShellRunner};

const KEYGEN_TIMEOUT: Duration = Duration::from_secs(10);

fn public_key_path(private: &Path) -> PathBuf {
    let mut name = private.as_os_str().to_os_string();
    name.push(".pub");
    PathBuf::from(name)
}

/// Make sure an RSA keypair exists at `private_key` and return the public key.
///
/// `ssh-keygen` only runs when the private key is missing.
pub async fn prepare_ssh_key(shell: &dyn ShellRunner, private_key: &Path) -> E2eResult<String> {
    info!("preparing SSH key {}", private_key.display());

    if !tokio::fs::try_exists(private_key).await? {
        if let Some(dir) = private_key.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let cmd = ShellCommand::new("ssh-keygen")
            .args(["-q", "-t", "rsa", "-b", "4096", "-N", ""])
            .arg("-f")
            .arg(private_key.display().to_string())
            .args(["-C", "cloudprobe@localhost"])
            .timeout(KEYGEN_TIMEOUT);
        let out = shell.run(&cmd).await?;
        if !out.success() {
            return Err(E2eError::Shell(format!("ssh-keygen failed: {}", out.stderr.trim())));
        }
        debug!("generated new keypair");
    }

    let public = tokio::fs::read_to_string(public_key_path(private_key)).await?;
    let public = public.trim().to_string();
    if public.is_empty() {
        return Err(E2eError::Config(format!("public key for {} is empty", private_key.display())));
    }
    Ok(public)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::ShellOutput;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Writes the keypair the way ssh-keygen would
    struct KeygenShell {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ShellRunner for KeygenShell {
        async fn run(&self, command: &ShellCommand) -> E2eResult<ShellOutput> {
            self.calls.lock().unwrap().push(command.to_string());
            let pos = command.args.iter().position(|a| a == "-f").unwrap();
            let path = PathBuf::from(&command.args[pos + 1]);
            std::fs::write(&path, "PRIVATE").unwrap();
            std::fs::write(public_key_path(&path), "ssh-rsa AAAAB3Nza cloudprobe@localhost\n").unwrap();
            Ok(ShellOutput { code: Some(0), ..Default::default() })
        }
    }

    #[tokio::test]
    async fn test_generates_missing_key_once() {
        let dir = tempfile::tempdir().unwrap();
        let key = dir.path().join("ssh").join("id_rsa");
        let shell = KeygenShell { calls: Mutex::new(Vec::new()) };

        let first = prepare_ssh_key(&shell, &key).await.unwrap();
        assert_eq!(first, "ssh-rsa AAAAB3Nza cloudprobe@localhost");
        let second = prepare_ssh_key(&shell, &key).await.unwrap();
        assert_eq!(first, second);

        let calls = shell.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].starts_with("ssh-keygen -q -t rsa -b 4096"));
    }
}
