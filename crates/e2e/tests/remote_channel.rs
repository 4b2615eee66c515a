//! Remote command channel over a scripted shell

mod support;

use std::sync::Arc;
use std::time::Duration;

use cloudprobe_e2e::ssh::{escape_double_quoted, RemoteChannel, RemoteCommand, SshSettings};

use support::{FakeShell, CONNECT_LINE};

fn settings(dir: &std::path::Path, proxy: Option<&str>) -> SshSettings {
    SshSettings {
        socks_proxy: proxy.map(String::from),
        config_path: dir.join("config"),
        connect_timeout: Duration::from_secs(12),
    }
}

#[tokio::test]
async fn uname_over_the_bastion() {
    let dir = tempfile::tempdir().unwrap();
    let shell = Arc::new(FakeShell::new().stdout("uname", "Linux\n"));
    let mut channel = RemoteChannel::new(shell.clone(), settings(dir.path(), None));
    channel.set_connect_line(CONNECT_LINE).unwrap();

    let uname = RemoteCommand::new("uname").expecting("^Linux").unwrap();
    assert!(channel.run(&uname).await);
    assert!(channel.is_initialized());

    let calls = shell.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].program, "ssh");
    assert_eq!(calls[0].args[0], "guest@146.152.232.8");
    assert!(calls[0].args.contains(&"StrictHostKeyChecking=no".to_string()));
    assert_eq!(
        &calls[1].args[..3],
        &["-J".to_string(), "guest@146.152.232.8".to_string(), "ubuntu@100.80.195.99".to_string()]
    );
    assert!(calls[1].args.contains(&"ConnectTimeout=12".to_string()));
}

#[tokio::test]
async fn bastion_hop_is_negotiated_once() {
    let dir = tempfile::tempdir().unwrap();
    let shell = Arc::new(FakeShell::new().stdout("uname", "Linux\n"));
    let mut channel = RemoteChannel::new(shell.clone(), settings(dir.path(), None));
    channel.set_connect_line(CONNECT_LINE).unwrap();

    let uname = RemoteCommand::new("uname").expecting("^Linux").unwrap();
    assert!(channel.run(&uname).await);
    assert!(channel.run(&RemoteCommand::new("sudo mkdir /mnt/test")).await);

    // same bastion, new target: the hop is kept
    channel
        .set_connect_line("ssh -J guest@146.152.232.8 ubuntu@100.80.195.100")
        .unwrap();
    assert!(channel.run(&uname).await);
    assert_eq!(shell.probes(), 1);
}

#[tokio::test]
async fn success_banner_on_stderr_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let shell = Arc::new(FakeShell::new().stderr("weka mount", "Mount completed successfully\n"));
    let mut channel = RemoteChannel::new(shell, settings(dir.path(), None));
    channel.set_connect_line(CONNECT_LINE).unwrap();

    let mount = RemoteCommand::new("sudo weka mount cp03-staas /mnt/test")
        .expecting("Mount completed successfully")
        .unwrap();
    assert!(channel.run(&mount).await);
}

#[tokio::test]
async fn unreachable_bastion_reports_false() {
    let dir = tempfile::tempdir().unwrap();
    let shell = Arc::new(FakeShell::new().stdout("uname", "Linux\n").bastion_down());
    let mut channel = RemoteChannel::new(shell.clone(), settings(dir.path(), None));
    channel.set_connect_line(CONNECT_LINE).unwrap();

    let uname = RemoteCommand::new("uname").expecting("^Linux").unwrap();
    assert!(!channel.run(&uname).await);
    assert!(!channel.is_initialized());
    assert!(shell.remote_commands().is_empty());
}

#[tokio::test]
async fn missing_connect_line_reports_false() {
    let dir = tempfile::tempdir().unwrap();
    let mut channel = RemoteChannel::new(Arc::new(FakeShell::new()), settings(dir.path(), None));
    assert!(!channel.run(&RemoteCommand::new("uname")).await);
}

#[tokio::test]
async fn socks_proxy_directive_and_config_flag() {
    let dir = tempfile::tempdir().unwrap();
    let shell = Arc::new(FakeShell::new().stdout("uname", "Linux\n"));
    let mut channel = RemoteChannel::new(shell.clone(), settings(dir.path(), Some("proxy.example:1080")));
    channel.set_connect_line(CONNECT_LINE).unwrap();

    let uname = RemoteCommand::new("uname").expecting("^Linux").unwrap();
    assert!(channel.run(&uname).await);

    let config = std::fs::read_to_string(dir.path().join("config")).unwrap();
    assert!(config.contains("Host 146.152.232.8"));
    assert!(config.contains("ProxyCommand nc -x proxy.example:1080 %h %p"));
    assert!(shell.calls().iter().all(|c| c.args.contains(&"-F".to_string())));
}

#[tokio::test]
async fn target_password_goes_through_sshpass_masked() {
    let dir = tempfile::tempdir().unwrap();
    let shell = Arc::new(FakeShell::new().stdout("uname", "Linux\n"));
    let mut channel = RemoteChannel::new(shell.clone(), settings(dir.path(), None));
    channel
        .set_connect_line("ssh-keygen -R 192.168.12.2; ssh -J guest@10.0.0.1 devcloud@192.168.12.2")
        .unwrap();

    let uname = RemoteCommand::new("uname")
        .expecting("^Linux")
        .unwrap()
        .password(Some("pr3view!"));
    assert!(channel.run(&uname).await);

    let remote = shell.calls().pop().unwrap();
    assert_eq!(remote.program, "sshpass");
    assert!(remote.args.contains(&"pr3view!".to_string()));
    let shown = remote.to_string();
    assert!(!shown.contains("pr3view!"));
    assert!(shown.starts_with("sshpass -p *** ssh -J guest@10.0.0.1 devcloud@192.168.12.2"));
}

#[tokio::test]
async fn secret_spans_never_reach_the_logged_command_line() {
    let dir = tempfile::tempdir().unwrap();
    let shell = Arc::new(FakeShell::new().stdout("aws s3 ls", "2024-05-01 10:00:00 249000000001-cp04-staas\n"));
    let mut channel = RemoteChannel::new(shell.clone(), settings(dir.path(), None));
    channel.set_connect_line(CONNECT_LINE).unwrap();

    let secret = escape_double_quoted("wJalr$XUtnFEMI/K7MDENG");
    let ls = RemoteCommand::new(format!(
        "AWS_ACCESS_KEY_ID=\"AKIA42\" AWS_SECRET_ACCESS_KEY=\"{}\" aws s3 ls --endpoint-url=https://s3.example.com",
        secret
    ))
    .secret(&secret)
    .expecting("cp04-staas")
    .unwrap();
    assert!(!ls.masked().contains(&secret));
    assert!(channel.run(&ls).await);

    let calls = shell.calls();
    for call in &calls {
        assert!(!call.to_string().contains(&secret), "secret logged in {}", call);
        assert!(!call.to_string().contains("wJalr"));
    }
    let remote = calls.last().unwrap();
    assert!(remote.args.last().unwrap().contains(&secret));
    assert!(remote.to_string().contains("AWS_SECRET_ACCESS_KEY=\"***\""));
}
