use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info};

use cloudprobe_common::ResourceHandle;

use super::{copy_value, detail_section, modal_body, modal_footer, read_value, require_remote, FIELD_TIMEOUT};
use super::compute::read_connect_line;
use crate::config::EnvironmentSpec;
use crate::context::ScenarioContext;
use crate::driver::Locator;
use crate::error::{E2eError, E2eResult};
use crate::lifecycle::{Fact, ResourceOps};
use crate::profile::ResourceProfile;
use crate::ssh::{escape_double_quoted, RemoteCommand};

const MOUNT_POINT: &str = "/mnt/test";

/// File storage volume, mounted from a compute instance during verify
pub struct FileVolume {
    profile: ResourceProfile,
    /// Instance the volume is mounted from
    instance: String,
}

impl FileVolume {
    pub fn new(env: &EnvironmentSpec, instance: impl Into<String>) -> Self {
        Self {
            profile: env.customize(ResourceProfile::file_volume()),
            instance: instance.into(),
        }
    }
}

/// Commands copied out of the "How to mount" dialog
struct MountCommands {
    install: String,
    login: String,
    mount: String,
}

#[async_trait]
impl ResourceOps for FileVolume {
    fn profile(&self) -> &ResourceProfile {
        &self.profile
    }

    async fn fill_create_form(&self, cx: &mut ScenarioContext, _name: &str) -> E2eResult<()> {
        let size = cx.env.storage.size_tb.to_string();
        cx.session
            .browser()
            .fill(&Locator::main().then_label("Storage Size (TB): *"), &size)
            .await
    }

    async fn verify_details(&self, cx: &mut ScenarioContext, handle: &ResourceHandle) -> E2eResult<Vec<Fact>> {
        let browser = cx.session.browser();
        let mut facts = Vec::new();

        let rows = detail_section("Volume information").then_css("div.row");
        let value = |row: usize, col: usize| {
            rows.clone()
                .nth(row)
                .then_css("div.flex-column")
                .nth(col)
                .then_css("span")
                .nth(1)
        };
        cx.session.expect_text(&value(0, 2), "Ready", FIELD_TIMEOUT).await?;
        let volume_id = read_value(cx, &value(0, 0), "volume ID").await?;
        let cluster = read_value(cx, &value(1, 0), "cluster").await?;
        info!("volume {} has ID {} on cluster {}", handle.name, volume_id, cluster);
        facts.push(Fact::new("volume id", volume_id));
        facts.push(Fact::new("state", "Ready"));
        facts.push(Fact::new("cluster", cluster));

        // Security tab
        browser.click(&Locator::main().then_role("button", "Security")).await?;
        cx.session
            .expect_visible(
                &Locator::main().then_role("heading", "Volume credentials"),
                FIELD_TIMEOUT,
                "Volume credentials",
            )
            .await?;
        let user = copy_value(cx, &Locator::main().then_label("Copy User")).await?;
        browser.click(&Locator::main().then_role("button", "Generate password")).await?;
        cx.session
            .expect_visible(&Locator::main().then_text("Password:"), Duration::from_secs(30), "volume password")
            .await?;
        let password = copy_value(cx, &Locator::main().then_label("Copy Password")).await?;
        if password.is_empty() {
            return Err(E2eError::AssertionFailed(format!("volume {} password is empty", handle.name)));
        }
        cx.secrets.volume_user = Some(user);
        cx.secrets.volume_password = Some(password.clone());

        let commands = self.read_mount_commands(cx).await?;
        browser.click(&modal_footer().then_text("Close")).await?;

        if cx.ssh_enabled() {
            self.mount_and_check(cx, handle, &commands, &password).await?;
        } else {
            info!("skipping SSH test");
        }

        Ok(facts)
    }
}

impl FileVolume {
    async fn read_mount_commands(&self, cx: &mut ScenarioContext) -> E2eResult<MountCommands> {
        let browser = cx.session.browser();
        browser.click(&Locator::main().then_role("button", "How to mount")).await?;
        let header = "How to mount storage volume";
        cx.session
            .expect_visible(&Locator::css("div.modal-header").then_text(header), FIELD_TIMEOUT, header)
            .await?;

        browser.click(&modal_body().then_role("button", "Single instance")).await?;
        browser.click(&modal_body().then_label("Instance: *")).await?;
        browser
            .click(&modal_body().then_label(format!("Select option {} -IP: ", self.instance)))
            .await?;

        read_connect_line(cx, &modal_body().then_role("button", "Connect to your instance:"), header).await?;

        browser.click(&modal_body().then_role("button", "Mount your volume:")).await?;
        let copy = |index: usize| modal_body().then_css("button:has-text(\"Copy\")").nth(index);
        let install = copy_value(cx, &copy(2)).await?;
        let login = copy_value(cx, &copy(3)).await?;
        let mount = copy_value(cx, &copy(5)).await?;
        for (what, value) in [("install", &install), ("login", &login), ("mount", &mount)] {
            if value.is_empty() {
                return Err(E2eError::AssertionFailed(format!("{} command is empty", what)));
            }
        }
        Ok(MountCommands { install, login, mount })
    }

    async fn mount_and_check(
        &self,
        cx: &mut ScenarioContext,
        handle: &ResourceHandle,
        commands: &MountCommands,
        password: &str,
    ) -> E2eResult<()> {
        require_remote(cx, RemoteCommand::new("uname").expecting("^Linux")?, "checking by Linux uname").await?;
        require_remote(cx, RemoteCommand::new(format!("sudo mkdir {}", MOUNT_POINT)), "creating mount point").await?;
        require_remote(
            cx,
            RemoteCommand::new(commands.install.as_str())
                .expecting("Installation finished successfully")?
                .timeout(Duration::from_secs(30)),
            "installing storage client",
        )
        .await?;
        let escaped = escape_double_quoted(password);
        require_remote(
            cx,
            RemoteCommand::new(format!("{} \"{}\"", commands.login, escaped))
                .secret(&escaped)
                .expecting("Login completed successfully")?
                .timeout(Duration::from_secs(30)),
            "storage client login",
        )
        .await?;

        let mount = RemoteCommand::new(commands.mount.as_str())
            .expecting("Mount completed successfully")?
            .timeout(Duration::from_secs(420));
        if !cx.remote(&mount).await {
            error!("mount of {} failed, dumping driver build log", handle.name);
            // never matches, so the channel logs whatever the file holds
            let log = RemoteCommand::new("sudo cat /opt/weka/data/dependencies/build-20*.log")
                .expecting("^build log dump$")?
                .timeout(Duration::from_secs(30));
            cx.remote(&log).await;
            return Err(E2eError::AssertionFailed(format!("mounting volume {}", handle.name)));
        }

        let name = regex::escape(&handle.name);
        require_remote(
            cx,
            RemoteCommand::new("mount| grep wekafs")
                .expecting(&format!("{} on {} type wekafs", name, MOUNT_POINT))?,
            "listing the mount",
        )
        .await?;
        require_remote(
            cx,
            RemoteCommand::new(format!("df -h {}/", MOUNT_POINT)).expecting(&name)?,
            "checking mounted volume size",
        )
        .await?;
        require_remote(
            cx,
            RemoteCommand::new(format!("sudo umount {}", MOUNT_POINT)).expecting("Umount completed successfully")?,
            "unmounting the volume",
        )
        .await?;
        Ok(())
    }
}
