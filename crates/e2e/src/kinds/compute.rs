use async_trait::async_trait;
use regex::Regex;
use tracing::info;

use cloudprobe_common::ResourceHandle;

use super::{detail_section, modal_body, modal_footer, read_value, require_remote, FIELD_TIMEOUT};
use crate::config::EnvironmentSpec;
use crate::context::ScenarioContext;
use crate::driver::Locator;
use crate::error::{E2eError, E2eResult};
use crate::keys::prepare_ssh_key;
use crate::lifecycle::{Fact, ResourceOps};
use crate::poll::{wait_until, Wait};
use crate::profile::ResourceProfile;
use crate::ssh::RemoteCommand;

/// Virtual machine on the Compute / Instances page
pub struct ComputeInstance {
    profile: ResourceProfile,
}

impl ComputeInstance {
    pub fn new(env: &EnvironmentSpec) -> Self {
        Self {
            profile: env.customize(ResourceProfile::compute_instance()),
        }
    }
}

/// Make sure a local keypair exists and remember its public half
pub(crate) async fn load_public_key(cx: &mut ScenarioContext) -> E2eResult<String> {
    if let Some(key) = &cx.ssh_public_key {
        return Ok(key.clone());
    }
    let key = prepare_ssh_key(cx.shell.as_ref(), &cx.env.ssh.private_key()).await?;
    cx.ssh_public_key = Some(key.clone());
    Ok(key)
}

/// Tick the uploaded key in the instance form
pub(crate) fn key_checkbox(name: &str) -> Locator {
    Locator::css(format!("input.form-check-input[value=\"{}\"]", name))
}

#[async_trait]
impl ResourceOps for ComputeInstance {
    fn profile(&self) -> &ResourceProfile {
        &self.profile
    }

    async fn fill_create_form(&self, cx: &mut ScenarioContext, name: &str) -> E2eResult<()> {
        let key = load_public_key(cx).await?;
        let browser = cx.session.browser();

        cx.session
            .expect_visible(&Locator::text("Instance name: *"), FIELD_TIMEOUT, "instance name field")
            .await?;

        info!("uploading SSH Key");
        browser.click(&Locator::role("button", "+ Upload Key")).await?;
        let dialog = Locator::role("dialog", "");
        browser.fill(&dialog.clone().then_placeholder("Key Name"), name).await?;
        browser
            .fill(&dialog.clone().then_placeholder("Paste your key contents"), &key)
            .await?;
        browser
            .click(&dialog.then_css("div.modal-body").then_label("Upload key"))
            .await?;
        browser.check(&Locator::main().join(&key_checkbox(name))).await?;
        Ok(())
    }

    async fn verify_details(&self, cx: &mut ScenarioContext, handle: &ResourceHandle) -> E2eResult<Vec<Fact>> {
        let image = Regex::new("Ubuntu")?;
        verify_instance(cx, handle, &image, None).await
    }
}

/// Detail checks shared by compute and preview instances.
///
/// Leaves the channel pointed at the instance and proves it answers `uname`.
pub(crate) async fn verify_instance(
    cx: &mut ScenarioContext,
    handle: &ResourceHandle,
    image_pattern: &Regex,
    password: Option<&str>,
) -> E2eResult<Vec<Fact>> {
    let browser = cx.session.browser();
    let mut facts = Vec::new();

    // Details tab
    let rows = detail_section("Instance type information").then_css("div.row");
    let status = rows.clone().nth(0).then_css("div.col-md-3").nth(2).then_css("span").nth(1);
    cx.session.expect_text(&status, "Ready", FIELD_TIMEOUT).await?;
    facts.push(Fact::new("status", "Ready"));

    let image = read_value(cx, &rows.nth(1).then_css("div.col-md-3").nth(1), "machine image").await?;
    if !image_pattern.is_match(&image) {
        return Err(E2eError::AssertionFailed(format!(
            "machine image '{}' does not match {}",
            image, image_pattern
        )));
    }
    facts.push(Fact::new("image", image));

    // Networking tab
    browser.click(&Locator::main().then_role("button", "Networking")).await?;
    cx.session
        .expect_visible(
            &Locator::main().then_role("heading", "Networking interfaces"),
            FIELD_TIMEOUT,
            "Networking interfaces",
        )
        .await?;
    let ip_value = detail_section("Networking interfaces")
        .then_css("div.flex-column > span")
        .nth(1);
    let ip = read_value(cx, &ip_value, "instance IP").await?;
    info!("instance has IP = {}", ip);
    facts.push(Fact::new("ip", ip));

    // Security tab
    browser.click(&Locator::main().then_role("button", "Security")).await?;
    cx.session
        .expect_visible(
            &Locator::main().then_role("heading", "Instance Public Keys"),
            FIELD_TIMEOUT,
            "Instance Public Keys",
        )
        .await?;
    let keys = browser
        .text_content(&detail_section("Instance Public Keys").then_css("div.row").nth(0))
        .await?;
    if !keys.contains(&handle.name) {
        return Err(E2eError::AssertionFailed(format!(
            "instance {} does not list its key",
            handle.name
        )));
    }

    let line = read_connect_line(
        cx,
        &Locator::main().then_role("button", "How to Connect"),
        "How to connect to your instance",
    )
    .await?;
    browser.click(&modal_footer().then_text("Close")).await?;
    facts.push(Fact::new("connect", line));

    if cx.ssh_enabled() {
        let uname = RemoteCommand::new("uname").expecting("^Linux")?.password(password);
        require_remote(cx, uname, "checking by Linux uname").await?;
    } else {
        info!("skipping SSH test");
    }

    Ok(facts)
}

/// Open a dialog that reveals an `ssh -J` line, copy it into the channel
pub(crate) async fn read_connect_line(cx: &mut ScenarioContext, opener: &Locator, header: &str) -> E2eResult<String> {
    let browser = cx.session.browser();
    browser.click(opener).await?;
    cx.session
        .expect_visible(&Locator::css("div.modal-header").then_text(header), FIELD_TIMEOUT, header)
        .await?;

    let span = modal_body().then_css("pre > span").nth(1);
    let ui = browser.as_ref();
    let span_ref = &span;
    wait_until(&Wait::hard("ssh connect line", FIELD_TIMEOUT), move || async move {
        Ok(ui.text_content(span_ref).await?.contains("ssh -J"))
    })
    .await?;

    let line = browser.text_content(&span).await?;
    let line = line.trim().to_string();
    cx.channel.set_connect_line(&line)?;
    Ok(line)
}
