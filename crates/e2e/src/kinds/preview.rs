use async_trait::async_trait;
use regex::Regex;
use tracing::info;

use cloudprobe_common::ResourceHandle;

use super::compute::{key_checkbox, load_public_key, verify_instance};
use super::FIELD_TIMEOUT;
use crate::config::EnvironmentSpec;
use crate::context::ScenarioContext;
use crate::driver::Locator;
use crate::error::E2eResult;
use crate::lifecycle::{Fact, ResourceOps};
use crate::profile::ResourceProfile;

/// Preview bare-metal instance. An account may hold only one at a time.
pub struct PreviewInstance {
    profile: ResourceProfile,
}

impl PreviewInstance {
    pub fn new(env: &EnvironmentSpec) -> Self {
        Self {
            profile: env.customize(ResourceProfile::preview_instance()),
        }
    }
}

#[async_trait]
impl ResourceOps for PreviewInstance {
    fn profile(&self) -> &ResourceProfile {
        &self.profile
    }

    async fn fill_create_form(&self, cx: &mut ScenarioContext, name: &str) -> E2eResult<()> {
        let key = load_public_key(cx).await?;
        let instance_type = cx.env.preview_instance_type()?.to_string();
        let browser = cx.session.browser();

        browser.check(&Locator::role("radio", "Select CPU products")).await?;
        cx.session
            .expect_visible(&Locator::text("Instance Type"), FIELD_TIMEOUT, "instance type list")
            .await?;
        browser
            .check(&Locator::css(format!("input[name=\"{}\"]", instance_type)))
            .await?;
        browser
            .fill(&Locator::placeholder("e.g., AI model(s) used"), "automated lifecycle check")
            .await?;

        info!("uploading Preview SSH Key");
        browser.click(&Locator::role("button", "+ Upload Key")).await?;
        let dialog = Locator::role("dialog", "");
        browser.fill(&dialog.clone().then_label("Key Name: *"), name).await?;
        browser
            .fill(&dialog.clone().then_label("Associated Email: *"), &cx.session.identity().user)
            .await?;
        browser
            .fill(&dialog.clone().then_label("Paste your key contents: *"), &key)
            .await?;
        let upload = dialog.then_css("div.modal-body").then_label("Upload key");
        browser.click(&upload).await?;
        cx.session
            .expect_hidden(&upload, FIELD_TIMEOUT, "Preview key upload dialog")
            .await?;

        browser.check(&key_checkbox(name)).await?;
        Ok(())
    }

    async fn verify_details(&self, cx: &mut ScenarioContext, handle: &ResourceHandle) -> E2eResult<Vec<Fact>> {
        let image = Regex::new("Ubuntu|CentOS")?;
        let password = cx.env.preview.password.clone();
        verify_instance(cx, handle, &image, password.as_deref()).await
    }
}
