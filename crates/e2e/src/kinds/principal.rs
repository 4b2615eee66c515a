use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use cloudprobe_common::ResourceHandle;

use super::{copy_value, FIELD_TIMEOUT};
use crate::config::EnvironmentSpec;
use crate::context::ScenarioContext;
use crate::driver::Locator;
use crate::error::{E2eError, E2eResult};
use crate::lifecycle::{find_row, Fact, ResourceOps};
use crate::profile::ResourceProfile;

const SELECT_ALL: &str = "Select/Deselect All";

/// Object storage principal. Created for a bucket so that it can be reached
/// with access keys; deleted together with it.
pub struct Principal {
    profile: ResourceProfile,
}

impl Principal {
    pub fn new(env: &EnvironmentSpec) -> Self {
        Self {
            profile: env.customize(ResourceProfile::principal()),
        }
    }
}

#[async_trait]
impl ResourceOps for Principal {
    fn profile(&self) -> &ResourceProfile {
        &self.profile
    }

    async fn fill_create_form(&self, cx: &mut ScenarioContext, _name: &str) -> E2eResult<()> {
        // bucket selection, then permissions
        let browser = cx.session.browser();
        for index in 0..2 {
            browser.click(&Locator::main().then_text(SELECT_ALL).nth(index)).await?;
        }
        Ok(())
    }

    /// Generate the access key pair and keep it for the bucket checks
    async fn after_ready(&self, cx: &mut ScenarioContext, handle: &ResourceHandle) -> E2eResult<()> {
        let browser = cx.session.browser();
        browser.click(&find_row(&handle.name).then_text(handle.name.as_str())).await?;

        browser.click(&Locator::main().then_label("Generate password")).await?;
        cx.session
            .expect_visible(&Locator::main().then_text("Access Key:"), FIELD_TIMEOUT, "generated access key")
            .await?;

        let access_key = copy_value(cx, &Locator::main().then_label("Copy access key")).await?;
        let secret_key = copy_value(cx, &Locator::main().then_label("Copy secret key")).await?;
        if access_key.is_empty() || secret_key.is_empty() {
            return Err(E2eError::AssertionFailed(format!(
                "principal {} did not yield an access key pair",
                handle.name
            )));
        }
        info!("principal {} access key = {}", handle.name, access_key);
        cx.secrets.access_key = Some(access_key);
        cx.secrets.secret_key = Some(secret_key);
        Ok(())
    }

    async fn verify_details(&self, cx: &mut ScenarioContext, handle: &ResourceHandle) -> E2eResult<Vec<Fact>> {
        let heading = Locator::main().then_text(format!("Principal: {}", handle.name));
        cx.session
            .expect_visible(&heading, Duration::from_secs(10), "principal details")
            .await?;
        Ok(vec![Fact::new("principal", handle.rendered_name.clone())])
    }
}
