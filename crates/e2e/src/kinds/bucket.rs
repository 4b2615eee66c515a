use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use cloudprobe_common::ResourceHandle;

use super::principal::Principal;
use super::{copy_value, detail_section, modal_footer, read_value, require_remote, FIELD_TIMEOUT};
use crate::config::EnvironmentSpec;
use crate::context::ScenarioContext;
use crate::driver::Locator;
use crate::error::{E2eError, E2eResult};
use crate::lifecycle::{self, Fact, ResourceOps};
use crate::profile::ResourceProfile;
use crate::ssh::{escape_double_quoted, RemoteCommand};

const APT: &str = "sudo DEBIAN_FRONTEND=noninteractive NEEDRESTART_MODE=a apt-get";

/// Object storage bucket. The console prefixes the name server-side; a
/// principal of the same name is created to reach it over S3.
pub struct ObjectBucket {
    profile: ResourceProfile,
    principal: Principal,
}

impl ObjectBucket {
    pub fn new(env: &EnvironmentSpec) -> Self {
        Self {
            profile: env.customize(ResourceProfile::object_bucket()),
            principal: Principal::new(env),
        }
    }
}

#[async_trait]
impl ResourceOps for ObjectBucket {
    fn profile(&self) -> &ResourceProfile {
        &self.profile
    }

    async fn fill_create_form(&self, cx: &mut ScenarioContext, name: &str) -> E2eResult<()> {
        cx.session
            .browser()
            .fill(&Locator::main().then_placeholder("Description"), &format!("bucket {}", name))
            .await
    }

    async fn after_ready(&self, cx: &mut ScenarioContext, handle: &ResourceHandle) -> E2eResult<()> {
        cx.bucket_name = Some(handle.rendered_name.clone());
        lifecycle::create(cx, &self.principal, &handle.name).await?;
        Ok(())
    }

    async fn verify_details(&self, cx: &mut ScenarioContext, handle: &ResourceHandle) -> E2eResult<Vec<Fact>> {
        let rows = detail_section("Bucket information").then_css("div.row");
        let value = |col: usize| {
            rows.clone()
                .nth(0)
                .then_css("div.flex-column")
                .nth(col)
                .then_css("span")
                .nth(1)
        };
        cx.session.expect_text(&value(3), "Ready", FIELD_TIMEOUT).await?;
        let bucket_id = read_value(cx, &value(0), "bucket ID").await?;
        let endpoint = copy_value(cx, &Locator::main().then_label("Copy Private Endpoint URL")).await?;
        if endpoint.is_empty() {
            return Err(E2eError::AssertionFailed(format!("bucket {} has no endpoint", handle.name)));
        }
        info!("bucket {} has ID {}, endpoint {}", handle.name, bucket_id, endpoint);

        if cx.ssh_enabled() {
            self.list_over_s3(cx, handle, &endpoint).await?;
        } else {
            info!("skipping SSH test");
        }

        Ok(vec![
            Fact::new("bucket id", bucket_id),
            Fact::new("state", "Ready"),
            Fact::new("endpoint", endpoint),
        ])
    }

    /// Acknowledge the deletion notice and remove the bucket's principal
    async fn after_delete(&self, cx: &mut ScenarioContext, name: &str) -> E2eResult<()> {
        let browser = cx.session.browser();
        let ok = modal_footer().then_role("button", "OK");
        if cx.session.appears_within(&Locator::text("Your bucket was deleted"), FIELD_TIMEOUT).await? {
            browser.click(&ok).await?;
        }
        cx.bucket_name = None;

        let state = lifecycle::observe(cx, self.principal.profile(), name).await?;
        if state != cloudprobe_common::ResourceState::Absent {
            lifecycle::delete(cx, &self.principal, name).await?;
        }
        Ok(())
    }
}

impl ObjectBucket {
    async fn list_over_s3(&self, cx: &mut ScenarioContext, handle: &ResourceHandle, endpoint: &str) -> E2eResult<()> {
        let (access_key, secret_key) = match (&cx.secrets.access_key, &cx.secrets.secret_key) {
            (Some(ak), Some(sk)) => (ak.clone(), sk.clone()),
            _ => {
                return Err(E2eError::StepFailed {
                    step: "bucket verify".into(),
                    reason: "no principal access keys were captured".into(),
                })
            }
        };
        let bucket = cx.bucket_name.clone().unwrap_or_else(|| handle.rendered_name.clone());

        // background upgrades hold the dpkg lock
        for action in ["disable --now", "stop"] {
            let cmd = RemoteCommand::new(format!("sudo systemctl {} unattended-upgrades", action))
                .timeout(Duration::from_secs(45));
            cx.remote(&cmd).await;
        }

        require_remote(
            cx,
            RemoteCommand::new(format!("{} update", APT)).timeout(Duration::from_secs(180)),
            "apt-get update",
        )
        .await?;
        require_remote(
            cx,
            RemoteCommand::new(format!("{} install awscli -y", APT)).timeout(Duration::from_secs(420)),
            "installing awscli",
        )
        .await?;
        require_remote(
            cx,
            RemoteCommand::new("aws --version")
                .expecting("aws-cli/.+ Python/.+ Linux/.+ botocore/.+")?
                .timeout(Duration::from_secs(30)),
            "aws cli version",
        )
        .await?;

        let escaped = escape_double_quoted(&secret_key);
        let ls = format!(
            "AWS_ACCESS_KEY_ID=\"{}\" AWS_SECRET_ACCESS_KEY=\"{}\" aws s3 ls --endpoint-url={}",
            access_key, escaped, endpoint
        );
        require_remote(
            cx,
            RemoteCommand::new(ls)
                .secret(&escaped)
                .expecting(&regex::escape(&bucket))?
                .timeout(Duration::from_secs(30)),
            "listing buckets over S3",
        )
        .await?;
        Ok(())
    }
}
