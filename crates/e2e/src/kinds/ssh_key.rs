use async_trait::async_trait;

use cloudprobe_common::ResourceHandle;

use crate::config::EnvironmentSpec;
use crate::context::ScenarioContext;
use crate::error::E2eResult;
use crate::lifecycle::{Fact, ResourceOps};
use crate::profile::ResourceProfile;

/// Uploaded public key. Uploaded by the instance create form, listed and
/// deleted on its own tab.
pub struct SshKey {
    profile: ResourceProfile,
}

impl SshKey {
    /// Keys on the Compute / Keys tab
    pub fn compute(env: &EnvironmentSpec) -> Self {
        Self {
            profile: env.customize(ResourceProfile::compute_keys()),
        }
    }

    /// Keys on the Preview / Preview Keys tab
    pub fn preview(env: &EnvironmentSpec) -> Self {
        Self {
            profile: env.customize(ResourceProfile::preview_keys()),
        }
    }
}

#[async_trait]
impl ResourceOps for SshKey {
    fn profile(&self) -> &ResourceProfile {
        &self.profile
    }

    async fn verify_details(&self, _cx: &mut ScenarioContext, handle: &ResourceHandle) -> E2eResult<Vec<Fact>> {
        Ok(vec![Fact::new("key", handle.rendered_name.clone())])
    }
}
