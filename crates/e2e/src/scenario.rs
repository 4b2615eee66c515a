//! Scenario drivers
//!
//! A scenario composes the lifecycle operations of one or more kinds in
//! dependency order. Storage scenarios need a compute instance as their SSH
//! target, so it is created first and torn down last.

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{error, info};

use crate::context::ScenarioContext;
use crate::error::{E2eError, E2eResult};
use crate::kinds::{ComputeInstance, FileVolume, ObjectBucket, PreviewInstance, Principal, SshKey};
use crate::lifecycle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    /// Compute instance with its SSH key
    Vmaas,
    /// Preview instance with its preview key
    Preview,
    /// File storage volume mounted from a compute instance
    StaasFs,
    /// Object storage bucket listed from a compute instance
    StaasOs,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [Scenario::Vmaas, Scenario::Preview, Scenario::StaasFs, Scenario::StaasOs];

    pub fn id(&self) -> &'static str {
        match self {
            Scenario::Vmaas => "vmaas",
            Scenario::Preview => "preview",
            Scenario::StaasFs => "staas-fs",
            Scenario::StaasOs => "staas-os",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Scenario::Vmaas => "create, verify and delete a compute instance",
            Scenario::Preview => "create, verify and delete a preview instance",
            Scenario::StaasFs => "mount a file storage volume from a compute instance",
            Scenario::StaasOs => "list an object storage bucket from a compute instance",
        }
    }

    /// Resource name used when none is given
    pub fn default_name(&self) -> &'static str {
        match self {
            Scenario::Vmaas => "cp01-vmaas",
            Scenario::Preview => "cp02-preview",
            Scenario::StaasFs => "cp03-staas",
            Scenario::StaasOs => "cp04-staas",
        }
    }

    /// Preview lives outside the regional consoles
    pub fn selects_region(&self) -> bool {
        !matches!(self, Scenario::Preview)
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Scenario {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .into_iter()
            .find(|sc| sc.id() == s)
            .ok_or_else(|| E2eError::Config(format!("unknown scenario '{}'", s)))
    }
}

/// Result of a single step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Records every step a scenario runs, pass or fail
#[derive(Debug, Default)]
pub struct StepLog {
    steps: Vec<StepResult>,
}

impl StepLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one named step and record its outcome
    pub async fn step<T, Fut>(&mut self, name: impl Into<String>, fut: Fut) -> E2eResult<T>
    where
        Fut: Future<Output = E2eResult<T>>,
    {
        let name = name.into();
        info!("step: {}", name);
        let started = Instant::now();
        let result = fut.await;
        let duration_ms = started.elapsed().as_millis() as u64;
        if let Err(e) = &result {
            error!("step '{}' failed: {}", name, e);
        }
        self.steps.push(StepResult {
            step_name: name,
            success: result.is_ok(),
            duration_ms,
            error: result.as_ref().err().map(|e| e.to_string()),
        });
        result
    }

    pub fn steps(&self) -> &[StepResult] {
        &self.steps
    }

    pub fn into_steps(self) -> Vec<StepResult> {
        self.steps
    }
}

/// Log in and pick the region the scenario runs in
pub async fn sign_in(scenario: Scenario, cx: &mut ScenarioContext, log: &mut StepLog) -> E2eResult<()> {
    log.step("Login to Console", cx.session.login()).await?;
    if scenario.selects_region() {
        log.step("Select Region", cx.session.select_region()).await?;
    }
    Ok(())
}

/// Run the whole scenario against an authenticated session
pub async fn execute(scenario: Scenario, cx: &mut ScenarioContext, name: &str, log: &mut StepLog) -> E2eResult<()> {
    info!("running scenario {} with name {}", scenario, name);
    match scenario {
        Scenario::Vmaas => {
            compute_pre_cleanup(cx, name, log).await?;
            let vm = ComputeInstance::new(&cx.env);
            log.step(format!("Create VM instance {}", name), lifecycle::create(cx, &vm, name))
                .await?;
            log.step(format!("Verify VM instance {}", name), lifecycle::verify(cx, &vm, name))
                .await?;
            compute_teardown(cx, name, log).await?;
        }
        Scenario::Preview => {
            preview_pre_cleanup(cx, name, log).await?;
            let pv = PreviewInstance::new(&cx.env);
            log.step(format!("Create Preview instance {}", name), lifecycle::create(cx, &pv, name))
                .await?;
            log.step(format!("Verify Preview instance {}", name), lifecycle::verify(cx, &pv, name))
                .await?;
            log.step(format!("Delete Preview instance {}", name), lifecycle::delete(cx, &pv, name))
                .await?;
            let key = SshKey::preview(&cx.env);
            log.step(format!("Delete Preview SSH key {}", name), lifecycle::delete(cx, &key, name))
                .await?;
        }
        Scenario::StaasFs => {
            let fs = FileVolume::new(&cx.env, name);
            log.step(format!("STaaS-FS pre-cleanup for {}", name), lifecycle::pre_cleanup(cx, &fs, name))
                .await?;
            compute_pre_cleanup(cx, name, log).await?;
            let vm = ComputeInstance::new(&cx.env);
            log.step(format!("Create VM instance {}", name), lifecycle::create(cx, &vm, name))
                .await?;
            log.step(format!("Create STaaS-FS volume {}", name), lifecycle::create(cx, &fs, name))
                .await?;
            log.step(format!("Verify STaaS-FS volume {}", name), lifecycle::verify(cx, &fs, name))
                .await?;
            log.step(format!("Delete STaaS-FS volume {}", name), lifecycle::delete(cx, &fs, name))
                .await?;
            compute_teardown(cx, name, log).await?;
        }
        Scenario::StaasOs => {
            bucket_pre_cleanup(cx, name, log).await?;
            compute_pre_cleanup(cx, name, log).await?;
            let vm = ComputeInstance::new(&cx.env);
            log.step(format!("Create VM instance {}", name), lifecycle::create(cx, &vm, name))
                .await?;
            // captures the connect line the bucket checks run over
            log.step(format!("Verify VM instance {}", name), lifecycle::verify(cx, &vm, name))
                .await?;
            let os = ObjectBucket::new(&cx.env);
            log.step(format!("Create STaaS-OS bucket {}", name), lifecycle::create(cx, &os, name))
                .await?;
            log.step(format!("Verify STaaS-OS bucket {}", name), lifecycle::verify(cx, &os, name))
                .await?;
            log.step(format!("Delete STaaS-OS bucket {}", name), lifecycle::delete(cx, &os, name))
                .await?;
            compute_teardown(cx, name, log).await?;
        }
    }
    info!("scenario {} passed", scenario);
    Ok(())
}

/// Remove every leftover the scenario would collide with, without creating
/// anything.
pub async fn pre_cleanup(scenario: Scenario, cx: &mut ScenarioContext, name: &str, log: &mut StepLog) -> E2eResult<()> {
    match scenario {
        Scenario::Vmaas => compute_pre_cleanup(cx, name, log).await,
        Scenario::Preview => preview_pre_cleanup(cx, name, log).await,
        Scenario::StaasFs => {
            let fs = FileVolume::new(&cx.env, name);
            log.step(format!("STaaS-FS pre-cleanup for {}", name), lifecycle::pre_cleanup(cx, &fs, name))
                .await?;
            compute_pre_cleanup(cx, name, log).await
        }
        Scenario::StaasOs => {
            bucket_pre_cleanup(cx, name, log).await?;
            compute_pre_cleanup(cx, name, log).await
        }
    }
}

async fn compute_pre_cleanup(cx: &mut ScenarioContext, name: &str, log: &mut StepLog) -> E2eResult<()> {
    let key = SshKey::compute(&cx.env);
    let vm = ComputeInstance::new(&cx.env);
    log.step(format!("SSH key pre-cleanup for {}", name), lifecycle::pre_cleanup(cx, &key, name))
        .await?;
    log.step(format!("VMaaS pre-cleanup for {}", name), lifecycle::pre_cleanup(cx, &vm, name))
        .await
}

async fn compute_teardown(cx: &mut ScenarioContext, name: &str, log: &mut StepLog) -> E2eResult<()> {
    let vm = ComputeInstance::new(&cx.env);
    let key = SshKey::compute(&cx.env);
    log.step(format!("Delete VM instance {}", name), lifecycle::delete(cx, &vm, name))
        .await?;
    log.step(format!("Delete SSH key {}", name), lifecycle::delete(cx, &key, name))
        .await
}

async fn preview_pre_cleanup(cx: &mut ScenarioContext, name: &str, log: &mut StepLog) -> E2eResult<()> {
    let pv = PreviewInstance::new(&cx.env);
    let key = SshKey::preview(&cx.env);
    log.step(format!("Preview pre-cleanup for {}", name), lifecycle::pre_cleanup(cx, &pv, name))
        .await?;
    log.step(format!("Preview SSH key pre-cleanup for {}", name), lifecycle::pre_cleanup(cx, &key, name))
        .await
}

/// The bucket delete also removes its principal; a principal left behind by
/// an interrupted run is cleaned up on its own.
async fn bucket_pre_cleanup(cx: &mut ScenarioContext, name: &str, log: &mut StepLog) -> E2eResult<()> {
    let os = ObjectBucket::new(&cx.env);
    let principal = Principal::new(&cx.env);
    log.step(format!("STaaS-OS pre-cleanup for {}", name), lifecycle::pre_cleanup(cx, &os, name))
        .await?;
    log.step(format!("Principal pre-cleanup for {}", name), lifecycle::pre_cleanup(cx, &principal, name))
        .await
}
