//! Resource lifecycle state machine
//!
//! ```text
//! [absent] --create--> [Provisioning] --poll ready--> [Ready]
//! [Ready]  --delete(confirm by typed name)--> [Terminating] --poll gone--> [absent]
//! ```
//!
//! The same protocol drives every kind. A [`ResourceOps`] supplies the
//! kind's [`ResourceProfile`] plus the few steps that differ per kind: form
//! fields, post-create work, and the detail checks behind `verify`.
//!
//! State is never written, only read back from the status cell of the row
//! whose name cell reads the resource name.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use cloudprobe_common::{ResourceHandle, ResourceState};

use crate::context::ScenarioContext;
use crate::driver::{Browser, Locator, UiDriver};
use crate::error::{E2eError, E2eResult};
use crate::poll::{wait_until, wait_until_gone, wait_until_gone_with_refresh, Refresh, Wait, IO_POLL};
use crate::profile::{DetailLink, ResourceProfile};

const ROW_APPEAR_TIMEOUT: Duration = Duration::from_secs(30);
const DIALOG_TIMEOUT: Duration = Duration::from_secs(10);
const FORM_TIMEOUT: Duration = Duration::from_secs(20);

/// One secondary fact read back from a detail view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    pub label: String,
    pub value: String,
}

impl Fact {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Outcome of a successful `verify`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verification {
    pub handle: ResourceHandle,
    pub state: ResourceState,
    pub facts: Vec<Fact>,
}

/// Kind-specific steps plugged into the shared protocol
#[async_trait]
pub trait ResourceOps: Send + Sync {
    fn profile(&self) -> &ResourceProfile;

    /// Fill the kind's own create-form fields. The name field and submit are
    /// handled by [`create`].
    async fn fill_create_form(&self, _cx: &mut ScenarioContext, _name: &str) -> E2eResult<()> {
        Ok(())
    }

    /// Runs once the new row reads Ready
    async fn after_ready(&self, _cx: &mut ScenarioContext, _handle: &ResourceHandle) -> E2eResult<()> {
        Ok(())
    }

    /// Read secondary facts from the open detail view and run remote checks.
    async fn verify_details(&self, cx: &mut ScenarioContext, handle: &ResourceHandle) -> E2eResult<Vec<Fact>>;

    /// Runs once the row is gone
    async fn after_delete(&self, _cx: &mut ScenarioContext, _name: &str) -> E2eResult<()> {
        Ok(())
    }
}

/// The kind's listing table
pub fn table() -> Locator {
    Locator::main().then_css("table.table")
}

/// First row named `name`; `t1` never matches a `t10` row
pub fn find_row(name: &str) -> Locator {
    table().row(name).nth(0)
}

/// Read the state of `name` from the currently open listing
pub async fn read_state(ui: &dyn UiDriver, profile: &ResourceProfile, name: &str) -> E2eResult<ResourceState> {
    let row = find_row(name);
    if ui.count(&row).await? == 0 {
        return Ok(ResourceState::Absent);
    }
    match profile.status_column {
        Some(column) => {
            let label = ui.text_content(&row.cell(column)).await?;
            Ok(ResourceState::from_label(&label, &profile.terminating_label))
        }
        None => Ok(ResourceState::Ready),
    }
}

/// Navigate to the kind's listing and report the state of `name`
pub async fn observe(cx: &ScenarioContext, profile: &ResourceProfile, name: &str) -> E2eResult<ResourceState> {
    cx.session.open_list(&profile.page).await?;
    let browser = cx.session.browser();
    read_state(browser.as_ref(), profile, name).await
}

async fn rendered_name(ui: &dyn UiDriver, profile: &ResourceProfile, name: &str) -> E2eResult<String> {
    let text = ui.text_content(&find_row(name).cell(profile.name_column)).await?;
    let text = text.trim();
    Ok(if text.is_empty() { name.to_string() } else { text.to_string() })
}

/// Remove any same-named leftover so that `create` starts from a clean slate.
///
/// A row already terminating is waited out rather than deleted again.
/// Calling this on an absent name is a no-op.
pub async fn pre_cleanup(cx: &mut ScenarioContext, ops: &dyn ResourceOps, name: &str) -> E2eResult<()> {
    let profile = ops.profile();
    let kind = profile.kind;

    match observe(cx, profile, name).await? {
        ResourceState::Absent => {
            debug!("no pre-existing {} {}", kind, name);
        }
        ResourceState::Terminating => {
            info!("found pre-existing {} {} in {} state, waiting..", kind, name, profile.terminating_label);
            let browser = cx.session.browser();
            let ui = browser.as_ref();
            let row = find_row(name);
            let row = &row;
            let wait = Wait::hard(
                format!("Can not pre-cleanup {} {}, it is stuck in {} state", kind, name, profile.terminating_label),
                profile.terminating_wait(),
            );
            wait_until_gone(&wait, move || async move { Ok(ui.count(row).await? > 0) }).await?;
            settle(profile).await;
        }
        state => {
            info!("found pre-existing {} {} ({}), trying to delete it..", kind, name, state);
            delete(cx, ops, name).await?;
            settle(profile).await;
        }
    }

    info!("{} pre-cleanup {} is done", kind, name);
    Ok(())
}

async fn settle(profile: &ResourceProfile) {
    if let Some(pause) = profile.settle() {
        info!("waiting {} s for the backend to unprovision", pause.as_secs());
        tokio::time::sleep(pause).await;
    }
}

/// Create `name` and wait for its row to read Ready.
///
/// Not reaching Ready in time is a hard failure.
pub async fn create(cx: &mut ScenarioContext, ops: &dyn ResourceOps, name: &str) -> E2eResult<ResourceHandle> {
    let profile = ops.profile();
    let kind = profile.kind;
    let form = profile
        .create
        .as_ref()
        .ok_or_else(|| E2eError::Unsupported(format!("{} is created by its owning resource", kind)))?;

    info!("creating {} {}", kind, name);
    cx.session.open_list(&profile.page).await?;
    let browser = cx.session.browser();

    if form.empty_only {
        if !cx.session.list_is_empty().await? {
            return Err(E2eError::AssertionFailed(format!(
                "{} can only be created while the account has none",
                kind
            )));
        }
        browser.click(&form.empty_button).await?;
    } else if cx.session.appears_within(&form.empty_button, Duration::from_millis(500)).await? {
        browser.click(&form.empty_button).await?;
    } else {
        browser.click(&form.filled_button).await?;
    }

    let heading = Locator::main().then_role("heading", form.heading.as_str());
    cx.session
        .expect_visible(&heading, FORM_TIMEOUT, &format!("{} create form", kind))
        .await?;

    ops.fill_create_form(cx, name).await?;

    let name_field = Locator::main().then_placeholder(form.name_placeholder.as_str());
    browser.fill(&name_field, name).await?;
    browser.click(&Locator::main().then_label(form.submit_label.as_str())).await?;
    info!("{} creation is in progress..", kind);

    let row = find_row(name);
    cx.session
        .expect_visible(&row, ROW_APPEAR_TIMEOUT, &format!("new {} row {}", kind, name))
        .await?;

    let ui = browser.as_ref();
    let wait = Wait::hard(
        format!(
            "Timed out ({} s) waiting for Ready status of created {} {}",
            profile.ready_timeout_secs, kind, name
        ),
        profile.ready_timeout(),
    )
    .every(IO_POLL);
    wait_until(&wait, move || async move {
        let state = read_state(ui, profile, name).await?;
        debug!("{} {} is {}", kind, name, state);
        Ok(state.is_ready())
    })
    .await?;

    let rendered = rendered_name(ui, profile, name).await?;
    let handle = ResourceHandle::new(kind, name, cx.session.test_id()).with_rendered_name(rendered);
    info!("{} {} is Ready (rendered as {})", kind, name, handle.rendered_name);

    ops.after_ready(cx, &handle).await?;
    Ok(handle)
}

/// Re-locate `name`, require Ready, open its detail view and read back at
/// least one identifying fact.
pub async fn verify(cx: &mut ScenarioContext, ops: &dyn ResourceOps, name: &str) -> E2eResult<Verification> {
    let profile = ops.profile();
    let kind = profile.kind;

    let state = observe(cx, profile, name).await?;
    if !state.is_ready() {
        return Err(E2eError::UnexpectedState {
            name: format!("{} {}", kind, name),
            expected: ResourceState::Ready.to_string(),
            actual: state.to_string(),
        });
    }
    info!("seeing {} {} in Ready state", kind, name);

    let browser = cx.session.browser();
    let rendered = rendered_name(browser.as_ref(), profile, name).await?;
    let handle = ResourceHandle::new(kind, name, cx.session.test_id()).with_rendered_name(rendered);

    let name_cell = find_row(name).cell(profile.name_column);
    match profile.detail {
        DetailLink::Button => browser.click(&name_cell.then_role("button", name)).await?,
        DetailLink::Text => browser.click(&name_cell.then_text(name)).await?,
        DetailLink::None => {}
    }

    let facts = ops.verify_details(cx, &handle).await?;
    if facts.iter().all(|f| f.value.trim().is_empty()) {
        return Err(E2eError::AssertionFailed(format!(
            "{} {} shows no identifying detail",
            kind, name
        )));
    }
    for fact in &facts {
        debug!("{} {}: {} = {}", kind, name, fact.label, fact.value);
    }

    info!("{} {} is verified", kind, name);
    Ok(Verification { handle, state, facts })
}

/// Delete `name` and wait until its row is gone from the table.
///
/// The confirmation dialog receives the name as rendered in the table, which
/// for some kinds carries a server-side prefix.
pub async fn delete(cx: &mut ScenarioContext, ops: &dyn ResourceOps, name: &str) -> E2eResult<()> {
    let profile = ops.profile();
    let kind = profile.kind;

    info!("attempting to delete {} {}..", kind, name);
    cx.session.open_list(&profile.page).await?;
    let browser = cx.session.browser();

    let row = find_row(name);
    let action = row.join(&profile.delete_action);
    cx.session
        .expect_visible(&action, DIALOG_TIMEOUT, &format!("delete action of {} {}", kind, name))
        .await?;
    let rendered = rendered_name(browser.as_ref(), profile, name).await?;
    browser.click(&action).await?;

    cx.session
        .expect_visible(
            &Locator::css("div.modal-header").then_text("Delete "),
            DIALOG_TIMEOUT,
            "Delete confirmation dialog",
        )
        .await?;
    let confirm = Locator::css("div.modal-body").then_placeholder(profile.delete_placeholder.as_str());
    cx.session
        .expect_visible(&confirm, DIALOG_TIMEOUT, "Delete confirmation field")
        .await?;
    browser.fill(&confirm, &rendered).await?;
    browser
        .click(&Locator::css("div.modal-footer").then_label("Delete"))
        .await?;
    info!("{} deletion is in progress..", kind);

    let label = format!("{} {} deletion with timeout {} s", kind, name, profile.delete_timeout_secs);
    let refresh = profile
        .reload_after()
        .map(|after| stale_page_reload(browser.clone(), profile.clone(), name.to_string(), after));
    let ui = browser.as_ref();
    let row_ref = &row;
    wait_until_gone_with_refresh(
        &Wait::hard(label.as_str(), profile.delete_timeout()),
        move || async move { Ok(ui.count(row_ref).await? > 0) },
        refresh,
    )
    .await?;

    if let Some(confirm_for) = profile.confirm_absent() {
        browser.reload().await?;
        wait_until_gone(&Wait::hard(label.as_str(), confirm_for), move || async move {
            Ok(ui.count(row_ref).await? > 0)
        })
        .await?;
    }

    ops.after_delete(cx, name).await?;
    info!("{} {} is successfully deleted", kind, name);
    Ok(())
}

/// One-shot reload for a console that stopped re-rendering the table.
///
/// Only reloads while the row still reads Ready, the symptom of a stale page.
fn stale_page_reload(
    browser: Arc<dyn Browser>,
    profile: ResourceProfile,
    name: String,
    after: Duration,
) -> Refresh<'static> {
    Refresh::new(after, move || {
        let browser = browser.clone();
        let profile = profile.clone();
        let name = name.clone();
        async move {
            if read_state(browser.as_ref(), &profile, &name).await?.is_ready() {
                warn!("page looks to be stale, reloading the page..");
                browser.reload().await?;
            }
            Ok(())
        }
        .boxed()
    })
}
