//! Per-kind lifecycle steps
//!
//! Each type here implements [`ResourceOps`](crate::lifecycle::ResourceOps)
//! for one resource kind.

use std::time::Duration;

use crate::context::ScenarioContext;
use crate::driver::Locator;
use crate::error::{E2eError, E2eResult};
use crate::ssh::RemoteCommand;

mod bucket;
mod compute;
mod file_volume;
mod preview;
mod principal;
mod ssh_key;

pub use bucket::ObjectBucket;
pub use compute::ComputeInstance;
pub use file_volume::FileVolume;
pub use preview::PreviewInstance;
pub use principal::Principal;
pub use ssh_key::SshKey;

/// Section of a detail view introduced by an `h3` heading
pub(crate) fn detail_section(heading: &str) -> Locator {
    Locator::css(format!("div.section:has(> h3:has-text(\"{}\"))", heading))
}

pub(crate) fn modal_body() -> Locator {
    Locator::css("div.modal-body")
}

pub(crate) fn modal_footer() -> Locator {
    Locator::css("div.modal-footer")
}

/// Press a "copy" control and read what it put on the clipboard
pub(crate) async fn copy_value(cx: &ScenarioContext, button: &Locator) -> E2eResult<String> {
    let browser = cx.session.browser();
    browser.click(button).await?;
    Ok(browser.read_clipboard().await?.trim().to_string())
}

/// Read a detail value, failing if it is blank
pub(crate) async fn read_value(cx: &ScenarioContext, locator: &Locator, what: &str) -> E2eResult<String> {
    let value = cx.session.browser().text_content(locator).await?;
    let value = value.trim();
    if value.is_empty() {
        return Err(E2eError::AssertionFailed(format!("{} is empty", what)));
    }
    Ok(value.to_string())
}

/// Run a remote command that must succeed
pub(crate) async fn require_remote(cx: &mut ScenarioContext, command: RemoteCommand, what: &str) -> E2eResult<()> {
    if cx.remote(&command).await {
        Ok(())
    } else {
        Err(E2eError::AssertionFailed(format!("remote check failed: {}", what)))
    }
}

pub(crate) const FIELD_TIMEOUT: Duration = Duration::from_secs(10);
