//! UI session controller
//!
//! Owns one authenticated console page: login, region selection, sign-out,
//! and the navigation helpers the lifecycle steps use to reach a listing.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use cloudprobe_common::AccountTier;

use crate::driver::{Browser, Locator};
use crate::error::{E2eError, E2eResult};
use crate::poll::{wait_until, wait_until_gone, Wait};
use crate::profile::ListPage;

const LOGIN_STEP_TIMEOUT: Duration = Duration::from_secs(20);
const LIST_LOAD_TIMEOUT: Duration = Duration::from_secs(30);
const ELEMENT_TIMEOUT: Duration = Duration::from_secs(10);
const EMPTY_LIST_TEXT: &str = "Your account currently has no ";

/// Who the session acts as
#[derive(Clone)]
pub struct Identity {
    pub user: String,
    pub password: String,
    pub tier: AccountTier,
    pub region: String,
    /// Correlation id carried by every log line and diagnostic file
    pub test_id: String,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("user", &self.user)
            .field("password", &"***")
            .field("tier", &self.tier)
            .field("region", &self.region)
            .field("test_id", &self.test_id)
            .finish()
    }
}

pub struct Session {
    browser: Arc<dyn Browser>,
    identity: Identity,
    url: String,
    logged_in: bool,
}

fn side_panel() -> Locator {
    Locator::css("div[intc-id=SideBarNavigationMain]")
}

fn toolbar() -> Locator {
    Locator::css("nav.siteToolbar")
}

fn user_menu() -> Locator {
    Locator::css("#dropdown-header-user-menu")
}

fn region_toggle() -> Locator {
    Locator::css("#dropdown-header-region-toggle")
}

impl Session {
    pub fn new(browser: Arc<dyn Browser>, identity: Identity, url: impl Into<String>) -> Self {
        Self {
            browser,
            identity,
            url: url.into(),
            logged_in: false,
        }
    }

    pub fn browser(&self) -> Arc<dyn Browser> {
        self.browser.clone()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn test_id(&self) -> &str {
        &self.identity.test_id
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    /// Wait for an element to become visible or fail with `label`
    pub async fn expect_visible(&self, locator: &Locator, timeout: Duration, label: &str) -> E2eResult<()> {
        let browser = self.browser.as_ref();
        wait_until(&Wait::hard(label, timeout), move || async move {
            browser.is_visible(locator).await
        })
        .await
        .map(|_| ())
    }

    /// Wait for an element to go away or fail with `label`
    pub async fn expect_hidden(&self, locator: &Locator, timeout: Duration, label: &str) -> E2eResult<()> {
        let browser = self.browser.as_ref();
        wait_until_gone(&Wait::hard(label, timeout), move || async move {
            browser.is_visible(locator).await
        })
        .await
        .map(|_| ())
    }

    /// Short soft wait, for optional UI that may or may not show up
    pub async fn appears_within(&self, locator: &Locator, timeout: Duration) -> E2eResult<bool> {
        let browser = self.browser.as_ref();
        wait_until(&Wait::soft(timeout), move || async move {
            browser.is_visible(locator).await
        })
        .await
    }

    /// Wait for the text of an element to equal `expected`
    pub async fn expect_text(&self, locator: &Locator, expected: &str, timeout: Duration) -> E2eResult<()> {
        let browser = self.browser.as_ref();
        let label = format!("{} to read '{}'", locator, expected);
        wait_until(&Wait::hard(label, timeout), move || async move {
            Ok(browser.text_content(locator).await?.trim() == expected)
        })
        .await
        .map(|_| ())
    }

    pub async fn login(&mut self) -> E2eResult<()> {
        info!("user {} tries to login..", self.identity.user);
        let started = tokio::time::Instant::now();

        let status = self.browser.goto(&self.url).await?;
        if status != 200 {
            return Err(E2eError::AssertionFailed(format!(
                "Login: expected HTTP 200 from {}, received {}",
                self.url, status
            )));
        }

        let email = Locator::css("#signInName");
        self.expect_visible(&email, LOGIN_STEP_TIMEOUT, "Login: Email input page").await?;
        self.browser.fill(&email, &self.identity.user).await?;
        self.browser.click(&Locator::css("#continue")).await?;

        self.dismiss_cookie_dialog().await?;

        let password = Locator::css("#password");
        self.expect_visible(&password, LOGIN_STEP_TIMEOUT, "Login: Password input page").await?;
        self.browser.fill(&password, &self.identity.password).await?;
        self.browser.click(&Locator::css("#continue")).await?;

        self.expect_hidden(&password, LOGIN_STEP_TIMEOUT, "SSO login dialog").await?;
        self.expect_visible(
            &Locator::css("#root > nav.navbar > span[intc-id=toolbarNavBrand]"),
            LOGIN_STEP_TIMEOUT,
            "redirect from SSO to Console UI",
        )
        .await?;

        self.logged_in = true;
        info!("logged-in successfully, login delay was {} ms", started.elapsed().as_millis());

        self.dismiss_cookie_dialog().await
    }

    async fn dismiss_cookie_dialog(&self) -> E2eResult<()> {
        let dismiss = Locator::css("button#onetrust-reject-all-handler");
        if self.appears_within(&dismiss, Duration::from_secs(3)).await? {
            debug!("dismissing cookie dialog");
            self.browser.click(&dismiss).await?;
        }
        Ok(())
    }

    /// Switch to the identity's region unless it is already active
    pub async fn select_region(&self) -> E2eResult<()> {
        let region = &self.identity.region;
        info!("selecting {} region..", region);

        let toggle = region_toggle();
        self.expect_visible(&toggle, ELEMENT_TIMEOUT, "region drop-down").await?;
        if self.browser.count(&toggle.clone().has_text(region.as_str())).await? > 0 {
            info!("region {} was already selected active", region);
            return Ok(());
        }

        if !self.browser.is_visible(&Locator::css("#dropdown-header-menu-region")).await? {
            self.browser.click(&toggle).await?;
        }
        let link = Locator::role("link", format!("Connect to {} Region", region));
        self.expect_visible(&link, ELEMENT_TIMEOUT, &format!("Region {} in drop-down", region))
            .await?;
        self.browser.click(&link).await?;

        let browser = self.browser.as_ref();
        let toggle = &toggle;
        wait_until(
            &Wait::hard(format!("region {} to become active", region), ELEMENT_TIMEOUT),
            move || async move { Ok(browser.text_content(toggle).await?.contains(region.as_str())) },
        )
        .await?;
        info!("region {} was selected successfully", region);
        Ok(())
    }

    /// Open `item` (and `sub_item`) in the side navigation.
    ///
    /// Entries that are already expanded are left alone; clicking them would
    /// collapse the menu again.
    pub async fn go_to(&self, item: &str, sub_item: Option<&str>) -> E2eResult<()> {
        let panel = side_panel();
        let browser = self.browser.as_ref();
        let panel_ref = &panel;
        wait_until_gone(&Wait::soft(Duration::from_millis(500)), move || async move {
            browser.is_visible(panel_ref).await
        })
        .await?;
        if !self.browser.is_visible(&panel).await? {
            self.browser.click(&toolbar().then_label("Expand side menu")).await?;
        }

        let entry = panel.clone().then_label(item);
        let toggle = self.browser.get_attribute(&entry, "data-bs-toggle").await?;
        let expanded = self.browser.get_attribute(&entry, "aria-expanded").await?;
        if toggle.as_deref() != Some("collapse") || expanded.as_deref() == Some("false") {
            self.browser.click(&entry).await?;
        } else {
            debug!("menu entry {} is already expanded", item);
        }

        if let Some(sub) = sub_item {
            // sub-menu labels repeat across menus, so scope to the parent entry
            let group = panel.then_css(format!("div:has(> a[aria-label=\"{}\"])", item));
            self.browser.click(&group.then_label(sub)).await?;
        }
        Ok(())
    }

    /// Navigate to a kind's listing and wait until either its table or its
    /// empty-state message is rendered.
    pub async fn open_list(&self, page: &ListPage) -> E2eResult<()> {
        let active = toolbar()
            .then_css("div.nav-tabs > div.nav-item > a.nav-link.active")
            .has_text(page.tab.as_str());
        if self.browser.count(&active).await? == 0 {
            let menu = format!("Go to {} Page", page.menu);
            let tab = format!("Go to {} Page", page.tab);
            self.go_to(&menu, Some(&tab)).await?;
        } else {
            self.browser.click(&active).await?;
        }

        if let Some(link) = &page.link {
            let link = Locator::role("link", link.as_str());
            self.expect_visible(&link, ELEMENT_TIMEOUT, "listing link").await?;
            self.browser.click(&link).await?;
        }

        self.wait_list_loaded(&format!("{} page ({})", page.menu, page.tab)).await?;
        debug!("{} / {} is loaded", page.menu, page.tab);
        Ok(())
    }

    async fn wait_list_loaded(&self, what: &str) -> E2eResult<()> {
        let table = Locator::main().then_css("table.table");
        let empty = Locator::main().then_text(EMPTY_LIST_TEXT);
        let browser = self.browser.as_ref();
        let (table, empty) = (&table, &empty);
        wait_until(&Wait::hard(what, LIST_LOAD_TIMEOUT), move || async move {
            Ok(browser.is_visible(table).await? || browser.is_visible(empty).await?)
        })
        .await
        .map(|_| ())
    }

    /// True when the current listing shows its empty-state message
    pub async fn list_is_empty(&self) -> E2eResult<bool> {
        self.browser.is_visible(&Locator::main().then_text(EMPTY_LIST_TEXT)).await
    }

    pub async fn reload(&self) -> E2eResult<()> {
        self.browser.reload().await
    }

    pub async fn sign_out(&mut self) -> E2eResult<()> {
        info!("initiating Sign out..");
        let menu_button = Locator::label("User Menu");
        if !self.browser.is_visible(&user_menu()).await? {
            self.browser.click(&menu_button).await?;
        }
        self.browser
            .click(&user_menu().then_role("button", "Sign-out"))
            .await?;
        self.expect_hidden(&menu_button, ELEMENT_TIMEOUT, "signout error - Console page is still open")
            .await?;
        self.logged_in = false;
        info!("signed out successfully");
        Ok(())
    }

    /// Close the page, flushing recorded diagnostics
    pub async fn close(&self) -> E2eResult<()> {
        self.browser.close().await
    }
}
