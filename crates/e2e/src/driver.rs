//! UI driver seam
//!
//! The harness never talks to a browser directly. It builds [`Locator`]s out
//! of configured labels and hands them to a [`UiDriver`]; the Playwright
//! bridge in [`crate::playwright`] is one implementation, test doubles are
//! another.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::E2eResult;

/// One step of a locator chain, resolved relative to the previous step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum Selector {
    Css { css: String },
    Role { role: String, name: String, exact: bool },
    Placeholder { text: String },
    Label { text: String, exact: bool },
    Text { text: String, exact: bool },
    /// Narrow to elements containing this text
    HasText { text: String },
    /// Table row with a cell that reads exactly `name`, optionally behind a
    /// numeric account prefix such as `249000000001-`
    Row { name: String },
    /// Nth cell of a row
    Cell { index: usize },
    Nth { index: usize },
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Css { css } => write!(f, "{}", css),
            Selector::Role { role, name, .. } if name.is_empty() => write!(f, "role={}", role),
            Selector::Role { role, name, .. } => write!(f, "role={}[{}]", role, name),
            Selector::Placeholder { text } => write!(f, "placeholder={}", text),
            Selector::Label { text, .. } => write!(f, "label={}", text),
            Selector::Text { text, .. } => write!(f, "text={}", text),
            Selector::HasText { text } => write!(f, "has-text={}", text),
            Selector::Row { name } => write!(f, "row={}", name),
            Selector::Cell { index } => write!(f, "cell={}", index),
            Selector::Nth { index } => write!(f, "nth={}", index),
        }
    }
}

/// A chain of selectors starting at the page root
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator {
    chain: Vec<Selector>,
}

impl Locator {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn css(css: impl Into<String>) -> Self {
        Self::root().then_css(css)
    }

    /// The page's `main` landmark
    pub fn main() -> Self {
        Self::role("main", "")
    }

    pub fn role(role: &str, name: impl Into<String>) -> Self {
        Self::root().then_role(role, name)
    }

    pub fn label(text: impl Into<String>) -> Self {
        Self::root().then_label(text)
    }

    pub fn placeholder(text: impl Into<String>) -> Self {
        Self::root().then_placeholder(text)
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::root().then_text(text)
    }

    fn push(mut self, selector: Selector) -> Self {
        self.chain.push(selector);
        self
    }

    pub fn then_css(self, css: impl Into<String>) -> Self {
        self.push(Selector::Css { css: css.into() })
    }

    pub fn then_role(self, role: &str, name: impl Into<String>) -> Self {
        self.push(Selector::Role {
            role: role.to_string(),
            name: name.into(),
            exact: true,
        })
    }

    pub fn then_label(self, text: impl Into<String>) -> Self {
        self.push(Selector::Label {
            text: text.into(),
            exact: true,
        })
    }

    pub fn then_placeholder(self, text: impl Into<String>) -> Self {
        self.push(Selector::Placeholder { text: text.into() })
    }

    pub fn then_text(self, text: impl Into<String>) -> Self {
        self.push(Selector::Text {
            text: text.into(),
            exact: false,
        })
    }

    pub fn has_text(self, text: impl Into<String>) -> Self {
        self.push(Selector::HasText { text: text.into() })
    }

    pub fn row(self, name: impl Into<String>) -> Self {
        self.push(Selector::Row { name: name.into() })
    }

    pub fn cell(self, index: usize) -> Self {
        self.push(Selector::Cell { index })
    }

    pub fn nth(self, index: usize) -> Self {
        self.push(Selector::Nth { index })
    }

    /// Resolve `tail` relative to this locator
    pub fn join(&self, tail: &Locator) -> Self {
        let mut chain = self.chain.clone();
        chain.extend(tail.chain.iter().cloned());
        Self { chain }
    }

    pub fn chain(&self) -> &[Selector] {
        &self.chain
    }

    pub fn last(&self) -> Option<&Selector> {
        self.chain.last()
    }

    /// Name of the nearest enclosing row selector, if any
    pub fn row_name(&self) -> Option<&str> {
        self.chain.iter().rev().find_map(|s| match s {
            Selector::Row { name } => Some(name.as_str()),
            _ => None,
        })
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.chain.is_empty() {
            return write!(f, ":root");
        }
        for (i, selector) in self.chain.iter().enumerate() {
            if i > 0 {
                write!(f, " >> ")?;
            }
            write!(f, "{}", selector)?;
        }
        Ok(())
    }
}

/// Browser automation capability
#[async_trait]
pub trait UiDriver: Send + Sync {
    /// Navigate and return the HTTP status of the main document
    async fn goto(&self, url: &str) -> E2eResult<u16>;

    async fn reload(&self) -> E2eResult<()>;

    async fn click(&self, locator: &Locator) -> E2eResult<()>;

    async fn fill(&self, locator: &Locator, value: &str) -> E2eResult<()>;

    async fn check(&self, locator: &Locator) -> E2eResult<()>;

    async fn is_visible(&self, locator: &Locator) -> E2eResult<bool>;

    async fn count(&self, locator: &Locator) -> E2eResult<usize>;

    async fn text_content(&self, locator: &Locator) -> E2eResult<String>;

    async fn get_attribute(&self, locator: &Locator, name: &str) -> E2eResult<Option<String>>;

    /// Close the page and flush recorded diagnostics
    async fn close(&self) -> E2eResult<()>;
}

/// Read access to values the console only exposes through "copy" buttons
#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn read_clipboard(&self) -> E2eResult<String>;
}

/// A live browser page: UI driving plus clipboard access
pub trait Browser: UiDriver + Clipboard {}

impl<T: UiDriver + Clipboard> Browser for T {}

/// Opens one isolated browser page per scenario
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, test_id: &str) -> E2eResult<Arc<dyn Browser>>;
}
