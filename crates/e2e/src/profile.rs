//! Per-kind console parameters
//!
//! The lifecycle protocol is identical for every kind. What differs is where
//! the list lives, which affordances create and delete a row, and how long the
//! backend takes. All of that is data, kept in a [`ResourceProfile`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use cloudprobe_common::ResourceKind;

use crate::driver::Locator;

/// Where a kind's listing table lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPage {
    /// Side menu entry, e.g. "Compute"
    pub menu: String,
    /// Toolbar tab under that menu, e.g. "Instances"
    pub tab: String,
    /// Link followed from the tab to reach the table
    #[serde(default)]
    pub link: Option<String>,
}

/// How the detail view is opened from the row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailLink {
    /// A button named after the resource in the name cell
    Button,
    /// Plain text in the name cell
    Text,
    /// The kind has no detail view
    None,
}

/// The create form of a kind that is created from its own list page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateForm {
    /// Shown when the table is empty
    pub empty_button: Locator,
    /// Shown above a non-empty table
    pub filled_button: Locator,
    pub heading: String,
    pub name_placeholder: String,
    pub submit_label: String,
    /// Creation is only offered while the account has no such resource
    #[serde(default)]
    pub empty_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceProfile {
    pub kind: ResourceKind,
    pub page: ListPage,
    /// `None` for kinds created inside another kind's form
    pub create: Option<CreateForm>,
    pub detail: DetailLink,
    pub name_column: usize,
    /// `None` when the table has no status column; a present row is Ready
    pub status_column: Option<usize>,
    /// The kind's word for the delete transition
    pub terminating_label: String,
    /// Row action that raises the delete dialog, relative to the row
    pub delete_action: Locator,
    pub delete_placeholder: String,
    pub ready_timeout_secs: u64,
    pub delete_timeout_secs: u64,
    /// Pre-cleanup wait for a row already in the terminating state
    pub terminating_wait_secs: u64,
    /// Pause after a pre-cleanup deletion so the backend can unprovision
    #[serde(default)]
    pub settle_secs: Option<u64>,
    /// Offset of the one-shot stale-page reload during delete
    #[serde(default)]
    pub reload_after_secs: Option<u64>,
    /// After the row is gone, reload and confirm absence for this long
    #[serde(default)]
    pub confirm_absent_secs: Option<u64>,
}

fn empty_view_button(id: &str) -> Locator {
    Locator::main().then_css(format!("a[intc-id=\"{}\"]", id))
}

fn filter_button(text: &str) -> Locator {
    Locator::main().then_css("div.filter").then_text(text)
}

impl ResourceProfile {
    /// Built-in parameters for a kind
    pub fn builtin(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::ComputeInstance => Self::compute_instance(),
            ResourceKind::PreviewInstance => Self::preview_instance(),
            ResourceKind::FileVolume => Self::file_volume(),
            ResourceKind::ObjectBucket => Self::object_bucket(),
            ResourceKind::SshKey => Self::compute_keys(),
            ResourceKind::Principal => Self::principal(),
        }
    }

    pub fn compute_instance() -> Self {
        Self {
            kind: ResourceKind::ComputeInstance,
            page: ListPage {
                menu: "Compute".into(),
                tab: "Instances".into(),
                link: None,
            },
            create: Some(CreateForm {
                empty_button: empty_view_button("LaunchinstanceEmptyViewButton"),
                filled_button: filter_button("Launch Instance"),
                heading: "Launch a compute instance".into(),
                name_placeholder: "Instance name".into(),
                submit_label: "Launch instance".into(),
                empty_only: false,
            }),
            detail: DetailLink::Button,
            name_column: 0,
            status_column: Some(2),
            terminating_label: "Terminating".into(),
            delete_action: Locator::text("Delete"),
            delete_placeholder: "Enter instance name".into(),
            ready_timeout_secs: 180,
            delete_timeout_secs: 180,
            terminating_wait_secs: 90,
            settle_secs: None,
            reload_after_secs: Some(30),
            confirm_absent_secs: Some(60),
        }
    }

    pub fn preview_instance() -> Self {
        Self {
            kind: ResourceKind::PreviewInstance,
            page: ListPage {
                menu: "Preview".into(),
                tab: "Preview Instances".into(),
                link: None,
            },
            create: Some(CreateForm {
                empty_button: empty_view_button("RequestinstanceEmptyViewButton"),
                filled_button: filter_button("Request instance"),
                heading: "Instance configuration".into(),
                name_placeholder: "Instance name".into(),
                submit_label: "Request instance".into(),
                empty_only: true,
            }),
            detail: DetailLink::Button,
            name_column: 0,
            status_column: Some(2),
            terminating_label: "Terminating".into(),
            delete_action: Locator::text("Delete"),
            delete_placeholder: "Enter instance name".into(),
            ready_timeout_secs: 180,
            delete_timeout_secs: 90,
            terminating_wait_secs: 90,
            settle_secs: Some(60),
            reload_after_secs: None,
            confirm_absent_secs: None,
        }
    }

    pub fn file_volume() -> Self {
        Self {
            kind: ResourceKind::FileVolume,
            page: ListPage {
                menu: "Storage".into(),
                tab: "File Storage".into(),
                link: None,
            },
            create: Some(CreateForm {
                empty_button: empty_view_button("CreatevolumeEmptyViewButton"),
                filled_button: filter_button("Create Volume"),
                heading: "Create a storage volume".into(),
                name_placeholder: "Name".into(),
                submit_label: "Launch".into(),
                empty_only: false,
            }),
            detail: DetailLink::Button,
            name_column: 0,
            status_column: Some(2),
            terminating_label: "Deleting".into(),
            delete_action: Locator::text("Delete"),
            delete_placeholder: "Enter storage name".into(),
            ready_timeout_secs: 90,
            delete_timeout_secs: 60,
            terminating_wait_secs: 90,
            settle_secs: None,
            reload_after_secs: None,
            confirm_absent_secs: None,
        }
    }

    pub fn object_bucket() -> Self {
        Self {
            kind: ResourceKind::ObjectBucket,
            page: ListPage {
                menu: "Storage".into(),
                tab: "Object Storage".into(),
                link: None,
            },
            create: Some(CreateForm {
                empty_button: empty_view_button("CreatebucketEmptyViewButton"),
                filled_button: filter_button("Create bucket"),
                heading: "Create storage bucket".into(),
                name_placeholder: "Name".into(),
                submit_label: "Create".into(),
                empty_only: false,
            }),
            detail: DetailLink::Text,
            name_column: 0,
            status_column: Some(2),
            terminating_label: "Deleting".into(),
            delete_action: Locator::text("Delete"),
            delete_placeholder: "Enter bucket name".into(),
            ready_timeout_secs: 90,
            delete_timeout_secs: 60,
            terminating_wait_secs: 90,
            settle_secs: None,
            reload_after_secs: None,
            confirm_absent_secs: None,
        }
    }

    /// Principals live behind a link on the Object Storage tab
    pub fn principal() -> Self {
        Self {
            kind: ResourceKind::Principal,
            page: ListPage {
                menu: "Storage".into(),
                tab: "Object Storage".into(),
                link: Some("Manage principals and permissions".into()),
            },
            create: Some(CreateForm {
                empty_button: empty_view_button("CreateprincipalEmptyViewButton"),
                filled_button: filter_button("Create principal"),
                heading: "Manage Principals and Permissions".into(),
                name_placeholder: "Name".into(),
                submit_label: "Create".into(),
                empty_only: false,
            }),
            detail: DetailLink::Text,
            name_column: 0,
            status_column: Some(1),
            terminating_label: "Deleting".into(),
            delete_action: Locator::label("Delete"),
            delete_placeholder: "Enter principal name".into(),
            ready_timeout_secs: 60,
            delete_timeout_secs: 30,
            terminating_wait_secs: 90,
            settle_secs: None,
            reload_after_secs: None,
            confirm_absent_secs: None,
        }
    }

    /// Keys uploaded for compute instances
    pub fn compute_keys() -> Self {
        Self::ssh_keys("Compute", "Keys")
    }

    /// Keys uploaded for preview instances
    pub fn preview_keys() -> Self {
        Self::ssh_keys("Preview", "Preview Keys")
    }

    fn ssh_keys(menu: &str, tab: &str) -> Self {
        Self {
            kind: ResourceKind::SshKey,
            page: ListPage {
                menu: menu.into(),
                tab: tab.into(),
                link: None,
            },
            create: None,
            detail: DetailLink::None,
            name_column: 0,
            status_column: None,
            terminating_label: "Deleting".into(),
            delete_action: Locator::text("Delete"),
            delete_placeholder: "Enter key name".into(),
            ready_timeout_secs: 10,
            delete_timeout_secs: 10,
            terminating_wait_secs: 90,
            settle_secs: None,
            reload_after_secs: None,
            confirm_absent_secs: None,
        }
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn delete_timeout(&self) -> Duration {
        Duration::from_secs(self.delete_timeout_secs)
    }

    pub fn terminating_wait(&self) -> Duration {
        Duration::from_secs(self.terminating_wait_secs)
    }

    pub fn settle(&self) -> Option<Duration> {
        self.settle_secs.map(Duration::from_secs)
    }

    pub fn reload_after(&self) -> Option<Duration> {
        self.reload_after_secs.map(Duration::from_secs)
    }

    pub fn confirm_absent(&self) -> Option<Duration> {
        self.confirm_absent_secs.map(Duration::from_secs)
    }

    /// Apply the fields set in an environment file
    pub fn apply(&mut self, o: &ProfileOverride) {
        if let Some(page) = &o.page {
            self.page = page.clone();
        }
        if let Some(create) = &o.create {
            self.create = Some(create.clone());
        }
        if let Some(v) = o.status_column {
            self.status_column = Some(v);
        }
        if let Some(v) = &o.terminating_label {
            self.terminating_label = v.clone();
        }
        if let Some(v) = &o.delete_placeholder {
            self.delete_placeholder = v.clone();
        }
        if let Some(v) = o.ready_timeout_secs {
            self.ready_timeout_secs = v;
        }
        if let Some(v) = o.delete_timeout_secs {
            self.delete_timeout_secs = v;
        }
        if let Some(v) = o.terminating_wait_secs {
            self.terminating_wait_secs = v;
        }
        if o.settle_secs.is_some() {
            self.settle_secs = o.settle_secs;
        }
        if o.reload_after_secs.is_some() {
            self.reload_after_secs = o.reload_after_secs;
        }
        if o.confirm_absent_secs.is_some() {
            self.confirm_absent_secs = o.confirm_absent_secs;
        }
    }
}

/// Sparse profile fields read from the environment file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileOverride {
    pub page: Option<ListPage>,
    pub create: Option<CreateForm>,
    pub status_column: Option<usize>,
    pub terminating_label: Option<String>,
    pub delete_placeholder: Option<String>,
    pub ready_timeout_secs: Option<u64>,
    pub delete_timeout_secs: Option<u64>,
    pub terminating_wait_secs: Option<u64>,
    pub settle_secs: Option<u64>,
    pub reload_after_secs: Option<u64>,
    pub confirm_absent_secs: Option<u64>,
}
