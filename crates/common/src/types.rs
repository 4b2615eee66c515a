//! Core types for CloudProbe

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::Error;

/// Kind of a provisionable console resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    ComputeInstance,
    PreviewInstance,
    FileVolume,
    ObjectBucket,
    SshKey,
    Principal,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::ComputeInstance,
        ResourceKind::PreviewInstance,
        ResourceKind::FileVolume,
        ResourceKind::ObjectBucket,
        ResourceKind::SshKey,
        ResourceKind::Principal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::ComputeInstance => "compute-instance",
            ResourceKind::PreviewInstance => "preview-instance",
            ResourceKind::FileVolume => "file-volume",
            ResourceKind::ObjectBucket => "object-bucket",
            ResourceKind::SshKey => "ssh-key",
            ResourceKind::Principal => "principal",
        }
    }

    /// Dependent kinds are only created as part of another kind's create step.
    pub fn is_dependent(&self) -> bool {
        matches!(self, ResourceKind::SshKey | ResourceKind::Principal)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| Error::UnknownKind(s.to_string()))
    }
}

/// Lifecycle state of a resource as rendered by the console.
///
/// The harness never writes state. It is always read back from the status
/// column of the resource's table row, so every raw label goes through
/// [`ResourceState::from_label`] before anything compares it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    Provisioning,
    Ready,
    Terminating,
    Failed,
    /// The row is not in the table
    Absent,
    /// A label the parser does not know; treated as not yet ready
    Unrecognized(String),
}

impl ResourceState {
    /// Parse a status cell label.
    ///
    /// `terminating_label` is the kind's own word for the transitional
    /// delete state ("Terminating" for instances, "Deleting" for storage).
    pub fn from_label(label: &str, terminating_label: &str) -> Self {
        let label = label.trim();
        if label.eq_ignore_ascii_case(terminating_label) {
            return ResourceState::Terminating;
        }
        match label.to_ascii_lowercase().as_str() {
            "ready" => ResourceState::Ready,
            "provisioning" | "accepted" | "requested" | "starting" | "pending" => {
                ResourceState::Provisioning
            }
            "terminating" | "deleting" => ResourceState::Terminating,
            "failed" | "error" => ResourceState::Failed,
            "" => ResourceState::Unrecognized(String::new()),
            _ => ResourceState::Unrecognized(label.to_string()),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ResourceState::Ready)
    }

    pub fn is_transitional(&self) -> bool {
        matches!(self, ResourceState::Provisioning | ResourceState::Terminating)
    }
}

impl std::fmt::Display for ResourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceState::Provisioning => write!(f, "provisioning"),
            ResourceState::Ready => write!(f, "ready"),
            ResourceState::Terminating => write!(f, "terminating"),
            ResourceState::Failed => write!(f, "failed"),
            ResourceState::Absent => write!(f, "absent"),
            ResourceState::Unrecognized(label) => write!(f, "unrecognized({})", label),
        }
    }
}

/// A resource the harness has created or located by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHandle {
    pub kind: ResourceKind,
    /// Operator-chosen name, the correlation key for table lookups
    pub name: String,
    /// Name as the console renders it; may carry a server-side prefix
    pub rendered_name: String,
    /// Test id of the owning session
    pub session: String,
}

impl ResourceHandle {
    pub fn new(kind: ResourceKind, name: impl Into<String>, session: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind,
            rendered_name: name.clone(),
            name,
            session: session.into(),
        }
    }

    pub fn with_rendered_name(mut self, rendered: impl Into<String>) -> Self {
        let rendered = rendered.into();
        if !rendered.trim().is_empty() {
            self.rendered_name = rendered.trim().to_string();
        }
        self
    }

    /// True when the console decorated the requested name
    pub fn is_decorated(&self) -> bool {
        self.rendered_name != self.name
    }
}

/// Billing tier of the account under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AccountTier {
    #[default]
    Standard,
    Premium,
    Enterprise,
}

impl std::fmt::Display for AccountTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountTier::Standard => write!(f, "Standard"),
            AccountTier::Premium => write!(f, "Premium"),
            AccountTier::Enterprise => write!(f, "Enterprise"),
        }
    }
}

impl FromStr for AccountTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(AccountTier::Standard),
            "premium" => Ok(AccountTier::Premium),
            "enterprise" => Ok(AccountTier::Enterprise),
            _ => Err(Error::UnknownTier(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_labels() {
        assert_eq!(ResourceState::from_label("Ready", "Terminating"), ResourceState::Ready);
        assert_eq!(ResourceState::from_label(" Provisioning ", "Terminating"), ResourceState::Provisioning);
        assert_eq!(ResourceState::from_label("Deleting", "Deleting"), ResourceState::Terminating);
        assert_eq!(ResourceState::from_label("Terminating", "Deleting"), ResourceState::Terminating);
        assert_eq!(
            ResourceState::from_label("Maintenance", "Terminating"),
            ResourceState::Unrecognized("Maintenance".to_string())
        );
        assert!(!ResourceState::from_label("Terminating", "Terminating").is_ready());
    }

    #[test]
    fn test_kind_round_trip_names() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.as_str().parse::<ResourceKind>().unwrap(), kind);
        }
        assert!("gpu-cluster".parse::<ResourceKind>().is_err());
        assert!(ResourceKind::SshKey.is_dependent());
        assert!(!ResourceKind::ObjectBucket.is_dependent());
    }

    #[test]
    fn test_decorated_handle() {
        let handle = ResourceHandle::new(ResourceKind::ObjectBucket, "mybucket", "t-1")
            .with_rendered_name("249000000001-mybucket");
        assert!(handle.is_decorated());
        assert_eq!(handle.name, "mybucket");

        let plain = ResourceHandle::new(ResourceKind::ComputeInstance, "t1", "t-1").with_rendered_name("  ");
        assert_eq!(plain.rendered_name, "t1");
        assert!(!plain.is_decorated());
    }
}
