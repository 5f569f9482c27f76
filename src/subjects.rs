// Copyright (c) 2025 - Cowboy AI, Inc.

//! NATS subject hierarchy for provisioning events
//!
//! ```text
//! provisioning.{unit}.{kind}.{operation}
//! ```
//!
//! Consumers pick their granularity:
//! - Precise subscriptions (`provisioning.msk-connect.connector.created`)
//! - Unit-level wildcards (`provisioning.msk-connect.>`)
//! - Kind-level wildcards across units (`provisioning.*.artifact.*`)
//!
//! ```rust
//! use msk_connect_infrastructure::domain::ResourceKind;
//! use msk_connect_infrastructure::events::LifecycleOperation;
//! use msk_connect_infrastructure::subjects::ProvisioningSubject;
//!
//! let subject = ProvisioningSubject::new("msk-connect", ResourceKind::Artifact, LifecycleOperation::Updated);
//! assert_eq!(subject.to_string(), "provisioning.msk-connect.artifact.updated");
//! assert_eq!(ProvisioningSubject::unit_wildcard("msk-connect"), "provisioning.msk-connect.>");
//! ```

use std::fmt;

use crate::domain::ResourceKind;
use crate::events::LifecycleOperation;

/// Root namespace for all provisioning subjects
pub const PROVISIONING_ROOT: &str = "provisioning";

/// Subject a single lifecycle event is published on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProvisioningSubject {
    unit: String,
    kind: ResourceKind,
    operation: LifecycleOperation,
}

impl ProvisioningSubject {
    pub fn new(unit: &str, kind: ResourceKind, operation: LifecycleOperation) -> Self {
        Self {
            unit: token(unit),
            kind,
            operation,
        }
    }

    /// Every event of one unit: `provisioning.{unit}.>`
    pub fn unit_wildcard(unit: &str) -> String {
        format!("{}.{}.>", PROVISIONING_ROOT, token(unit))
    }

    /// Every provisioning event: `provisioning.>`
    pub fn all() -> String {
        format!("{}.>", PROVISIONING_ROOT)
    }
}

impl fmt::Display for ProvisioningSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            PROVISIONING_ROOT,
            self.unit,
            self.kind,
            self.operation.as_str()
        )
    }
}

/// Replace characters NATS reserves in subject tokens
fn token(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| match c {
            '.' | '*' | '>' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_format() {
        let subject =
            ProvisioningSubject::new("msk", ResourceKind::SecurityGroup, LifecycleOperation::Created);
        assert_eq!(subject.to_string(), "provisioning.msk.security_group.created");
    }

    #[test]
    fn test_unit_token_is_sanitized() {
        let subject =
            ProvisioningSubject::new("msk.prod *", ResourceKind::Cluster, LifecycleOperation::Deleted);
        assert_eq!(subject.to_string(), "provisioning.msk_prod__.cluster.deleted");
        assert_eq!(ProvisioningSubject::unit_wildcard(""), "provisioning._.>");
    }

    #[test]
    fn test_all_subjects() {
        assert_eq!(ProvisioningSubject::all(), "provisioning.>");
    }
}
