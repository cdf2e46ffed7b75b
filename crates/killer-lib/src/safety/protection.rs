//! Instances that must never be disrupted regardless of budgets

use crate::models::Instance;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Owner kinds protected by default
pub const DEFAULT_PROTECTED_OWNER_KINDS: &[&str] = &["DaemonSet"];

/// Namespaces protected by default
pub const DEFAULT_PROTECTED_NAMESPACES: &[&str] = &["kube-system", "kube-public", "kube-node-lease"];

/// Why an instance is untouchable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Protection {
    /// Owned by a node-local or fleet-wide daemon workload
    DaemonManaged { owner_kind: String, owner_name: String },
    /// Lives in a reserved system namespace
    SystemNamespace { namespace: String },
}

impl fmt::Display for Protection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protection::DaemonManaged { .. } => f.write_str("daemon-managed"),
            Protection::SystemNamespace { .. } => f.write_str("system-namespace"),
        }
    }
}

/// Operator-supplied protection rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionPolicy {
    pub owner_kinds: BTreeSet<String>,
    pub namespaces: BTreeSet<String>,
}

impl Default for ProtectionPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_PROTECTED_OWNER_KINDS.iter().copied(),
            DEFAULT_PROTECTED_NAMESPACES.iter().copied(),
        )
    }
}

impl ProtectionPolicy {
    pub fn new<K, N>(owner_kinds: K, namespaces: N) -> Self
    where
        K: IntoIterator,
        K::Item: Into<String>,
        N: IntoIterator,
        N::Item: Into<String>,
    {
        Self {
            owner_kinds: owner_kinds.into_iter().map(Into::into).collect(),
            namespaces: namespaces.into_iter().map(Into::into).collect(),
        }
    }

    /// Classify an instance; owner rule first, then namespace rule
    pub fn classify(&self, instance: &Instance) -> Option<Protection> {
        if let Some(owner) = instance
            .owner_references
            .iter()
            .find(|o| self.owner_kinds.contains(&o.kind))
        {
            return Some(Protection::DaemonManaged {
                owner_kind: owner.kind.clone(),
                owner_name: owner.name.clone(),
            });
        }

        if self.namespaces.contains(&instance.namespace) {
            return Some(Protection::SystemNamespace {
                namespace: instance.namespace.clone(),
            });
        }

        None
    }

    pub fn is_protected(&self, instance: &Instance) -> bool {
        self.classify(instance).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daemon_owned_instance_is_protected() {
        let policy = ProtectionPolicy::default();
        let pod = Instance::new("node-exporter-abc", "monitoring").with_owner("DaemonSet", "node-exporter");

        let protection = policy.classify(&pod).unwrap();
        assert_eq!(protection.to_string(), "daemon-managed");
    }

    #[test]
    fn test_system_namespace_is_protected() {
        let policy = ProtectionPolicy::default();
        let pod = Instance::new("coredns-123", "kube-system").with_owner("ReplicaSet", "coredns");

        assert_eq!(
            policy.classify(&pod),
            Some(Protection::SystemNamespace {
                namespace: "kube-system".to_string()
            })
        );
    }

    #[test]
    fn test_owner_rule_wins_over_namespace_rule() {
        let policy = ProtectionPolicy::default();
        let pod = Instance::new("kube-proxy-x", "kube-system").with_owner("DaemonSet", "kube-proxy");

        assert!(matches!(
            policy.classify(&pod),
            Some(Protection::DaemonManaged { .. })
        ));
    }

    #[test]
    fn test_ordinary_instance_is_not_protected() {
        let policy = ProtectionPolicy::default();
        let pod = Instance::new("web-0", "default").with_owner("ReplicaSet", "web-5d9f");
        assert!(!policy.is_protected(&pod));
    }

    #[test]
    fn test_policy_is_configurable() {
        let policy = ProtectionPolicy::new(["StatefulSet"], ["payments"]);

        let daemon = Instance::new("agent", "default").with_owner("DaemonSet", "agent");
        assert!(!policy.is_protected(&daemon));

        let db = Instance::new("db-0", "default").with_owner("StatefulSet", "db");
        assert!(policy.is_protected(&db));

        let billing = Instance::new("billing", "payments");
        assert!(policy.is_protected(&billing));

        let open = ProtectionPolicy::new(Vec::<String>::new(), Vec::<String>::new());
        assert!(!open.is_protected(&Instance::new("dns", "kube-system")));
    }
}
