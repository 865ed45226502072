use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of every first-class object the control plane stores. Mirrors the
/// `[MODULE]` set in spec.md §3 exactly; adding a kind here means adding a KV
/// prefix, an API route group, and (usually) a controller.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum Kind {
    Node,
    Pod,
    ReplicaSet,
    HorizontalPodAutoscaler,
    Service,
    Dns,
    PersistentVolume,
    PersistentVolumeClaim,
    Function,
    Workflow,
}

impl Kind {
    /// Whether objects of this kind live under a namespace or are cluster-scoped.
    /// Node and PersistentVolume are the two cluster-scoped kinds (spec.md §3).
    pub const fn is_namespaced(self) -> bool {
        !matches!(self, Kind::Node | Kind::PersistentVolume)
    }

    /// Lowercase, pluralized path segment used both in KV keys and HTTP routes,
    /// e.g. `Kind::ReplicaSet` -> `"replicasets"`.
    pub fn plural(self) -> &'static str {
        match self {
            Kind::Node => "nodes",
            Kind::Pod => "pods",
            Kind::ReplicaSet => "replicasets",
            Kind::HorizontalPodAutoscaler => "horizontalpodautoscalers",
            Kind::Service => "services",
            Kind::Dns => "dns",
            Kind::PersistentVolume => "persistentvolumes",
            Kind::PersistentVolumeClaim => "persistentvolumeclaims",
            Kind::Function => "functions",
            Kind::Workflow => "workflows",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.plural())
    }
}

/// Addresses any object by `(kind, namespace, name)`, or `(kind, name)` for
/// cluster-scoped kinds (spec.md §3, first paragraph).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub kind: Kind,
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn namespaced(kind: Kind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    pub fn cluster_scoped(kind: Kind, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: None,
            name: name.into(),
        }
    }

    /// The hierarchical KV key for this object, per spec.md §6:
    /// `/{kind}s/{namespace}/{name}`, or `/{kind}s/{name}` when cluster-scoped.
    pub fn kv_path(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("/{}/{}/{}", self.kind.plural(), ns, self.name),
            None => format!("/{}/{}", self.kind.plural(), self.name),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaced_kv_path() {
        let key = ObjectKey::namespaced(Kind::Pod, "default", "web-0");
        assert_eq!(key.kv_path(), "/pods/default/web-0");
    }

    #[test]
    fn cluster_scoped_kv_path() {
        let key = ObjectKey::cluster_scoped(Kind::Node, "n1");
        assert_eq!(key.kv_path(), "/nodes/n1");
    }

    #[test]
    fn node_and_pv_are_cluster_scoped() {
        assert!(!Kind::Node.is_namespaced());
        assert!(!Kind::PersistentVolume.is_namespaced());
        assert!(Kind::Pod.is_namespaced());
        assert!(Kind::Service.is_namespaced());
    }
}
