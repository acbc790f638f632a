use glance_k8s_api::{
    self as k8s, Annotations, DaemonSet, Deployment, LabelSelector, Labels, ResourceExt,
    StatefulSet,
};
use std::fmt;

/// Identifies a namespaced resource.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResourceRef {
    pub namespace: String,
    pub name: String,
}

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
    DaemonSet,
}

/// A workload normalized from one of the supported controller kinds.
///
/// Annotations combine the pod template's annotations with the object's own annotations, the
/// latter taking precedence.
#[derive(Clone, Debug, PartialEq)]
pub struct Workload {
    pub kind: WorkloadKind,
    pub name: String,
    pub namespace: String,
    pub annotations: Annotations,
    pub selector: LabelSelector,
    pub template_labels: Labels,
    pub status: Status,
}

/// Desired and ready replica counts.
///
/// For daemon sets these are the number of nodes that should run the daemon pod and the number of
/// nodes on which it is ready.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Status {
    pub desired: i32,
    pub ready: i32,
}

// === impl ResourceRef ===

impl ResourceRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn of<K: ResourceExt>(resource: &K) -> Self {
        Self::new(resource.namespace().unwrap_or_default(), resource.name_any())
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// === impl WorkloadKind ===

impl WorkloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deployment => "Deployment",
            Self::StatefulSet => "StatefulSet",
            Self::DaemonSet => "DaemonSet",
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl Workload ===

impl Workload {
    fn new(
        kind: WorkloadKind,
        meta: &k8s::ObjectMeta,
        selector: LabelSelector,
        template: Option<&k8s::ObjectMeta>,
        status: Status,
    ) -> Self {
        let mut annotations = template
            .and_then(|t| t.annotations.clone())
            .unwrap_or_default();
        annotations.extend(meta.annotations.clone().unwrap_or_default());

        Self {
            kind,
            name: meta.name.clone().unwrap_or_default(),
            namespace: meta.namespace.clone().unwrap_or_default(),
            annotations,
            selector,
            template_labels: template.and_then(|t| t.labels.as_ref()).into(),
            status,
        }
    }

    pub fn reference(&self) -> ResourceRef {
        ResourceRef::new(&self.namespace, &self.name)
    }

    /// Formats the workload as `namespace/name`.
    pub fn full_name(&self) -> String {
        self.reference().to_string()
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }
}

impl From<Deployment> for Workload {
    fn from(deployment: Deployment) -> Self {
        let spec = deployment.spec.unwrap_or_default();
        let status = deployment
            .status
            .map(|s| Status {
                desired: s.replicas.unwrap_or(0),
                ready: s.ready_replicas.unwrap_or(0),
            })
            .unwrap_or_default();
        Self::new(
            WorkloadKind::Deployment,
            &deployment.metadata,
            spec.selector,
            spec.template.metadata.as_ref(),
            status,
        )
    }
}

impl From<StatefulSet> for Workload {
    fn from(stateful_set: StatefulSet) -> Self {
        let spec = stateful_set.spec.unwrap_or_default();
        let status = stateful_set
            .status
            .map(|s| Status {
                desired: s.replicas,
                ready: s.ready_replicas.unwrap_or(0),
            })
            .unwrap_or_default();
        Self::new(
            WorkloadKind::StatefulSet,
            &stateful_set.metadata,
            spec.selector,
            spec.template.metadata.as_ref(),
            status,
        )
    }
}

impl From<DaemonSet> for Workload {
    fn from(daemon_set: DaemonSet) -> Self {
        let spec = daemon_set.spec.unwrap_or_default();
        let status = daemon_set
            .status
            .map(|s| Status {
                desired: s.desired_number_scheduled,
                ready: s.number_ready,
            })
            .unwrap_or_default();
        Self::new(
            WorkloadKind::DaemonSet,
            &daemon_set.metadata,
            spec.selector,
            spec.template.metadata.as_ref(),
            status,
        )
    }
}

// === impl Status ===

impl Status {
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.ready == self.desired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s::api::{
        apps::v1::{
            DaemonSetSpec, DaemonSetStatus, DeploymentSpec, DeploymentStatus, StatefulSetSpec,
            StatefulSetStatus,
        },
        core::v1::PodTemplateSpec,
    };
    use maplit::btreemap;

    fn meta(
        annotations: std::collections::BTreeMap<String, String>,
        labels: std::collections::BTreeMap<String, String>,
    ) -> k8s::ObjectMeta {
        k8s::ObjectMeta {
            annotations: Some(annotations),
            labels: Some(labels),
            ..Default::default()
        }
    }

    #[test]
    fn deployment_object_annotations_take_precedence() {
        let deployment = Deployment {
            metadata: k8s::ObjectMeta {
                namespace: Some("ns-0".to_string()),
                name: Some("web".to_string()),
                annotations: Some(btreemap! {
                    "glance/name".to_string() => "Object".to_string(),
                    "only/object".to_string() => "1".to_string(),
                }),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                template: PodTemplateSpec {
                    metadata: Some(meta(
                        btreemap! {
                            "glance/name".to_string() => "Template".to_string(),
                            "only/template".to_string() => "2".to_string(),
                        },
                        btreemap! { "app".to_string() => "web".to_string() },
                    )),
                    spec: None,
                },
                ..Default::default()
            }),
            status: Some(DeploymentStatus {
                replicas: Some(3),
                ready_replicas: Some(2),
                ..Default::default()
            }),
        };

        let workload = Workload::from(deployment);
        assert_eq!(workload.kind, WorkloadKind::Deployment);
        assert_eq!(workload.full_name(), "ns-0/web");
        assert_eq!(
            workload.annotations,
            btreemap! {
                "glance/name".to_string() => "Object".to_string(),
                "only/object".to_string() => "1".to_string(),
                "only/template".to_string() => "2".to_string(),
            }
        );
        assert_eq!(
            workload.template_labels.as_ref(),
            &btreemap! { "app".to_string() => "web".to_string() }
        );
        assert_eq!(
            workload.status,
            Status {
                desired: 3,
                ready: 2
            }
        );
        assert!(!workload.status.is_ready());
    }

    #[test]
    fn stateful_set_status() {
        let stateful_set = StatefulSet {
            metadata: k8s::ObjectMeta {
                namespace: Some("ns-0".to_string()),
                name: Some("db".to_string()),
                ..Default::default()
            },
            spec: Some(StatefulSetSpec::default()),
            status: Some(StatefulSetStatus {
                replicas: 1,
                ready_replicas: Some(1),
                ..Default::default()
            }),
        };

        let workload = Workload::from(stateful_set);
        assert_eq!(workload.kind, WorkloadKind::StatefulSet);
        assert!(workload.annotations.is_empty());
        assert!(workload.status.is_ready());
    }

    #[test]
    fn daemon_set_uses_node_counts() {
        let daemon_set = DaemonSet {
            metadata: k8s::ObjectMeta {
                namespace: Some("kube-system".to_string()),
                name: Some("proxy".to_string()),
                ..Default::default()
            },
            spec: Some(DaemonSetSpec::default()),
            status: Some(DaemonSetStatus {
                desired_number_scheduled: 4,
                number_ready: 3,
                current_number_scheduled: 4,
                ..Default::default()
            }),
        };

        let workload = Workload::from(daemon_set);
        assert_eq!(workload.kind, WorkloadKind::DaemonSet);
        assert_eq!(
            workload.status,
            Status {
                desired: 4,
                ready: 3
            }
        );
    }

    #[test]
    fn missing_status_is_ready() {
        let workload = Workload::from(Deployment {
            metadata: k8s::ObjectMeta {
                namespace: Some("ns-0".to_string()),
                name: Some("idle".to_string()),
                ..Default::default()
            },
            ..Default::default()
        });
        assert_eq!(workload.status, Status::default());
        assert!(workload.status.is_ready());
    }
}
