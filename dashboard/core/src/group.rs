//! Groups workloads into applications.
//!
//! A workload annotated with `glance/id: <key>` owns the group `<key>`; a workload annotated with
//! `glance/parent: <key>` is a dependency of that group. All other workloads form a group of their
//! own.

use crate::workload::Workload;
use ahash::AHashMap as HashMap;
use tracing::{debug, warn};

pub const ANNOTATION_ID: &str = "glance/id";
pub const ANNOTATION_PARENT: &str = "glance/parent";

/// A workload and the workloads it depends on.
#[derive(Clone, Debug, PartialEq)]
pub struct Group {
    pub owner: Workload,
    pub dependencies: Vec<Workload>,
}

/// Accumulates the members of a group while workloads are enumerated.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GroupBuilder {
    owner: Option<Workload>,
    dependencies: Vec<Workload>,
}

/// Partitions workloads into groups.
///
/// Groups are returned in the order in which their first member was enumerated.
pub fn group(workloads: impl IntoIterator<Item = Workload>) -> Vec<Group> {
    let mut builders = Vec::<GroupBuilder>::new();
    let mut by_key = HashMap::<String, usize>::new();

    for workload in workloads {
        if let Some(id) = workload.annotation(ANNOTATION_ID).map(str::to_string) {
            debug!(
                namespace = %workload.namespace,
                name = %workload.name,
                %id,
                "Workload owns group"
            );
            let idx = *by_key.entry(id).or_insert_with(|| {
                builders.push(GroupBuilder::default());
                builders.len() - 1
            });
            builders[idx].set_owner(workload);
        } else if let Some(parent) = workload.annotation(ANNOTATION_PARENT).map(str::to_string) {
            debug!(
                namespace = %workload.namespace,
                name = %workload.name,
                %parent,
                "Workload is a dependency of group"
            );
            let idx = *by_key.entry(parent).or_insert_with(|| {
                builders.push(GroupBuilder::default());
                builders.len() - 1
            });
            builders[idx].push_dependency(workload);
        } else {
            debug!(
                namespace = %workload.namespace,
                name = %workload.name,
                "Workload is not part of a group"
            );
            builders.push(GroupBuilder::from_owner(workload));
        }
    }

    let groups = builders
        .into_iter()
        .filter_map(GroupBuilder::finish)
        .collect::<Vec<_>>();
    debug!(groups = groups.len(), "Grouped workloads");
    groups
}

// === impl GroupBuilder ===

impl GroupBuilder {
    pub fn from_owner(owner: Workload) -> Self {
        Self {
            owner: Some(owner),
            dependencies: Vec::new(),
        }
    }

    /// Sets the owner of the group. A previously declared owner is kept as a dependency.
    pub fn set_owner(&mut self, owner: Workload) {
        if let Some(prior) = self.owner.replace(owner) {
            warn!(
                replaced = %prior.full_name(),
                owner = ?self.owner.as_ref().map(Workload::full_name),
                "Multiple workloads declare the same group id; the last one owns the group"
            );
            self.dependencies.push(prior);
        }
    }

    pub fn push_dependency(&mut self, dependency: Workload) {
        self.dependencies.push(dependency);
    }

    /// Completes the group.
    ///
    /// Dependencies are sorted by name. When no owner was declared, the first dependency is
    /// promoted to be the owner. Returns `None` only if the builder holds no workloads at all.
    pub fn finish(self) -> Option<Group> {
        let Self {
            owner,
            mut dependencies,
        } = self;

        dependencies.sort_by(|a, b| a.name.cmp(&b.name));

        let owner = match owner {
            Some(owner) => owner,
            None if dependencies.is_empty() => return None,
            None => {
                let owner = dependencies.remove(0);
                debug!(
                    namespace = %owner.namespace,
                    name = %owner.name,
                    "Group has no owner; promoting first dependency"
                );
                owner
            }
        };

        Some(Group {
            owner,
            dependencies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::{Status, WorkloadKind};

    fn mk_workload(name: &str, annotations: &[(&str, &str)]) -> Workload {
        Workload {
            kind: WorkloadKind::Deployment,
            name: name.to_string(),
            namespace: "ns-0".to_string(),
            annotations: annotations
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            selector: Default::default(),
            template_labels: Default::default(),
            status: Status::default(),
        }
    }

    fn names(workloads: &[Workload]) -> Vec<&str> {
        workloads.iter().map(|w| w.name.as_str()).collect()
    }

    #[test]
    fn ungrouped_workloads_are_singletons() {
        let groups = group(vec![
            mk_workload("a", &[]),
            mk_workload("b", &[]),
            mk_workload("c", &[]),
        ]);
        assert_eq!(groups.len(), 3);
        for (group, name) in groups.iter().zip(["a", "b", "c"]) {
            assert_eq!(group.owner.name, name);
            assert!(group.dependencies.is_empty());
        }
    }

    #[test]
    fn owner_declared_after_dependencies() {
        let groups = group(vec![
            mk_workload("db", &[(ANNOTATION_PARENT, "shop")]),
            mk_workload("cache", &[(ANNOTATION_PARENT, "shop")]),
            mk_workload("web", &[(ANNOTATION_ID, "shop")]),
        ]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].owner.name, "web");
        assert_eq!(names(&groups[0].dependencies), vec!["cache", "db"]);
    }

    #[test]
    fn owner_declared_before_dependencies() {
        let groups = group(vec![
            mk_workload("web", &[(ANNOTATION_ID, "shop")]),
            mk_workload("other", &[]),
            mk_workload("db", &[(ANNOTATION_PARENT, "shop")]),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].owner.name, "web");
        assert_eq!(names(&groups[0].dependencies), vec!["db"]);
        assert_eq!(groups[1].owner.name, "other");
    }

    #[test]
    fn id_takes_precedence_over_parent() {
        let groups = group(vec![
            mk_workload("web", &[(ANNOTATION_ID, "shop"), (ANNOTATION_PARENT, "other")]),
            mk_workload("db", &[(ANNOTATION_PARENT, "shop")]),
        ]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].owner.name, "web");
    }

    #[test]
    fn promotes_smallest_dependency_regardless_of_order() {
        let forward = vec![
            mk_workload("worker", &[(ANNOTATION_PARENT, "jobs")]),
            mk_workload("api", &[(ANNOTATION_PARENT, "jobs")]),
            mk_workload("scheduler", &[(ANNOTATION_PARENT, "jobs")]),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();

        for workloads in [forward, reversed] {
            let groups = group(workloads);
            assert_eq!(groups.len(), 1);
            assert_eq!(groups[0].owner.name, "api");
            assert_eq!(
                names(&groups[0].dependencies),
                vec!["scheduler", "worker"]
            );
        }
    }

    #[test]
    fn last_owner_wins() {
        let groups = group(vec![
            mk_workload("first", &[(ANNOTATION_ID, "shop")]),
            mk_workload("db", &[(ANNOTATION_PARENT, "shop")]),
            mk_workload("second", &[(ANNOTATION_ID, "shop")]),
        ]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].owner.name, "second");
        assert_eq!(names(&groups[0].dependencies), vec!["db", "first"]);
    }

    #[test]
    fn duplicate_owners_keep_every_member() {
        let forward = vec![
            mk_workload("blue", &[(ANNOTATION_ID, "shop")]),
            mk_workload("db", &[(ANNOTATION_PARENT, "shop")]),
            mk_workload("green", &[(ANNOTATION_ID, "shop")]),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();

        for workloads in [forward, reversed] {
            let groups = group(workloads);
            assert_eq!(groups.len(), 1);
            let mut members = std::iter::once(&groups[0].owner)
                .chain(groups[0].dependencies.iter())
                .map(|w| w.name.as_str())
                .collect::<Vec<_>>();
            members.sort_unstable();
            assert_eq!(members, vec!["blue", "db", "green"]);
        }
    }

    #[test]
    fn empty_builder_yields_nothing() {
        assert_eq!(GroupBuilder::default().finish(), None);
    }
}
