#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod labels;

pub use self::labels::{Labels, Selector};
pub use gateway_api::apis::standard::httproutes::{
    HTTPRoute, HTTPRouteRules, HTTPRouteRulesBackendRefs, HTTPRouteRulesMatches, HTTPRouteSpec,
};
pub use k8s_openapi::{
    api::{
        self,
        apps::v1::{DaemonSet, Deployment, StatefulSet},
        core::v1::Service,
        networking::v1::Ingress,
    },
    apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta},
};
pub use kube::{Resource, ResourceExt};

/// The annotations map attached to Kubernetes objects.
pub type Annotations = std::collections::BTreeMap<String, String>;
