//! Kubernetes application aggregation
//!
//! Reduces a snapshot of cluster resources into a list of display-ready applications:
//!
//! - Each `Deployment`, `StatefulSet` and `DaemonSet` is normalized into a [`Workload`].
//! - Workloads are grouped into applications by their `glance/id` and `glance/parent`
//!   annotations. A group without an owner promotes its first dependency (by name).
//! - Each `Service` selects over the workloads in its namespace, and each `Ingress` or `HTTPRoute`
//!   references services in its namespace. An application is exposed by the first object found
//!   through its owner or, failing that, through its dependencies.
//! - Applications are then filtered by exclusion patterns and condition expressions, and sorted
//!   by display name.
//!
//! ```text
//! [ Workload ] <- [ Service ] <- [ Ingress | HTTPRoute ]
//!      ^
//!      |
//! [ App ] -> [ Workload (dependency) ]*
//! ```
//!
//! Every aggregation works on its own snapshot; nothing is shared across requests.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod aggregate;
pub mod app;
pub mod exposure;
pub mod expr;
pub mod filter;
pub mod group;
pub mod workload;


pub use self::{
    aggregate::{aggregate, list_apps, Apps, Error, Fetch, Inventory, Step},
    app::App,
    exposure::Exposure,
    filter::{AppsOptions, Diagnostic, FilterError, Filters},
    workload::{ResourceRef, Status, Workload, WorkloadKind},
};
