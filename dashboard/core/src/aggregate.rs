use crate::{
    app::App,
    exposure::{Exposure, ExposureIndex},
    expr::ExpressionEngine,
    filter::{AppsOptions, Diagnostic, FilterError, Filters},
    group::group,
    workload::Workload,
};
use anyhow::Result;
use glance_k8s_api::{DaemonSet, Deployment, HTTPRoute, Ingress, Service, StatefulSet};
use std::fmt;
use tracing::{debug, instrument};

/// Lists the cluster-wide snapshots an aggregation is built from.
#[async_trait::async_trait]
pub trait Fetch: Send + Sync {
    async fn deployments(&self) -> Result<Vec<Deployment>>;

    async fn stateful_sets(&self) -> Result<Vec<StatefulSet>>;

    async fn daemon_sets(&self) -> Result<Vec<DaemonSet>>;

    async fn services(&self) -> Result<Vec<Service>>;

    async fn ingresses(&self) -> Result<Vec<Ingress>>;

    async fn http_routes(&self) -> Result<Vec<HTTPRoute>>;
}

/// The raw resources read for a single aggregation.
#[derive(Clone, Debug, Default)]
pub struct Inventory {
    pub deployments: Vec<Deployment>,
    pub stateful_sets: Vec<StatefulSet>,
    pub daemon_sets: Vec<DaemonSet>,
    pub services: Vec<Service>,
    pub ingresses: Vec<Ingress>,
    pub http_routes: Vec<HTTPRoute>,
}

/// Identifies the read that failed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Step {
    Deployments,
    StatefulSets,
    DaemonSets,
    Services,
    Ingresses,
    HttpRoutes,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to list {step}: {source}")]
    Fetch {
        step: Step,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// The filtered, ordered applications and the conditions that failed to evaluate.
#[derive(Clone, Debug, Default)]
pub struct Apps {
    pub items: Vec<App>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Compiles `options`, reads the cluster, and aggregates the result.
///
/// Nothing is read when the options do not compile.
pub async fn list_apps<F: Fetch + ?Sized>(fetch: &F, options: &AppsOptions) -> Result<Apps, Error> {
    let filters = Filters::compile(options)?;
    let inventory = Inventory::fetch(fetch).await?;
    Ok(aggregate(inventory, &filters))
}

/// Reduces an inventory to display-ready applications.
#[instrument(skip_all)]
pub fn aggregate(inventory: Inventory, filters: &Filters<impl ExpressionEngine>) -> Apps {
    let Inventory {
        deployments,
        stateful_sets,
        daemon_sets,
        services,
        ingresses,
        http_routes,
    } = inventory;

    let workloads = deployments
        .into_iter()
        .map(Workload::from)
        .chain(stateful_sets.into_iter().map(Workload::from))
        .chain(daemon_sets.into_iter().map(Workload::from))
        .collect::<Vec<_>>();
    let exposures = ingresses
        .into_iter()
        .map(Exposure::from)
        .chain(http_routes.into_iter().map(Exposure::from))
        .collect::<Vec<_>>();

    let index = ExposureIndex::new(&workloads, &services, &exposures);
    debug!(
        workloads = workloads.len(),
        services = services.len(),
        exposures = exposures.len(),
        exposed = index.len(),
        "Indexed exposures"
    );

    let apps = group(workloads)
        .into_iter()
        .map(|group| {
            let exposure = index.resolve(&group).cloned();
            App::new(group, exposure)
        })
        .collect();

    let (items, diagnostics) = filters.apply(apps);
    debug!(apps = items.len(), diagnostics = diagnostics.len(), "Aggregated");
    Apps { items, diagnostics }
}

// === impl Inventory ===

impl Inventory {
    /// Issues all reads concurrently, failing if any of them fails.
    pub async fn fetch<F: Fetch + ?Sized>(fetch: &F) -> Result<Self, Error> {
        let (deployments, stateful_sets, daemon_sets, services, ingresses, http_routes) =
            futures::try_join!(
                async { fetch.deployments().await.map_err(Step::Deployments.failed()) },
                async { fetch.stateful_sets().await.map_err(Step::StatefulSets.failed()) },
                async { fetch.daemon_sets().await.map_err(Step::DaemonSets.failed()) },
                async { fetch.services().await.map_err(Step::Services.failed()) },
                async { fetch.ingresses().await.map_err(Step::Ingresses.failed()) },
                async { fetch.http_routes().await.map_err(Step::HttpRoutes.failed()) },
            )?;

        Ok(Self {
            deployments,
            stateful_sets,
            daemon_sets,
            services,
            ingresses,
            http_routes,
        })
    }
}

// === impl Step ===

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deployments => "deployments",
            Self::StatefulSets => "statefulsets",
            Self::DaemonSets => "daemonsets",
            Self::Services => "services",
            Self::Ingresses => "ingresses",
            Self::HttpRoutes => "httproutes",
        }
    }

    fn failed(self) -> impl FnOnce(anyhow::Error) -> Error {
        move |source| Error::Fetch { step: self, source }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
