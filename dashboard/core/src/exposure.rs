use crate::{
    group::Group,
    workload::{ResourceRef, Workload},
};
use ahash::AHashMap as HashMap;
use glance_k8s_api::{
    Annotations, HTTPRoute, HTTPRouteRulesBackendRefs, Ingress, ResourceExt, Selector, Service,
};
use tracing::debug;

/// An object that routes external traffic to a service.
#[derive(Clone, Debug)]
pub enum Exposure {
    Ingress(Ingress),
    Route(HTTPRoute),
}

/// Maps workloads to the exposure that fronts them through a service.
///
/// Workloads are keyed by namespace and name only, so a Deployment and a StatefulSet that share a
/// name in one namespace share an entry.
#[derive(Debug, Default)]
pub struct ExposureIndex {
    by_workload: HashMap<ResourceRef, Exposure>,
}

// === impl Exposure ===

impl Exposure {
    pub fn reference(&self) -> ResourceRef {
        match self {
            Self::Ingress(ingress) => ResourceRef::of(ingress),
            Self::Route(route) => ResourceRef::of(route),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ingress(_) => "Ingress",
            Self::Route(_) => "HTTPRoute",
        }
    }

    pub fn annotations(&self) -> &Annotations {
        match self {
            Self::Ingress(ingress) => ingress.annotations(),
            Self::Route(route) => route.annotations(),
        }
    }

    /// Returns true if this object routes to the named service in its own namespace.
    pub fn targets(&self, service: &ResourceRef) -> bool {
        let ns = match self {
            Self::Ingress(ingress) => ingress.namespace(),
            Self::Route(route) => route.namespace(),
        };
        if ns.as_deref().unwrap_or_default() != service.namespace {
            return false;
        }

        match self {
            Self::Ingress(ingress) => ingress_backends(ingress).any(|name| name == service.name),
            Self::Route(route) => route
                .spec
                .rules
                .iter()
                .flatten()
                .flat_map(|rule| rule.backend_refs.iter().flatten())
                .filter(|br| is_service_backend(br, &service.namespace))
                .any(|br| br.name == service.name),
        }
    }
}

impl From<Ingress> for Exposure {
    fn from(ingress: Ingress) -> Self {
        Self::Ingress(ingress)
    }
}

impl From<HTTPRoute> for Exposure {
    fn from(route: HTTPRoute) -> Self {
        Self::Route(route)
    }
}

/// Enumerates the names of all services referenced by an ingress's default backend and rules.
fn ingress_backends(ingress: &Ingress) -> impl Iterator<Item = &str> {
    let spec = ingress.spec.as_ref();
    let default = spec
        .and_then(|s| s.default_backend.as_ref())
        .and_then(|b| b.service.as_ref());
    let rules = spec
        .and_then(|s| s.rules.as_ref())
        .into_iter()
        .flatten()
        .filter_map(|rule| rule.http.as_ref())
        .flat_map(|http| http.paths.iter())
        .filter_map(|path| path.backend.service.as_ref());
    default.into_iter().chain(rules).map(|svc| svc.name.as_str())
}

fn is_service_backend(br: &HTTPRouteRulesBackendRefs, route_ns: &str) -> bool {
    matches!(br.group.as_deref(), Some("core") | Some("") | None)
        && matches!(br.kind.as_deref(), Some("Service") | None)
        && br.namespace.as_deref().is_none_or(|ns| ns == route_ns)
}

// === impl ExposureIndex ===

impl ExposureIndex {
    /// Links every workload to an exposure by way of the services that select it.
    ///
    /// A service is fronted by the first exposure that targets it, and a workload by the first
    /// selecting service that is fronted by an exposure.
    pub fn new<'w>(
        workloads: impl IntoIterator<Item = &'w Workload>,
        services: &[Service],
        exposures: &[Exposure],
    ) -> Self {
        let mut by_service = HashMap::<ResourceRef, &Exposure>::new();
        for service in services {
            let svc = ResourceRef::of(service);
            if let Some(exposure) = exposures.iter().find(|e| e.targets(&svc)) {
                debug!(
                    service = %svc,
                    exposure = %exposure.reference(),
                    kind = exposure.kind(),
                    "Found exposure for service"
                );
                by_service.insert(svc, exposure);
            }
        }

        let selectors = services
            .iter()
            .map(|svc| {
                let selector = svc.spec.as_ref().and_then(|s| s.selector.as_ref());
                (ResourceRef::of(svc), Selector::from(selector))
            })
            .collect::<Vec<_>>();

        let mut by_workload = HashMap::new();
        for workload in workloads {
            let exposure = selectors
                .iter()
                .filter(|(svc, selector)| {
                    svc.namespace == workload.namespace
                        && selector.matches(&workload.template_labels)
                })
                .find_map(|(svc, _)| {
                    debug!(
                        service = %svc,
                        workload = %workload.full_name(),
                        "Found service for workload"
                    );
                    by_service.get(svc)
                });
            if let Some(exposure) = exposure {
                debug!(
                    workload = %workload.full_name(),
                    exposure = %exposure.reference(),
                    kind = exposure.kind(),
                    "Found exposure for workload"
                );
                by_workload.insert(workload.reference(), (*exposure).clone());
            }
        }

        Self { by_workload }
    }

    pub fn get(&self, workload: &Workload) -> Option<&Exposure> {
        self.by_workload.get(&workload.reference())
    }

    /// Finds the exposure for a group, preferring the owner over its dependencies.
    pub fn resolve(&self, group: &Group) -> Option<&Exposure> {
        std::iter::once(&group.owner)
            .chain(group.dependencies.iter())
            .find_map(|w| self.get(w))
    }

    pub fn len(&self) -> usize {
        self.by_workload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_workload.is_empty()
    }
}
