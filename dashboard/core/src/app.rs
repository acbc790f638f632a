use crate::{exposure::Exposure, group::Group, workload::Workload};
use glance_k8s_api::{Annotations, HTTPRoute, Ingress};

pub const ANNOTATION_NAME: &str = "glance/name";
pub const ANNOTATION_ICON: &str = "glance/icon";
pub const ANNOTATION_URL: &str = "glance/url";
pub const ANNOTATION_SAME_TAB: &str = "glance/same-tab";
pub const ANNOTATION_DESCRIPTION: &str = "glance/description";

pub const DEFAULT_ICON: &str = "di:kubernetes";

/// A logical application: an owner workload, its dependencies, and the object exposing it.
#[derive(Clone, Debug)]
pub struct App {
    /// The owner's annotations, overlaid with the exposure's annotations.
    pub annotations: Annotations,
    pub exposure: Option<Exposure>,
    pub workload: Workload,
    pub dependencies: Vec<Workload>,
}

// === impl App ===

impl App {
    pub fn new(group: Group, exposure: Option<Exposure>) -> Self {
        let Group {
            owner,
            dependencies,
        } = group;

        let mut annotations = owner.annotations.clone();
        if let Some(exposure) = exposure.as_ref() {
            annotations.extend(
                exposure
                    .annotations()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone())),
            );
        }

        Self {
            annotations,
            exposure,
            workload: owner,
            dependencies,
        }
    }

    fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    /// The display name of the application.
    pub fn name(&self) -> String {
        match self.annotation(ANNOTATION_NAME) {
            Some(name) => name.to_string(),
            None => title_case(&self.workload.name),
        }
    }

    pub fn icon(&self) -> &str {
        self.annotation(ANNOTATION_ICON).unwrap_or(DEFAULT_ICON)
    }

    pub fn url(&self) -> String {
        if let Some(url) = self.annotation(ANNOTATION_URL) {
            return url.to_string();
        }

        match self.exposure.as_ref() {
            Some(Exposure::Ingress(ingress)) => ingress_url(ingress),
            Some(Exposure::Route(route)) => route_url(route),
            None => String::new(),
        }
    }

    pub fn same_tab(&self) -> bool {
        self.annotation(ANNOTATION_SAME_TAB) == Some("true")
    }

    pub fn description(&self) -> &str {
        self.annotation(ANNOTATION_DESCRIPTION).unwrap_or_default()
    }

    /// An application is ready when its owner and all of its dependencies are ready.
    pub fn ready(&self) -> bool {
        self.workload.status.is_ready() && self.dependencies.iter().all(|d| d.status.is_ready())
    }
}

/// Capitalizes the first letter of each whitespace-delimited word.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut word_start = true;
    for c in s.chars() {
        if word_start && !c.is_whitespace() {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        word_start = c.is_whitespace();
    }
    out
}

fn format_url(scheme: &str, host: &str, path: &str) -> String {
    if host.is_empty() {
        return String::new();
    }
    if path.is_empty() || path.starts_with('/') {
        format!("{scheme}://{host}{path}")
    } else {
        format!("{scheme}://{host}/{path}")
    }
}

/// Builds a URL from the first rule of an ingress, using the shortest of its paths.
fn ingress_url(ingress: &Ingress) -> String {
    let Some(spec) = ingress.spec.as_ref() else {
        return String::new();
    };

    let scheme = if spec.tls.as_ref().is_some_and(|tls| !tls.is_empty()) {
        "https"
    } else {
        "http"
    };

    let Some(rule) = spec.rules.iter().flatten().next() else {
        return String::new();
    };
    let host = rule.host.as_deref().unwrap_or_default();
    let path = rule
        .http
        .iter()
        .flat_map(|http| http.paths.iter())
        .map(|p| p.path.as_deref().unwrap_or_default())
        .min_by_key(|p| p.len())
        .unwrap_or_default();

    format_url(scheme, host, path)
}

/// Builds an HTTPS URL from the first hostname and the first match's path of a route.
fn route_url(route: &HTTPRoute) -> String {
    let host = route
        .spec
        .hostnames
        .iter()
        .flatten()
        .next()
        .map(String::as_str)
        .unwrap_or_default();
    let path = route
        .spec
        .rules
        .iter()
        .flatten()
        .flat_map(|rule| rule.matches.iter().flatten())
        .next()
        .and_then(|m| m.path.as_ref())
        .and_then(|p| p.value.as_deref())
        .unwrap_or_default();

    format_url("https", host, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::{Status, WorkloadKind};
    use glance_k8s_api::{
        api::networking::v1::{
            HTTPIngressPath, HTTPIngressRuleValue, IngressBackend, IngressRule, IngressSpec,
            IngressTLS,
        },
        ObjectMeta,
    };

    fn mk_workload(name: &str, desired: i32, ready: i32) -> Workload {
        Workload {
            kind: WorkloadKind::Deployment,
            name: name.to_string(),
            namespace: "ns-0".to_string(),
            annotations: Default::default(),
            selector: Default::default(),
            template_labels: Default::default(),
            status: Status { desired, ready },
        }
    }

    fn mk_app(annotations: &[(&str, &str)]) -> App {
        let mut workload = mk_workload("web", 1, 1);
        workload.annotations = annotations
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        App::new(
            Group {
                owner: workload,
                dependencies: vec![],
            },
            None,
        )
    }

    fn mk_ingress(tls: bool, host: &str, paths: &[&str]) -> Ingress {
        Ingress {
            metadata: ObjectMeta {
                namespace: Some("ns-0".to_string()),
                name: Some("web".to_string()),
                ..Default::default()
            },
            spec: Some(IngressSpec {
                tls: tls.then(|| vec![IngressTLS::default()]),
                rules: Some(vec![IngressRule {
                    host: Some(host.to_string()),
                    http: Some(HTTPIngressRuleValue {
                        paths: paths
                            .iter()
                            .map(|p| HTTPIngressPath {
                                backend: IngressBackend::default(),
                                path: Some(p.to_string()),
                                path_type: "Prefix".to_string(),
                            })
                            .collect(),
                    }),
                }]),
                ..Default::default()
            }),
            status: None,
        }
    }

    fn mk_route(spec: serde_json::Value) -> HTTPRoute {
        serde_json::from_value(serde_json::json!({
            "apiVersion": "gateway.networking.k8s.io/v1",
            "kind": "HTTPRoute",
            "metadata": { "namespace": "ns-0", "name": "web" },
            "spec": spec,
        }))
        .expect("route must be valid")
    }

    #[test]
    fn name_defaults_to_title_case() {
        assert_eq!(mk_app(&[]).name(), "Web");
        assert_eq!(mk_app(&[(ANNOTATION_NAME, "My Shop")]).name(), "My Shop");
        assert_eq!(title_case("hello big  world"), "Hello Big  World");
        assert_eq!(title_case("my-app"), "My-app");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn presentation_annotations() {
        let app = mk_app(&[]);
        assert_eq!(app.icon(), DEFAULT_ICON);
        assert_eq!(app.url(), "");
        assert!(!app.same_tab());
        assert_eq!(app.description(), "");

        let app = mk_app(&[
            (ANNOTATION_ICON, "si:grafana"),
            (ANNOTATION_URL, "https://grafana.example.com"),
            (ANNOTATION_SAME_TAB, "true"),
            (ANNOTATION_DESCRIPTION, "Dashboards"),
        ]);
        assert_eq!(app.icon(), "si:grafana");
        assert_eq!(app.url(), "https://grafana.example.com");
        assert!(app.same_tab());
        assert_eq!(app.description(), "Dashboards");

        assert!(!mk_app(&[(ANNOTATION_SAME_TAB, "True")]).same_tab());
        assert!(!mk_app(&[(ANNOTATION_SAME_TAB, "yes")]).same_tab());
    }

    #[test]
    fn ingress_url_uses_shortest_path() {
        let ingress = mk_ingress(true, "app.example.com", &["/api", "/"]);
        assert_eq!(ingress_url(&ingress), "https://app.example.com/");

        let ingress = mk_ingress(false, "app.example.com", &["/api", "/web"]);
        assert_eq!(ingress_url(&ingress), "http://app.example.com/api");

        let ingress = mk_ingress(false, "app.example.com", &[]);
        assert_eq!(ingress_url(&ingress), "http://app.example.com");

        let ingress = mk_ingress(false, "", &["/"]);
        assert_eq!(ingress_url(&ingress), "");
    }

    #[test]
    fn route_url_uses_first_hostname_and_match() {
        let route = mk_route(serde_json::json!({
            "hostnames": ["app.example.com", "www.example.com"],
            "rules": [
                { "matches": [{ "path": { "type": "PathPrefix", "value": "/app" } }] },
                { "matches": [{ "path": { "type": "PathPrefix", "value": "/" } }] },
            ],
        }));
        assert_eq!(route_url(&route), "https://app.example.com/app");

        let route = mk_route(serde_json::json!({ "hostnames": ["app.example.com"] }));
        assert_eq!(route_url(&route), "https://app.example.com");

        let route = mk_route(serde_json::json!({}));
        assert_eq!(route_url(&route), "");
    }

    #[test]
    fn url_annotation_overrides_exposure() {
        let mut workload = mk_workload("web", 1, 1);
        workload.annotations.insert(
            ANNOTATION_URL.to_string(),
            "https://override.example.com".to_string(),
        );
        let app = App::new(
            Group {
                owner: workload,
                dependencies: vec![],
            },
            Some(Exposure::Ingress(mk_ingress(true, "app.example.com", &["/"]))),
        );
        assert_eq!(app.url(), "https://override.example.com");
    }

    #[test]
    fn exposure_annotations_take_precedence() {
        let mut workload = mk_workload("web", 1, 1);
        workload
            .annotations
            .insert(ANNOTATION_NAME.to_string(), "Workload".to_string());
        workload
            .annotations
            .insert(ANNOTATION_ICON.to_string(), "si:nginx".to_string());
        let mut ingress = mk_ingress(true, "app.example.com", &["/"]);
        ingress.metadata.annotations = Some(
            [(ANNOTATION_NAME.to_string(), "Ingress".to_string())]
                .into_iter()
                .collect(),
        );

        let app = App::new(
            Group {
                owner: workload,
                dependencies: vec![],
            },
            Some(Exposure::Ingress(ingress)),
        );
        assert_eq!(app.name(), "Ingress");
        assert_eq!(app.icon(), "si:nginx");
        assert_eq!(app.url(), "https://app.example.com/");
    }

    #[test]
    fn readiness_rolls_up_dependencies() {
        let mut app = App::new(
            Group {
                owner: mk_workload("web", 2, 2),
                dependencies: vec![mk_workload("db", 1, 1)],
            },
            None,
        );
        assert!(app.ready());

        app.dependencies.push(mk_workload("cache", 1, 0));
        assert!(!app.ready());

        app.dependencies.pop();
        assert!(app.ready());

        app.workload.status.ready = 1;
        assert!(!app.ready());
    }
}
