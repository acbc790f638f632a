use glance_k8s_core::{App, Workload};
use serde::Serialize;
use std::borrow::Cow;

/// The JSON representation of an application.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppView {
    pub name: String,
    pub namespace: String,
    pub title: String,
    pub icon: String,
    pub icon_url: String,
    pub url: String,
    pub same_tab: bool,
    pub description: String,
    pub ready: bool,
    pub workload: WorkloadView,
    pub dependencies: Vec<WorkloadView>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WorkloadView {
    pub kind: &'static str,
    pub namespace: String,
    pub name: String,
    pub desired: i32,
    pub ready: i32,
}

// === impl AppView ===

impl From<&App> for AppView {
    fn from(app: &App) -> Self {
        let icon = app.icon();
        Self {
            name: app.workload.name.clone(),
            namespace: app.workload.namespace.clone(),
            title: app.name(),
            icon: icon.to_string(),
            icon_url: icon_url(icon).into_owned(),
            url: app.url(),
            same_tab: app.same_tab(),
            description: app.description().to_string(),
            ready: app.ready(),
            workload: (&app.workload).into(),
            dependencies: app.dependencies.iter().map(Into::into).collect(),
        }
    }
}

impl From<&Workload> for WorkloadView {
    fn from(workload: &Workload) -> Self {
        Self {
            kind: workload.kind.as_str(),
            namespace: workload.namespace.clone(),
            name: workload.name.clone(),
            desired: workload.status.desired,
            ready: workload.status.ready,
        }
    }
}

/// Expands `si:<name>` and `di:<name>[.<ext>]` shorthands to CDN URLs.
///
/// Any other value is returned unchanged.
pub fn icon_url(icon: &str) -> Cow<'_, str> {
    let Some((shorthand, rest)) = icon.split_once(':') else {
        return Cow::Borrowed(icon);
    };
    let (name, ext) = rest.split_once('.').unwrap_or((rest, ""));
    if name.contains(char::is_whitespace)
        || !ext.chars().all(|c| c.is_alphanumeric() || c == '_')
    {
        return Cow::Borrowed(icon);
    }

    match shorthand {
        "si" => Cow::Owned(format!(
            "https://cdn.jsdelivr.net/npm/simple-icons@latest/icons/{name}.svg"
        )),
        "di" => {
            let ext = if ext.is_empty() { "svg" } else { ext };
            Cow::Owned(format!(
                "https://cdn.jsdelivr.net/gh/homarr-labs/dashboard-icons/{ext}/{name}.{ext}"
            ))
        }
        _ => Cow::Borrowed(icon),
    }
}
