//! Reads cluster-wide snapshots from the Kubernetes API.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

use anyhow::Result;
use glance_k8s_api::{DaemonSet, Deployment, HTTPRoute, Ingress, Resource, Service, StatefulSet};
use glance_k8s_core::Fetch;
use kube::{
    api::{ListMeta, ListParams},
    Api, Client,
};
use serde::de::DeserializeOwned;
use std::{fmt::Debug, sync::Arc};
use tokio::sync::OnceCell;
use tracing::{debug, instrument, warn};

pub const DEFAULT_PAGE_SIZE: u32 = 500;

/// Lists resources across all namespaces, one page at a time.
#[derive(Clone)]
pub struct KubeFetcher {
    client: Client,
    page_size: u32,
    http_routes_served: Arc<OnceCell<bool>>,
}

// === impl KubeFetcher ===

impl KubeFetcher {
    pub fn new(client: Client, page_size: u32) -> Self {
        Self {
            client,
            page_size: page_size.max(1),
            http_routes_served: Default::default(),
        }
    }

    #[instrument(skip(self), fields(kind = %K::kind(&K::DynamicType::default())))]
    async fn list_all<K>(&self) -> Result<Vec<K>>
    where
        K: Resource + Clone + DeserializeOwned + Debug,
        K::DynamicType: Default,
    {
        let api = Api::<K>::all(self.client.clone());
        let mut items = Vec::new();
        let mut params = ListParams::default().limit(self.page_size);
        let mut pages = 0usize;
        loop {
            let list = api.list(&params).await?;
            pages += 1;
            items.extend(list.items);
            match next_page(&list.metadata) {
                Some(token) => params = params.continue_token(&token),
                None => break,
            }
        }
        debug!(items = items.len(), pages, "Listed");
        Ok(items)
    }

    /// Checks whether the API server serves `T`.
    ///
    /// Only a definite answer is cached, so a failed discovery request is retried on the next
    /// call.
    async fn served<T>(&self, cell: &OnceCell<bool>) -> Result<bool>
    where
        T: Resource,
        T::DynamicType: Default,
    {
        let served = cell
            .get_or_try_init(|| async {
                let exists = api_resource_exists::<T>(&self.client).await?;
                if !exists {
                    let dt = Default::default();
                    warn!(
                        "{}.{} resource kind not found, skipping",
                        T::plural(&dt),
                        T::group(&dt),
                    );
                }
                Ok::<_, kube::Error>(exists)
            })
            .await?;
        Ok(*served)
    }
}

#[async_trait::async_trait]
impl Fetch for KubeFetcher {
    async fn deployments(&self) -> Result<Vec<Deployment>> {
        self.list_all().await
    }

    async fn stateful_sets(&self) -> Result<Vec<StatefulSet>> {
        self.list_all().await
    }

    async fn daemon_sets(&self) -> Result<Vec<DaemonSet>> {
        self.list_all().await
    }

    async fn services(&self) -> Result<Vec<Service>> {
        self.list_all().await
    }

    async fn ingresses(&self) -> Result<Vec<Ingress>> {
        self.list_all().await
    }

    async fn http_routes(&self) -> Result<Vec<HTTPRoute>> {
        if !self.served::<HTTPRoute>(&self.http_routes_served).await? {
            return Ok(Vec::new());
        }
        self.list_all().await
    }
}

/// Returns the token for the next page of a list, if there is one.
fn next_page(meta: &ListMeta) -> Option<String> {
    meta.continue_.clone().filter(|token| !token.is_empty())
}

/// Returns false when the group version is not served or does not list `T`.
async fn api_resource_exists<T>(client: &Client) -> kube::Result<bool>
where
    T: Resource,
    T::DynamicType: Default,
{
    let dt = Default::default();
    match client.list_api_group_resources(&T::api_version(&dt)).await {
        Ok(list) => Ok(list.resources.iter().any(|r| r.kind == T::kind(&dt))),
        Err(kube::Error::Api(error)) if error.code == 404 => Ok(false),
        Err(error) => Err(error),
    }
}
