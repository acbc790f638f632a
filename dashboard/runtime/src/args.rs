use crate::{
    metrics::HttpMetrics,
    server::{self, Widget},
};
use anyhow::{bail, Context, Result};
use clap::Parser;
use glance_k8s_core::{AppsOptions, Filters};
use glance_k8s_fetch::{KubeFetcher, DEFAULT_PAGE_SIZE};
use prometheus_client::registry::Registry;
use std::{net::SocketAddr, sync::Arc};
use tokio::time::Duration;
use tracing::{info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(
    name = "glance-k8s",
    about = "Serves Kubernetes applications as a dashboard extension"
)]
pub struct Args {
    #[clap(long, default_value = "glance=info,warn", env = "GLANCE_K8S_LOG")]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    #[clap(long, default_value = "0.0.0.0:8080")]
    http_addr: SocketAddr,

    /// Regular expressions matched against `namespace/name` of workloads to hide.
    ///
    /// Deprecated: use `--condition` instead.
    #[clap(
        long = "hide-pattern",
        env = "GLANCE_K8S_HIDE_PATTERNS",
        value_delimiter = ','
    )]
    hide_patterns: Vec<String>,

    /// Expressions that must all evaluate to `true` for an application to be listed.
    #[clap(long = "condition")]
    conditions: Vec<String>,

    #[clap(long, default_value = "10000")]
    request_timeout_ms: u64,

    #[clap(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: u32,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            client,
            admin,
            http_addr,
            hide_patterns,
            conditions,
            request_timeout_ms,
            page_size,
        } = self;

        let options = AppsOptions {
            exclude_patterns: hide_patterns,
            conditions,
        };
        // Fail fast on options that could never be served.
        Filters::compile(&options).context("invalid filter options")?;

        let mut prom = <Registry>::default();
        let http_metrics = HttpMetrics::register(&mut prom);
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        info!(
            patterns = options.exclude_patterns.len(),
            conditions = options.conditions.len(),
            "Filtering applications"
        );

        let fetcher = KubeFetcher::new(runtime.client(), page_size);
        let widget = Widget::new(
            Arc::new(fetcher),
            options,
            Duration::from_millis(request_timeout_ms),
            http_metrics,
        );
        tokio::spawn(
            server::serve(http_addr, widget, runtime.shutdown_handle())
                .instrument(info_span!("widget")),
        );

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}
