use crate::{metrics::HttpMetrics, view::AppView};
use anyhow::Result;
use futures::future;
use glance_k8s_core::{list_apps, AppsOptions, Error, Fetch};
use hyper::{http, server::conn::http1, Request, Response};
use hyper_util::{rt::TokioIo, service::TowerToHyperService};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing::{debug, info, info_span, instrument, trace, warn, Instrument};

pub const WIDGET_TITLE: &str = "Kubernetes Apps";

type Body = http_body_util::Full<bytes::Bytes>;

/// Serves the health check and the applications extension endpoint.
#[derive(Clone)]
pub struct Widget {
    fetch: Arc<dyn Fetch>,
    options: Arc<AppsOptions>,
    timeout: Duration,
    metrics: HttpMetrics,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Route {
    Healthz,
    Apps,
    Unknown,
}

/// Accepts connections on `addr` until `drain` is signaled.
#[instrument(skip_all, fields(port = %addr.port()))]
pub async fn serve(addr: SocketAddr, widget: Widget, drain: drain::Watch) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Widget server listening");

    let signaled = drain.clone().signaled();
    tokio::pin!(signaled);
    loop {
        let (io, peer) = tokio::select! {
            res = listener.accept() => match res {
                Ok(conn) => conn,
                Err(error) => {
                    warn!(%error, "Failed to accept connection");
                    continue;
                }
            },
            release = &mut signaled => {
                debug!("Shutting down");
                drop(release);
                return Ok(());
            }
        };

        let svc = TowerToHyperService::new(widget.clone());
        let drain = drain.clone();
        tokio::spawn(
            async move {
                let conn = http1::Builder::new().serve_connection(TokioIo::new(io), svc);
                tokio::pin!(conn);
                let res = tokio::select! {
                    res = conn.as_mut() => res,
                    release = drain.signaled() => {
                        conn.as_mut().graceful_shutdown();
                        release.release_after(conn).await
                    }
                };
                if let Err(error) = res {
                    debug!(%error, "Connection failed");
                }
            }
            .instrument(info_span!("conn", %peer)),
        );
    }
}

// === impl Widget ===

impl Widget {
    pub fn new(
        fetch: Arc<dyn Fetch>,
        options: AppsOptions,
        timeout: Duration,
        metrics: HttpMetrics,
    ) -> Self {
        Self {
            fetch,
            options: Arc::new(options),
            timeout,
            metrics,
        }
    }

    #[instrument(skip(self))]
    async fn apps(&self) -> Response<Body> {
        let apps = match tokio::time::timeout(
            self.timeout,
            list_apps(&*self.fetch, &self.options),
        )
        .await
        {
            Ok(Ok(apps)) => apps,
            Ok(Err(error)) => {
                warn!(%error, "Failed to list apps");
                let status = match error {
                    Error::Filter(_) => http::StatusCode::BAD_REQUEST,
                    Error::Fetch { .. } => http::StatusCode::BAD_GATEWAY,
                };
                return text_response(status, error.to_string());
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "Timed out listing apps");
                return text_response(
                    http::StatusCode::GATEWAY_TIMEOUT,
                    "timed out listing apps".to_string(),
                );
            }
        };

        self.metrics.condition_errors(apps.diagnostics.len());
        let views = apps.items.iter().map(AppView::from).collect::<Vec<_>>();
        debug!(apps = views.len(), "Listed apps");
        match serde_json::to_vec(&views) {
            Ok(json) => Response::builder()
                .status(http::StatusCode::OK)
                .header(http::header::CONTENT_TYPE, "application/json")
                .header("Widget-Title", WIDGET_TITLE)
                .header("Widget-Content-Type", "json")
                .header("Widget-Content-Frameless", "false")
                .body(Body::from(json))
                .expect("apps response must be valid"),
            Err(error) => {
                warn!(%error, "Failed to encode apps");
                text_response(
                    http::StatusCode::INTERNAL_SERVER_ERROR,
                    "failed to encode apps".to_string(),
                )
            }
        }
    }
}

impl<B> tower::Service<Request<B>> for Widget {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = future::BoxFuture<'static, Result<Response<Body>, Infallible>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        trace!(method = %req.method(), uri = %req.uri());
        let route = Route::of(req.uri().path());
        let is_get = req.method() == http::Method::GET;

        let widget = self.clone();
        Box::pin(async move {
            let rsp = match route {
                Route::Unknown => text_response(http::StatusCode::NOT_FOUND, String::new()),
                _ if !is_get => Response::builder()
                    .status(http::StatusCode::METHOD_NOT_ALLOWED)
                    .header(http::header::ALLOW, "GET")
                    .body(Body::default())
                    .expect("method not allowed response must be valid"),
                Route::Healthz => text_response(http::StatusCode::OK, "ok".to_string()),
                Route::Apps => widget.apps().await,
            };
            widget.metrics.request(route.as_str(), rsp.status());
            Ok(rsp)
        })
    }
}

// === impl Route ===

impl Route {
    fn of(path: &str) -> Self {
        match path {
            "/healthz" => Self::Healthz,
            "/extension/apps" => Self::Apps,
            _ => Self::Unknown,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Healthz => "healthz",
            Self::Apps => "apps",
            Self::Unknown => "unknown",
        }
    }
}

fn text_response(status: http::StatusCode, body: String) -> Response<Body> {
    Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from(body))
        .expect("text response must be valid")
}
