use hyper::http;
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

#[derive(Clone, Debug, Default)]
pub struct HttpMetrics {
    requests: Family<RequestLabels, Counter>,
    condition_errors: Counter,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct RequestLabels {
    route: &'static str,
    status: String,
}

// === impl HttpMetrics ===

impl HttpMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let requests = Family::<RequestLabels, Counter>::default();
        reg.register(
            "http_requests",
            "Total number of HTTP requests handled",
            requests.clone(),
        );

        let condition_errors = Counter::default();
        reg.register(
            "apps_condition_eval_errors",
            "Total number of condition expressions that failed to evaluate",
            condition_errors.clone(),
        );

        Self {
            requests,
            condition_errors,
        }
    }

    pub(crate) fn request(&self, route: &'static str, status: http::StatusCode) {
        self.requests
            .get_or_create(&RequestLabels {
                route,
                status: status.as_u16().to_string(),
            })
            .inc();
    }

    pub(crate) fn condition_errors(&self, n: usize) {
        if n > 0 {
            self.condition_errors.inc_by(n as u64);
        }
    }

    #[cfg(test)]
    pub(crate) fn requests_total(&self, route: &'static str, status: http::StatusCode) -> u64 {
        self.requests
            .get_or_create(&RequestLabels {
                route,
                status: status.as_u16().to_string(),
            })
            .get()
    }

    #[cfg(test)]
    pub(crate) fn condition_errors_total(&self) -> u64 {
        self.condition_errors.get()
    }
}
