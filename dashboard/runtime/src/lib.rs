#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod args;
mod metrics;
mod server;
mod view;

pub use self::{
    args::Args,
    metrics::HttpMetrics,
    server::{serve, Widget, WIDGET_TITLE},
    view::{icon_url, AppView, WorkloadView},
};
