use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Port the Prometheus scrape endpoint listens on.
const METRICS_PORT: u16 = 9000;

/// Installs the global metrics recorder and serves it on `[::]:9000/metrics`.
///
/// When `project_ref` is set it is attached as a `project` label to every series.
/// Must be called at most once per process since the recorder is global.
pub fn init_metrics(project_ref: Option<&str>) -> Result<(), BuildError> {
    let mut builder = PrometheusBuilder::new().with_http_listener(SocketAddr::new(
        IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        METRICS_PORT,
    ));

    if let Some(project_ref) = project_ref {
        builder = builder.add_global_label("project", project_ref);
    }

    builder.install()
}
