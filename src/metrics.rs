use anyhow::Context;
use metrics::gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the process-wide Prometheus recorder and publish the item TTL as a
    /// static gauge. Fails if a recorder is already installed.
    pub fn init(item_ttl_secs: u64) -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;

        crate::store::ensure_metrics_described();
        gauge!("hn_store_item_ttl_secs").set(item_ttl_secs as f64);

        Ok(Self { handle })
    }
}
