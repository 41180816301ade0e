use std::sync::OnceLock;

use anyhow::Result;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

const SWEEPS_TOTAL: &str = "seadrift_worker_sweeps_total";
const SWEEP_DURATION_MS: &str = "seadrift_worker_sweep_duration_ms";
const CAPSULES_PROCESSED_TOTAL: &str = "seadrift_worker_capsules_processed_total";
const DELIVERIES_TOTAL: &str = "seadrift_worker_deliveries_total";
const DELIVERY_ERRORS_TOTAL: &str = "seadrift_worker_delivery_errors_total";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub fn init_metrics() -> Result<()> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = METRICS_HANDLE.set(handle);
    Ok(())
}

pub fn register_sweep(component: &'static str, result: &'static str, duration_ms: f64) {
    counter!(
        SWEEPS_TOTAL,
        "component" => component,
        "result" => result
    )
    .increment(1);

    histogram!(
        SWEEP_DURATION_MS,
        "component" => component
    )
    .record(duration_ms);
}

pub fn register_matching_outcome(processed: u64) {
    counter!(CAPSULES_PROCESSED_TOTAL).increment(processed);
}

pub fn register_delivery_outcome(delivered: u64, errors: u64) {
    counter!(DELIVERIES_TOTAL).increment(delivered);
    counter!(DELIVERY_ERRORS_TOTAL).increment(errors);
}
