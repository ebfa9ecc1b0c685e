//! Prometheus metrics for the record core
//!
//! Collectors register with the default registry on first use. An embedding server exposes
//! them through [`gather_text`].

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter_vec, Encoder, Histogram, IntCounterVec, TextEncoder,
};

lazy_static! {
    /// Version ledger writes by resource type, action and outcome
    pub static ref VERSION_WRITES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "vellum_version_writes_total",
        "Total number of version ledger writes",
        &["resource_type", "action", "status"]
    )
    .expect("Failed to register VERSION_WRITES_TOTAL");

    /// Optimistic-concurrency rejections
    pub static ref VERSION_CONFLICTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "vellum_version_conflicts_total",
        "Total number of rejected writes due to a stale expected version",
        &["resource_type"]
    )
    .expect("Failed to register VERSION_CONFLICTS_TOTAL");

    /// Patch documents applied by format and outcome
    pub static ref PATCH_APPLICATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "vellum_patch_applications_total",
        "Total number of patch documents applied",
        &["format", "status"]
    )
    .expect("Failed to register PATCH_APPLICATIONS_TOTAL");

    /// Candidates returned per match lookup
    pub static ref MATCH_CANDIDATES: Histogram = register_histogram!(
        "vellum_match_candidates",
        "Number of match candidates returned per lookup",
        vec![0.0, 1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0]
    )
    .expect("Failed to register MATCH_CANDIDATES");

    /// Identity link operations
    pub static ref LINKS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "vellum_links_total",
        "Total number of patient link operations",
        &["operation"]
    )
    .expect("Failed to register LINKS_TOTAL");
}

/// Status label for an operation outcome
pub fn status_label<T, E>(result: &Result<T, E>) -> &'static str {
    if result.is_ok() {
        "success"
    } else {
        "error"
    }
}

/// Render every registered metric in the Prometheus text exposition format
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
