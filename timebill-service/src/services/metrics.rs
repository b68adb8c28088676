//! Prometheus metrics for timebill-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, CounterVec,
    HistogramVec, IntCounter, TextEncoder,
};

/// Invoice counter by status.
pub static INVOICES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "timebill_invoices_total",
        "Total number of invoices by status",
        &["status"] // processed, sent, paid, void
    )
    .expect("Failed to register invoices_total")
});

/// Monetary amount counter by currency.
pub static INVOICE_AMOUNT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "timebill_invoice_amount_total",
        "Total invoiced amount by currency",
        &["currency"]
    )
    .expect("Failed to register invoice_amount_total")
});

/// Invoices whose bulk mark-billed step touched fewer work items than billed.
pub static PARTIAL_COMMITS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "timebill_partial_commits_total",
        "Invoices committed with fewer work items marked billed than expected"
    )
    .expect("Failed to register partial_commits_total")
});

/// Selections that returned fewer work items than requested.
pub static PARTIAL_SELECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "timebill_partial_selections_total",
        "Invoice requests where some requested work items were not billable"
    )
    .expect("Failed to register partial_selections_total")
});

/// PDF render attempts by outcome.
pub static PDF_RENDERS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "timebill_pdf_renders_total",
        "PDF renders by outcome",
        &["outcome"] // stored, cached, failed
    )
    .expect("Failed to register pdf_renders_total")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "timebill_errors_total",
        "Total number of errors by type",
        &["error_type"]
    )
    .expect("Failed to register errors_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "timebill_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&INVOICES_TOTAL);
    Lazy::force(&INVOICE_AMOUNT_TOTAL);
    Lazy::force(&PARTIAL_COMMITS_TOTAL);
    Lazy::force(&PARTIAL_SELECTIONS_TOTAL);
    Lazy::force(&PDF_RENDERS_TOTAL);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
