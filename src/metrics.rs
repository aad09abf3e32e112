use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_histogram, Counter, Encoder, Histogram, TextEncoder,
};

/// Successful broker-acknowledged publishes
pub static PUBLISH_SUCCESS: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "relay_publish_success_total",
        "Total number of envelopes acknowledged by the broker"
    )
    .expect("Failed to register relay_publish_success_total metric")
});

/// Failed publishes (rejection, timeout, ambiguous outcome)
pub static PUBLISH_FAILURE: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "relay_publish_failure_total",
        "Total number of failed publish operations"
    )
    .expect("Failed to register relay_publish_failure_total metric")
});

/// Publish latency, from send to broker acknowledgment
pub static PUBLISH_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "relay_publish_latency_seconds",
        "Publish latency from send to broker acknowledgment, in seconds",
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("Failed to register relay_publish_latency_seconds metric")
});

/// Messages successfully consumed and decoded
pub static CONSUME_SUCCESS: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "relay_consume_success_total",
        "Total number of envelopes consumed from the broker"
    )
    .expect("Failed to register relay_consume_success_total metric")
});

/// Consumer errors (broker failure, undecodable records)
pub static CONSUME_FAILURE: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "relay_consume_failure_total",
        "Total number of consumer errors"
    )
    .expect("Failed to register relay_consume_failure_total metric")
});

/// Envelopes whose signature verified cleanly
pub static VERIFY_VERIFIED: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "relay_verify_verified_total",
        "Total number of consumed envelopes that passed signature verification"
    )
    .expect("Failed to register relay_verify_verified_total metric")
});

/// Envelopes that failed verification (tampered or key unavailable)
pub static VERIFY_REJECTED: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "relay_verify_rejected_total",
        "Total number of consumed envelopes that failed signature verification"
    )
    .expect("Failed to register relay_verify_rejected_total metric")
});

pub fn gather_metrics() -> Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode(&metric_families, &mut buffer)?;

    Ok(String::from_utf8(buffer)?)
}
