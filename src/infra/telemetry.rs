use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "quire_cache_hit_total",
            Unit::Count,
            "Total number of response-cache hits."
        );
        describe_counter!(
            "quire_cache_miss_total",
            Unit::Count,
            "Total number of response-cache misses, including reads that failed."
        );
        describe_counter!(
            "quire_cache_store_error_total",
            Unit::Count,
            "Cache store operations that failed, labelled by operation."
        );
        describe_counter!(
            "quire_cache_invalidated_total",
            Unit::Count,
            "Cache entries removed by invalidation, labelled by exact or prefix mode."
        );
        describe_counter!(
            "quire_auth_rejected_total",
            Unit::Count,
            "Presented session tokens that were rejected, labelled by reason."
        );
        describe_counter!(
            "quire_login_lockout_total",
            Unit::Count,
            "Login attempts refused by the failed-login lockout."
        );
    });
}
