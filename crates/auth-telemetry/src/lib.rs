use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::subscriber::set_global_default;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

pub mod anomalies;

pub use anomalies::detector::AnomalyDetector;

/// Wires up structured logging, the Prometheus metrics recorder and
/// (optionally) an OpenTelemetry tracing layer.
///
/// `otel_enabled` mirrors `auth_config::LoggingConfig::otel_enabled`; the
/// Non-goals exclude a metrics/discovery UI, not observability plumbing, so
/// the layer is carried disabled-by-default rather than dropped.
pub fn init_telemetry(otel_enabled: bool) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "auth_platform=debug,auth_api=debug,tower_http=debug".into());

    let registry = Registry::default()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json());

    if otel_enabled {
        let otel_layer = tracing_opentelemetry::layer();
        set_global_default(registry.with(otel_layer)).map_err(|e| anyhow::anyhow!(e))?;
    } else {
        set_global_default(registry).map_err(|e| anyhow::anyhow!(e))?;
    }

    // Installs the Prometheus recorder globally; `metrics::counter!`/`histogram!`
    // calls anywhere in the workspace are scraped from this process from here on.
    let builder = PrometheusBuilder::new();
    builder.install().map_err(|e| anyhow::anyhow!(e))?;

    Ok(())
}
