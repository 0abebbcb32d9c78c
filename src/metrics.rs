//! Store metrics and tracing spans.
//!
//! With the `metrics` feature, [`METRICS`] records query counts, errors and
//! durations, connection waits and entity hydration through OpenTelemetry and
//! exposes them in Prometheus text format via [`LifelineMetrics::gather_text`].
//! With the `tracing` feature, [`tracing_helpers`] provides the spans wrapped
//! around executor calls and connection establishment.

#[cfg(feature = "metrics")]
pub use self::otel::{LifelineMetrics, METRICS};

#[cfg(feature = "metrics")]
mod otel {
    use once_cell::sync::Lazy;
    use opentelemetry::{
        global,
        metrics::{Counter, Histogram, MeterProvider},
    };
    use opentelemetry_sdk::metrics::SdkMeterProvider;
    use prometheus::{Encoder, Registry, TextEncoder};
    use std::time::Duration;

    pub static METRICS: Lazy<LifelineMetrics> = Lazy::new(LifelineMetrics::init);

    pub struct LifelineMetrics {
        registry: Registry,
        // Keeps the Prometheus reader alive for the lifetime of the process.
        _provider: Option<SdkMeterProvider>,
        pub queries_total: Counter<u64>,
        pub query_errors_total: Counter<u64>,
        pub query_duration: Histogram<f64>,
        pub connection_wait_duration: Histogram<f64>,
        pub entities_hydrated_total: Counter<u64>,
    }

    impl LifelineMetrics {
        pub fn init() -> Self {
            let registry = Registry::new();
            let provider = match opentelemetry_prometheus::exporter()
                .with_registry(registry.clone())
                .build()
            {
                Ok(exporter) => Some(SdkMeterProvider::builder().with_reader(exporter).build()),
                Err(err) => {
                    log::warn!("failed to build prometheus exporter, metrics are not exported: {err}");
                    None
                }
            };
            let meter = match &provider {
                Some(provider) => provider.meter("lifeline"),
                None => global::meter("lifeline"),
            };

            let queries_total = meter
                .u64_counter("lifeline_queries_total")
                .with_description("Total queries executed")
                .build();

            let query_errors_total = meter
                .u64_counter("lifeline_query_errors_total")
                .with_description("Queries that failed in the store")
                .build();

            let query_duration = meter
                .f64_histogram("lifeline_query_duration_seconds")
                .with_description("Duration of queries")
                .build();

            let connection_wait_duration = meter
                .f64_histogram("lifeline_connection_wait_seconds")
                .with_description("Time spent establishing connections")
                .build();

            let entities_hydrated_total = meter
                .u64_counter("lifeline_entities_hydrated_total")
                .with_description("Entities built from fetched rows")
                .build();

            Self {
                registry,
                _provider: provider,
                queries_total,
                query_errors_total,
                query_duration,
                connection_wait_duration,
                entities_hydrated_total,
            }
        }

        pub fn record_query_duration(&self, elapsed: Duration) {
            self.queries_total.add(1, &[]);
            self.query_duration.record(elapsed.as_secs_f64(), &[]);
        }

        pub fn record_query_error(&self) {
            self.query_errors_total.add(1, &[]);
        }

        pub fn record_connection_wait(&self, elapsed: Duration) {
            self.connection_wait_duration.record(elapsed.as_secs_f64(), &[]);
        }

        pub fn record_hydration(&self) {
            self.entities_hydrated_total.add(1, &[]);
        }

        /// Current metric values in Prometheus text exposition format.
        pub fn gather_text(&self) -> String {
            let mut buffer = Vec::new();
            if let Err(err) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
                log::warn!("failed to encode metrics: {err}");
            }
            String::from_utf8(buffer).unwrap_or_default()
        }
    }
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::{info_span, Span};

    /// Span around one statement sent to the database.
    pub fn execute_query_span(sql: &str) -> Span {
        info_span!("lifeline.execute_query", db.statement = %sql)
    }

    /// Span around establishing a database connection.
    pub fn acquire_connection_span() -> Span {
        info_span!("lifeline.acquire_connection")
    }
}
