//! # Telemetry
//!
//! Console logging is always on. Exporting to OpenTelemetry is opt-in through
//! cargo features.
//!
//! ## Feature matrix
//!
//! - `otel`: Exports spans (request handlers, generations) through
//!   `tracing-opentelemetry`.
//! - `metrics`: Exports counters and histograms for generations and bands.
//! - `stdout`: Uses the OpenTelemetry stdout exporter for whichever of the two
//!   above is enabled.
//!
//! ## Span behavior
//!
//! - Spans created by `#[tracing::instrument]` or `info_span!` are exported
//!   when `otel` is enabled
//! - Events outside of a span are only shown in log output
//!
//! ## Metrics behavior
//!
//! Every recording helper in this module compiles to a no-op without the
//! `metrics` feature, so call sites never need their own `cfg`.
//!
//! ```bash
//! cargo run --bin torus-broker --features otel,metrics,stdout
//! ```

// Disallow using `stdout` without `otel` or `metrics`
#[cfg(all(feature = "stdout", not(any(feature = "otel", feature = "metrics"))))]
compile_error!("The 'stdout' feature requires at least one of 'otel' or 'metrics' to be enabled.");

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Counter, Histogram, Meter, UpDownCounter};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::metrics as sdkmetrics;
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

#[cfg(any(feature = "metrics", feature = "otel"))]
use opentelemetry::{InstrumentationScope, KeyValue};
#[cfg(any(feature = "metrics", feature = "otel"))]
use opentelemetry_sdk::Resource;
#[cfg(any(feature = "metrics", feature = "otel"))]
use opentelemetry_semantic_conventions as semvcns;

#[cfg(feature = "otel")]
use opentelemetry::trace::TracerProvider;
#[cfg(feature = "otel")]
use opentelemetry_sdk::propagation::TraceContextPropagator;
#[cfg(feature = "otel")]
use opentelemetry_sdk::trace as sdktrace;

/// Exporter handles that must be flushed before the process exits.
pub struct TelemetryProviders {
    #[cfg(feature = "otel")]
    pub tracer_provider: sdktrace::SdkTracerProvider,
    #[cfg(feature = "metrics")]
    pub meter_provider: sdkmetrics::SdkMeterProvider,
}

impl TelemetryProviders {
    /// Flushes and shuts down the exporters. Failures are printed, not
    /// returned, since the subscriber may already be gone.
    pub fn shutdown(self) {
        #[cfg(feature = "otel")]
        {
            if let Err(err) = self.tracer_provider.force_flush() {
                eprintln!("Error flushing traces: {err:#?}");
            }
            if let Err(err) = self.tracer_provider.shutdown() {
                eprintln!("Error shutting down tracer: {err:#?}");
            }
        }

        #[cfg(feature = "metrics")]
        {
            if let Err(err) = self.meter_provider.force_flush() {
                eprintln!("Error flushing metrics: {err:#?}");
            }
            if let Err(err) = self.meter_provider.shutdown() {
                eprintln!("Error shutting down meter: {err:#?}");
            }
        }
    }
}

/// Installs the global subscriber for a binary named `service_name`.
pub fn init_telemetry(service_name: &'static str) -> anyhow::Result<TelemetryProviders> {
    #[cfg(not(any(feature = "metrics", feature = "otel")))]
    let _ = service_name;

    #[cfg(feature = "otel")]
    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    #[cfg(feature = "otel")]
    let tracer_provider = init_tracer(service_name);

    #[cfg(feature = "metrics")]
    let meter_provider = init_metrics(service_name);

    #[cfg(any(feature = "metrics", feature = "otel"))]
    let scope = InstrumentationScope::builder(service_name)
        .with_version(env!("CARGO_PKG_VERSION"))
        .with_schema_url(semvcns::SCHEMA_URL)
        .build();

    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true)
                .pretty(),
        );

    #[cfg(feature = "otel")]
    let registry = {
        opentelemetry::global::set_tracer_provider(tracer_provider.clone());
        registry.with(
            tracing_opentelemetry::layer()
                .with_tracer(tracer_provider.tracer_with_scope(scope.clone()))
                .with_error_records_to_exceptions(true),
        )
    };

    #[cfg(feature = "metrics")]
    let registry = {
        opentelemetry::global::set_meter_provider(meter_provider.clone());
        let meter = opentelemetry::global::meter_with_scope(scope);
        init_metric_handles(meter);

        registry.with(tracing_opentelemetry::MetricsLayer::new(
            meter_provider.clone(),
        ))
    };

    registry.try_init()?;

    Ok(TelemetryProviders {
        #[cfg(feature = "otel")]
        tracer_provider,
        #[cfg(feature = "metrics")]
        meter_provider,
    })
}

#[cfg(any(feature = "metrics", feature = "otel"))]
fn resource(service_name: &'static str) -> Resource {
    Resource::builder()
        .with_service_name(service_name)
        .with_schema_url(
            [KeyValue::new(
                semvcns::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            )],
            semvcns::SCHEMA_URL,
        )
        .build()
}

#[cfg(feature = "metrics")]
fn init_metrics(service_name: &'static str) -> sdkmetrics::SdkMeterProvider {
    let builder = sdkmetrics::SdkMeterProvider::builder().with_resource(resource(service_name));

    #[cfg(feature = "stdout")]
    let builder = {
        use opentelemetry_stdout::MetricExporter;
        let exporter = MetricExporter::default();
        let reader = opentelemetry_sdk::metrics::PeriodicReader::builder(exporter)
            .with_interval(std::time::Duration::from_secs(5))
            .build();

        builder.with_reader(reader)
    };

    builder.build()
}

#[cfg(feature = "otel")]
fn init_tracer(service_name: &'static str) -> sdktrace::SdkTracerProvider {
    let builder = sdktrace::SdkTracerProvider::builder().with_resource(resource(service_name));

    #[cfg(feature = "stdout")]
    let builder = {
        use opentelemetry_stdout::SpanExporter;
        let batch = sdktrace::BatchSpanProcessor::builder(SpanExporter::default())
            .with_batch_config(
                sdktrace::BatchConfigBuilder::default()
                    .with_scheduled_delay(std::time::Duration::from_secs(5))
                    .with_max_queue_size(2048)
                    .build(),
            )
            .build();
        builder.with_span_processor(batch)
    };

    builder.build()
}

#[cfg(feature = "metrics")]
static GENERATIONS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static GENERATION_DURATION_MS: OnceLock<Histogram<f64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static RUNS_INFLIGHT: OnceLock<UpDownCounter<i64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static BANDS_DISPATCHED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static BAND_ERRORS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static BANDS_COMPUTED: OnceLock<Counter<u64>> = OnceLock::new();

#[cfg(feature = "metrics")]
fn init_metric_handles(meter: Meter) {
    let _ = GENERATIONS.set(
        meter
            .u64_counter("generations")
            .with_description("Generations committed by the broker")
            .build(),
    );

    let _ = GENERATION_DURATION_MS.set(
        meter
            .f64_histogram("generation_duration")
            .with_unit("ms")
            .with_description("Dispatch-to-commit time of one generation")
            .build(),
    );

    let _ = RUNS_INFLIGHT.set(
        meter
            .i64_up_down_counter("runs_inflight")
            .with_description("ComputeTurns runs in progress")
            .build(),
    );

    let _ = BANDS_DISPATCHED.set(
        meter
            .u64_counter("bands_dispatched")
            .with_description("ComputeBand calls sent to workers")
            .build(),
    );

    let _ = BAND_ERRORS.set(
        meter
            .u64_counter("band_errors")
            .with_description("ComputeBand calls that failed or timed out")
            .build(),
    );

    let _ = BANDS_COMPUTED.set(
        meter
            .u64_counter("bands_computed")
            .with_description("Bands computed by this worker")
            .build(),
    );
}

#[cfg(feature = "metrics")]
pub fn increment_generations() {
    if let Some(counter) = GENERATIONS.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_generations() {}

#[cfg(feature = "metrics")]
pub fn record_generation_duration(duration_ms: f64) {
    if let Some(histogram) = GENERATION_DURATION_MS.get() {
        histogram.record(duration_ms, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_generation_duration(_duration_ms: f64) {}

#[cfg(feature = "metrics")]
pub fn increment_runs_inflight() {
    if let Some(counter) = RUNS_INFLIGHT.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_runs_inflight() {}

#[cfg(feature = "metrics")]
pub fn decrement_runs_inflight() {
    if let Some(counter) = RUNS_INFLIGHT.get() {
        counter.add(-1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn decrement_runs_inflight() {}

#[cfg(feature = "metrics")]
pub fn increment_bands_dispatched(count: u64) {
    if let Some(counter) = BANDS_DISPATCHED.get() {
        counter.add(count, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_bands_dispatched(_count: u64) {}

#[cfg(feature = "metrics")]
pub fn increment_band_errors() {
    if let Some(counter) = BAND_ERRORS.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_band_errors() {}

#[cfg(feature = "metrics")]
pub fn increment_bands_computed() {
    if let Some(counter) = BANDS_COMPUTED.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_bands_computed() {}
