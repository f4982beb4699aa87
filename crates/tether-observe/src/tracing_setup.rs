//! Tracing subscriber initialization.
//!
//! Installs a structured `fmt` layer filtered by `RUST_LOG`, with an
//! optional OpenTelemetry bridge. The stdout span exporter is intended for
//! local development; a deployment would swap it for OTLP.

use std::error::Error;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Flushes and shuts down the OTel pipeline when dropped.
///
/// Hold this for the life of the process so buffered spans are exported
/// before exit. Dropping it is a no-op when OTel was not enabled.
#[must_use = "dropping the guard shuts down trace export"]
pub struct TracingGuard {
    provider: Option<SdkTracerProvider>,
}

impl Drop for TracingGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("warning: tracer provider shutdown error: {e}");
            }
        }
    }
}

/// Install the global tracing subscriber and return its shutdown guard.
///
/// The `fmt` layer logs targets and span close timing; `enable_otel`
/// additionally bridges every span to OpenTelemetry via a stdout exporter.
///
/// # Errors
///
/// Returns an error when a global subscriber is already installed.
pub fn init_tracing(enable_otel: bool) -> Result<TracingGuard, Box<dyn Error>> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE);
    let env_filter = EnvFilter::from_default_env();
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    if !enable_otel {
        registry.try_init()?;
        return Ok(TracingGuard { provider: None });
    }

    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
        .build();
    let tracer = provider.tracer("tether");

    opentelemetry::global::set_tracer_provider(provider.clone());
    registry
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .try_init()?;
    Ok(TracingGuard {
        provider: Some(provider),
    })
}
