//! freeview-epg - builds an XMLTV programme guide from UK schedule APIs.

/// Channel list loading.
mod channels;
/// Application configuration (TOML).
mod config;
/// Atomic output writing.
mod output;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use freeview_epg_core::{RunContext, build_guide};
use tracing::instrument;
use tracing_subscriber::filter::EnvFilter;
#[cfg(not(feature = "otel"))]
use tracing_subscriber::fmt;
#[cfg(feature = "otel")]
use tracing_subscriber::layer::SubscriberExt;
#[cfg(feature = "otel")]
use tracing_subscriber::util::SubscriberInitExt;

use crate::channels::load_channels;
use crate::config::{AppConfig, resolve_config_path};
use crate::output::write_atomic;

/// CLI argument parser.
#[derive(Parser)]
#[command(about, version)]
struct Cli {
    /// Config file (TOML). Defaults to `freeview-epg.toml`; a missing file means defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Channel list (JSON), overriding `guide.channels`.
    #[arg(long)]
    channels: Option<PathBuf>,

    /// XMLTV output file, overriding `guide.output`.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Days of schedule to fetch, starting today.
    #[arg(long)]
    days: Option<u32>,

    /// IANA timezone for day windows and output offsets (e.g. "Europe/London").
    #[arg(long)]
    timezone: Option<String>,

    /// Number of channels fetched at once.
    #[arg(long)]
    concurrency: Option<usize>,
}

impl Cli {
    /// Applies command-line values over the loaded config.
    fn apply_to(self, config: &mut AppConfig) {
        if let Some(channels) = self.channels {
            config.guide.channels = channels;
        }
        if let Some(output) = self.output {
            config.guide.output = output;
        }
        if let Some(days) = self.days {
            config.guide.days = days;
        }
        if let Some(timezone) = self.timezone {
            config.guide.timezone = timezone;
        }
        if let Some(concurrency) = self.concurrency {
            config.guide.concurrency = concurrency;
        }
    }
}

/// Builds the guide and writes it to the configured output.
///
/// # Errors
///
/// Returns an error if the config is invalid, the channel list cannot be
/// loaded, the HTTP client fails to build, or the output cannot be written.
#[instrument(skip_all)]
async fn run(cli: Cli) -> Result<()> {
    let config_path = resolve_config_path(cli.config.as_deref());
    let mut config = AppConfig::load(&config_path)?;
    cli.apply_to(&mut config);
    let tz = config.validate()?;

    let channels = load_channels(&config.guide.channels)?;
    tracing::info!(
        channels = channels.len(),
        days = config.guide.days,
        timezone = %tz,
        "Building guide"
    );

    let http = config.http.build_client()?;
    let ctx = RunContext::new(http, tz).with_days(config.guide.days);
    let document = build_guide(&channels, &ctx, config.guide.concurrency)
        .await
        .context("failed to build XMLTV document")?;

    write_atomic(&config.guide.output, &document)
}

/// Entry point.
///
/// # Errors
///
/// Returns an error if guide generation fails.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    #[cfg(not(feature = "otel"))]
    {
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    #[cfg(feature = "otel")]
    {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr);

        let otel_layer = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .ok()
            .and_then(|_| {
                let exporter = opentelemetry_otlp::SpanExporter::builder()
                    .with_http()
                    .build()
                    .ok()?;

                let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
                    .with_simple_exporter(exporter)
                    .build();

                let tracer = opentelemetry::trace::TracerProvider::tracer(
                    &tracer_provider,
                    env!("CARGO_PKG_NAME"),
                );
                opentelemetry::global::set_tracer_provider(tracer_provider);

                Some(tracing_opentelemetry::layer().with_tracer(tracer))
            });

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(otel_layer)
            .init();
    }

    run(Cli::parse()).await
}
