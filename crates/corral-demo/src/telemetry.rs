//! # Telemetry
//!
//! Console logging for the demo via `tracing_subscriber`.
//!
//! - The filter defaults to `info` and honors `RUST_LOG`, e.g.
//!   `RUST_LOG=corral=trace,corral_demo=debug` to watch admissions.
//! - Events from the `corral` library show up here because the demo enables
//!   its `tracing` feature.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_telemetry() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true)
                .pretty(),
        )
        .try_init()?;

    Ok(())
}
