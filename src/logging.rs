//! Logging setup for the provider process.
//!
//! Lifecycle handlers emit `tracing` events (volume ids and states as
//! structured fields). This module wires up a subscriber for them: output
//! goes to **stderr**, because the host runtime owns the process's stdout,
//! and filtering follows `RUST_LOG` with an `info` default.
//!
//! ```bash
//! # Poll-by-poll convergence detail for this crate only
//! RUST_LOG=rancher_volume_provider=debug terraform apply
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
}

/// Install the default subscriber.
///
/// # Panics
///
/// Panics if a global subscriber has already been set; use
/// [`try_init_logging`] when that can happen.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(stderr_layer())
        .init();
}

/// Install the default subscriber unless one is already set.
///
/// Returns `false` when a subscriber was already installed.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(stderr_layer())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_init_twice_reports_the_second_attempt() {
        // The first call may lose a race with nothing here, but the second
        // must see a subscriber in place either way.
        try_init_logging();
        assert!(!try_init_logging());
    }
}
