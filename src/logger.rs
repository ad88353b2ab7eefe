//! `tracing` subscriber setup for the `adjust_network` binary.
//!
//! The library only emits events. Solver progress is logged at INFO, per
//! iteration details at DEBUG.

use tracing::Level;

/// Install a compact fmt subscriber at INFO; `RUST_LOG` takes precedence.
pub fn init_logger() {
    init_logger_with_level(Level::INFO)
}

/// Install the subscriber with `default_level` unless `RUST_LOG` sets one.
///
/// A subscriber that is already installed is kept.
pub fn init_logger_with_level(default_level: Level) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_init_keeps_first_subscriber() {
        init_logger_with_level(Level::DEBUG);
        init_logger();
        tracing::debug!("logger initialized twice");
    }
}
