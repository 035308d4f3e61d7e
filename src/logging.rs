//! 日志初始化：tracing_subscriber fmt layer + EnvFilter。
//!
//! The library itself only emits `tracing` events; binaries and tests call
//! [`init_logging`] once to print them. The level comes from `RUST_LOG` (for example
//! `relay_chat=debug`), falling back to `info`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Install the global subscriber with the default `info` level.
pub fn init_logging() -> anyhow::Result<()> {
    init_logging_with("info")
}

/// Install the global subscriber, using `default_directives` when `RUST_LOG` is unset or
/// invalid. Fails if a global subscriber is already installed.
pub fn init_logging_with(default_directives: &str) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    Registry::default()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set global subscriber: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails() {
        let _ = init_logging_with("debug");
        assert!(init_logging().is_err());
    }
}
