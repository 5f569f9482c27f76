// Copyright (c) 2025 - Cowboy AI, Inc.
//! Tracing setup for processes embedding the provisioner

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber filtered by `RUST_LOG` plus `default_level`
///
/// Returns `false` when a global subscriber is already installed.
pub fn init_tracing(default_level: Level) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(default_level.into()))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_harmless() {
        init_tracing(Level::DEBUG);
        assert!(!init_tracing(Level::INFO));
    }
}
