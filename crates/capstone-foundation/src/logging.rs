//! Structured logging setup for hosts embedding the policy layer.
//!
//! `RUST_LOG` wins when set; otherwise `default_directive` applies.

use tracing_subscriber::EnvFilter;

/// Default filter: policy decisions at `info`, everything else at `warn`.
pub const DEFAULT_DIRECTIVE: &str = "warn,capstone_foundation=info";

fn filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Install a global fmt subscriber.
///
/// Panics if a global subscriber is already set; use [`try_init_tracing`]
/// from tests or libraries.
pub fn init_tracing(default_directive: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(filter(default_directive))
        .init();
}

/// Like [`init_tracing`], returning `false` when a subscriber already exists.
pub fn try_init_tracing(default_directive: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(filter(default_directive))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_refused() {
        try_init_tracing(DEFAULT_DIRECTIVE);
        assert!(!try_init_tracing(DEFAULT_DIRECTIVE));
    }
}
