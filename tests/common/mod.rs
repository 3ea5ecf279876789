use std::sync::Once;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Installs a test-captured `tracing` subscriber once per test binary.
/// Honors `RUST_LOG` when set, otherwise shows warnings only (write conflicts,
/// cache and publisher failures).
pub fn init_test_env() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
