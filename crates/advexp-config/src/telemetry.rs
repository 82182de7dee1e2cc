//! Process-wide log output for the `advexp` binary.
//!
//! Library code only emits events (see `obs`); installing a subscriber is
//! left to the binary, which calls [`init_tracing`] once from `main`.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Install the global subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence over `level` when set. stdout is reserved
/// for resolved configs and fingerprints. A second call is a no-op.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let output = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let output = if json {
        output.json().with_current_span(true).boxed()
    } else {
        output.compact().boxed()
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .try_init();
}
