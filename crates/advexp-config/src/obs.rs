//! Structured log events for configuration resolution.
//!
//! All events carry an `event` field (`config.loaded`, `config.resolved`, …)
//! so they can be filtered in JSON log pipelines.

use tracing::{debug, info, warn};

use crate::document::DocumentFormat;
use crate::error::ConfigError;
use crate::overrides::OverrideKind;

/// RAII guard that scopes one resolution under an `advexp.resolve` span.
///
/// ```ignore
/// let _span = ResolveSpan::enter("conf/attack.yaml");
/// // events emitted here carry source = "conf/attack.yaml"
/// ```
pub struct ResolveSpan {
    _span: tracing::span::EnteredSpan,
}

impl ResolveSpan {
    pub fn enter(source: &str) -> Self {
        let span = tracing::info_span!("advexp.resolve", source = %source);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: a document was read and parsed.
pub fn emit_document_loaded(source: &str, format: DocumentFormat, top_level_keys: usize) {
    debug!(
        event = "config.loaded",
        source = %source,
        format = %format,
        top_level_keys = top_level_keys,
    );
}

/// Emit event: one override was applied.
pub fn emit_override_applied(path: &str, kind: OverrideKind) {
    debug!(event = "config.override_applied", path = %path, kind = kind.as_str());
}

/// Emit event: resolution finished.
pub fn emit_config_resolved(dataset: &str, attack: &str, run_dir: &str, fingerprint: &str) {
    info!(
        event = "config.resolved",
        dataset = %dataset,
        attack = %attack,
        run_dir = %run_dir,
        fingerprint = %fingerprint,
    );
}

/// Emit event: `device=cuda` was requested with no GPUs (warn level).
pub fn emit_device_fallback(requested: &str, n_gpu: u32) {
    warn!(
        event = "config.device_fallback",
        requested = %requested,
        n_gpu = n_gpu,
        effective = "cpu",
    );
}

/// Emit event: resolution failed (warn level).
pub fn emit_config_rejected(source: &str, error: &ConfigError) {
    warn!(
        event = "config.rejected",
        source = %source,
        kind = error.kind(),
        field = error.field().unwrap_or("-"),
        error = %error,
    );
}
