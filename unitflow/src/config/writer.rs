//! INI serialization: `ConfigFile` → commented config.ini text.

use super::settings::ConfigFile;
use super::size::format_size;

/// Renders a `ConfigFile` as a commented INI string.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[engine]
; Workers per job (default: 3). Providers with rate limits prefer few workers.
max_workers = {}
; Seconds to wait for a started unit's result before using its original text
unit_timeout = {}

[retry]
; Provider attempts per unit before falling back to the original text
max_attempts = {}
; Linear backoff: attempt n waits n * backoff_step_ms
backoff_step_ms = {}

[batch]
; Largest number of units dispatched together
max_batch_size = {}
; Memory pressure halves the batch size down to this floor
min_batch_size = {}

[memory]
; Sample process memory before each batch
enabled = {}
; Resident memory above this counts as pressure. Supports KB, MB, GB suffixes
threshold = {}
; Pause after reclaiming under pressure
pause_ms = {}

[source]
; Plain text at least this many bytes long is split on paragraph boundaries
chunk_size = {}
"#,
        config.engine.max_workers,
        config.engine.unit_timeout_secs,
        config.retry.max_attempts,
        config.retry.backoff_step_ms,
        config.batch.max_batch_size,
        config.batch.min_batch_size,
        config.memory.enabled,
        format_size(config.memory.threshold_bytes),
        config.memory.pause_ms,
        config.source.chunk_size,
    )
}
