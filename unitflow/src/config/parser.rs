//! INI parsing: `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names map to struct fields.

use ini::{Ini, Properties};
use std::str::FromStr;

use super::defaults::clamp_max_workers;
use super::file::ConfigFileError;
use super::settings::ConfigFile;
use super::size::parse_size;

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Parses `key` from `section` if present.
fn parse_key<T: FromStr>(
    props: &Properties,
    section: &str,
    key: &str,
    reason: &str,
) -> Result<Option<T>, ConfigFileError> {
    match props.get(key) {
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(section, key, v, reason)),
        None => Ok(None),
    }
}

/// Like [`parse_key`] but rejects zero.
fn parse_positive<T: FromStr + Default + PartialEq>(
    props: &Properties,
    section: &str,
    key: &str,
    reason: &str,
) -> Result<Option<T>, ConfigFileError> {
    let value: Option<T> = parse_key(props, section, key, reason)?;
    if value.as_ref().is_some_and(|v| *v == T::default()) {
        let raw = props.get(key).unwrap_or_default();
        return Err(invalid(section, key, raw, reason));
    }
    Ok(value)
}

fn parse_bool(props: &Properties, section: &str, key: &str) -> Result<Option<bool>, ConfigFileError> {
    let Some(v) = props.get(key) else {
        return Ok(None);
    };
    match v.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(Some(true)),
        "false" | "no" | "off" | "0" => Ok(Some(false)),
        _ => Err(invalid(section, key, v, "must be true or false")),
    }
}

/// Parses an `Ini` into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [engine] section
    if let Some(section) = ini.section(Some("engine")) {
        if let Some(v) = parse_key::<usize>(section, "engine", "max_workers", "must be a positive integer")? {
            config.engine.max_workers = clamp_max_workers(v);
        }
        if let Some(v) = parse_positive(
            section,
            "engine",
            "unit_timeout",
            "must be a positive integer (seconds)",
        )? {
            config.engine.unit_timeout_secs = v;
        }
    }

    // [retry] section
    if let Some(section) = ini.section(Some("retry")) {
        if let Some(v) = parse_positive(section, "retry", "max_attempts", "must be a positive integer")? {
            config.retry.max_attempts = v;
        }
        if let Some(v) = parse_key(
            section,
            "retry",
            "backoff_step_ms",
            "must be a non-negative integer (milliseconds)",
        )? {
            config.retry.backoff_step_ms = v;
        }
    }

    // [batch] section
    if let Some(section) = ini.section(Some("batch")) {
        if let Some(v) = parse_positive(section, "batch", "max_batch_size", "must be a positive integer")? {
            config.batch.max_batch_size = v;
        }
        if let Some(v) = parse_positive(section, "batch", "min_batch_size", "must be a positive integer")? {
            config.batch.min_batch_size = v;
        }
        if config.batch.min_batch_size > config.batch.max_batch_size {
            return Err(invalid(
                "batch",
                "min_batch_size",
                &config.batch.min_batch_size.to_string(),
                "must not exceed max_batch_size",
            ));
        }
    }

    // [memory] section
    if let Some(section) = ini.section(Some("memory")) {
        if let Some(v) = parse_bool(section, "memory", "enabled")? {
            config.memory.enabled = v;
        }
        if let Some(v) = section.get("threshold") {
            config.memory.threshold_bytes = parse_size(v).map_err(|_| {
                invalid(
                    "memory",
                    "threshold",
                    v,
                    "expected format like '1536MB', '2GB', or '512KB'",
                )
            })?;
        }
        if let Some(v) = parse_key(
            section,
            "memory",
            "pause_ms",
            "must be a non-negative integer (milliseconds)",
        )? {
            config.memory.pause_ms = v;
        }
    }

    // [source] section
    if let Some(section) = ini.section(Some("source")) {
        if let Some(v) = parse_positive(section, "source", "chunk_size", "must be a positive integer (bytes)")? {
            config.source.chunk_size = v;
        }
    }

    Ok(config)
}
