// illustrator-relay/src/log/mod.rs
//
// Copyright (c) 2025 Arcella Team
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE>
// or the MIT license <LICENSE-MIT>, at your option.
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;

use serde::{Deserialize, Deserializer};
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt,
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    Layer,
};

use crate::config::RelayConfig;
use crate::error::{RelayError, Result as RelayResult};

/// Recent log lines, shown by the panel's `logs` command.
// TODO: use lock-free buffer for high-throughput scenarios
static LOG_BUFFER: std::sync::OnceLock<Arc<Mutex<VecDeque<String>>>> = std::sync::OnceLock::new();

fn get_log_buffer() -> Option<&'static Arc<Mutex<VecDeque<String>>>> {
    LOG_BUFFER.get()
}

/// Loads `tracing.cfg` and initializes the global tracing subscriber.
pub fn init(config: &RelayConfig) -> RelayResult<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let tracing_cfg = load_tracing_config(&config.config_dir.join("tracing.cfg"))?;

    let mut file_guard: Option<tracing_appender::non_blocking::WorkerGuard> = None;

    if tracing_cfg.buffer_size > 0 {
        let buffer = Arc::new(Mutex::new(VecDeque::with_capacity(tracing_cfg.buffer_size)));
        LOG_BUFFER.set(buffer).map_err(|_| RelayError::Internal("LOG_BUFFER already set".into()))?;
    }

    let mut directives = vec![format!("illustrator_relay={}", tracing_cfg.default_level)];
    for (target, level) in &tracing_cfg.modules {
        directives.push(format!("{}={}", target, level));
    }

    let env_filter = EnvFilter::try_new(directives.join(","))
        .map_err(|e| RelayError::Config(format!("invalid log filter: {}", e)))?;

    let mut layers = Vec::new();

    if tracing_cfg.file {
        fs::create_dir_all(&config.log_dir)
            .map_err(|e| RelayError::io_with_path(config.log_dir.clone(), e))?;

        let file_appender = tracing_appender::rolling::never(&config.log_dir, "relay.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = if tracing_cfg.structured {
            fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_ansi(false)
                .boxed()
        } else {
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .boxed()
        };
        layers.push(file_layer);
        file_guard = Some(guard);
    }

    if tracing_cfg.stderr {
        let console_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .boxed();
        layers.push(console_layer);
    }

    if tracing_cfg.buffer_size > 0 {
        layers.push(RecentLogLayer::new(tracing_cfg.buffer_size).boxed());
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .map_err(|e| RelayError::Internal(format!("failed to init tracing: {}", e)))?;

    Ok(file_guard)
}

fn load_tracing_config(path: &Path) -> RelayResult<TracingConfig> {
    if !path.exists() {
        return Ok(TracingConfig::default());
    }

    let contents = fs::read_to_string(path)
        .map_err(|e| RelayError::io_with_path(path.to_path_buf(), e))?;
    toml::from_str(&contents)
        .map_err(|e| RelayError::Config(format!("tracing.cfg: {}", e)))
}

/// Helper: deserialize LevelFilter from string (e.g., "info", "debug")
fn deserialize_level_filter<'de, D>(deserializer: D) -> Result<LevelFilter, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse::<LevelFilter>().map_err(serde::de::Error::custom)
}

fn deserialize_module_levels<'de, D>(deserializer: D) -> Result<HashMap<String, LevelFilter>, D::Error>
where
    D: Deserializer<'de>,
{
    let map: HashMap<String, String> = Deserialize::deserialize(deserializer)?;
    let mut result = HashMap::new();
    for (target, level_str) in map {
        let level = level_str
            .parse::<LevelFilter>()
            .map_err(serde::de::Error::custom)?;
        result.insert(target, level);
    }
    Ok(result)
}

#[derive(Deserialize, Debug, Clone)]
pub struct TracingConfig {
    #[serde(default = "default_log_level", deserialize_with = "deserialize_level_filter")]
    pub default_level: LevelFilter,

    #[serde(default = "default_structured")]
    pub structured: bool,

    #[serde(default = "default_stderr")]
    pub stderr: bool,

    #[serde(default = "default_file")]
    pub file: bool,

    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    #[serde(default, deserialize_with = "deserialize_module_levels")]
    pub modules: HashMap<String, LevelFilter>,
}

fn default_log_level() -> LevelFilter { LevelFilter::INFO }
fn default_structured() -> bool { false }
fn default_stderr() -> bool { true }
fn default_file() -> bool { true }
fn default_buffer_size() -> usize { 100 }

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: default_log_level(),
            structured: default_structured(),
            stderr: default_stderr(),
            file: default_file(),
            buffer_size: default_buffer_size(),
            modules: HashMap::new(),
        }
    }
}

struct RecentLogLayer {
    max_size: usize,
}

impl RecentLogLayer {
    fn new(max_size: usize) -> Self {
        Self { max_size }
    }
}

impl<S> Layer<S> for RecentLogLayer
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let Some(buffer) = get_log_buffer() else {
            return;
        };

        let meta = event.metadata();
        let now = OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "<invalid-timestamp>".to_string());

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let line = format_line(&now, meta.level(), meta.target(), visitor);

        if let Ok(mut buf) = buffer.lock() {
            if buf.len() >= self.max_size {
                buf.pop_front();
            }
            buf.push_back(line);
        }
    }
}

fn format_line(timestamp: &str, level: &tracing::Level, target: &str, visitor: EventVisitor) -> String {
    let message = if visitor.message.is_empty() {
        "no message".to_string()
    } else {
        visitor.message
    };

    let fields = if visitor.fields.is_empty() {
        String::new()
    } else {
        format!(" {{{}}}", visitor.fields.join(", "))
    };

    format!("{} {} {}: {}{}", timestamp, level, target, message, fields)
}

/// Most recent `n` buffered log lines, newest first.
pub fn get_recent_logs(n: usize) -> Vec<String> {
    match get_log_buffer().and_then(|buffer| buffer.lock().ok()) {
        Some(buf) => buf.iter().rev().take(n).cloned().collect(),
        None => vec![],
    }
}

#[derive(Default)]
struct EventVisitor {
    message: String,
    fields: Vec<String>,
}

impl tracing::field::Visit for EventVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_tracing_cfg_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let cfg = load_tracing_config(&temp_dir.path().join("tracing.cfg")).unwrap();
        assert_eq!(cfg.default_level, LevelFilter::INFO);
        assert!(cfg.stderr);
        assert_eq!(cfg.buffer_size, 100);
    }

    #[test]
    fn test_tracing_cfg_module_levels() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tracing.cfg");
        std::fs::write(
            &path,
            "default_level = \"debug\"\nfile = false\n[modules]\n\"illustrator_relay::connection\" = \"trace\"\n",
        )
        .unwrap();

        let cfg = load_tracing_config(&path).unwrap();
        assert_eq!(cfg.default_level, LevelFilter::DEBUG);
        assert!(!cfg.file);
        assert_eq!(
            cfg.modules.get("illustrator_relay::connection"),
            Some(&LevelFilter::TRACE)
        );
    }

    #[test]
    fn test_bad_level_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tracing.cfg");
        std::fs::write(&path, "default_level = \"loud\"\n").unwrap();

        assert!(matches!(load_tracing_config(&path), Err(RelayError::Config(_))));
    }

    #[test]
    fn test_format_line_with_fields() {
        let visitor = EventVisitor {
            message: "Received command packet".to_string(),
            fields: vec!["action=createShape".to_string()],
        };
        let line = format_line("2025-01-01T00:00:00Z", &tracing::Level::INFO, "relay", visitor);
        assert_eq!(
            line,
            "2025-01-01T00:00:00Z INFO relay: Received command packet {action=createShape}"
        );
    }
}
