use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_FILTER: &str = "warn";
const DEFAULT_LOG_FILE: &str = "nono.logs.jsonl";

/// Logging settings resolved from `NONO_*` variables.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LogSettings {
    enabled: bool,
    /// `NONO_LOG_LEVEL`, else `RUST_LOG`, else `warn`.
    filter: String,
    json_path: Option<PathBuf>,
}

impl LogSettings {
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = match lookup("NONO_OBSERVABILITY_ENABLED").as_deref().map(str::trim) {
            Some(v) if ["0", "false", "no", "off"].iter().any(|f| v.eq_ignore_ascii_case(f)) => false,
            _ => true,
        };
        let filter = ["NONO_LOG_LEVEL", "RUST_LOG"]
            .into_iter()
            .filter_map(&lookup)
            .find(|value| EnvFilter::try_new(value).is_ok())
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());
        let json_path = lookup("NONO_JSON_LOG_PATH")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        Self {
            enabled,
            filter,
            json_path,
        }
    }
}

/// Splits a log file path into the directory and file name the appender wants.
fn log_target(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let file = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_LOG_FILE)
        .to_string();
    (dir, file)
}

/// Initialize logging once per process.
///
/// Environment variables:
/// - `NONO_OBSERVABILITY_ENABLED`: set to `0`/`false`/`no`/`off` to disable.
/// - `NONO_LOG_LEVEL`: level/filter (`info`, `nono_stream=debug`, ...); falls back to `RUST_LOG`.
/// - `NONO_JSON_LOG_PATH`: write JSONL there instead of the stderr console, so
///   stdout carries only completion text either way.
pub fn init_observability() {
    INIT.get_or_init(|| {
        let settings = LogSettings::from_lookup(|key| std::env::var(key).ok());
        if !settings.enabled {
            return;
        }
        let filter = EnvFilter::new(&settings.filter);

        match &settings.json_path {
            Some(path) => {
                let (dir, file) = log_target(path);
                let _ = std::fs::create_dir_all(&dir);
                let layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(false)
                    .with_writer(tracing_appender::rolling::never(dir, file));
                let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();
            }
            None => {
                let layer = tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr);
                let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(vars: &[(&str, &str)]) -> LogSettings {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LogSettings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_to_enabled_warn_console() {
        assert_eq!(
            settings(&[]),
            LogSettings {
                enabled: true,
                filter: "warn".into(),
                json_path: None,
            }
        );
    }

    #[test]
    fn level_prefers_nono_variable_then_rust_log() {
        assert_eq!(settings(&[("NONO_LOG_LEVEL", "debug"), ("RUST_LOG", "info")]).filter, "debug");
        assert_eq!(settings(&[("RUST_LOG", "info")]).filter, "info");
    }

    #[test]
    fn disable_flag_and_json_path() {
        let s = settings(&[("NONO_OBSERVABILITY_ENABLED", " Off "), ("NONO_JSON_LOG_PATH", "logs/run.jsonl")]);
        assert!(!s.enabled);
        assert_eq!(log_target(s.json_path.as_deref().expect("path")), (PathBuf::from("logs"), "run.jsonl".to_string()));
        assert_eq!(log_target(Path::new("bare.jsonl")).0, PathBuf::from("."));
    }
}
