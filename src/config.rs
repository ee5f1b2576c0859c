use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use log::warn;

use crate::feedback::ActualPolicy;

const CACHE_DIR: &str = "sp_predictor";
const FEEDBACK_DB_FILE: &str = "feedback.sqlite";
const DEFAULT_SINK_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct Settings {
    pub model_version: Option<String>,
    pub registry_path: Option<PathBuf>,
    pub feedback_db: Option<PathBuf>,
    pub sink_url: Option<String>,
    pub sink_token: Option<String>,
    pub sink_timeout: Duration,
    pub actual_policy: ActualPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_version: None,
            registry_path: None,
            feedback_db: default_feedback_db(),
            sink_url: None,
            sink_token: None,
            sink_timeout: Duration::from_secs(DEFAULT_SINK_TIMEOUT_SECS),
            actual_policy: ActualPolicy::default(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let actual_policy = match non_empty_var("SP_ACTUAL_POLICY") {
            Some(raw) => ActualPolicy::from_str(&raw).unwrap_or_else(|err| {
                warn!("{err}; using {}", defaults.actual_policy);
                defaults.actual_policy
            }),
            None => defaults.actual_policy,
        };
        let sink_timeout =
            parse_timeout(non_empty_var("SP_SINK_TIMEOUT_SECS"), defaults.sink_timeout);

        Self {
            model_version: non_empty_var("SP_MODEL_VERSION"),
            registry_path: non_empty_var("SP_REGISTRY_PATH").map(PathBuf::from),
            feedback_db: non_empty_var("SP_FEEDBACK_DB")
                .map(PathBuf::from)
                .or(defaults.feedback_db),
            sink_url: non_empty_var("SP_SINK_URL"),
            sink_token: non_empty_var("SP_SINK_TOKEN"),
            sink_timeout,
            actual_policy,
        }
    }
}

/// `$XDG_CACHE_HOME/sp_predictor`, falling back to `~/.cache/sp_predictor`.
pub fn app_cache_dir() -> Option<PathBuf> {
    if let Some(base) = non_empty_var("XDG_CACHE_HOME") {
        return Some(PathBuf::from(base).join(CACHE_DIR));
    }
    let home = non_empty_var("HOME")?;
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

fn default_feedback_db() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(FEEDBACK_DB_FILE))
}

/// Whole seconds, at least one. Unparsable values fall back to `default`.
fn parse_timeout(raw: Option<String>, default: Duration) -> Duration {
    let Some(raw) = raw else {
        return default;
    };
    match raw.parse::<u64>() {
        Ok(secs) => Duration::from_secs(secs.max(1)),
        Err(err) => {
            warn!(
                "invalid SP_SINK_TIMEOUT_SECS '{raw}' ({err}); using {}s",
                default.as_secs()
            );
            default
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT: Duration = Duration::from_secs(DEFAULT_SINK_TIMEOUT_SECS);

    #[test]
    fn timeout_parses_whole_seconds() {
        assert_eq!(parse_timeout(Some("3".into()), DEFAULT), Duration::from_secs(3));
        assert_eq!(parse_timeout(Some("0".into()), DEFAULT), Duration::from_secs(1));
        assert_eq!(parse_timeout(None, DEFAULT), DEFAULT);
    }

    #[test]
    fn unparsable_timeout_falls_back_to_default() {
        assert_eq!(parse_timeout(Some("ten".into()), DEFAULT), DEFAULT);
        assert_eq!(parse_timeout(Some("-4".into()), DEFAULT), DEFAULT);
    }
}
