use std::{collections::HashMap, fs, path::Path, time::Duration};

use client_core::RestorePolicy;

pub const DEFAULT_CONFIG_FILE: &str = "inbox_zero.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base: String,
    pub google_client_id: Option<String>,
    pub oauth_redirect_uri: String,
    pub database_url: String,
    pub request_timeout_secs: u64,
    pub restore_policy: RestorePolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8000".into(),
            google_client_id: None,
            oauth_redirect_uri: "postmessage".into(),
            database_url: storage::default_database_url(),
            request_timeout_secs: 60,
            restore_policy: RestorePolicy::Trust,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

pub fn load_settings(config_path: &Path) -> Settings {
    let file_contents = fs::read_to_string(config_path).ok();
    settings_from_sources(file_contents.as_deref(), |name| std::env::var(name).ok())
}

/// Defaults, then the flat TOML file, then environment variables. Later
/// sources win; unparsable values are ignored with a warning.
pub fn settings_from_sources(
    file_contents: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();
    let mut restore_kind: Option<String> = None;
    let mut restore_max_age: Option<String> = None;

    if let Some(raw) = file_contents {
        match toml::from_str::<HashMap<String, toml::Value>>(raw) {
            Ok(file_cfg) => {
                let get = |key: &str| file_cfg.get(key).map(toml_value_to_string);
                if let Some(v) = get("api_base") {
                    settings.api_base = v;
                }
                if let Some(v) = get("google_client_id") {
                    settings.google_client_id = Some(v);
                }
                if let Some(v) = get("oauth_redirect_uri") {
                    settings.oauth_redirect_uri = v;
                }
                if let Some(v) = get("database_url") {
                    settings.database_url = v;
                }
                if let Some(v) = get("request_timeout_secs") {
                    apply_timeout(&mut settings, &v);
                }
                restore_kind = get("restore_policy").or(restore_kind);
                restore_max_age = get("restore_max_age_secs").or(restore_max_age);
            }
            Err(err) => tracing::warn!("ignoring unreadable config file: {err}"),
        }
    }

    for name in ["VITE_API_URL", "API_BASE", "APP__API_BASE"] {
        if let Some(v) = non_empty(env(name)) {
            settings.api_base = v;
        }
    }

    for name in ["GOOGLE_CLIENT_ID", "APP__GOOGLE_CLIENT_ID"] {
        if let Some(v) = non_empty(env(name)) {
            settings.google_client_id = Some(v);
        }
    }

    if let Some(v) = non_empty(env("APP__OAUTH_REDIRECT_URI")) {
        settings.oauth_redirect_uri = v;
    }

    for name in ["DATABASE_URL", "APP__DATABASE_URL"] {
        if let Some(v) = non_empty(env(name)) {
            settings.database_url = v;
        }
    }

    if let Some(v) = non_empty(env("APP__REQUEST_TIMEOUT_SECS")) {
        apply_timeout(&mut settings, &v);
    }

    if let Some(v) = non_empty(env("APP__RESTORE_POLICY")) {
        restore_kind = Some(v);
    }
    if let Some(v) = non_empty(env("APP__RESTORE_MAX_AGE_SECS")) {
        restore_max_age = Some(v);
    }

    if let Some(kind) = restore_kind {
        match parse_restore_policy(&kind, restore_max_age.as_deref()) {
            Ok(policy) => settings.restore_policy = policy,
            Err(err) => tracing::warn!("ignoring restore policy '{kind}': {err}"),
        }
    }

    settings
}

pub fn parse_restore_policy(kind: &str, max_age_secs: Option<&str>) -> Result<RestorePolicy, String> {
    match kind.trim().to_ascii_lowercase().as_str() {
        "trust" => Ok(RestorePolicy::Trust),
        "never" => Ok(RestorePolicy::Never),
        "max_age" | "max-age" => {
            let raw = max_age_secs.ok_or("max_age requires restore_max_age_secs")?;
            let secs = raw
                .trim()
                .parse::<u64>()
                .map_err(|err| format!("invalid restore_max_age_secs '{raw}': {err}"))?;
            Ok(RestorePolicy::MaxAge(Duration::from_secs(secs)))
        }
        other => Err(format!("unknown policy '{other}' (expected trust, never or max_age)")),
    }
}

fn apply_timeout(settings: &mut Settings, raw: &str) {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => settings.request_timeout_secs = secs,
        _ => tracing::warn!("ignoring invalid request timeout '{raw}'"),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn toml_value_to_string(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
