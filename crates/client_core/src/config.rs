use std::{collections::HashMap, fs, path::Path};

use anyhow::Result;
use tracing::warn;

use crate::coordinator::ProgressSchedule;

pub const SETTINGS_FILE: &str = "order_controls.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Base for relative endpoint paths such as `/admin/orders/...`.
    pub base_url: Option<String>,
    pub meta_url: Option<String>,
    pub cache_database_url: String,
    /// Raw `Cookie` header; the CSRF token is taken from its `csrftoken` entry.
    pub cookie_header: Option<String>,
    pub progress_messages: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: None,
            meta_url: None,
            cache_database_url: "sqlite://./data/order_controls.db".into(),
            cookie_header: None,
            progress_messages: true,
        }
    }
}

impl Settings {
    pub fn progress_schedule(&self) -> ProgressSchedule {
        if self.progress_messages {
            ProgressSchedule::default()
        } else {
            ProgressSchedule::disabled()
        }
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then the flat TOML file, then environment overrides.
pub fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            Ok(table) => {
                let file_cfg: HashMap<String, String> = table
                    .into_iter()
                    .map(|(key, value)| (key, scalar_text(value)))
                    .collect();
                apply_file(&mut settings, &file_cfg);
            }
            Err(err) => warn!(path = %path.display(), error = %err, "ignoring unreadable settings file"),
        }
    }

    let lookup = |primary: &str, alias: &str| env(alias).or_else(|| env(primary));

    if let Some(v) = lookup("ORDER_CONTROLS_BASE_URL", "APP__BASE_URL") {
        settings.base_url = non_empty(v);
    }
    if let Some(v) = lookup("ORDER_CONTROLS_META_URL", "APP__META_URL") {
        settings.meta_url = non_empty(v);
    }
    if let Some(v) = lookup("ORDER_CONTROLS_CACHE_URL", "APP__CACHE_URL") {
        settings.cache_database_url = normalize_cache_url(&v);
    }
    if let Some(v) = lookup("ORDER_CONTROLS_COOKIE", "APP__COOKIE") {
        settings.cookie_header = non_empty(v);
    }
    if let Some(v) = lookup("ORDER_CONTROLS_PROGRESS", "APP__PROGRESS_MESSAGES") {
        if let Some(flag) = parse_flag(&v) {
            settings.progress_messages = flag;
        }
    }

    settings
}

fn apply_file(settings: &mut Settings, file_cfg: &HashMap<String, String>) {
    if let Some(v) = file_cfg.get("base_url") {
        settings.base_url = non_empty(v.clone());
    }
    if let Some(v) = file_cfg.get("meta_url") {
        settings.meta_url = non_empty(v.clone());
    }
    if let Some(v) = file_cfg.get("cache_database_url") {
        settings.cache_database_url = normalize_cache_url(v);
    }
    if let Some(v) = file_cfg.get("cookie") {
        settings.cookie_header = non_empty(v.clone());
    }
    if let Some(flag) = file_cfg.get("progress_messages").and_then(|v| parse_flag(v)) {
        settings.progress_messages = flag;
    }
}

fn scalar_text(value: toml::Value) -> String {
    match value {
        toml::Value::String(text) => text,
        other => other.to_string(),
    }
}

/// Prepares the cache url for opening: normalised, with its parent directory in place.
pub fn prepare_cache_url(raw: &str) -> Result<String> {
    let url = normalize_cache_url(raw);
    storage::ensure_sqlite_parent_dir_exists(&url)?;
    Ok(url)
}

fn normalize_cache_url(raw: &str) -> String {
    let raw = raw.trim();

    if raw.is_empty() {
        return Settings::default().cache_database_url;
    }
    if raw.starts_with("sqlite:") || raw.contains("://") {
        return raw.to_string();
    }

    format!("sqlite://{}", raw.replace('\\', "/"))
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
