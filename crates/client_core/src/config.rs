use std::{collections::HashMap, fs, path::Path, time::Duration};

use tracing::warn;

use crate::upload::{UploadPolicy, DEFAULT_MAX_UPLOAD_BYTES};

pub const SETTINGS_FILE: &str = "feed.toml";

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub upload_api_base: String,
    pub auth_token: Option<String>,
    pub max_upload_bytes: u64,
    pub mock_progress_step: u8,
    pub mock_progress_delay_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".into(),
            upload_api_base: "https://api.cloudinary.com/v1_1".into(),
            auth_token: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            mock_progress_step: 20,
            mock_progress_delay_ms: 150,
            request_timeout_secs: 30,
        }
    }
}

impl ClientSettings {
    pub fn upload_policy(&self) -> UploadPolicy {
        UploadPolicy {
            max_bytes: self.max_upload_bytes,
            mock_step_percent: self.mock_progress_step,
            mock_step_delay: Duration::from_millis(self.mock_progress_delay_ms),
        }
    }
}

pub fn load_settings() -> ClientSettings {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then the top-level keys of the TOML file at `path`, then environment.
pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            Ok(file_cfg) => apply_file(&mut settings, &file_cfg),
            Err(err) => warn!(path = %path.display(), error = %err, "ignoring unreadable settings file"),
        }
    }

    if let Some(v) = first_set(&env, &["FEED_API_URL", "APP__API_URL"]) {
        settings.api_base_url = v;
    }
    if let Some(v) = first_set(&env, &["FEED_UPLOAD_API_BASE", "APP__UPLOAD_API_BASE"]) {
        settings.upload_api_base = v;
    }
    if let Some(v) = first_set(&env, &["FEED_TOKEN", "APP__AUTH_TOKEN"]) {
        settings.auth_token = Some(v);
    }
    if let Some(v) = parsed(&env, "APP__MAX_UPLOAD_BYTES") {
        settings.max_upload_bytes = v;
    }
    if let Some(v) = parsed(&env, "APP__MOCK_PROGRESS_STEP") {
        settings.mock_progress_step = v;
    }
    if let Some(v) = parsed(&env, "APP__MOCK_PROGRESS_DELAY_MS") {
        settings.mock_progress_delay_ms = v;
    }
    if let Some(v) = parsed(&env, "APP__REQUEST_TIMEOUT_SECS") {
        settings.request_timeout_secs = v;
    }

    settings
}

fn apply_file(settings: &mut ClientSettings, file_cfg: &HashMap<String, toml::Value>) {
    let text = |key: &str| file_cfg.get(key).and_then(toml::Value::as_str).map(str::to_string);
    let number = |key: &str| file_cfg.get(key).and_then(toml::Value::as_integer);

    if let Some(v) = text("api_base_url") {
        settings.api_base_url = v;
    }
    if let Some(v) = text("upload_api_base") {
        settings.upload_api_base = v;
    }
    if let Some(v) = text("auth_token") {
        settings.auth_token = Some(v);
    }
    if let Some(v) = number("max_upload_bytes").and_then(|v| u64::try_from(v).ok()) {
        settings.max_upload_bytes = v;
    }
    if let Some(v) = number("mock_progress_step").and_then(|v| u8::try_from(v).ok()) {
        settings.mock_progress_step = v;
    }
    if let Some(v) = number("mock_progress_delay_ms").and_then(|v| u64::try_from(v).ok()) {
        settings.mock_progress_delay_ms = v;
    }
    if let Some(v) = number("request_timeout_secs").and_then(|v| u64::try_from(v).ok()) {
        settings.request_timeout_secs = v;
    }
}

fn first_set(env: &impl Fn(&str) -> Option<String>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| env(key))
        .find(|value| !value.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    env(key).and_then(|value| value.trim().parse().ok())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
