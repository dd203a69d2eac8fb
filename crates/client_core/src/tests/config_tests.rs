use super::*;
use std::collections::HashMap;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

fn write_settings(name: &str, contents: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("feed-{}-{name}.toml", std::process::id()));
    fs::write(&path, contents).expect("write settings");
    path
}

#[test]
fn missing_file_and_empty_env_give_defaults() {
    let settings = load_settings_from(Path::new("/nonexistent/feed.toml"), env_from(&[]));

    assert_eq!(settings.api_base_url, "http://localhost:8000");
    assert_eq!(settings.upload_api_base, "https://api.cloudinary.com/v1_1");
    assert_eq!(settings.auth_token, None);
    assert_eq!(settings.upload_policy(), UploadPolicy::default());
    assert_eq!(settings.request_timeout_secs, 30);
}

#[test]
fn file_values_override_defaults() {
    let path = write_settings(
        "file",
        r#"
api_base_url = "https://feed.example/api"
auth_token = "file-token"
max_upload_bytes = 2048
mock_progress_step = 25
mock_progress_delay_ms = 0
"#,
    );

    let settings = load_settings_from(&path, env_from(&[]));
    let _ = fs::remove_file(&path);

    assert_eq!(settings.api_base_url, "https://feed.example/api");
    assert_eq!(settings.auth_token.as_deref(), Some("file-token"));
    assert_eq!(
        settings.upload_policy(),
        UploadPolicy {
            max_bytes: 2048,
            mock_step_percent: 25,
            mock_step_delay: Duration::ZERO,
        }
    );
}

#[test]
fn environment_wins_over_file_and_feed_names_win_over_app_names() {
    let path = write_settings("env", "api_base_url = \"https://file.example\"\n");

    let settings = load_settings_from(
        &path,
        env_from(&[
            ("FEED_API_URL", "https://feed-env.example"),
            ("APP__API_URL", "https://app-env.example"),
            ("APP__AUTH_TOKEN", "app-token"),
            ("APP__REQUEST_TIMEOUT_SECS", " 5 "),
        ]),
    );
    let _ = fs::remove_file(&path);

    assert_eq!(settings.api_base_url, "https://feed-env.example");
    assert_eq!(settings.auth_token.as_deref(), Some("app-token"));
    assert_eq!(settings.request_timeout_secs, 5);
}

#[test]
fn blank_or_unparsable_values_are_ignored() {
    let settings = load_settings_from(
        Path::new("/nonexistent/feed.toml"),
        env_from(&[
            ("FEED_API_URL", "  "),
            ("APP__MAX_UPLOAD_BYTES", "ten megs"),
            ("APP__MOCK_PROGRESS_STEP", "300"),
        ]),
    );

    assert_eq!(settings.api_base_url, "http://localhost:8000");
    assert_eq!(settings.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    assert_eq!(settings.mock_progress_step, 20);
}

#[test]
fn malformed_file_falls_back_to_defaults() {
    let path = write_settings("broken", "api_base_url = [unterminated");

    let settings = load_settings_from(&path, env_from(&[]));
    let _ = fs::remove_file(&path);

    assert_eq!(settings.api_base_url, "http://localhost:8000");
}
