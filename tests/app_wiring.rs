mod common;
use common::{ok, quiet_logger, ScriptedBackend, ENV_LOCK};

use serde_json::json;
use std::sync::Arc;
use webposto_mcp::app::App;
use webposto_mcp::config::Settings;
use webposto_mcp::services::credentials::EnvSecretProvider;
use webposto_mcp::services::dispatcher::ToolCall;

const ENV_KEYS: &[&str] = &[
    "WEBPOSTO_URL",
    "WEBPOSTO_EMPRESA_CODIGO",
    "WEBPOSTO_SECRET_ID",
    "WEBPOSTO_API_KEY_FILE",
    "WEBPOSTO_REGISTRY_PATH",
    "WEBPOSTO_TIMEOUT_MS",
    "WEBPOSTO_MAX_ATTEMPTS",
    "WEBPOSTO_TEST_KEY",
];

fn snapshot_env() -> Vec<(&'static str, Option<String>)> {
    ENV_KEYS
        .iter()
        .map(|key| (*key, std::env::var(key).ok()))
        .collect()
}

fn restore_env(previous: Vec<(&'static str, Option<String>)>) {
    for (key, value) in previous {
        match value {
            Some(value) => std::env::set_var(key, value),
            None => std::env::remove_var(key),
        }
    }
}

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("webposto-mcp-{}-{}", uuid::Uuid::new_v4(), name))
}

#[tokio::test]
async fn settings_come_from_the_environment() {
    let _guard = ENV_LOCK.lock().await;
    let previous = snapshot_env();
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }

    std::env::set_var("WEBPOSTO_URL", "http://erp.local:8080");
    std::env::set_var("WEBPOSTO_EMPRESA_CODIGO", "12");
    std::env::set_var("WEBPOSTO_MAX_ATTEMPTS", "5");

    let settings = Settings::from_env().expect("settings");
    assert_eq!(settings.base_url, "http://erp.local:8080");
    assert_eq!(settings.default_company(), Some("12"));
    assert_eq!(settings.max_attempts, 5);
    assert_eq!(settings.timeout_ms, 30_000);
    assert_eq!(settings.secret_id, "WEBPOSTO_API_KEY");

    std::env::set_var("WEBPOSTO_TIMEOUT_MS", "soon");
    assert!(Settings::from_env().is_err());

    restore_env(previous);
}

#[tokio::test]
async fn app_reads_key_from_env_and_registry_from_file() {
    let _guard = ENV_LOCK.lock().await;
    let previous = snapshot_env();
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }

    let registry_path = temp_path("registry.json");
    let registry = json!({
        "endpoints": [{
            "name": "consultar_empresas",
            "description": "Empresas",
            "method": "GET",
            "path": "/INTEGRACAO/EMPRESAS",
            "params": []
        }]
    });
    std::fs::write(&registry_path, registry.to_string()).expect("write registry");

    std::env::set_var("WEBPOSTO_URL", "http://erp.test");
    std::env::set_var("WEBPOSTO_SECRET_ID", "WEBPOSTO_TEST_KEY");
    std::env::set_var("WEBPOSTO_TEST_KEY", "env-key");
    std::env::set_var("WEBPOSTO_REGISTRY_PATH", &registry_path);

    let settings = Settings::from_env().expect("settings");
    let backend = ScriptedBackend::new(vec![ok(json!([]))]);
    let app = App::with_parts(
        settings,
        backend.clone(),
        Arc::new(EnvSecretProvider),
        quiet_logger(),
    )
    .expect("app");
    assert_eq!(app.registry.len(), 1);

    let envelope = app
        .dispatcher
        .dispatch(ToolCall::new("consultar_empresas", serde_json::Map::new()))
        .await;
    assert!(envelope.success, "{:?}", envelope.error);
    assert!(backend.last_url().await.ends_with("chave=env-key"));

    let _ = std::fs::remove_file(&registry_path);
    restore_env(previous);
}

#[tokio::test]
async fn missing_key_surfaces_as_credential_unavailable() {
    let _guard = ENV_LOCK.lock().await;
    let previous = snapshot_env();
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
    std::env::set_var("WEBPOSTO_SECRET_ID", "WEBPOSTO_TEST_KEY");

    let settings = Settings::from_env().expect("settings");
    let backend = ScriptedBackend::new(vec![ok(json!([]))]);
    let app = App::with_parts(
        settings,
        backend.clone(),
        Arc::new(EnvSecretProvider),
        quiet_logger(),
    )
    .expect("app");

    let envelope = app
        .dispatcher
        .dispatch(ToolCall::new("consultar_empresas", serde_json::Map::new()))
        .await;
    assert_eq!(envelope.error_kind(), Some("CredentialUnavailable"));
    assert_eq!(backend.request_count().await, 0);

    std::env::set_var("WEBPOSTO_TEST_KEY", "late-key");
    let envelope = app
        .dispatcher
        .dispatch(ToolCall::new("consultar_empresas", serde_json::Map::new()))
        .await;
    assert!(envelope.success, "{:?}", envelope.error);
    assert_eq!(backend.request_count().await, 1);
    assert!(backend.last_url().await.contains("chave=late-key"));

    restore_env(previous);
}

#[tokio::test]
async fn broken_registry_file_stops_startup() {
    let _guard = ENV_LOCK.lock().await;
    let previous = snapshot_env();
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }

    let registry_path = temp_path("broken.json");
    std::fs::write(&registry_path, r#"{"endpoints":[{"name":"x"}]}"#).expect("write");
    std::env::set_var("WEBPOSTO_REGISTRY_PATH", &registry_path);

    let settings = Settings::from_env().expect("settings");
    let result = App::with_parts(
        settings,
        ScriptedBackend::new(vec![]),
        Arc::new(EnvSecretProvider),
        quiet_logger(),
    );
    assert!(result.is_err());

    let _ = std::fs::remove_file(&registry_path);
    restore_env(previous);
}
