//! Config load validation tests for airlift-config.
// crates/airlift-config/tests/load_validation.rs
// =============================================================================
// Module: Config Load Validation Tests
// Description: Validate config loading guards (path, size, encoding).
// Purpose: Ensure config input handling is strict and fail-closed.
// =============================================================================

use std::io::Write;
use std::path::Path;

use airlift_config::ConfigError;
use airlift_config::EngineConfig;
use tempfile::NamedTempFile;

type TestResult = Result<(), String>;

fn assert_invalid(result: Result<EngineConfig, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config load".to_string()),
    }
}

fn write_config(body: &str) -> Result<NamedTempFile, String> {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(body.as_bytes()).map_err(|err| err.to_string())?;
    Ok(file)
}

const VALID_CONFIG: &str = r#"
update_url = "https://updates.example.com/manifest"
scope_key = "main"
runtime_version = "1.0"
updates_directory = "/var/lib/airlift/updates"
"#;

#[test]
fn load_rejects_path_too_long() -> TestResult {
    let long_path = "a".repeat(5_000);
    let path = Path::new(&long_path);
    assert_invalid(EngineConfig::load(Some(path)), "config path exceeds max length")?;
    Ok(())
}

#[test]
fn load_rejects_path_component_too_long() -> TestResult {
    let long_component = "a".repeat(300);
    let path = Path::new(&long_component);
    assert_invalid(EngineConfig::load(Some(path)), "config path component too long")?;
    Ok(())
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    let payload = vec![b'a'; 1_048_577];
    file.write_all(&payload).map_err(|err| err.to_string())?;
    assert_invalid(EngineConfig::load(Some(file.path())), "config file exceeds size limit")?;
    Ok(())
}

#[test]
fn load_rejects_non_utf8_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(&[0xFF, 0xFE, 0xFF]).map_err(|err| err.to_string())?;
    assert_invalid(EngineConfig::load(Some(file.path())), "config file must be utf-8")?;
    Ok(())
}

#[test]
fn load_rejects_unknown_fields() -> TestResult {
    let file = write_config(&format!("{VALID_CONFIG}\nsurprise = 1\n"))?;
    match EngineConfig::load(Some(file.path())) {
        Err(ConfigError::Parse(_)) => Ok(()),
        Err(other) => Err(format!("unexpected error: {other}")),
        Ok(_) => Err("expected unknown field rejection".to_string()),
    }
}

#[test]
fn load_rejects_http_without_allow_http() -> TestResult {
    let body = VALID_CONFIG.replace("https://", "http://");
    let file = write_config(&body)?;
    assert_invalid(EngineConfig::load(Some(file.path())), "http without allow_http")?;
    Ok(())
}

#[test]
fn load_accepts_http_with_allow_http() -> TestResult {
    let body = format!("{}\nallow_http = true\n", VALID_CONFIG.replace("https://", "http://"));
    let file = write_config(&body)?;
    EngineConfig::load(Some(file.path())).map_err(|err| err.to_string())?;
    Ok(())
}

#[test]
fn load_rejects_empty_scope_key() -> TestResult {
    let body = VALID_CONFIG.replace("scope_key = \"main\"", "scope_key = \"\"");
    let file = write_config(&body)?;
    assert_invalid(EngineConfig::load(Some(file.path())), "scope_key must not be empty")?;
    Ok(())
}

#[test]
fn load_rejects_zero_concurrency() -> TestResult {
    let file = write_config(&format!("{VALID_CONFIG}\nmax_concurrency = 0\n"))?;
    assert_invalid(
        EngineConfig::load(Some(file.path())),
        "max_concurrency must be greater than zero",
    )?;
    Ok(())
}

#[test]
fn load_applies_defaults_and_derives_catalog_path() -> TestResult {
    let file = write_config(VALID_CONFIG)?;
    let config = EngineConfig::load(Some(file.path())).map_err(|err| err.to_string())?;
    if config.fetch_timeout_ms != 30_000 {
        return Err(format!("unexpected fetch timeout: {}", config.fetch_timeout_ms));
    }
    if config.catalog.path != Path::new("/var/lib/airlift/updates/airlift.db") {
        return Err(format!("unexpected catalog path: {}", config.catalog.path.display()));
    }
    if config.development_enabled || config.development_client {
        return Err("development toggles should default off".to_string());
    }
    Ok(())
}
