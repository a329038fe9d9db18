//! Manifest parsing and validation tests for airlift-core.
// crates/airlift-core/tests/manifest_parsing.rs
// =============================================================================
// Module: Manifest Parsing Tests
// Description: Validate fail-closed manifest parsing.
// Purpose: Ensure malformed manifests are rejected before any download.
// =============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use airlift_core::Manifest;
use airlift_core::ManifestError;
use airlift_core::UnixMillis;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const UPDATE_ID: &str = "0f2babbb-6d95-4e23-8a41-ae79a2f9a7c5";
const BUNDLE_HASH: &str =
    "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const LOGO_HASH: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

fn manifest_json(commit_time: &str) -> String {
    format!(
        r#"{{
            "id": "{UPDATE_ID}",
            "commitTime": {commit_time},
            "runtimeVersion": "1.0",
            "launchAssetKey": "bundle",
            "assets": [
                {{
                    "key": "bundle",
                    "url": "https://cdn.example.com/bundle.js",
                    "type": "application/javascript",
                    "hash": "{BUNDLE_HASH}",
                    "hashAlgorithm": "sha256"
                }},
                {{
                    "key": "logo",
                    "url": "https://cdn.example.com/logo.png",
                    "type": "image/png",
                    "hash": "{LOGO_HASH}"
                }}
            ],
            "metadata": {{"channel": "main"}}
        }}"#
    )
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn parses_integer_commit_time() {
    let manifest =
        Manifest::parse(manifest_json("1700000000000").as_bytes()).expect("manifest parses");
    assert_eq!(manifest.commit_time, UnixMillis::new(1_700_000_000_000));
    assert_eq!(manifest.assets.len(), 2);
    assert_eq!(manifest.launch_asset().expect("launch asset").key.as_str(), "bundle");
}

#[test]
fn parses_rfc3339_commit_time() {
    let manifest = Manifest::parse(manifest_json("\"2023-11-14T22:13:20Z\"").as_bytes())
        .expect("manifest parses");
    assert_eq!(manifest.commit_time, UnixMillis::new(1_700_000_000_000));
}

#[test]
fn rejects_duplicate_asset_keys() {
    let body = manifest_json("1").replace("\"key\": \"logo\"", "\"key\": \"bundle\"");
    let err = Manifest::parse(body.as_bytes()).expect_err("duplicate keys rejected");
    assert!(matches!(err, ManifestError::DuplicateAssetKey(key) if key == "bundle"));
}

#[test]
fn rejects_unknown_launch_asset_key() {
    let body = manifest_json("1").replace("\"launchAssetKey\": \"bundle\"", "\"launchAssetKey\": \"nope\"");
    let err = Manifest::parse(body.as_bytes()).expect_err("unknown launch asset rejected");
    assert!(matches!(err, ManifestError::UnknownLaunchAsset(key) if key == "nope"));
}

#[test]
fn rejects_malformed_digest() {
    let body = manifest_json("1").replace(BUNDLE_HASH, "zz");
    let err = Manifest::parse(body.as_bytes()).expect_err("bad digest rejected");
    assert!(matches!(err, ManifestError::Digest(_)));
}

#[test]
fn rejects_invalid_asset_url() {
    let body = manifest_json("1").replace("https://cdn.example.com/bundle.js", "not a url");
    let err = Manifest::parse(body.as_bytes()).expect_err("bad url rejected");
    assert!(matches!(err, ManifestError::InvalidUrl { .. }));
}

#[test]
fn rejects_empty_asset_list() {
    let body = format!(
        r#"{{"id": "{UPDATE_ID}", "commitTime": 1, "runtimeVersion": "1.0",
            "launchAssetKey": "bundle", "assets": []}}"#
    );
    let err = Manifest::parse(body.as_bytes()).expect_err("empty assets rejected");
    assert!(matches!(err, ManifestError::EmptyAssets));
}

#[test]
fn rejects_unknown_top_level_fields() {
    let body = manifest_json("1").replace("\"metadata\"", "\"surprise\": 1, \"metadata\"");
    let err = Manifest::parse(body.as_bytes()).expect_err("unknown field rejected");
    assert!(matches!(err, ManifestError::Json(_)));
}

#[test]
fn storage_path_uses_url_extension() {
    let manifest = Manifest::parse(manifest_json("1").as_bytes()).expect("manifest parses");
    let bundle = manifest.launch_asset().expect("launch asset");
    assert_eq!(bundle.storage_relative_path(), format!("sha256-{BUNDLE_HASH}.js"));
}

#[test]
fn storage_path_falls_back_to_bare_type_token() {
    let body = manifest_json("1")
        .replace("https://cdn.example.com/bundle.js", "https://cdn.example.com/bundle")
        .replace("application/javascript", "js");
    let manifest = Manifest::parse(body.as_bytes()).expect("manifest parses");
    let bundle = manifest.launch_asset().expect("launch asset");
    assert_eq!(bundle.storage_relative_path(), format!("sha256-{BUNDLE_HASH}.js"));
}

#[test]
fn storage_path_omits_extension_for_mime_types() {
    let body =
        manifest_json("1").replace("https://cdn.example.com/bundle.js", "https://cdn.example.com/bundle");
    let manifest = Manifest::parse(body.as_bytes()).expect("manifest parses");
    let bundle = manifest.launch_asset().expect("launch asset");
    assert_eq!(bundle.storage_relative_path(), format!("sha256-{BUNDLE_HASH}"));
}
