//! Integration tests for the lmdq CLI binary.

use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

const FEDERATION_FINGERPRINT: &str = "9777a99c407c7448352e9678525c920de05a74e2";

/// Test context with an empty base directory
struct TestContext {
    temp_dir: TempDir,
    base_dir: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base_dir = temp_dir.path().join("md");
        std::fs::create_dir_all(&base_dir).expect("failed to create base dir");
        Self { temp_dir, base_dir }
    }

    fn lmdq_cmd(&self) -> Command {
        let bin_path = env!("CARGO_BIN_EXE_lmdq");
        let mut cmd = Command::new(bin_path);
        for var in [
            "LMDQ_FEEDS",
            "LMDQ_SNAPSHOT_PREFIX",
            "LMDQ_LIVE_LINK",
            "LMDQ_SCHEMA",
            "LMDQ_INDEX_TARGETS",
            "LMDQ_DUPLICATES",
            "LMDQ_FETCH_TIMEOUT",
            "LMDQ_INSECURE_TRANSPORT",
            "LMDQ_DISCOVERY_URL",
            "LMDQ_DISCOVERY_FILE",
            "LMDQ_RECLAIM_ABANDONED",
        ] {
            cmd.env_remove(var);
        }
        cmd.env("LMDQ_BASE_DIR", &self.base_dir);
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.lmdq_cmd()
            .args(args)
            .output()
            .expect("failed to run lmdq")
    }

    fn base_dir_entries(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.base_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

fn testdata(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../lmdq-core/testdata")
        .join(name)
}

#[test]
fn test_help_command() {
    let ctx = TestContext::new();
    let output = ctx.run(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("update"));
}

#[test]
fn test_version_command() {
    let ctx = TestContext::new();
    let output = ctx.run(&["--version"]);
    assert!(output.status.success());
}

#[test]
fn test_hash_command() {
    let ctx = TestContext::new();
    let output = ctx.run(&["hash", "urn:x"]);
    assert!(output.status.success(), "Hash should succeed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), "3b1fd55f192b3fc87316a04000c15ddb6255e07e urn:x");
}

#[test]
fn test_hash_certificate() {
    let ctx = TestContext::new();
    let cert = testdata("federation.crt");
    let output = ctx.run(&["hash", "--cert", cert.to_str().unwrap()]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with(FEDERATION_FINGERPRINT));
}

#[test]
fn test_update_rejects_malformed_feeds() {
    let ctx = TestContext::new();
    let output = ctx.run(&["update", "--feeds", "hub::https://md.example.org/hub.xml"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Wrong feed format"), "stderr: {stderr}");
    assert!(
        ctx.base_dir_entries().is_empty(),
        "Nothing should be created for a bad configuration"
    );
}

#[test]
fn test_update_failure_leaves_no_live_link() {
    let ctx = TestContext::new();
    let feeds = format!("hub::http://127.0.0.1:1/hub.xml::{FEDERATION_FINGERPRINT}");
    let output = ctx.run(&["--quiet", "update", "--feeds", &feeds, "--fetch-timeout", "5"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Feed 'hub' failed during fetch"), "stderr: {stderr}");

    let entries = ctx.base_dir_entries();
    assert!(!entries.iter().any(|e| e == "lmdqdata"), "entries: {entries:?}");
    assert_eq!(entries.len(), 1, "the abandoned snapshot stays: {entries:?}");
    assert!(entries[0].starts_with("lmdqdata_"));
}

#[test]
fn test_update_failure_reclaims_snapshot() {
    let ctx = TestContext::new();
    let feeds = format!("hub::http://127.0.0.1:1/hub.xml::{FEDERATION_FINGERPRINT}");
    let output = ctx
        .lmdq_cmd()
        .args(["--quiet", "update", "--feeds", &feeds])
        .env("LMDQ_RECLAIM_ABANDONED", "true")
        .output()
        .expect("failed to run lmdq");
    assert!(!output.status.success());
    assert!(ctx.base_dir_entries().is_empty());
}

#[test]
fn test_status_without_live_snapshot() {
    let ctx = TestContext::new();
    let output = ctx.run(&["status"]);
    assert!(output.status.success(), "Status should succeed on an empty base dir");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No live snapshot"));
}

#[test]
fn test_status_json() {
    let ctx = TestContext::new();
    std::fs::create_dir(ctx.base_dir.join("lmdqdata_1700000000")).unwrap();

    let output = ctx.run(&["status", "--json"]);
    assert!(output.status.success());
    let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(status["target"].is_null());
    assert_eq!(status["stale_snapshots"].as_array().unwrap().len(), 1);
}

#[test]
fn test_validate_unsigned_file() {
    let ctx = TestContext::new();
    let file = ctx.temp_dir.path().join("unsigned.xml");
    std::fs::write(
        &file,
        r#"<md:EntitiesDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata"><md:EntityDescriptor entityID="https://sp.example.org"><md:SPSSODescriptor protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol"><md:AssertionConsumerService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" Location="https://sp.example.org/acs" index="0"/></md:SPSSODescriptor></md:EntityDescriptor></md:EntitiesDescriptor>"#,
    )
    .unwrap();

    let output = ctx.run(&[
        "validate",
        file.to_str().unwrap(),
        "--fingerprint",
        FEDERATION_FINGERPRINT,
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Metadata not signed"), "stderr: {stderr}");
}

#[test]
fn test_validate_truncated_file() {
    let ctx = TestContext::new();
    let file = ctx.temp_dir.path().join("truncated.xml");
    std::fs::write(&file, "<md:EntitiesDescriptor xmlns:md=\"urn:oasis:names:tc:SAML:2.0:metadata\">").unwrap();

    let output = ctx.run(&[
        "validate",
        file.to_str().unwrap(),
        "--fingerprint",
        FEDERATION_FINGERPRINT,
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Document validation error -1"), "stderr: {stderr}");
}
