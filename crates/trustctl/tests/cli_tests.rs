//! End-to-end tests for the trustctl binary
//!
//! Each test runs the real binary against temporary files and checks the
//! exit code mapping.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn std::error::Error>>;

/// trustctl with a scrubbed environment and the state file inside `dir`
fn trustctl(dir: &TempDir) -> Result<Command, Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("trustctl")?;
    cmd.env_remove("TRUSTCTL_CONFIG")
        .env_remove("TRUSTCTL_SIGN_ENDPOINT")
        .env_remove("RUST_LOG")
        .env("TRUSTCTL_STATE", dir.path().join("state.json"));
    Ok(cmd)
}

fn stored_decision(dir: &TempDir) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let state: Value = serde_json::from_str(&fs::read_to_string(dir.path().join("state.json"))?)?;
    Ok(state
        .get("beyond_corp")
        .and_then(Value::as_str)
        .map(str::to_string))
}

mod hash {
    use super::*;

    #[test]
    fn test_hash_prints_base64_sha256() -> TestResult {
        let dir = TempDir::new()?;
        let wim = dir.path().join("boot.wim");
        fs::write(&wim, "test_wim")?;

        let output = trustctl(&dir)?.arg("--json").arg("hash").arg(&wim).output()?;
        assert!(output.status.success());

        let body: Value = serde_json::from_slice(&output.stdout)?;
        assert_eq!(
            body.get("hash").and_then(Value::as_str),
            Some("xxaroj1bgT5sObhJ0HwOtqpn+Nx0gO/Wz5wATtYK7Tk=")
        );
        Ok(())
    }

    #[test]
    fn test_hash_missing_file_exits_with_io_code() -> TestResult {
        let dir = TempDir::new()?;
        trustctl(&dir)?
            .arg("hash")
            .arg(dir.path().join("absent.wim"))
            .assert()
            .code(4)
            .stderr(predicate::str::contains("Error:"));
        Ok(())
    }
}

mod check {
    use super::*;

    #[test]
    fn test_check_persists_false_by_default() -> TestResult {
        let dir = TempDir::new()?;
        trustctl(&dir)?
            .arg("check")
            .assert()
            .success()
            .stdout(predicate::str::contains("not required"));
        assert_eq!(stored_decision(&dir)?.as_deref(), Some("False"));
        Ok(())
    }

    #[test]
    fn test_check_persists_true_when_enabled() -> TestResult {
        let dir = TempDir::new()?;
        let output = trustctl(&dir)?
            .args(["--json", "--use-signed-url", "check"])
            .output()?;
        assert!(output.status.success());

        let body: Value = serde_json::from_slice(&output.stdout)?;
        assert_eq!(body.get("required"), Some(&Value::Bool(true)));
        assert_eq!(stored_decision(&dir)?.as_deref(), Some("True"));
        Ok(())
    }

    #[test]
    fn test_stored_decision_survives_disabled_run() -> TestResult {
        let dir = TempDir::new()?;
        trustctl(&dir)?.args(["--use-signed-url", "check"]).assert().success();
        trustctl(&dir)?
            .args(["--json", "check"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"required\": true"));
        assert_eq!(stored_decision(&dir)?.as_deref(), Some("True"));
        Ok(())
    }
}

mod sign {
    use super::*;

    #[test]
    fn test_sign_when_disabled_exits_with_config_code() -> TestResult {
        let dir = TempDir::new()?;
        trustctl(&dir)?
            .args(["sign", "unstable/test.yaml"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("disabled"));
        Ok(())
    }

    #[test]
    fn test_sign_without_endpoint_exits_with_config_code() -> TestResult {
        let dir = TempDir::new()?;
        let output = trustctl(&dir)?
            .args(["--json", "--use-signed-url", "sign", "unstable/test.yaml"])
            .output()?;
        assert_eq!(output.status.code(), Some(2));

        let body: Value = serde_json::from_slice(&output.stdout)?;
        assert_eq!(body.get("success"), Some(&Value::Bool(false)));
        assert_eq!(
            body.pointer("/error/reason").and_then(Value::as_str),
            Some("missingEndpoint")
        );
        assert_eq!(
            body.pointer("/error/type").and_then(Value::as_str),
            Some("verification")
        );
        Ok(())
    }

    #[test]
    fn test_sign_with_unknown_volume_exits_with_volume_code() -> TestResult {
        let dir = TempDir::new()?;
        let config = dir.path().join("config.json");
        fs::write(
            &config,
            r#"{
                "use_signed_url": true,
                "sign_endpoint": "http://127.0.0.1:9/sign",
                "seed_path": "seed.json",
                "volume_label": "NO_SUCH_PROVISIONING_VOLUME"
            }"#,
        )?;

        trustctl(&dir)?
            .arg("--config")
            .arg(&config)
            .args(["sign", "unstable/test.yaml"])
            .assert()
            .code(3);
        Ok(())
    }

    #[test]
    fn test_disabled_reason_in_json_error() -> TestResult {
        let dir = TempDir::new()?;
        let output = trustctl(&dir)?
            .args(["--json", "sign", "unstable/test.yaml"])
            .output()?;
        assert_eq!(output.status.code(), Some(2));

        let body: Value = serde_json::from_slice(&output.stdout)?;
        assert_eq!(
            body.pointer("/error/reason").and_then(Value::as_str),
            Some("disabled")
        );
        Ok(())
    }

    #[test]
    fn test_non_gate_error_has_null_reason() -> TestResult {
        let dir = TempDir::new()?;
        let output = trustctl(&dir)?
            .arg("--json")
            .arg("hash")
            .arg(dir.path().join("absent.wim"))
            .output()?;
        assert_eq!(output.status.code(), Some(4));

        let body: Value = serde_json::from_slice(&output.stdout)?;
        assert_eq!(body.pointer("/error/reason"), Some(&Value::Null));
        Ok(())
    }

    #[test]
    fn test_invalid_config_file_exits_with_config_code() -> TestResult {
        let dir = TempDir::new()?;
        let config = dir.path().join("config.json");
        fs::write(&config, "{ not json")?;

        trustctl(&dir)?
            .arg("--config")
            .arg(&config)
            .args(["sign", "unstable/test.yaml"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("Invalid configuration"));
        Ok(())
    }
}
