use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const REGISTRY: &str = r#"{
    "clusters": {
        "utv": { "name": "utv", "url": "https://api.cluster.example.com:8443", "loginUrl": "https://login.cluster.example.com" },
        "prod": { "name": "prod", "url": "https://api.prod.example.com:6443" }
    }
}"#;

const KUBECONFIG: &str = r#"apiVersion: v1
kind: Config
clusters:
- cluster:
    server: https://api.cluster.example.com:8443
  name: api-cluster-example-com
contexts: []
current-context: ""
users:
- name: alice/api-cluster-example-com
  user:
    token: sha256~abc
"#;

fn setup() -> (tempfile::TempDir, PathBuf, PathBuf) {
    let temp = tempdir().unwrap();
    let kc = temp.path().join("config");
    let ao = temp.path().join("ao.json");
    fs::write(&kc, KUBECONFIG).unwrap();
    fs::write(&ao, REGISTRY).unwrap();
    (temp, kc, ao)
}

#[allow(deprecated)]
fn cs(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("cs").expect("binary");
    cmd.env("HOME", home)
        .env("CS_LOG", "warn")
        .env("CS_USER", "alice")
        .env_remove("CS_NAMESPACE")
        .env_remove("CS_KUBECONFIG")
        .env_remove("CS_AOCONFIG");
    cmd
}

#[test]
fn switch_creates_context_and_reports_it() {
    let (temp, kc, ao) = setup();
    cs(temp.path())
        .arg("--kubeconfig")
        .arg(&kc)
        .arg("--aoconfig")
        .arg(&ao)
        .args(["-n", "team", "utv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Switched to context \"team/api-cluster-example-com/alice\""));

    let written = fs::read_to_string(&kc).unwrap();
    assert!(written.contains("current-context: team/api-cluster-example-com/alice"));
}

#[test]
fn namespace_defaults_to_aurora() {
    let (temp, kc, ao) = setup();
    let out = cs(temp.path())
        .arg("--kubeconfig")
        .arg(&kc)
        .arg("--aoconfig")
        .arg(&ao)
        .args(["-o", "json", "utv"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let body: serde_json::Value = serde_json::from_slice(&out.stdout).expect("valid json");
    assert_eq!(body["status"], "activated");
    assert_eq!(body["context"], "aurora/api-cluster-example-com/alice");
    assert_eq!(body["created"], true);
}

#[test]
fn default_paths_come_from_home() {
    let (temp, _kc, _ao) = setup();
    fs::create_dir_all(temp.path().join(".kube")).unwrap();
    fs::write(temp.path().join(".kube/config"), KUBECONFIG).unwrap();
    fs::write(temp.path().join(".ao.json"), REGISTRY).unwrap();
    cs(temp.path()).args(["-n", "ns1", "utv"]).assert().success();
    let written = fs::read_to_string(temp.path().join(".kube/config")).unwrap();
    assert!(written.contains("ns1/api-cluster-example-com/alice"));
}

#[test]
fn login_required_exits_zero_and_leaves_file() {
    let (temp, kc, ao) = setup();
    cs(temp.path())
        .arg("--kubeconfig")
        .arg(&kc)
        .arg("--aoconfig")
        .arg(&ao)
        .arg("prod")
        .assert()
        .success()
        .stdout(predicate::str::contains("Please login"));
    assert_eq!(fs::read_to_string(&kc).unwrap(), KUBECONFIG);
}

#[test]
fn unknown_cluster_has_its_own_exit_code() {
    let (temp, kc, ao) = setup();
    cs(temp.path())
        .arg("--kubeconfig")
        .arg(&kc)
        .arg("--aoconfig")
        .arg(&ao)
        .arg("foo")
        .assert()
        .code(12)
        .stderr(predicate::str::contains("could not find cluster: foo"));
    assert_eq!(fs::read_to_string(&kc).unwrap(), KUBECONFIG);
}

#[test]
fn missing_registry_exits_with_registry_code() {
    let (temp, kc, _ao) = setup();
    cs(temp.path())
        .arg("--kubeconfig")
        .arg(&kc)
        .arg("--aoconfig")
        .arg(temp.path().join("absent.json"))
        .arg("utv")
        .assert()
        .code(10)
        .stderr(predicate::str::contains("file not found"));
}

#[test]
fn list_prints_clusters() {
    let (temp, _kc, ao) = setup();
    cs(temp.path())
        .arg("--aoconfig")
        .arg(&ao)
        .arg("--list")
        .assert()
        .success()
        .stdout(predicate::str::contains("api-prod-example-com").and(predicate::str::contains("utv")));
}

#[test]
fn no_arguments_prints_help() {
    let (temp, _kc, _ao) = setup();
    cs(temp.path()).assert().success().stdout(predicate::str::contains("Usage"));
}

#[test]
fn malformed_invocation_exits_one() {
    let (temp, _kc, _ao) = setup();
    cs(temp.path()).args(["--bogus-flag"]).assert().code(1);
    cs(temp.path()).args(["-n", "", "utv"]).assert().code(1);
}

#[allow(deprecated)]
fn cs_bare(home: &Path, kc: &Path, ao: &Path) -> Command {
    let mut cmd = Command::cargo_bin("cs").expect("binary");
    cmd.env_clear()
        .env("HOME", home)
        .env("CS_LOG", "warn")
        .arg("--kubeconfig")
        .arg(kc)
        .arg("--aoconfig")
        .arg(ao);
    cmd
}

#[test]
fn operator_falls_back_to_logname() {
    let (temp, kc, ao) = setup();
    cs_bare(temp.path(), &kc, &ao)
        .env("LOGNAME", "alice")
        .arg("utv")
        .assert()
        .success()
        .stdout(predicate::str::contains("aurora/api-cluster-example-com/alice"));
    assert!(fs::read_to_string(&kc).unwrap().contains("current-context: aurora/api-cluster-example-com/alice"));
}

#[test]
fn operator_falls_back_to_username_after_blank_user() {
    let (temp, kc, ao) = setup();
    cs_bare(temp.path(), &kc, &ao)
        .env("USER", "  ")
        .env("USERNAME", "alice")
        .args(["-n", "ns1", "utv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ns1/api-cluster-example-com/alice"));
}

#[test]
fn missing_operator_identity_exits_fourteen() {
    let (temp, kc, ao) = setup();
    cs_bare(temp.path(), &kc, &ao)
        .arg("utv")
        .assert()
        .code(14)
        .stderr(predicate::str::contains("operator identity unavailable"));
    assert_eq!(fs::read_to_string(&kc).unwrap(), KUBECONFIG);
}
