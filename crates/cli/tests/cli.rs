use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

fn fixture_environment() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/environment.json")
}

#[allow(deprecated)]
fn sop_router(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("sop-router").expect("binary");
    cmd.current_dir(workdir).arg("--quiet");
    cmd
}

fn run(workdir: &Path, args: &[&str]) -> (bool, Value) {
    let output = sop_router(workdir).args(args).output().expect("command run");
    let body: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    (output.status.success(), body)
}

fn seeded() -> TempDir {
    let temp = tempdir().unwrap();
    let (ok, body) = run(temp.path(), &["catalog", "init"]);
    assert!(ok, "init failed: {body}");
    temp
}

#[test]
fn init_seeds_samples_into_the_default_location() {
    let temp = seeded();
    assert!(temp.path().join(".sop-router/catalog.json").exists());

    let (ok, body) = run(temp.path(), &["catalog", "list"]);
    assert!(ok);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["data"]["count"], 4);
    assert_eq!(body["data"]["procedures"][0]["id"], "msk-consumer-lag-001");
    assert_eq!(body["data"]["procedures"][0]["steps"], 5);
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let temp = seeded();

    let (ok, body) = run(temp.path(), &["catalog", "init"]);
    assert!(!ok);
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("--force"));

    let (ok, body) = run(temp.path(), &["catalog", "init", "--force"]);
    assert!(ok);
    assert_eq!(body["data"]["report"]["updated"], 4);
}

#[test]
fn match_routes_consumer_lag_with_fixture_environment() {
    let temp = seeded();
    let environment = fixture_environment();

    let (ok, body) = run(
        temp.path(),
        &[
            "match",
            "High consumer lag in payment-consumer service",
            "--environment",
            environment.to_str().unwrap(),
            "--budget-ms",
            "2000",
        ],
    );
    assert!(ok, "{body}");
    let data = &body["data"];
    assert_eq!(data["status"], "success");
    assert_eq!(data["match_type"], "single");
    assert_eq!(data["procedure"]["id"], "msk-consumer-lag-001");
    assert_eq!(data["context"]["complete"], true);
    assert_eq!(data["scores"].as_array().unwrap().len(), 4);
}

#[test]
fn match_merges_supplied_context() {
    let temp = seeded();
    let context = temp.path().join("context.json");
    fs::write(
        &context,
        r#"{
          "affected_services": ["elasticsearch"],
          "metrics": {"elasticsearch.query_latency": 2400.0, "search-api.p99_latency": 1800.0},
          "log_patterns": [
            "elasticsearch: slow query on index orders",
            "search-api: request timeout after 5s"
          ]
        }"#,
    )
    .unwrap();

    let (ok, body) = run(
        temp.path(),
        &[
            "match",
            "We're seeing high latency",
            "--context",
            context.to_str().unwrap(),
        ],
    );
    assert!(ok, "{body}");
    assert_eq!(body["data"]["status"], "disambiguation_needed");
    assert_eq!(body["data"]["suggested_default"], "elasticsearch-perf-001");
    assert_eq!(body["data"]["alternatives"].as_array().unwrap().len(), 2);
}

#[test]
fn no_match_is_not_a_failure() {
    let temp = tempdir().unwrap();
    let (ok, body) = run(temp.path(), &["match", "printer is out of paper"]);
    assert!(ok);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["data"]["status"], "no_match");
}

#[test]
fn unknown_procedure_reports_not_found() {
    let temp = seeded();
    let (ok, body) = run(temp.path(), &["catalog", "get", "does-not-exist"]);
    assert!(!ok);
    assert_eq!(body["error"]["code"], "not_found");
    assert!(body["message"].as_str().unwrap().contains("does-not-exist"));
}

#[test]
fn search_unions_keywords_and_tags() {
    let temp = seeded();
    let (ok, body) = run(
        temp.path(),
        &["catalog", "search", "--keyword", "lag", "--tag", "logstash"],
    );
    assert!(ok);
    let ids: Vec<&str> = body["data"]["procedures"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["msk-consumer-lag-001", "logstash-pipeline-001"]);
}

#[test]
fn export_delete_import_restores_the_catalog() {
    let temp = seeded();
    let dump = temp.path().join("dump.json");

    let (ok, body) = run(temp.path(), &["catalog", "export", dump.to_str().unwrap()]);
    assert!(ok);
    assert_eq!(body["data"]["exported"], 4);

    let (ok, body) = run(temp.path(), &["catalog", "delete", "logstash-pipeline-001"]);
    assert!(ok);
    assert_eq!(body["data"]["deleted"], "logstash-pipeline-001");

    let (ok, body) = run(temp.path(), &["catalog", "import", dump.to_str().unwrap()]);
    assert!(ok);
    assert_eq!(body["data"]["report"]["created"], 1);
    assert_eq!(body["data"]["report"]["skipped"], 3);

    let (_, body) = run(temp.path(), &["catalog", "stats"]);
    assert_eq!(body["data"]["total"], 4);
}

#[test]
fn catalog_flag_overrides_config_file() {
    let temp = tempdir().unwrap();
    let config = temp.path().join("router.toml");
    fs::write(&config, "[catalog]\npath = \"from-config.json\"\n").unwrap();

    let (ok, _) = run(
        temp.path(),
        &[
            "--config",
            config.to_str().unwrap(),
            "--catalog",
            "from-flag.json",
            "catalog",
            "init",
        ],
    );
    assert!(ok);
    assert!(temp.path().join("from-flag.json").exists());
    assert!(!temp.path().join("from-config.json").exists());
}

#[test]
fn invalid_config_names_the_unknown_field() {
    let temp = tempdir().unwrap();
    let config = temp.path().join("router.toml");
    fs::write(&config, "[thresholds]\nacept = 0.6\n").unwrap();

    let (ok, body) = run(
        temp.path(),
        &["--config", config.to_str().unwrap(), "catalog", "list"],
    );
    assert!(!ok);
    assert_eq!(body["error"]["code"], "invalid_config");
    assert!(body["message"].as_str().unwrap().contains("acept"));
}

#[test]
fn stdout_stays_pure_json_when_verbose() {
    let temp = tempdir().unwrap();
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("sop-router").expect("binary");
    cmd.current_dir(temp.path())
        .args(["--verbose", "catalog", "stats"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("{"));
}
