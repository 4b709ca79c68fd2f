#![allow(deprecated)] // TODO: cargo_bin → cargo_bin_cmd! へ移行

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// 設定ファイルや環境に左右されない clusterflow コマンド
fn isolated(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("clusterflow").unwrap();
    cmd.current_dir(dir.path())
        .env("XDG_CONFIG_HOME", dir.path())
        .env("HOME", dir.path())
        .env_remove("CLUSTERFLOW_CONFIG_PATH")
        .env_remove("CLUSTERFLOW_PROJECT_DIR")
        .env_remove("OVH_ENDPOINT")
        .env_remove("OVH_ACCESS_TOKEN")
        .env_remove("OVH_CLOUD_PROJECT_SERVICE")
        .env_remove("RUST_LOG");
    cmd
}

/// CLIヘルプが正しく表示されることを確認
#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("clusterflow").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("user"))
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("--project-dir"));
}

/// バージョン表示が正しく動作することを確認
#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("clusterflow").unwrap();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("clusterflow"));
}

/// user create のヘルプに必須引数が並ぶことを確認
#[test]
fn test_user_create_help() {
    let mut cmd = Command::cargo_bin("clusterflow").unwrap();
    cmd.args(["user", "create", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--cluster-id"))
        .stdout(predicate::str::contains("--name"))
        .stdout(predicate::str::contains("PATTERN=PERMISSION"));
}

/// 不正なACLは引数解析の段階で拒否される
#[test]
fn test_user_create_rejects_malformed_acl() {
    let dir = TempDir::new().unwrap();
    isolated(&dir)
        .args([
            "user",
            "create",
            "--cluster-id",
            "clust1",
            "--name",
            "alice",
            "--acl",
            "no-permission",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("PATTERN=PERMISSION"));
}

/// 取り込みIDの書式エラーはトークンなしでも報告される
#[test]
fn test_user_import_rejects_malformed_id() {
    let dir = TempDir::new().unwrap();
    isolated(&dir)
        .args(["user", "import", "svc1/clust1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("svc1/clust1"));
}

/// トークンがない場合はAPIを呼ぶ前に失敗する
#[test]
fn test_user_delete_requires_token() {
    let dir = TempDir::new().unwrap();
    isolated(&dir)
        .args(["user", "delete", "svc1/clust1/user1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("OVH_ACCESS_TOKEN"));
}

/// 記録がなければ一覧は空
#[test]
fn test_user_list_empty() {
    let dir = TempDir::new().unwrap();
    isolated(&dir)
        .args(["user", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("記録されているユーザーはありません"));
}

/// 記録されていないユーザーの表示はエラー
#[test]
fn test_user_show_unknown_key() {
    let dir = TempDir::new().unwrap();
    isolated(&dir)
        .args(["user", "show", "svc1/clust1/user1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("opensearch-user:svc1/clust1/user1"));
}

/// 状態ファイルに記録されたユーザーを一覧・表示できる
#[test]
fn test_user_list_and_show_from_state() {
    let dir = TempDir::new().unwrap();
    let state_dir = dir.path().join(".clusterflow");
    std::fs::create_dir(&state_dir).unwrap();
    std::fs::write(
        state_dir.join("state.json"),
        r#"{
  "version": 1,
  "updated_at": "2024-05-01T08:00:00Z",
  "resources": {
    "opensearch-user:svc1/clust1/user1": {
      "id": "svc1/clust1/user1",
      "resource_type": "opensearch-user",
      "status": "ready",
      "attributes": {
        "service_name": "svc1",
        "cluster_id": "clust1",
        "user_id": "user1",
        "name": "alice",
        "acls": [{"pattern": "*", "permission": "all"}],
        "status": "READY",
        "password": "s3cr3t"
      },
      "tracked_since": "2024-05-01T08:00:00Z",
      "updated_at": "2024-05-01T08:00:00Z"
    }
  }
}"#,
    )
    .unwrap();

    isolated(&dir)
        .args(["user", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("svc1/clust1/user1"))
        .stdout(predicate::str::contains("alice"));

    isolated(&dir)
        .args(["user", "show", "svc1/clust1/user1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("*=all"))
        .stdout(predicate::str::contains("s3cr3t").not());

    isolated(&dir)
        .args(["user", "show", "svc1/clust1/user1", "--show-password"])
        .assert()
        .success()
        .stdout(predicate::str::contains("s3cr3t"));
}

/// config はトークンを伏せて表示する
#[test]
fn test_config_redacts_token() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("clusterflow.yaml"),
        "endpoint: ovh-ca\ntoken: very-secret\nservice_name: svc1\n",
    )
    .unwrap();

    isolated(&dir)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("clusterflow.yaml"))
        .stdout(predicate::str::contains("svc1"))
        .stdout(predicate::str::contains("very-secret").not());
}

/// 設定ファイルの誤りは報告される
#[test]
fn test_config_rejects_invalid_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("clusterflow.yaml"),
        "poll:\n  multiplier: 0.1\n",
    )
    .unwrap();

    isolated(&dir).arg("config").assert().failure();
}
