//! CLI tests
mod common;

use assert_cmd::Command;
use predicates::prelude::*;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use reqchain::cache::{CacheSetOptions, CacheStore, FileCacheStore};

use common::{chained_collection, reqchain, MockEnvironment};

const OFFLINE: &str = r#"type: collection.insomnia.rest/5.0
name: Offline
collection:
  - name: Users
    meta: { id: fld_users }
    headers:
      - { name: Accept, value: application/json }
    children:
      - name: List
        meta: { id: req_list }
        url: "{{ _.host }}/users"
        method: GET
      - name: Create
        meta: { id: req_create }
        url: "{{ _.host }}/users"
        method: POST
        body:
          mimeType: application/json
          text: '{"name": "{{ _.user }}"}'
environments:
  name: Base
  data:
    host: api.example.com
    user: alice
"#;

fn cli(env: &MockEnvironment) -> Command {
    let mut cmd = Command::cargo_bin("reqchain").unwrap();
    cmd.env("REQCHAIN_CONFIG_DIR", env.config_path())
        .env("NO_COLOR", "1")
        .env_remove("REQCHAIN_LOG")
        .env_remove("RUST_LOG");
    cmd
}

// ============================================================================
// Listing and Dry Runs
// ============================================================================

#[test]
fn test_list_requests() {
    let env = MockEnvironment::new();
    let collection = env.write_collection(OFFLINE);

    cli(&env)
        .arg(&collection)
        .arg("--list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Users/List"))
        .stdout(predicate::str::contains("req_create"));
}

#[test]
fn test_dry_run_prints_resolved_request() {
    let env = MockEnvironment::new();
    let collection = env.write_collection(OFFLINE);
    let collection = collection.to_str().unwrap();

    let r = reqchain(&[collection, "Users/Create", "--dry-run", "--var", "user=bob"], &env);

    assert_eq!(r.exit_code, 0, "stderr: {}", r.stderr);
    let json = r.json().expect("resolved request as JSON");
    assert_eq!(json["url"], "http://api.example.com/users");
    assert_eq!(json["method"], "POST");
    assert_eq!(json["headers"][0]["name"], "Accept");
    assert!(r.contains(r#"{\"name\": \"bob\"}"#));
}

#[test]
fn test_dry_run_by_id_with_dotenv_beside_collection() {
    let env = MockEnvironment::new();
    let collection = env.write_collection(OFFLINE);
    env.write_file(".env", "host=staging.example.com\n");

    let r = reqchain(&[collection.to_str().unwrap(), "--id", "req_list", "--dry-run"], &env);

    assert_eq!(r.exit_code, 0, "stderr: {}", r.stderr);
    assert!(r.contains("http://staging.example.com/users"));
}

#[test]
fn test_dry_run_by_id_picks_exact_request() {
    let env = MockEnvironment::new();
    let collection = env.write_collection(
        r#"name: Dupes
collection:
  - name: Ping
    meta: { id: req_one }
    url: http://api.example.com/one
    method: GET
  - name: Ping
    meta: { id: req_two }
    url: http://api.example.com/two
    method: GET
  - name: GET /users
    meta: { id: req_slash }
    url: http://api.example.com/users
    method: GET
"#,
    );
    let collection = collection.to_str().unwrap();

    let r = reqchain(&[collection, "--id", "req_two", "--dry-run"], &env);
    assert_eq!(r.exit_code, 0, "stderr: {}", r.stderr);
    assert_eq!(r.json().expect("resolved request as JSON")["url"], "http://api.example.com/two");

    let r = reqchain(&[collection, "--id", "req_slash", "--dry-run"], &env);
    assert_eq!(r.exit_code, 0, "stderr: {}", r.stderr);
    assert!(r.contains("http://api.example.com/users"));
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_unknown_request_path() {
    let env = MockEnvironment::new();
    let collection = env.write_collection(OFFLINE);

    cli(&env)
        .arg(&collection)
        .arg("Users/Missing")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Request not found"));
}

#[test]
fn test_no_request_given() {
    let env = MockEnvironment::new();
    let collection = env.write_collection(OFFLINE);

    cli(&env)
        .arg(&collection)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no request given"));
}

#[test]
fn test_strict_refuses_to_send_with_undefined_variables() {
    let env = MockEnvironment::new();
    let collection = env.write_collection(&OFFLINE.replace("{{ _.user }}", "{{ _.nobody }}"));

    let r = reqchain(&[collection.to_str().unwrap(), "Users/Create", "--strict", "--dry-run"], &env);

    assert_eq!(r.exit_code, 1);
    assert!(r.stderr.contains("nobody"), "stderr: {}", r.stderr);
    assert!(r.stdout.is_empty());
}

#[test]
fn test_lenient_keeps_undefined_variables() {
    let env = MockEnvironment::new();
    let collection = env.write_collection(&OFFLINE.replace("{{ _.user }}", "{{ _.nobody }}"));

    let r = reqchain(&[collection.to_str().unwrap(), "Users/Create", "--dry-run"], &env);

    assert_eq!(r.exit_code, 0);
    assert!(r.contains("{{ _.nobody }}"));
}

// ============================================================================
// Cache Management
// ============================================================================

#[test]
fn test_clear_cache_with_prefix() {
    let env = MockEnvironment::new();
    env.write_config("[storage]\ncache = \"file\"\n");
    let collection = env.write_collection(OFFLINE);

    let store = FileCacheStore::new(env.config_path().join("cache.json"));
    store.set("response:req_auth:body:-", "T1", CacheSetOptions::default()).unwrap();
    store.set("prompt:otp", "123", CacheSetOptions::default()).unwrap();

    cli(&env)
        .arg(&collection)
        .args(["--clear-cache", "response:"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared 1 cached value(s)"));

    assert!(store.get("response:req_auth:body:-").unwrap().is_none());
    assert!(store.get("prompt:otp").unwrap().is_some());
}

// ============================================================================
// Network
// ============================================================================

#[tokio::test]
async fn test_chained_token_persists_across_runs() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "T1"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"name": "alice"})))
        .expect(2)
        .mount(&server)
        .await;

    let env = MockEnvironment::new();
    env.write_config("[storage]\ncache = \"file\"\n");
    let collection = env.write_collection(&chained_collection(&server.uri()));
    let collection = collection.to_str().unwrap();

    for _ in 0..2 {
        let r = reqchain(&[collection, "Auth/Profile"], &env);
        assert_eq!(r.exit_code, 0, "stderr: {}", r.stderr);
        assert!(r.contains("HTTP 200 OK"));
        assert!(r.contains("\"name\": \"alice\""));
    }
}

#[tokio::test]
async fn test_check_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let env = MockEnvironment::new();
    let collection = env.write_collection(&chained_collection(&server.uri()));
    let collection = collection.to_str().unwrap();

    let r = reqchain(&[collection, "Auth/Login"], &env);
    assert_eq!(r.exit_code, 0);
    assert!(r.contains("HTTP 404"));

    let r = reqchain(&[collection, "Auth/Login", "--check-status"], &env);
    assert_eq!(r.exit_code, 1);
}
