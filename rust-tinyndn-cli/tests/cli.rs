use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn tinyndn() -> Command {
    Command::cargo_bin("tinyndn").unwrap()
}

#[test]
fn test_encode_interest_is_deterministic_with_nonce() {
    // Interest(Name(/a), Nonce 1, Lifetime 4000)
    tinyndn()
        .args(["encode", "interest", "/a", "--nonce", "1"])
        .assert()
        .success()
        .stdout("050f07030801610a04000000010c020fa0\n");
}

#[test]
fn test_encode_then_decode_data() {
    let output = tinyndn()
        .args(["encode", "data", "/hello/world", "hi", "--freshness", "1000"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let hex = String::from_utf8(output.stdout).unwrap();

    tinyndn()
        .args(["decode", hex.trim(), "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"/hello/world\""))
        .stdout(predicate::str::contains("\"freshness_period_ms\": 1000"))
        .stdout(predicate::str::contains("\"content\": \"hi\""));
}

#[test]
fn test_decode_rejects_garbage() {
    tinyndn().args(["decode", "zz"]).assert().failure();
    tinyndn().args(["decode", "4200"]).assert().failure();
}

#[test]
fn test_encode_rejects_bad_name() {
    tinyndn()
        .args(["encode", "interest", "no-slash"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid name"));
}

#[test]
fn test_demo_scenario() {
    tinyndn()
        .arg("demo")
        .assert()
        .success()
        .stdout(predicate::str::contains("upstream received Interest /aaa/bbb/ccc/ddd"))
        .stdout(predicate::str::contains("consumer got: [\"hello from upstream\"]"))
        .stdout(predicate::str::contains("PIT entry pending: false"))
        .stdout(predicate::str::contains("-> CacheHit"))
        .stdout(predicate::str::contains("timeouts [\"/aaa/lost\"]"))
        .stdout(predicate::str::contains("no route for /zzz"))
        .stdout(predicate::str::contains("\"cs_hits\": 1"));
}

#[test]
fn test_run_with_config_file_for_a_moment() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
listen = "127.0.0.1:0"

[[faces]]
name = "peer"
remote = "127.0.0.1:9"

[[routes]]
prefix = "/remote"
face = "peer"

[[serve]]
prefix = "/local"
content = "hello"
"#
    )
    .unwrap();

    tinyndn()
        .args(["run", "--duration", "0", "--config"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"interests_received\": 0"));
}

#[test]
fn test_run_rejects_unknown_route_face() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
listen = "127.0.0.1:0"

[[routes]]
prefix = "/remote"
face = "missing"
"#
    )
    .unwrap();

    tinyndn()
        .args(["run", "--duration", "0", "--config"])
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown face missing"));
}
