use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

fn edgecfg() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("edgecfg"));
    cmd.env_remove("EDGECFG_USER")
        .env_remove("EDGECFG_PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn export_from_file_writes_user_records() {
    let dir = tempdir().expect("tempdir");

    edgecfg()
        .arg("export")
        .arg("--edge")
        .arg("edge-01")
        .arg("--from-file")
        .arg(fixture("fixtures/edge_v1.xml"))
        .arg("--output-dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "nat_rules=2 firewall_rules=1 static_routes=1 default_route=yes",
        ));

    let nat = fs::read_to_string(dir.path().join("edge-01_nat_rules.csv")).expect("nat csv");
    let mut lines = nat.lines();
    assert_eq!(
        lines.next(),
        Some(
            "rule_id,action,interface_id,interface_name,interface_href,original_address,\
             original_port,translated_address,translated_port,protocol,enabled,logging,description"
        )
    );
    assert_eq!(
        lines.next(),
        Some("196609,DNAT,0,,,203.0.113.10,443,10.0.0.10,8443,TCP,true,false,web")
    );
    assert!(!nat.contains("196610"));

    let firewall =
        fs::read_to_string(dir.path().join("edge-01_firewall_rules.csv")).expect("firewall csv");
    assert!(firewall.contains("10.0.0.1 10.0.0.2"));
    assert!(firewall.contains("tcp:80:any udp:53:any"));

    let routes =
        fs::read_to_string(dir.path().join("edge-01_static_routes.csv")).expect("routes csv");
    assert!(routes.contains("branch,1,172.16.0.0/16,10.0.0.254,1,1500"));
    assert!(!routes.contains("172.17.0.0/16"));

    let manifest = fs::read_to_string(dir.path().join("edge-01_export.toml")).expect("manifest");
    assert!(manifest.contains("schema = \"v1\""));
}

#[test]
fn export_v2_json_summary_has_no_default_route() {
    let dir = tempdir().expect("tempdir");

    edgecfg()
        .arg("export")
        .arg("--edge")
        .arg("edge-01")
        .arg("--schema")
        .arg("v2")
        .arg("--from-file")
        .arg(fixture("fixtures/edge_v2.xml"))
        .arg("--output-dir")
        .arg(dir.path())
        .arg("--format")
        .arg("json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"default_route\": false"))
        .stdout(predicate::str::contains("\"nat_rules\": 1"));

    assert!(!dir.path().join("edge-01_default_route.csv").exists());
    let nat = fs::read_to_string(dir.path().join("edge-01_nat_rules.csv")).expect("nat csv");
    assert!(nat.contains("9f1c,ext-net,https://vcd.example/api/admin/network/9f1c"));
}

#[test]
fn export_refuses_output_path_that_is_a_file() {
    let dir = tempdir().expect("tempdir");
    let file = dir.path().join("taken");
    fs::write(&file, "not a directory").expect("write");

    edgecfg()
        .arg("export")
        .arg("--edge")
        .arg("edge-01")
        .arg("--from-file")
        .arg(fixture("fixtures/edge_v1.xml"))
        .arg("--output-dir")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a directory"));
}

#[test]
fn export_without_credentials_fails_before_any_request() {
    let dir = tempdir().expect("tempdir");

    edgecfg()
        .arg("export")
        .arg("--edge")
        .arg("edge-01")
        .arg("--host")
        .arg("vcd.invalid")
        .arg("--org")
        .arg("acme")
        .arg("--user")
        .arg("admin")
        .arg("--output-dir")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("--password"));
}

#[test]
fn export_rejects_edge_name_with_path_separator() {
    let dir = tempdir().expect("tempdir");

    edgecfg()
        .arg("export")
        .arg("--edge")
        .arg("../escaped")
        .arg("--from-file")
        .arg(fixture("fixtures/edge_v1.xml"))
        .arg("--output-dir")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used as a file name prefix"));

    assert!(!dir.path().join("../escaped_nat_rules.csv").exists());
}
