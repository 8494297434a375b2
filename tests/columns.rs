mod common;

use assert_cmd::Command;
use predicates::str::contains;

use common::fixture_path;

#[test]
fn columns_lists_the_canonical_contract() {
    Command::cargo_bin("rental-ledger")
        .expect("binary exists")
        .args([
            "columns",
            "-s",
            fixture_path("short_stay.yml").to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(contains("apartment_id"))
        .stdout(contains("date(%d/%m/%Y)"))
        .stdout(contains("numeric"));
}

#[test]
fn columns_rejects_a_broken_schema() {
    let ws = common::TestWorkspace::new();
    let broken = ws.write("broken.yml", "columns:\n  - source: x\n");

    Command::cargo_bin("rental-ledger")
        .expect("binary exists")
        .args(["columns", "-s", broken.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("failed to load schema"));
}
