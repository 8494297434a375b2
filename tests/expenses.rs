mod common;

use std::fs;

use assert_cmd::Command;
use predicates::str::contains;

use common::{TestWorkspace, fixture_path};

fn ledger_cmd() -> Command {
    Command::cargo_bin("rental-ledger").expect("binary exists")
}

#[test]
fn ledger_is_cleaned_netted_and_written() {
    let ws = TestWorkspace::new();
    let output = ws.path().join("netted.csv");

    ledger_cmd()
        .args([
            "expenses",
            "-i",
            fixture_path("expense_ledger.csv").to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ])
        .assert()
        .success();

    let contents = fs::read_to_string(&output).expect("read netted ledger");
    let lines: Vec<&str> = contents.lines().collect();
    // Two cost lines survive; the VAT line and the amountless line do not
    // appear as rows of their own.
    assert_eq!(lines.len(), 3);
    assert_eq!(
        lines[0],
        "date,account_code,description,sector,property,total_amount,net_amount,vat_amount"
    );

    let detersivi: Vec<&str> = lines[1].split(',').collect();
    assert_eq!(detersivi[0], "2024-03-02");
    assert_eq!(detersivi[1], "40.01.02");
    assert_eq!(detersivi[3], "PULIZIE");
    assert_eq!(detersivi[4], "A1");
    assert_eq!(detersivi[5], "122.0");
    assert_eq!(detersivi[6], "100.0");
    assert_eq!(detersivi[7], "22.0");

    let bolletta: Vec<&str> = lines[2].split(',').collect();
    assert_eq!(bolletta[3], "UTENZE");
    assert_eq!(bolletta[6], "50.0");
    assert_eq!(bolletta[7], "0.0");
}

#[test]
fn sector_table_is_printed_on_request() {
    let ws = TestWorkspace::new();
    let output = ws.path().join("netted.csv");

    ledger_cmd()
        .args([
            "expenses",
            "-i",
            fixture_path("expense_ledger.csv").to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--table",
        ])
        .assert()
        .success()
        .stdout(contains("PULIZIE"))
        .stdout(contains("100.0"));
}
