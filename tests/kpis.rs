mod common;

use std::collections::HashMap;
use std::fs;

use assert_cmd::Command;
use predicates::str::contains;

use common::{TestWorkspace, fixture_path};

fn ledger_cmd() -> Command {
    Command::cargo_bin("rental-ledger").expect("binary exists")
}

fn ingest_fixtures(ws: &TestWorkspace) -> std::path::PathBuf {
    let input_dir = ws.path().join("exports");
    fs::create_dir(&input_dir).expect("input dir");
    fs::copy(fixture_path("stays_march.csv"), input_dir.join("2024-03.csv")).unwrap();
    fs::copy(fixture_path("stays_april.csv"), input_dir.join("2024-04.csv")).unwrap();
    let canonical = ws.path().join("canonical.csv");
    ledger_cmd()
        .args([
            "ingest",
            "-i",
            input_dir.to_str().unwrap(),
            "-s",
            fixture_path("short_stay.yml").to_str().unwrap(),
            "-o",
            canonical.to_str().unwrap(),
            "--sheet",
            "0",
        ])
        .assert()
        .success();
    canonical
}

fn load_snapshot(path: &std::path::Path) -> HashMap<String, String> {
    let contents = fs::read_to_string(path).expect("read snapshot");
    let mut lines = contents.lines();
    let names = lines.next().expect("names row").split(',');
    let values = lines.next().expect("values row").split(',');
    names
        .zip(values)
        .map(|(n, v)| (n.to_string(), v.to_string()))
        .collect()
}

#[test]
fn full_snapshot_combines_every_input() {
    let ws = TestWorkspace::new();
    let canonical = ingest_fixtures(&ws);

    let netted = ws.path().join("netted.csv");
    ledger_cmd()
        .args([
            "expenses",
            "-i",
            fixture_path("expense_ledger.csv").to_str().unwrap(),
            "-o",
            netted.to_str().unwrap(),
        ])
        .assert()
        .success();

    let snapshot_path = ws.path().join("kpis.csv");
    ledger_cmd()
        .args([
            "kpis",
            "-i",
            canonical.to_str().unwrap(),
            "--availability",
            fixture_path("availability.csv").to_str().unwrap(),
            "--expenses",
            netted.to_str().unwrap(),
            "--properties",
            fixture_path("properties.csv").to_str().unwrap(),
            "--from",
            "2024-03-01",
            "--to",
            "2024-03-31",
            "--depreciation",
            "100",
            "-o",
            snapshot_path.to_str().unwrap(),
        ])
        .assert()
        .success();

    let snapshot = load_snapshot(&snapshot_path);
    assert_eq!(snapshot["rental_revenue_net"], "2225.0");
    assert_eq!(snapshot["cleaning_revenue_net"], "181.97");
    assert_eq!(snapshot["total_revenue"], "2406.97");
    assert_eq!(snapshot["ota_commission_net"], "150.0");

    assert_eq!(snapshot["n_bookings"], "3.0");
    assert_eq!(snapshot["occupied_nights"], "8.0");
    assert_eq!(snapshot["available_nights"], "46.0");
    assert_eq!(snapshot["free_nights"], "38.0");
    assert_eq!(snapshot["occupancy_rate"], "17.39");

    // PM VAT owed against commission-side VAT; purchase VAT is reported
    // separately as vat_expenses and never folded into the settlement.
    assert_eq!(snapshot["vat_debit"], "75.0");
    assert_eq!(snapshot["vat_credit"], "33.0");
    assert_eq!(snapshot["vat_balance"], "42.0");
    assert_eq!(snapshot["vat_expenses"], "22.0");

    // Per-stay presets (50 + 50 + 50), netted purchases, commissions.
    assert_eq!(snapshot["stay_costs"], "150.0");
    assert_eq!(snapshot["fixed_costs"], "150.0");
    assert_eq!(snapshot["cleaning_costs"], "100.0");
    assert_eq!(snapshot["variable_costs"], "450.0");
    assert_eq!(snapshot["total_costs"], "600.0");
    assert_eq!(snapshot["ebitda"], "1806.97");
    assert_eq!(snapshot["mol"], "1706.97");
}

#[test]
fn snapshot_without_side_inputs_degrades_to_revenue_kpis() {
    let ws = TestWorkspace::new();
    let canonical = ingest_fixtures(&ws);
    let snapshot_path = ws.path().join("kpis.csv");

    ledger_cmd()
        .args([
            "kpis",
            "-i",
            canonical.to_str().unwrap(),
            "--from",
            "2024-03-01",
            "--to",
            "2024-03-31",
            "--depreciation",
            "0",
            "-o",
            snapshot_path.to_str().unwrap(),
        ])
        .assert()
        .success();

    let snapshot = load_snapshot(&snapshot_path);
    assert_eq!(snapshot["available_nights"], "0.0");
    assert_eq!(snapshot["occupancy_rate"], "0.0");
    assert_eq!(snapshot["fixed_costs"], "0.0");
    assert_eq!(snapshot["stay_costs"], "0.0");
    // Costs reduce to the commissions.
    assert_eq!(snapshot["total_costs"], "300.0");
}

#[test]
fn snapshot_prints_a_table_when_no_output_is_given() {
    let ws = TestWorkspace::new();
    let canonical = ingest_fixtures(&ws);

    ledger_cmd()
        .args([
            "kpis",
            "-i",
            canonical.to_str().unwrap(),
            "--from",
            "2024-03-01",
            "--to",
            "2024-03-31",
        ])
        .assert()
        .success()
        .stdout(contains("rental_revenue_net"))
        .stdout(contains("2225.0"));
}

#[test]
fn inverted_window_is_rejected() {
    let ws = TestWorkspace::new();
    let canonical = ingest_fixtures(&ws);

    ledger_cmd()
        .args([
            "kpis",
            "-i",
            canonical.to_str().unwrap(),
            "--from",
            "2024-03-31",
            "--to",
            "2024-03-01",
        ])
        .assert()
        .failure()
        .stderr(contains("precedes"));
}
