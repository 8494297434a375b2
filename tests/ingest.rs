mod common;

use std::fs;

use assert_cmd::Command;
use predicates::str::contains;

use common::{TestWorkspace, fixture_path};

fn sheet_with_rows(rows: &[&str]) -> String {
    let mut sheet = String::from(
        "ESTRATTO CONTO,,,,,,,,\n,,,,,,,,\n,,,,,,,,\n,,,,,,,,\n,,,,,,,,\n\
         Appartamento,Check-in,Check-out,Affitto,Pulizie,Commissione OTA,\
Commissione ITW netta,Commissione proprietario lorda,IVA commissione PM\n",
    );
    for row in rows {
        sheet.push_str(row);
        sheet.push('\n');
    }
    sheet
}

fn ledger_cmd() -> Command {
    Command::cargo_bin("rental-ledger").expect("binary exists")
}

#[test]
fn batch_ingest_deduplicates_and_derives() {
    let ws = TestWorkspace::new();
    let input_dir = ws.path().join("exports");
    fs::create_dir(&input_dir).expect("input dir");
    fs::copy(fixture_path("stays_march.csv"), input_dir.join("2024-03.csv")).unwrap();
    fs::copy(fixture_path("stays_april.csv"), input_dir.join("2024-04.csv")).unwrap();
    let output = ws.path().join("canonical.csv");

    ledger_cmd()
        .args([
            "ingest",
            "-i",
            input_dir.to_str().unwrap(),
            "-s",
            fixture_path("short_stay.yml").to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--sheet",
            "0",
        ])
        .assert()
        .success();

    let contents = fs::read_to_string(&output).expect("read canonical dataset");
    let lines: Vec<&str> = contents.lines().collect();
    // Header plus three distinct stays; the stay repeated across both
    // exports survives only once.
    assert_eq!(lines.len(), 4);

    let headers: Vec<&str> = lines[0].split(',').collect();
    assert!(headers.contains(&"stay_nights"));
    assert!(headers.contains(&"total_margin"));
    assert_eq!(headers[headers.len() - 2], "source_file");
    assert_eq!(headers[headers.len() - 1], "source_file_created_at");

    let margin = headers.iter().position(|h| *h == "total_margin").unwrap();
    let month = headers.iter().position(|h| *h == "month").unwrap();
    let source = headers.iter().position(|h| *h == "source_file").unwrap();
    let first: Vec<&str> = lines[1].split(',').collect();
    assert_eq!(first[0], "A1");
    assert_eq!(first[margin], "831.97");
    assert_eq!(first[month], "2024-03");
    assert_eq!(first[source], "2024-03.csv");

    // The duplicated A2 stay keeps the first export's provenance.
    let second: Vec<&str> = lines[2].split(',').collect();
    assert_eq!(second[0], "A2");
    assert_eq!(second[source], "2024-03.csv");
    let third: Vec<&str> = lines[3].split(',').collect();
    assert_eq!(third[source], "2024-04.csv");
}

#[test]
fn rejected_file_lists_every_violation() {
    let ws = TestWorkspace::new();
    let bad = ws.write(
        "bad.csv",
        &sheet_with_rows(&[
            "A1,01/03/2024,2024-03-04,-1000,100,122,20,80,50",
            "A2,10/03/2024,12/03/2024,5000000,61,61,10,40,25",
        ]),
    );
    let output = ws.path().join("canonical.csv");

    ledger_cmd()
        .args([
            "ingest",
            "-i",
            bad.to_str().unwrap(),
            "-s",
            fixture_path("short_stay.yml").to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--sheet",
            "0",
        ])
        .assert()
        .failure()
        .stderr(contains("negative_value"))
        .stderr(contains("invalid_date"))
        .stderr(contains("value_too_high"));
    assert!(!output.exists());
}

#[test]
fn skip_policy_leaves_failing_files_out() {
    let ws = TestWorkspace::new();
    let input_dir = ws.path().join("exports");
    fs::create_dir(&input_dir).expect("input dir");
    fs::copy(fixture_path("stays_march.csv"), input_dir.join("2024-03.csv")).unwrap();
    fs::write(
        input_dir.join("broken.csv"),
        sheet_with_rows(&["A1,01/03/2024,04/03/2024,-5,0,0,0,0,0"]),
    )
    .unwrap();
    let output = ws.path().join("canonical.csv");

    let mut base = vec![
        "ingest".to_string(),
        "-i".to_string(),
        input_dir.to_str().unwrap().to_string(),
        "-s".to_string(),
        fixture_path("short_stay.yml").to_str().unwrap().to_string(),
        "-o".to_string(),
        output.to_str().unwrap().to_string(),
        "--sheet".to_string(),
        "0".to_string(),
    ];

    ledger_cmd().args(&base).assert().failure();

    base.extend(["--on-error".to_string(), "skip".to_string()]);
    ledger_cmd().args(&base).assert().success();

    let contents = fs::read_to_string(&output).expect("read canonical dataset");
    assert_eq!(contents.lines().count(), 3);
    assert!(!contents.contains("-5"));
}

#[test]
fn zero_revenue_stay_honours_the_division_policy() {
    let ws = TestWorkspace::new();
    let file = ws.write(
        "free-stay.csv",
        &sheet_with_rows(&["A1,01/03/2024,04/03/2024,0,0,12.2,0,0,0"]),
    );
    let output = ws.path().join("canonical.csv");
    let schema = fixture_path("short_stay.yml");
    let base = [
        "ingest",
        "-i",
        file.to_str().unwrap(),
        "-s",
        schema.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--sheet",
        "0",
    ];

    ledger_cmd()
        .args(base)
        .assert()
        .failure()
        .stderr(contains("division by zero"));

    ledger_cmd()
        .args(base)
        .args(["--zero-division", "zero"])
        .assert()
        .success();

    let contents = fs::read_to_string(&output).expect("read canonical dataset");
    let lines: Vec<&str> = contents.lines().collect();
    let headers: Vec<&str> = lines[0].split(',').collect();
    let split = headers
        .iter()
        .position(|h| *h == "ota_commission_on_rental")
        .unwrap();
    let row: Vec<&str> = lines[1].split(',').collect();
    assert_eq!(row[split], "0.0");
}
