use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A `cora` invocation with HOME pointed at a scratch directory.
fn cora(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("cora").unwrap();
    cmd.env("HOME", home.path()).env_remove("CORA_LOG");
    cmd
}

fn initialized() -> TempDir {
    let home = tempfile::tempdir().unwrap();
    let data_dir = home.path().join("data");
    cora(&home)
        .args(["init", "--data-dir", data_dir.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized cora"));
    home
}

#[test]
fn commands_require_init() {
    let home = tempfile::tempdir().unwrap();
    cora(&home)
        .args(["expense", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cora init"));
}

#[test]
fn add_expense_is_auto_categorized() {
    let home = initialized();
    cora(&home)
        .args([
            "expense", "add", "--vendor", "Staples", "--description", "office supplies", "--amount",
            "85.47",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("$85.47"))
        .stdout(predicate::str::contains("Office Supplies"));
}

#[test]
fn empty_description_is_a_validation_error() {
    let home = initialized();
    cora(&home)
        .args(["expense", "add", "--description", "", "--amount", "1.00"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid expense"));
}

#[test]
fn negative_amount_is_a_validation_error() {
    let home = initialized();
    cora(&home)
        .args(["expense", "add", "--description", "paper", "--amount", "-3.00"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("negative"));
}

#[test]
fn unknown_vendor_prompts_for_manual_category() {
    let home = initialized();
    cora(&home)
        .args([
            "expense", "add", "--vendor", "Unknown Vendor XYZ", "--description", "miscellaneous",
            "--amount", "5.00",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("No confident category"));
}

#[test]
fn status_counts_only_the_acting_user() {
    let home = initialized();
    for _ in 0..2 {
        cora(&home)
            .args(["--user", "ana", "expense", "add", "--description", "mystery", "--amount", "3.00"])
            .assert()
            .success();
    }
    cora(&home)
        .args(["--user", "ana", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Expenses:       2"))
        .stdout(predicate::str::contains("Uncategorized:  2"));
    cora(&home)
        .args(["--user", "ben", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Expenses:       0"))
        .stdout(predicate::str::contains("Uncategorized:  0"));
}

#[test]
fn rules_add_rejects_out_of_range_weight() {
    let home = initialized();
    cora(&home)
        .args(["rules", "add", "sawblade", "--category", "Tools & Equipment", "--weight", "60"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Rule weight must be between -20 and 20"));
    cora(&home)
        .args(["rules", "delete", "99999"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No rule with ID 99999"));
}

#[test]
fn corrections_teach_the_categorizer() {
    let home = initialized();
    for id in 1..=3 {
        cora(&home)
            .args(["expense", "add", "--vendor", "Chipotle", "--description", "crew order", "--amount", "42.10"])
            .assert()
            .success();
        cora(&home)
            .args(["expense", "correct", &id.to_string(), "--category", "Meals & Entertainment"])
            .assert()
            .success();
    }
    cora(&home)
        .args(["expense", "add", "--vendor", "Chipotle", "--description", "crew order", "--amount", "38.00"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Meals & Entertainment"));
    cora(&home)
        .args(["patterns"])
        .assert()
        .success()
        .stdout(predicate::str::contains("chipotle"));
}

#[test]
fn patterns_are_per_user() {
    let home = initialized();
    for id in 1..=3 {
        cora(&home)
            .args(["--user", "ana", "expense", "add", "--vendor", "Chipotle", "--description", "crew order", "--amount", "42.10"])
            .assert()
            .success();
        cora(&home)
            .args(["--user", "ana", "expense", "correct", &id.to_string(), "--category", "Meals & Entertainment"])
            .assert()
            .success();
    }
    cora(&home)
        .args(["--user", "ben", "expense", "add", "--vendor", "Chipotle", "--description", "crew order", "--amount", "38.00"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No confident category"));
}

#[test]
fn job_report_shows_margin() {
    let home = initialized();
    cora(&home)
        .args(["jobs", "add", "Miller Deck", "--quote", "10,000.00"])
        .assert()
        .success();
    cora(&home)
        .args([
            "expense", "add", "--vendor", "Home Depot", "--description", "deck boards", "--amount",
            "2500", "--job", "Miller Deck",
        ])
        .assert()
        .success();
    cora(&home)
        .args(["report", "jobs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Miller Deck"))
        .stdout(predicate::str::contains("$2,500.00"))
        .stdout(predicate::str::contains("75.0%"));
}

#[test]
fn import_csv_and_recategorize() {
    let home = initialized();
    let csv = home.path().join("bank.csv");
    std::fs::write(
        &csv,
        "date,vendor,description,amount\n\
         03/01/2025,Lowes,screws,-12.40\n\
         03/02/2025,Ace Hardware,hinges,-8.15\n",
    )
    .unwrap();
    cora(&home)
        .args(["import", csv.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 imported"))
        .stdout(predicate::str::contains("1 categorized"));

    cora(&home)
        .args(["rules", "add", "ace hardware", "--category", "Materials", "--match-type", "vendor"])
        .assert()
        .success();
    cora(&home)
        .args(["categorize"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 categorized, 0 still uncategorized"));

    cora(&home)
        .args(["import", csv.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("already been imported"));
}
