//! CLI integration tests
//!
//! Tests the command-line interface using assert_cmd

mod common;

use predicates::prelude::*;

use common::CliFixture;

// ─────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_help_flag() {
    CliFixture::new()
        .cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("module"))
        .stdout(predicate::str::contains("memorial"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_command() {
    CliFixture::new()
        .cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tetrahedron"))
        .stdout(predicate::str::contains("Build Information"))
        .stdout(predicate::str::contains("Git Hash"));
}

#[test]
fn test_config_show_default() {
    CliFixture::new()
        .cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[protocol.stabilization]"))
        .stdout(predicate::str::contains("death = 90"));
}

// ─────────────────────────────────────────────────────────────────
// Module Command Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_status_with_empty_state() {
    CliFixture::new()
        .cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No groups yet"));
}

#[test]
fn test_module_create_and_show() {
    let fixture = CliFixture::new();
    fixture.create_family("okafor");
    assert!(fixture.state_path().exists());

    fixture
        .cmd()
        .args(["module", "show", "--group", "okafor"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Family (okafor) [family]"))
        .stdout(predicate::str::contains("State: active"))
        .stdout(predicate::str::contains("Dele"))
        .stdout(predicate::str::contains("1.00"));

    fixture
        .cmd()
        .args(["module", "edge", "--group", "okafor"])
        .args(["--from", "emotional", "--to", "technical", "--strength", "-2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("strength set to 0.00"));
}

#[test]
fn test_module_create_requires_four_vertices() {
    CliFixture::new()
        .cmd()
        .args(["module", "create", "--group", "trio", "--name", "Trio"])
        .args(["--vertex", "a:Ann:emotional"])
        .args(["--vertex", "b:Ben:practical"])
        .args(["--vertex", "c:Cy:technical"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("exactly 4"));
}

#[test]
fn test_module_create_refuses_duplicate_group() {
    let fixture = CliFixture::new();
    fixture.create_family("okafor");

    fixture
        .cmd()
        .args(["module", "create", "--group", "okafor", "--name", "Again"])
        .args(["--vertex", "a:Ann:emotional"])
        .args(["--vertex", "b:Ben:practical"])
        .args(["--vertex", "c:Cy:technical"])
        .args(["--vertex", "d:Di:philosophical"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn test_module_show_unknown_group() {
    CliFixture::new()
        .cmd()
        .args(["module", "show", "--group", "nobody"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No module for group 'nobody'"));
}

// ─────────────────────────────────────────────────────────────────
// Memorial Command Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_memorial_lifecycle() {
    let fixture = CliFixture::new();
    fixture.create_family("okafor");

    fixture
        .cmd()
        .args(["memorial", "mark", "--group", "okafor", "--vertex", "emotional"])
        .args(["--loss-type", "drift", "--loss-date", "2020-01-01"])
        .args(["--contribution", "Sunday dinners"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Ada is now a memorial"))
        .stdout(predicate::str::contains("practical, technical, philosophical"))
        .stdout(predicate::str::contains("Minimum stabilization: 21 days"));

    fixture
        .cmd()
        .args(["memorial", "check", "--group", "okafor"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Stable: yes"));

    // one dissent blocks and nothing is saved
    fixture
        .cmd()
        .args(["memorial", "vote", "--group", "okafor"])
        .args(["--vote", "practical=ready"])
        .args(["--vote", "technical=not-ready"])
        .assert()
        .failure()
        .code(50)
        .stderr(predicate::str::contains("technical"));

    fixture
        .cmd()
        .args(["memorial", "vote", "--group", "okafor", "--unanimous"])
        .args(["--vote", "practical=ready"])
        .args(["--vote", "technical=ready"])
        .args(["--vote", "philosophical=ready"])
        .args(["--prefer", "emotional"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ready to welcome a new fourth"));

    fixture
        .cmd()
        .args(["memorial", "message", "--group", "okafor", "--vertex", "emotional"])
        .args(["--author", "practical", "--text", "We still set your place"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Message left for Ada (1 total)"));

    fixture
        .cmd()
        .args(["memorial", "list", "--group", "okafor"])
        .assert()
        .success()
        .stdout(predicate::str::contains("replacement-allowed"))
        .stdout(predicate::str::contains("State: replacement-ready"));

    fixture
        .cmd()
        .args(["memorial", "ghost", "--group", "okafor", "--vertex", "emotional"])
        .assert()
        .success()
        .stdout(predicate::str::diff("no\n"));

    fixture
        .cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("replacement-ready"));
}

#[test]
fn test_unanimous_vote_counts_cast_votes() {
    let fixture = CliFixture::new();
    fixture.create_family("okafor");

    fixture
        .cmd()
        .args(["memorial", "mark", "--group", "okafor", "--vertex", "emotional"])
        .args(["--loss-type", "drift", "--loss-date", "2020-01-01"])
        .assert()
        .success();

    fixture
        .cmd()
        .args(["memorial", "vote", "--group", "okafor", "--unanimous"])
        .args(["--vote", "practical=ready"])
        .args(["--vote", "technical=ready"])
        .assert()
        .success();
}

#[test]
fn test_restore_after_death_is_refused() {
    let fixture = CliFixture::new();
    fixture.create_family("okafor");

    fixture
        .cmd()
        .args(["memorial", "mark", "--group", "okafor", "--vertex", "philosophical"])
        .args(["--loss-type", "death", "--loss-date", "2024-03-10", "--preserve"])
        .assert()
        .success();

    fixture
        .cmd()
        .args(["memorial", "restore", "--group", "okafor", "--vertex", "philosophical"])
        .assert()
        .failure()
        .code(50);

    fixture
        .cmd()
        .args(["memorial", "ghost", "--group", "okafor", "--vertex", "philosophical"])
        .assert()
        .success()
        .stdout(predicate::str::diff("yes\n"));
}

#[test]
fn test_restore_after_departure() {
    let fixture = CliFixture::new();
    fixture.create_family("okafor");

    fixture
        .cmd()
        .args(["memorial", "mark", "--group", "okafor", "--vertex", "practical"])
        .args(["--loss-type", "departure", "--loss-date", "2024-03-10"])
        .assert()
        .success();

    fixture
        .cmd()
        .args(["memorial", "restore", "--group", "okafor", "--vertex", "practical"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Bayo has been restored"));

    fixture
        .cmd()
        .args(["memorial", "list", "--group", "okafor"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No memorials for group okafor"));
}

#[test]
fn test_check_without_triad() {
    let fixture = CliFixture::new();
    fixture.create_family("okafor");

    fixture
        .cmd()
        .args(["memorial", "check", "--group", "okafor"])
        .assert()
        .failure()
        .code(50);
}

#[test]
fn test_mark_rejects_unknown_loss_type() {
    let fixture = CliFixture::new();
    fixture.create_family("okafor");

    fixture
        .cmd()
        .args(["memorial", "mark", "--group", "okafor", "--vertex", "practical"])
        .args(["--loss-type", "vanished", "--loss-date", "2024-03-10"])
        .assert()
        .failure()
        .code(2);
}
