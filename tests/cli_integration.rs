//! CLI integration tests for Keyforge.
//!
//! These tests drive the binary against on-disk config repositories. West
//! and the emulator are replaced by small shell scripts.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get the keyforge binary command.
fn keyforge() -> Command {
    let mut cmd = Command::cargo_bin("keyforge").unwrap();
    cmd.arg("--no-color");
    cmd
}

/// Create a temporary directory for test projects.
fn temp_dir() -> TempDir {
    TempDir::new().unwrap()
}

const COMBOS: &str = r#"/ {
    combos {
        compatible = "zmk,combos";
        combo_esc {
            key-positions = <1 2>;
            bindings = <&kp ESC>;
        };
        combo_tab {
            key-positions = <1 3 4>;
            bindings = <&kp TAB>;
        };
    };
};
"#;

const MATRIX: &str = "\
include:
  - board: nice_nano_v2
    shield: corne_left
  - board: nice_nano_v2
    shield: corne_right
  - board: nice_nano_v2
    shield: settings_reset
    broadcast: true
";

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A config repository with a board, two shields, a matrix and combos.
fn project(tmp: &TempDir) -> PathBuf {
    let root = tmp.path().to_path_buf();
    write(&root, "build.yaml", MATRIX);
    write(&root, "config/combos.dtsi", COMBOS);
    write(&root, "boards/arm/nice_nano_v2/nice_nano_v2_defconfig", "");
    for shield in ["corne_left", "corne_right", "settings_reset"] {
        write(&root, &format!("boards/shields/{shield}/{shield}.overlay"), "");
    }
    root
}

#[cfg(unix)]
fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).unwrap();
}

/// A stand-in for `west build` that writes `zephyr/zmk.uf2` to its `-d` dir.
#[cfg(unix)]
const FAKE_WEST: &str = r#"dir=""
board=""
while [ $# -gt 0 ]; do
    case "$1" in
        -d) dir="$2"; shift ;;
        -b) board="$2"; shift ;;
    esac
    shift
done
if [ "$board" = "broken_board" ]; then
    echo "devicetree error: broken" >&2
    exit 2
fi
mkdir -p "$dir/zephyr"
echo firmware > "$dir/zephyr/zmk.uf2""#;

// ============================================================================
// keyforge build --plan
// ============================================================================

#[test]
fn test_plan_lists_resolved_jobs() {
    let tmp = temp_dir();
    let root = project(&tmp);

    let output = keyforge()
        .args(["build", "--plan"])
        .current_dir(&root)
        .output()
        .unwrap();
    assert!(output.status.success());

    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let artifacts: Vec<&str> = plan["jobs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|job| job["artifact"].as_str().unwrap())
        .collect();
    assert_eq!(artifacts, vec!["corne_left-nice_nano_v2", "corne_right-nice_nano_v2"]);

    assert_eq!(plan["limits"]["max_combos_per_key"], 2);
    assert_eq!(plan["limits"]["max_keys_per_combo"], 3);

    // Limits are written before anything is resolved
    let fragment = fs::read_to_string(root.join("config/combos.conf")).unwrap();
    assert!(fragment.contains("CONFIG_ZMK_COMBO_MAX_COMBOS_PER_KEY=2"));
    assert!(fragment.contains("CONFIG_ZMK_COMBO_MAX_KEYS_PER_COMBO=3"));
}

#[test]
fn test_plan_from_subdirectory() {
    let tmp = temp_dir();
    let root = project(&tmp);
    let sub = root.join("config");

    keyforge()
        .args(["build", "--plan", "--skip-limits"])
        .current_dir(&sub)
        .assert()
        .success()
        .stdout(predicate::str::contains("corne_right-nice_nano_v2"));

    assert!(!root.join("config/combos.conf").exists());
}

#[test]
fn test_plan_with_matrix_override() {
    let tmp = temp_dir();
    let root = project(&tmp);
    write(&root, "alt.yaml", "board: [nice_nano_v2]\nshield: [corne_left]\n");

    keyforge()
        .args(["build", "--plan", "--matrix", "alt.yaml"])
        .current_dir(&root)
        .assert()
        .success()
        .stdout(predicate::str::contains("corne_left-nice_nano_v2"))
        .stdout(predicate::str::contains("corne_right").not());
}

#[test]
fn test_unknown_board_fails_with_suggestion() {
    let tmp = temp_dir();
    let root = project(&tmp);
    write(&root, "build.yaml", "include:\n  - board: nice_nano\n    shield: corne_left\n");

    keyforge()
        .args(["build", "--plan"])
        .current_dir(&root)
        .assert()
        .failure()
        .stderr(predicate::str::contains("nice_nano"))
        .stderr(predicate::str::contains("nice_nano_v2"));
}

#[test]
fn test_artifact_collision_fails() {
    let tmp = temp_dir();
    let root = project(&tmp);
    write(
        &root,
        "build.yaml",
        "include:\n  - board: nice_nano_v2\n    shield: corne_left\n  - board: nice_nano_v2\n    shield: corne_right\n    artifact-name: corne_left-nice_nano_v2\n",
    );

    keyforge()
        .args(["build", "--plan"])
        .current_dir(&root)
        .assert()
        .failure()
        .stderr(predicate::str::contains("corne_left-nice_nano_v2"));
}

#[test]
fn test_malformed_combos_abort_the_build() {
    let tmp = temp_dir();
    let root = project(&tmp);
    write(&root, "config/combos.dtsi", "combo_x { key-positions = <1 2; };\n");

    keyforge()
        .args(["build", "--plan"])
        .current_dir(&root)
        .assert()
        .failure();

    assert!(!root.join("config/combos.conf").exists());
}

#[test]
fn test_outside_a_project_fails() {
    let tmp = temp_dir();

    keyforge()
        .args(["build", "--plan"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("build.yaml"));
}

#[test]
fn test_invalid_project_config_fails() {
    let tmp = temp_dir();
    let root = project(&tmp);
    write(&root, "keyforge.toml", "[build]\njobs = \"many\"\n");

    keyforge()
        .args(["build", "--plan"])
        .current_dir(&root)
        .assert()
        .failure()
        .stderr(predicate::str::contains("keyforge.toml"));
}

// ============================================================================
// keyforge build
// ============================================================================

#[cfg(unix)]
#[test]
fn test_build_places_firmware() {
    let tmp = temp_dir();
    let root = project(&tmp);
    write_script(&root.join("tools/west"), FAKE_WEST);
    write(&root, "keyforge.toml", "[build]\nwest = \"tools/west\"\n");

    keyforge()
        .args(["build", "-j", "2"])
        .current_dir(&root)
        .assert()
        .success()
        .stdout(predicate::str::contains("Result: PASSED (2/2 targets built, 0 failed)"));

    assert!(root.join("firmware/corne_left-nice_nano_v2.uf2").is_file());
    assert!(root.join("firmware/corne_right-nice_nano_v2.uf2").is_file());
}

#[cfg(unix)]
#[test]
fn test_build_failure_is_reported_per_job() {
    let tmp = temp_dir();
    let root = project(&tmp);
    write_script(&root.join("tools/west"), FAKE_WEST);
    write(&root, "boards/arm/broken_board/broken_board_defconfig", "");
    write(&root, "keyforge.toml", "[build]\nwest = \"tools/west\"\n");
    write(
        &root,
        "build.yaml",
        "include:\n  - board: broken_board\n  - board: nice_nano_v2\n    shield: corne_left\n",
    );

    let output = keyforge()
        .args(["build", "--format", "json"])
        .current_dir(&root)
        .output()
        .unwrap();
    assert!(!output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["success"], false);
    assert_eq!(report["jobs"][0]["artifact"], "broken_board");
    assert_eq!(report["jobs"][0]["error"], "toolchain");
    assert_eq!(report["jobs"][1]["status"], "ok");
    assert!(root.join("firmware/corne_left-nice_nano_v2.uf2").is_file());
}

#[test]
fn test_build_rejects_unknown_format() {
    let tmp = temp_dir();
    let root = project(&tmp);

    keyforge()
        .args(["build", "--format", "xml"])
        .current_dir(&root)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid output format"));
}

// ============================================================================
// keyforge limits
// ============================================================================

#[test]
fn test_limits_prints_pair() {
    let tmp = temp_dir();
    let root = project(&tmp);

    keyforge()
        .arg("limits")
        .current_dir(&root)
        .assert()
        .success()
        .stdout(predicate::str::contains("CONFIG_ZMK_COMBO_MAX_COMBOS_PER_KEY=2"))
        .stdout(predicate::str::contains("CONFIG_ZMK_COMBO_MAX_KEYS_PER_COMBO=3"));

    assert!(!root.join("config/combos.conf").exists());
}

#[test]
fn test_limits_write_keeps_other_settings() {
    let tmp = temp_dir();
    let root = project(&tmp);
    write(
        &root,
        "config/combos.conf",
        "CONFIG_ZMK_SLEEP=y\nCONFIG_ZMK_COMBO_MAX_COMBOS_PER_KEY=9\n",
    );

    keyforge()
        .args(["limits", "--write"])
        .current_dir(&root)
        .assert()
        .success();

    let fragment = fs::read_to_string(root.join("config/combos.conf")).unwrap();
    assert!(fragment.contains("CONFIG_ZMK_SLEEP=y"));
    assert!(fragment.contains("CONFIG_ZMK_COMBO_MAX_COMBOS_PER_KEY=2"));
    assert!(!fragment.contains("=9"));
}

#[test]
fn test_limits_without_combos_is_disabled() {
    let tmp = temp_dir();
    let root = project(&tmp);
    write(&root, "empty.dtsi", "/ { };\n");

    keyforge()
        .args(["limits", "--combos", "empty.dtsi"])
        .current_dir(&root)
        .assert()
        .success()
        .stdout(predicate::str::contains("CONFIG_ZMK_COMBO_MAX_COMBOS_PER_KEY=0"))
        .stdout(predicate::str::contains("CONFIG_ZMK_COMBO_MAX_KEYS_PER_COMBO=0"));
}

#[test]
fn test_limits_missing_artifact_fails() {
    let tmp = temp_dir();
    let root = project(&tmp);

    keyforge()
        .args(["limits", "--combos", "nowhere.dtsi"])
        .current_dir(&root)
        .assert()
        .failure()
        .stderr(predicate::str::contains("nowhere.dtsi"));
}

// ============================================================================
// keyforge test
// ============================================================================

/// Emulator output for one tap of `A`.
#[cfg(unix)]
const EMULATOR: &str = "\
echo '*** Booting Zephyr OS ***'
echo '[00:00:00.000,000] <dbg> zmk: hid_listener_keycode_pressed: keycode 0x04'
echo '[00:00:00.001,000] <dbg> zmk: kscan_matrix_read: noise'
echo '[00:00:00.002,000] <dbg> zmk: hid_listener_keycode_released: keycode 0x04'";

/// A project with one scenario and a prebuilt emulator executable.
#[cfg(unix)]
fn test_project(tmp: &TempDir) -> PathBuf {
    let root = project(tmp);
    write(&root, "tests/keys/tap/events.patterns", "s/.*hid_listener_keycode_//p\n");
    write_script(&root.join("build/tests/keys/tap/zephyr/zmk.exe"), EMULATOR);
    root
}

#[cfg(unix)]
#[test]
fn test_auto_accept_then_pass() {
    let tmp = temp_dir();
    let root = test_project(&tmp);
    let snapshot = root.join("tests/keys/tap/keycode_events.snapshot");

    // No snapshot yet: the run fails, but the snapshot is written
    keyforge()
        .args(["test", "--no-build", "--auto-accept"])
        .current_dir(&root)
        .assert()
        .failure()
        .stdout(predicate::str::contains("[FAIL] keys/tap"))
        .stdout(predicate::str::contains("snapshot updated"));

    assert_eq!(
        fs::read_to_string(&snapshot).unwrap(),
        "pressed: keycode 0x04\nreleased: keycode 0x04\n"
    );

    keyforge()
        .args(["test", "--no-build"])
        .current_dir(&root)
        .assert()
        .success()
        .stdout(predicate::str::contains("[PASS] keys/tap"));

    let full = fs::read_to_string(root.join("build/tests/keys/tap/keycode_events_full.log")).unwrap();
    assert!(full.contains("zmk: kscan_matrix_read: noise"));
}

#[cfg(unix)]
#[test]
fn test_verbose_echoes_emulator_output() {
    let tmp = temp_dir();
    let root = test_project(&tmp);
    write(
        &root,
        "tests/keys/tap/keycode_events.snapshot",
        "pressed: keycode 0x04\nreleased: keycode 0x04\n",
    );

    keyforge()
        .args(["--verbose", "test", "--no-build"])
        .current_dir(&root)
        .assert()
        .success()
        .stdout(predicate::str::contains("[PASS] keys/tap"))
        .stderr(predicate::str::contains("kscan_matrix_read: noise"));

    keyforge()
        .args(["test", "--no-build"])
        .current_dir(&root)
        .assert()
        .success()
        .stderr(predicate::str::contains("kscan_matrix_read").not());
}

#[cfg(unix)]
#[test]
fn test_mismatch_shows_diff() {
    let tmp = temp_dir();
    let root = test_project(&tmp);
    let snapshot = root.join("tests/keys/tap/keycode_events.snapshot");
    fs::write(&snapshot, "pressed: keycode 0x05\nreleased: keycode 0x04\n").unwrap();

    keyforge()
        .args(["test", "--no-build", "keys/tap"])
        .current_dir(&root)
        .assert()
        .failure()
        .stdout(predicate::str::contains("-pressed: keycode 0x05"))
        .stdout(predicate::str::contains("+pressed: keycode 0x04"))
        .stderr(predicate::str::contains("--auto-accept"));

    // Without --auto-accept the snapshot is untouched
    assert_eq!(
        fs::read_to_string(&snapshot).unwrap(),
        "pressed: keycode 0x05\nreleased: keycode 0x04\n"
    );
}

#[cfg(unix)]
#[test]
fn test_pending_scenario_is_skipped() {
    let tmp = temp_dir();
    let root = test_project(&tmp);
    write(&root, "tests/keys/tap/pending", "");

    keyforge()
        .args(["test", "--no-build"])
        .current_dir(&root)
        .assert()
        .success()
        .stdout(predicate::str::contains("[SKIP] keys/tap"));
}

#[cfg(unix)]
#[test]
fn test_json_report() {
    let tmp = temp_dir();
    let root = test_project(&tmp);
    write(
        &root,
        "tests/keys/tap/keycode_events.snapshot",
        "pressed: keycode 0x04\nreleased: keycode 0x04\n",
    );

    let output = keyforge()
        .args(["test", "--no-build", "--format", "json"])
        .current_dir(&root)
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["passed"], 1);
    assert_eq!(report["report"]["scenarios"][0]["id"], "keys/tap");
    assert_eq!(report["report"]["scenarios"][0]["status"], "pass");
}

#[test]
fn test_no_scenarios_fails() {
    let tmp = temp_dir();
    let root = project(&tmp);

    keyforge()
        .args(["test", "--no-build"])
        .current_dir(&root)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no test scenarios"));
}

// ============================================================================
// keyforge completions
// ============================================================================

#[test]
fn test_completions_bash() {
    keyforge()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("keyforge"));
}

#[test]
fn test_help_lists_commands() {
    keyforge()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("test"))
        .stdout(predicate::str::contains("limits"));
}
