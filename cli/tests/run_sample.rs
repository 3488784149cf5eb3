use std::path::PathBuf;

use assert_cmd::Command;

fn sample() -> PathBuf {
    let mut sample = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    sample.push("samples");
    sample.push("sum.p8ir");
    sample
}

fn lowbyte() -> Command {
    Command::cargo_bin("lowbyte").expect("lowbyte binary")
}

fn stdout_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn run_sample_leaves_results_in_memory() {
    let output = lowbyte()
        .arg("run")
        .arg(sample())
        .args(["--show", "main.total", "--show", "main.doubled"])
        .output()
        .expect("failed to spawn lowbyte");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = stdout_of(&output);
    assert!(stdout.contains("halted after"), "{}", stdout);
    assert!(stdout.contains("main.total = 55"), "{}", stdout);
    assert!(stdout.contains("main.doubled = 42"), "{}", stdout);
}

#[test]
fn unoptimized_run_gives_the_same_results() {
    let output = lowbyte()
        .arg("run")
        .arg(sample())
        .args(["--no-optimize", "--show", "main.total"])
        .output()
        .expect("failed to spawn lowbyte");
    assert!(output.status.success());
    assert!(stdout_of(&output).contains("main.total = 55"));
}

#[test]
fn json_snapshot_describes_a_halted_machine() {
    let output = lowbyte()
        .arg("run")
        .arg(sample())
        .arg("--json")
        .output()
        .expect("failed to spawn lowbyte");
    assert!(output.status.success());

    let snapshot: serde_json::Value = serde_json::from_str(&stdout_of(&output)).expect("valid json");
    assert_eq!(snapshot["halted"], serde_json::Value::Bool(true));
    assert_eq!(snapshot["call_depth"], 0);
    assert_eq!(snapshot["value_stack_depth"], 0);
}

#[test]
fn step_limit_fails_the_run() {
    let output = lowbyte()
        .arg("run")
        .arg(sample())
        .args(["--max-steps", "5"])
        .output()
        .expect("failed to spawn lowbyte");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("step limit"), "{}", stderr);
}

#[test]
fn check_summarizes_the_program() {
    let output = lowbyte().arg("check").arg(sample()).output().expect("failed to spawn lowbyte");
    assert!(output.status.success());
    let stdout = stdout_of(&output);
    assert!(stdout.contains("program 'sum'"), "{}", stdout);
    assert!(stdout.contains("subroutines"), "{}", stdout);
}

#[test]
fn optimize_to_stdout_drops_useless_arithmetic() {
    let output = lowbyte()
        .arg("optimize")
        .arg(sample())
        .args(["-o", "-"])
        .output()
        .expect("failed to spawn lowbyte");
    assert!(output.status.success());
    let stdout = stdout_of(&output);
    assert!(stdout.starts_with("<?xml"), "{}", stdout);
    assert!(stdout.contains("addr.w r3,r2"));
    assert!(!stdout.contains("add.w r4,#0"));
}

#[test]
fn optimize_writes_a_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let target = dir.path().join("sum-opt.p8ir");
    lowbyte()
        .arg("optimize")
        .arg(sample())
        .arg("-o")
        .arg(&target)
        .assert()
        .success();

    let written = std::fs::read_to_string(&target).expect("optimized output");
    assert!(written.contains("<PROGRAM NAME=\"sum\">"));
}

#[test]
fn disasm_lists_labels_at_their_index() {
    let output = lowbyte()
        .arg("disasm")
        .arg(sample())
        .arg("--plain")
        .output()
        .expect("failed to spawn lowbyte");
    assert!(output.status.success());
    let stdout = stdout_of(&output);
    assert!(stdout.contains("main.start.loop:"), "{}", stdout);
    assert!(stdout.contains("00000    load.w r1,#0"), "{}", stdout);
}

#[test]
fn broken_file_reports_a_parse_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let broken = dir.path().join("broken.p8ir");
    std::fs::write(&broken, "<PROGRAM NAME=\"broken\">\n<OPTIONS>\n</OPTIONS>\n</PROGRAM>\n").expect("write");

    let output = lowbyte().arg("check").arg(&broken).output().expect("failed to spawn lowbyte");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("LOWBYTE"), "{}", stderr);
    assert!(stderr.contains("ASMSYMBOLS"), "{}", stderr);
}
