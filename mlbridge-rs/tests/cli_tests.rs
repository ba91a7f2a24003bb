/// End-to-end tests: run scripts through the `mlbridge` binary against the
/// in-process workspace (`-n`) and check what it prints.
///
/// Scripts are piped on stdin unless a case passes its own arguments.  The rc
/// file is skipped with a bare `-f` (followed by another flag, so it cannot
/// swallow a script path) so the user's settings never leak in.

use std::io::Write;
use std::process::{Command, Output, Stdio};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn binary() -> std::path::PathBuf {
    std::path::PathBuf::from(env!("CARGO_BIN_EXE_mlbridge"))
}

fn run_mlbridge(args: &[&str], stdin: &str) -> Output {
    let mut cmd = Command::new(binary());
    cmd.args(["-f", "-n"]).args(args);
    for (name, _) in std::env::vars().filter(|(k, _)| k.starts_with("MLBRIDGE_")) {
        cmd.env_remove(name);
    }
    cmd.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped());

    let mut child = cmd.spawn().expect("failed to spawn mlbridge binary");
    {
        let input = child.stdin.as_mut().expect("stdin not open");
        input.write_all(stdin.as_bytes()).expect("write to stdin");
    }
    child.wait_with_output().expect("wait failed")
}

fn stdout_lines(out: &Output) -> Vec<String> {
    String::from_utf8_lossy(&out.stdout)
        .lines()
        .map(|l| l.trim().to_owned())
        .filter(|l| !l.is_empty())
        .collect()
}

/// Run `script` from stdin and compare stdout line by line.
fn check(script: &str, expected: &[&str]) {
    let out = run_mlbridge(&[], script);
    let got = stdout_lines(&out);
    assert!(
        out.status.success(),
        "exit {:?}\nstderr:\n{}",
        out.status,
        String::from_utf8_lossy(&out.stderr)
    );
    assert_eq!(got, expected, "\nScript:\n{script}");
}

// ── Test cases ────────────────────────────────────────────────────────────────

#[test]
fn expression_result_is_printed() {
    check("(1+2)", &["3"]);
}

#[test]
fn continuation_lines() {
    check("(1+...\n2)", &["3"]);
}

#[test]
fn statements_print_nothing() {
    check("a = 1;\nb = a + 1;", &[]);
}

#[test]
fn comment_only_script() {
    check("% just a note\n%{\nx = 1\n%}\n", &[]);
}

#[test]
fn matrix_keeps_its_shape() {
    check("[1 2; 3 4]", &["[1 2; 3 4]"]);
}

#[test]
fn strings_with_percent() {
    check("sprintf('%d%%', 50)", &["50%"]);
}

#[test]
fn inline_script_and_variable_listing() {
    let out = run_mlbridge(&["-v", "-c", "x = 5; % five"], "");
    assert!(out.status.success());
    assert_eq!(stdout_lines(&out), ["x = 5"]);
}

#[test]
fn branch_variable_is_listed() {
    let script = "a = 1;\n% choose\nif a == 1\n  % taken\n  testVar = 42;\nelse\n  testVar = 0;\nend\n";
    let out = run_mlbridge(&["-v"], script);
    assert!(out.status.success());
    assert_eq!(stdout_lines(&out), ["a = 1", "testVar = 42"]);
}

#[test]
fn exit_reports_shutdown() {
    let out = run_mlbridge(&["-x", "-c", "(2*3)"], "");
    assert_eq!(stdout_lines(&out), ["6", "MATLAB shutdown successful"]);
}

#[test]
fn exit_without_session() {
    let out = run_mlbridge(&["-x", "-c", "% nothing"], "");
    assert_eq!(stdout_lines(&out), ["No MATLAB connection detected."]);
}

#[test]
fn script_files_run_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.m");
    let second = dir.path().join("second.m");
    std::fs::write(&first, "k = 10; % setup\n").unwrap();
    std::fs::write(&second, "(k * 2)\n").unwrap();

    let out = run_mlbridge(&[first.to_str().unwrap(), second.to_str().unwrap()], "");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(stdout_lines(&out), ["20"]);
}

#[test]
fn script_file_is_not_taken_for_the_rc_file() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("only.m");
    std::fs::write(&script, "k = 3;\n(k + 1)\n").unwrap();

    let out = Command::new(binary())
        .args(["-n", "-f", "--", script.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(stdout_lines(&out), ["4"]);

    let out = run_mlbridge(&[script.to_str().unwrap()], "");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(stdout_lines(&out), ["4"]);
}

#[test]
fn rc_file_problems_are_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let rc = dir.path().join("mlbridgerc");
    std::fs::write(&rc, "hidden = yes\nbogus = 1\n").unwrap();

    let mut cmd = Command::new(binary());
    let out = cmd
        .args(["-n", "-f", rc.to_str().unwrap(), "-c", "(1)"])
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(stdout_lines(&out), ["1"]);
    assert!(String::from_utf8_lossy(&out.stderr).contains("unknown option 'bogus'"));
}

#[test]
fn failing_script_exits_nonzero() {
    let out = run_mlbridge(&["-c", "no_such_function(1)"], "");
    assert!(!out.status.success());
    let err = String::from_utf8_lossy(&out.stderr);
    assert!(err.contains("mlbridge: remote invocation failed"), "{err}");
}

#[test]
fn missing_file_exits_nonzero() {
    let out = run_mlbridge(&["/nonexistent/script.m"], "");
    assert!(!out.status.success());
    let err = String::from_utf8_lossy(&out.stderr);
    assert!(err.contains("mlbridge: /nonexistent/script.m"), "{err}");
    assert!(!err.contains("line 1"), "{err}");
}

#[test]
fn unknown_flag_prints_usage() {
    let out = run_mlbridge(&["-z"], "");
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Usage: mlbridge"));
}
