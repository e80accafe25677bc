use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn command_reroot_basic() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("wintree")?;
    let output = cmd
        .arg("reroot")
        .arg("stdin")
        .arg("-n")
        .arg("D")
        .write_stdin("((A:1,B:2):1,(C:3,D:4):1);\n")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    assert!(output.status.success());
    assert_eq!(stdout, "(D:2,(C:3,(A:1,B:2):2):2);\n");

    Ok(())
}

#[test]
fn command_reroot_multi_and_support() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("wintree")?;
    let output = cmd
        .arg("reroot")
        .arg("stdin")
        .arg("-n")
        .arg("A")
        .write_stdin("((A:1,B:1)90:1,(C:1,D:1)70:1);\n(A:1,(B:1,C:1):1);\n")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|l| l.starts_with("(A:0.5,")));
    assert!(lines[0].contains(")70:"));

    let mut cmd = Command::cargo_bin("wintree")?;
    let output = cmd
        .arg("reroot")
        .arg("stdin")
        .arg("-n")
        .arg("A")
        .arg("--plain")
        .write_stdin("((A:1,B:1)90:1,(C:1,D:1)70:1);\n")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;
    assert!(!stdout.contains("70"));

    Ok(())
}

#[test]
fn command_reroot_missing_outgroup() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("wintree")?;
    cmd.arg("reroot")
        .arg("stdin")
        .arg("-n")
        .arg("Z")
        .write_stdin("((A:1,B:2):1,(C:3,D:4):1);\n");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("no leaf named `Z`"));

    Ok(())
}
