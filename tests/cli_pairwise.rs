use assert_cmd::Command;
use predicates::prelude::*;
use std::collections::BTreeSet;
use tempfile::tempdir;

fn caterpillar(n: usize, shift: usize) -> String {
    let mut s = format!("L{}", shift % n);
    for k in 1..n {
        s = format!("({}:1,L{}:1)", s, (k + shift) % n);
    }
    format!("{};", s)
}

#[test]
fn command_pairwise_rf() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("wintree")?;
    let output = cmd
        .arg("pairwise")
        .arg("tests/wintree/trees.tsv")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    assert!(output.status.success());
    let lines: BTreeSet<&str> = stdout.lines().collect();
    let expected: BTreeSet<&str> = [
        "all_chrom\tChr1\t2",
        "all_chrom\tChr2\t0",
        "Chr1\tChr2\t2",
    ]
    .into_iter()
    .collect();
    assert_eq!(lines, expected);

    Ok(())
}

#[test]
fn command_pairwise_parallel() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let infile = dir.path().join("trees.tsv");
    let outfile = dir.path().join("pairs.tsv");
    let table: String = (0..12)
        .map(|i| format!("w{}\t{}\n", i, caterpillar(8, i)))
        .collect();
    std::fs::write(&infile, table)?;

    let mut cmd = Command::cargo_bin("wintree")?;
    cmd.arg("pairwise")
        .arg(&infile)
        .arg("-p")
        .arg("4")
        .arg("-o")
        .arg(&outfile);
    cmd.assert().success();

    let output = std::fs::read_to_string(&outfile)?;
    let mut pairs = BTreeSet::new();
    for line in output.lines() {
        let fields: Vec<&str> = line.split('\t').collect();
        assert_eq!(fields.len(), 3, "{}", line);
        assert!(fields[2].parse::<f64>().is_ok());
        let mut pair = [fields[0], fields[1]];
        pair.sort();
        assert!(pairs.insert(pair));
    }
    assert_eq!(pairs.len(), 66);

    // Appends
    let mut cmd = Command::cargo_bin("wintree")?;
    cmd.arg("pairwise")
        .arg(&infile)
        .arg("-p")
        .arg("3")
        .arg("-o")
        .arg(&outfile);
    cmd.assert().success();
    assert_eq!(std::fs::read_to_string(&outfile)?.lines().count(), 132);

    Ok(())
}

#[test]
fn command_pairwise_script() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let script = dir.path().join("dist.sh");
    std::fs::write(
        &script,
        "#!/bin/sh\nif [ \"$3\" = Chr1 ]; then exit 1; fi\necho 0.25 > \"$5\"\n",
    )?;

    let mut cmd = Command::cargo_bin("wintree")?;
    let output = cmd
        .arg("pairwise")
        .arg("tests/wintree/trees.tsv")
        .arg("-p")
        .arg("2")
        .arg("--script")
        .arg(format!(
            "sh {} {{tree1}} {{tree2}} {{id1}} {{id2}} {{out}}",
            script.display()
        ))
        .arg("--timeout")
        .arg("30")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    // Chr1 is id1 only in the pair with Chr2
    assert!(output.status.success());
    let lines: BTreeSet<&str> = stdout.lines().collect();
    let expected: BTreeSet<&str> = ["all_chrom\tChr1\t0.25", "all_chrom\tChr2\t0.25"]
        .into_iter()
        .collect();
    assert_eq!(lines, expected);

    Ok(())
}

#[test]
fn command_pairwise_bad_input() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("wintree")?;
    cmd.arg("pairwise").arg("stdin").write_stdin("only-one-field\n");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("tab-separated"));

    let mut cmd = Command::cargo_bin("wintree")?;
    cmd.arg("pairwise")
        .arg("tests/wintree/trees.tsv")
        .arg("-p")
        .arg("0");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("positive"));

    Ok(())
}
