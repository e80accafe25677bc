//! All-pairs distances between many trees.
//!
//! One job per unordered pair is fed to a fixed set of worker threads over a
//! bounded channel. Workers send outcomes back over a second channel to the
//! calling thread, which is the only one touching the output.

use crate::libs::error::{PipelineError, Result};
use crate::libs::external::{run_command, stderr_summary, CommandTemplate, RunOutcome};
use crate::libs::phylo::{Tree, TreeComparison};
use itertools::Itertools;
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::io::{BufRead, Write};
use std::path::Path;
use std::time::Duration;

/// One row of a tree table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRecord {
    pub id: String,
    pub newick: String,
}

/// Read `id<TAB>newick` or `id<TAB>id<TAB>newick` lines.
///
/// The first field is the id and the last one the tree. Ids must be unique.
pub fn read_tree_table<R: BufRead>(reader: R, file: &Path) -> Result<Vec<TreeRecord>> {
    let mut records = Vec::new();
    let mut seen = HashSet::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(PipelineError::io(file))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = trimmed.split('\t').collect();
        if fields.len() != 2 && fields.len() != 3 {
            return Err(PipelineError::format(
                file,
                i + 1,
                format!("expected 2 or 3 tab-separated fields, found {}", fields.len()),
            ));
        }
        let id = fields[0].trim();
        let newick = fields[fields.len() - 1].trim();
        if id.is_empty() || newick.is_empty() {
            return Err(PipelineError::format(file, i + 1, "empty id or tree"));
        }
        if !seen.insert(id.to_string()) {
            return Err(PipelineError::format(
                file,
                i + 1,
                format!("duplicated tree id `{}`", id),
            ));
        }

        records.push(TreeRecord {
            id: id.to_string(),
            newick: newick.to_string(),
        });
    }

    Ok(records)
}

/// Terminal state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JobStatus {
    Succeeded,
    /// The program could not be started
    SpawnFailed,
    NonZeroExit,
    /// No result file
    MissingOutput,
    /// The result is not a number
    Unparsable,
    TimedOut,
    /// A tree could not be parsed or the pair is not comparable
    InvalidTree,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Succeeded => "succeeded",
            JobStatus::SpawnFailed => "spawn_failed",
            JobStatus::NonZeroExit => "non_zero_exit",
            JobStatus::MissingOutput => "missing_output",
            JobStatus::Unparsable => "unparsable",
            JobStatus::TimedOut => "timed_out",
            JobStatus::InvalidTree => "invalid_tree",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobFailure {
    pub status: JobStatus,
    pub message: String,
}

impl JobFailure {
    fn new(status: JobStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PairwiseJobResult {
    pub id1: String,
    pub id2: String,
    pub outcome: std::result::Result<f64, JobFailure>,
}

impl PairwiseJobResult {
    pub fn status(&self) -> JobStatus {
        match &self.outcome {
            Ok(_) => JobStatus::Succeeded,
            Err(failure) => failure.status,
        }
    }
}

/// Distance between two trees. Called concurrently from worker threads.
pub trait TreePairMetric: Sync {
    /// `scratch` is a directory private to this job.
    fn distance(
        &self,
        a: &TreeRecord,
        b: &TreeRecord,
        scratch: &Path,
    ) -> std::result::Result<f64, JobFailure>;
}

/// Unrooted Robinson-Foulds distance, computed in-process.
#[derive(Debug, Clone, Copy, Default)]
pub struct RobinsonFouldsMetric;

impl TreePairMetric for RobinsonFouldsMetric {
    fn distance(
        &self,
        a: &TreeRecord,
        b: &TreeRecord,
        _scratch: &Path,
    ) -> std::result::Result<f64, JobFailure> {
        let parse = |r: &TreeRecord| {
            Tree::from_newick(&r.newick)
                .map_err(|e| JobFailure::new(JobStatus::InvalidTree, format!("{}: {}", r.id, e)))
        };
        let t1 = parse(a)?;
        let t2 = parse(b)?;
        t1.robinson_foulds(&t2)
            .map(|rf| rf as f64)
            .map_err(|e| JobFailure::new(JobStatus::InvalidTree, e))
    }
}

/// An external program computing one distance per call.
///
/// Placeholders: `{tree1}` and `{tree2}` are files holding the two Newick
/// strings, `{id1}` and `{id2}` the tree ids, `{out}` a result file. Without
/// `{out}` the number is read from stdout.
#[derive(Debug, Clone)]
pub struct ScriptMetric {
    template: CommandTemplate,
    timeout: Option<Duration>,
}

impl ScriptMetric {
    pub fn new(template: CommandTemplate, timeout: Option<Duration>) -> Self {
        Self { template, timeout }
    }
}

impl TreePairMetric for ScriptMetric {
    fn distance(
        &self,
        a: &TreeRecord,
        b: &TreeRecord,
        scratch: &Path,
    ) -> std::result::Result<f64, JobFailure> {
        let scratch_err = |e: std::io::Error| {
            JobFailure::new(JobStatus::SpawnFailed, format!("scratch file: {}", e))
        };
        let tree1 = scratch.join("tree1.nwk");
        let tree2 = scratch.join("tree2.nwk");
        let out = scratch.join("distance.out");
        std::fs::write(&tree1, format!("{}\n", a.newick)).map_err(scratch_err)?;
        std::fs::write(&tree2, format!("{}\n", b.newick)).map_err(scratch_err)?;

        let (t1, t2, o) = (tree1.to_string_lossy(), tree2.to_string_lossy(), out.to_string_lossy());
        let mut cmd = self.template.command(&[
            ("tree1", t1.as_ref()),
            ("tree2", t2.as_ref()),
            ("id1", a.id.as_str()),
            ("id2", b.id.as_str()),
            ("out", o.as_ref()),
        ]);

        let output = match run_command(&mut cmd, self.timeout) {
            Ok(RunOutcome::Exited(output)) => output,
            Ok(RunOutcome::TimedOut) => {
                return Err(JobFailure::new(
                    JobStatus::TimedOut,
                    format!("killed after {:?}", self.timeout.unwrap_or_default()),
                ))
            }
            Err(e) => {
                return Err(JobFailure::new(
                    JobStatus::SpawnFailed,
                    format!("{}: {}", self.template.program(), e),
                ))
            }
        };
        if !output.status.success() {
            return Err(JobFailure::new(
                JobStatus::NonZeroExit,
                format!("{} ({})", output.status, stderr_summary(&output)),
            ));
        }

        let text = if self.template.has_placeholder("out") {
            std::fs::read_to_string(&out)
                .map_err(|e| JobFailure::new(JobStatus::MissingOutput, e.to_string()))?
        } else {
            String::from_utf8_lossy(&output.stdout).into_owned()
        };

        let token = text.split_whitespace().next().unwrap_or("");
        match token.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(JobFailure::new(
                JobStatus::Unparsable,
                format!("`{}` is not a distance", token),
            )),
        }
    }
}

/// Jobs scheduled and their terminal states.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub scheduled: usize,
    pub counts: BTreeMap<JobStatus, usize>,
}

impl BatchSummary {
    pub fn count(&self, status: JobStatus) -> usize {
        self.counts.get(&status).copied().unwrap_or(0)
    }

    pub fn finished(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn failed(&self) -> usize {
        self.finished() - self.count(JobStatus::Succeeded)
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scheduled={}", self.scheduled)?;
        for (status, count) in &self.counts {
            write!(f, " {}={}", status, count)?;
        }
        Ok(())
    }
}

/// Number of unordered pairs among `n` items.
pub fn pair_count(n: usize) -> usize {
    n * n.saturating_sub(1) / 2
}

#[derive(Debug, Clone)]
pub struct PairwiseBatch {
    threads: usize,
}

impl PairwiseBatch {
    pub fn new(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(PipelineError::Config(
                "the number of threads must be positive".to_string(),
            ));
        }
        Ok(Self { threads })
    }

    /// Run every pair and append one `id1<TAB>id2<TAB>distance` line per
    /// succeeded job to `writer`, in completion order.
    ///
    /// Failed jobs are logged and counted; they neither stop nor retry other
    /// jobs.
    pub fn run<M, W>(&self, trees: &[TreeRecord], metric: &M, writer: &mut W) -> Result<BatchSummary>
    where
        M: TreePairMetric,
        W: Write,
    {
        let mut summary = BatchSummary {
            scheduled: pair_count(trees.len()),
            ..Default::default()
        };
        info!(
            "Scheduling {} jobs for {} trees on {} threads",
            summary.scheduled,
            trees.len(),
            self.threads
        );
        if summary.scheduled == 0 {
            return Ok(summary);
        }

        let scratch_root = tempfile::Builder::new()
            .prefix("wintree-pairs-")
            .tempdir()
            .map_err(PipelineError::io(std::env::temp_dir()))?;
        let scratch_root = scratch_root.path();

        let (job_snd, job_rcv) = crossbeam::channel::bounded::<(usize, usize)>(self.threads * 2);
        let (res_snd, res_rcv) = crossbeam::channel::bounded::<PairwiseJobResult>(self.threads * 2);
        let mut write_error: Option<std::io::Error> = None;

        crossbeam::scope(|s| {
            // Feeder
            s.spawn(move |_| {
                for (i, j) in (0..trees.len()).tuple_combinations() {
                    debug!("Submitted {}\t{}", trees[i].id, trees[j].id);
                    if job_snd.send((i, j)).is_err() {
                        break;
                    }
                }
            });

            // Workers
            for _ in 0..self.threads {
                let (sendr, recvr) = (res_snd.clone(), job_rcv.clone());
                s.spawn(move |_| {
                    for (i, j) in recvr.iter() {
                        let (a, b) = (&trees[i], &trees[j]);
                        debug!("Running {}\t{}", a.id, b.id);
                        let outcome = match tempfile::Builder::new()
                            .prefix("job-")
                            .tempdir_in(scratch_root)
                        {
                            Ok(job_dir) => metric.distance(a, b, job_dir.path()),
                            Err(e) => Err(JobFailure::new(JobStatus::SpawnFailed, e.to_string())),
                        };
                        let result = PairwiseJobResult {
                            id1: a.id.clone(),
                            id2: b.id.clone(),
                            outcome,
                        };
                        if sendr.send(result).is_err() {
                            break;
                        }
                    }
                });
            }
            // The writer loop below ends once every worker has dropped its sender
            drop(res_snd);

            // Writer
            for result in res_rcv.iter() {
                *summary.counts.entry(result.status()).or_insert(0) += 1;
                match &result.outcome {
                    Ok(distance) => {
                        if write_error.is_none() {
                            if let Err(e) =
                                writeln!(writer, "{}\t{}\t{}", result.id1, result.id2, distance)
                            {
                                write_error = Some(e);
                            }
                        }
                    }
                    Err(failure) => warn!(
                        "{}\t{}: {} ({})",
                        result.id1, result.id2, failure.status, failure.message
                    ),
                }
            }
        })
        .map_err(|_| PipelineError::tool("pairwise worker", "a worker thread panicked"))?;

        if let Some(e) = write_error {
            return Err(PipelineError::Io {
                path: "pairwise output".into(),
                source: e,
            });
        }
        writer.flush().map_err(PipelineError::io("pairwise output"))?;

        info!("Pairwise jobs finished: {}", summary);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn caterpillar(n: usize, shift: usize) -> String {
        // ((((t0,t1),t2),t3)...) with leaves rotated by `shift`
        let mut s = format!("L{}", shift % n);
        for k in 1..n {
            s = format!("({},L{})", s, (k + shift) % n);
        }
        format!("{};", s)
    }

    fn records(count: usize) -> Vec<TreeRecord> {
        (0..count)
            .map(|i| TreeRecord {
                id: format!("w{:02}", i),
                newick: caterpillar(6, i),
            })
            .collect()
    }

    fn check_output(text: &str, trees: &[TreeRecord]) {
        let n = trees.len();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), n * (n - 1) / 2);

        let mut pairs = BTreeSet::new();
        for line in lines {
            let fields: Vec<&str> = line.split('\t').collect();
            assert_eq!(fields.len(), 3, "{:?}", line);
            assert!(fields[2].parse::<f64>().is_ok(), "{:?}", line);
            let pair = if fields[0] < fields[1] {
                (fields[0].to_string(), fields[1].to_string())
            } else {
                (fields[1].to_string(), fields[0].to_string())
            };
            assert_ne!(pair.0, pair.1);
            assert!(pairs.insert(pair), "duplicated pair in {:?}", line);
        }
    }

    #[test]
    fn test_read_tree_table() {
        let input = "a\t(A,B);\n\n# comment\nChr1\tChr1\t((A,B),C);\n";
        let records = read_tree_table(input.as_bytes(), Path::new("t")).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id, "Chr1");
        assert_eq!(records[1].newick, "((A,B),C);");

        for bad in ["a\n", "a\tb\tc\td\n", "a\t(A,B);\na\t(A,C);\n", "\t(A,B);\n"] {
            assert!(
                matches!(
                    read_tree_table(bad.as_bytes(), Path::new("t")),
                    Err(PipelineError::Format { .. })
                ),
                "{:?}",
                bad
            );
        }
    }

    #[test]
    fn test_pair_count() {
        assert_eq!(pair_count(0), 0);
        assert_eq!(pair_count(1), 0);
        assert_eq!(pair_count(2), 1);
        assert_eq!(pair_count(12), 66);
    }

    #[test]
    fn test_batch_rf_concurrent() {
        let trees = records(12);
        for threads in [1, 3, 8] {
            let mut out = Vec::new();
            let summary = PairwiseBatch::new(threads)
                .unwrap()
                .run(&trees, &RobinsonFouldsMetric, &mut out)
                .unwrap();

            assert_eq!(summary.scheduled, 66);
            assert_eq!(summary.count(JobStatus::Succeeded), 66);
            assert_eq!(summary.failed(), 0);
            check_output(&String::from_utf8(out).unwrap(), &trees);
        }
    }

    #[test]
    fn test_batch_invalid_tree_is_scoped() {
        let mut trees = records(4);
        trees[2].newick = "((A,B),".to_string();

        let mut out = Vec::new();
        let summary = PairwiseBatch::new(2)
            .unwrap()
            .run(&trees, &RobinsonFouldsMetric, &mut out)
            .unwrap();

        assert_eq!(summary.scheduled, 6);
        assert_eq!(summary.count(JobStatus::InvalidTree), 3);
        assert_eq!(summary.count(JobStatus::Succeeded), 3);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(!text.contains("w02"));
    }

    #[test]
    fn test_batch_too_few_trees() {
        let mut out = Vec::new();
        let summary = PairwiseBatch::new(4)
            .unwrap()
            .run(&records(1), &RobinsonFouldsMetric, &mut out)
            .unwrap();
        assert_eq!(summary.scheduled, 0);
        assert!(out.is_empty());
        assert!(PairwiseBatch::new(0).is_err());
    }

    fn script(dir: &Path, body: &str) -> CommandTemplate {
        let path = dir.join(format!("metric{}.sh", body.len()));
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        CommandTemplate::parse(&format!(
            "sh {} {{tree1}} {{tree2}} {{id1}} {{id2}} {{out}}",
            path.display()
        ))
        .unwrap()
    }

    #[test]
    fn test_script_metric() {
        let dir = tempfile::tempdir().unwrap();
        let trees = records(10);

        // Reads both tree files and writes the result file
        let metric = ScriptMetric::new(
            script(dir.path(), "test -s \"$1\" && test -s \"$2\" && echo 0.5 > \"$5\""),
            None,
        );
        let mut out = Vec::new();
        let summary = PairwiseBatch::new(4).unwrap().run(&trees, &metric, &mut out).unwrap();
        assert_eq!(summary.count(JobStatus::Succeeded), 45);
        let text = String::from_utf8(out).unwrap();
        check_output(&text, &trees);
        assert!(text.lines().all(|l| l.ends_with("\t0.5")));
    }

    #[test]
    fn test_script_metric_failures() {
        let dir = tempfile::tempdir().unwrap();
        let trees = records(4);
        let cases = [
            ("exit 1", JobStatus::NonZeroExit),
            ("true", JobStatus::MissingOutput),
            ("echo NA > \"$5\"", JobStatus::Unparsable),
        ];
        for (body, status) in cases {
            let metric = ScriptMetric::new(script(dir.path(), body), None);
            let mut out = Vec::new();
            let summary = PairwiseBatch::new(2).unwrap().run(&trees, &metric, &mut out).unwrap();
            assert_eq!(summary.count(status), 6, "{}", body);
            assert!(out.is_empty());
        }

        // Only pairs involving w01 fail
        let metric = ScriptMetric::new(
            script(dir.path(), "if [ \"$3\" = w01 ] || [ \"$4\" = w01 ]; then exit 3; fi; echo 1 > \"$5\""),
            None,
        );
        let mut out = Vec::new();
        let summary = PairwiseBatch::new(3).unwrap().run(&trees, &metric, &mut out).unwrap();
        assert_eq!(summary.count(JobStatus::NonZeroExit), 3);
        assert_eq!(summary.count(JobStatus::Succeeded), 3);
        assert_eq!(summary.to_string(), "scheduled=6 succeeded=3 non_zero_exit=3");

        let metric = ScriptMetric::new(
            CommandTemplate::parse("no-such-metric-wintree {tree1}").unwrap(),
            None,
        );
        let mut out = Vec::new();
        let summary = PairwiseBatch::new(2).unwrap().run(&trees, &metric, &mut out).unwrap();
        assert_eq!(summary.count(JobStatus::SpawnFailed), 6);
    }

    #[test]
    fn test_script_metric_stdout_and_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let trees = records(3);

        let path = dir.path().join("stdout.sh");
        std::fs::write(&path, "#!/bin/sh\necho \"0.125 extra\"\n").unwrap();
        let metric = ScriptMetric::new(
            CommandTemplate::parse(&format!("sh {} {{tree1}} {{tree2}}", path.display())).unwrap(),
            None,
        );
        let mut out = Vec::new();
        PairwiseBatch::new(2).unwrap().run(&trees, &metric, &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().lines().all(|l| l.ends_with("\t0.125")));

        let metric = ScriptMetric::new(
            script(dir.path(), "sleep 5; echo 1 > \"$5\""),
            Some(Duration::from_millis(100)),
        );
        let mut out = Vec::new();
        let summary = PairwiseBatch::new(3).unwrap().run(&trees, &metric, &mut out).unwrap();
        assert_eq!(summary.count(JobStatus::TimedOut), 3);
    }
}
