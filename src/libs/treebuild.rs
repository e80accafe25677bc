use crate::libs::distance::{jukes_cantor, p_distance};
use crate::libs::error::{PipelineError, Result};
use crate::libs::external::{run_command, stderr_summary, CommandTemplate, RunOutcome};
use crate::libs::matrix::{matrix_to_string, phylip_to_string};
use crate::libs::merge::AggregateMatrixPair;
use crate::libs::phylo::Tree;
use indexmap::IndexMap;
use log::{debug, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Combined tree file written next to the per-group trees.
pub const ALL_TREES_FILE: &str = "all_trees.tsv";

/// Turns a phylip distance matrix into a tree.
pub trait TreeBuilder {
    fn build(&self, phylip: &Path, workdir: &Path) -> Result<Tree>;
}

/// A neighbor-joining program driven through a command template.
///
/// `{in}` is the phylip file and `{out}` the tree file. Without `{out}` the
/// program is expected to print the tree on stdout.
#[derive(Debug, Clone)]
pub struct ExternalNj {
    template: CommandTemplate,
}

impl ExternalNj {
    pub fn new(template: CommandTemplate) -> Self {
        Self { template }
    }

    pub fn template(&self) -> &CommandTemplate {
        &self.template
    }
}

impl TreeBuilder for ExternalNj {
    fn build(&self, phylip: &Path, workdir: &Path) -> Result<Tree> {
        let program = self.template.program().to_string();
        let stem = phylip
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "tree".to_string());
        let out_path = workdir.join(format!("{}.nj.nwk", stem));
        if out_path.exists() {
            std::fs::remove_file(&out_path).map_err(PipelineError::io(&out_path))?;
        }

        let in_str = phylip.to_string_lossy();
        let out_str = out_path.to_string_lossy();
        let mut cmd = self
            .template
            .command(&[("in", in_str.as_ref()), ("out", out_str.as_ref())]);
        debug!("Running {:?}", cmd);

        let output = match run_command(&mut cmd, None) {
            Ok(RunOutcome::Exited(output)) => output,
            Ok(RunOutcome::TimedOut) => return Err(PipelineError::tool(&program, "timed out")),
            Err(e) => return Err(PipelineError::tool(&program, format!("cannot start: {}", e))),
        };
        if !output.status.success() {
            return Err(PipelineError::tool(
                &program,
                format!("{} ({})", output.status, stderr_summary(&output)),
            ));
        }

        let newick = if self.template.has_placeholder("out") {
            std::fs::read_to_string(&out_path).map_err(|e| {
                PipelineError::tool(
                    &program,
                    format!("no tree at {}: {}", out_path.display(), e),
                )
            })?
        } else {
            String::from_utf8_lossy(&output.stdout).into_owned()
        };
        if newick.trim().is_empty() {
            return Err(PipelineError::tool(&program, "produced an empty tree"));
        }

        let mut trees = Tree::from_newick_multi(&newick)?;
        if trees.is_empty() {
            return Err(PipelineError::tool(&program, "produced no tree"));
        }
        Ok(trees.swap_remove(0))
    }
}

/// Groups built and groups that failed, with the reason.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    pub built: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Writes per-group matrices and builds one outgroup-rooted tree per group.
pub struct TreeBuildOrchestrator<'a, B: TreeBuilder> {
    builder: &'a B,
    outdir: PathBuf,
    outgroup: String,
}

impl<'a, B: TreeBuilder> TreeBuildOrchestrator<'a, B> {
    pub fn new(builder: &'a B, outdir: impl Into<PathBuf>, outgroup: impl Into<String>) -> Self {
        Self {
            builder,
            outdir: outdir.into(),
            outgroup: outgroup.into(),
        }
    }

    pub fn all_trees_path(&self) -> PathBuf {
        self.outdir.join(ALL_TREES_FILE)
    }

    /// Process groups in order.
    ///
    /// Undefined distances and builder failures are recorded against their
    /// group and the next group is tried. I/O errors on the output directory
    /// end the run.
    pub fn build_all(
        &self,
        names: &[String],
        groups: &IndexMap<String, AggregateMatrixPair>,
    ) -> Result<BuildReport> {
        if !names.iter().any(|n| n == &self.outgroup) {
            return Err(PipelineError::Config(format!(
                "outgroup `{}` is not one of the {} sequences",
                self.outgroup,
                names.len()
            )));
        }

        std::fs::create_dir_all(&self.outdir).map_err(PipelineError::io(&self.outdir))?;
        let all_trees = self.all_trees_path();
        if all_trees.exists() {
            std::fs::remove_file(&all_trees).map_err(PipelineError::io(&all_trees))?;
        }

        let mut report = BuildReport::default();
        for (group, agg) in groups {
            match self.build_group(group, names, agg) {
                Ok(tree) => {
                    let mut writer = crate::libs::io::append_writer(&all_trees.to_string_lossy())
                        .map_err(PipelineError::io(&all_trees))?;
                    writeln!(writer, "{}\t{}\t{}", group, group, tree.to_newick())
                        .and_then(|_| writer.flush())
                        .map_err(PipelineError::io(&all_trees))?;
                    info!("Built tree for {}", group);
                    report.built.push(group.clone());
                }
                Err(e @ PipelineError::Io { .. }) => return Err(e),
                Err(e) => {
                    warn!("Skipping group {}: {}", group, e);
                    report.failed.push((group.clone(), e.to_string()));
                }
            }
        }

        info!(
            "{} of {} groups built, {} failed",
            report.built.len(),
            groups.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Write `<g>.diff.mat`, `<g>.nm.mat`, `<g>.p.mat`, `<g>.jc.mat`,
    /// `<g>.jc.phy` and `<g>.nwk` for one group.
    pub fn build_group(&self, group: &str, names: &[String], agg: &AggregateMatrixPair) -> Result<Tree> {
        self.write(group, "diff.mat", &matrix_to_string(names, &agg.diff))?;
        self.write(group, "nm.mat", &matrix_to_string(names, &agg.non_missing))?;

        let distance_err = |source| PipelineError::Distance {
            group: group.to_string(),
            source,
        };
        let p = p_distance(&agg.non_missing, &agg.diff).map_err(distance_err)?;
        self.write(group, "p.mat", &matrix_to_string(names, &p))?;
        let jc = jukes_cantor(&p).map_err(distance_err)?;
        self.write(group, "jc.mat", &matrix_to_string(names, &jc))?;
        let phylip = self.write(group, "jc.phy", &phylip_to_string(names, &jc))?;

        let mut tree = self.builder.build(&phylip, &self.outdir)?;
        tree.reroot_at_outgroup(&self.outgroup)?;

        self.write(group, "nwk", &format!("{}\n", tree.to_newick()))?;
        Ok(tree)
    }

    fn write(&self, group: &str, suffix: &str, contents: &str) -> Result<PathBuf> {
        let path = self.outdir.join(format!("{}.{}", group, suffix));
        crate::libs::io::replace_file(&path, contents).map_err(PipelineError::io(&path))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::error::DistanceError;
    use crate::libs::matrix::SquareMatrix;
    use std::cell::RefCell;

    /// Returns a fixed tree and remembers the phylip files it saw.
    struct FixedBuilder {
        newick: String,
        seen: RefCell<Vec<PathBuf>>,
    }

    impl TreeBuilder for FixedBuilder {
        fn build(&self, phylip: &Path, _workdir: &Path) -> Result<Tree> {
            self.seen.borrow_mut().push(phylip.to_path_buf());
            Ok(Tree::from_newick(&self.newick)?)
        }
    }

    fn names() -> Vec<String> {
        vec!["S1".to_string(), "S2".to_string(), "O".to_string()]
    }

    fn scenario_agg() -> AggregateMatrixPair {
        AggregateMatrixPair {
            non_missing: SquareMatrix::from_rows(vec![vec![100; 3]; 3]).unwrap(),
            diff: SquareMatrix::from_rows(vec![vec![0, 4, 6], vec![4, 0, 2], vec![6, 2, 0]]).unwrap(),
        }
    }

    #[test]
    fn test_build_all() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(ALL_TREES_FILE), "stale\n").unwrap();

        let builder = FixedBuilder {
            newick: "(S1:0.02,S2:0.02,O:0.04);".to_string(),
            seen: RefCell::new(Vec::new()),
        };
        let mut zero = AggregateMatrixPair::new(3);
        zero.non_missing.set(0, 1, 5);

        let mut groups = IndexMap::new();
        groups.insert("all_chrom".to_string(), scenario_agg());
        groups.insert("Chr2".to_string(), zero);
        groups.insert("Chr1".to_string(), scenario_agg());

        let orch = TreeBuildOrchestrator::new(&builder, dir.path(), "O");
        let report = orch.build_all(&names(), &groups).unwrap();

        assert_eq!(report.built, vec!["all_chrom", "Chr1"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "Chr2");
        assert!(!report.is_success());

        // Count matrices are kept for the failed group
        assert!(dir.path().join("Chr2.nm.mat").is_file());
        assert!(!dir.path().join("Chr2.nwk").exists());
        assert_eq!(builder.seen.borrow().len(), 2);

        let p = std::fs::read_to_string(dir.path().join("all_chrom.p.mat")).unwrap();
        assert!(p.contains("S1\t0\t0.04\t0.06"));
        let phy = std::fs::read_to_string(dir.path().join("all_chrom.jc.phy")).unwrap();
        assert!(phy.starts_with("\t3\t3\nS1         0.000000 0.041106 0.062536\n"));

        let nwk = std::fs::read_to_string(dir.path().join("Chr1.nwk")).unwrap();
        assert_eq!(nwk, "(O:0.02,(S1:0.02,S2:0.02):0.02);\n");

        let all = std::fs::read_to_string(orch.all_trees_path()).unwrap();
        let lines: Vec<&str> = all.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "all_chrom\tall_chrom\t(O:0.02,(S1:0.02,S2:0.02):0.02);");
    }

    #[test]
    fn test_build_group_saturated() {
        let dir = tempfile::tempdir().unwrap();
        let builder = FixedBuilder {
            newick: "(S1,S2,O);".to_string(),
            seen: RefCell::new(Vec::new()),
        };
        let mut agg = scenario_agg();
        agg.diff.set(0, 2, 80);

        let orch = TreeBuildOrchestrator::new(&builder, dir.path(), "O");
        match orch.build_group("g", &names(), &agg) {
            Err(PipelineError::Distance { group, source }) => {
                assert_eq!(group, "g");
                assert!(matches!(source, DistanceError::Saturated { row: 0, col: 2, .. }));
            }
            other => panic!("unexpected {:?}", other.map(|t| t.to_newick())),
        }
        assert!(dir.path().join("g.p.mat").is_file());
        assert!(!dir.path().join("g.jc.mat").exists());
    }

    #[test]
    fn test_missing_outgroup() {
        let dir = tempfile::tempdir().unwrap();
        let builder = FixedBuilder {
            newick: "(S1,S2,O);".to_string(),
            seen: RefCell::new(Vec::new()),
        };
        let orch = TreeBuildOrchestrator::new(&builder, dir.path(), "X");
        let groups: IndexMap<String, AggregateMatrixPair> = IndexMap::new();
        assert!(matches!(
            orch.build_all(&names(), &groups),
            Err(PipelineError::Config(_))
        ));
    }

    fn stub_script(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_external_nj() {
        let dir = tempfile::tempdir().unwrap();
        let phylip = dir.path().join("g.jc.phy");
        std::fs::write(&phylip, "\t2\t2\nA          0.000000 0.100000\n").unwrap();

        // Tree to a file
        let script = stub_script(dir.path(), "nj_file.sh", "echo '(A:0.05,B:0.05);' > \"$2\"");
        let nj = ExternalNj::new(CommandTemplate::parse(&format!("sh {} {{in}} {{out}}", script)).unwrap());
        let tree = nj.build(&phylip, dir.path()).unwrap();
        assert_eq!(tree.get_leaves().len(), 2);
        assert!(dir.path().join("g.jc.nj.nwk").is_file());

        // Tree on stdout
        let script = stub_script(dir.path(), "nj_stdout.sh", "test -f \"$1\" && echo '(A:1,B:1,C:1);'");
        let nj = ExternalNj::new(CommandTemplate::parse(&format!("sh {} {{in}}", script)).unwrap());
        assert_eq!(nj.build(&phylip, dir.path()).unwrap().get_leaves().len(), 3);

        // Failures
        for body in ["exit 2", "true", "echo 'not a tree'"] {
            let script = stub_script(dir.path(), "nj_bad.sh", body);
            let nj = ExternalNj::new(CommandTemplate::parse(&format!("sh {} {{in}}", script)).unwrap());
            assert!(nj.build(&phylip, dir.path()).is_err(), "{}", body);
        }
        let nj = ExternalNj::new(CommandTemplate::parse("no-such-nj-wintree {in}").unwrap());
        assert!(matches!(
            nj.build(&phylip, dir.path()),
            Err(PipelineError::ExternalTool { .. })
        ));
    }
}
