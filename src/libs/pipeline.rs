//! End-to-end driver: per-region matrices, merge, trees, pairwise distances.

use crate::libs::batch::{read_tree_table, BatchSummary, PairwiseBatch, RobinsonFouldsMetric, ScriptMetric};
use crate::libs::error::{PipelineError, Result};
use crate::libs::external::{run_command, stderr_summary, CommandTemplate, RunOutcome};
use crate::libs::filter::RegionFilterCatalog;
use crate::libs::merge::{DirMatrixStore, MatrixMerger, MergeStats};
use crate::libs::region::{RegionIndexEntry, RegionIndexReader};
use crate::libs::treebuild::{BuildReport, ExternalNj, TreeBuildOrchestrator};
use log::{debug, info};
use rayon::prelude::*;
use std::path::PathBuf;

/// Output file of the pairwise stage, inside the output directory.
pub const PAIRWISE_FILE: &str = "pairwise.tsv";

/// How tree pairs are compared in the last stage.
#[derive(Debug, Clone)]
pub enum PairwiseMetric {
    RobinsonFoulds,
    Script(ScriptMetric),
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Holds `<index>.nm.mat` and `<index>.diff.mat`
    pub matrix_dir: PathBuf,
    pub region_index: PathBuf,
    pub seq_num: usize,
    pub outgroup: String,
    pub outdir: PathBuf,
    pub threads: usize,
    pub nj: CommandTemplate,
    pub per_chrom: bool,
    pub per_window: bool,
    /// Run for each region without matrices. Placeholders `{chrom}`,
    /// `{start}`, `{end}`, `{region}`, `{index}` and `{outdir}` (the matrix dir).
    pub producer: Option<CommandTemplate>,
    pub pairwise: Option<PairwiseMetric>,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.seq_num == 0 {
            return Err(PipelineError::Config(
                "the number of sequences must be positive".to_string(),
            ));
        }
        if self.threads == 0 {
            return Err(PipelineError::Config(
                "the number of threads must be positive".to_string(),
            ));
        }
        if self.outgroup.trim().is_empty() {
            return Err(PipelineError::Config("empty outgroup name".to_string()));
        }
        if !self.region_index.is_file() {
            return Err(PipelineError::Config(format!(
                "region index {} does not exist",
                self.region_index.display()
            )));
        }
        if self.producer.is_none() && !self.matrix_dir.is_dir() {
            return Err(PipelineError::Config(format!(
                "matrix directory {} does not exist",
                self.matrix_dir.display()
            )));
        }

        self.nj.locate()?;
        if let Some(producer) = &self.producer {
            producer.locate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Regions whose matrices were produced during this run
    pub produced: usize,
    pub merge: MergeStats,
    pub build: BuildReport,
    pub pairwise: Option<BatchSummary>,
}

/// Run every stage in order. The first fatal error ends the run; files
/// already written stay in place.
pub fn run(config: &PipelineConfig) -> Result<PipelineReport> {
    config.validate()?;

    let entries: Vec<RegionIndexEntry> =
        RegionIndexReader::open(&config.region_index)?.collect::<Result<_>>()?;
    info!(
        "{} regions listed in {}",
        entries.len(),
        config.region_index.display()
    );

    let store = DirMatrixStore::new(&config.matrix_dir);
    let produced = match &config.producer {
        Some(producer) => produce_missing(producer, &entries, &store, &config.matrix_dir, config.threads)?,
        None => 0,
    };
    check_matrices(&entries, &store)?;

    let catalog = RegionFilterCatalog::whole_genome().scan_index(
        &config.region_index,
        config.per_chrom,
        config.per_window,
    )?;
    info!("{} groups to merge", catalog.len());
    let merged = MatrixMerger::new(&store, &catalog, config.seq_num)
        .merge_entries(entries.iter().cloned().map(Ok))?;

    let builder = ExternalNj::new(config.nj.clone());
    let orchestrator = TreeBuildOrchestrator::new(&builder, &config.outdir, &config.outgroup);
    let build = orchestrator.build_all(&merged.names, &merged.groups)?;

    let pairwise = match &config.pairwise {
        Some(metric) => Some(run_pairwise(
            metric,
            &orchestrator.all_trees_path(),
            &config.outdir.join(PAIRWISE_FILE),
            config.threads,
        )?),
        None => None,
    };

    Ok(PipelineReport {
        produced,
        merge: merged.stats,
        build,
        pairwise,
    })
}

/// Run `producer` for every region lacking a matrix, on `threads` workers.
///
/// Returns the number of regions processed. The first failed region is
/// reported after all started ones have finished.
pub fn produce_missing(
    producer: &CommandTemplate,
    entries: &[RegionIndexEntry],
    store: &DirMatrixStore,
    matrix_dir: &std::path::Path,
    threads: usize,
) -> Result<usize> {
    std::fs::create_dir_all(matrix_dir).map_err(PipelineError::io(matrix_dir))?;

    let missing: Vec<&RegionIndexEntry> = entries
        .iter()
        .filter(|e| !store.has_region(&e.index))
        .collect();
    if missing.is_empty() {
        return Ok(0);
    }
    info!(
        "Producing matrices for {} of {} regions with `{}`",
        missing.len(),
        entries.len(),
        producer
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| PipelineError::Config(format!("cannot start {} threads: {}", threads, e)))?;

    let dir = matrix_dir.to_string_lossy();
    let results: Vec<Result<()>> = pool.install(|| {
        missing
            .par_iter()
            .map(|entry| produce_region(producer, entry, &dir))
            .collect()
    });
    results.into_iter().collect::<Result<Vec<_>>>()?;

    Ok(missing.len())
}

fn produce_region(producer: &CommandTemplate, entry: &RegionIndexEntry, dir: &str) -> Result<()> {
    let region = &entry.region;
    let (start, end) = (region.start().to_string(), region.end().to_string());
    let text = region.to_string();
    let mut cmd = producer.command(&[
        ("chrom", region.chrom()),
        ("start", start.as_str()),
        ("end", end.as_str()),
        ("region", text.as_str()),
        ("index", entry.index.as_str()),
        ("outdir", dir),
    ]);
    debug!("Region {}: {:?}", entry.index, cmd);

    match run_command(&mut cmd, None) {
        Ok(RunOutcome::Exited(output)) if output.status.success() => Ok(()),
        Ok(RunOutcome::Exited(output)) => Err(PipelineError::tool(
            producer.program(),
            format!(
                "region {} ({}): {} ({})",
                entry.index,
                region,
                output.status,
                stderr_summary(&output)
            ),
        )),
        Ok(RunOutcome::TimedOut) => Err(PipelineError::tool(producer.program(), "timed out")),
        Err(e) => Err(PipelineError::tool(
            producer.program(),
            format!("cannot start: {}", e),
        )),
    }
}

/// Every region must have both matrices before merging starts.
pub fn check_matrices(entries: &[RegionIndexEntry], store: &DirMatrixStore) -> Result<()> {
    let missing: Vec<&str> = entries
        .iter()
        .filter(|e| !store.has_region(&e.index))
        .map(|e| e.index.as_str())
        .collect();
    match missing.first() {
        None => Ok(()),
        Some(first) => Err(PipelineError::Config(format!(
            "{} of {} regions have no matrices, the first is index {}",
            missing.len(),
            entries.len(),
            first
        ))),
    }
}

/// Compare every pair of trees in `tree_file`, replacing `output`.
pub fn run_pairwise(
    metric: &PairwiseMetric,
    tree_file: &std::path::Path,
    output: &std::path::Path,
    threads: usize,
) -> Result<BatchSummary> {
    let reader = crate::libs::io::reader(&tree_file.to_string_lossy())
        .map_err(PipelineError::io(tree_file))?;
    let trees = read_tree_table(reader, tree_file)?;

    if output.exists() {
        std::fs::remove_file(output).map_err(PipelineError::io(output))?;
    }
    let mut writer = crate::libs::io::append_writer(&output.to_string_lossy())
        .map_err(PipelineError::io(output))?;

    let batch = PairwiseBatch::new(threads)?;
    match metric {
        PairwiseMetric::RobinsonFoulds => batch.run(&trees, &RobinsonFouldsMetric, &mut writer),
        PairwiseMetric::Script(script) => batch.run(&trees, script, &mut writer),
    }
}
