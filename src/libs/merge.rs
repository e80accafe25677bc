use crate::libs::error::{PipelineError, Result};
use crate::libs::filter::{RegionFilterCatalog, ALL_GROUP};
use crate::libs::matrix::{load_matrix, matrix_to_string, LabeledMatrix, SquareMatrix};
use crate::libs::region::{RegionIndexEntry, RegionIndexReader};
use indexmap::IndexMap;
use log::{debug, info};
use std::path::{Path, PathBuf};

/// The two per-region matrices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixKind {
    /// Sites where both samples are called
    NonMissing,
    /// Sites where the two samples differ
    Diff,
}

impl MatrixKind {
    pub fn suffix(&self) -> &'static str {
        match self {
            MatrixKind::NonMissing => "nm",
            MatrixKind::Diff => "diff",
        }
    }
}

/// Where per-region matrices come from.
pub trait MatrixSource {
    fn load(&self, index: &str, kind: MatrixKind) -> Result<LabeledMatrix<i64>>;
}

/// Per-region matrices laid out as `<dir>/<index>.<nm|diff>.mat[.gz]`.
#[derive(Debug, Clone)]
pub struct DirMatrixStore {
    dir: PathBuf,
}

impl DirMatrixStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Uncompressed path of a matrix file.
    ///
    /// ```
    /// use wintree::libs::merge::{DirMatrixStore, MatrixKind};
    /// let store = DirMatrixStore::new("mat");
    /// let p = store.path_of("17", MatrixKind::Diff);
    /// assert_eq!(p, std::path::Path::new("mat/17.diff.mat"));
    /// ```
    pub fn path_of(&self, index: &str, kind: MatrixKind) -> PathBuf {
        self.dir.join(format!("{}.{}.mat", index, kind.suffix()))
    }

    /// Existing file for this index and kind, plain or gzipped.
    pub fn locate(&self, index: &str, kind: MatrixKind) -> Option<PathBuf> {
        let plain = self.path_of(index, kind);
        if plain.is_file() {
            return Some(plain);
        }
        let mut gz = plain.into_os_string();
        gz.push(".gz");
        let gz = PathBuf::from(gz);
        if gz.is_file() {
            Some(gz)
        } else {
            None
        }
    }

    /// Both matrix files of a region are present.
    pub fn has_region(&self, index: &str) -> bool {
        self.locate(index, MatrixKind::NonMissing).is_some()
            && self.locate(index, MatrixKind::Diff).is_some()
    }
}

impl MatrixSource for DirMatrixStore {
    fn load(&self, index: &str, kind: MatrixKind) -> Result<LabeledMatrix<i64>> {
        let path = self.locate(index, kind).unwrap_or_else(|| self.path_of(index, kind));
        load_matrix(&path)
    }
}

/// Running sums of one named group.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateMatrixPair {
    pub non_missing: SquareMatrix<i64>,
    pub diff: SquareMatrix<i64>,
}

impl AggregateMatrixPair {
    pub fn new(size: usize) -> Self {
        Self {
            non_missing: SquareMatrix::new(size),
            diff: SquareMatrix::new(size),
        }
    }

    pub fn size(&self) -> usize {
        self.non_missing.size()
    }

    /// Elementwise sum with another aggregate of the same size.
    pub fn add(&mut self, other: &AggregateMatrixPair) -> std::result::Result<(), String> {
        self.non_missing.add_assign(&other.non_missing)?;
        self.diff.add_assign(&other.diff)
    }
}

/// Counters of one merge run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub regions_read: usize,
    /// Regions accepted by no group
    pub regions_unassigned: usize,
    pub regions_per_group: IndexMap<String, usize>,
}

#[derive(Debug, Clone)]
pub struct MergeOutput {
    /// Sample order shared by every matrix
    pub names: Vec<String>,
    pub groups: IndexMap<String, AggregateMatrixPair>,
    pub stats: MergeStats,
}

/// Sums per-region count matrices into one aggregate pair per group.
///
/// Every call reads the region index once; merging the same index twice
/// into one aggregate doubles the counts.
pub struct MatrixMerger<'a, S: MatrixSource> {
    source: &'a S,
    catalog: &'a RegionFilterCatalog,
    expected_seq_num: usize,
}

impl<'a, S: MatrixSource> MatrixMerger<'a, S> {
    pub fn new(source: &'a S, catalog: &'a RegionFilterCatalog, expected_seq_num: usize) -> Self {
        Self {
            source,
            catalog,
            expected_seq_num,
        }
    }

    /// Stream the region-index file and merge every region.
    pub fn merge(&self, index_file: &Path) -> Result<MergeOutput> {
        info!("Merging regions listed in {}", index_file.display());
        self.merge_entries(RegionIndexReader::open(index_file)?)
    }

    /// Merge from any sequence of entries. The first error aborts the run.
    pub fn merge_entries<I>(&self, entries: I) -> Result<MergeOutput>
    where
        I: IntoIterator<Item = Result<RegionIndexEntry>>,
    {
        if self.expected_seq_num == 0 {
            return Err(PipelineError::Config(
                "the number of sequences must be positive".to_string(),
            ));
        }

        let mut groups: IndexMap<String, AggregateMatrixPair> = self
            .catalog
            .names()
            .map(|name| (name.to_string(), AggregateMatrixPair::new(self.expected_seq_num)))
            .collect();
        let mut stats = MergeStats {
            regions_per_group: self.catalog.names().map(|name| (name.to_string(), 0)).collect(),
            ..Default::default()
        };
        let mut names: Option<Vec<String>> = None;

        for entry in entries {
            let entry = entry?;
            let nm = self.load_checked(&entry, MatrixKind::NonMissing, &mut names)?;
            let diff = self.load_checked(&entry, MatrixKind::Diff, &mut names)?;
            stats.regions_read += 1;

            let mut assigned = 0;
            for group in self.catalog.matching(&entry.region) {
                // Both maps were built from the same catalog
                let agg = groups.get_mut(group).unwrap();
                agg.non_missing
                    .add_assign(&nm.matrix)
                    .map_err(|msg| PipelineError::consistency(&entry.index, msg))?;
                agg.diff
                    .add_assign(&diff.matrix)
                    .map_err(|msg| PipelineError::consistency(&entry.index, msg))?;
                *stats.regions_per_group.get_mut(group).unwrap() += 1;
                assigned += 1;
            }
            if assigned == 0 {
                stats.regions_unassigned += 1;
            }
            debug!("Region {} ({}) added to {} group(s)", entry.index, entry.region, assigned);
        }

        let names = names.ok_or_else(|| {
            PipelineError::consistency("-", "the region index lists no regions")
        })?;
        info!(
            "Merged {} regions of {} sequences into {} groups",
            stats.regions_read,
            names.len(),
            groups.len()
        );

        Ok(MergeOutput {
            names,
            groups,
            stats,
        })
    }

    fn load_checked(
        &self,
        entry: &RegionIndexEntry,
        kind: MatrixKind,
        names: &mut Option<Vec<String>>,
    ) -> Result<LabeledMatrix<i64>> {
        let matrix = self.source.load(&entry.index, kind)?;

        if matrix.size() != self.expected_seq_num {
            return Err(PipelineError::consistency(
                &entry.index,
                format!(
                    "{} matrix has {} sequences, expected {}",
                    kind.suffix(),
                    matrix.size(),
                    self.expected_seq_num
                ),
            ));
        }

        match names {
            None => *names = Some(matrix.names.clone()),
            Some(expected) => {
                if let Some(pos) = expected
                    .iter()
                    .zip(matrix.names.iter())
                    .position(|(a, b)| a != b)
                {
                    return Err(PipelineError::consistency(
                        &entry.index,
                        format!(
                            "{} matrix has sequence `{}` at position {}, expected `{}`",
                            kind.suffix(),
                            matrix.names[pos],
                            pos + 1,
                            expected[pos]
                        ),
                    ));
                }
            }
        }

        Ok(matrix)
    }
}

/// Write `<g>.nm.mat` and `<g>.diff.mat` for every group, replacing older files.
///
/// The names match [`DirMatrixStore`], so the directory can be read back with
/// the group name as index.
pub fn write_aggregates(
    outdir: &Path,
    names: &[String],
    groups: &IndexMap<String, AggregateMatrixPair>,
) -> Result<()> {
    std::fs::create_dir_all(outdir).map_err(PipelineError::io(outdir))?;
    for (group, agg) in groups {
        for (kind, matrix) in [
            (MatrixKind::NonMissing, &agg.non_missing),
            (MatrixKind::Diff, &agg.diff),
        ] {
            let path = outdir.join(format!("{}.{}.mat", group, kind.suffix()));
            crate::libs::io::replace_file(&path, &matrix_to_string(names, matrix))
                .map_err(PipelineError::io(&path))?;
        }
    }
    Ok(())
}

/// Group names with both matrices in `dir`, `all_chrom` first, then sorted.
pub fn list_groups(dir: &Path) -> Result<Vec<String>> {
    let store = DirMatrixStore::new(dir);
    let suffix = format!(".{}.mat", MatrixKind::NonMissing.suffix());

    let mut groups = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(PipelineError::io(dir))? {
        let entry = entry.map_err(PipelineError::io(dir))?;
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if let Some(group) = file_name.strip_suffix(&suffix) {
            if !group.is_empty() && store.has_region(group) {
                groups.push(group.to_string());
            }
        }
    }

    groups.sort_by(|a, b| (a.as_str() != ALL_GROUP, a).cmp(&(b.as_str() != ALL_GROUP, b)));
    Ok(groups)
}

/// Load previously merged groups. All matrices must share one name list.
pub fn load_aggregates<S: MatrixSource>(
    source: &S,
    groups: &[String],
) -> Result<(Vec<String>, IndexMap<String, AggregateMatrixPair>)> {
    let mut names: Option<Vec<String>> = None;
    let mut aggregates = IndexMap::new();

    for group in groups {
        let nm = source.load(group, MatrixKind::NonMissing)?;
        let diff = source.load(group, MatrixKind::Diff)?;
        for matrix in [&nm, &diff] {
            let expected = names.get_or_insert_with(|| matrix.names.clone());
            if expected != &matrix.names {
                return Err(PipelineError::consistency(
                    group.as_str(),
                    "sequence names differ from the first group",
                ));
            }
        }
        aggregates.insert(
            group.clone(),
            AggregateMatrixPair {
                non_missing: nm.matrix,
                diff: diff.matrix,
            },
        );
    }

    let names = names.ok_or_else(|| PipelineError::Config("no groups to load".to_string()))?;
    Ok((names, aggregates))
}
