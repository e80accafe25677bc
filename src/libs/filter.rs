use crate::libs::error::{PipelineError, Result};
use crate::libs::region::{Region, RegionIndexReader};
use indexmap::{IndexMap, IndexSet};
use std::path::Path;

/// Group name of the catch-all predicate.
pub const ALL_GROUP: &str = "all_chrom";

/// Membership test deciding which aggregate a region rolls into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionFilter {
    /// Every region
    All,
    /// Regions on this chromosome
    Chrom(String),
    /// Regions overlapping this interval
    Overlaps(Region),
}

impl RegionFilter {
    pub fn accepts(&self, region: &Region) -> bool {
        match self {
            RegionFilter::All => true,
            RegionFilter::Chrom(name) => region.chrom() == name,
            RegionFilter::Overlaps(target) => target.overlaps(region),
        }
    }
}

/// Ordered set of named predicates.
///
/// Assignment is not deduplicated: a region accepted by two groups is
/// counted in both aggregates.
#[derive(Debug, Clone, Default)]
pub struct RegionFilterCatalog {
    groups: IndexMap<String, RegionFilter>,
}

impl RegionFilterCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with only the whole-genome group.
    pub fn whole_genome() -> Self {
        let mut catalog = Self::new();
        catalog.groups.insert(ALL_GROUP.to_string(), RegionFilter::All);
        catalog
    }

    pub fn with_group(mut self, name: impl Into<String>, filter: RegionFilter) -> Result<Self> {
        self.insert(name.into(), filter)?;
        Ok(self)
    }

    fn insert(&mut self, name: String, filter: RegionFilter) -> Result<()> {
        if name.is_empty() {
            return Err(PipelineError::Config("empty group name".to_string()));
        }
        if self.groups.contains_key(&name) {
            return Err(PipelineError::Config(format!(
                "duplicated group name `{}`",
                name
            )));
        }
        self.groups.insert(name, filter);
        Ok(())
    }

    /// Add one group per distinct chromosome of the region index, in the
    /// order chromosomes are first seen, and optionally one group per window.
    ///
    /// A chromosome group whose name is already taken (e.g. a chromosome
    /// literally called `all_chrom`) is a configuration error.
    pub fn scan_index(mut self, index_file: &Path, per_chrom: bool, per_window: bool) -> Result<Self> {
        if !per_chrom && !per_window {
            return Ok(self);
        }

        let mut chroms: IndexSet<String> = IndexSet::new();
        let mut windows = Vec::new();
        for entry in RegionIndexReader::open(index_file)? {
            let entry = entry?;
            if per_chrom {
                chroms.insert(entry.region.chrom().to_string());
            }
            if per_window {
                windows.push(entry.region);
            }
        }

        for chrom in chroms {
            self.insert(chrom.clone(), RegionFilter::Chrom(chrom))?;
        }
        for region in windows {
            self.insert(region.file_stem(), RegionFilter::Overlaps(region))?;
        }

        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RegionFilter)> {
        self.groups.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Names of every group accepting `region`.
    pub fn matching<'a>(&'a self, region: &'a Region) -> impl Iterator<Item = &'a str> + 'a {
        self.groups
            .iter()
            .filter(move |(_, f)| f.accepts(region))
            .map(|(k, _)| k.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters() {
        let r = Region::new("Chr01", 101, 200).unwrap();
        assert!(RegionFilter::All.accepts(&r));
        assert!(RegionFilter::Chrom("Chr01".to_string()).accepts(&r));
        assert!(!RegionFilter::Chrom("Chr02".to_string()).accepts(&r));
        assert!(RegionFilter::Overlaps(Region::new("Chr01", 150, 400).unwrap()).accepts(&r));
        assert!(!RegionFilter::Overlaps(Region::new("Chr01", 201, 400).unwrap()).accepts(&r));
    }

    #[test]
    fn test_scan_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regions.tsv");
        std::fs::write(
            &path,
            "Chr02\t1\t100\t1\nChr01\t1\t100\t2\nChr02\t101\t200\t3\n",
        )
        .unwrap();

        let catalog = RegionFilterCatalog::whole_genome()
            .scan_index(&path, true, false)
            .unwrap();
        let names: Vec<&str> = catalog.names().collect();
        assert_eq!(names, vec![ALL_GROUP, "Chr02", "Chr01"]);

        // A region belongs to both the catch-all and its chromosome
        let r = Region::new("Chr02", 101, 200).unwrap();
        let hits: Vec<&str> = catalog.matching(&r).collect();
        assert_eq!(hits, vec![ALL_GROUP, "Chr02"]);

        let catalog = RegionFilterCatalog::whole_genome()
            .scan_index(&path, false, true)
            .unwrap();
        let names: Vec<&str> = catalog.names().collect();
        assert_eq!(
            names,
            vec![ALL_GROUP, "Chr02_1_100", "Chr01_1_100", "Chr02_101_200"]
        );
    }

    #[test]
    fn test_duplicated_group() {
        let res = RegionFilterCatalog::whole_genome().with_group(ALL_GROUP, RegionFilter::All);
        assert!(matches!(res, Err(PipelineError::Config(_))));
    }
}
