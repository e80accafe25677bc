use crate::libs::error::{PipelineError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::str::FromStr;

lazy_static! {
    static ref RE_REGION: Regex = Regex::new(r"^(?P<chrom>.+):(?P<start>\d+)-(?P<end>\d+)$").unwrap();
}

/// A 1-based, inclusive interval on a named sequence.
///
/// Fields are ordered so that the derived ordering compares `chrom` first,
/// then `start`, then `end`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Region {
    chrom: String,
    start: u64,
    end: u64,
}

#[allow(clippy::len_without_is_empty)]
impl Region {
    /// ```
    /// use wintree::libs::region::Region;
    /// let r = Region::new("Chr01", 1, 100).unwrap();
    /// assert_eq!(r.to_string(), "Chr01:1-100");
    /// assert_eq!(r.len(), 100);
    ///
    /// assert!(Region::new("Chr01", 0, 100).is_err());
    /// assert!(Region::new("Chr01", 10, 9).is_err());
    /// assert!(Region::new("", 1, 9).is_err());
    /// ```
    pub fn new(chrom: impl Into<String>, start: u64, end: u64) -> Result<Self> {
        let chrom = chrom.into();
        if chrom.is_empty() {
            return Err(PipelineError::Config("empty chromosome name".to_string()));
        }
        if start == 0 || end == 0 {
            return Err(PipelineError::Config(format!(
                "{}:{}-{}: coordinates are 1-based",
                chrom, start, end
            )));
        }
        if start > end {
            return Err(PipelineError::Config(format!(
                "{}:{}-{}: start is after end",
                chrom, start, end
            )));
        }
        Ok(Self { chrom, start, end })
    }

    pub fn chrom(&self) -> &str {
        &self.chrom
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Same chromosome and the inclusive intervals intersect.
    pub fn overlaps(&self, other: &Region) -> bool {
        self.chrom == other.chrom && self.start <= other.end && other.start <= self.end
    }

    /// Name usable as a file stem, `chrom_start_end`.
    pub fn file_stem(&self) -> String {
        format!("{}_{}_{}", self.chrom, self.start, self.end)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chrom, self.start, self.end)
    }
}

impl FromStr for Region {
    type Err = PipelineError;

    /// ```
    /// use wintree::libs::region::Region;
    /// let r: Region = "scaffold:7:11-20".parse().unwrap();
    /// assert_eq!(r.chrom(), "scaffold:7");
    /// assert_eq!(r.start(), 11);
    /// assert!("Chr01".parse::<Region>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self> {
        let caps = RE_REGION
            .captures(s.trim())
            .ok_or_else(|| PipelineError::Config(format!("`{}` is not chrom:start-end", s)))?;
        let start = caps["start"]
            .parse::<u64>()
            .map_err(|e| PipelineError::Config(format!("{}: {}", s, e)))?;
        let end = caps["end"]
            .parse::<u64>()
            .map_err(|e| PipelineError::Config(format!("{}: {}", s, e)))?;
        Region::new(&caps["chrom"], start, end)
    }
}

/// One line of a region-index file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionIndexEntry {
    pub region: Region,
    /// Key used to locate this region's matrix files. Free-form.
    pub index: String,
}

impl RegionIndexEntry {
    /// Parse `chrom start end index` (any whitespace between columns).
    pub fn parse_line(line: &str) -> std::result::Result<Self, String> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 4 {
            return Err(format!("expected 4 columns, found {}", fields.len()));
        }
        let start = fields[1]
            .parse::<u64>()
            .map_err(|_| format!("invalid start `{}`", fields[1]))?;
        let end = fields[2]
            .parse::<u64>()
            .map_err(|_| format!("invalid end `{}`", fields[2]))?;
        let region = Region::new(fields[0], start, end).map_err(|e| e.to_string())?;

        Ok(Self {
            region,
            index: fields[3].to_string(),
        })
    }
}

impl fmt::Display for RegionIndexEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}",
            self.region.chrom, self.region.start, self.region.end, self.index
        )
    }
}

/// Streams the entries of a region-index file, one line at a time.
/// Blank lines and `#` comments are skipped.
pub struct RegionIndexReader {
    path: PathBuf,
    lines: std::io::Lines<Box<dyn BufRead>>,
    line_no: usize,
}

impl RegionIndexReader {
    pub fn open(path: &Path) -> Result<Self> {
        let reader = crate::libs::io::reader(&path.to_string_lossy())
            .map_err(PipelineError::io(path))?;
        Ok(Self {
            path: path.to_path_buf(),
            lines: reader.lines(),
            line_no: 0,
        })
    }
}

impl Iterator for RegionIndexReader {
    type Item = Result<RegionIndexEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(PipelineError::io(&self.path)(e))),
            };
            self.line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            return Some(
                RegionIndexEntry::parse_line(trimmed)
                    .map_err(|msg| PipelineError::format(&self.path, self.line_no, msg)),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_order() {
        let mut regions = vec![
            Region::new("Chr02", 1, 100).unwrap(),
            Region::new("Chr01", 101, 200).unwrap(),
            Region::new("Chr01", 1, 100).unwrap(),
            Region::new("Chr01", 1, 50).unwrap(),
        ];
        regions.sort();
        let strs: Vec<String> = regions.iter().map(|r| r.to_string()).collect();
        assert_eq!(
            strs,
            vec!["Chr01:1-50", "Chr01:1-100", "Chr01:101-200", "Chr02:1-100"]
        );
    }

    #[test]
    fn test_region_overlaps() {
        let a = Region::new("Chr01", 1, 100).unwrap();
        let b = Region::new("Chr01", 100, 200).unwrap();
        let c = Region::new("Chr01", 101, 200).unwrap();
        let d = Region::new("Chr02", 1, 100).unwrap();

        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
        assert!(!a.overlaps(&d));
    }

    #[test]
    fn test_region_roundtrip_text() {
        let r = Region::new("Chr01", 101, 200).unwrap();
        let parsed: Region = r.to_string().parse().unwrap();
        assert_eq!(r, parsed);
        assert_eq!(r.file_stem(), "Chr01_101_200");
    }

    #[test]
    fn test_index_entry_parse() {
        let e = RegionIndexEntry::parse_line("Chr1  1\t100 w0001").unwrap();
        assert_eq!(e.region, Region::new("Chr1", 1, 100).unwrap());
        assert_eq!(e.index, "w0001");
        assert_eq!(e.to_string(), "Chr1\t1\t100\tw0001");

        assert!(RegionIndexEntry::parse_line("Chr1 1 100").is_err());
        assert_eq!(
            RegionIndexEntry::parse_line("Chr1 1 100 w0001 extra").unwrap_err(),
            "expected 4 columns, found 5"
        );
        assert!(RegionIndexEntry::parse_line("Chr1 a 100 1").is_err());
        assert!(RegionIndexEntry::parse_line("Chr1 200 100 1").is_err());
    }

    #[test]
    fn test_index_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regions.tsv");
        std::fs::write(&path, "# chrom start end index\nChr1 1 100 1\n\nChr1 101 200 2\n").unwrap();

        let entries: Vec<RegionIndexEntry> = RegionIndexReader::open(&path)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].index, "2");

        std::fs::write(&path, "Chr1 1 100 1\nbroken\n").unwrap();
        let err = RegionIndexReader::open(&path)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap_err();
        match err {
            PipelineError::Format { line, .. } => assert_eq!(line, 2),
            e => panic!("unexpected error {:?}", e),
        }
    }
}
