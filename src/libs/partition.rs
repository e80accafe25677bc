use crate::libs::error::{PipelineError, Result};
use crate::libs::region::{Region, RegionIndexEntry};
use std::io::{BufRead, Write};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionOpts {
    /// Window size in bp
    pub window: u64,
    /// Chromosomes shorter than this are skipped
    pub min_len: u64,
    /// Emit the trailing window shorter than `window`
    pub keep_short: bool,
}

impl PartitionOpts {
    pub fn validate(&self) -> Result<()> {
        if self.window == 0 {
            return Err(PipelineError::Config(
                "window size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Read a chromosome-size table.
///
/// Each line is `name` and `length` separated by a tab, spaces or a comma.
/// `file` is only used in error messages.
pub fn read_sizes<R: BufRead>(reader: R, file: &Path) -> Result<Vec<(String, u64)>> {
    let mut sizes = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(PipelineError::io(file))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = trimmed
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .collect();
        if fields.len() != 2 {
            return Err(PipelineError::format(
                file,
                i + 1,
                format!("expected `name, length`, found `{}`", trimmed),
            ));
        }

        let length = match fields[1].parse::<u64>() {
            Ok(l) if l > 0 => l,
            _ => {
                return Err(PipelineError::format(
                    file,
                    i + 1,
                    format!("`{}` is not a positive length", fields[1]),
                ))
            }
        };
        sizes.push((fields[0].to_string(), length));
    }

    Ok(sizes)
}

/// Split chromosomes into consecutive windows.
///
/// ```
/// use wintree::libs::partition::{partition, PartitionOpts};
/// let sizes = vec![("Chr1".to_string(), 250), ("Chr2".to_string(), 50)];
/// let opts = PartitionOpts { window: 100, min_len: 60, keep_short: true };
/// let regions = partition(&sizes, &opts);
///
/// let strs: Vec<String> = regions.iter().map(|r| r.to_string()).collect();
/// assert_eq!(strs, vec!["Chr1:1-100", "Chr1:101-200", "Chr1:201-250"]);
/// ```
pub fn partition(sizes: &[(String, u64)], opts: &PartitionOpts) -> Vec<Region> {
    let mut regions = Vec::new();
    if opts.window == 0 {
        return regions;
    }

    for (chrom, length) in sizes {
        let length = *length;
        if length < opts.min_len || chrom.is_empty() {
            continue;
        }

        let mut start = 1;
        while start + opts.window - 1 <= length {
            let end = start + opts.window - 1;
            // start > 0 and start <= end always hold here
            regions.push(Region::new(chrom.as_str(), start, end).unwrap());
            start = end + 1;
        }

        // Leftover, strictly shorter than a window
        if start <= length && opts.keep_short {
            regions.push(Region::new(chrom.as_str(), start, length).unwrap());
        }
    }

    regions
}

/// Attach 1-based running indices.
pub fn index_regions(regions: Vec<Region>) -> Vec<RegionIndexEntry> {
    regions
        .into_iter()
        .enumerate()
        .map(|(i, region)| RegionIndexEntry {
            region,
            index: (i + 1).to_string(),
        })
        .collect()
}

pub fn write_region_index<W: Write>(entries: &[RegionIndexEntry], writer: &mut W) -> std::io::Result<()> {
    for entry in entries {
        writeln!(writer, "{}", entry)?;
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(window: u64, min_len: u64, keep_short: bool) -> PartitionOpts {
        PartitionOpts {
            window,
            min_len,
            keep_short,
        }
    }

    fn check_tiling(regions: &[Region], length: u64, window: u64, keep_short: bool) {
        let mut expected_start = 1;
        for r in regions {
            assert_eq!(r.start(), expected_start, "gap or overlap at {}", r);
            assert!(r.len() <= window);
            expected_start = r.end() + 1;
        }
        let total: u64 = regions.iter().map(|r| r.len()).sum();
        if keep_short {
            assert_eq!(total, length);
        } else {
            assert_eq!(total, length - length % window);
        }
    }

    #[test]
    fn test_partition_tiling() {
        for &length in &[1u64, 99, 100, 101, 199, 200, 1000, 1234] {
            for &window in &[1u64, 7, 100, 150] {
                for &keep in &[true, false] {
                    let sizes = vec![("Chr1".to_string(), length)];
                    let regions = partition(&sizes, &opts(window, 1, keep));
                    check_tiling(&regions, length, window, keep);
                }
            }
        }
    }

    #[test]
    fn test_partition_exact_multiple() {
        let sizes = vec![("Chr1".to_string(), 200)];
        for keep in [true, false] {
            let regions = partition(&sizes, &opts(100, 1, keep));
            assert_eq!(regions.len(), 2);
            assert_eq!(regions[1].to_string(), "Chr1:101-200");
        }
    }

    #[test]
    fn test_partition_drop_short() {
        let sizes = vec![("Chr1".to_string(), 250)];
        let regions = partition(&sizes, &opts(100, 1, false));
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[1].end(), 200);
    }

    #[test]
    fn test_partition_min_len_and_order() {
        let sizes = vec![
            ("ChrB".to_string(), 300),
            ("scaffold_9".to_string(), 99),
            ("ChrA".to_string(), 100),
        ];
        let regions = partition(&sizes, &opts(100, 100, true));
        let chroms: Vec<&str> = regions.iter().map(|r| r.chrom()).collect();
        assert_eq!(chroms, vec!["ChrB", "ChrB", "ChrB", "ChrA"]);
    }

    #[test]
    fn test_read_sizes() {
        let input = "Chr01\t300\nChr02, 200\n\n# comment\nChr03   100\n";
        let sizes = read_sizes(input.as_bytes(), Path::new("sizes")).unwrap();
        assert_eq!(
            sizes,
            vec![
                ("Chr01".to_string(), 300),
                ("Chr02".to_string(), 200),
                ("Chr03".to_string(), 100)
            ]
        );

        for bad in ["Chr01\tabc\n", "Chr01\t0\n", "Chr01\n", "Chr01\t-5\n"] {
            let err = read_sizes(bad.as_bytes(), Path::new("sizes")).unwrap_err();
            assert!(matches!(err, PipelineError::Format { line: 1, .. }), "{}", bad);
        }
    }

    #[test]
    fn test_write_region_index() {
        let sizes = vec![("Chr1".to_string(), 150)];
        let entries = index_regions(partition(&sizes, &opts(100, 1, true)));
        let mut out = Vec::new();
        write_region_index(&entries, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Chr1\t1\t100\t1\nChr1\t101\t150\t2\n"
        );
    }
}
