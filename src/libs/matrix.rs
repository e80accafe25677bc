use crate::libs::error::{PipelineError, Result};
use log::warn;
use std::fmt::Display;
use std::io::{BufRead, Write};
use std::ops::AddAssign;
use std::path::Path;
use std::str::FromStr;

/// Dense square matrix stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct SquareMatrix<T> {
    size: usize,
    data: Vec<T>,
}

impl<T: Copy + Default> SquareMatrix<T> {
    /// A `size × size` matrix filled with `T::default()`.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            data: vec![T::default(); size * size],
        }
    }

    /// Build from rows. Every row must have `rows.len()` cells.
    ///
    /// ```
    /// use wintree::libs::matrix::SquareMatrix;
    /// let m = SquareMatrix::from_rows(vec![vec![0, 2], vec![2, 0]]).unwrap();
    /// assert_eq!(m.get(0, 1), 2);
    /// assert!(SquareMatrix::from_rows(vec![vec![0, 2], vec![2]]).is_none());
    /// ```
    pub fn from_rows(rows: Vec<Vec<T>>) -> Option<Self> {
        let size = rows.len();
        let mut data = Vec::with_capacity(size * size);
        for row in rows {
            if row.len() != size {
                return None;
            }
            data.extend(row);
        }
        Some(Self { size, data })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[row * self.size + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: T) {
        self.data[row * self.size + col] = value;
    }

    pub fn row(&self, row: usize) -> &[T] {
        &self.data[row * self.size..(row + 1) * self.size]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[T]> {
        // chunks(0) panics, an empty matrix has no rows anyway
        self.data.chunks(self.size.max(1))
    }
}

impl<T: Copy + Default + AddAssign> SquareMatrix<T> {
    /// Elementwise `self += other`. Sizes must agree.
    pub fn add_assign(&mut self, other: &SquareMatrix<T>) -> std::result::Result<(), String> {
        if self.size != other.size {
            return Err(format!(
                "cannot add a {0}x{0} matrix to a {1}x{1} one",
                other.size, self.size
            ));
        }
        for (a, b) in self.data.iter_mut().zip(other.data.iter()) {
            *a += *b;
        }
        Ok(())
    }
}

/// A square matrix with one sample name per row/column.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledMatrix<T> {
    pub names: Vec<String>,
    pub matrix: SquareMatrix<T>,
}

impl<T: Copy + Default> LabeledMatrix<T> {
    pub fn size(&self) -> usize {
        self.names.len()
    }
}

/// Read a labeled matrix: a sequence-count line, then one
/// `name<TAB>v1<TAB>...<TAB>vN` row per sequence.
///
/// `file` is used in error messages only.
pub fn read_matrix<T, R>(reader: R, file: &Path) -> Result<LabeledMatrix<T>>
where
    T: Copy + Default + FromStr,
    R: BufRead,
{
    let mut lines = reader
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l))
        .filter(|(_, l)| l.as_ref().map(|s| !s.trim().is_empty()).unwrap_or(true));

    let (line_no, header) = match lines.next() {
        Some((n, l)) => (n, l.map_err(PipelineError::io(file))?),
        None => return Err(PipelineError::format(file, 1, "empty matrix file")),
    };
    let count = header
        .split_whitespace()
        .next()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(|| {
            PipelineError::format(file, line_no, format!("invalid sequence count `{}`", header.trim()))
        })?;

    // The header count never sizes an allocation
    let mut names = Vec::new();
    let mut rows: Vec<Vec<T>> = Vec::new();

    for row in 0..count {
        let (line_no, line) = match lines.next() {
            Some((n, l)) => (n, l.map_err(PipelineError::io(file))?),
            None => {
                return Err(PipelineError::format(
                    file,
                    line_no + row + 1,
                    format!("expected {} rows, found {}", count, row),
                ))
            }
        };

        let mut fields = line.trim_end().split('\t');
        let name = fields.next().unwrap_or_default().trim();
        if name.is_empty() {
            return Err(PipelineError::format(file, line_no, "missing sequence name"));
        }

        let mut values = Vec::new();
        for field in fields {
            if values.len() >= count {
                return Err(PipelineError::format(
                    file,
                    line_no,
                    format!("more than {} values", count),
                ));
            }
            let value = field.trim().parse::<T>().map_err(|_| {
                PipelineError::format(file, line_no, format!("invalid number `{}`", field))
            })?;
            values.push(value);
        }
        if values.len() != count {
            return Err(PipelineError::format(
                file,
                line_no,
                format!("expected {} values, found {}", count, values.len()),
            ));
        }

        names.push(name.to_string());
        rows.push(values);
    }

    if let Some((line_no, _)) = lines.next() {
        return Err(PipelineError::format(
            file,
            line_no,
            format!("trailing data after {} rows", count),
        ));
    }

    let matrix = SquareMatrix::from_rows(rows)
        .ok_or_else(|| PipelineError::format(file, line_no, "matrix is not square"))?;
    Ok(LabeledMatrix { names, matrix })
}

/// Load a matrix file from disk; `.gz` files are decompressed.
pub fn load_matrix<T>(path: &Path) -> Result<LabeledMatrix<T>>
where
    T: Copy + Default + FromStr,
{
    let reader = crate::libs::io::reader(&path.to_string_lossy()).map_err(PipelineError::io(path))?;
    read_matrix(reader, path)
}

/// Write the format accepted by [`read_matrix`].
pub fn write_matrix<T, W>(writer: &mut W, names: &[String], matrix: &SquareMatrix<T>) -> std::io::Result<()>
where
    T: Copy + Default + Display,
    W: Write,
{
    writeln!(writer, "{}", names.len())?;
    for (name, row) in names.iter().zip(matrix.rows()) {
        write!(writer, "{}", name)?;
        for value in row {
            write!(writer, "\t{}", value)?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Write a phylip-style distance matrix for external tree builders.
///
/// The header is `\t<n>\t<n>`; each name is left-aligned in a 10-column
/// field and never truncated. Longer names are logged, since strict phylip
/// readers such as `neighbor` take the first 10 columns as the name.
///
/// ```
/// use wintree::libs::matrix::{write_phylip, SquareMatrix};
/// let m = SquareMatrix::from_rows(vec![vec![0.0, 0.5], vec![0.5, 0.0]]).unwrap();
/// let names = vec!["A".to_string(), "Sample_0001".to_string()];
/// let mut out = Vec::new();
/// write_phylip(&mut out, &names, &m).unwrap();
/// assert_eq!(
///     String::from_utf8(out).unwrap(),
///     "\t2\t2\nA          0.000000 0.500000\nSample_0001 0.500000 0.000000\n"
/// );
/// ```
pub fn write_phylip<W: Write>(writer: &mut W, names: &[String], matrix: &SquareMatrix<f64>) -> std::io::Result<()> {
    writeln!(writer, "\t{}\t{}", names.len(), matrix.size())?;
    let long: Vec<&str> = long_phylip_names(names);
    if !long.is_empty() {
        warn!(
            "{} names exceed 10 columns and are written in full, e.g. `{}`",
            long.len(),
            long[0]
        );
    }
    for (name, row) in names.iter().zip(matrix.rows()) {
        write!(writer, "{:<10}", name)?;
        for value in row {
            write!(writer, " {:.6}", value)?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

fn long_phylip_names(names: &[String]) -> Vec<&str> {
    names
        .iter()
        .filter(|n| n.chars().count() > 10)
        .map(|n| n.as_str())
        .collect()
}

/// Render a matrix file to a string, for [`crate::replace_file`].
pub fn matrix_to_string<T>(names: &[String], matrix: &SquareMatrix<T>) -> String
where
    T: Copy + Default + Display,
{
    let mut buf = Vec::new();
    // Writing to a Vec never fails
    write_matrix(&mut buf, names, matrix).unwrap();
    String::from_utf8_lossy(&buf).into_owned()
}

pub fn phylip_to_string(names: &[String], matrix: &SquareMatrix<f64>) -> String {
    let mut buf = Vec::new();
    write_phylip(&mut buf, names, matrix).unwrap();
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_read_matrix() {
        let input = "3\nS1\t0\t2\t3\nS2\t2\t0\t1\nS3\t3\t1\t0\n";
        let m: LabeledMatrix<i64> = read_matrix(input.as_bytes(), Path::new("m")).unwrap();
        assert_eq!(m.names, names(&["S1", "S2", "S3"]));
        assert_eq!(m.matrix.get(0, 2), 3);
        assert_eq!(m.matrix.get(2, 1), 1);
    }

    #[test]
    fn test_read_matrix_errors() {
        let cases = [
            ("", 1),
            ("x\n", 1),
            ("2\nS1\t0\t1\n", 3),
            ("2\nS1\t0\t1\nS2\t1\n", 3),
            ("2\nS1\t0\t1\nS2\t1\t0\t9\n", 3),
            ("2\nS1\t0\tNA\nS2\t1\t0\n", 2),
            ("2\nS1\t0\t1\nS2\t1\t0\nS3\t1\t0\n", 4),
        ];
        for (input, expected_line) in cases {
            let res: Result<LabeledMatrix<i64>> = read_matrix(input.as_bytes(), Path::new("m"));
            match res {
                Err(PipelineError::Format { line, .. }) => assert_eq!(line, expected_line, "{:?}", input),
                other => panic!("{:?}: unexpected {:?}", input, other),
            }
        }
    }

    #[test]
    fn test_read_matrix_huge_count() {
        let input = "4294967296\nS1\t0\n";
        let res: Result<LabeledMatrix<f64>> = read_matrix(input.as_bytes(), Path::new("m"));
        match res {
            Err(PipelineError::Format { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_write_read_float() {
        let m = SquareMatrix::from_rows(vec![
            vec![0.0, 0.1073569, 1.0 / 3.0],
            vec![0.1073569, 0.0, 2e-7],
            vec![1.0 / 3.0, 2e-7, 0.0],
        ])
        .unwrap();
        let n = names(&["A", "B", "C"]);
        let text = matrix_to_string(&n, &m);
        let back: LabeledMatrix<f64> = read_matrix(text.as_bytes(), Path::new("m")).unwrap();
        assert_eq!(back.names, n);
        assert_eq!(back.matrix, m);
    }

    #[test]
    fn test_phylip_long_names() {
        let n = names(&["S1", "Sample_0001", "0123456789"]);
        assert_eq!(long_phylip_names(&n), vec!["Sample_0001"]);

        let m = SquareMatrix::from_rows(vec![vec![0.0; 3]; 3]).unwrap();
        let text = phylip_to_string(&n, &m);
        let rows: Vec<&str> = text.lines().skip(1).collect();
        assert!(rows[1].starts_with("Sample_0001 0.000000"));
        assert!(rows[2].starts_with("0123456789 0.000000"));
    }

    #[test]
    fn test_add_assign() {
        let mut a = SquareMatrix::from_rows(vec![vec![0i64, 2], vec![2, 0]]).unwrap();
        let b = SquareMatrix::from_rows(vec![vec![0i64, 3], vec![3, 0]]).unwrap();
        a.add_assign(&b).unwrap();
        assert_eq!(a.get(0, 1), 5);
        assert!(a.add_assign(&SquareMatrix::new(3)).is_err());
    }
}
