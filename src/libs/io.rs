use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Open a file for buffered reading. `stdin` reads standard input and a
/// `.gz` extension is decompressed on the fly.
///
/// ```
/// use std::io::BufRead;
/// let dir = tempfile::tempdir().unwrap();
/// let path = dir.path().join("chr.sizes");
/// std::fs::write(&path, "Chr01\t100\nChr02\t80\n").unwrap();
///
/// let reader = wintree::reader(path.to_str().unwrap()).unwrap();
/// assert_eq!(reader.lines().count(), 2);
///
/// assert!(wintree::reader("no/such/file").is_err());
/// ```
pub fn reader(input: &str) -> std::io::Result<Box<dyn BufRead>> {
    let reader: Box<dyn BufRead> = if input == "stdin" {
        Box::new(BufReader::new(std::io::stdin()))
    } else {
        let path = Path::new(input);
        let file = std::fs::File::open(path)?;

        if path.extension() == Some(std::ffi::OsStr::new("gz")) {
            Box::new(BufReader::new(flate2::read::MultiGzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        }
    };

    Ok(reader)
}

/// Create (truncate) a file for buffered writing, `stdout` for the screen.
pub fn writer(output: &str) -> std::io::Result<Box<dyn Write>> {
    let writer: Box<dyn Write> = if output == "stdout" {
        Box::new(BufWriter::new(std::io::stdout()))
    } else {
        Box::new(BufWriter::new(std::fs::File::create(output)?))
    };

    Ok(writer)
}

/// Open a file in append mode, creating it when absent.
pub fn append_writer(output: &str) -> std::io::Result<Box<dyn Write>> {
    let writer: Box<dyn Write> = if output == "stdout" {
        Box::new(BufWriter::new(std::io::stdout()))
    } else {
        let file = OpenOptions::new().create(true).append(true).open(output)?;
        Box::new(BufWriter::new(file))
    };

    Ok(writer)
}

/// Remove `path` if it exists, then write `contents` to it.
/// Last writer wins; there is no versioning of earlier results.
pub fn replace_file(path: &Path, contents: &str) -> std::io::Result<()> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    std::fs::write(path, contents)
}
