pub mod libs;

pub use libs::io::{append_writer, reader, replace_file, writer};
