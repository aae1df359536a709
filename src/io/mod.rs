//! I/O layer: read-only access to the input file.

mod mapped;

pub use mapped::MappedFile;
