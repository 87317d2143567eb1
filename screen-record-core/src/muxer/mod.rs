pub mod metadata;
pub mod writer;

pub use metadata::{read_metadata, write_metadata};
pub use writer::ContainerWriter;
