pub mod file_header;
pub mod file_set;
pub mod location;
pub mod mapped_file;
