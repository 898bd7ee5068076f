pub mod details;
pub mod namespace;
