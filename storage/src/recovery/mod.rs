pub mod event;
pub mod scanner;
pub mod summary;
