pub mod extent;
pub mod record;
pub mod walker;
