pub mod codec;
pub mod repair;
