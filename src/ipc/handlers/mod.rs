pub mod core;
pub mod setup;
pub mod summary;
