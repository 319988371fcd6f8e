//! Configuration loading

pub mod loader;

pub use loader::{load, read_config_file};
