//! Database implementations

pub mod manager;
pub mod sync_history_repository;
pub mod token_repository;

pub use manager::*;
pub use sync_history_repository::*;
pub use token_repository::*;
