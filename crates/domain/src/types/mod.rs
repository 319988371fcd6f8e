//! Domain type definitions

pub mod calendar;

pub use calendar::*;
