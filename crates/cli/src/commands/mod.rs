//! CLI command implementations. Each returns the JSON printed on stdout.

pub mod assignment;
pub mod catalog;
