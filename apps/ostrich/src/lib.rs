//! # ostrich
//!
//! Command layer of the `ostrich` binary, exposed as a library so the
//! commands can be driven from tests.

pub mod cli;
pub mod config;
