//! Core types and trait definitions for the ecosystem health index.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod aggregate;
pub mod error;
pub mod geo;
pub mod scoring;
pub mod site;
pub mod source;
pub mod store;

pub use error::{Error, Result};
