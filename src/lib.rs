//! lzc-dtl - docker-compose to LazyCat converter
//!
//! Resolves the volumes, routes and images of a compose project into a
//! LazyCat application manifest and packages it with the icon and any
//! host content as an `.lpk` archive.

pub mod answers;
pub mod cache;
pub mod cli;
pub mod compose;
pub mod config;
pub mod engine;
pub mod error;
pub mod manifest;
pub mod orchestration;
pub mod package;
pub mod resolve;
pub mod ui;

#[cfg(test)]
mod testing;

pub use error::{DtlError, DtlResult};
