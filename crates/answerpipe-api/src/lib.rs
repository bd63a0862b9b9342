//! `answerpipe` crate (library surface).
//!
//! The primary entrypoint for end users is the `answerpipe` binary (CLI +
//! HTTP server). This library module exists to support embedding and
//! integration tests without depending on internal crate layout.

pub use answerpipe_core as core;

pub mod answer;
pub mod http;
pub mod refine;
