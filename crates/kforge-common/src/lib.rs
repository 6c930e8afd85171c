//! # kforge-common
//!
//! Shared settings types, error definitions, configuration models, and
//! constants used across the entire kforge workspace.
//!
//! This crate is the leaf of the dependency graph: it depends on no other
//! internal crate and provides the primitives every recipe, driver and
//! release tool is expressed in.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
