//! # kforge-build
//!
//! Executes the build plans produced by `kforge-recipe`:
//! - **Runner**: external tools with explicit argument lists.
//! - **Fetch**: cached downloads, SHA-256 verification, archive unpacking.
//! - **Installer**: unattended vendor installers, including disk images.
//! - **Driver**: step execution, artifact validation, manifest export and
//!   whole-graph builds in dependency order.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod driver;
pub mod fetch;
pub mod hash;
pub mod installer;
pub mod runner;
pub mod staging;
