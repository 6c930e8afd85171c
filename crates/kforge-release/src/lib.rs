//! # kforge-release
//!
//! Release tooling for the desktop client:
//!
//! - [`version`]: release version and date arguments.
//! - [`translate`]: machine translation client.
//! - [`notes`]: per-language, per-OS release notes.
//! - [`appcast`]: update feed rewriting.
//! - [`ts`]: filling unfinished entries of Qt `.ts` files.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod appcast;
pub mod notes;
pub mod translate;
pub mod ts;
pub mod version;
