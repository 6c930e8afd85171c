//! # kforge-recipe
//!
//! Package recipes and the configuration model around them.
//!
//! - **Descriptors and options**: what a package is and which knobs it has.
//! - **Resolver**: settings plus option overrides become a frozen
//!   [`resolver::ResolvedConfig`], with every platform conditional applied
//!   and every unsupported combination rejected up front.
//! - **Graph**: requirements expand into a dependency graph with a
//!   deterministic build order.
//! - **Plans and manifests**: recipes describe their build as data and
//!   publish a consumption manifest once installed.
//!
//! Nothing in this crate spawns processes or touches the network; the
//! `kforge-build` crate executes what recipes describe.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod descriptor;
pub mod graph;
pub mod host;
pub mod index;
pub mod manifest;
pub mod options;
pub mod plan;
pub mod profile;
pub mod recipe;
pub mod recipes;
pub mod requirement;
pub mod resolver;
pub mod toolchain;
pub mod version;
