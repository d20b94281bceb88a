#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line tooling for the address matching engine.
//!
//! The `address_match` binary builds stores from CSV extracts, runs
//! searches and corrections against them, and tunes ranking weights
//! offline with [`tune`].

pub mod tune;
