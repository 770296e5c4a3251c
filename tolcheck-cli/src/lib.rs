//! # tolcheck-cli
//!
//! The `tolcheck` binary: command-line processing, the local web front end
//! and the launcher that starts it.

pub mod browser;
pub mod cli;
pub mod launcher;
pub mod logging;
pub mod runner;
pub mod server;

#[cfg(test)]
mod server_tests;
