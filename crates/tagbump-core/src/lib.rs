//! Core library for tagbump.
//!
//! This crate provides the foundational types and functionality used by the
//! `tagbump` CLI and any downstream consumers: it reads the commits of a CI
//! run, decides whether and how the version should move, and applies the
//! bump in the checkout and on the target branch.
//!
//! # Modules
//!
//! - [`classify`] - Commit messages to a release action
//! - [`custom`] - `SET VERSION NUMBER {X.Y.Z}` directives
//! - [`version`] - Next version computation
//! - [`guard`] - Prior-bump detection
//! - [`release`] - Plan and execute a release
//! - [`branch`] - Target branch resolution
//! - [`manifest`] - Current version sources and writers
//! - [`event`] - CI event payloads
//! - [`git`] - Git operations for release workflows
//! - [`exec`] - Child-process execution
//! - [`ci`] - CI runner environment
//! - [`config`] - Configuration loading and management
//! - [`error`] - Error types and result aliases
//!
//! # Quick Start
//!
//! ```no_run
//! use tagbump_core::{Config, ConfigLoader};
//!
//! let config = ConfigLoader::new()
//!     .with_user_config(true)
//!     .load()
//!     .expect("Failed to load configuration");
//!
//! println!("Tag prefix: {:?}", config.tag_prefix);
//! ```
#![deny(unsafe_code)]

pub mod branch;

pub mod ci;

pub mod classify;

pub mod config;

pub mod custom;

pub mod error;

pub mod event;

pub mod exec;

pub mod git;

pub mod guard;

pub mod manifest;

pub mod release;

pub mod version;

pub use config::{Config, ConfigLoader, LogLevel};

pub use error::{ConfigError, ConfigResult};

// Re-export semver so downstream crates don't need a direct dependency.
pub use semver;
