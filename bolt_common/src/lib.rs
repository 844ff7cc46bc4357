//! Bolt Common Library
//!
//! Shared constants and configuration loading for the bolt robot control
//! workspace.
//!
//! # Module Structure
//!
//! - [`config`] - TOML configuration loading traits and types
//! - [`consts`] - Tick period and fixed capacity limits
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use bolt_common::config::{ConfigLoader, SharedConfig};
//! use bolt_common::consts::DEFAULT_PERIOD_MS;
//! ```

pub mod config;
pub mod consts;
pub mod prelude;
