//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`replay`] - Feed a recorded fix log through live guidance
//! - [`preview`] - Step through a route interactively
//! - [`check`] - Verify a route offline
//! - [`config`] - Inspect navigation settings (show, path)

pub mod check;
pub mod common;
pub mod config;
pub mod preview;
pub mod replay;
