//! aerominal - shell process bridge and ANSI rendering pipeline
//!
//! The library half of the `aerominal` binary:
//!
//! - **core**: child shell I/O, working-directory markers, ANSI parsing
//! - **config**: `~/.aerominal/config.toml`
//! - **ui**: crossterm front-end built on top of `core`

pub mod config;
pub mod core;
pub mod ui;
