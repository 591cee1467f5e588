//! Shell I/O core.
//!
//! This module contains everything between the child shell and the display:
//!
//! - **shell**: Child shell lifecycle, stdin injection, stdout/stderr relay
//! - **marker**: Working-directory marker protocol and form-feed detection
//! - **ansi**: ANSI escape sequence stripping and color span parsing
//! - **output**: Consumer pipeline turning queued lines into display events
//!
//! # Data flow
//!
//! ```text
//! ShellBridge
//! ├── stdin  <── write(command + marker suffix)
//! ├── stdout ──┐
//! └── stderr ──┴─> mpsc channel ──drain()──> OutputPipeline ──> DisplayEvent
//!                                             ├── marker (cwd)
//!                                             ├── form feed (clear)
//!                                             └── ansi (colors)
//! ```

pub mod ansi;
pub mod marker;
pub mod output;
pub mod shell;
