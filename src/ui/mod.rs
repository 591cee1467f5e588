//! Terminal front-end.
//!
//! - **app**: Polling tick that connects the shell bridge to the display
//! - **console**: Scrollback renderer and prompt line
//! - **line_editor**: Local line editing, key handling
//!
//! The front-end only consumes the core: it drains output lines, feeds them
//! through `OutputPipeline`, and sends submitted lines to `ShellBridge`.

pub mod app;
pub mod console;
pub mod line_editor;

pub use app::App;
