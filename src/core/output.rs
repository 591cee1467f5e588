//! Consumer side of the output queue
//!
//! Turns raw shell lines into display events. Runs on the UI tick, so the
//! working directory and the active color live here and need no locking.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::ansi::{self, AnsiColor, AnsiSpan};
use super::marker::{extract_cwd, split_form_feed, MarkerLine};

/// Something the display has to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEvent {
    /// Wipe the scrollback
    Clear,
    /// The shell reported a new working directory
    DirectoryChanged(PathBuf),
    /// Append text in the given foreground color (`None` = default)
    Text {
        text: String,
        color: Option<AnsiColor>,
    },
}

/// Per-line processing: marker, form feed, then colors
pub struct OutputPipeline {
    cwd: PathBuf,
    active_color: Option<AnsiColor>,
    colors_enabled: bool,
}

impl OutputPipeline {
    pub fn new(start_dir: impl Into<PathBuf>, colors_enabled: bool) -> Self {
        Self {
            cwd: start_dir.into(),
            active_color: None,
            colors_enabled,
        }
    }

    /// Last directory reported by the shell
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn active_color(&self) -> Option<AnsiColor> {
        self.active_color
    }

    pub fn colors_enabled(&self) -> bool {
        self.colors_enabled
    }

    pub fn set_colors_enabled(&mut self, enabled: bool) {
        self.colors_enabled = enabled;
        if !enabled {
            self.active_color = None;
        }
    }

    /// Forget everything learned from the previous shell
    pub fn reset(&mut self, start_dir: impl Into<PathBuf>) {
        self.cwd = start_dir.into();
        self.active_color = None;
    }

    /// Process a batch of lines in order
    pub fn process_all<I>(&mut self, lines: I) -> Vec<DisplayEvent>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut events = Vec::new();
        for line in lines {
            self.process_into(line.as_ref(), &mut events);
        }
        events
    }

    /// Process one line
    pub fn process(&mut self, line: &str) -> Vec<DisplayEvent> {
        let mut events = Vec::new();
        self.process_into(line, &mut events);
        events
    }

    fn process_into(&mut self, line: &str, events: &mut Vec<DisplayEvent>) {
        let text: Cow<'_, str> = match extract_cwd(line) {
            MarkerLine::Plain(text) => Cow::Borrowed(text),
            MarkerLine::Marker { text, cwd } => {
                if let Some(dir) = cwd {
                    self.update_cwd(PathBuf::from(dir), events);
                }
                if text.is_empty() {
                    return;
                }
                // The marker took the line terminator with it
                Cow::Owned(format!("{}\n", text))
            }
        };

        let (visible, clear) = split_form_feed(&text);
        if clear {
            events.push(DisplayEvent::Clear);
        }
        if visible.is_empty() {
            return;
        }

        if !self.colors_enabled {
            let plain = ansi::strip(visible);
            if !plain.is_empty() {
                events.push(DisplayEvent::Text {
                    text: plain.into_owned(),
                    color: None,
                });
            }
            return;
        }

        for span in ansi::parse(visible) {
            match span {
                AnsiSpan::Text(run) => events.push(DisplayEvent::Text {
                    text: run.to_string(),
                    color: self.active_color,
                }),
                AnsiSpan::ColorSwitch(color) => self.active_color = Some(color),
                AnsiSpan::Reset => self.active_color = None,
            }
        }
    }

    fn update_cwd(&mut self, dir: PathBuf, events: &mut Vec<DisplayEvent>) {
        if dir == self.cwd {
            return;
        }
        debug!("Working directory: {}", dir.display());
        self.cwd = dir.clone();
        events.push(DisplayEvent::DirectoryChanged(dir));
    }
}
