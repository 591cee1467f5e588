//! Working-directory marker protocol
//!
//! Every injected command gets a suffix that makes the shell print
//! `__CWD__:<current directory>` once the command finishes. The consumer
//! picks that line out of the output stream, records the directory and hides
//! the marker from the display.
//!
//! ```text
//! cmd.exe : dir & echo. & echo __CWD__:%CD%
//! POSIX   : ls; echo __CWD__:$PWD
//! ```
//!
//! POSIX commands are adjusted so the suffix always parses: trailing `;` are
//! dropped, a dangling `&&`, `||` or `|` gets `:` as its right-hand side, and
//! a command containing `#` gets the marker on its own line so a comment
//! cannot swallow it. An unterminated quote or here-document still eats the
//! marker; no directory update arrives for that command.

use std::path::Path;

/// Sentinel prefix printed in front of the directory
pub const CWD_MARKER: &str = "__CWD__:";

/// Form feed, emitted by `clear`/`cls`
const FORM_FEED: char = '\x0C';

/// Variable expansions as they appear when the shell echoes our own input
const UNEXPANDED: [&str; 2] = ["%CD%", "$PWD"];

/// What is left of the echoed command line in front of an unexpanded marker
const ECHO_TAILS: [&str; 5] = [" & echo. & echo ", "echo. & echo ", "; echo ", " echo ", "echo "];

/// Command syntax family of the child shell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellKind {
    /// `cmd.exe` style: `&` separator, `%CD%`
    Cmd,
    /// POSIX style: `;` separator, `$PWD`
    Posix,
}

impl ShellKind {
    /// Guess the syntax family from the shell executable
    pub fn detect(shell: &str) -> Self {
        let stem = Path::new(shell)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(shell);

        if stem.eq_ignore_ascii_case("cmd") {
            Self::Cmd
        } else {
            Self::Posix
        }
    }

    /// The command that prints the marker line
    pub fn marker_command(&self) -> String {
        match self {
            Self::Cmd => format!("echo. & echo {}%CD%", CWD_MARKER),
            Self::Posix => format!("echo {}$PWD", CWD_MARKER),
        }
    }

    /// Append the marker command to a user command
    pub fn compose(&self, command: &str) -> String {
        let marker = self.marker_command();
        let command = match self {
            Self::Cmd => command.trim_end(),
            Self::Posix => trim_separators(command),
        };

        if command.trim_start().is_empty() {
            return marker;
        }

        match self {
            Self::Cmd => format!("{} & {}", command, marker),
            Self::Posix => {
                if command.contains('#') {
                    // A comment would swallow a same-line suffix
                    format!("{}\n{}", command, marker)
                } else if ends_with_operator(command) {
                    // Complete the dangling operator with a no-op
                    format!("{} :; {}", command, marker)
                } else if command.ends_with('&') {
                    // `cmd &; echo` is a syntax error, the `&` already separates
                    format!("{} {}", command, marker)
                } else {
                    format!("{}; {}", command, marker)
                }
            }
        }
    }
}

/// Drop trailing whitespace and unescaped `;` so the suffix does not form `;;`
fn trim_separators(command: &str) -> &str {
    let mut command = command.trim_end();
    while command.ends_with(';') && !command.ends_with("\\;") {
        command = command[..command.len() - 1].trim_end();
    }
    command
}

/// `&&`, `||` or `|` still waiting for a right-hand side
fn ends_with_operator(command: &str) -> bool {
    command.ends_with("&&") || command.ends_with('|')
}

/// Result of looking for a marker in one output line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerLine<'a> {
    /// No marker, the line is shown as is
    Plain(&'a str),
    /// A marker was found and removed
    Marker {
        /// Text in front of the marker, without line terminator
        text: &'a str,
        /// The reported directory; `None` for an echo of the injected command
        cwd: Option<String>,
    },
}

/// Split a marker off an output line
pub fn extract_cwd(line: &str) -> MarkerLine<'_> {
    let Some(index) = line.find(CWD_MARKER) else {
        return MarkerLine::Plain(line);
    };

    let text = &line[..index];
    let value = line[index + CWD_MARKER.len()..].trim_end_matches(['\r', '\n']);

    if UNEXPANDED.contains(&value) {
        // The shell echoed our command line back
        let text = ECHO_TAILS
            .iter()
            .find_map(|tail| text.strip_suffix(tail))
            .unwrap_or(text);
        return MarkerLine::Marker { text, cwd: None };
    }

    let cwd = (!value.is_empty()).then(|| value.to_string());
    MarkerLine::Marker { text, cwd }
}

/// Detect a form feed. Returns the text after the last one and whether the
/// display must be cleared first.
pub fn split_form_feed(line: &str) -> (&str, bool) {
    match line.rfind(FORM_FEED) {
        Some(index) => (&line[index + FORM_FEED.len_utf8()..], true),
        None => (line, false),
    }
}
