//! Scrollback renderer using crossterm
//!
//! Output is printed into the host terminal's own scrollback; only the last
//! line is owned by us and holds the prompt and the input being edited.

use std::borrow::Cow;
use std::io::{self, Write};
use std::path::Path;

use crossterm::{
    cursor::{MoveTo, MoveToColumn},
    queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use unicode_width::UnicodeWidthStr;

use crate::core::ansi::AnsiColor;
use crate::core::output::DisplayEvent;

use super::line_editor::LineEditor;

/// Map a parsed color to the host terminal palette
pub fn to_crossterm(color: AnsiColor) -> Color {
    match color {
        AnsiColor::Black => Color::Black,
        AnsiColor::Red => Color::DarkRed,
        AnsiColor::Green => Color::DarkGreen,
        AnsiColor::Yellow => Color::DarkYellow,
        AnsiColor::Blue => Color::DarkBlue,
        AnsiColor::Magenta => Color::DarkMagenta,
        AnsiColor::Cyan => Color::DarkCyan,
        AnsiColor::White => Color::Grey,
        AnsiColor::Grey => Color::DarkGrey,
    }
}

/// Prompt text: working directory with the home directory shortened to `~`
pub fn prompt_label(cwd: &Path, home: Option<&Path>, symbol: &str) -> String {
    let dir = match home.and_then(|h| cwd.strip_prefix(h).ok()) {
        Some(rest) if rest.as_os_str().is_empty() => "~".to_string(),
        Some(rest) => format!("~{}{}", std::path::MAIN_SEPARATOR, rest.display()),
        None => cwd.display().to_string(),
    };
    format!("{} {} ", dir, symbol)
}

/// Raw mode does not translate `\n`, so every line break needs a `\r`
fn raw_newlines(text: &str) -> Cow<'_, str> {
    if text.contains('\n') {
        Cow::Owned(text.replace("\r\n", "\n").replace('\n', "\r\n"))
    } else {
        Cow::Borrowed(text)
    }
}

/// Console renderer
pub struct Console<W: Write> {
    out: W,
    prompt_symbol: String,
    /// Whether the last output ended with a line break
    at_line_start: bool,
}

impl<W: Write> Console<W> {
    pub fn new(out: W, prompt_symbol: impl Into<String>) -> Self {
        Self {
            out,
            prompt_symbol: prompt_symbol.into(),
            at_line_start: true,
        }
    }

    /// Print display events above the prompt line
    pub fn render(&mut self, events: &[DisplayEvent]) -> io::Result<()> {
        self.erase_prompt()?;

        for event in events {
            match event {
                DisplayEvent::Clear => self.queue_clear()?,
                // The prompt picks the new directory up on redraw
                DisplayEvent::DirectoryChanged(_) => {}
                DisplayEvent::Text { text, color } => self.queue_text(text, *color)?,
            }
        }

        Ok(())
    }

    /// Draw the prompt and the input line, placing the cursor
    pub fn draw_prompt(&mut self, cwd: &Path, editor: &LineEditor) -> io::Result<()> {
        let home = crate::config::home_dir();
        let label = prompt_label(cwd, home.as_deref(), &self.prompt_symbol);

        if !self.at_line_start {
            queue!(self.out, Print("\r\n"))?;
            self.at_line_start = true;
        }

        let column = label.width() + editor.cursor_width();
        queue!(
            self.out,
            Print("\r"),
            Clear(ClearType::CurrentLine),
            SetForegroundColor(Color::Cyan),
            Print(&label),
            ResetColor,
            Print(editor.buffer()),
            MoveToColumn(u16::try_from(column).unwrap_or(u16::MAX)),
        )?;
        self.out.flush()
    }

    /// Leave the submitted line in the scrollback
    pub fn commit_input(&mut self, cwd: &Path, line: &str) -> io::Result<()> {
        let home = crate::config::home_dir();
        let label = prompt_label(cwd, home.as_deref(), &self.prompt_symbol);

        self.erase_prompt()?;
        queue!(
            self.out,
            SetForegroundColor(Color::Cyan),
            Print(&label),
            ResetColor,
            Print(line),
            Print("\r\n"),
        )?;
        self.at_line_start = true;
        Ok(())
    }

    /// Print a message in red on its own line
    pub fn error_line(&mut self, message: &str) -> io::Result<()> {
        self.erase_prompt()?;
        queue!(
            self.out,
            SetForegroundColor(Color::Red),
            Print(message),
            ResetColor,
            Print("\r\n"),
        )?;
        self.at_line_start = true;
        Ok(())
    }

    pub fn clear_screen(&mut self) -> io::Result<()> {
        self.queue_clear()
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    fn erase_prompt(&mut self) -> io::Result<()> {
        if self.at_line_start {
            queue!(self.out, Print("\r"), Clear(ClearType::CurrentLine))?;
        }
        Ok(())
    }

    fn queue_clear(&mut self) -> io::Result<()> {
        queue!(
            self.out,
            Clear(ClearType::Purge),
            Clear(ClearType::All),
            MoveTo(0, 0),
        )?;
        self.at_line_start = true;
        Ok(())
    }

    fn queue_text(&mut self, text: &str, color: Option<AnsiColor>) -> io::Result<()> {
        if text.is_empty() {
            return Ok(());
        }

        let text = raw_newlines(text);
        match color {
            Some(color) => queue!(
                self.out,
                SetForegroundColor(to_crossterm(color)),
                Print(&text),
                ResetColor,
            )?,
            None => queue!(self.out, Print(&text))?,
        }
        self.at_line_start = text.ends_with('\n');
        Ok(())
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}
