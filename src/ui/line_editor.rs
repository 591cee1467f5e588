//! Line-oriented input editing
//!
//! Input is collected locally and only sent to the shell on Enter.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use unicode_width::UnicodeWidthStr;

/// What the app should do after a key press
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorAction {
    /// Nothing changed
    None,
    /// The input line changed and needs redrawing
    Redraw,
    /// Enter was pressed with this line
    Submit(String),
    /// Ctrl+C
    Interrupt,
    /// Ctrl+L
    ClearScreen,
    /// Ctrl+D on an empty line
    Exit,
}

/// Single-line editor with a cursor
#[derive(Debug, Default)]
pub struct LineEditor {
    buffer: String,
    /// Byte offset into `buffer`, always on a char boundary
    cursor: usize,
}

impl LineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Display width of the text left of the cursor
    pub fn cursor_width(&self) -> usize {
        self.buffer[..self.cursor].width()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
    }

    /// Insert pasted text; line breaks become spaces
    pub fn insert_str(&mut self, text: &str) {
        for ch in text.chars() {
            match ch {
                '\r' => {}
                '\n' => self.insert_char(' '),
                c if c.is_control() && c != '\t' => {}
                c => self.insert_char(c),
            }
        }
    }

    fn insert_char(&mut self, ch: char) {
        self.buffer.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    fn prev_boundary(&self) -> Option<usize> {
        self.buffer[..self.cursor].char_indices().next_back().map(|(i, _)| i)
    }

    fn next_boundary(&self) -> Option<usize> {
        self.buffer[self.cursor..]
            .chars()
            .next()
            .map(|c| self.cursor + c.len_utf8())
    }

    pub fn handle_key(&mut self, event: &KeyEvent) -> EditorAction {
        let ctrl = event.modifiers.contains(KeyModifiers::CONTROL);

        match event.code {
            KeyCode::Char('c') | KeyCode::Char('C') if ctrl => {
                self.clear();
                EditorAction::Interrupt
            }
            KeyCode::Char('l') | KeyCode::Char('L') if ctrl => EditorAction::ClearScreen,
            KeyCode::Char('d') | KeyCode::Char('D') if ctrl => {
                if self.buffer.is_empty() {
                    EditorAction::Exit
                } else {
                    self.delete_forward()
                }
            }
            KeyCode::Char('a') | KeyCode::Char('A') if ctrl => self.move_to(0),
            KeyCode::Char('e') | KeyCode::Char('E') if ctrl => self.move_to(self.buffer.len()),
            KeyCode::Char('u') | KeyCode::Char('U') if ctrl => {
                self.buffer.drain(..self.cursor);
                self.cursor = 0;
                EditorAction::Redraw
            }
            KeyCode::Char(_) if ctrl => EditorAction::None,
            KeyCode::Char(ch) => {
                self.insert_char(ch);
                EditorAction::Redraw
            }
            KeyCode::Enter => {
                let line = std::mem::take(&mut self.buffer);
                self.cursor = 0;
                EditorAction::Submit(line)
            }
            KeyCode::Backspace => match self.prev_boundary() {
                Some(prev) => {
                    self.buffer.replace_range(prev..self.cursor, "");
                    self.cursor = prev;
                    EditorAction::Redraw
                }
                None => EditorAction::None,
            },
            KeyCode::Delete => self.delete_forward(),
            KeyCode::Left => match self.prev_boundary() {
                Some(prev) => self.move_to(prev),
                None => EditorAction::None,
            },
            KeyCode::Right => match self.next_boundary() {
                Some(next) => self.move_to(next),
                None => EditorAction::None,
            },
            KeyCode::Home => self.move_to(0),
            KeyCode::End => self.move_to(self.buffer.len()),
            KeyCode::Esc => {
                self.clear();
                EditorAction::Redraw
            }
            _ => EditorAction::None,
        }
    }

    fn delete_forward(&mut self) -> EditorAction {
        match self.next_boundary() {
            Some(next) => {
                self.buffer.replace_range(self.cursor..next, "");
                EditorAction::Redraw
            }
            None => EditorAction::None,
        }
    }

    fn move_to(&mut self, cursor: usize) -> EditorAction {
        if cursor == self.cursor {
            return EditorAction::None;
        }
        self.cursor = cursor;
        EditorAction::Redraw
    }
}
