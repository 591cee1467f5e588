//! Application loop
//!
//! A single-threaded tick: wait up to the poll interval for input, drain the
//! shell output queue, render, repeat. Nothing on this thread ever blocks on
//! the shell.

use std::io::{self, Stdout};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use crossterm::event::{
    self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyEvent, KeyEventKind,
};
use crossterm::{execute, terminal};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::core::output::OutputPipeline;
use crate::core::shell::ShellBridge;

use super::console::Console;
use super::line_editor::{EditorAction, LineEditor};

/// Commands handled locally instead of being sent to the shell
pub fn is_clear_command(line: &str) -> bool {
    matches!(line.trim(), "clear" | "cls")
}

/// Raw mode for the lifetime of the app, restored even on error
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let _ = execute!(io::stdout(), EnableBracketedPaste);
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), DisableBracketedPaste);
        let _ = terminal::disable_raw_mode();
    }
}

pub struct App {
    config: Config,
    bridge: ShellBridge,
    pipeline: OutputPipeline,
    console: Console<Stdout>,
    editor: LineEditor,
    quit: bool,
}

impl App {
    /// Start the shell. Fails if it cannot be launched.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let mut bridge = ShellBridge::new(config.shell());
        bridge
            .start()
            .with_context(|| format!("Could not start shell '{}'", bridge.shell()))?;

        let pipeline = OutputPipeline::new(bridge.start_dir(), config.appearance.show_ansi_colors);
        let console = Console::new(io::stdout(), config.appearance.prompt_symbol.clone());

        Ok(Self {
            config,
            bridge,
            pipeline,
            console,
            editor: LineEditor::new(),
            quit: false,
        })
    }

    /// Run until the user exits or the shell goes away
    pub fn run(mut self) -> anyhow::Result<()> {
        let guard = RawModeGuard::enable()?;
        let result = self.main_loop();
        self.shutdown();

        let _ = self.console.flush();
        drop(guard);
        println!();
        result
    }

    fn main_loop(&mut self) -> anyhow::Result<()> {
        let tick = self.config.poll_interval();
        self.redraw()?;

        while !self.quit {
            if event::poll(tick)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(&key)?,
                    Event::Paste(text) => {
                        self.editor.insert_str(&text);
                        self.redraw()?;
                    }
                    Event::Resize(..) => self.redraw()?,
                    _ => {}
                }
            }

            self.pump_output()?;

            if self.bridge.has_exited() {
                // Whatever the readers still had in flight
                thread::sleep(tick);
                self.pump_output()?;
                info!("Shell exited");
                break;
            }
        }

        Ok(())
    }

    /// Drain the queue and render whatever arrived
    fn pump_output(&mut self) -> anyhow::Result<()> {
        let lines = self.bridge.drain();
        if lines.is_empty() {
            return Ok(());
        }

        let events = self.pipeline.process_all(lines);
        self.console.render(&events)?;
        self.redraw()?;
        Ok(())
    }

    fn redraw(&mut self) -> io::Result<()> {
        self.console.draw_prompt(self.pipeline.cwd(), &self.editor)
    }

    fn handle_key(&mut self, key: &KeyEvent) -> anyhow::Result<()> {
        match self.editor.handle_key(key) {
            EditorAction::None => {}
            EditorAction::Redraw => self.redraw()?,
            EditorAction::Submit(line) => self.submit(&line)?,
            EditorAction::Interrupt => {
                self.console.commit_input(self.pipeline.cwd(), "^C")?;
                self.bridge
                    .interrupt()
                    .context("Could not restart shell after interrupt")?;
                self.pipeline.reset(self.bridge.start_dir());
                self.redraw()?;
            }
            EditorAction::ClearScreen => {
                self.console.clear_screen()?;
                self.redraw()?;
            }
            EditorAction::Exit => self.quit = true,
        }
        Ok(())
    }

    fn submit(&mut self, line: &str) -> anyhow::Result<()> {
        self.console.commit_input(self.pipeline.cwd(), line)?;

        if is_clear_command(line) {
            self.console.clear_screen()?;
        } else if !line.trim().is_empty() {
            if let Err(e) = self.bridge.write(line) {
                error!("{}", e);
                self.console.error_line(&e.to_string())?;
            }
        }

        self.redraw()?;
        Ok(())
    }

    /// Ask the shell to stop, then kill it after the grace period
    fn shutdown(&mut self) {
        self.bridge.stop();

        let deadline = Instant::now() + self.config.exit_grace();
        while !self.bridge.has_exited() {
            if Instant::now() >= deadline {
                warn!("Shell did not exit within {:?}, killing", self.config.exit_grace());
                self.bridge.kill();
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
}
