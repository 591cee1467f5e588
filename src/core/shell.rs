//! Shell process bridge
//!
//! Owns one child shell and mediates all I/O with it. Two detached reader
//! threads (stdout, stderr) push whole lines into a channel; the UI tick
//! drains it with [`ShellBridge::drain`] without ever blocking.
//!
//! ```text
//! NotStarted --start--> Running --interrupt--> (kill tree, start) --> Running
//!                          |
//!                          +--stop/kill--> Stopped
//! ```
//!
//! `interrupt()` is destructive: the whole process tree is killed and a fresh
//! shell is started. Exported variables, aliases and the working directory of
//! the old shell are lost.

use std::env;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::marker::ShellKind;

#[cfg(windows)]
const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
const LINE_ENDING: &str = "\n";

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Failed to launch shell '{shell}': {source}")]
    ProcessSpawn {
        shell: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to start output reader: {0}")]
    ReaderSpawn(#[source] io::Error),

    #[error("Failed to write to shell: {0}")]
    Write(#[source] io::Error),

    #[error("Output pipe closed")]
    PipeClosed,
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Lifecycle of the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    NotStarted,
    Running,
    Stopped,
}

/// Platform default shell: cmd.exe on Windows, bash if installed, else sh
pub fn default_shell() -> &'static str {
    if cfg!(windows) {
        "cmd.exe"
    } else if in_path("bash") {
        "bash"
    } else {
        "sh"
    }
}

fn in_path(program: &str) -> bool {
    env::var_os("PATH")
        .map(|paths| env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}

/// Resolve the shell executable from an optional override
pub fn resolve_shell(shell_override: Option<&str>) -> String {
    shell_override
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map_or_else(|| default_shell().to_string(), str::to_string)
}

/// A long-lived child shell
pub struct ShellBridge {
    /// Shell executable
    shell: String,
    /// Command syntax of the shell
    kind: ShellKind,
    /// Working directory the current shell was started in
    start_dir: PathBuf,
    state: BridgeState,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    /// Shared by both readers of every shell this bridge starts
    output_tx: Sender<String>,
    output_rx: Receiver<String>,
}

impl ShellBridge {
    /// Create a bridge; nothing is spawned until [`start`](Self::start)
    pub fn new(shell_override: Option<&str>) -> Self {
        let shell = resolve_shell(shell_override);
        let kind = ShellKind::detect(&shell);
        let (output_tx, output_rx) = mpsc::channel();

        Self {
            shell,
            kind,
            start_dir: current_dir(),
            state: BridgeState::NotStarted,
            child: None,
            stdin: None,
            output_tx,
            output_rx,
        }
    }

    /// Spawn the shell and its two reader threads
    pub fn start(&mut self) -> Result<()> {
        if self.child.is_some() {
            self.kill_tree();
        }

        let mut command = Command::new(&self.shell);
        if self.kind == ShellKind::Cmd {
            command.arg("/k");
        }
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Own process group so interrupt() can take down the whole tree
            command.process_group(0);
        }

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            use windows::Win32::System::Threading::CREATE_NO_WINDOW;
            command.creation_flags(CREATE_NO_WINDOW.0);
        }

        let mut child = command.spawn().map_err(|source| BridgeError::ProcessSpawn {
            shell: self.shell.clone(),
            source,
        })?;

        self.start_dir = current_dir();
        self.stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        info!("Shell started: {} (pid {})", self.shell, child.id());
        self.child = Some(child);
        self.state = BridgeState::Running;

        if let Err(e) = self.spawn_readers(stdout, stderr) {
            self.kill_tree();
            self.state = BridgeState::Stopped;
            return Err(e);
        }

        Ok(())
    }

    fn spawn_readers(&self, stdout: Option<ChildStdout>, stderr: Option<ChildStderr>) -> Result<()> {
        if let Some(pipe) = stdout {
            self.spawn_reader("shell-stdout", pipe)?;
        }
        if let Some(pipe) = stderr {
            self.spawn_reader("shell-stderr", pipe)?;
        }
        Ok(())
    }

    fn spawn_reader<R>(&self, name: &'static str, pipe: R) -> Result<()>
    where
        R: Read + Send + 'static,
    {
        let tx = self.output_tx.clone();
        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || match read_lines(pipe, &tx) {
                Ok(()) => debug!("{}: end of stream", name),
                Err(e) => debug!("{}: stopped ({})", name, e),
            })
            .map_err(BridgeError::ReaderSpawn)?;
        Ok(())
    }

    /// Send a command line, followed by the working-directory marker.
    ///
    /// A no-op unless the shell is running.
    pub fn write(&mut self, command: &str) -> Result<()> {
        if self.state != BridgeState::Running {
            debug!("write ignored, shell is {:?}", self.state);
            return Ok(());
        }
        let Some(stdin) = self.stdin.as_mut() else {
            return Ok(());
        };

        let line = format!("{}{}", self.kind.compose(command), LINE_ENDING);
        stdin
            .write_all(line.as_bytes())
            .and_then(|_| stdin.flush())
            .map_err(BridgeError::Write)
    }

    /// Kill the whole process tree and start a fresh shell.
    ///
    /// This is not a cooperative Ctrl+C: all state of the old shell is lost.
    /// A no-op unless the shell is running.
    pub fn interrupt(&mut self) -> Result<()> {
        if self.state != BridgeState::Running {
            return Ok(());
        }

        warn!("Interrupt: killing shell process tree and restarting");
        self.kill_tree();
        self.state = BridgeState::Stopped;
        self.start()
    }

    /// Ask the shell to terminate without waiting for it.
    ///
    /// A no-op unless the shell is running. Follow up with
    /// [`has_exited`](Self::has_exited) and [`kill`](Self::kill) to enforce a
    /// grace period.
    pub fn stop(&mut self) {
        if self.state != BridgeState::Running {
            return;
        }

        info!("Stopping shell");
        // Closing stdin alone ends a shell that is idle at its prompt
        self.stdin = None;
        if let Some(child) = self.child.as_mut() {
            terminate(child);
        }
        self.state = BridgeState::Stopped;
    }

    /// Forcefully kill the process tree
    pub fn kill(&mut self) {
        if self.child.is_some() {
            self.kill_tree();
        }
        if self.state == BridgeState::Running {
            self.state = BridgeState::Stopped;
        }
    }

    /// Whether the shell process is gone (never started counts as gone)
    pub fn has_exited(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => match child.try_wait() {
                Ok(Some(status)) => {
                    debug!("Shell exited: {}", status);
                    true
                }
                Ok(None) => false,
                Err(e) => {
                    warn!("Failed to query shell status: {}", e);
                    true
                }
            },
            None => true,
        }
    }

    /// Take every line queued so far, oldest first. Never blocks.
    pub fn drain(&self) -> Vec<String> {
        self.output_rx.try_iter().collect()
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }

    pub fn shell_kind(&self) -> ShellKind {
        self.kind
    }

    /// Directory the current shell was started in
    pub fn start_dir(&self) -> &Path {
        &self.start_dir
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    fn kill_tree(&mut self) {
        self.stdin = None;
        let Some(mut child) = self.child.take() else {
            return;
        };

        // A reaped pid may already belong to someone else
        match child.try_wait() {
            Ok(Some(status)) => debug!("Shell {} already exited: {}", child.id(), status),
            _ => kill_process_tree(&mut child),
        }
        match child.wait() {
            Ok(status) => debug!("Shell {} reaped: {}", child.id(), status),
            Err(e) => warn!("Failed to reap shell {}: {}", child.id(), e),
        }
    }
}

impl Drop for ShellBridge {
    fn drop(&mut self) {
        self.kill_tree();
    }
}

fn current_dir() -> PathBuf {
    env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Reader loop: forward lines until end of stream or error
fn read_lines<R: Read>(pipe: R, tx: &Sender<String>) -> Result<()> {
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::with_capacity(256);

    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(|_| BridgeError::PipeClosed)?;
        if n == 0 {
            return Ok(());
        }

        let line = String::from_utf8_lossy(&buf).into_owned();
        tx.send(line).map_err(|_| BridgeError::PipeClosed)?;
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Err(e) = killpg(Pid::from_raw(child.id() as i32), Signal::SIGTERM) {
        debug!("SIGTERM to process group {} failed: {}", child.id(), e);
    }
}

#[cfg(windows)]
fn terminate(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!("TerminateProcess for {} failed: {}", child.id(), e);
    }
}

#[cfg(unix)]
fn kill_process_tree(child: &mut Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Err(e) = killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL) {
        debug!("SIGKILL to process group {} failed: {}", child.id(), e);
        let _ = child.kill();
    }
}

#[cfg(windows)]
fn kill_process_tree(child: &mut Child) {
    use std::os::windows::process::CommandExt;
    use windows::Win32::System::Threading::CREATE_NO_WINDOW;

    let status = Command::new("taskkill")
        .args(["/F", "/T", "/PID", &child.id().to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .creation_flags(CREATE_NO_WINDOW.0)
        .status();

    match status {
        Ok(status) if status.success() => {}
        Ok(status) => debug!("taskkill for {} returned {}", child.id(), status),
        Err(e) => debug!("taskkill for {} failed: {}", child.id(), e),
    }
    let _ = child.kill();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    /// Poll `drain` until `done` holds or ten seconds pass
    fn collect_until(bridge: &ShellBridge, done: impl Fn(&[String]) -> bool) -> Vec<String> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut lines = Vec::new();
        while Instant::now() < deadline {
            lines.extend(bridge.drain());
            if done(&lines) {
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }
        lines
    }

    fn has_line(lines: &[String], needle: &str) -> bool {
        lines.iter().any(|l| l.trim_end() == needle)
    }

    #[test]
    fn test_resolve_shell() {
        assert_eq!(resolve_shell(Some("/bin/bash")), "/bin/bash");
        assert_eq!(resolve_shell(Some("  ")), default_shell());
        assert_eq!(resolve_shell(None), default_shell());

        // Overrides usually come from config, not string literals
        let configured = String::from(" /bin/zsh ");
        assert_eq!(resolve_shell(Some(&configured)), "/bin/zsh");
    }

    #[test]
    #[cfg(unix)]
    fn test_default_shell_is_installed() {
        let shell = default_shell();
        assert!(shell == "bash" || shell == "sh");
        if shell == "bash" {
            assert!(in_path("bash"));
        }
        assert!(!in_path("aerominal-no-such-program"));
    }

    #[test]
    fn test_operations_before_start_are_noops() {
        let mut bridge = ShellBridge::new(None);
        assert!(bridge.write("echo hi").is_ok());
        assert!(bridge.interrupt().is_ok());
        bridge.stop();
        bridge.kill();

        thread::sleep(Duration::from_millis(50));
        assert!(bridge.drain().is_empty());
        assert_eq!(bridge.state(), BridgeState::NotStarted);
        assert!(bridge.pid().is_none());
        assert!(bridge.has_exited());
    }

    #[test]
    fn test_missing_shell_is_spawn_error() {
        let mut bridge = ShellBridge::new(Some("/nonexistent/aerominal-test-shell"));
        let err = bridge.start().unwrap_err();
        assert!(matches!(err, BridgeError::ProcessSpawn { .. }));
        assert!(err.to_string().contains("aerominal-test-shell"));
        assert_eq!(bridge.state(), BridgeState::NotStarted);
    }

    #[test]
    #[cfg(unix)]
    fn test_command_output_and_marker() {
        let mut bridge = ShellBridge::new(Some("sh"));
        bridge.start().unwrap();
        assert_eq!(bridge.state(), BridgeState::Running);

        bridge.write("echo hello").unwrap();
        let lines = collect_until(&bridge, |l| l.iter().any(|x| x.contains("__CWD__:")));

        assert!(has_line(&lines, "hello"), "lines: {:?}", lines);
        let markers = lines.iter().filter(|l| l.contains("__CWD__:")).count();
        assert_eq!(markers, 1);
        assert!(lines.iter().all(|l| l.ends_with('\n')));
    }

    /// Run one command and expect its output plus exactly one marker line
    #[cfg(unix)]
    fn assert_single_marker(command: &str, expected: &str) {
        let mut bridge = ShellBridge::new(Some("sh"));
        bridge.start().unwrap();

        bridge.write(command).unwrap();
        let mut lines = collect_until(&bridge, |l| l.iter().any(|x| x.contains("__CWD__:")));
        // Give a second marker or an error message time to show up
        thread::sleep(Duration::from_millis(200));
        lines.extend(bridge.drain());

        assert!(has_line(&lines, expected), "{:?}: {:?}", command, lines);
        let markers = lines.iter().filter(|l| l.contains("__CWD__:")).count();
        assert_eq!(markers, 1, "{:?}: {:?}", command, lines);
        assert!(!bridge.has_exited(), "{:?} ended the shell", command);
    }

    #[test]
    #[cfg(unix)]
    fn test_trailing_semicolon_keeps_shell_alive() {
        assert_single_marker("echo hi;", "hi");
    }

    #[test]
    #[cfg(unix)]
    fn test_dangling_operator_keeps_shell_alive() {
        assert_single_marker("echo hi &&", "hi");
        assert_single_marker("false || echo hi ||", "hi");
    }

    #[test]
    #[cfg(unix)]
    fn test_trailing_comment_still_reports_marker() {
        assert_single_marker("echo hi # note", "hi");
    }

    #[test]
    #[cfg(unix)]
    fn test_kill_after_shell_exit() {
        let mut bridge = ShellBridge::new(Some("sh"));
        bridge.start().unwrap();

        bridge.write("exit").unwrap();
        let deadline = Instant::now() + Duration::from_secs(10);
        while !bridge.has_exited() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        assert!(bridge.has_exited());

        bridge.kill();
        assert_eq!(bridge.state(), BridgeState::Stopped);
        assert!(bridge.pid().is_none());
    }

    #[test]
    #[cfg(unix)]
    fn test_cd_updates_marker() {
        let mut bridge = ShellBridge::new(Some("sh"));
        bridge.start().unwrap();

        bridge.write("cd /").unwrap();
        let lines = collect_until(&bridge, |l| has_line(l, "__CWD__:/"));
        assert!(has_line(&lines, "__CWD__:/"), "lines: {:?}", lines);
    }

    #[test]
    #[cfg(unix)]
    fn test_stderr_is_relayed() {
        let mut bridge = ShellBridge::new(Some("sh"));
        bridge.start().unwrap();

        bridge.write("echo oops 1>&2").unwrap();
        let lines = collect_until(&bridge, |l| {
            has_line(l, "oops") && l.iter().any(|x| x.contains("__CWD__:"))
        });
        assert!(has_line(&lines, "oops"), "lines: {:?}", lines);
    }

    #[test]
    #[cfg(unix)]
    fn test_stdout_order_is_preserved() {
        let mut bridge = ShellBridge::new(Some("sh"));
        bridge.start().unwrap();

        bridge.write("echo one; echo two; echo three").unwrap();
        let lines = collect_until(&bridge, |l| l.iter().any(|x| x.contains("__CWD__:")));
        let ours: Vec<&str> = lines
            .iter()
            .map(|l| l.trim_end())
            .filter(|l| ["one", "two", "three"].contains(l))
            .collect();
        assert_eq!(ours, ["one", "two", "three"]);
    }

    #[test]
    #[cfg(unix)]
    fn test_double_interrupt_keeps_session_usable() {
        let mut bridge = ShellBridge::new(Some("sh"));
        bridge.start().unwrap();
        let first = bridge.pid();

        bridge.write("sleep 30").unwrap();
        bridge.interrupt().unwrap();
        bridge.interrupt().unwrap();

        assert_eq!(bridge.state(), BridgeState::Running);
        assert_ne!(bridge.pid(), first);

        bridge.write("echo again").unwrap();
        let lines = collect_until(&bridge, |l| has_line(l, "again"));
        assert!(has_line(&lines, "again"), "lines: {:?}", lines);
    }

    #[test]
    #[cfg(unix)]
    fn test_stop_then_kill() {
        let mut bridge = ShellBridge::new(Some("sh"));
        bridge.start().unwrap();

        bridge.stop();
        assert_eq!(bridge.state(), BridgeState::Stopped);
        // Writes after stop are ignored
        assert!(bridge.write("echo late").is_ok());

        bridge.kill();
        assert!(bridge.has_exited());
        assert!(bridge.pid().is_none());
    }

    #[test]
    #[cfg(unix)]
    fn test_exit_is_detected() {
        let mut bridge = ShellBridge::new(Some("sh"));
        bridge.start().unwrap();

        bridge.write("exit").unwrap();
        let deadline = Instant::now() + Duration::from_secs(10);
        while !bridge.has_exited() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        assert!(bridge.has_exited());
    }

    #[test]
    #[cfg(unix)]
    fn test_write_after_shell_exit_fails() {
        let mut bridge = ShellBridge::new(Some("sh"));
        bridge.start().unwrap();

        bridge.write("exit").unwrap();
        let deadline = Instant::now() + Duration::from_secs(10);
        while !bridge.has_exited() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }

        // Bridge stays nominally Running; stdin is broken until a restart
        assert_eq!(bridge.state(), BridgeState::Running);
        let result = bridge.write("echo nobody");
        assert!(matches!(result, Err(BridgeError::Write(_))));

        bridge.interrupt().unwrap();
        assert!(bridge.write("echo back").is_ok());
    }
}
