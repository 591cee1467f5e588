//! aerominal - a lightweight shell front-end
//!
//! aerominal runs your shell as a child process, shows its output with ANSI
//! colors, and gives you a line-oriented prompt that tracks the shell's
//! working directory.
//!
//! # Features
//!
//! - **Any shell**: cmd.exe, sh, bash, zsh, PowerShell, configurable
//! - **ANSI colors**: Foreground colors rendered, other sequences removed
//! - **Directory tracking**: The prompt follows `cd` inside the shell
//! - **Interrupt**: Ctrl+C kills the running command and restarts the shell
//!
//! # Quick Start
//!
//! ```text
//! aerominal                  # Default shell (cmd.exe / bash or sh)
//! aerominal -s /bin/bash     # Custom shell
//! aerominal --no-color       # Strip colors
//! ```
//!
//! # Keys
//!
//! | Key | Action |
//! |-----|--------|
//! | Enter | Run the line |
//! | Ctrl+C | Kill the shell and start a fresh one |
//! | Ctrl+L | Clear the screen |
//! | Ctrl+D | Exit (on an empty line) |

use std::env;
use std::path::PathBuf;

use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use aerominal::config::Config;
use aerominal::core::shell::default_shell;
use aerominal::ui::App;

/// Command line options
#[derive(Debug, Default, PartialEq)]
struct CliOptions {
    /// Shell executable override
    shell: Option<String>,
    /// Strip colors instead of rendering them
    no_color: bool,
    /// Write the effective config file and exit
    write_config: bool,
}

/// Outcome of argument parsing
#[derive(Debug, PartialEq)]
enum CliCommand {
    Run(CliOptions),
    Help,
    Version,
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable holding the log filter
const LOG_ENV: &str = "AEROMINAL_LOG";

fn print_version() {
    eprintln!("aerominal {}", VERSION);
}

fn print_help() {
    eprintln!("aerominal {} - a lightweight shell front-end", VERSION);
    eprintln!();
    eprintln!("Usage: aerominal [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -s, --shell <PATH>    Shell executable (default: cmd.exe / bash or sh)");
    eprintln!("      --no-color        Strip ANSI colors from output");
    eprintln!("      --write-config    Save the effective settings to the config file");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Keys:");
    eprintln!("  Enter                 Run the line ('clear'/'cls' clear locally)");
    eprintln!("  Ctrl+C                Kill the shell and start a fresh one");
    eprintln!("  Ctrl+L                Clear the screen");
    eprintln!("  Ctrl+D                Exit (on an empty line)");
    eprintln!();
    eprintln!("Configuration: ~/.aerominal/config.toml");
    eprintln!("Log file:      ~/.aerominal/aerominal.log ({}=debug for more)", LOG_ENV);
}

fn parse_args<I>(args: I) -> Result<CliCommand, String>
where
    I: IntoIterator<Item = String>,
{
    let mut options = CliOptions::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(CliCommand::Help),
            "-v" | "--version" => return Ok(CliCommand::Version),
            "-s" | "--shell" => {
                let shell = args.next().ok_or("Missing shell argument")?;
                options.shell = Some(shell);
            }
            "--no-color" => options.no_color = true,
            "--write-config" => options.write_config = true,
            other => {
                return Err(format!("Unknown argument: {}. Use -h for help.", other));
            }
        }
    }

    Ok(CliCommand::Run(options))
}

/// Command line flags take precedence over the config file
fn merge_options(mut config: Config, options: &CliOptions) -> Config {
    if let Some(shell) = &options.shell {
        config.behavior.shell_path = Some(shell.clone());
    }
    if options.no_color {
        config.appearance.show_ansi_colors = false;
    }
    config
}

/// Log to `~/.aerominal/aerominal.log`; stdout belongs to the display
fn init_logging() {
    let log_path = Config::config_dir()
        .map(|dir| dir.join("aerominal.log"))
        .unwrap_or_else(|| PathBuf::from("aerominal.log"));

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let options = match parse_args(env::args().skip(1)) {
        Ok(CliCommand::Run(options)) => options,
        Ok(CliCommand::Help) => {
            print_help();
            return Ok(());
        }
        Ok(CliCommand::Version) => {
            print_version();
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    init_logging();
    info!("aerominal {} starting...", VERSION);

    let config = merge_options(Config::load(), &options);

    if options.write_config {
        config.save()?;
        eprintln!("Config written to ~/.aerominal/config.toml");
        return Ok(());
    }

    info!("Shell: {}", config.shell().unwrap_or(default_shell()));
    info!("ANSI colors: {}", config.appearance.show_ansi_colors);

    let app = match App::new(config) {
        Ok(app) => app,
        Err(e) => {
            error!("{:#}", e);
            return Err(e);
        }
    };

    app.run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_defaults() {
        assert_eq!(
            parse_args(args(&[])),
            Ok(CliCommand::Run(CliOptions::default()))
        );
    }

    #[test]
    fn test_parse_options() {
        assert_eq!(
            parse_args(args(&["-s", "/bin/zsh", "--no-color"])),
            Ok(CliCommand::Run(CliOptions {
                shell: Some("/bin/zsh".to_string()),
                no_color: true,
                write_config: false,
            }))
        );
        assert_eq!(parse_args(args(&["--help"])), Ok(CliCommand::Help));
        assert_eq!(parse_args(args(&["-v"])), Ok(CliCommand::Version));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_args(args(&["--shell"])).is_err());
        assert!(parse_args(args(&["--bogus"])).is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let mut config = Config::default();
        config.behavior.shell_path = Some("bash".to_string());

        let options = CliOptions {
            shell: Some("zsh".to_string()),
            no_color: true,
            write_config: false,
        };
        let merged = merge_options(config, &options);
        assert_eq!(merged.shell(), Some("zsh"));
        assert!(!merged.appearance.show_ansi_colors);

        let kept = merge_options(merged.clone(), &CliOptions::default());
        assert_eq!(kept, merged);
    }
}
