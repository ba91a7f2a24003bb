//! Command-line argument parsing.
//!
//! Usage:
//!   mlbridge [-nHSxvd] [-f[<rcfile>]] [-l<license>] [-t<secs>] [-c<script>] [<file.m> ...]

use std::path::PathBuf;

use crate::config::{self, Options};

pub const USAGE: &str =
    "Usage: mlbridge [-nHSxvd] [-f[<rcfile>]] [-l<license>] [-t<secs>] [-c<script>] [<file.m> ...]";

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, Default)]
pub struct CliArgs {
    /// Evaluate against the in-process workspace (`-n`).
    pub loopback: bool,
    /// Hide the engine window (`-H`).
    pub hidden: bool,
    /// One computational thread (`-S`).
    pub single_threaded: bool,
    /// License file (`-l<file>`).
    pub license: Option<PathBuf>,
    /// Per-call timeout in seconds (`-t<secs>`).
    pub timeout: Option<String>,
    /// Rc-file specification.
    pub config: ConfigFile,
    /// Inline script (`-c<script>`).
    pub command: Option<String>,
    /// List workspace variables when done (`-v`).
    pub list_vars: bool,
    /// Shut the engine down when done (`-x`).
    pub exit_engine: bool,
    /// Debug logging (`-d`).
    pub debug: bool,
    /// Script files, run in order.
    pub files: Vec<PathBuf>,
}

/// How to choose the rc file.
#[derive(Debug, Default)]
pub enum ConfigFile {
    /// Use the first rc file found by [`find_user_config`] (default).
    #[default]
    Search,
    /// `-f` with no file argument: skip the rc file.
    Skip,
    /// `-f<file>`: load this specific file.
    Explicit(PathBuf),
}

impl CliArgs {
    /// Overlay the flags onto `opts`.
    pub fn apply_to(&self, opts: &mut Options) -> Result<(), String> {
        if self.hidden {
            opts.hidden = true;
        }
        if self.single_threaded {
            opts.multithreaded = false;
        }
        if let Some(license) = &self.license {
            opts.license_path = Some(license.clone());
        }
        if let Some(secs) = &self.timeout {
            opts.set("timeout", secs).map_err(|e| format!("-t: {e}"))?;
        }
        Ok(())
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()` and return [`CliArgs`] or an error message.
pub fn parse_args() -> Result<CliArgs, String> {
    let raw: Vec<String> = std::env::args().collect();
    parse_argv(raw.get(1..).unwrap_or_default())
}

/// Parse a slice of argument strings (exposed for testing).
pub fn parse_argv(argv: &[String]) -> Result<CliArgs, String> {
    let mut args = CliArgs::default();
    let mut i = 0;

    while i < argv.len() {
        let arg = argv[i].as_str();

        if arg == "--" {
            args.files.extend(argv[i + 1..].iter().map(PathBuf::from));
            break;
        }

        if !arg.starts_with('-') || arg == "-" {
            args.files.push(PathBuf::from(arg));
            i += 1;
            continue;
        }

        let chars: Vec<char> = arg[1..].chars().collect();
        let mut j = 0;
        while j < chars.len() {
            match chars[j] {
                'n' => args.loopback = true,
                'H' => args.hidden = true,
                'S' => args.single_threaded = true,
                'v' => args.list_vars = true,
                'x' => args.exit_engine = true,
                'd' => args.debug = true,

                // -f[<file>]
                'f' => {
                    if j + 1 < chars.len() {
                        let file: String = chars[j + 1..].iter().collect();
                        args.config = ConfigFile::Explicit(PathBuf::from(file));
                        j = chars.len();
                    } else if i + 1 < argv.len() && !argv[i + 1].starts_with('-') {
                        i += 1;
                        args.config = ConfigFile::Explicit(PathBuf::from(&argv[i]));
                    } else {
                        args.config = ConfigFile::Skip;
                    }
                }

                flag @ ('c' | 'l' | 't') => {
                    let value = if j + 1 < chars.len() {
                        let s: String = chars[j + 1..].iter().collect();
                        j = chars.len();
                        s
                    } else if i + 1 < argv.len() {
                        i += 1;
                        argv[i].clone()
                    } else {
                        return Err(format!("-{flag} requires an argument"));
                    };
                    match flag {
                        'c' => args.command = Some(value),
                        'l' => args.license = Some(PathBuf::from(value)),
                        _ => args.timeout = Some(value),
                    }
                }

                c => return Err(format!("unknown option: -{c}")),
            }
            j += 1;
        }
        i += 1;
    }

    Ok(args)
}

// ── Path helpers ──────────────────────────────────────────────────────────────

/// Search for the rc file in the standard locations.
/// Returns the first path that exists, or `None`.
pub fn find_user_config() -> Option<PathBuf> {
    let home = std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".mlbridgerc"));
    config::default_config_path()
        .into_iter()
        .chain(home)
        .chain(Some(PathBuf::from("./.mlbridgerc")))
        .find(|p| p.exists())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
