//! Connection options and the `mlbridgerc` file parser.
//!
//! The rc file is line-oriented:
//!
//! | Line | Action |
//! |------|--------|
//! | `hidden = yes` | hide the engine window |
//! | `multithreaded = no` | restrict the engine to one computational thread |
//! | `license = /path/to/license.dat` | license file handed to the engine |
//! | `engine = /usr/local/bin/matlab-bridge` | bridge executable to launch |
//! | `engine_args = -nojvm "-sd /tmp"` | extra bridge arguments |
//! | `timeout = 30` | per-call timeout in seconds (`0` = wait forever) |
//! | Lines starting with `;` or `#` | comment, ignored |
//!
//! `key value` (without `=`) is accepted too.  Environment variables named
//! `MLBRIDGE_<KEY>` override the file.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use directories::ProjectDirs;

/// Bridge executable launched when nothing else is configured.
pub const DEFAULT_ENGINE: &str = "matlab-bridge";

/// Prefix of the environment variables that override rc-file settings.
pub const ENV_PREFIX: &str = "MLBRIDGE_";

// ── Public API ────────────────────────────────────────────────────────────────

/// A non-fatal error encountered while loading options.
///
/// `line` is 0 for problems found in environment variables.
#[derive(Debug)]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.line == 0 {
            write!(f, "environment: {}", self.message)
        } else {
            write!(f, "line {}: {}", self.line, self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

/// Engine connection options, read once per (re)connection attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    /// Run the engine without its desktop window.
    pub hidden: bool,
    /// Allow the engine to use several computational threads.
    pub multithreaded: bool,
    pub license_path: Option<PathBuf>,
    pub engine_command: String,
    pub engine_args: Vec<String>,
    /// Per-call timeout; `None` blocks until the engine answers.
    pub timeout: Option<Duration>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            hidden: false,
            multithreaded: true,
            license_path: None,
            engine_command: DEFAULT_ENGINE.to_owned(),
            engine_args: Vec::new(),
            timeout: None,
        }
    }
}

/// Options shared between the bindings and the evaluator of one engine.
pub type SharedOptions = Arc<RwLock<Options>>;

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> SharedOptions {
        Arc::new(RwLock::new(self))
    }

    /// Parse an rc string on top of the defaults.
    ///
    /// Returns the options and a list of any problems on individual lines;
    /// a bad line never prevents the rest from loading.
    pub fn load_str(s: &str) -> (Self, Vec<ConfigError>) {
        let mut opts = Options::new();
        let mut errors = Vec::new();

        for (i, raw) in s.lines().enumerate() {
            let lineno = i + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            let (key, value) = match line.split_once('=') {
                Some((k, v)) => (k.trim(), v.trim()),
                None => line
                    .split_once(|c: char| c.is_ascii_whitespace())
                    .map(|(k, v)| (k, v.trim()))
                    .unwrap_or((line, "")),
            };

            if let Err(msg) = opts.set(key, value) {
                errors.push(ConfigError { line: lineno, message: msg });
            }
        }

        (opts, errors)
    }

    /// Read and parse an rc file from disk.
    pub fn load_file(path: &Path) -> std::io::Result<(Self, Vec<ConfigError>)> {
        let s = std::fs::read_to_string(path)?;
        Ok(Self::load_str(&s))
    }

    /// Apply `MLBRIDGE_*` overrides from an environment listing.
    ///
    /// Unprefixed variables are ignored; unknown prefixed ones are reported.
    pub fn apply_env<I>(&mut self, vars: I) -> Vec<ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut errors = Vec::new();
        for (name, value) in vars {
            let Some(key) = name.strip_prefix(ENV_PREFIX) else { continue };
            if key == "LOG" {
                continue; // logging filter, read by the binary
            }
            if let Err(msg) = self.set(&key.to_ascii_lowercase(), value.trim()) {
                errors.push(ConfigError { line: 0, message: format!("{name}: {msg}") });
            }
        }
        errors
    }

    /// Set one option by its rc-file key.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "hidden" => self.hidden = parse_bool(key, value)?,
            "multithreaded" => self.multithreaded = parse_bool(key, value)?,
            "license" => {
                self.license_path = (!value.is_empty()).then(|| PathBuf::from(value));
            }
            "engine" => {
                if value.is_empty() {
                    return Err("engine: command cannot be empty".into());
                }
                self.engine_command = value.to_owned();
            }
            "engine_args" => self.engine_args = split_args(value),
            "timeout" => {
                let secs: f64 = value
                    .parse()
                    .map_err(|_| format!("timeout: not a number: '{value}'"))?;
                if !secs.is_finite() || secs < 0.0 {
                    return Err(format!("timeout: must be zero or positive, got {value}"));
                }
                self.timeout = (secs > 0.0).then(|| Duration::from_secs_f64(secs));
            }
            "" => return Err("missing option name".into()),
            other => return Err(format!("unknown option '{other}'")),
        }
        Ok(())
    }
}

/// The per-user rc file location, e.g. `~/.config/mlbridge/mlbridgerc`.
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "mlbridge").map(|d| d.config_dir().join("mlbridgerc"))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Ok(true),
        "0" | "no" | "false" | "off" => Ok(false),
        _ => Err(format!("{key}: expected a boolean, got '{value}'")),
    }
}

// ── Argument tokenizer ────────────────────────────────────────────────────────

/// Split `s` into whitespace-delimited tokens, honouring double-quoted strings
/// and `\"` escapes within them.
fn split_args(s: &str) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '\\' if in_quotes => {
                if let Some(escaped) = chars.next() {
                    cur.push(escaped);
                }
            }
            c if c.is_ascii_whitespace() && !in_quotes => {
                if !cur.is_empty() {
                    args.push(std::mem::take(&mut cur));
                }
            }
            c => cur.push(c),
        }
    }
    if !cur.is_empty() {
        args.push(cur);
    }
    args
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|&(k, v)| (k.to_owned(), v.to_owned())).collect()
    }

    // -- split_args -----------------------------------------------------------

    #[test]
    fn split_simple() {
        assert_eq!(split_args("-nojvm -nosplash"), ["-nojvm", "-nosplash"]);
    }

    #[test]
    fn split_quoted_spaces() {
        assert_eq!(split_args(r#""-sd /my dir" -r"#), ["-sd /my dir", "-r"]);
    }

    #[test]
    fn split_escaped_quote_inside_quotes() {
        assert_eq!(split_args(r#""say \"hi\"""#), [r#"say "hi""#]);
    }

    // -- keys -----------------------------------------------------------------

    #[test]
    fn defaults() {
        let (opts, errs) = Options::load_str("");
        assert!(errs.is_empty());
        assert_eq!(opts, Options::default());
        assert!(opts.multithreaded);
        assert!(!opts.hidden);
        assert_eq!(opts.engine_command, DEFAULT_ENGINE);
    }

    #[test]
    fn equals_syntax() {
        let (opts, errs) = Options::load_str("hidden = yes\nmultithreaded=0");
        assert!(errs.is_empty(), "{errs:?}");
        assert!(opts.hidden);
        assert!(!opts.multithreaded);
    }

    #[test]
    fn space_syntax() {
        let (opts, errs) = Options::load_str("license /opt/matlab/license.dat");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(opts.license_path, Some(PathBuf::from("/opt/matlab/license.dat")));
    }

    #[test]
    fn empty_license_clears() {
        let (opts, errs) = Options::load_str("license = /a\nlicense =");
        assert!(errs.is_empty(), "{errs:?}");
        assert!(opts.license_path.is_none());
    }

    #[test]
    fn engine_and_args() {
        let (opts, errs) =
            Options::load_str("engine = /usr/bin/octave-bridge\nengine_args = --quiet \"-p /x y\"");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(opts.engine_command, "/usr/bin/octave-bridge");
        assert_eq!(opts.engine_args, ["--quiet", "-p /x y"]);
    }

    #[test]
    fn timeout_seconds() {
        let (opts, errs) = Options::load_str("timeout = 2.5");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(opts.timeout, Some(Duration::from_millis(2500)));

        let (opts, _) = Options::load_str("timeout = 0");
        assert!(opts.timeout.is_none());
    }

    #[test]
    fn bad_values_are_reported_with_line() {
        let (opts, errs) = Options::load_str("hidden = maybe\n\ntimeout = -3\nbogus = 1");
        assert_eq!(errs.len(), 3);
        assert_eq!(errs[0].line, 1);
        assert_eq!(errs[1].line, 3);
        assert!(errs[2].message.contains("bogus"));
        assert_eq!(opts, Options::default());
    }

    #[test]
    fn comments_and_blank_lines_ignored() {
        let (opts, errs) = Options::load_str(
            ";; bridge settings\n\
             # also a comment\n\
             \n\
             hidden = on",
        );
        assert!(errs.is_empty(), "{errs:?}");
        assert!(opts.hidden);
    }

    // -- environment ----------------------------------------------------------

    #[test]
    fn env_overrides_file() {
        let (mut opts, _) = Options::load_str("hidden = no\ntimeout = 5");
        let errs = opts.apply_env(env(&[
            ("MLBRIDGE_HIDDEN", "1"),
            ("MLBRIDGE_TIMEOUT", "0"),
            ("PATH", "/bin"),
        ]));
        assert!(errs.is_empty(), "{errs:?}");
        assert!(opts.hidden);
        assert!(opts.timeout.is_none());
    }

    #[test]
    fn env_unknown_key_reported() {
        let mut opts = Options::new();
        let errs = opts.apply_env(env(&[("MLBRIDGE_COLOR", "red"), ("MLBRIDGE_LOG", "debug")]));
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].line, 0);
        assert!(errs[0].to_string().starts_with("environment:"));
    }

    #[test]
    fn load_file_reads_disk() {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "hidden = true").unwrap();
        let (opts, errs) = Options::load_file(f.path()).unwrap();
        assert!(errs.is_empty());
        assert!(opts.hidden);
    }
}
