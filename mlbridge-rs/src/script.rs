//! Folding a multi-line script into one remote command.
//!
//! The engine's evaluation entry point takes one string, so a script is
//! shipped as a single assignment that rebuilds its text inside the engine:
//!
//! ```text
//! a = 1;          % first          mlbridge_script042137 = sprintf('a = 1;\nb = ''x'';\n');
//! b = 'x';               ──fold──▶
//! % trailing note
//! ```
//!
//! Comment handling:
//!
//! | Line | Result |
//! |------|--------|
//! | no word character before the first `%` | dropped |
//! | `%{` / `%}` on a line of their own | block dropped |
//! | code, then `%` | truncated at the `%` |
//! | `%` inside a `'...'` or `"..."` literal | kept, not a comment |
//! | blank | dropped |

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

/// Prefix of the temporary variables holding folded scripts.
pub const TEMP_PREFIX: &str = "mlbridge_script";

/// One folded script: the assignment that materializes its text in `var`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptCommand {
    var: String,
    command: String,
}

impl ScriptCommand {
    /// The temporary variable the command assigns.
    pub fn var(&self) -> &str {
        &self.var
    }

    /// The `var = sprintf('...');` command text.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// The command that removes the temporary variable again.
    pub fn cleanup(&self) -> String {
        format!("clearvars {}", self.var)
    }
}

/// Fold `script` into a command, or `None` if it contains no code.
pub fn fold(script: &str) -> Option<ScriptCommand> {
    fold_lines(script.lines())
}

/// As [`fold`], over lines from any source.
pub fn fold_lines<I, S>(lines: I) -> Option<ScriptCommand>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut body = String::new();
    let mut block_depth = 0usize;

    for line in lines {
        let line = line.as_ref();
        match line.trim() {
            "%{" => {
                block_depth += 1;
                continue;
            }
            "%}" if block_depth > 0 => {
                block_depth -= 1;
                continue;
            }
            _ if block_depth > 0 => continue,
            _ => {}
        }
        if let Some(code) = strip_comment(line) {
            escape_into(&mut body, code);
            body.push_str("\\n");
        }
    }

    if body.is_empty() {
        return None;
    }
    let var = temp_var_name();
    let command = format!("{var} = sprintf('{body}');");
    Some(ScriptCommand { var, command })
}

/// The code part of `line`, or `None` if nothing executable remains.
///
/// A `%` counts as a comment marker only outside string literals.  A line
/// with no word character before its marker is a comment in full.
pub fn strip_comment(line: &str) -> Option<&str> {
    let code = match comment_start(line) {
        Some(pos) => {
            let before = &line[..pos];
            if !before.chars().any(is_word_char) {
                return None;
            }
            before
        }
        None => line,
    };
    let code = code.trim_end();
    if code.trim_start().is_empty() {
        None
    } else {
        Some(code)
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Byte offset of the first `%` outside a string literal.
fn comment_start(line: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    // Character before the current one, for telling `a'` (transpose) from `'a'`.
    let mut prev: Option<char> = None;
    let mut chars = line.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match quote {
            Some(q) if c == q => {
                if chars.peek().map(|&(_, n)| n) == Some(q) {
                    chars.next();
                } else {
                    quote = None;
                }
            }
            Some(_) => {}
            None => match c {
                '%' => return Some(i),
                '"' => quote = Some('"'),
                '\'' if !prev.is_some_and(|p| is_word_char(p) || matches!(p, ')' | ']' | '}' | '.' | '\'')) => {
                    quote = Some('\'');
                }
                _ => {}
            },
        }
        prev = Some(c);
    }
    None
}

/// Escape `code` for a single-quoted `sprintf` format.
fn escape_into(out: &mut String, code: &str) {
    for c in code.chars() {
        match c {
            '\'' => out.push_str("''"),
            '\\' => out.push_str("\\\\"),
            '%' => out.push_str("%%"),
            c => out.push(c),
        }
    }
}

/// A fresh temporary variable name: the prefix plus six random digits.
pub fn temp_var_name() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let mut h = RandomState::new().build_hasher();
    h.write_u64(COUNTER.fetch_add(1, Ordering::Relaxed));
    format!("{TEMP_PREFIX}{:06}", h.finish() % 1_000_000)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
