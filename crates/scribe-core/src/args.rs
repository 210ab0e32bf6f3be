//! Command-line argument normalization.
//!
//! Turns the raw tokens a process was started with into a [`LaunchRequest`]:
//! file arguments become absolute paths so they stay meaningful when handed to
//! another process with a different working directory, and option tokens
//! (anything starting with `-`) pass through untouched.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Marker that distinguishes option tokens from file arguments.
pub const OPTION_MARKER: char = '-';

/// Token that forces a new window instead of handing off to a running instance.
pub const FORCE_NEW_WINDOW_FLAG: &str = "-newwindow";

/// Token that suppresses the splash screen.
pub const NO_SPLASH_FLAG: &str = "-nosplash";

/// Normalized arguments of one process invocation, in their original order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchRequest {
    args: Vec<String>,
}

impl LaunchRequest {
    /// Wrap already-normalized arguments.
    pub fn new(args: Vec<String>) -> Self {
        Self { args }
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn into_args(self) -> Vec<String> {
        self.args
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// File arguments (everything that is not an option token).
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.args
            .iter()
            .map(String::as_str)
            .filter(|arg| !is_option(arg))
    }

    /// Whether the request carries `flag`, compared case-insensitively.
    pub fn has_flag(&self, flag: &str) -> bool {
        self.args
            .iter()
            .any(|arg| is_option(arg) && arg.eq_ignore_ascii_case(flag))
    }

    /// Encode for the handoff channel: one token per line.
    pub fn to_wire(&self) -> String {
        self.args.join("\n")
    }

    /// Decode a handoff payload. Blank lines are dropped and `\r\n` line
    /// endings are accepted.
    pub fn from_wire(payload: &str) -> Self {
        let args = payload
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self { args }
    }
}

/// Launch options carried inside the request tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaunchFlags {
    /// Skip the single-instance check and open a new window.
    pub force_new_window: bool,
    pub no_splash: bool,
}

impl LaunchFlags {
    pub fn from_request(request: &LaunchRequest) -> Self {
        Self {
            force_new_window: request.has_flag(FORCE_NEW_WINDOW_FLAG),
            no_splash: request.has_flag(NO_SPLASH_FLAG),
        }
    }
}

/// Normalize raw arguments (argv without the program name) against `working_dir`.
///
/// Never fails: a token that cannot be interpreted as a path is passed through
/// as given.
pub fn normalize_args<I, S>(raw: I, working_dir: &Path) -> LaunchRequest
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let args = raw
        .into_iter()
        .filter(|token| !token.as_ref().is_empty())
        .map(|token| normalize_token(token.as_ref(), working_dir))
        .collect();
    LaunchRequest { args }
}

fn is_option(token: &str) -> bool {
    token.starts_with(OPTION_MARKER)
}

fn normalize_token(token: &str, working_dir: &Path) -> String {
    if is_option(token) {
        return token.to_string();
    }

    let trimmed = token.trim_end_matches(std::path::is_separator);
    // Keep bare roots ("/", "C:\") intact; trimming them changes their meaning.
    let path = if trimmed.is_empty() || Path::new(trimmed).parent().is_none() {
        Path::new(token)
    } else {
        Path::new(trimmed)
    };

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        working_dir.join(path)
    };

    lexical_normalize(&absolute).to_string_lossy().into_owned()
}

/// Collapse `.` and `..` without touching the filesystem.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` above the root stays at the root.
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
